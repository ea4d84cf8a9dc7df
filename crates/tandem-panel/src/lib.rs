//! Tandem Panel - Panel client abstraction
//!
//! One trait, two backends. The [`PanelApi`] trait is the single capability
//! contract the reconciler and scheduler are written against; the two
//! implementations wrap the vendor REST APIs and normalize their payloads
//! into [`tandem_types::PanelRecord`] at the boundary.
//!
//! # Example
//!
//! ```rust,ignore
//! use tandem_panel::{PanelApi, PrimaryClient, PrimaryConfig};
//!
//! let client = PrimaryClient::new(PrimaryConfig::new("https://panel.example.com", "key"))?;
//! let record = client.get_user(&key).await?;
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod identity_map;
pub mod primary;
pub mod retry;
pub mod secondary;
mod timestamp;

pub use api::PanelApi;
pub use cache::{ListingCache, ListingCacheConfig};
pub use config::{PrimaryConfig, SecondaryConfig};
pub use error::{PanelError, PanelResult};
pub use identity_map::IdentityMap;
pub use primary::PrimaryClient;
pub use retry::{with_retry, RetryConfig};
pub use secondary::SecondaryClient;
