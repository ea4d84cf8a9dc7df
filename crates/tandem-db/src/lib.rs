//! Tandem DB - Storage layer
//!
//! SQLx-based SQLite layer for the reseller control plane. The database
//! holds what the panels cannot tell us: which account belongs to which
//! subscriber, the append-only usage snapshot history, the warning dedup
//! log, and payment records.
//!
//! # Example
//!
//! ```rust,ignore
//! use tandem_db::{create_pool, Repositories};
//!
//! let pool = create_pool("sqlite://tandem.db").await?;
//! let repos = Repositories::new(pool);
//!
//! let accounts = repos.accounts.list_active().await?;
//! ```

pub mod error;
pub mod models;
pub mod pool;
pub mod repo;
pub mod sqlite;

pub use error::{DbError, DbResult};
pub use models::*;
pub use pool::{create_pool, ping, vacuum, DbPool};
pub use repo::*;
pub use sqlite::Repositories;
