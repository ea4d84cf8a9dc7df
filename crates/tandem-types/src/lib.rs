//! Tandem Types - Shared domain types
//!
//! This crate contains domain types used across tandem crates:
//! - Internal identifiers and external subscriber keys
//! - Normalized per-panel records
//! - The combined (reconciled) subscriber view
//! - Warning kinds for the notification dedup log

pub mod combined;
pub mod ids;
pub mod key;
pub mod panel;
pub mod warning;

pub use combined::*;
pub use ids::*;
pub use key::*;
pub use panel::*;
pub use warning::*;
