//! Core engine errors

use thiserror::Error;

/// Errors surfaced by the core services.
///
/// A subscriber that exists on neither panel is not an error for reads -
/// lookups return `Ok(None)`. `NotFound` is reserved for provisioning
/// operations that were asked to act on a subscriber nobody knows.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage failure
    #[error("database error: {0}")]
    Db(#[from] tandem_db::DbError),

    /// Both panels failed or the targeted panel rejected the operation
    #[error("panel error: {0}")]
    Panel(#[from] tandem_panel::PanelError),

    /// Provisioning target does not exist on either panel
    #[error("subscriber not found: {0}")]
    NotFound(String),
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
