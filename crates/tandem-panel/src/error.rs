//! Panel client errors

use thiserror::Error;

/// Errors surfaced by the panel clients.
///
/// `NotFound` is deliberately not a variant: a missing user is a normal state
/// and is expressed as `Ok(None)` by [`crate::PanelApi::get_user`]. These
/// variants all mean "this panel has no usable data right now".
#[derive(Error, Debug)]
pub enum PanelError {
    /// Transport failure - connect error, timeout, broken body.
    #[error("panel transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status the client could not handle.
    #[error("panel returned status {status}")]
    Status { status: u16 },

    /// Authentication with the panel failed (bad key or rejected login).
    #[error("panel authentication failed")]
    Auth,

    /// Response body did not match the expected shape.
    #[error("malformed panel response: {0}")]
    Malformed(String),

    /// The identity map file could not be read or parsed.
    #[error("identity map error: {0}")]
    IdentityMap(String),
}

impl PanelError {
    /// Whether a retry of the same (idempotent) request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Self::Status { status } => *status >= 500 || *status == 429,
            Self::Auth | Self::Malformed(_) | Self::IdentityMap(_) => false,
        }
    }
}

impl crate::retry::RetryableError for PanelError {
    fn is_retryable(&self) -> bool {
        PanelError::is_retryable(self)
    }
}

/// Result type for panel operations.
pub type PanelResult<T> = Result<T, PanelError>;
