//! Error types for the reseller API service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use tandem_core::CoreError;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Subscriber not found")]
    SubscriberNotFound,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error")]
    Database(#[from] tandem_db::DbError),

    #[error("Panel error")]
    Panel(#[from] tandem_panel::PanelError),

    #[error("Core error")]
    Core(#[from] CoreError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::SubscriberNotFound | Self::AccountNotFound | Self::Core(CoreError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Panel(_) | Self::Core(CoreError::Panel(_)) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Core(CoreError::Db(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::SubscriberNotFound | Self::Core(CoreError::NotFound(_)) => "SUBSCRIBER_NOT_FOUND",
            Self::AccountNotFound => "ACCOUNT_NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Panel(_) | Self::Core(CoreError::Panel(_)) => "PANEL_UNAVAILABLE",
            Self::Database(_) | Self::Core(CoreError::Db(_)) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "Internal API error");
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
