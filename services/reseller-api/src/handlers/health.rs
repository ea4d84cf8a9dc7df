//! Health and readiness probes

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health - liveness probe
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /ready - readiness probe; checks the store is reachable
pub async fn ready(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    match tandem_db::ping(&state.pool).await {
        Ok(()) => Ok(Json(json!({ "status": "ready" }))),
        Err(err) => {
            tracing::error!(error = %err, "readiness check failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
