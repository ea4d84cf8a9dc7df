//! Reconciled-user handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tandem_types::{CombinedUser, PanelKind, SubscriberKey, UserDelta};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct ModifyRequest {
    #[serde(default)]
    pub add_gb: f64,
    #[serde(default)]
    pub add_days: i64,
    /// Restrict the change to one panel; both when omitted.
    pub panel: Option<PanelKind>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<CombinedUser>,
    pub total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/users
#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<UserListResponse>> {
    let users = state.reconciler.all_users().await?;
    let total = users.len();
    Ok(Json(UserListResponse { users, total }))
}

/// GET /api/v1/users/{key}
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<CombinedUser>> {
    let key = SubscriberKey::parse(&key);
    let user = state
        .reconciler
        .get_user(&key)
        .await?
        .ok_or(ApiError::SubscriberNotFound)?;
    Ok(Json(user))
}

/// GET /api/v1/search?q=
#[instrument(skip(state))]
pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<UserListResponse>> {
    if query.q.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".into()));
    }
    let users = state.reconciler.search(query.q.trim()).await?;
    let total = users.len();
    Ok(Json(UserListResponse { users, total }))
}

/// POST /api/v1/users/{key}/modify
#[instrument(skip(state, req), fields(key = %key))]
pub async fn modify_user(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<ModifyRequest>,
) -> ApiResult<StatusCode> {
    let delta = UserDelta {
        add_gb: req.add_gb,
        add_days: req.add_days,
    };
    if delta.is_empty() {
        return Err(ApiError::BadRequest("nothing to change".into()));
    }
    let key = SubscriberKey::parse(&key);
    state.reconciler.modify_user(&key, delta, req.panel).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/users/{key}
#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<StatusCode> {
    let key = SubscriberKey::parse(&key);
    state.reconciler.delete_user(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/users/{key}/reset-usage
#[instrument(skip(state))]
pub async fn reset_usage(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<StatusCode> {
    let key = SubscriberKey::parse(&key);
    state.reconciler.reset_usage(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/identity-map/reload
#[instrument(skip(state))]
pub async fn reload_identity_map(
    State(state): State<AppState>,
) -> ApiResult<Json<serde_json::Value>> {
    let entries = state
        .identity
        .reload()
        .map_err(ApiError::Panel)?;
    Ok(Json(serde_json::json!({ "entries": entries })))
}
