//! Usage window handlers

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tandem_db::AccountRepository;
use tandem_types::{AccountId, PanelKind, SubscriberKey};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DailyUsageResponse {
    pub primary_gb: f64,
    pub secondary_gb: f64,
    pub total_gb: f64,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub panel: PanelKind,
}

#[derive(Debug, Serialize)]
pub struct WindowedUsageResponse {
    pub panel: PanelKind,
    /// Usage accrued per trailing window, keyed by window length in hours.
    pub windows: BTreeMap<i64, f64>,
}

/// Resolve the internal account row for an external key.
async fn resolve_account(state: &AppState, key: &str) -> ApiResult<AccountId> {
    let row = match SubscriberKey::parse(key) {
        SubscriberKey::Uuid(uuid) => state.repos.accounts.find_by_uuid(uuid).await?,
        SubscriberKey::Name(name) => state.repos.accounts.find_by_panel_name(&name).await?,
    };
    row.map(|row| row.account_id()).ok_or(ApiError::AccountNotFound)
}

/// GET /api/v1/users/{key}/usage/daily
#[instrument(skip(state))]
pub async fn daily_usage(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<DailyUsageResponse>> {
    let account = resolve_account(&state, &key).await?;
    let daily = state.usage.daily_usage(account).await?;
    Ok(Json(DailyUsageResponse {
        primary_gb: daily.primary_gb,
        secondary_gb: daily.secondary_gb,
        total_gb: daily.total_gb(),
    }))
}

/// GET /api/v1/users/{key}/usage/windows?panel=primary
#[instrument(skip(state))]
pub async fn windowed_usage(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Json<WindowedUsageResponse>> {
    let account = resolve_account(&state, &key).await?;
    let windows = state.usage.windowed_usage(account, query.panel).await?;
    Ok(Json(WindowedUsageResponse {
        panel: query.panel,
        windows,
    }))
}
