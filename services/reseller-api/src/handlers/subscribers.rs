//! Subscriber, account-registration and payment handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use tandem_db::{
    AccountRepository, NotificationSetting, PaymentRepository, RegisterAccount,
    SubscriberRepository,
};
use tandem_types::{AccountId, PanelKind, SubscriberId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSubscriberRequest {
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriberResponse {
    pub id: i64,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterAccountRequest {
    pub uuid: Option<Uuid>,
    pub panel_name: Option<String>,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: i64,
    pub label: String,
    pub uuid: Option<String>,
    pub panel_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingRequest {
    pub setting: String,
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetBirthdayRequest {
    /// `YYYY-MM-DD`, or null to clear.
    pub birthday: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LatestPaymentResponse {
    pub account_id: i64,
    pub paid_at: DateTime<Utc>,
}

fn parse_setting(raw: &str) -> Result<NotificationSetting, ApiError> {
    match raw {
        "daily_reports" => Ok(NotificationSetting::DailyReports),
        "expiry_warnings" => Ok(NotificationSetting::ExpiryWarnings),
        "data_warnings_primary" => Ok(NotificationSetting::DataWarnings(PanelKind::Primary)),
        "data_warnings_secondary" => Ok(NotificationSetting::DataWarnings(PanelKind::Secondary)),
        other => Err(ApiError::BadRequest(format!("unknown setting: {other}"))),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/subscribers
#[instrument(skip(state, req))]
pub async fn create_subscriber(
    State(state): State<AppState>,
    Json(req): Json<CreateSubscriberRequest>,
) -> ApiResult<(StatusCode, Json<SubscriberResponse>)> {
    let name = req.display_name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("display_name must not be empty".into()));
    }
    let row = state.repos.subscribers.create(name).await?;
    Ok((
        StatusCode::CREATED,
        Json(SubscriberResponse {
            id: row.id,
            display_name: row.display_name,
        }),
    ))
}

/// POST /api/v1/subscribers/{id}/accounts
#[instrument(skip(state, req))]
pub async fn register_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<RegisterAccountRequest>,
) -> ApiResult<(StatusCode, Json<AccountResponse>)> {
    if req.uuid.is_none() && req.panel_name.is_none() {
        return Err(ApiError::BadRequest(
            "either uuid or panel_name is required".into(),
        ));
    }
    let subscriber = SubscriberId(id);
    if state.repos.subscribers.find_by_id(subscriber).await?.is_none() {
        return Err(ApiError::SubscriberNotFound);
    }

    let row = state
        .repos
        .accounts
        .register(RegisterAccount {
            subscriber_id: subscriber,
            uuid: req.uuid,
            panel_name: req.panel_name,
            label: req.label,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AccountResponse {
            id: row.id,
            label: row.label,
            uuid: row.uuid,
            panel_name: row.panel_name,
        }),
    ))
}

/// PUT /api/v1/subscribers/{id}/settings
#[instrument(skip(state, req))]
pub async fn update_setting(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateSettingRequest>,
) -> ApiResult<StatusCode> {
    let setting = parse_setting(&req.setting)?;
    let subscriber = SubscriberId(id);
    if state.repos.subscribers.find_by_id(subscriber).await?.is_none() {
        return Err(ApiError::SubscriberNotFound);
    }
    state
        .repos
        .subscribers
        .update_setting(subscriber, setting, req.enabled)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/subscribers/{id}/birthday
#[instrument(skip(state, req))]
pub async fn set_birthday(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<SetBirthdayRequest>,
) -> ApiResult<StatusCode> {
    let subscriber = SubscriberId(id);
    if state.repos.subscribers.find_by_id(subscriber).await?.is_none() {
        return Err(ApiError::SubscriberNotFound);
    }
    state
        .repos
        .subscribers
        .set_birthday(subscriber, req.birthday)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/accounts/{id}/payments
#[instrument(skip(state))]
pub async fn record_payment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let account = AccountId(id);
    if state.repos.accounts.find_by_id(account).await?.is_none() {
        return Err(ApiError::AccountNotFound);
    }
    state.repos.payments.record(account, Utc::now()).await?;
    Ok(StatusCode::CREATED)
}

/// GET /api/v1/accounts/{id}/payments
#[instrument(skip(state))]
pub async fn list_payments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<PaymentResponse>>> {
    let account = AccountId(id);
    if state.repos.accounts.find_by_id(account).await?.is_none() {
        return Err(ApiError::AccountNotFound);
    }
    let history = state.repos.payments.history(account).await?;
    Ok(Json(
        history
            .into_iter()
            .map(|row| PaymentResponse { paid_at: row.paid_at })
            .collect(),
    ))
}

/// GET /api/v1/payments/latest
#[instrument(skip(state))]
pub async fn list_latest_payments(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<LatestPaymentResponse>>> {
    let latest = state.repos.payments.latest_per_account().await?;
    Ok(Json(
        latest
            .into_iter()
            .map(|(account, paid_at)| LatestPaymentResponse {
                account_id: account.0,
                paid_at,
            })
            .collect(),
    ))
}
