//! Repository traits
//!
//! Define async repository interfaces for database operations.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use tandem_types::{AccountId, DailyUsage, PanelKind, SubscriberId, WarningKind};

use crate::error::DbResult;
use crate::models::*;

/// Subscriber repository trait
#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    /// Create a subscriber
    async fn create(&self, display_name: &str) -> DbResult<SubscriberRow>;

    /// Find a subscriber by id
    async fn find_by_id(&self, id: SubscriberId) -> DbResult<Option<SubscriberRow>>;

    /// List all subscribers
    async fn list_all(&self) -> DbResult<Vec<SubscriberRow>>;

    /// List subscribers flagged as admins
    async fn list_admins(&self) -> DbResult<Vec<SubscriberRow>>;

    /// Notification settings for a subscriber
    async fn settings(&self, id: SubscriberId) -> DbResult<NotificationSettings>;

    /// Flip one notification setting
    async fn update_setting(
        &self,
        id: SubscriberId,
        setting: NotificationSetting,
        enabled: bool,
    ) -> DbResult<()>;

    /// Set or clear the birthday
    async fn set_birthday(&self, id: SubscriberId, birthday: Option<NaiveDate>) -> DbResult<()>;

    /// Subscribers whose birthday falls on the given month/day
    async fn with_birthday_on(&self, month: u32, day: u32) -> DbResult<Vec<SubscriberId>>;

    /// Set or clear the admin flag
    async fn set_admin(&self, id: SubscriberId, is_admin: bool) -> DbResult<()>;

    /// Set or clear the freeform note
    async fn set_note(&self, id: SubscriberId, note: Option<&str>) -> DbResult<()>;
}

/// Per-subscriber notification opt-outs. Everything defaults to on.
#[derive(Debug, Clone, Copy)]
pub struct NotificationSettings {
    pub daily_reports: bool,
    pub expiry_warnings: bool,
    pub data_warnings_primary: bool,
    pub data_warnings_secondary: bool,
}

impl NotificationSettings {
    /// Whether low-data warnings are enabled for the given panel.
    pub fn data_warnings_for(&self, panel: PanelKind) -> bool {
        match panel {
            PanelKind::Primary => self.data_warnings_primary,
            PanelKind::Secondary => self.data_warnings_secondary,
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            daily_reports: true,
            expiry_warnings: true,
            data_warnings_primary: true,
            data_warnings_secondary: true,
        }
    }
}

/// The settings a subscriber can toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSetting {
    DailyReports,
    ExpiryWarnings,
    DataWarnings(PanelKind),
}

/// Account repository trait
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Register a panel identity for a subscriber
    async fn register(&self, account: RegisterAccount) -> DbResult<AccountRow>;

    /// Find an account by id
    async fn find_by_id(&self, id: AccountId) -> DbResult<Option<AccountRow>>;

    /// Find an active account by shared UUID
    async fn find_by_uuid(&self, uuid: Uuid) -> DbResult<Option<AccountRow>>;

    /// Find an active account by secondary-panel username
    async fn find_by_panel_name(&self, name: &str) -> DbResult<Option<AccountRow>>;

    /// All active accounts
    async fn list_active(&self) -> DbResult<Vec<AccountRow>>;

    /// Active accounts owned by a subscriber
    async fn list_for_subscriber(&self, id: SubscriberId) -> DbResult<Vec<AccountRow>>;

    /// Soft-delete the account and hard-delete its dependent snapshot and
    /// warning rows. Payment history is kept.
    async fn deactivate(&self, id: AccountId) -> DbResult<()>;

    /// Record the first time the subscriber was observed online
    async fn set_first_seen_online(&self, id: AccountId, at: DateTime<Utc>) -> DbResult<()>;

    /// Mark the one-time welcome as sent
    async fn mark_welcomed(&self, id: AccountId) -> DbResult<()>;
}

/// Register account input
#[derive(Debug, Clone)]
pub struct RegisterAccount {
    pub subscriber_id: SubscriberId,
    pub uuid: Option<Uuid>,
    pub panel_name: Option<String>,
    pub label: String,
}

/// Snapshot repository trait
///
/// The snapshot table is append-only sensor data: one row per account per
/// collection tick, deleted only by the retention paths (`purge_since` after
/// nightly reporting or a usage reset, `purge_all` on account removal).
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Append one sample
    async fn append(
        &self,
        account: AccountId,
        primary_gb: f64,
        secondary_gb: f64,
        taken_at: DateTime<Utc>,
    ) -> DbResult<()>;

    /// Per-panel usage accrued since `since`, clamped at zero
    async fn usage_since(&self, account: AccountId, since: DateTime<Utc>) -> DbResult<DailyUsage>;

    /// Usage accrued in the window starting at `since` for one panel,
    /// differencing the boundary samples, clamped at zero
    async fn window_usage(
        &self,
        account: AccountId,
        panel: PanelKind,
        since: DateTime<Utc>,
    ) -> DbResult<f64>;

    /// `usage_since` for every account with samples in the window, as one
    /// grouped query
    async fn usage_since_all(&self, since: DateTime<Utc>)
        -> DbResult<HashMap<AccountId, DailyUsage>>;

    /// Delete samples taken at or after `since`; returns rows removed
    async fn purge_since(&self, account: AccountId, since: DateTime<Utc>) -> DbResult<u64>;

    /// Delete every sample for the account; returns rows removed
    async fn purge_all(&self, account: AccountId) -> DbResult<u64>;
}

/// Warning dedup log repository trait
#[async_trait]
pub trait WarningRepository: Send + Sync {
    /// Whether `kind` fired for `account` within the trailing `window`
    async fn has_recent(
        &self,
        account: AccountId,
        kind: WarningKind,
        window: Duration,
    ) -> DbResult<bool>;

    /// Record that `kind` fired at `sent_at` (upsert; repeated firings
    /// refresh the timestamp)
    async fn log(&self, account: AccountId, kind: WarningKind, sent_at: DateTime<Utc>)
        -> DbResult<()>;
}

/// Payment repository trait
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Record a payment
    async fn record(&self, account: AccountId, paid_at: DateTime<Utc>) -> DbResult<()>;

    /// Payment history for one account, newest first
    async fn history(&self, account: AccountId) -> DbResult<Vec<PaymentRow>>;

    /// Latest payment per active account
    async fn latest_per_account(&self) -> DbResult<Vec<(AccountId, DateTime<Utc>)>>;
}
