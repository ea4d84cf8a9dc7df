//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive.
//! UUIDs are stored as text; rows expose a parse helper rather than failing
//! the whole query on one bad value.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use tandem_types::{AccountId, SubscriberId};

/// Subscriber row: one bot customer.
#[derive(Debug, Clone, FromRow)]
pub struct SubscriberRow {
    pub id: i64,
    pub display_name: String,
    pub birthday: Option<NaiveDate>,
    pub daily_reports: bool,
    pub expiry_warnings: bool,
    pub data_warnings_primary: bool,
    pub data_warnings_secondary: bool,
    pub is_admin: bool,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SubscriberRow {
    pub fn subscriber_id(&self) -> SubscriberId {
        SubscriberId(self.id)
    }
}

/// Account row: one registered panel identity owned by a subscriber.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: i64,
    pub subscriber_id: i64,
    pub uuid: Option<String>,
    pub panel_name: Option<String>,
    pub label: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub first_seen_online: Option<DateTime<Utc>>,
    pub welcomed: bool,
}

impl AccountRow {
    pub fn account_id(&self) -> AccountId {
        AccountId(self.id)
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        SubscriberId(self.subscriber_id)
    }

    /// The shared UUID identity, when present and well-formed.
    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid.as_deref().and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

/// One usage snapshot: cumulative per-panel counters at a point in time.
#[derive(Debug, Clone, FromRow)]
pub struct SnapshotRow {
    pub id: i64,
    pub account_id: i64,
    pub primary_gb: f64,
    pub secondary_gb: f64,
    pub taken_at: DateTime<Utc>,
}

/// One entry in the warning dedup log.
#[derive(Debug, Clone, FromRow)]
pub struct WarningRow {
    pub id: i64,
    pub account_id: i64,
    pub kind: String,
    pub sent_at: DateTime<Utc>,
}

/// One recorded payment.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub id: i64,
    pub account_id: i64,
    pub paid_at: DateTime<Utc>,
}
