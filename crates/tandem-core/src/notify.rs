//! Outbound notification seam
//!
//! The core decides *when* something is worth telling a subscriber or an
//! admin; *how* it is worded and delivered belongs to the collaborator layer
//! (the bot, the dashboard). [`Notice`] is the typed payload crossing that
//! seam.

use async_trait::async_trait;
use thiserror::Error;

use tandem_types::{PanelKind, SubscriberId, UserDelta};

use crate::reports::{AdminReport, SubscriberReport};

/// Delivery failure reported by the collaborator layer.
#[derive(Error, Debug)]
#[error("notification dispatch failed: {0}")]
pub struct NotifyError(pub String);

/// A typed notification payload. No message text here - rendering and
/// localization happen on the other side of the trait.
#[derive(Debug, Clone)]
pub enum Notice {
    /// First-connection welcome, sent once per account.
    Welcome { account_label: String },
    /// The account expires in `days_left` days.
    ExpiryApproaching {
        account_label: String,
        days_left: i64,
    },
    /// Remaining quota on one panel dropped below the warning threshold.
    LowData {
        account_label: String,
        panel: PanelKind,
        remaining_gb: f64,
    },
    /// Daily usage crossed the spike threshold (admin alert).
    UsageSpike {
        account_label: String,
        daily_gb: f64,
        threshold_gb: f64,
    },
    /// Birthday gift was applied to the subscriber's accounts.
    BirthdayGift { gift: UserDelta },
    /// Nightly per-subscriber report.
    DailyReport(SubscriberReport),
    /// Nightly aggregate for admins.
    AdminReport(AdminReport),
}

/// Outbound notification channel implemented by the collaborator layer.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notice to one subscriber.
    async fn notify_subscriber(
        &self,
        subscriber: SubscriberId,
        notice: Notice,
    ) -> Result<(), NotifyError>;

    /// Deliver a notice to every admin.
    async fn notify_admins(&self, notice: Notice) -> Result<(), NotifyError>;
}
