//! Operational notifier
//!
//! The conversational bot and the dashboard own user-visible wording; this
//! service ships with a notifier that surfaces every notice through the
//! structured log and the metrics exporter, which is what operators watch
//! when the bot transport is not wired in.

use async_trait::async_trait;
use tracing::info;

use tandem_core::{Notice, Notifier, NotifyError};
use tandem_types::SubscriberId;

/// Notifier that emits notices as structured log events.
pub struct TracingNotifier;

fn notice_kind(notice: &Notice) -> &'static str {
    match notice {
        Notice::Welcome { .. } => "welcome",
        Notice::ExpiryApproaching { .. } => "expiry",
        Notice::LowData { .. } => "low_data",
        Notice::UsageSpike { .. } => "usage_spike",
        Notice::BirthdayGift { .. } => "birthday_gift",
        Notice::DailyReport(_) => "daily_report",
        Notice::AdminReport(_) => "admin_report",
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify_subscriber(
        &self,
        subscriber: SubscriberId,
        notice: Notice,
    ) -> Result<(), NotifyError> {
        let kind = notice_kind(&notice);
        info!(subscriber = %subscriber, kind, notice = ?notice, "subscriber notice");
        metrics::counter!("notices_dispatched_total", "kind" => kind, "audience" => "subscriber")
            .increment(1);
        Ok(())
    }

    async fn notify_admins(&self, notice: Notice) -> Result<(), NotifyError> {
        let kind = notice_kind(&notice);
        info!(kind, notice = ?notice, "admin notice");
        metrics::counter!("notices_dispatched_total", "kind" => kind, "audience" => "admin")
            .increment(1);
        Ok(())
    }
}
