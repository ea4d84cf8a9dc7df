//! Warning evaluation
//!
//! Walks every active account, compares the live reconciled view against the
//! configured thresholds, and dispatches notices through the [`Notifier`] -
//! gated by the dedup log so at-least-once scheduling never turns into
//! repeated nagging. A warning is logged only after its notice was actually
//! delivered; a failed delivery retries naturally on the next evaluation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, warn};

use tandem_db::{
    AccountRepository, AccountRow, NotificationSettings, Repositories, SubscriberRepository,
    WarningRepository,
};
use tandem_types::{CombinedUser, PanelKind, SubscriberKey, WarningKind};

use crate::config::CoreConfig;
use crate::error::CoreResult;
use crate::notify::{Notice, Notifier};
use crate::usage::UsageService;

/// Evaluates warning conditions for all active accounts.
pub struct WarningService {
    repos: Repositories,
    usage: Arc<UsageService>,
    notifier: Arc<dyn Notifier>,
    config: Arc<CoreConfig>,
}

impl WarningService {
    pub fn new(
        repos: Repositories,
        usage: Arc<UsageService>,
        notifier: Arc<dyn Notifier>,
        config: Arc<CoreConfig>,
    ) -> Self {
        Self {
            repos,
            usage,
            notifier,
            config,
        }
    }

    /// Evaluate every active account against the reconciled listing.
    ///
    /// One account's failure is logged and skipped; the pass always covers
    /// the rest. Returns the number of notices sent.
    pub async fn evaluate_all(&self, users: &[CombinedUser]) -> CoreResult<usize> {
        let by_key: HashMap<SubscriberKey, &CombinedUser> =
            users.iter().map(|user| (user.key(), user)).collect();

        let accounts = self.repos.accounts.list_active().await?;
        let mut sent = 0;

        for account in accounts {
            match self.evaluate_account(&account, &by_key).await {
                Ok(count) => sent += count,
                Err(err) => {
                    warn!(account = %account.account_id(), error = %err, "warning evaluation failed for account");
                    metrics::counter!("warning_evaluation_failures_total").increment(1);
                }
            }
        }

        metrics::counter!("warnings_sent_total").increment(sent as u64);
        Ok(sent)
    }

    async fn evaluate_account(
        &self,
        account: &AccountRow,
        by_key: &HashMap<SubscriberKey, &CombinedUser>,
    ) -> CoreResult<usize> {
        let Some(combined) = lookup(account, by_key) else {
            debug!(account = %account.account_id(), "no live panel data, skipping");
            return Ok(0);
        };

        let settings = self.repos.subscribers.settings(account.subscriber_id()).await?;
        let mut sent = 0;

        sent += self.check_welcome(account, combined).await?;
        sent += self.check_expiry(account, combined, &settings).await?;
        sent += self.check_low_data(account, combined, &settings).await?;
        sent += self.check_usage_spike(account, combined).await?;

        Ok(sent)
    }

    /// Welcome flow: record the first observed connection, then send the
    /// one-time welcome once the configured delay has passed.
    async fn check_welcome(
        &self,
        account: &AccountRow,
        combined: &CombinedUser,
    ) -> CoreResult<usize> {
        let now = Utc::now();

        if combined.last_seen.is_some() && account.first_seen_online.is_none() {
            self.repos
                .accounts
                .set_first_seen_online(account.account_id(), now)
                .await?;
            return Ok(0);
        }

        let Some(first_seen) = account.first_seen_online else {
            return Ok(0);
        };
        if account.welcomed
            || now - first_seen < Duration::hours(self.config.welcome_delay_hours)
        {
            return Ok(0);
        }

        if self
            .notifier
            .notify_subscriber(
                account.subscriber_id(),
                Notice::Welcome {
                    account_label: account.label.clone(),
                },
            )
            .await
            .is_ok()
        {
            // flagged only after a successful dispatch, so a failed send
            // retries on the next evaluation pass
            self.repos.accounts.mark_welcomed(account.account_id()).await?;
            return Ok(1);
        }
        Ok(0)
    }

    async fn check_expiry(
        &self,
        account: &AccountRow,
        combined: &CombinedUser,
        settings: &NotificationSettings,
    ) -> CoreResult<usize> {
        if !settings.expiry_warnings {
            return Ok(0);
        }
        let Some(days_left) = combined.expire_days else {
            return Ok(0);
        };
        if !(0..=self.config.expiry_warn_days).contains(&days_left) {
            return Ok(0);
        }

        let kind = WarningKind::Expiry;
        if self
            .repos
            .warnings
            .has_recent(account.account_id(), kind, self.config.renotify_window(kind))
            .await?
        {
            return Ok(0);
        }

        if self
            .notifier
            .notify_subscriber(
                account.subscriber_id(),
                Notice::ExpiryApproaching {
                    account_label: account.label.clone(),
                    days_left,
                },
            )
            .await
            .is_ok()
        {
            self.repos
                .warnings
                .log(account.account_id(), kind, Utc::now())
                .await?;
            return Ok(1);
        }
        Ok(0)
    }

    async fn check_low_data(
        &self,
        account: &AccountRow,
        combined: &CombinedUser,
        settings: &NotificationSettings,
    ) -> CoreResult<usize> {
        let mut sent = 0;
        for panel in PanelKind::all() {
            if !settings.data_warnings_for(panel) {
                continue;
            }
            let Some(record) = combined.panel(panel) else {
                continue;
            };
            if record.usage_limit_gb <= 0.0
                || record.usage_percent() < self.config.data_warn_percent
            {
                continue;
            }

            let kind = WarningKind::LowData(panel);
            if self
                .repos
                .warnings
                .has_recent(account.account_id(), kind, self.config.renotify_window(kind))
                .await?
            {
                continue;
            }

            if self
                .notifier
                .notify_subscriber(
                    account.subscriber_id(),
                    Notice::LowData {
                        account_label: account.label.clone(),
                        panel,
                        remaining_gb: record.remaining_gb(),
                    },
                )
                .await
                .is_ok()
            {
                self.repos
                    .warnings
                    .log(account.account_id(), kind, Utc::now())
                    .await?;
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Unusual daily usage goes to the admins, not the subscriber.
    async fn check_usage_spike(
        &self,
        account: &AccountRow,
        _combined: &CombinedUser,
    ) -> CoreResult<usize> {
        if self.config.daily_spike_gb <= 0.0 {
            return Ok(0);
        }

        let daily = self.usage.daily_usage(account.account_id()).await?;
        if daily.total_gb() < self.config.daily_spike_gb {
            return Ok(0);
        }

        let kind = WarningKind::UsageSpike;
        if self
            .repos
            .warnings
            .has_recent(account.account_id(), kind, self.config.renotify_window(kind))
            .await?
        {
            return Ok(0);
        }

        if self
            .notifier
            .notify_admins(Notice::UsageSpike {
                account_label: account.label.clone(),
                daily_gb: daily.total_gb(),
                threshold_gb: self.config.daily_spike_gb,
            })
            .await
            .is_ok()
        {
            self.repos
                .warnings
                .log(account.account_id(), kind, Utc::now())
                .await?;
            return Ok(1);
        }
        Ok(0)
    }
}

/// Match an account row to its reconciled view: UUID first, secondary
/// username as the fallback for never-linked accounts.
pub(crate) fn lookup<'a>(
    account: &AccountRow,
    by_key: &HashMap<SubscriberKey, &'a CombinedUser>,
) -> Option<&'a CombinedUser> {
    if let Some(uuid) = account.uuid() {
        if let Some(user) = by_key.get(&SubscriberKey::Uuid(uuid)) {
            return Some(*user);
        }
    }
    account
        .panel_name
        .as_ref()
        .and_then(|name| by_key.get(&SubscriberKey::Name(name.clone())))
        .copied()
}
