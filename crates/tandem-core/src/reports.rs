//! Nightly reporting
//!
//! Builds one report per subscriber plus an aggregate for admins, then
//! purges the reported day's snapshots so the next accounting day starts
//! clean. Report payloads are structured data; formatting belongs to the
//! collaborator behind the [`Notifier`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use tandem_db::{
    AccountRepository, Repositories, SnapshotRepository, SubscriberRepository,
};
use tandem_types::{AccountId, CombinedUser, DailyUsage, SubscriberId, SubscriberKey};

use crate::config::CoreConfig;
use crate::error::CoreResult;
use crate::notify::{Notice, Notifier};
use crate::usage::UsageService;

/// A subscriber is "online" in the aggregate when last seen within this
/// window.
const ONLINE_WINDOW_MINUTES: i64 = 3;

/// One account line in a subscriber's nightly report.
#[derive(Debug, Clone)]
pub struct AccountReport {
    pub label: String,
    pub name: String,
    pub active: bool,
    pub usage_used_gb: f64,
    pub usage_limit_gb: f64,
    pub expire_days: Option<i64>,
    pub daily: DailyUsage,
}

/// Nightly report for one subscriber.
#[derive(Debug, Clone)]
pub struct SubscriberReport {
    pub subscriber: SubscriberId,
    pub accounts: Vec<AccountReport>,
}

/// Nightly aggregate for admins.
#[derive(Debug, Clone)]
pub struct AdminReport {
    pub total_accounts: usize,
    pub active_accounts: usize,
    pub online_now: usize,
    pub total_daily_gb: f64,
}

/// Builds and dispatches the nightly reports.
pub struct ReportService {
    repos: Repositories,
    usage: Arc<UsageService>,
    notifier: Arc<dyn Notifier>,
    config: Arc<CoreConfig>,
}

impl ReportService {
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

    /// Run the nightly pass over the reconciled listing.
    ///
    /// Returns the number of subscriber reports dispatched. Per-subscriber
    /// failures are logged and skipped.
    pub async fn nightly_run(&self, users: &[CombinedUser]) -> CoreResult<usize> {
        if users.is_empty() {
            warn!("no reconciled users available, skipping nightly reports");
            return Ok(0);
        }

        let by_key: HashMap<SubscriberKey, &CombinedUser> =
            users.iter().map(|user| (user.key(), user)).collect();
        let daily = self.usage.daily_usage_all().await?;

        // Admin aggregate first, while today's snapshots still exist.
        let aggregate = build_aggregate(users, &daily);
        if let Err(err) = self.notifier.notify_admins(Notice::AdminReport(aggregate)).await {
            warn!(error = %err, "admin report dispatch failed");
        }

        let subscribers = self.repos.subscribers.list_all().await?;
        let mut sent = 0;

        for subscriber in subscribers {
            let id = subscriber.subscriber_id();
            match self.report_subscriber(id, &by_key, &daily).await {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(subscriber = %id, error = %err, "nightly report failed for subscriber");
                }
            }
        }

        info!(sent, "nightly reports dispatched");
        Ok(sent)
    }

    /// Build, send and clean up after one subscriber's report. Returns
    /// whether a report went out.
    async fn report_subscriber(
        &self,
        id: SubscriberId,
        by_key: &HashMap<SubscriberKey, &CombinedUser>,
        daily: &HashMap<AccountId, DailyUsage>,
    ) -> CoreResult<bool> {
        let settings = self.repos.subscribers.settings(id).await?;
        if !settings.daily_reports {
            return Ok(false);
        }

        let accounts = self.repos.accounts.list_for_subscriber(id).await?;
        if accounts.is_empty() {
            return Ok(false);
        }

        let mut lines = Vec::new();
        for account in &accounts {
            let key = match account.uuid() {
                Some(uuid) => SubscriberKey::Uuid(uuid),
                None => match &account.panel_name {
                    Some(name) => SubscriberKey::Name(name.clone()),
                    None => continue,
                },
            };
            let Some(combined) = by_key.get(&key) else {
                continue;
            };
            lines.push(AccountReport {
                label: account.label.clone(),
                name: combined.name.clone(),
                active: combined.active,
                usage_used_gb: combined.usage_used_gb,
                usage_limit_gb: combined.usage_limit_gb,
                expire_days: combined.expire_days,
                daily: daily.get(&account.account_id()).copied().unwrap_or_default(),
            });
        }

        if lines.is_empty() {
            return Ok(false);
        }

        let dispatched = self
            .notifier
            .notify_subscriber(
                id,
                Notice::DailyReport(SubscriberReport {
                    subscriber: id,
                    accounts: lines,
                }),
            )
            .await
            .is_ok();

        if dispatched {
            // The reported day is closed: purge its samples so tomorrow's
            // window starts clean.
            let midnight = self.config.local_midnight_utc(Utc::now());
            for account in &accounts {
                if let Err(err) = self
                    .repos
                    .snapshots
                    .purge_since(account.account_id(), midnight)
                    .await
                {
                    warn!(account = %account.account_id(), error = %err, "post-report snapshot purge failed");
                }
            }
        }

        Ok(dispatched)
    }
}

fn build_aggregate(users: &[CombinedUser], daily: &HashMap<AccountId, DailyUsage>) -> AdminReport {
    let now = Utc::now();
    let online_cutoff = now - Duration::minutes(ONLINE_WINDOW_MINUTES);

    AdminReport {
        total_accounts: users.len(),
        active_accounts: users.iter().filter(|user| user.active).count(),
        online_now: users
            .iter()
            .filter(|user| user.last_seen.is_some_and(|seen| seen >= online_cutoff))
            .count(),
        total_daily_gb: daily.values().map(DailyUsage::total_gb).sum(),
    }
}
