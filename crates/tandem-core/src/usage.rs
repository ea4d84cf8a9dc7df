//! Windowed usage figures over the snapshot history

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::instrument;

use tandem_db::{Repositories, SnapshotRepository};
use tandem_types::{AccountId, DailyUsage, PanelKind};

use crate::config::CoreConfig;
use crate::error::CoreResult;

/// The trailing windows short-horizon reporting asks for, in hours.
pub const TRAILING_WINDOW_HOURS: [i64; 4] = [3, 6, 12, 24];

/// Read-side of the snapshot store: daily and trailing-window usage.
pub struct UsageService {
    repos: Repositories,
    config: Arc<CoreConfig>,
}

impl UsageService {
    pub fn new(repos: Repositories, config: Arc<CoreConfig>) -> Self {
        Self { repos, config }
    }

    /// Usage accrued since local midnight, split per panel.
    ///
    /// An account with no samples today reads as zero, not as an error.
    #[instrument(skip(self), level = "debug")]
    pub async fn daily_usage(&self, account: AccountId) -> CoreResult<DailyUsage> {
        let midnight = self.config.local_midnight_utc(Utc::now());
        Ok(self.repos.snapshots.usage_since(account, midnight).await?)
    }

    /// Usage accrued in each trailing window for one panel.
    #[instrument(skip(self), level = "debug")]
    pub async fn windowed_usage(
        &self,
        account: AccountId,
        panel: PanelKind,
    ) -> CoreResult<BTreeMap<i64, f64>> {
        let now = Utc::now();
        let mut windows = BTreeMap::new();
        for hours in TRAILING_WINDOW_HOURS {
            let since = now - Duration::hours(hours);
            let used = self.repos.snapshots.window_usage(account, panel, since).await?;
            windows.insert(hours, used);
        }
        Ok(windows)
    }

    /// Daily usage for every account with samples today, as one grouped
    /// query. Used by nightly reporting instead of a query per subscriber.
    pub async fn daily_usage_all(&self) -> CoreResult<HashMap<AccountId, DailyUsage>> {
        let midnight = self.config.local_midnight_utc(Utc::now());
        Ok(self.repos.snapshots.usage_since_all(midnight).await?)
    }

    /// Drop the current day's samples for an account.
    ///
    /// Required side effect of any usage reset: same-day samples taken
    /// before the reset would otherwise make `max - min` report the
    /// pre-reset peak for the rest of the day.
    pub async fn purge_today(&self, account: AccountId) -> CoreResult<u64> {
        let midnight = self.config.local_midnight_utc(Utc::now());
        Ok(self.repos.snapshots.purge_since(account, midnight).await?)
    }
}
