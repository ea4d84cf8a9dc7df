//! The background job loop
//!
//! One loop, one short tick, per-job cadence bookkeeping. Jobs run inline on
//! the tick (the loop is sequential, so a slow job simply delays the next
//! tick) and every job is fault-isolated: failures are logged and retried at
//! the next scheduled occasion, never propagated out of the loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tandem_db::{AccountRepository, DbPool, Repositories, SnapshotRepository};
use tandem_types::{CombinedUser, SubscriberKey};

use crate::config::CoreConfig;
use crate::error::CoreResult;
use crate::gifts::GiftService;
use crate::reconciler::ReconcilerService;
use crate::reports::ReportService;
use crate::warnings::{self, WarningService};

const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Drives the recurring jobs: hourly snapshots, periodic warning checks,
/// the nightly report, birthday gifts, and monthly storage maintenance.
pub struct Scheduler {
    reconciler: Arc<ReconcilerService>,
    warnings: Arc<WarningService>,
    reports: Arc<ReportService>,
    gifts: Arc<GiftService>,
    repos: Repositories,
    pool: DbPool,
    config: Arc<CoreConfig>,
    state: Mutex<JobState>,
}

impl Scheduler {
    pub fn new(
        reconciler: Arc<ReconcilerService>,
        warnings: Arc<WarningService>,
        reports: Arc<ReportService>,
        gifts: Arc<GiftService>,
        repos: Repositories,
        pool: DbPool,
        config: Arc<CoreConfig>,
    ) -> Self {
        let local_now = Utc::now().with_timezone(&config.local_offset);
        let state = Mutex::new(JobState::at_start(local_now, &config));
        Self {
            reconciler,
            warnings,
            reports,
            gifts,
            repos,
            pool,
            config,
            state,
        }
    }

    /// Run until `shutdown` is cancelled. Cancellation stops scheduling new
    /// ticks; a job already in flight finishes within its own call timeouts.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("scheduler started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("scheduler stopped");
                    return;
                }

                _ = interval.tick() => {
                    self.tick(Utc::now()).await;
                }
            }
        }
    }

    /// Evaluate cadences at `now` and run whatever is due.
    pub async fn tick(&self, now: DateTime<Utc>) {
        let local = now.with_timezone(&self.config.local_offset);

        if self.claim(|state| state.claim_snapshot(local, self.config.snapshot_minute)).await {
            self.run_job("snapshots", self.collect_snapshots()).await;
        }
        if self
            .claim(|state| state.claim_warnings(now, self.config.warning_check_hours))
            .await
        {
            self.run_job("warnings", self.run_warning_checks()).await;
        }
        if self.claim(|state| state.claim_report(local, self.config.report_time)).await {
            self.run_job("nightly_report", self.run_nightly_report()).await;
        }
        if self.claim(|state| state.claim_gifts(local, self.config.gift_time)).await {
            self.run_job("birthday_gifts", self.run_birthday_gifts(local.date_naive()))
                .await;
        }
        if self
            .claim(|state| {
                state.claim_maintenance(
                    local,
                    self.config.maintenance_day,
                    self.config.maintenance_time,
                )
            })
            .await
        {
            self.run_job("maintenance", self.run_maintenance()).await;
        }
    }

    async fn claim(&self, claim: impl FnOnce(&mut JobState) -> bool) -> bool {
        let mut state = self.state.lock().await;
        claim(&mut state)
    }

    /// A job failure is logged and counted; the loop carries on. The job
    /// runs again at its next scheduled occasion.
    async fn run_job(&self, name: &'static str, job: impl std::future::Future<Output = CoreResult<usize>>) {
        match job.await {
            Ok(touched) => info!(job = name, touched, "scheduler job finished"),
            Err(err) => {
                error!(job = name, error = %err, "scheduler job failed");
                metrics::counter!("scheduler_job_failures_total", "job" => name).increment(1);
            }
        }
    }

    /// Append one usage sample per registered account from the live
    /// reconciled listing. Pure sensor data: every tick writes one row per
    /// account even when nothing changed, which keeps downstream
    /// differencing trivial and makes vendor resets visible.
    pub async fn collect_snapshots(&self) -> CoreResult<usize> {
        let users = self.reconciler.all_users().await?;
        let by_key: HashMap<SubscriberKey, &CombinedUser> =
            users.iter().map(|user| (user.key(), user)).collect();

        let accounts = self.repos.accounts.list_active().await?;
        let now = Utc::now();
        let mut written = 0;

        for account in accounts {
            let Some(combined) = warnings::lookup(&account, &by_key) else {
                continue;
            };
            let primary = combined.primary.as_ref().map_or(0.0, |r| r.usage_used_gb);
            let secondary = combined.secondary.as_ref().map_or(0.0, |r| r.usage_used_gb);

            match self
                .repos
                .snapshots
                .append(account.account_id(), primary, secondary, now)
                .await
            {
                Ok(()) => written += 1,
                Err(err) => {
                    // one broken account must not starve the rest
                    warn!(account = %account.account_id(), error = %err, "snapshot append failed");
                }
            }
        }

        metrics::counter!("snapshots_recorded_total").increment(written as u64);
        Ok(written)
    }

    async fn run_warning_checks(&self) -> CoreResult<usize> {
        let users = self.reconciler.all_users().await?;
        self.warnings.evaluate_all(&users).await
    }

    async fn run_nightly_report(&self) -> CoreResult<usize> {
        let users = self.reconciler.all_users().await?;
        self.reports.nightly_run(&users).await
    }

    async fn run_birthday_gifts(&self, local_date: NaiveDate) -> CoreResult<usize> {
        self.gifts.run_for_date(local_date).await
    }

    async fn run_maintenance(&self) -> CoreResult<usize> {
        tandem_db::vacuum(&self.pool)
            .await
            .map_err(tandem_db::DbError::from)?;
        Ok(1)
    }
}

/// Cadence bookkeeping. Claiming marks the job as run for its period before
/// the job executes, so a failing job waits for its next period instead of
/// hammering every tick.
#[derive(Debug)]
struct JobState {
    last_snapshot: Option<(NaiveDate, u32)>,
    last_warnings: DateTime<Utc>,
    last_report: Option<NaiveDate>,
    last_gift: Option<NaiveDate>,
    last_maintenance: Option<(i32, u32)>,
}

impl JobState {
    /// Initial state at process start. Wall-clock jobs whose time already
    /// passed today are marked done so a restart does not re-fire them.
    fn at_start(local_now: DateTime<FixedOffset>, config: &CoreConfig) -> Self {
        let today = local_now.date_naive();
        Self {
            last_snapshot: None,
            last_warnings: local_now.with_timezone(&Utc),
            last_report: (local_now.time() >= config.report_time).then_some(today),
            last_gift: (local_now.time() >= config.gift_time).then_some(today),
            last_maintenance: (local_now.day() > config.maintenance_day
                || (local_now.day() == config.maintenance_day
                    && local_now.time() >= config.maintenance_time))
                .then(|| (today.year(), today.month())),
        }
    }

    /// Hourly, once the configured minute offset has passed.
    fn claim_snapshot(&mut self, local_now: DateTime<FixedOffset>, minute: u32) -> bool {
        if local_now.minute() < minute {
            return false;
        }
        let stamp = (local_now.date_naive(), local_now.hour());
        if self.last_snapshot == Some(stamp) {
            return false;
        }
        self.last_snapshot = Some(stamp);
        true
    }

    /// Every K hours, measured from the previous run.
    fn claim_warnings(&mut self, now: DateTime<Utc>, every_hours: i64) -> bool {
        if now - self.last_warnings < chrono::Duration::hours(every_hours.max(1)) {
            return false;
        }
        self.last_warnings = now;
        true
    }

    /// Once per local day, at or after the configured time.
    fn claim_report(&mut self, local_now: DateTime<FixedOffset>, at: NaiveTime) -> bool {
        let today = local_now.date_naive();
        if local_now.time() < at || self.last_report == Some(today) {
            return false;
        }
        self.last_report = Some(today);
        true
    }

    fn claim_gifts(&mut self, local_now: DateTime<FixedOffset>, at: NaiveTime) -> bool {
        let today = local_now.date_naive();
        if local_now.time() < at || self.last_gift == Some(today) {
            return false;
        }
        self.last_gift = Some(today);
        true
    }

    /// Once per month, on the configured day at the configured time.
    fn claim_maintenance(
        &mut self,
        local_now: DateTime<FixedOffset>,
        day: u32,
        at: NaiveTime,
    ) -> bool {
        if local_now.day() != day || local_now.time() < at {
            return false;
        }
        let stamp = (local_now.year(), local_now.month());
        if self.last_maintenance == Some(stamp) {
            return false;
        }
        self.last_maintenance = Some(stamp);
        true
    }
}
