//! Shared test harness: stub panels, a recording notifier, throwaway
//! database.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use tandem_core::{CoreConfig, Notice, Notifier, NotifyError, ReconcilerService, UsageService};
use tandem_db::{create_pool, AccountRepository, RegisterAccount, Repositories, SubscriberRepository};
use tandem_panel::{ListingCache, ListingCacheConfig, PanelApi, PanelError, PanelResult};
use tandem_types::{
    AccountId, PanelKind, PanelRecord, SubscriberId, SubscriberKey, UserDelta,
};

/// A panel backed by an in-memory record list, with a failure switch and a
/// call journal.
pub struct StubPanel {
    kind: PanelKind,
    pub records: Mutex<Vec<PanelRecord>>,
    pub fail: AtomicBool,
    pub calls: Mutex<Vec<String>>,
}

impl StubPanel {
    pub fn new(kind: PanelKind, records: Vec<PanelRecord>) -> Self {
        Self {
            kind,
            records: Mutex::new(records),
            fail: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn check_fail(&self) -> PanelResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(PanelError::Status { status: 503 })
        } else {
            Ok(())
        }
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn matches(record: &PanelRecord, key: &SubscriberKey) -> bool {
        match key {
            SubscriberKey::Uuid(uuid) => record.uuid == Some(*uuid),
            SubscriberKey::Name(name) => &record.name == name,
        }
    }
}

#[async_trait]
impl PanelApi for StubPanel {
    fn kind(&self) -> PanelKind {
        self.kind
    }

    async fn get_user(&self, key: &SubscriberKey) -> PanelResult<Option<PanelRecord>> {
        self.check_fail()?;
        self.log(format!("get:{key}"));
        let records = self.records.lock().unwrap();
        Ok(records.iter().find(|r| Self::matches(r, key)).cloned())
    }

    async fn list_users(&self) -> PanelResult<Vec<PanelRecord>> {
        self.check_fail()?;
        self.log("list".to_string());
        Ok(self.records.lock().unwrap().clone())
    }

    async fn modify_user(&self, key: &SubscriberKey, delta: UserDelta) -> PanelResult<()> {
        self.check_fail()?;
        self.log(format!("modify:{key}:{}:{}", delta.add_gb, delta.add_days));
        Ok(())
    }

    async fn delete_user(&self, key: &SubscriberKey) -> PanelResult<()> {
        self.check_fail()?;
        self.log(format!("delete:{key}"));
        let mut records = self.records.lock().unwrap();
        records.retain(|r| !Self::matches(r, key));
        Ok(())
    }

    async fn reset_usage(&self, key: &SubscriberKey) -> PanelResult<()> {
        self.check_fail()?;
        self.log(format!("reset:{key}"));
        Ok(())
    }
}

/// Records every dispatched notice.
#[derive(Default)]
pub struct RecordingNotifier {
    pub subscriber_notices: Mutex<Vec<(SubscriberId, String)>>,
    pub admin_notices: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_notices.lock().unwrap().len()
    }

    pub fn admin_count(&self) -> usize {
        self.admin_notices.lock().unwrap().len()
    }
}

fn notice_tag(notice: &Notice) -> String {
    match notice {
        Notice::Welcome { .. } => "welcome".to_string(),
        Notice::ExpiryApproaching { days_left, .. } => format!("expiry:{days_left}"),
        Notice::LowData { panel, .. } => format!("low_data:{panel}"),
        Notice::UsageSpike { .. } => "usage_spike".to_string(),
        Notice::BirthdayGift { .. } => "birthday".to_string(),
        Notice::DailyReport(_) => "daily_report".to_string(),
        Notice::AdminReport(_) => "admin_report".to_string(),
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_subscriber(
        &self,
        subscriber: SubscriberId,
        notice: Notice,
    ) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError("dispatch disabled".into()));
        }
        self.subscriber_notices
            .lock()
            .unwrap()
            .push((subscriber, notice_tag(&notice)));
        Ok(())
    }

    async fn notify_admins(&self, notice: Notice) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError("dispatch disabled".into()));
        }
        self.admin_notices.lock().unwrap().push(notice_tag(&notice));
        Ok(())
    }
}

/// Everything a core test needs, wired against a throwaway database.
pub struct Harness {
    pub repos: Repositories,
    pub pool: tandem_db::DbPool,
    pub primary: Arc<StubPanel>,
    pub secondary: Arc<StubPanel>,
    pub usage: Arc<UsageService>,
    pub reconciler: Arc<ReconcilerService>,
    pub config: Arc<CoreConfig>,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub async fn new(
        config: CoreConfig,
        primary_records: Vec<PanelRecord>,
        secondary_records: Vec<PanelRecord>,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("core.db").display());
        let pool = create_pool(&url).await.unwrap();
        let repos = Repositories::new(pool.clone());

        let config = Arc::new(config);
        let primary = Arc::new(StubPanel::new(PanelKind::Primary, primary_records));
        let secondary = Arc::new(StubPanel::new(PanelKind::Secondary, secondary_records));
        let usage = Arc::new(UsageService::new(repos.clone(), config.clone()));
        let reconciler = Arc::new(ReconcilerService::new(
            primary.clone(),
            secondary.clone(),
            ListingCache::new(ListingCacheConfig::default()),
            repos.clone(),
            usage.clone(),
        ));

        Self {
            repos,
            pool,
            primary,
            secondary,
            usage,
            reconciler,
            config,
            _dir: dir,
        }
    }

    /// Register a subscriber with one account and return both ids.
    pub async fn register_account(
        &self,
        uuid: Option<Uuid>,
        panel_name: Option<&str>,
    ) -> (SubscriberId, AccountId) {
        let subscriber = self.repos.subscribers.create("tester").await.unwrap();
        let account = self
            .repos
            .accounts
            .register(RegisterAccount {
                subscriber_id: subscriber.subscriber_id(),
                uuid,
                panel_name: panel_name.map(str::to_string),
                label: "main".to_string(),
            })
            .await
            .unwrap();
        (subscriber.subscriber_id(), account.account_id())
    }
}

/// A config whose local offset puts "now" at roughly local noon, so samples
/// taken a few hours ago always land inside the current local day.
pub fn midday_config() -> CoreConfig {
    use chrono::{FixedOffset, Timelike};
    let utc_hour = Utc::now().hour() as i32;
    let offset_hours = 12 - utc_hour;
    CoreConfig {
        local_offset: FixedOffset::east_opt(offset_hours * 3600).unwrap(),
        ..CoreConfig::default()
    }
}

/// A minimal panel record.
pub fn record(
    name: &str,
    uuid: Option<Uuid>,
    used: f64,
    limit: f64,
    active: bool,
    expire: Option<i64>,
) -> PanelRecord {
    PanelRecord {
        name: name.to_string(),
        uuid,
        active,
        usage_used_gb: used,
        usage_limit_gb: limit,
        last_seen: Some(Utc::now()),
        expire_days: expire,
    }
}
