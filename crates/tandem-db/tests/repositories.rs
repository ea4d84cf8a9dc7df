//! Repository integration tests against a throwaway SQLite file.

use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use tandem_db::{
    create_pool, AccountRepository, NotificationSetting, PaymentRepository, RegisterAccount,
    Repositories, SnapshotRepository, SubscriberRepository, WarningRepository,
};
use tandem_types::{AccountId, PanelKind, SubscriberId, WarningKind};

struct TestDb {
    repos: Repositories,
    // dropped last, removing the database file
    _dir: tempfile::TempDir,
}

async fn test_db() -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("test.db").display());
    let pool = create_pool(&url).await.unwrap();
    TestDb {
        repos: Repositories::new(pool),
        _dir: dir,
    }
}

async fn seeded_account(repos: &Repositories) -> AccountId {
    let subscriber = repos.subscribers.create("tester").await.unwrap();
    let account = repos
        .accounts
        .register(RegisterAccount {
            subscriber_id: subscriber.subscriber_id(),
            uuid: Some(Uuid::new_v4()),
            panel_name: None,
            label: "main".to_string(),
        })
        .await
        .unwrap();
    account.account_id()
}

#[tokio::test]
async fn test_usage_since_differences_min_max() {
    let db = test_db().await;
    let account = seeded_account(&db.repos).await;
    let now = Utc::now();

    for (i, gb) in [10.0, 12.0, 15.0].iter().enumerate() {
        db.repos
            .snapshots
            .append(account, *gb, *gb / 2.0, now - Duration::hours(3 - i as i64))
            .await
            .unwrap();
    }

    let usage = db
        .repos
        .snapshots
        .usage_since(account, now - Duration::hours(12))
        .await
        .unwrap();
    assert_eq!(usage.primary_gb, 5.0);
    assert_eq!(usage.secondary_gb, 2.5);
}

#[tokio::test]
async fn test_usage_never_negative_after_counter_reset() {
    let db = test_db().await;
    let account = seeded_account(&db.repos).await;
    let now = Utc::now();

    // counter drops mid-window, simulating a vendor-side reset
    for (i, gb) in [40.0, 45.0, 2.0].iter().enumerate() {
        db.repos
            .snapshots
            .append(account, *gb, 0.0, now - Duration::hours(3 - i as i64))
            .await
            .unwrap();
    }

    let usage = db
        .repos
        .snapshots
        .usage_since(account, now - Duration::hours(12))
        .await
        .unwrap();
    // max-min would be 43, but the window query only promises >= 0 figures
    assert!(usage.primary_gb >= 0.0);

    let window = db
        .repos
        .snapshots
        .window_usage(account, PanelKind::Primary, now - Duration::hours(12))
        .await
        .unwrap();
    // boundary differencing: 2.0 - 40.0 clamps to zero
    assert_eq!(window, 0.0);
}

#[tokio::test]
async fn test_no_snapshots_yields_zero() {
    let db = test_db().await;
    let account = seeded_account(&db.repos).await;
    let since = Utc::now() - Duration::hours(24);

    let usage = db.repos.snapshots.usage_since(account, since).await.unwrap();
    assert_eq!(usage.total_gb(), 0.0);

    let window = db
        .repos
        .snapshots
        .window_usage(account, PanelKind::Secondary, since)
        .await
        .unwrap();
    assert_eq!(window, 0.0);
}

#[tokio::test]
async fn test_window_usage_uses_boundary_samples() {
    let db = test_db().await;
    let account = seeded_account(&db.repos).await;
    let now = Utc::now();

    // old sample outside the window must not contribute
    db.repos
        .snapshots
        .append(account, 1.0, 0.0, now - Duration::hours(30))
        .await
        .unwrap();
    db.repos
        .snapshots
        .append(account, 8.0, 0.0, now - Duration::hours(5))
        .await
        .unwrap();
    db.repos
        .snapshots
        .append(account, 11.0, 0.0, now - Duration::hours(1))
        .await
        .unwrap();

    let window = db
        .repos
        .snapshots
        .window_usage(account, PanelKind::Primary, now - Duration::hours(6))
        .await
        .unwrap();
    assert_eq!(window, 3.0);
}

#[tokio::test]
async fn test_purge_resets_accounting() {
    let db = test_db().await;
    let account = seeded_account(&db.repos).await;
    let now = Utc::now();
    let since = now - Duration::hours(12);

    for (i, gb) in [10.0, 12.0, 15.0].iter().enumerate() {
        db.repos
            .snapshots
            .append(account, *gb, 0.0, now - Duration::hours(3 - i as i64))
            .await
            .unwrap();
    }

    let removed = db.repos.snapshots.purge_since(account, since).await.unwrap();
    assert_eq!(removed, 3);

    // a fresh post-reset sample reads as zero usage, not the old peak
    db.repos.snapshots.append(account, 0.0, 0.0, now).await.unwrap();
    let usage = db.repos.snapshots.usage_since(account, since).await.unwrap();
    assert_eq!(usage.total_gb(), 0.0);
}

#[tokio::test]
async fn test_usage_since_all_groups_by_account() {
    let db = test_db().await;
    let first = seeded_account(&db.repos).await;
    let second = seeded_account(&db.repos).await;
    let now = Utc::now();
    let since = now - Duration::hours(12);

    for (account, base) in [(first, 0.0), (second, 100.0)] {
        db.repos
            .snapshots
            .append(account, base, 0.0, now - Duration::hours(2))
            .await
            .unwrap();
        db.repos
            .snapshots
            .append(account, base + 4.0, 1.0, now - Duration::hours(1))
            .await
            .unwrap();
    }

    let all = db.repos.snapshots.usage_since_all(since).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[&first].primary_gb, 4.0);
    assert_eq!(all[&second].primary_gb, 4.0);
    assert_eq!(all[&second].secondary_gb, 1.0);
}

#[tokio::test]
async fn test_warning_dedup_window_boundary() {
    let db = test_db().await;
    let account = seeded_account(&db.repos).await;
    let window = StdDuration::from_secs(24 * 3600);

    assert!(!db
        .repos
        .warnings
        .has_recent(account, WarningKind::Expiry, window)
        .await
        .unwrap());

    db.repos
        .warnings
        .log(account, WarningKind::Expiry, Utc::now())
        .await
        .unwrap();
    assert!(db
        .repos
        .warnings
        .has_recent(account, WarningKind::Expiry, window)
        .await
        .unwrap());

    // a different kind is tracked independently
    assert!(!db
        .repos
        .warnings
        .has_recent(account, WarningKind::LowData(PanelKind::Primary), window)
        .await
        .unwrap());

    // backdate past the window: the warning may fire again
    db.repos
        .warnings
        .log(account, WarningKind::Expiry, Utc::now() - Duration::hours(25))
        .await
        .unwrap();
    assert!(!db
        .repos
        .warnings
        .has_recent(account, WarningKind::Expiry, window)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_warning_log_upserts_single_row() {
    let db = test_db().await;
    let account = seeded_account(&db.repos).await;

    db.repos
        .warnings
        .log(account, WarningKind::UsageSpike, Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    // second firing refreshes the same row rather than accumulating
    db.repos
        .warnings
        .log(account, WarningKind::UsageSpike, Utc::now())
        .await
        .unwrap();

    assert!(db
        .repos
        .warnings
        .has_recent(account, WarningKind::UsageSpike, StdDuration::from_secs(600))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_deactivate_drops_history_keeps_payments() {
    let db = test_db().await;
    let account = seeded_account(&db.repos).await;
    let now = Utc::now();

    db.repos.snapshots.append(account, 5.0, 0.0, now).await.unwrap();
    db.repos
        .warnings
        .log(account, WarningKind::Expiry, now)
        .await
        .unwrap();
    db.repos.payments.record(account, now).await.unwrap();

    db.repos.accounts.deactivate(account).await.unwrap();

    let row = db.repos.accounts.find_by_id(account).await.unwrap().unwrap();
    assert!(!row.is_active);

    let usage = db
        .repos
        .snapshots
        .usage_since(account, now - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(usage.total_gb(), 0.0);
    assert!(!db
        .repos
        .warnings
        .has_recent(account, WarningKind::Expiry, StdDuration::from_secs(3600))
        .await
        .unwrap());
    assert_eq!(db.repos.payments.history(account).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_find_by_uuid_skips_inactive() {
    let db = test_db().await;
    let subscriber = db.repos.subscribers.create("tester").await.unwrap();
    let uuid = Uuid::new_v4();
    let account = db
        .repos
        .accounts
        .register(RegisterAccount {
            subscriber_id: subscriber.subscriber_id(),
            uuid: Some(uuid),
            panel_name: Some("tester-sec".to_string()),
            label: "main".to_string(),
        })
        .await
        .unwrap();

    assert!(db.repos.accounts.find_by_uuid(uuid).await.unwrap().is_some());

    db.repos.accounts.deactivate(account.account_id()).await.unwrap();
    assert!(db.repos.accounts.find_by_uuid(uuid).await.unwrap().is_none());
}

#[tokio::test]
async fn test_settings_default_on_and_toggle() {
    let db = test_db().await;
    let subscriber = db.repos.subscribers.create("tester").await.unwrap();
    let id = subscriber.subscriber_id();

    let settings = db.repos.subscribers.settings(id).await.unwrap();
    assert!(settings.daily_reports);
    assert!(settings.data_warnings_for(PanelKind::Secondary));

    db.repos
        .subscribers
        .update_setting(id, NotificationSetting::DataWarnings(PanelKind::Secondary), false)
        .await
        .unwrap();
    let settings = db.repos.subscribers.settings(id).await.unwrap();
    assert!(!settings.data_warnings_for(PanelKind::Secondary));
    assert!(settings.data_warnings_for(PanelKind::Primary));

    // unknown subscriber falls back to defaults
    let settings = db.repos.subscribers.settings(SubscriberId(9999)).await.unwrap();
    assert!(settings.expiry_warnings);
}

#[tokio::test]
async fn test_birthday_month_day_match() {
    let db = test_db().await;
    let subscriber = db.repos.subscribers.create("tester").await.unwrap();
    let id = subscriber.subscriber_id();

    db.repos
        .subscribers
        .set_birthday(id, Some(NaiveDate::from_ymd_opt(1990, 6, 15).unwrap()))
        .await
        .unwrap();

    let hits = db.repos.subscribers.with_birthday_on(6, 15).await.unwrap();
    assert_eq!(hits, vec![id]);
    assert!(db.repos.subscribers.with_birthday_on(6, 16).await.unwrap().is_empty());

    db.repos.subscribers.set_birthday(id, None).await.unwrap();
    assert!(db.repos.subscribers.with_birthday_on(6, 15).await.unwrap().is_empty());
}
