//! SQLite subscriber repository implementation

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use tandem_types::SubscriberId;

use crate::error::DbResult;
use crate::models::SubscriberRow;
use crate::repo::{NotificationSetting, NotificationSettings, SubscriberRepository};
use crate::DbPool;

/// SQLite subscriber repository
#[derive(Clone)]
pub struct SqliteSubscriberRepository {
    pool: DbPool,
}

impl SqliteSubscriberRepository {
    /// Create a new subscriber repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriberRepository for SqliteSubscriberRepository {
    async fn create(&self, display_name: &str) -> DbResult<SubscriberRow> {
        let row = sqlx::query_as::<_, SubscriberRow>(
            r#"
            INSERT INTO subscribers (display_name, created_at)
            VALUES (?, ?)
            RETURNING *
            "#,
        )
        .bind(display_name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_by_id(&self, id: SubscriberId) -> DbResult<Option<SubscriberRow>> {
        let row = sqlx::query_as::<_, SubscriberRow>("SELECT * FROM subscribers WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn list_all(&self) -> DbResult<Vec<SubscriberRow>> {
        let rows = sqlx::query_as::<_, SubscriberRow>("SELECT * FROM subscribers ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn list_admins(&self) -> DbResult<Vec<SubscriberRow>> {
        let rows = sqlx::query_as::<_, SubscriberRow>(
            "SELECT * FROM subscribers WHERE is_admin = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn settings(&self, id: SubscriberId) -> DbResult<NotificationSettings> {
        let row: Option<(bool, bool, bool, bool)> = sqlx::query_as(
            r#"
            SELECT daily_reports, expiry_warnings, data_warnings_primary, data_warnings_secondary
            FROM subscribers WHERE id = ?
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        // An unknown subscriber gets the defaults: every notification on.
        Ok(row
            .map(|(daily, expiry, primary, secondary)| NotificationSettings {
                daily_reports: daily,
                expiry_warnings: expiry,
                data_warnings_primary: primary,
                data_warnings_secondary: secondary,
            })
            .unwrap_or_default())
    }

    async fn update_setting(
        &self,
        id: SubscriberId,
        setting: NotificationSetting,
        enabled: bool,
    ) -> DbResult<()> {
        use tandem_types::PanelKind;

        // Closed set of columns; one static statement per setting.
        let sql = match setting {
            NotificationSetting::DailyReports => {
                "UPDATE subscribers SET daily_reports = ? WHERE id = ?"
            }
            NotificationSetting::ExpiryWarnings => {
                "UPDATE subscribers SET expiry_warnings = ? WHERE id = ?"
            }
            NotificationSetting::DataWarnings(PanelKind::Primary) => {
                "UPDATE subscribers SET data_warnings_primary = ? WHERE id = ?"
            }
            NotificationSetting::DataWarnings(PanelKind::Secondary) => {
                "UPDATE subscribers SET data_warnings_secondary = ? WHERE id = ?"
            }
        };

        sqlx::query(sql)
            .bind(enabled)
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_birthday(&self, id: SubscriberId, birthday: Option<NaiveDate>) -> DbResult<()> {
        sqlx::query("UPDATE subscribers SET birthday = ? WHERE id = ?")
            .bind(birthday)
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn with_birthday_on(&self, month: u32, day: u32) -> DbResult<Vec<SubscriberId>> {
        let month_day = format!("{month:02}-{day:02}");
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT id FROM subscribers WHERE birthday IS NOT NULL AND strftime('%m-%d', birthday) = ?",
        )
        .bind(month_day)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| SubscriberId(id)).collect())
    }

    async fn set_admin(&self, id: SubscriberId, is_admin: bool) -> DbResult<()> {
        sqlx::query("UPDATE subscribers SET is_admin = ? WHERE id = ?")
            .bind(is_admin)
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_note(&self, id: SubscriberId, note: Option<&str>) -> DbResult<()> {
        sqlx::query("UPDATE subscribers SET note = ? WHERE id = ?")
            .bind(note)
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
