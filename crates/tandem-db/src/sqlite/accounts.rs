//! SQLite account repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use tandem_types::{AccountId, SubscriberId};

use crate::error::DbResult;
use crate::models::AccountRow;
use crate::repo::{AccountRepository, RegisterAccount};
use crate::DbPool;

/// SQLite account repository
#[derive(Clone)]
pub struct SqliteAccountRepository {
    pool: DbPool,
}

impl SqliteAccountRepository {
    /// Create a new account repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn register(&self, account: RegisterAccount) -> DbResult<AccountRow> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts (subscriber_id, uuid, panel_name, label, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(account.subscriber_id.0)
        .bind(account.uuid.map(|u| u.to_string()))
        .bind(account.panel_name)
        .bind(account.label)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_by_id(&self, id: AccountId) -> DbResult<Option<AccountRow>> {
        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> DbResult<Option<AccountRow>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE uuid = ? AND is_active = 1",
        )
        .bind(uuid.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_by_panel_name(&self, name: &str) -> DbResult<Option<AccountRow>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE panel_name = ? AND is_active = 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_active(&self) -> DbResult<Vec<AccountRow>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE is_active = 1 ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn list_for_subscriber(&self, id: SubscriberId) -> DbResult<Vec<AccountRow>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE subscriber_id = ? AND is_active = 1 ORDER BY created_at",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn deactivate(&self, id: AccountId) -> DbResult<()> {
        // One short transaction: flip the flag and drop the dependent
        // history so a re-registered account starts with clean accounting.
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE accounts SET is_active = 0 WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM usage_snapshots WHERE account_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM warning_log WHERE account_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn set_first_seen_online(&self, id: AccountId, at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE accounts SET first_seen_online = ? WHERE id = ?")
            .bind(at)
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn mark_welcomed(&self, id: AccountId) -> DbResult<()> {
        sqlx::query("UPDATE accounts SET welcomed = 1 WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
