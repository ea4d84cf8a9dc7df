//! SQLite warning dedup log implementation
//!
//! Pure rate limiter: one row per `(account, kind)`, refreshed on every
//! firing. Presence of a row inside the trailing window suppresses the next
//! firing; the row carries no message content.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tandem_types::{AccountId, WarningKind};

use crate::error::DbResult;
use crate::repo::WarningRepository;
use crate::DbPool;

/// SQLite warning repository
#[derive(Clone)]
pub struct SqliteWarningRepository {
    pool: DbPool,
}

impl SqliteWarningRepository {
    /// Create a new warning repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WarningRepository for SqliteWarningRepository {
    async fn has_recent(
        &self,
        account: AccountId,
        kind: WarningKind,
        window: Duration,
    ) -> DbResult<bool> {
        let cutoff = Utc::now() - chrono::Duration::from_std(window).unwrap_or_default();
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM warning_log WHERE account_id = ? AND kind = ? AND sent_at >= ?",
        )
        .bind(account.0)
        .bind(kind.code())
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn log(
        &self,
        account: AccountId,
        kind: WarningKind,
        sent_at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO warning_log (account_id, kind, sent_at)
            VALUES (?, ?, ?)
            ON CONFLICT (account_id, kind) DO UPDATE SET sent_at = excluded.sent_at
            "#,
        )
        .bind(account.0)
        .bind(kind.code())
        .bind(sent_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
