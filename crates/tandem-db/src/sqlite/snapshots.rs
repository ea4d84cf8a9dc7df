//! SQLite snapshot repository implementation
//!
//! The queries here turn monotonic cumulative counters into windowed usage
//! figures. `MAX - MIN` over a window equals usage accrued in that window as
//! long as the counter only grows; a vendor-side reset inside the window
//! makes the difference negative, which every query clamps to zero.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tandem_types::{AccountId, DailyUsage, PanelKind};

use crate::error::DbResult;
use crate::repo::SnapshotRepository;
use crate::DbPool;

/// SQLite snapshot repository
#[derive(Clone)]
pub struct SqliteSnapshotRepository {
    pool: DbPool,
}

impl SqliteSnapshotRepository {
    /// Create a new snapshot repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotRepository for SqliteSnapshotRepository {
    async fn append(
        &self,
        account: AccountId,
        primary_gb: f64,
        secondary_gb: f64,
        taken_at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO usage_snapshots (account_id, primary_gb, secondary_gb, taken_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(account.0)
        .bind(primary_gb)
        .bind(secondary_gb)
        .bind(taken_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn usage_since(&self, account: AccountId, since: DateTime<Utc>) -> DbResult<DailyUsage> {
        let row: (Option<f64>, Option<f64>) = sqlx::query_as(
            r#"
            SELECT
                MAX(primary_gb) - MIN(primary_gb),
                MAX(secondary_gb) - MIN(secondary_gb)
            FROM usage_snapshots
            WHERE account_id = ? AND taken_at >= ?
            "#,
        )
        .bind(account.0)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(DailyUsage {
            primary_gb: row.0.unwrap_or(0.0).max(0.0),
            secondary_gb: row.1.unwrap_or(0.0).max(0.0),
        })
    }

    async fn window_usage(
        &self,
        account: AccountId,
        panel: PanelKind,
        since: DateTime<Utc>,
    ) -> DbResult<f64> {
        // Boundary differencing: earliest and latest sample in the window.
        // Not a sum of hourly deltas - correct because the counter is
        // monotonic within the window.
        let sql = match panel {
            PanelKind::Primary => {
                r#"
                SELECT
                    (SELECT primary_gb FROM usage_snapshots
                     WHERE account_id = ?1 AND taken_at >= ?2
                     ORDER BY taken_at ASC LIMIT 1),
                    (SELECT primary_gb FROM usage_snapshots
                     WHERE account_id = ?1 AND taken_at >= ?2
                     ORDER BY taken_at DESC LIMIT 1)
                "#
            }
            PanelKind::Secondary => {
                r#"
                SELECT
                    (SELECT secondary_gb FROM usage_snapshots
                     WHERE account_id = ?1 AND taken_at >= ?2
                     ORDER BY taken_at ASC LIMIT 1),
                    (SELECT secondary_gb FROM usage_snapshots
                     WHERE account_id = ?1 AND taken_at >= ?2
                     ORDER BY taken_at DESC LIMIT 1)
                "#
            }
        };

        let row: (Option<f64>, Option<f64>) = sqlx::query_as(sql)
            .bind(account.0)
            .bind(since)
            .fetch_one(&self.pool)
            .await?;

        match row {
            (Some(first), Some(last)) => Ok((last - first).max(0.0)),
            _ => Ok(0.0),
        }
    }

    async fn usage_since_all(
        &self,
        since: DateTime<Utc>,
    ) -> DbResult<HashMap<AccountId, DailyUsage>> {
        let rows: Vec<(i64, Option<f64>, Option<f64>)> = sqlx::query_as(
            r#"
            SELECT
                account_id,
                MAX(primary_gb) - MIN(primary_gb),
                MAX(secondary_gb) - MIN(secondary_gb)
            FROM usage_snapshots
            WHERE taken_at >= ?
            GROUP BY account_id
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, primary, secondary)| {
                (
                    AccountId(id),
                    DailyUsage {
                        primary_gb: primary.unwrap_or(0.0).max(0.0),
                        secondary_gb: secondary.unwrap_or(0.0).max(0.0),
                    },
                )
            })
            .collect())
    }

    async fn purge_since(&self, account: AccountId, since: DateTime<Utc>) -> DbResult<u64> {
        let result =
            sqlx::query("DELETE FROM usage_snapshots WHERE account_id = ? AND taken_at >= ?")
                .bind(account.0)
                .bind(since)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    async fn purge_all(&self, account: AccountId) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM usage_snapshots WHERE account_id = ?")
            .bind(account.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
