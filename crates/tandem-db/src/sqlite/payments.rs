//! SQLite payment repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tandem_types::AccountId;

use crate::error::DbResult;
use crate::models::PaymentRow;
use crate::repo::PaymentRepository;
use crate::DbPool;

/// SQLite payment repository
#[derive(Clone)]
pub struct SqlitePaymentRepository {
    pool: DbPool,
}

impl SqlitePaymentRepository {
    /// Create a new payment repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn record(&self, account: AccountId, paid_at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("INSERT INTO payments (account_id, paid_at) VALUES (?, ?)")
            .bind(account.0)
            .bind(paid_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn history(&self, account: AccountId) -> DbResult<Vec<PaymentRow>> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            "SELECT * FROM payments WHERE account_id = ? ORDER BY paid_at DESC",
        )
        .bind(account.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn latest_per_account(&self) -> DbResult<Vec<(AccountId, DateTime<Utc>)>> {
        let rows: Vec<(i64, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT p.account_id, MAX(p.paid_at)
            FROM payments p
            JOIN accounts a ON a.id = p.account_id
            WHERE a.is_active = 1
            GROUP BY p.account_id
            ORDER BY MAX(p.paid_at) DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, paid_at)| (AccountId(id), paid_at))
            .collect())
    }
}
