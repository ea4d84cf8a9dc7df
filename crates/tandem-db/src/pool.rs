//! Database connection pool

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

/// Database connection pool type alias
pub type DbPool = SqlitePool;

const SCHEMA: &str = include_str!("schema.sql");

/// Create a pool against `database_url` (e.g. `sqlite://tandem.db`) and
/// apply the schema.
///
/// WAL journaling keeps readers unblocked while the scheduler writes its
/// snapshot batch; every unit of work checks a connection out of the pool
/// and returns it promptly.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::raw_sql(SCHEMA).execute(&pool).await?;

    Ok(pool)
}

/// Compact the database file. Run from the monthly maintenance job only.
pub async fn vacuum(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("VACUUM").execute(pool).await?;
    Ok(())
}

/// Cheap liveness probe against the store.
pub async fn ping(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
