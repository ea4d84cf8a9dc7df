//! SQLite repository implementations

mod accounts;
mod payments;
mod snapshots;
mod subscribers;
mod warnings;

pub use accounts::SqliteAccountRepository;
pub use payments::SqlitePaymentRepository;
pub use snapshots::SqliteSnapshotRepository;
pub use subscribers::SqliteSubscriberRepository;
pub use warnings::SqliteWarningRepository;

use crate::DbPool;

/// All repositories bundled together
#[derive(Clone)]
pub struct Repositories {
    pub subscribers: SqliteSubscriberRepository,
    pub accounts: SqliteAccountRepository,
    pub snapshots: SqliteSnapshotRepository,
    pub warnings: SqliteWarningRepository,
    pub payments: SqlitePaymentRepository,
}

impl Repositories {
    /// Create all repositories from a database pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            subscribers: SqliteSubscriberRepository::new(pool.clone()),
            accounts: SqliteAccountRepository::new(pool.clone()),
            snapshots: SqliteSnapshotRepository::new(pool.clone()),
            warnings: SqliteWarningRepository::new(pool.clone()),
            payments: SqlitePaymentRepository::new(pool),
        }
    }
}
