//! Application state for the reseller API service.

use std::sync::Arc;

use tandem_core::{ReconcilerService, UsageService};
use tandem_db::{DbPool, Repositories};
use tandem_panel::IdentityMap;

use crate::config::Config;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Cross-panel reconciliation and provisioning
    pub reconciler: Arc<ReconcilerService>,
    /// Windowed usage queries
    pub usage: Arc<UsageService>,
    /// Database repositories
    pub repos: Repositories,
    /// Database pool (readiness probe)
    pub pool: DbPool,
    /// UUID ↔ secondary-username map (reload endpoint)
    pub identity: Arc<IdentityMap>,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Get request timeout from config
    pub fn request_timeout(&self) -> std::time::Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
