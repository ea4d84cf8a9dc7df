//! Full-listing response cache
//!
//! `list_users` is the most expensive call either panel serves, and both the
//! scheduler and the request path ask for it. This is a short-TTL memo keyed
//! by panel that keeps them from issuing the same full listing within a few
//! seconds of each other. A failed listing is returned as the error and never
//! cached - an outage must not read as an empty panel.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::trace;

use tandem_types::{PanelKind, PanelRecord};

use crate::api::PanelApi;
use crate::error::PanelResult;

/// Configuration for the listing cache.
#[derive(Debug, Clone)]
pub struct ListingCacheConfig {
    /// How long a successful listing stays fresh.
    pub ttl: Duration,
    /// Maximum cached listings; there is one slot per panel.
    pub max_entries: u64,
}

impl Default for ListingCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(45),
            max_entries: 4,
        }
    }
}

impl ListingCacheConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Short-TTL memoization of per-panel full listings.
#[derive(Clone)]
pub struct ListingCache {
    inner: Cache<PanelKind, Arc<Vec<PanelRecord>>>,
}

impl ListingCache {
    pub fn new(config: ListingCacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();
        Self { inner }
    }

    /// Fetch the panel's full listing through the cache.
    pub async fn list(&self, panel: &dyn PanelApi) -> PanelResult<Arc<Vec<PanelRecord>>> {
        let kind = panel.kind();

        if let Some(hit) = self.inner.get(&kind).await {
            trace!(panel = %kind, "listing cache hit");
            metrics::counter!("panel_listing_cache_hits_total", "panel" => kind.as_str())
                .increment(1);
            return Ok(hit);
        }

        metrics::counter!("panel_listing_cache_misses_total", "panel" => kind.as_str())
            .increment(1);

        // Errors propagate without touching the cache.
        let listing = Arc::new(panel.list_users().await?);
        self.inner.insert(kind, listing.clone()).await;
        Ok(listing)
    }

    /// Drop the cached listing for one panel (after a write through it).
    pub async fn invalidate(&self, kind: PanelKind) {
        self.inner.invalidate(&kind).await;
    }

    /// Drop all cached listings.
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tandem_types::{SubscriberKey, UserDelta};

    use crate::error::PanelError;

    struct CountingPanel {
        kind: PanelKind,
        calls: AtomicU32,
        fail: bool,
    }

    impl CountingPanel {
        fn new(kind: PanelKind, fail: bool) -> Self {
            Self {
                kind,
                calls: AtomicU32::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl PanelApi for CountingPanel {
        fn kind(&self) -> PanelKind {
            self.kind
        }

        async fn get_user(&self, _key: &SubscriberKey) -> PanelResult<Option<PanelRecord>> {
            Ok(None)
        }

        async fn list_users(&self) -> PanelResult<Vec<PanelRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(PanelError::Status { status: 503 })
            } else {
                Ok(vec![])
            }
        }

        async fn modify_user(&self, _key: &SubscriberKey, _delta: UserDelta) -> PanelResult<()> {
            Ok(())
        }

        async fn delete_user(&self, _key: &SubscriberKey) -> PanelResult<()> {
            Ok(())
        }

        async fn reset_usage(&self, _key: &SubscriberKey) -> PanelResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_second_call_within_ttl_is_cached() {
        let cache = ListingCache::new(ListingCacheConfig::default());
        let panel = CountingPanel::new(PanelKind::Primary, false);

        cache.list(&panel).await.unwrap();
        cache.list(&panel).await.unwrap();
        assert_eq!(panel.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = ListingCache::new(ListingCacheConfig::default());
        let panel = CountingPanel::new(PanelKind::Primary, true);

        assert!(cache.list(&panel).await.is_err());
        assert!(cache.list(&panel).await.is_err());
        // Both calls reached the panel: the error never became a cached
        // empty success.
        assert_eq!(panel.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_entries_are_keyed_per_panel() {
        let cache = ListingCache::new(ListingCacheConfig::default());
        let primary = CountingPanel::new(PanelKind::Primary, false);
        let secondary = CountingPanel::new(PanelKind::Secondary, false);

        cache.list(&primary).await.unwrap();
        cache.list(&secondary).await.unwrap();
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache = ListingCache::new(ListingCacheConfig::default());
        let panel = CountingPanel::new(PanelKind::Primary, false);

        cache.list(&panel).await.unwrap();
        cache.invalidate(PanelKind::Primary).await;
        cache.list(&panel).await.unwrap();
        assert_eq!(panel.calls.load(Ordering::SeqCst), 2);
    }
}
