//! Cross-panel identity reconciliation
//!
//! Merges the two panels' views of one logical subscriber into a single
//! [`CombinedUser`], and carries the provisioning operations that must hit
//! both panels. Each panel lookup is independently fault-tolerant: a
//! transport or parse failure on one panel degrades that panel's
//! contribution to "absent" instead of aborting the other.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{instrument, warn};

use tandem_db::{AccountRepository, AccountRow, Repositories};
use tandem_panel::{ListingCache, PanelApi};
use tandem_types::{CombinedUser, PanelKind, PanelRecord, SubscriberKey, UserDelta};

use crate::error::{CoreError, CoreResult};
use crate::usage::UsageService;

/// The reconciliation service. Constructed once at process start and shared
/// by the request handlers and the scheduler.
pub struct ReconcilerService {
    primary: Arc<dyn PanelApi>,
    secondary: Arc<dyn PanelApi>,
    cache: ListingCache,
    repos: Repositories,
    usage: Arc<UsageService>,
}

impl ReconcilerService {
    pub fn new(
        primary: Arc<dyn PanelApi>,
        secondary: Arc<dyn PanelApi>,
        cache: ListingCache,
        repos: Repositories,
        usage: Arc<UsageService>,
    ) -> Self {
        Self {
            primary,
            secondary,
            cache,
            repos,
            usage,
        }
    }

    /// One panel lookup that cannot fail the overall reconciliation.
    async fn panel_record(
        &self,
        panel: &Arc<dyn PanelApi>,
        key: &SubscriberKey,
    ) -> Option<PanelRecord> {
        match panel.get_user(key).await {
            Ok(record) => record,
            Err(err) => {
                warn!(panel = %panel.kind(), %key, error = %err, "panel lookup failed, treating as absent");
                metrics::counter!("panel_lookup_failures_total", "panel" => panel.kind().as_str())
                    .increment(1);
                None
            }
        }
    }

    /// Reconcile one subscriber across both panels.
    ///
    /// A UUID is looked up on both panels directly. A bare username is
    /// fetched from the secondary panel first; when that record carries a
    /// UUID (via the identity map), the primary panel is consulted too.
    /// Returns `Ok(None)` only when neither panel knows the subscriber.
    #[instrument(skip(self), level = "debug")]
    pub async fn get_user(&self, key: &SubscriberKey) -> CoreResult<Option<CombinedUser>> {
        let (primary, secondary) = match key {
            SubscriberKey::Uuid(_) => {
                let (primary, secondary) = tokio::join!(
                    self.panel_record(&self.primary, key),
                    self.panel_record(&self.secondary, key)
                );
                (primary, secondary)
            }
            SubscriberKey::Name(_) => {
                let secondary = self.panel_record(&self.secondary, key).await;
                let primary = match secondary.as_ref().and_then(|record| record.uuid) {
                    Some(uuid) => {
                        self.panel_record(&self.primary, &SubscriberKey::Uuid(uuid))
                            .await
                    }
                    None => None,
                };
                (primary, secondary)
            }
        };

        let Some(mut combined) = CombinedUser::merge(primary, secondary) else {
            return Ok(None);
        };
        self.attach_daily_usage(&mut combined).await;
        Ok(Some(combined))
    }

    /// Attach today's usage when the subscriber has a registered account
    /// row. Failure to attach never fails the reconciliation.
    async fn attach_daily_usage(&self, combined: &mut CombinedUser) {
        let Ok(Some(account)) = self.find_account(combined).await else {
            return;
        };
        match self.usage.daily_usage(account.account_id()).await {
            Ok(daily) => combined.daily_usage = Some(daily),
            Err(err) => {
                warn!(account = %account.account_id(), error = %err, "could not attach daily usage");
            }
        }
    }

    /// The internal account row matching a combined view, by UUID first and
    /// by secondary-panel username as the fallback.
    pub async fn find_account(&self, combined: &CombinedUser) -> CoreResult<Option<AccountRow>> {
        if let Some(uuid) = combined.uuid {
            if let Some(row) = self.repos.accounts.find_by_uuid(uuid).await? {
                return Ok(Some(row));
            }
        }
        if let Some(secondary) = &combined.secondary {
            return Ok(self.repos.accounts.find_by_panel_name(&secondary.name).await?);
        }
        Ok(None)
    }

    /// Reconcile every subscriber across both panels in one pass.
    ///
    /// Listings go through the short-TTL cache. Either panel's listing
    /// failing degrades coverage to the other panel's records instead of
    /// failing the call.
    pub async fn all_users(&self) -> CoreResult<Vec<CombinedUser>> {
        let (primary_listing, secondary_listing) = tokio::join!(
            self.cache.list(self.primary.as_ref()),
            self.cache.list(self.secondary.as_ref())
        );

        let primary_listing = primary_listing.unwrap_or_else(|err| {
            warn!(panel = %PanelKind::Primary, error = %err, "listing failed, continuing without it");
            Arc::new(Vec::new())
        });
        let secondary_listing = secondary_listing.unwrap_or_else(|err| {
            warn!(panel = %PanelKind::Secondary, error = %err, "listing failed, continuing without it");
            Arc::new(Vec::new())
        });

        // Key by UUID where present, by panel-local name otherwise.
        let mut merged: HashMap<SubscriberKey, (Option<PanelRecord>, Option<PanelRecord>)> =
            HashMap::new();
        for record in primary_listing.iter() {
            let key = record_key(record);
            merged.entry(key).or_default().0 = Some(record.clone());
        }
        for record in secondary_listing.iter() {
            let key = record_key(record);
            merged.entry(key).or_default().1 = Some(record.clone());
        }

        let mut users: Vec<CombinedUser> = merged
            .into_values()
            .filter_map(|(primary, secondary)| CombinedUser::merge(primary, secondary))
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));

        self.attach_daily_usage_bulk(&mut users).await?;
        Ok(users)
    }

    /// Bulk daily-usage attachment: one grouped query plus the account list,
    /// instead of two queries per subscriber.
    async fn attach_daily_usage_bulk(&self, users: &mut [CombinedUser]) -> CoreResult<()> {
        let accounts = self.repos.accounts.list_active().await?;
        let daily = self.usage.daily_usage_all().await?;

        let mut by_uuid = HashMap::new();
        let mut by_name = HashMap::new();
        for row in &accounts {
            if let Some(uuid) = row.uuid() {
                by_uuid.insert(uuid, row.account_id());
            }
            if let Some(name) = &row.panel_name {
                by_name.insert(name.clone(), row.account_id());
            }
        }

        for user in users.iter_mut() {
            let account = user
                .uuid
                .and_then(|uuid| by_uuid.get(&uuid))
                .or_else(|| {
                    user.secondary
                        .as_ref()
                        .and_then(|record| by_name.get(&record.name))
                });
            if let Some(account) = account {
                user.daily_usage = Some(daily.get(account).copied().unwrap_or_default());
            }
        }
        Ok(())
    }

    /// Case-insensitive search over the combined listing by name or UUID
    /// fragment.
    pub async fn search(&self, query: &str) -> CoreResult<Vec<CombinedUser>> {
        let query = query.to_lowercase();
        let users = self.all_users().await?;
        Ok(users
            .into_iter()
            .filter(|user| {
                user.name.to_lowercase().contains(&query)
                    || user
                        .uuid
                        .is_some_and(|uuid| uuid.to_string().contains(&query))
            })
            .collect())
    }

    /// Apply a relative adjustment on the targeted panel(s).
    ///
    /// With `target == None` every panel that knows the subscriber is
    /// adjusted. The operation fails if the subscriber exists nowhere, and
    /// surfaces the first panel error otherwise.
    #[instrument(skip(self), level = "debug")]
    pub async fn modify_user(
        &self,
        key: &SubscriberKey,
        delta: UserDelta,
        target: Option<PanelKind>,
    ) -> CoreResult<()> {
        let combined = self
            .get_user(key)
            .await?
            .ok_or_else(|| CoreError::NotFound(key.to_string()))?;

        if targeted(target, PanelKind::Primary) {
            if let Some(uuid) = combined.primary.as_ref().and_then(|r| r.uuid) {
                self.primary
                    .modify_user(&SubscriberKey::Uuid(uuid), delta)
                    .await?;
            }
        }
        if targeted(target, PanelKind::Secondary) {
            if let Some(record) = &combined.secondary {
                self.secondary
                    .modify_user(&SubscriberKey::Name(record.name.clone()), delta)
                    .await?;
            }
        }

        self.cache.invalidate_all();
        Ok(())
    }

    /// Remove the subscriber from both panels, deactivate the internal
    /// account row, and drop its snapshot/warning history.
    #[instrument(skip(self), level = "debug")]
    pub async fn delete_user(&self, key: &SubscriberKey) -> CoreResult<()> {
        let combined = self
            .get_user(key)
            .await?
            .ok_or_else(|| CoreError::NotFound(key.to_string()))?;

        if let Some(uuid) = combined.primary.as_ref().and_then(|r| r.uuid) {
            self.primary.delete_user(&SubscriberKey::Uuid(uuid)).await?;
        }
        if let Some(record) = &combined.secondary {
            self.secondary
                .delete_user(&SubscriberKey::Name(record.name.clone()))
                .await?;
        }

        if let Some(account) = self.find_account(&combined).await? {
            self.repos.accounts.deactivate(account.account_id()).await?;
        }

        self.cache.invalidate_all();
        Ok(())
    }

    /// Zero the subscriber's counters on every panel that knows them, then
    /// purge today's snapshots so the daily window restarts from zero
    /// instead of reporting the pre-reset peak.
    #[instrument(skip(self), level = "debug")]
    pub async fn reset_usage(&self, key: &SubscriberKey) -> CoreResult<()> {
        let combined = self
            .get_user(key)
            .await?
            .ok_or_else(|| CoreError::NotFound(key.to_string()))?;

        if let Some(uuid) = combined.primary.as_ref().and_then(|r| r.uuid) {
            self.primary.reset_usage(&SubscriberKey::Uuid(uuid)).await?;
        }
        if let Some(record) = &combined.secondary {
            self.secondary
                .reset_usage(&SubscriberKey::Name(record.name.clone()))
                .await?;
        }

        if let Some(account) = self.find_account(&combined).await? {
            let purged = self.usage.purge_today(account.account_id()).await?;
            tracing::info!(account = %account.account_id(), purged, "usage reset, same-day snapshots purged");
        }

        self.cache.invalidate_all();
        Ok(())
    }
}

/// Listing key: UUID where present, panel-local name otherwise.
fn record_key(record: &PanelRecord) -> SubscriberKey {
    match record.uuid {
        Some(uuid) => SubscriberKey::Uuid(uuid),
        None => SubscriberKey::Name(record.name.clone()),
    }
}

fn targeted(target: Option<PanelKind>, panel: PanelKind) -> bool {
    target.is_none() || target == Some(panel)
}
