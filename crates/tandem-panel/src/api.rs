//! The capability contract both panel clients implement

use async_trait::async_trait;

use tandem_types::{PanelKind, PanelRecord, SubscriberKey, UserDelta};

use crate::error::PanelResult;

/// Operations one panel backend supports.
///
/// The reconciler and the scheduler are written once against this trait; the
/// two vendor clients are the only implementations. All lookups are by
/// [`SubscriberKey`] - a client that cannot resolve the given key form (e.g.
/// a username on the UUID-keyed panel) returns `Ok(None)` rather than an
/// error.
#[async_trait]
pub trait PanelApi: Send + Sync {
    /// Which panel this client talks to.
    fn kind(&self) -> PanelKind;

    /// Fetch one subscriber. `Ok(None)` when the panel does not know the key.
    async fn get_user(&self, key: &SubscriberKey) -> PanelResult<Option<PanelRecord>>;

    /// Fetch every subscriber on the panel.
    async fn list_users(&self) -> PanelResult<Vec<PanelRecord>>;

    /// Apply a relative quota/expiry adjustment.
    async fn modify_user(&self, key: &SubscriberKey, delta: UserDelta) -> PanelResult<()>;

    /// Remove the subscriber from the panel.
    async fn delete_user(&self, key: &SubscriberKey) -> PanelResult<()>;

    /// Zero the subscriber's cumulative usage counter.
    async fn reset_usage(&self, key: &SubscriberKey) -> PanelResult<()>;
}
