//! The reconciled cross-panel subscriber view

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::key::SubscriberKey;
use crate::panel::{PanelKind, PanelRecord};

/// Usage accrued since local midnight, split per panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub primary_gb: f64,
    pub secondary_gb: f64,
}

impl DailyUsage {
    pub fn total_gb(&self) -> f64 {
        self.primary_gb + self.secondary_gb
    }

    pub fn for_panel(&self, kind: PanelKind) -> f64 {
        match kind {
            PanelKind::Primary => self.primary_gb,
            PanelKind::Secondary => self.secondary_gb,
        }
    }
}

/// One logical subscriber merged across both panels.
///
/// A subscriber need not exist on both panels; a single-panel view is a
/// normal, valid state. Totals are sums over the panels that responded,
/// `active` is the OR of the per-panel flags, `last_seen` the latest
/// timestamp either panel reported, and `expire_days` the later-expiring of
/// the two finite values (a subscriber stays usable on a panel for as long
/// as that panel has time left).
///
/// Never persisted; recomputed from live panel data on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedUser {
    pub name: String,
    pub uuid: Option<Uuid>,
    pub active: bool,
    pub usage_used_gb: f64,
    pub usage_limit_gb: f64,
    pub last_seen: Option<DateTime<Utc>>,
    pub expire_days: Option<i64>,
    /// Per-panel breakdown of the merged view.
    pub primary: Option<PanelRecord>,
    pub secondary: Option<PanelRecord>,
    /// Usage since local midnight, attached when the subscriber has a
    /// registered account row; absent otherwise.
    pub daily_usage: Option<DailyUsage>,
}

impl CombinedUser {
    /// Merge the per-panel records for one logical subscriber.
    ///
    /// Returns `None` when neither panel knows the subscriber.
    pub fn merge(primary: Option<PanelRecord>, secondary: Option<PanelRecord>) -> Option<Self> {
        let base = primary.as_ref().or(secondary.as_ref())?;

        let name = base.name.clone();
        let uuid = primary
            .as_ref()
            .and_then(|r| r.uuid)
            .or_else(|| secondary.as_ref().and_then(|r| r.uuid));

        let active = primary.as_ref().is_some_and(|r| r.active)
            || secondary.as_ref().is_some_and(|r| r.active);

        let usage_used_gb = primary.as_ref().map_or(0.0, |r| r.usage_used_gb)
            + secondary.as_ref().map_or(0.0, |r| r.usage_used_gb);
        let usage_limit_gb = primary.as_ref().map_or(0.0, |r| r.usage_limit_gb)
            + secondary.as_ref().map_or(0.0, |r| r.usage_limit_gb);

        let last_seen = match (
            primary.as_ref().and_then(|r| r.last_seen),
            secondary.as_ref().and_then(|r| r.last_seen),
        ) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        let expire_days = match (
            primary.as_ref().and_then(|r| r.expire_days),
            secondary.as_ref().and_then(|r| r.expire_days),
        ) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        Some(Self {
            name,
            uuid,
            active,
            usage_used_gb,
            usage_limit_gb,
            last_seen,
            expire_days,
            primary,
            secondary,
            daily_usage: None,
        })
    }

    /// Used share of the combined quota as a percentage; 0 when unlimited.
    pub fn usage_percent(&self) -> f64 {
        if self.usage_limit_gb > 0.0 {
            self.usage_used_gb / self.usage_limit_gb * 100.0
        } else {
            0.0
        }
    }

    /// Remaining combined quota in GB, clamped at zero.
    pub fn remaining_gb(&self) -> f64 {
        (self.usage_limit_gb - self.usage_used_gb).max(0.0)
    }

    /// The external key this subscriber is addressed by: the UUID when one
    /// is known, the secondary-panel username otherwise.
    pub fn key(&self) -> SubscriberKey {
        match self.uuid {
            Some(uuid) => SubscriberKey::Uuid(uuid),
            None => SubscriberKey::Name(self.name.clone()),
        }
    }

    /// The per-panel record for `kind`, if that panel knows the subscriber.
    pub fn panel(&self, kind: PanelKind) -> Option<&PanelRecord> {
        match kind {
            PanelKind::Primary => self.primary.as_ref(),
            PanelKind::Secondary => self.secondary.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(name: &str, used: f64, limit: f64, active: bool, expire: Option<i64>) -> PanelRecord {
        PanelRecord {
            name: name.to_string(),
            uuid: None,
            active,
            usage_used_gb: used,
            usage_limit_gb: limit,
            last_seen: None,
            expire_days: expire,
        }
    }

    #[test]
    fn test_merge_neither_panel() {
        assert!(CombinedUser::merge(None, None).is_none());
    }

    #[test]
    fn test_merge_primary_only() {
        let mut rec = record("alice", 4.5, 20.0, true, Some(10));
        rec.uuid = Some(Uuid::new_v4());
        let combined = CombinedUser::merge(Some(rec), None).unwrap();
        assert_eq!(combined.usage_used_gb, 4.5);
        assert_eq!(combined.usage_limit_gb, 20.0);
        assert_eq!(combined.usage_percent(), 22.5);
        assert_eq!(combined.expire_days, Some(10));
        assert!(combined.active);
        assert!(combined.secondary.is_none());
    }

    #[test]
    fn test_merge_both_panels() {
        let primary = record("alice", 2.0, 10.0, true, Some(5));
        let secondary = record("alice", 1.0, 5.0, false, None);
        let combined = CombinedUser::merge(Some(primary), Some(secondary)).unwrap();
        assert_eq!(combined.usage_used_gb, 3.0);
        assert_eq!(combined.usage_limit_gb, 15.0);
        assert!(combined.active);
        // secondary has no expiry, so the primary's finite value wins
        assert_eq!(combined.expire_days, Some(5));
    }

    #[test]
    fn test_merge_later_expiry_wins() {
        let primary = record("bob", 0.0, 1.0, true, Some(3));
        let secondary = record("bob", 0.0, 1.0, true, Some(30));
        let combined = CombinedUser::merge(Some(primary), Some(secondary)).unwrap();
        assert_eq!(combined.expire_days, Some(30));
    }

    #[test]
    fn test_merge_both_unlimited_expiry() {
        let combined = CombinedUser::merge(
            Some(record("bob", 0.0, 1.0, true, None)),
            Some(record("bob", 0.0, 1.0, true, None)),
        )
        .unwrap();
        assert_eq!(combined.expire_days, None);
    }

    #[test]
    fn test_merge_latest_last_seen() {
        let earlier = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();
        let mut primary = record("carol", 0.0, 0.0, true, None);
        primary.last_seen = Some(earlier);
        let mut secondary = record("carol", 0.0, 0.0, true, None);
        secondary.last_seen = Some(later);
        let combined = CombinedUser::merge(Some(primary), Some(secondary)).unwrap();
        assert_eq!(combined.last_seen, Some(later));
    }

    #[test]
    fn test_merge_unlimited_quota_percent() {
        let combined = CombinedUser::merge(
            Some(record("dan", 3.0, 0.0, true, None)),
            Some(record("dan", 2.0, 0.0, false, None)),
        )
        .unwrap();
        assert_eq!(combined.usage_percent(), 0.0);
        assert_eq!(combined.usage_used_gb, 5.0);
    }

    #[test]
    fn test_key_prefers_uuid() {
        let uuid = Uuid::new_v4();
        let mut rec = record("eve", 0.0, 0.0, true, None);
        rec.uuid = Some(uuid);
        let combined = CombinedUser::merge(None, Some(rec)).unwrap();
        assert_eq!(combined.key(), SubscriberKey::Uuid(uuid));

        let combined = CombinedUser::merge(None, Some(record("eve", 0.0, 0.0, true, None))).unwrap();
        assert_eq!(combined.key(), SubscriberKey::Name("eve".to_string()));
    }
}
