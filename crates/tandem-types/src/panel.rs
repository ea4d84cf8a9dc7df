//! Per-panel types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two panel backends the reseller operates.
///
/// The primary panel keys subscribers by UUID; the secondary panel keys them
/// by username. Everything above the client layer is written against
/// [`crate::PanelKind`]-agnostic records, so the variant set stays closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelKind {
    Primary,
    Secondary,
}

impl PanelKind {
    /// Stable lowercase code, used in metrics labels and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }

    /// Both panels, in reconciliation order.
    pub fn all() -> [PanelKind; 2] {
        [Self::Primary, Self::Secondary]
    }
}

impl std::fmt::Display for PanelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PanelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(Self::Primary),
            "secondary" => Ok(Self::Secondary),
            other => Err(format!("unknown panel: {other}")),
        }
    }
}

/// Normalized view of one subscriber on one panel.
///
/// Produced fresh at the client boundary from vendor payloads; never
/// persisted. Usage counters are cumulative on the vendor side and only
/// ever increase, except when an admin explicitly resets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRecord {
    /// Display name; on the secondary panel this equals the username.
    pub name: String,
    /// Shared UUID identity, when the panel (or the identity map) knows it.
    pub uuid: Option<Uuid>,
    /// Whether the panel considers the account enabled.
    pub active: bool,
    /// Cumulative usage in GB.
    pub usage_used_gb: f64,
    /// Usage cap in GB; 0 means unlimited.
    pub usage_limit_gb: f64,
    /// Last time the panel saw the subscriber online, UTC.
    pub last_seen: Option<DateTime<Utc>>,
    /// Days until expiry. Negative = already expired, `None` = no expiry.
    pub expire_days: Option<i64>,
}

impl PanelRecord {
    /// Remaining quota in GB, clamped at zero.
    pub fn remaining_gb(&self) -> f64 {
        (self.usage_limit_gb - self.usage_used_gb).max(0.0)
    }

    /// Used share of the quota as a percentage; 0 when unlimited.
    pub fn usage_percent(&self) -> f64 {
        if self.usage_limit_gb > 0.0 {
            self.usage_used_gb / self.usage_limit_gb * 100.0
        } else {
            0.0
        }
    }
}

/// A relative adjustment applied to a subscriber on a panel.
///
/// Both panels expose absolute fields on their write APIs, so each client is
/// responsible for turning these relative additions into the vendor's
/// absolute representation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserDelta {
    /// GB to add to the usage cap.
    pub add_gb: f64,
    /// Days to add to the expiry.
    pub add_days: i64,
}

impl UserDelta {
    /// A delta that changes nothing.
    pub fn none() -> Self {
        Self {
            add_gb: 0.0,
            add_days: 0,
        }
    }

    /// True when applying this delta would be a no-op.
    pub fn is_empty(&self) -> bool {
        self.add_gb == 0.0 && self.add_days == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(used: f64, limit: f64) -> PanelRecord {
        PanelRecord {
            name: "test".to_string(),
            uuid: None,
            active: true,
            usage_used_gb: used,
            usage_limit_gb: limit,
            last_seen: None,
            expire_days: None,
        }
    }

    #[test]
    fn test_remaining_clamps_at_zero() {
        assert_eq!(record(12.0, 10.0).remaining_gb(), 0.0);
        assert_eq!(record(4.0, 10.0).remaining_gb(), 6.0);
    }

    #[test]
    fn test_unlimited_percent_is_zero() {
        assert_eq!(record(4.0, 0.0).usage_percent(), 0.0);
    }

    #[test]
    fn test_panel_kind_round_trip() {
        for kind in PanelKind::all() {
            assert_eq!(kind.as_str().parse::<PanelKind>().unwrap(), kind);
        }
    }
}
