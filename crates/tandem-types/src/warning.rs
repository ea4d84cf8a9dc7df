//! Warning kinds for the notification dedup log

use serde::{Deserialize, Serialize};

use crate::panel::PanelKind;

/// The kinds of outbound notification the dedup log rate-limits.
///
/// Each kind maps to a stable string code stored in the `warning_log` table;
/// a `(account, code)` pair fires at most once per re-notification window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// Account expiry is approaching.
    Expiry,
    /// Remaining quota on one panel is low.
    LowData(PanelKind),
    /// Daily usage crossed the configured spike threshold.
    UsageSpike,
}

impl WarningKind {
    /// Stable storage code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Expiry => "expiry",
            Self::LowData(PanelKind::Primary) => "low_data_primary",
            Self::LowData(PanelKind::Secondary) => "low_data_secondary",
            Self::UsageSpike => "usage_spike",
        }
    }
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let kinds = [
            WarningKind::Expiry,
            WarningKind::LowData(PanelKind::Primary),
            WarningKind::LowData(PanelKind::Secondary),
            WarningKind::UsageSpike,
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }
}
