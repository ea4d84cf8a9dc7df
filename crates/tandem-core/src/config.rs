//! Core engine configuration

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Utc};

use tandem_types::{UserDelta, WarningKind};

/// Tunables for the accounting engine and the scheduler.
///
/// The deployment timezone is a fixed UTC offset: daily accounting windows
/// and the report/gift wall-clock times are interpreted in that offset, and
/// converted to UTC for storage queries.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Deployment timezone as a fixed UTC offset.
    pub local_offset: FixedOffset,
    /// Minute of the hour the snapshot job fires at.
    pub snapshot_minute: u32,
    /// Warning evaluation cadence in hours.
    pub warning_check_hours: i64,
    /// Local wall-clock time of the nightly report.
    pub report_time: NaiveTime,
    /// Local wall-clock time of the birthday gift job.
    pub gift_time: NaiveTime,
    /// Day of month and local time of the storage maintenance job.
    pub maintenance_day: u32,
    pub maintenance_time: NaiveTime,
    /// Expiry warning threshold: warn when 0..=N days remain.
    pub expiry_warn_days: i64,
    /// Low-data warning threshold as used percentage of the panel quota.
    pub data_warn_percent: f64,
    /// Daily usage spike threshold in GB; 0 disables the alert.
    pub daily_spike_gb: f64,
    /// Re-notification windows per warning kind, in hours.
    pub expiry_renotify_hours: i64,
    pub data_renotify_hours: i64,
    pub spike_renotify_hours: i64,
    /// Delay between first observed connection and the welcome notice.
    pub welcome_delay_hours: i64,
    /// Quota/expiry added by the birthday gift.
    pub birthday_gift: UserDelta,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            local_offset: FixedOffset::east_opt(0).unwrap(),
            snapshot_minute: 1,
            warning_check_hours: 6,
            report_time: NaiveTime::from_hms_opt(23, 30, 0).unwrap(),
            gift_time: NaiveTime::from_hms_opt(0, 5, 0).unwrap(),
            maintenance_day: 1,
            maintenance_time: NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
            expiry_warn_days: 3,
            data_warn_percent: 85.0,
            daily_spike_gb: 0.0,
            expiry_renotify_hours: 24,
            data_renotify_hours: 24,
            spike_renotify_hours: 24,
            welcome_delay_hours: 48,
            birthday_gift: UserDelta {
                add_gb: 2.0,
                add_days: 3,
            },
        }
    }
}

impl CoreConfig {
    /// Minimum interval before the same warning fires again.
    pub fn renotify_window(&self, kind: WarningKind) -> Duration {
        let hours = match kind {
            WarningKind::Expiry => self.expiry_renotify_hours,
            WarningKind::LowData(_) => self.data_renotify_hours,
            WarningKind::UsageSpike => self.spike_renotify_hours,
        };
        Duration::from_secs(hours.max(0) as u64 * 3600)
    }

    /// The most recent local midnight, expressed in UTC.
    ///
    /// This is the reference point for all "daily" accounting.
    pub fn local_midnight_utc(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.local_offset);
        let midnight = local.date_naive().and_hms_opt(0, 0, 0).unwrap();
        match self.local_offset.from_local_datetime(&midnight) {
            chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
                dt.with_timezone(&Utc)
            }
            // unreachable for a fixed offset, but don't panic on a clock edge
            chrono::LocalResult::None => now,
        }
    }
}

/// Parse a `±HH:MM` UTC offset string (e.g. `+03:30`, `-05:00`).
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, String> {
    let raw = raw.trim();
    let (sign, rest) = if let Some(rest) = raw.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = raw.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(format!("offset must start with + or -: {raw:?}"));
    };
    let (hours, minutes) = rest
        .split_once(':')
        .ok_or_else(|| format!("offset must look like +HH:MM: {raw:?}"))?;
    let hours: i32 = hours.parse().map_err(|_| format!("bad hours in {raw:?}"))?;
    let minutes: i32 = minutes
        .parse()
        .map_err(|_| format!("bad minutes in {raw:?}"))?;
    let seconds = sign * (hours * 3600 + minutes * 60);
    FixedOffset::east_opt(seconds).ok_or_else(|| format!("offset out of range: {raw:?}"))
}
