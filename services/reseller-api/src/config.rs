//! Configuration for the reseller API service.

use std::time::Duration;

use chrono::NaiveTime;
use tandem_core::config::parse_utc_offset;
use tandem_core::CoreConfig;
use tandem_panel::{PrimaryConfig, SecondaryConfig};
use tandem_types::UserDelta;

/// Reseller API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// Database URL (`sqlite://...`)
    pub database_url: String,
    /// Path of the UUID ↔ secondary-username side file
    pub identity_map_path: String,
    /// Primary panel connection
    pub primary_panel: PrimaryConfig,
    /// Secondary panel connection
    pub secondary_panel: SecondaryConfig,
    /// Full-listing cache TTL
    pub listing_cache_ttl: Duration,
    /// Core engine configuration (thresholds, cadences, timezone)
    pub core: CoreConfig,
    /// Request timeout
    pub request_timeout: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let http_port = parsed_or("HTTP_PORT", 8080)?;

        let identity_map_path = std::env::var("IDENTITY_MAP_PATH")
            .unwrap_or_else(|_| "identity_map.json".to_string());

        // Panel connections
        let panel_timeout = Duration::from_secs(parsed_or("PANEL_TIMEOUT_SECS", 15u64)?);
        let primary_panel = PrimaryConfig::new(
            required("PRIMARY_PANEL_URL")?,
            required("PRIMARY_PANEL_API_KEY")?,
        )
        .with_timeout(panel_timeout);
        let secondary_panel = SecondaryConfig::new(
            required("SECONDARY_PANEL_URL")?,
            required("SECONDARY_PANEL_USERNAME")?,
            required("SECONDARY_PANEL_PASSWORD")?,
        )
        .with_timeout(panel_timeout);

        let listing_cache_ttl = Duration::from_secs(parsed_or("LISTING_CACHE_TTL_SECS", 45u64)?);

        // Core engine tunables
        let defaults = CoreConfig::default();
        let core = CoreConfig {
            local_offset: match std::env::var("LOCAL_UTC_OFFSET") {
                Ok(raw) => parse_utc_offset(&raw).map_err(|_| ConfigError::Invalid("LOCAL_UTC_OFFSET"))?,
                Err(_) => defaults.local_offset,
            },
            snapshot_minute: parsed_or("SNAPSHOT_MINUTE", defaults.snapshot_minute)?,
            warning_check_hours: parsed_or("WARNING_CHECK_HOURS", defaults.warning_check_hours)?,
            report_time: time_or("REPORT_TIME", defaults.report_time)?,
            gift_time: time_or("GIFT_TIME", defaults.gift_time)?,
            maintenance_day: parsed_or("MAINTENANCE_DAY", defaults.maintenance_day)?,
            maintenance_time: time_or("MAINTENANCE_TIME", defaults.maintenance_time)?,
            expiry_warn_days: parsed_or("EXPIRY_WARN_DAYS", defaults.expiry_warn_days)?,
            data_warn_percent: parsed_or("DATA_WARN_PERCENT", defaults.data_warn_percent)?,
            daily_spike_gb: parsed_or("DAILY_SPIKE_GB", defaults.daily_spike_gb)?,
            expiry_renotify_hours: parsed_or(
                "EXPIRY_RENOTIFY_HOURS",
                defaults.expiry_renotify_hours,
            )?,
            data_renotify_hours: parsed_or("DATA_RENOTIFY_HOURS", defaults.data_renotify_hours)?,
            spike_renotify_hours: parsed_or("SPIKE_RENOTIFY_HOURS", defaults.spike_renotify_hours)?,
            welcome_delay_hours: parsed_or("WELCOME_DELAY_HOURS", defaults.welcome_delay_hours)?,
            birthday_gift: UserDelta {
                add_gb: parsed_or("BIRTHDAY_GIFT_GB", defaults.birthday_gift.add_gb)?,
                add_days: parsed_or("BIRTHDAY_GIFT_DAYS", defaults.birthday_gift.add_days)?,
            },
        };

        let request_timeout = Duration::from_secs(parsed_or("REQUEST_TIMEOUT_SECS", 30u64)?);

        let metrics_enabled = std::env::var("METRICS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        Ok(Self {
            http_port,
            database_url,
            identity_map_path,
            primary_panel,
            secondary_panel,
            listing_cache_ttl,
            core,
            request_timeout,
            metrics_enabled,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

fn time_or(name: &'static str, default: NaiveTime) -> Result<NaiveTime, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => {
            NaiveTime::parse_from_str(&raw, "%H:%M").map_err(|_| ConfigError::Invalid(name))
        }
        Err(_) => Ok(default),
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
