//! Panel connection configuration

use std::time::Duration;

/// Default per-call timeout for panel requests.
pub const DEFAULT_PANEL_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection settings for the primary (UUID-keyed) panel.
#[derive(Debug, Clone)]
pub struct PrimaryConfig {
    /// Base URL of the admin API, without a trailing slash.
    pub base_url: String,
    /// Static API key sent on every request.
    pub api_key: String,
    /// Per-call timeout.
    pub timeout: Duration,
}

impl PrimaryConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout: DEFAULT_PANEL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Connection settings for the secondary (username-keyed) panel.
#[derive(Debug, Clone)]
pub struct SecondaryConfig {
    /// Base URL of the admin API, without a trailing slash.
    pub base_url: String,
    /// Admin login used to obtain a bearer token.
    pub username: String,
    pub password: String,
    /// Per-call timeout.
    pub timeout: Duration,
}

impl SecondaryConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            timeout: DEFAULT_PANEL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
