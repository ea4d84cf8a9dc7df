//! Client for the secondary (username-keyed) panel
//!
//! The secondary panel issues a bearer token against an admin login and
//! addresses users as `/api/users/{username}`. Counters are raw bytes and
//! expiry is an epoch timestamp; both are normalized here. UUID lookups are
//! translated through the [`IdentityMap`], since the panel itself has no
//! notion of the shared identity.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use tandem_types::{PanelKind, PanelRecord, SubscriberKey, UserDelta};

use crate::config::SecondaryConfig;
use crate::error::{PanelError, PanelResult};
use crate::identity_map::IdentityMap;
use crate::retry::{with_retry, RetryConfig};
use crate::timestamp;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// HTTP client for the secondary panel.
pub struct SecondaryClient {
    http: reqwest::Client,
    config: SecondaryConfig,
    identity: Arc<IdentityMap>,
    token: Mutex<Option<String>>,
    retry: RetryConfig,
}

impl SecondaryClient {
    /// Build a client from connection settings and the identity map.
    pub fn new(config: SecondaryConfig, identity: Arc<IdentityMap>) -> PanelResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            identity,
            token: Mutex::new(None),
            retry: RetryConfig::default(),
        })
    }

    /// Exchange the admin credentials for a fresh bearer token.
    async fn login(&self) -> PanelResult<String> {
        let response = self
            .http
            .post(format!("{}/api/auth/login", self.config.base_url))
            .json(&json!({
                "username": self.config.username,
                "password": self.config.password,
            }))
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED
            || response.status() == StatusCode::FORBIDDEN
        {
            return Err(PanelError::Auth);
        }
        if !response.status().is_success() {
            return Err(PanelError::Status {
                status: response.status().as_u16(),
            });
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| PanelError::Malformed(format!("login response: {e}")))?;
        debug!("secondary panel login succeeded");
        Ok(body.access_token)
    }

    async fn current_token(&self) -> PanelResult<String> {
        let mut token = self.token.lock().await;
        if let Some(t) = token.as_ref() {
            return Ok(t.clone());
        }
        let fresh = self.login().await?;
        *token = Some(fresh.clone());
        Ok(fresh)
    }

    /// Issue an authenticated request. A 401 invalidates the token and the
    /// request is repeated once with a fresh login.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> PanelResult<Option<T>> {
        let mut relogin_done = false;
        loop {
            let token = self.current_token().await?;
            let url = format!("{}{path}", self.config.base_url);
            let mut req = self.http.request(method.clone(), &url).bearer_auth(&token);
            if let Some(body) = body {
                req = req.json(body);
            }

            let response = req.send().await?;
            let status = response.status();
            metrics::counter!(
                "panel_requests_total",
                "panel" => PanelKind::Secondary.as_str(),
                "status" => status.as_str().to_string()
            )
            .increment(1);

            match status {
                StatusCode::UNAUTHORIZED if !relogin_done => {
                    warn!("secondary panel token rejected, re-authenticating");
                    *self.token.lock().await = None;
                    relogin_done = true;
                    continue;
                }
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(PanelError::Auth),
                StatusCode::NOT_FOUND => return Ok(None),
                s if s.is_success() => {
                    if s == StatusCode::NO_CONTENT {
                        return serde_json::from_value(Value::Null)
                            .map(Some)
                            .map_err(|e| PanelError::Malformed(format!("{method} {path}: {e}")));
                    }
                    return response
                        .json::<T>()
                        .await
                        .map(Some)
                        .map_err(|e| PanelError::Malformed(format!("{method} {path}: {e}")));
                }
                s => return Err(PanelError::Status { status: s.as_u16() }),
            }
        }
    }

    async fn get_with_retry<T: DeserializeOwned>(&self, path: &str) -> PanelResult<Option<T>> {
        with_retry(&self.retry, || {
            self.request::<T>(Method::GET, path, None)
        })
        .await
    }

    /// Resolve the secondary-panel username for a key, if there is one.
    fn username_of(&self, key: &SubscriberKey) -> Option<String> {
        match key {
            SubscriberKey::Name(name) => Some(name.clone()),
            SubscriberKey::Uuid(uuid) => self.identity.name_for(uuid),
        }
    }

    async fn fetch_raw(&self, username: &str) -> PanelResult<Option<RawUser>> {
        self.get_with_retry(&format!("/api/users/{username}")).await
    }

    fn normalize(&self, raw: RawUser) -> PanelRecord {
        let uuid = self.identity.uuid_for(&raw.username);
        PanelRecord {
            name: raw.username,
            uuid,
            active: raw.status.as_deref() == Some("active"),
            usage_used_gb: raw.used_traffic.unwrap_or(0).max(0) as f64 / BYTES_PER_GB,
            usage_limit_gb: raw.data_limit.unwrap_or(0).max(0) as f64 / BYTES_PER_GB,
            last_seen: raw.online_at.as_deref().and_then(timestamp::parse_lenient),
            expire_days: expire_days_from_epoch(raw.expires_at),
        }
    }
}

#[async_trait]
impl crate::api::PanelApi for SecondaryClient {
    fn kind(&self) -> PanelKind {
        PanelKind::Secondary
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_user(&self, key: &SubscriberKey) -> PanelResult<Option<PanelRecord>> {
        let Some(username) = self.username_of(key) else {
            return Ok(None);
        };
        let raw = self.fetch_raw(&username).await?;
        Ok(raw.map(|r| self.normalize(r)))
    }

    async fn list_users(&self) -> PanelResult<Vec<PanelRecord>> {
        let listing: Option<Listing> = self.get_with_retry("/api/users").await?;
        let listing =
            listing.ok_or_else(|| PanelError::Malformed("user listing returned 404".into()))?;
        Ok(listing
            .users
            .into_iter()
            .map(|raw| self.normalize(raw))
            .collect())
    }

    #[instrument(skip(self), level = "debug")]
    async fn modify_user(&self, key: &SubscriberKey, delta: UserDelta) -> PanelResult<()> {
        if delta.is_empty() {
            return Ok(());
        }
        let username = self
            .username_of(key)
            .ok_or(PanelError::Status { status: 404 })?;
        let Some(current) = self.fetch_raw(&username).await? else {
            return Err(PanelError::Status { status: 404 });
        };

        // The write API takes absolute values; additions are computed from
        // the raw byte/epoch fields just read.
        let mut patch = serde_json::Map::new();
        if delta.add_gb != 0.0 {
            let current_limit = current.data_limit.unwrap_or(0).max(0);
            let new_limit = current_limit + (delta.add_gb * BYTES_PER_GB) as i64;
            patch.insert("data_limit".into(), json!(new_limit.max(0)));
        }
        if delta.add_days != 0 {
            // Expired accounts extend from now, not from the stale expiry.
            let now = Utc::now();
            let base = current
                .expires_at
                .filter(|ts| *ts > 0)
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
                .filter(|dt| *dt > now)
                .unwrap_or(now);
            let new_expiry = base + chrono::Duration::days(delta.add_days);
            patch.insert("expires_at".into(), json!(new_expiry.timestamp()));
        }

        self.request::<Value>(
            Method::PUT,
            &format!("/api/users/{username}"),
            Some(&Value::Object(patch)),
        )
        .await?
        .ok_or(PanelError::Status { status: 404 })?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_user(&self, key: &SubscriberKey) -> PanelResult<()> {
        let username = self
            .username_of(key)
            .ok_or(PanelError::Status { status: 404 })?;
        self.request::<Value>(Method::DELETE, &format!("/api/users/{username}"), None)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn reset_usage(&self, key: &SubscriberKey) -> PanelResult<()> {
        let username = self
            .username_of(key)
            .ok_or(PanelError::Status { status: 404 })?;
        self.request::<Value>(Method::POST, &format!("/api/users/{username}/reset"), None)
            .await?
            .ok_or(PanelError::Status { status: 404 })?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    users: Vec<RawUser>,
}

/// Vendor payload for one user, as the secondary panel serves it.
#[derive(Debug, Deserialize)]
struct RawUser {
    username: String,
    status: Option<String>,
    /// Quota in bytes; absent or 0 means unlimited.
    data_limit: Option<i64>,
    /// Cumulative usage in bytes.
    used_traffic: Option<i64>,
    online_at: Option<String>,
    /// Expiry as epoch seconds; absent or 0 means no expiry.
    expires_at: Option<i64>,
}

/// Days until an epoch-seconds expiry; `None` when unset.
fn expire_days_from_epoch(expires_at: Option<i64>) -> Option<i64> {
    let ts = expires_at.filter(|ts| *ts > 0)?;
    let expiry = DateTime::<Utc>::from_timestamp(ts, 0)?;
    Some((expiry - Utc::now()).num_days())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expire_days_unset() {
        assert_eq!(expire_days_from_epoch(None), None);
        assert_eq!(expire_days_from_epoch(Some(0)), None);
    }

    #[test]
    fn test_expire_days_future() {
        let ts = (Utc::now() + chrono::Duration::days(10)).timestamp();
        let days = expire_days_from_epoch(Some(ts)).unwrap();
        assert!((9..=10).contains(&days));
    }

    #[test]
    fn test_expire_days_past_is_negative() {
        let ts = (Utc::now() - chrono::Duration::days(5)).timestamp();
        assert!(expire_days_from_epoch(Some(ts)).unwrap() < 0);
    }
}
