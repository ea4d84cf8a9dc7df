//! Client for the primary (UUID-keyed) panel
//!
//! The primary panel authenticates with a static API key header and
//! addresses users as `/api/users/{uuid}`. Quotas are already expressed in
//! GB; expiry is derived from a start date plus a package length in days.

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{instrument, warn};
use uuid::Uuid;

use tandem_types::{PanelKind, PanelRecord, SubscriberKey, UserDelta};

use crate::config::PrimaryConfig;
use crate::error::{PanelError, PanelResult};
use crate::retry::{with_retry, RetryConfig};
use crate::timestamp;

const API_KEY_HEADER: &str = "X-Panel-Key";

/// HTTP client for the primary panel.
#[derive(Debug, Clone)]
pub struct PrimaryClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

impl PrimaryClient {
    /// Build a client from connection settings.
    pub fn new(config: PrimaryConfig) -> PanelResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| PanelError::Malformed("api key is not a valid header value".into()))?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            retry: RetryConfig::default(),
        })
    }

    /// Issue a request and decode the JSON body. `Ok(None)` on 404.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> PanelResult<Option<T>> {
        let url = format!("{}{path}", self.base_url);
        let mut req = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status();
        metrics::counter!(
            "panel_requests_total",
            "panel" => PanelKind::Primary.as_str(),
            "status" => status.as_str().to_string()
        )
        .increment(1);

        match status {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PanelError::Auth),
            s if s.is_success() => {
                if s == StatusCode::NO_CONTENT {
                    // No body; synthesize null for callers that ignore it.
                    return serde_json::from_value(Value::Null)
                        .map(Some)
                        .map_err(|e| PanelError::Malformed(format!("{method} {path}: {e}")));
                }
                let parsed = response
                    .json::<T>()
                    .await
                    .map_err(|e| PanelError::Malformed(format!("{method} {path}: {e}")))?;
                Ok(Some(parsed))
            }
            s => Err(PanelError::Status { status: s.as_u16() }),
        }
    }

    /// GET with bounded retry; only safe for idempotent reads.
    async fn get_with_retry<T: DeserializeOwned>(&self, path: &str) -> PanelResult<Option<T>> {
        with_retry(&self.retry, || {
            self.request::<T>(Method::GET, path, None)
        })
        .await
    }

    fn uuid_of(key: &SubscriberKey) -> Option<Uuid> {
        // The primary panel only knows UUID identities; a bare username
        // cannot be resolved here.
        key.uuid()
    }
}

#[async_trait]
impl crate::api::PanelApi for PrimaryClient {
    fn kind(&self) -> PanelKind {
        PanelKind::Primary
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_user(&self, key: &SubscriberKey) -> PanelResult<Option<PanelRecord>> {
        let Some(uuid) = Self::uuid_of(key) else {
            return Ok(None);
        };
        let raw: Option<RawUser> = self.get_with_retry(&format!("/api/users/{uuid}")).await?;
        Ok(raw.map(RawUser::normalize))
    }

    async fn list_users(&self) -> PanelResult<Vec<PanelRecord>> {
        let raw: Option<Vec<RawUser>> = self.get_with_retry("/api/users").await?;
        let raw = raw.ok_or_else(|| PanelError::Malformed("user listing returned 404".into()))?;
        Ok(raw.into_iter().map(RawUser::normalize).collect())
    }

    #[instrument(skip(self), level = "debug")]
    async fn modify_user(&self, key: &SubscriberKey, delta: UserDelta) -> PanelResult<()> {
        if delta.is_empty() {
            return Ok(());
        }
        let Some(current) = self.get_user(key).await? else {
            return Err(PanelError::Status { status: 404 });
        };
        // The write API takes absolute values, so relative additions are
        // computed from the record just read.
        let mut patch = serde_json::Map::new();
        if delta.add_gb != 0.0 {
            patch.insert(
                "quota_gb".into(),
                json!(current.usage_limit_gb + delta.add_gb),
            );
        }
        if delta.add_days != 0 {
            // Expired accounts restart their package from today.
            let base_days = current.expire_days.filter(|d| *d > 0).unwrap_or(0);
            patch.insert("package_days".into(), json!(base_days + delta.add_days));
        }

        let uuid = Self::uuid_of(key).ok_or(PanelError::Status { status: 404 })?;
        self.request::<Value>(Method::PATCH, &format!("/api/users/{uuid}"), Some(&Value::Object(patch)))
            .await?
            .ok_or(PanelError::Status { status: 404 })?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_user(&self, key: &SubscriberKey) -> PanelResult<()> {
        let uuid = Self::uuid_of(key).ok_or(PanelError::Status { status: 404 })?;
        self.request::<Value>(Method::DELETE, &format!("/api/users/{uuid}"), None)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn reset_usage(&self, key: &SubscriberKey) -> PanelResult<()> {
        let uuid = Self::uuid_of(key).ok_or(PanelError::Status { status: 404 })?;
        let patch = json!({ "used_gb": 0.0 });
        self.request::<Value>(Method::PATCH, &format!("/api/users/{uuid}"), Some(&patch))
            .await?
            .ok_or(PanelError::Status { status: 404 })?;
        Ok(())
    }
}

/// Vendor payload for one user, as the primary panel serves it.
#[derive(Debug, Deserialize)]
struct RawUser {
    name: Option<String>,
    uuid: Option<String>,
    #[serde(default)]
    enabled: bool,
    quota_gb: Option<f64>,
    used_gb: Option<f64>,
    last_seen: Option<String>,
    start_date: Option<String>,
    package_days: Option<i64>,
}

impl RawUser {
    /// Normalize the vendor payload; malformed fields degrade to absent.
    fn normalize(self) -> PanelRecord {
        let uuid = self.uuid.as_deref().and_then(|raw| {
            Uuid::parse_str(raw.trim())
                .map_err(|e| warn!(raw, error = %e, "primary panel sent unparseable uuid"))
                .ok()
        });

        PanelRecord {
            name: self.name.unwrap_or_default(),
            uuid,
            active: self.enabled,
            usage_used_gb: self.used_gb.unwrap_or(0.0).max(0.0),
            usage_limit_gb: self.quota_gb.unwrap_or(0.0).max(0.0),
            last_seen: self.last_seen.as_deref().and_then(timestamp::parse_lenient),
            expire_days: remaining_days(self.start_date.as_deref(), self.package_days),
        }
    }
}

/// Days remaining in a package that started on `start_date` and runs for
/// `package_days`. `None`/0 package length means no expiry. A missing or
/// unparseable start date falls back to today, which yields the full package
/// length.
fn remaining_days(start_date: Option<&str>, package_days: Option<i64>) -> Option<i64> {
    let days = package_days.filter(|d| *d > 0)?;
    let today = Utc::now().date_naive();
    let start = start_date
        .map(|raw| raw.split('T').next().unwrap_or(raw))
        .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
        .unwrap_or(today);
    let expiry = start.checked_add_days(Days::new(days as u64))?;
    Some((expiry - today).num_days())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_days_no_package() {
        assert_eq!(remaining_days(Some("2025-01-01"), None), None);
        assert_eq!(remaining_days(Some("2025-01-01"), Some(0)), None);
    }

    #[test]
    fn test_remaining_days_missing_start_uses_today() {
        assert_eq!(remaining_days(None, Some(30)), Some(30));
        assert_eq!(remaining_days(Some("garbage"), Some(30)), Some(30));
    }

    #[test]
    fn test_remaining_days_expired_is_negative() {
        let days = remaining_days(Some("2000-01-01"), Some(30)).unwrap();
        assert!(days < 0);
    }

    #[test]
    fn test_normalize_defaults() {
        let raw = RawUser {
            name: None,
            uuid: Some("not-a-uuid".into()),
            enabled: false,
            quota_gb: None,
            used_gb: Some(-1.0),
            last_seen: Some("junk".into()),
            start_date: None,
            package_days: None,
        };
        let record = raw.normalize();
        assert_eq!(record.uuid, None);
        assert_eq!(record.usage_used_gb, 0.0);
        assert_eq!(record.usage_limit_gb, 0.0);
        assert_eq!(record.last_seen, None);
        assert_eq!(record.expire_days, None);
    }
}
