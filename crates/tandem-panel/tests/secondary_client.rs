//! Integration tests for the secondary panel client: login flow, identity
//! map translation, and unit conversion.

use std::io::Write;
use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::json;
use uuid::Uuid;

use tandem_panel::{IdentityMap, PanelApi, SecondaryClient, SecondaryConfig};
use tandem_types::SubscriberKey;

const GB: i64 = 1024 * 1024 * 1024;

fn identity_with(uuid: Uuid, name: &str) -> Arc<IdentityMap> {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(format!(r#"{{"{uuid}": "{name}"}}"#).as_bytes())
        .unwrap();
    let map = IdentityMap::load(file.path()).unwrap();
    // keep the temp file alive for the duration of the test process
    std::mem::forget(file);
    Arc::new(map)
}

fn empty_identity() -> Arc<IdentityMap> {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"{}").unwrap();
    let map = IdentityMap::load(file.path()).unwrap();
    std::mem::forget(file);
    Arc::new(map)
}

fn client_for(server: &MockServer, identity: Arc<IdentityMap>) -> SecondaryClient {
    SecondaryClient::new(
        SecondaryConfig::new(server.base_url(), "admin", "secret"),
        identity,
    )
    .unwrap()
}

fn mock_login<'a>(server: &'a MockServer, token: &str) -> httpmock::Mock<'a> {
    let token = token.to_string();
    server.mock(move |when, then| {
        when.method(POST)
            .path("/api/auth/login")
            .json_body(json!({ "username": "admin", "password": "secret" }));
        then.status(200).json_body(json!({ "access_token": token }));
    })
}

#[tokio::test]
async fn test_login_then_get_user_converts_units() {
    let server = MockServer::start();
    let login = mock_login(&server, "tok-1");

    let user = server.mock(|when, then| {
        when.method(GET)
            .path("/api/users/alice")
            .header("authorization", "Bearer tok-1");
        then.status(200).json_body(json!({
            "username": "alice",
            "status": "active",
            "data_limit": 5 * GB,
            "used_traffic": GB,
            "online_at": "2025-06-01T10:00:00Z",
            "expires_at": 0
        }));
    });

    let client = client_for(&server, empty_identity());
    let record = client
        .get_user(&SubscriberKey::Name("alice".into()))
        .await
        .unwrap()
        .unwrap();

    login.assert();
    user.assert();
    assert_eq!(record.name, "alice");
    assert!(record.active);
    assert_eq!(record.usage_limit_gb, 5.0);
    assert_eq!(record.usage_used_gb, 1.0);
    assert_eq!(record.expire_days, None);
}

#[tokio::test]
async fn test_uuid_lookup_goes_through_identity_map() {
    let server = MockServer::start();
    let uuid = Uuid::new_v4();
    mock_login(&server, "tok-1");

    let user = server.mock(|when, then| {
        when.method(GET).path("/api/users/bob");
        then.status(200).json_body(json!({
            "username": "bob",
            "status": "disabled",
            "used_traffic": 0
        }));
    });

    let client = client_for(&server, identity_with(uuid, "bob"));
    let record = client
        .get_user(&SubscriberKey::Uuid(uuid))
        .await
        .unwrap()
        .unwrap();

    user.assert();
    // the identity map stamps the shared uuid back onto the record
    assert_eq!(record.uuid, Some(uuid));
    assert!(!record.active);
}

#[tokio::test]
async fn test_unmapped_uuid_is_none_without_call() {
    let server = MockServer::start();
    let client = client_for(&server, empty_identity());

    let record = client
        .get_user(&SubscriberKey::Uuid(Uuid::new_v4()))
        .await
        .unwrap();
    assert!(record.is_none());
}

#[tokio::test]
async fn test_rejected_token_triggers_single_relogin() {
    let server = MockServer::start();

    // first token is rejected once, the retry with the same mock succeeds
    let login = mock_login(&server, "tok-1");
    let rejected = server.mock(|when, then| {
        when.method(GET)
            .path("/api/users/alice")
            .header("authorization", "Bearer tok-1");
        then.status(401);
    });

    let client = client_for(&server, empty_identity());
    let err = client
        .get_user(&SubscriberKey::Name("alice".into()))
        .await
        .unwrap_err();

    // one login up front, one re-login after the 401, then give up with Auth
    login.assert_calls(2);
    rejected.assert_calls(2);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_list_users_unwraps_envelope() {
    let server = MockServer::start();
    mock_login(&server, "tok-1");

    server.mock(|when, then| {
        when.method(GET).path("/api/users");
        then.status(200).json_body(json!({
            "users": [
                { "username": "a", "status": "active", "used_traffic": 0 },
                { "username": "b", "status": "limited", "used_traffic": GB }
            ]
        }));
    });

    let client = client_for(&server, empty_identity());
    let users = client.list_users().await.unwrap();
    assert_eq!(users.len(), 2);
    assert!(users[0].active);
    assert!(!users[1].active);
    assert_eq!(users[1].usage_used_gb, 1.0);
}

#[tokio::test]
async fn test_reset_usage_posts_reset() {
    let server = MockServer::start();
    mock_login(&server, "tok-1");

    let reset = server.mock(|when, then| {
        when.method(POST).path("/api/users/alice/reset");
        then.status(200).json_body(json!({}));
    });

    let client = client_for(&server, empty_identity());
    client
        .reset_usage(&SubscriberKey::Name("alice".into()))
        .await
        .unwrap();
    reset.assert();
}
