//! Integration tests for the primary panel client against a mock server.

use httpmock::prelude::*;
use serde_json::json;
use uuid::Uuid;

use tandem_panel::{PanelApi, PrimaryClient, PrimaryConfig};
use tandem_types::{SubscriberKey, UserDelta};

fn client_for(server: &MockServer) -> PrimaryClient {
    PrimaryClient::new(PrimaryConfig::new(server.base_url(), "test-key")).unwrap()
}

#[tokio::test]
async fn test_get_user_normalizes_payload() {
    let server = MockServer::start();
    let uuid = Uuid::new_v4();

    let mock = server.mock(|when, then| {
        when.method(GET)
            .path(format!("/api/users/{uuid}"))
            .header("X-Panel-Key", "test-key");
        then.status(200).json_body(json!({
            "name": "alice",
            "uuid": uuid.to_string(),
            "enabled": true,
            "quota_gb": 20.0,
            "used_gb": 4.5,
            "last_seen": "2025-06-01T10:00:00Z",
            "start_date": "2090-01-01",
            "package_days": 30
        }));
    });

    let client = client_for(&server);
    let record = client
        .get_user(&SubscriberKey::Uuid(uuid))
        .await
        .unwrap()
        .unwrap();

    mock.assert();
    assert_eq!(record.name, "alice");
    assert_eq!(record.uuid, Some(uuid));
    assert!(record.active);
    assert_eq!(record.usage_used_gb, 4.5);
    assert_eq!(record.usage_limit_gb, 20.0);
    assert!(record.last_seen.is_some());
    // package starts in the future, so more than the package length remains
    assert!(record.expire_days.unwrap() > 30);
}

#[tokio::test]
async fn test_get_user_404_is_none() {
    let server = MockServer::start();
    let uuid = Uuid::new_v4();

    server.mock(|when, then| {
        when.method(GET).path(format!("/api/users/{uuid}"));
        then.status(404);
    });

    let client = client_for(&server);
    let record = client.get_user(&SubscriberKey::Uuid(uuid)).await.unwrap();
    assert!(record.is_none());
}

#[tokio::test]
async fn test_get_user_by_name_makes_no_call() {
    let server = MockServer::start();
    let client = client_for(&server);

    // The primary panel cannot resolve bare usernames; no request is made.
    let record = client
        .get_user(&SubscriberKey::Name("alice".into()))
        .await
        .unwrap();
    assert!(record.is_none());
}

#[tokio::test]
async fn test_server_errors_are_retried_then_surface() {
    let server = MockServer::start();
    let uuid = Uuid::new_v4();

    let mock = server.mock(|when, then| {
        when.method(GET).path(format!("/api/users/{uuid}"));
        then.status(503);
    });

    let client = client_for(&server);
    let err = client
        .get_user(&SubscriberKey::Uuid(uuid))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    // initial call + 2 retries
    mock.assert_calls(3);
}

#[tokio::test]
async fn test_unauthorized_is_auth_error_not_retried() {
    let server = MockServer::start();
    let uuid = Uuid::new_v4();

    let mock = server.mock(|when, then| {
        when.method(GET).path(format!("/api/users/{uuid}"));
        then.status(401);
    });

    let client = client_for(&server);
    let err = client
        .get_user(&SubscriberKey::Uuid(uuid))
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    mock.assert_calls(1);
}

#[tokio::test]
async fn test_malformed_timestamp_degrades_to_absent() {
    let server = MockServer::start();
    let uuid = Uuid::new_v4();

    server.mock(|when, then| {
        when.method(GET).path(format!("/api/users/{uuid}"));
        then.status(200).json_body(json!({
            "name": "bob",
            "uuid": uuid.to_string(),
            "enabled": true,
            "quota_gb": 10.0,
            "used_gb": 1.0,
            "last_seen": "???"
        }));
    });

    let client = client_for(&server);
    let record = client
        .get_user(&SubscriberKey::Uuid(uuid))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.last_seen, None);
}

#[tokio::test]
async fn test_modify_user_patches_absolute_values() {
    let server = MockServer::start();
    let uuid = Uuid::new_v4();

    server.mock(|when, then| {
        when.method(GET).path(format!("/api/users/{uuid}"));
        then.status(200).json_body(json!({
            "name": "carol",
            "uuid": uuid.to_string(),
            "enabled": true,
            "quota_gb": 10.0,
            "used_gb": 2.0,
            "start_date": "2090-01-01",
            "package_days": 10
        }));
    });

    let patch = server.mock(|when, then| {
        when.method("PATCH")
            .path(format!("/api/users/{uuid}"))
            .json_body_includes(r#"{ "quota_gb": 15.0 }"#);
        then.status(200).json_body(json!({}));
    });

    let client = client_for(&server);
    client
        .modify_user(
            &SubscriberKey::Uuid(uuid),
            UserDelta {
                add_gb: 5.0,
                add_days: 0,
            },
        )
        .await
        .unwrap();

    patch.assert();
}

#[tokio::test]
async fn test_reset_usage_zeroes_counter() {
    let server = MockServer::start();
    let uuid = Uuid::new_v4();

    let patch = server.mock(|when, then| {
        when.method("PATCH")
            .path(format!("/api/users/{uuid}"))
            .json_body_includes(r#"{ "used_gb": 0.0 }"#);
        then.status(200).json_body(json!({}));
    });

    let client = client_for(&server);
    client.reset_usage(&SubscriberKey::Uuid(uuid)).await.unwrap();
    patch.assert();
}

#[tokio::test]
async fn test_list_users_returns_all_records() {
    let server = MockServer::start();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    server.mock(|when, then| {
        when.method(GET).path("/api/users");
        then.status(200).json_body(json!([
            { "name": "a", "uuid": a.to_string(), "enabled": true, "quota_gb": 1.0, "used_gb": 0.5 },
            { "name": "b", "uuid": b.to_string(), "enabled": false, "quota_gb": 2.0, "used_gb": 1.0 }
        ]));
    });

    let client = client_for(&server);
    let users = client.list_users().await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].uuid, Some(a));
    assert!(!users[1].active);
}
