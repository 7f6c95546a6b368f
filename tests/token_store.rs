mod common;

use common::{mount_auth, mount_rotating_auth, test_client, TEST_TOKEN};
use hitem3d::{Hitem3dClient, Hitem3dError};
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_acquire_caches_token() {
    let server = MockServer::start().await;
    mount_auth(&server).await;

    let client = test_client(&server);
    let first = client.tokens().acquire().await.unwrap();
    let second = client.tokens().acquire().await.unwrap();

    assert_eq!(first.as_str(), TEST_TOKEN);
    assert_eq!(first, second);
    assert_eq!(common::request_count(&server, "/auth/token").await, 1);
}

#[tokio::test]
async fn test_concurrent_acquire_exchanges_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": 200, "data": { "accessToken": TEST_TOKEN } }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let other = client.clone();
    let (a, b) = tokio::join!(client.tokens().acquire(), other.tokens().acquire());

    assert_eq!(a.unwrap().as_str(), TEST_TOKEN);
    assert_eq!(b.unwrap().as_str(), TEST_TOKEN);
    server.verify().await;
}

#[tokio::test]
async fn test_invalidate_forces_refresh() {
    let server = MockServer::start().await;
    mount_auth(&server).await;

    let client = test_client(&server);
    let stale = client.tokens().acquire().await.unwrap();
    client.tokens().invalidate(&stale).await;
    client.tokens().acquire().await.unwrap();

    assert_eq!(common::request_count(&server, "/auth/token").await, 2);
}

#[tokio::test]
async fn test_invalidating_a_replaced_token_keeps_the_fresh_one() {
    let server = MockServer::start().await;
    mount_rotating_auth(&server, Duration::ZERO).await;

    let client = test_client(&server);
    let first = client.tokens().acquire().await.unwrap();
    client.tokens().invalidate(&first).await;
    let second = client.tokens().acquire().await.unwrap();
    assert_eq!(second.as_str(), "tok-2");

    // A late caller still holding `tok-1` must not evict `tok-2`.
    client.tokens().invalidate(&first).await;
    let third = client.tokens().acquire().await.unwrap();

    assert_eq!(third, second);
    assert_eq!(common::request_count(&server, "/auth/token").await, 2);
}

#[tokio::test]
async fn test_slow_exchange_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": 200, "data": { "accessToken": TEST_TOKEN } }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut config = common::test_config(&server, std::path::Path::new("unused"));
    config.request_timeout = Duration::from_millis(200);
    let client = Hitem3dClient::from_config(&config).unwrap();

    let started = Instant::now();
    let err = client.tokens().acquire().await.unwrap_err();

    assert!(err.is_authentication());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_rejected_exchange_carries_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 40001,
            "msg": "invalid client secret"
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.tokens().acquire().await.unwrap_err();
    match err {
        Hitem3dError::Authentication { message } => {
            assert!(message.contains("invalid client secret"))
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // A failed exchange is not cached; the next call tries again.
    assert!(client.tokens().acquire().await.is_err());
    assert_eq!(common::request_count(&server, "/auth/token").await, 2);
}

#[tokio::test]
async fn test_http_error_during_exchange_is_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.tokens().acquire().await.unwrap_err();
    assert!(err.is_authentication());
}
