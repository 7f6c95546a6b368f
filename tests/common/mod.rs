#![allow(dead_code)]

use hitem3d::{Credentials, Hitem3dClient, Hitem3dConfig, PollConfig};
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const TEST_TOKEN: &str = "mock_access_token";

pub fn test_credentials() -> Credentials {
    Credentials::new("test_client_id", "test_client_secret")
}

pub fn test_client(server: &MockServer) -> Hitem3dClient {
    Hitem3dClient::new_with_url(test_credentials(), &server.uri()).unwrap()
}

/// Configuration pointing at `server` with millisecond-scale polling.
pub fn test_config(server: &MockServer, output_dir: &Path) -> Hitem3dConfig {
    let mut config = Hitem3dConfig::new(test_credentials());
    config.base_url = server.uri();
    config.output_dir = output_dir.to_path_buf();
    config.poll = fast_poll();
    config
}

pub fn fast_poll() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(20),
        error_backoff: Duration::from_millis(10),
        ..Default::default()
    }
}

/// Mounts a token endpoint that accepts the test credentials.
pub async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(header(
            "authorization",
            // base64("test_client_id:test_client_secret")
            "Basic dGVzdF9jbGllbnRfaWQ6dGVzdF9jbGllbnRfc2VjcmV0",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "data": { "accessToken": TEST_TOKEN }
        })))
        .mount(server)
        .await;
}

/// Hands out `tok-1`, `tok-2`, ... one per exchange.
pub struct RotatingTokens {
    issued: AtomicUsize,
    delay: Duration,
}

impl wiremock::Respond for RotatingTokens {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        ResponseTemplate::new(200)
            .set_body_json(json!({ "code": 200, "data": { "accessToken": format!("tok-{}", n) } }))
            .set_delay(self.delay)
    }
}

/// Mounts a token endpoint issuing a fresh token on every exchange, each after `delay`.
pub async fn mount_rotating_auth(server: &MockServer, delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(RotatingTokens {
            issued: AtomicUsize::new(0),
            delay,
        })
        .mount(server)
        .await;
}

pub async fn mount_submit(server: &MockServer, task_id: &str) {
    Mock::given(method("POST"))
        .and(path("/submit-task"))
        .and(header("authorization", format!("Bearer {}", TEST_TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "data": { "task_id": task_id }
        })))
        .mount(server)
        .await;
}

pub async fn mount_download(server: &MockServer, route: &str, body: &'static [u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Writes `names` as small image files into `dir`.
pub fn write_images(dir: &Path, names: &[&str]) {
    for name in names {
        std::fs::write(dir.join(name), format!("image bytes of {}", name)).unwrap();
    }
}

pub fn query_state(state: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": { "state": state } }))
}

pub fn query_success(url: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": { "state": "success", "url": url }
    }))
}

/// Replies with a scripted sequence, repeating the last entry once it runs out.
pub struct ScriptedResponder {
    script: Vec<ResponseTemplate>,
    calls: AtomicUsize,
}

impl ScriptedResponder {
    pub fn new(script: Vec<ResponseTemplate>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }
}

impl wiremock::Respond for ScriptedResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let index = call.min(self.script.len() - 1);
        self.script[index].clone()
    }
}

pub async fn mount_query_script(server: &MockServer, script: Vec<ResponseTemplate>) {
    Mock::given(method("GET"))
        .and(path("/query-task"))
        .respond_with(ScriptedResponder::new(script))
        .mount(server)
        .await;
}

/// Number of requests the server received on `route`.
pub async fn request_count(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

/// Collects progress updates from a callback.
#[derive(Default)]
pub struct ProgressLog(pub Mutex<Vec<hitem3d::ProgressUpdate>>);

impl ProgressLog {
    pub fn record(&self, update: hitem3d::ProgressUpdate) {
        self.0.lock().unwrap().push(update);
    }

    pub fn values(&self) -> Vec<f32> {
        self.0.lock().unwrap().iter().map(|u| u.progress).collect()
    }

    pub fn states(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|u| u.state.clone()).collect()
    }
}
