//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use pikfic_api::identity::{IDENTITY_ID_HEADER, IDENTITY_NAME_HEADER};
use pikfic_api::routes;
use pikfic_api::state::AppState;
use pikfic_core::clock::Clock;
use pikfic_core::identity::OwnerId;
use pikfic_generation::client::GenerationClient;
use pikfic_persistence::selector::BackendSelector;
use pikfic_story::domain::repository::RemoteRepositories;
use pikfic_test_support::{
    FixedClock, InMemoryRemoteRepositories, InMemoryStoryRepository, ScriptedTextService,
    SequentialIds,
};
use tower::ServiceExt;

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 3, 1, 21, 0, 0).unwrap(),
    ))
}

/// The assembled app plus handles on its test doubles.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub service: Arc<ScriptedTextService>,
    pub local: Arc<InMemoryStoryRepository>,
    pub remote: Arc<InMemoryRemoteRepositories>,
}

impl TestApp {
    /// A fresh handle on the router. Clones share sessions and storage.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// The remote library of `owner`.
    pub fn remote_library(&self, owner: &str) -> Arc<InMemoryStoryRepository> {
        self.remote.repository(&OwnerId::new(owner))
    }
}

/// Build the full app router with in-memory storage, a remote backend, and a
/// model that answers with `bodies` in order. Uses the same route structure
/// as `main.rs`.
pub fn build_test_app<I, S>(bodies: I) -> TestApp
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    build_test_app_with(ScriptedTextService::with_bodies(bodies), true)
}

/// Build the full app router with a custom service and optional remote backend.
pub fn build_test_app_with(service: ScriptedTextService, remote_enabled: bool) -> TestApp {
    let service = Arc::new(service);
    let local = Arc::new(InMemoryStoryRepository::new());
    let remote = Arc::new(InMemoryRemoteRepositories::new());
    let remote_backend: Option<Arc<dyn RemoteRepositories>> = if remote_enabled {
        Some(remote.clone())
    } else {
        None
    };
    let app_state = AppState::new(
        fixed_clock(),
        Arc::new(SequentialIds::default()),
        GenerationClient::new(service.clone()),
        BackendSelector::new(local.clone(), remote_backend),
    );

    TestApp {
        router: routes::app(app_state.clone()),
        state: app_state,
        service,
        local,
        remote,
    }
}

async fn send(
    app: Router,
    method: &str,
    uri: &str,
    owner: Option<&str>,
    body: Option<&serde_json::Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(owner) = owner {
        builder = builder
            .header(IDENTITY_ID_HEADER, owner)
            .header(IDENTITY_NAME_HEADER, format!("{owner}-name"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();

    (status, body_bytes.to_vec())
}

fn as_json(bytes: &[u8]) -> serde_json::Value {
    if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(bytes).unwrap()
    }
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    owner: Option<&str>,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let (status, bytes) = send(app, "POST", uri, owner, Some(body)).await;
    (status, as_json(&bytes))
}

/// Send a GET request and return the response.
pub async fn get_json(
    app: Router,
    uri: &str,
    owner: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let (status, bytes) = send(app, "GET", uri, owner, None).await;
    (status, as_json(&bytes))
}

/// Send a DELETE request and return the response. An empty body reads as `null`.
pub async fn delete(app: Router, uri: &str, owner: Option<&str>) -> (StatusCode, serde_json::Value) {
    let (status, bytes) = send(app, "DELETE", uri, owner, None).await;
    (status, as_json(&bytes))
}

/// Send a POST to a streaming endpoint and return the raw event stream text.
pub async fn post_sse(
    app: Router,
    uri: &str,
    owner: Option<&str>,
    body: &serde_json::Value,
) -> (StatusCode, String) {
    let (status, bytes) = send(app, "POST", uri, owner, Some(body)).await;
    (status, String::from_utf8(bytes).unwrap())
}

/// `(event name, data)` pairs of an event stream, in order.
pub fn sse_events(text: &str) -> Vec<(String, serde_json::Value)> {
    text.split("\n\n")
        .filter_map(|block| {
            let mut name = None;
            let mut data = String::new();
            for line in block.lines() {
                if let Some(value) = line.strip_prefix("event:") {
                    name = Some(value.trim().to_owned());
                } else if let Some(value) = line.strip_prefix("data:") {
                    data.push_str(value.trim_start());
                }
            }
            Some((name?, serde_json::from_str(&data).ok()?))
        })
        .collect()
}

/// A setup payload for the compose endpoint.
pub fn setup_json(total_episodes: u32) -> serde_json::Value {
    serde_json::to_value(pikfic_test_support::sample_setup(total_episodes)).unwrap()
}
