//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! backed by a scriptable mock provider, so the whole HTTP surface can be
//! exercised without network access.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use personaforge_core::{
    load_config_from_str,
    testing::{fixtures, MockProvider},
    GenerationPipeline,
};
use personaforge_server::api::{create_router, WsBroadcaster};
use personaforge_server::state::AppState;

const TEST_CONFIG: &str = r#"
[provider]
backend = "gemini"

[server]
host = "127.0.0.1"
port = 8080

[credentials]
gemini_api_key = "test-secret-key"
"#;

/// Test fixture for E2E testing with a mock provider.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test(start_paused = true)]
/// async fn test_start() {
///     let fixture = TestFixture::new();
///     let response = fixture.post("/api/v1/run/start", params_json(1, 0)).await;
///     assert_eq!(response.status, StatusCode::ACCEPTED);
///     fixture.wait_idle().await;
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock provider - script responses and failures
    pub mock: Arc<MockProvider>,
    /// The pipeline behind the router, for direct inspection
    pub pipeline: GenerationPipeline,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub fn new() -> Self {
        let mock = Arc::new(MockProvider::new());
        let config = load_config_from_str(TEST_CONFIG).expect("Invalid test config");
        let pipeline = fixtures::pipeline(mock.clone());
        let state = Arc::new(AppState::new(
            config,
            pipeline.clone(),
            WsBroadcaster::default(),
        ));

        Self {
            router: create_router(state),
            mock,
            pipeline,
        }
    }

    /// Wait until no guarded operation is running.
    pub async fn wait_idle(&self) {
        let mut rx = self.pipeline.subscribe_status();
        tokio::time::timeout(Duration::from_secs(600), rx.wait_for(|s| !s.busy))
            .await
            .expect("Pipeline did not settle in time")
            .expect("Status channel closed");
    }

    /// Start a run and wait for the identity to be ready for review.
    pub async fn reviewed(&self, params: Value) {
        let response = self.post("/api/v1/run/start", params).await;
        assert_eq!(response.status, StatusCode::ACCEPTED, "{}", response.body);
        self.wait_idle().await;
    }

    /// Start, approve and wait for the campaign to complete.
    pub async fn completed(&self, params: Value) {
        self.reviewed(params).await;
        let response = self.post_empty("/api/v1/run/approve").await;
        assert_eq!(response.status, StatusCode::ACCEPTED, "{}", response.body);
        self.wait_idle().await;
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a PATCH request with JSON body.
    pub async fn patch(&self, path: &str, body: Value) -> TestResponse {
        self.request("PATCH", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Fetch a raw text body (for the metrics endpoint).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Persona parameters as a request body.
pub fn params_json(plan_weeks: u32, auto_generate_weeks: u32) -> Value {
    serde_json::json!({
        "gender": "female",
        "ethnicity": "Mediterranean",
        "age": 27,
        "style": "fitness",
        "audience": "young professionals",
        "traits": ["freckles"],
        "plan_weeks": plan_weeks,
        "auto_generate_weeks": auto_generate_weeks
    })
}
