use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    body::Bytes,
    extract::{Query, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Tunables for the fixture endpoints.
#[derive(Clone, Debug)]
pub struct FixtureConfig {
    /// How long `/api/timeout` sleeps before answering.
    pub slow_delay: Duration,
    /// How many `/api/retry` attempts fail with 503 before one succeeds.
    pub retry_failures: usize,
    /// How long each failing `/api/retry` attempt waits before its 503.
    pub retry_delay: Duration,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            slow_delay: Duration::from_secs(3),
            retry_failures: 3,
            retry_delay: Duration::ZERO,
        }
    }
}

/// Per-router state. Counters live here rather than in globals so that
/// every test gets its own.
#[derive(Clone, Debug, Default)]
pub struct AppState {
    config: FixtureConfig,
    hits: Arc<AtomicUsize>,
    retry_attempts: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: FixtureConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Requests received on any route.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Requests received on `/api/retry`.
    pub fn retry_attempts(&self) -> usize {
        self.retry_attempts.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub test: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DataResponse {
    pub data: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct EchoResponse {
    pub method: String,
    pub content_type: Vec<String>,
    pub authorization: Option<String>,
    pub body: Value,
}

pub fn app() -> Router {
    app_with_state(AppState::default())
}

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/api/query-params", get(query_params))
        .route("/api/timeout", get(timed_out))
        .route("/api/retry", get(retry))
        .route("/api/echo", any(echo))
        .layer(middleware::from_fn_with_state(state.clone(), count_hits))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, AppState::default()).await
}

pub async fn run_with_state(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

async fn count_hits(State(state): State<AppState>, request: Request, next: Next) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    next.run(request).await
}

async fn query_params(Query(params): Query<QueryParams>) -> Json<DataResponse> {
    Json(DataResponse {
        data: vec![params.email, params.username, params.test],
    })
}

async fn timed_out(State(state): State<AppState>) -> Json<Value> {
    tokio::time::sleep(state.config.slow_delay).await;
    Json(json!({}))
}

async fn retry(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let attempt = state.retry_attempts.fetch_add(1, Ordering::SeqCst);
    if attempt < state.config.retry_failures {
        tracing::info!(attempt, "failing retry attempt");
        tokio::time::sleep(state.config.retry_delay).await;
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({})));
    }
    tracing::info!(attempt, "retry attempt succeeded");
    (StatusCode::OK, Json(json!({})))
}

async fn echo(method: Method, headers: HeaderMap, body: Bytes) -> Json<EchoResponse> {
    let content_type = headers
        .get_all(header::CONTENT_TYPE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect();
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);

    Json(EchoResponse {
        method: method.to_string(),
        content_type,
        authorization,
        body,
    })
}

/// Query string used by the `/api/query-params` tests.
pub fn sample_query() -> HashMap<String, String> {
    HashMap::from([
        ("email".to_string(), "test@test.com".to_string()),
        ("username".to_string(), "tester".to_string()),
        ("test".to_string(), "true".to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_response_serializes_to_json() {
        let resp = DataResponse {
            data: vec!["a".to_string(), "b".to_string()],
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"data":["a","b"]}"#);
    }

    #[test]
    fn query_params_default_to_empty() {
        let params: QueryParams = serde_json::from_str("{}").unwrap();
        assert!(params.email.is_empty());
        assert!(params.username.is_empty());
        assert!(params.test.is_empty());
    }

    #[test]
    fn fixture_defaults() {
        let config = FixtureConfig::default();
        assert_eq!(config.slow_delay, Duration::from_secs(3));
        assert_eq!(config.retry_failures, 3);
        assert!(config.retry_delay.is_zero());
    }

    #[test]
    fn counters_are_per_state() {
        let a = AppState::default();
        let b = AppState::default();
        a.hits.fetch_add(1, Ordering::SeqCst);
        assert_eq!(a.hits(), 1);
        assert_eq!(b.hits(), 0);
    }
}
