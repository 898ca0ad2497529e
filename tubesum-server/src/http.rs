//! Tubesum HTTP API
//!
//! Axum-based HTTP server exposing the same actions as the Unix socket IPC
//! server. Runs alongside it on port 8767 (configurable).
//!
//! Each endpoint has a thin axum handler that delegates to an inner function;
//! the inner functions build a [`TubesumRequest`] and go through the shared
//! router, so both transports behave identically.
//!
//! Endpoints:
//! - GET    /health            - backend health
//! - GET    /version           - server version info
//! - POST   /rpc               - any action, as `{"action": ..., ...}`
//! - GET    /cache/:video_id   - cached summary (`data` is null on a miss)
//! - GET    /history           - recent summaries, most recent first
//! - DELETE /history           - clear cache, history and usage
//! - GET    /stats             - usage counters
//! - POST   /usage             - record a summarized video's duration
//! - POST   /summarize         - generate and record a summary
//! - GET    /settings          - read settings
//! - PUT    /settings          - update settings

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tubesum_core::ipc::{ErrorKind, TubesumRequest, TubesumResponse};
use tubesum_core::models::{Settings, VideoDetails};

use crate::router::{self, RouterState};

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<RouterState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/rpc", post(rpc_handler))
        .route("/cache/:video_id", get(cached_handler))
        .route("/history", get(history_handler).delete(clear_history_handler))
        .route("/stats", get(stats_handler))
        .route("/usage", post(usage_handler))
        .route("/summarize", post(summarize_handler))
        .route("/settings", get(get_settings_handler).put(put_settings_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: RouterState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);
    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Tubesum HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRequest {
    #[serde(default)]
    pub duration_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    pub video_url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<u64>,
}

// ============================================================================
// Inner functions
// ============================================================================

pub async fn health_inner(state: &RouterState) -> (StatusCode, serde_json::Value) {
    let response = router::handle_request(TubesumRequest::Health, state).await;
    match response_to_http(response) {
        Ok(mut data) => {
            if let Some(obj) = data.as_object_mut() {
                obj.insert(
                    "socket".to_string(),
                    serde_json::json!(state.config.service.socket_path),
                );
            }
            (StatusCode::OK, data)
        }
        Err((_, body)) => (StatusCode::SERVICE_UNAVAILABLE, body),
    }
}

/// Pure, no IO.
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "tubesum/1",
    })
}

/// Dispatch an arbitrary action. The full response envelope is returned.
pub async fn rpc_inner(
    state: &RouterState,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = match serde_json::from_value::<TubesumRequest>(body) {
        Ok(request) => router::handle_request(request, state).await,
        Err(e) => TubesumResponse::err(ErrorKind::Request, format!("Invalid request: {}", e)),
    };
    let status = response
        .error_kind
        .map(status_for_kind)
        .unwrap_or(StatusCode::OK);
    let body = serde_json::to_value(&response).unwrap_or_else(|e| {
        serde_json::json!({"status": "error", "error": e.to_string()})
    });
    (status, body)
}

pub async fn cached_inner(state: &RouterState, video_id: String) -> (StatusCode, serde_json::Value) {
    let response = router::handle_request(TubesumRequest::GetCachedSummary { video_id }, state).await;
    respond(response, |data| serde_json::json!({ "data": data }))
}

pub async fn history_inner(state: &RouterState) -> (StatusCode, serde_json::Value) {
    respond(router::handle_request(TubesumRequest::GetHistory, state).await, |d| d)
}

pub async fn clear_history_inner(state: &RouterState) -> (StatusCode, serde_json::Value) {
    respond(router::handle_request(TubesumRequest::ClearHistory, state).await, |d| d)
}

pub async fn stats_inner(state: &RouterState) -> (StatusCode, serde_json::Value) {
    respond(router::handle_request(TubesumRequest::GetTimeSaved, state).await, |d| d)
}

pub async fn usage_inner(state: &RouterState, req: UsageRequest) -> (StatusCode, serde_json::Value) {
    let request = TubesumRequest::RecordUsage {
        duration_seconds: req.duration_seconds,
    };
    respond(router::handle_request(request, state).await, |_| {
        serde_json::json!({"success": true})
    })
}

pub async fn summarize_inner(
    state: &RouterState,
    req: SummarizeRequest,
) -> (StatusCode, serde_json::Value) {
    let title = req.title.as_deref().unwrap_or("");
    let video = match VideoDetails::from_url(req.video_url.trim(), title, req.duration) {
        Some(v) => v,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                error_body(ErrorKind::Request, "videoUrl is not a YouTube video URL"),
            );
        }
    };

    respond(router::handle_request(TubesumRequest::Summarize { video }, state).await, |d| d)
}

pub async fn get_settings_inner(state: &RouterState) -> (StatusCode, serde_json::Value) {
    respond(router::handle_request(TubesumRequest::GetSettings, state).await, |d| d)
}

pub async fn put_settings_inner(
    state: &RouterState,
    settings: Settings,
) -> (StatusCode, serde_json::Value) {
    respond(
        router::handle_request(TubesumRequest::SaveSettings { settings }, state).await,
        |d| d,
    )
}

// ============================================================================
// Axum handler wrappers
// ============================================================================

pub async fn health_handler(State(state): State<Arc<RouterState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn rpc_handler(
    State(state): State<Arc<RouterState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let (status, body) = rpc_inner(&state, body).await;
    (status, Json(body))
}

pub async fn cached_handler(
    State(state): State<Arc<RouterState>>,
    Path(video_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = cached_inner(&state, video_id).await;
    (status, Json(body))
}

pub async fn history_handler(State(state): State<Arc<RouterState>>) -> impl IntoResponse {
    let (status, body) = history_inner(&state).await;
    (status, Json(body))
}

pub async fn clear_history_handler(State(state): State<Arc<RouterState>>) -> impl IntoResponse {
    let (status, body) = clear_history_inner(&state).await;
    (status, Json(body))
}

pub async fn stats_handler(State(state): State<Arc<RouterState>>) -> impl IntoResponse {
    let (status, body) = stats_inner(&state).await;
    (status, Json(body))
}

pub async fn usage_handler(
    State(state): State<Arc<RouterState>>,
    Json(req): Json<UsageRequest>,
) -> impl IntoResponse {
    let (status, body) = usage_inner(&state, req).await;
    (status, Json(body))
}

pub async fn summarize_handler(
    State(state): State<Arc<RouterState>>,
    Json(req): Json<SummarizeRequest>,
) -> impl IntoResponse {
    let (status, body) = summarize_inner(&state, req).await;
    (status, Json(body))
}

pub async fn get_settings_handler(State(state): State<Arc<RouterState>>) -> impl IntoResponse {
    let (status, body) = get_settings_inner(&state).await;
    (status, Json(body))
}

pub async fn put_settings_handler(
    State(state): State<Arc<RouterState>>,
    Json(settings): Json<Settings>,
) -> impl IntoResponse {
    let (status, body) = put_settings_inner(&state, settings).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// Map an error kind onto the closest HTTP status.
pub fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Request | ErrorKind::Config => StatusCode::BAD_REQUEST,
        ErrorKind::Upstream | ErrorKind::Malformed => StatusCode::BAD_GATEWAY,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_body(kind: ErrorKind, msg: &str) -> serde_json::Value {
    serde_json::json!({
        "error": msg,
        "kind": kind,
        "status": "error",
    })
}

/// Convert an IPC response into an HTTP body, or a status + error body.
pub fn response_to_http(
    response: TubesumResponse,
) -> std::result::Result<serde_json::Value, (StatusCode, serde_json::Value)> {
    if response.is_ok() {
        return Ok(response.data.unwrap_or(serde_json::Value::Null));
    }
    let kind = response.error_kind.unwrap_or(ErrorKind::Storage);
    let msg = response.error.unwrap_or_else(|| "unknown error".to_string());
    Err((status_for_kind(kind), error_body(kind, &msg)))
}

fn respond(
    response: TubesumResponse,
    shape: impl FnOnce(serde_json::Value) -> serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    match response_to_http(response) {
        Ok(data) => (StatusCode::OK, shape(data)),
        Err(err) => err,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tubesum_core::generator::{GenerationRequest, GeneratorError, SummaryGenerator};
    use tubesum_core::kv::MemoryKvStore;
    use tubesum_core::models::SummaryResult;
    use tubesum_core::store::SummaryStore;
    use tubesum_core::TubesumConfig;

    struct Unreachable;

    #[async_trait]
    impl SummaryGenerator for Unreachable {
        async fn generate(&self, _: &GenerationRequest) -> Result<SummaryResult, GeneratorError> {
            Err(GeneratorError::Api {
                code: 503,
                message: "provider down".to_string(),
            })
        }

        fn name(&self) -> &str {
            "unreachable"
        }
    }

    fn make_state() -> RouterState {
        RouterState::new(
            Arc::new(SummaryStore::new(Arc::new(MemoryKvStore::new()))),
            Arc::new(Unreachable),
            TubesumConfig::ephemeral("/tmp/tubesum-http-test.sock"),
        )
        .with_fallback_api_key(Some("k".to_string()))
    }

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["protocol"], "tubesum/1");
    }

    #[test]
    fn test_response_to_http_ok() {
        let resp = TubesumResponse::ok(serde_json::json!({"timeSaved": 5}));
        assert_eq!(response_to_http(resp).unwrap()["timeSaved"], 5);
    }

    #[test]
    fn test_response_to_http_error_maps_kind() {
        let resp = TubesumResponse::err(ErrorKind::Malformed, "bad json");
        let (status, body) = response_to_http(resp).unwrap_err();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "bad json");
        assert_eq!(body["kind"], "malformed");
    }

    #[test]
    fn test_response_to_http_error_no_message() {
        let mut resp = TubesumResponse::err(ErrorKind::Storage, "x");
        resp.error = None;
        let (status, body) = response_to_http(resp).unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "unknown error");
    }

    #[tokio::test]
    async fn test_health_inner_ok() {
        let state = make_state();
        let (status, body) = health_inner(&state).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["socket"], "/tmp/tubesum-http-test.sock");
    }

    #[tokio::test]
    async fn test_cached_inner_miss_is_null() {
        let state = make_state();
        let (status, body) = cached_inner(&state, "missing".to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_rpc_inner_rejects_unknown_action() {
        let state = make_state();
        let (status, body) = rpc_inner(&state, serde_json::json!({"action": "nope"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["errorKind"], "request");
    }

    #[tokio::test]
    async fn test_summarize_inner_bad_url() {
        let state = make_state();
        let req = SummarizeRequest {
            video_url: "https://example.com/video".to_string(),
            title: None,
            duration: None,
        };
        let (status, body) = summarize_inner(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "request");
    }

    #[tokio::test]
    async fn test_summarize_inner_upstream_failure_is_bad_gateway() {
        let state = make_state();
        let req = SummarizeRequest {
            video_url: "https://www.youtube.com/watch?v=abc".to_string(),
            title: Some("Title".to_string()),
            duration: Some(60),
        };
        let (status, body) = summarize_inner(&state, req).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["kind"], "upstream");
        assert_eq!(body["error"], "API Error (503): provider down");
    }

    #[tokio::test]
    async fn test_usage_then_stats() {
        let state = make_state();
        usage_inner(&state, UsageRequest { duration_seconds: Some(600) }).await;
        usage_inner(&state, UsageRequest { duration_seconds: None }).await;
        let (status, body) = stats_inner(&state).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"timeSaved": 600, "videosSummarized": 1}));
    }
}
