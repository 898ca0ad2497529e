use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tubesum_core::generator::{GenerationRequest, GeneratorError, SummaryGenerator};
use tubesum_core::ipc::{ErrorKind, TubesumRequest, TubesumResponse};
use tubesum_core::models::{SummaryResult, VideoDetails};
use tubesum_core::prompt::build_prompt;
use tubesum_core::store::{StoreError, SummaryStore};
use tubesum_core::TubesumConfig;

/// Everything a request handler may touch. Built once at startup and shared
/// by the IPC and HTTP transports.
#[derive(Clone)]
pub struct RouterState {
    pub store: Arc<SummaryStore>,
    pub generator: Arc<dyn SummaryGenerator>,
    pub config: TubesumConfig,
    /// Used when no API key has been saved in the settings.
    pub fallback_api_key: Option<String>,
}

impl RouterState {
    pub fn new(
        store: Arc<SummaryStore>,
        generator: Arc<dyn SummaryGenerator>,
        config: TubesumConfig,
    ) -> Self {
        Self {
            store,
            generator,
            config,
            fallback_api_key: None,
        }
    }

    pub fn with_fallback_api_key(mut self, key: Option<String>) -> Self {
        self.fallback_api_key = key.filter(|k| !k.trim().is_empty());
        self
    }
}

pub async fn handle_request(request: TubesumRequest, state: &RouterState) -> TubesumResponse {
    let action = request.action();
    let response = dispatch(request, state).await;
    if response.is_ok() {
        tracing::debug!(action, "Request handled");
    } else {
        tracing::warn!(
            action,
            kind = ?response.error_kind,
            error = response.error.as_deref().unwrap_or(""),
            "Request failed"
        );
    }
    response
}

async fn dispatch(request: TubesumRequest, state: &RouterState) -> TubesumResponse {
    let store = &state.store;
    match request {
        TubesumRequest::Ping => TubesumResponse::pong(),
        TubesumRequest::Health => match store.get_usage().await {
            Ok(_) => TubesumResponse::ok(json!({
                "status": "healthy",
                "backend": store.backend_name(),
                "generator": state.generator.name(),
                "version": env!("CARGO_PKG_VERSION"),
            })),
            Err(e) => store_err(e),
        },
        TubesumRequest::GetCachedSummary { video_id } => match store.get_cached(&video_id).await {
            Ok(entry) => to_response(&entry),
            Err(e) => store_err(e),
        },
        TubesumRequest::GetHistory => match store.get_history().await {
            Ok(history) => to_response(&history),
            Err(e) => store_err(e),
        },
        TubesumRequest::SaveToHistory {
            video_id,
            title,
            data,
            timestamp,
        } => {
            if video_id.trim().is_empty() {
                return TubesumResponse::err(ErrorKind::Request, "videoId must not be empty");
            }
            if let Err(e) = data.validate() {
                return TubesumResponse::err(ErrorKind::Request, format!("Invalid summary data: {}", e));
            }
            let timestamp = timestamp.unwrap_or_else(Utc::now);
            match store.record_summary(&video_id, &title, data, timestamp).await {
                Ok(()) => TubesumResponse::success(),
                Err(e) => store_err(e),
            }
        }
        TubesumRequest::ClearHistory => match store.clear_all().await {
            Ok(()) => TubesumResponse::success(),
            Err(e) => store_err(e),
        },
        TubesumRequest::GetTimeSaved => match store.get_usage().await {
            Ok(usage) => to_response(&usage),
            Err(e) => store_err(e),
        },
        TubesumRequest::RecordUsage { duration_seconds } => {
            match store.record_usage(duration_seconds).await {
                Ok(()) => TubesumResponse::ok(serde_json::Value::Null),
                Err(e) => store_err(e),
            }
        }
        TubesumRequest::Summarize { video } => handle_summarize(video, state).await,
        TubesumRequest::GetInitialState { video_id } => {
            match initial_state(video_id.as_deref(), state).await {
                Ok(data) => TubesumResponse::ok(data),
                Err(e) => store_err(e),
            }
        }
        TubesumRequest::GetSettings => match store.get_settings().await {
            Ok(settings) => to_response(&settings),
            Err(e) => store_err(e),
        },
        TubesumRequest::SaveSettings { settings } => match store.save_settings(settings).await {
            Ok(()) => TubesumResponse::ok(json!({"status": "success"})),
            Err(e) => store_err(e),
        },
    }
}

/// Generate a summary and, only if generation succeeded, record it.
async fn handle_summarize(video: VideoDetails, state: &RouterState) -> TubesumResponse {
    if video.video_id.trim().is_empty() || video.video_url.trim().is_empty() {
        return TubesumResponse::err(ErrorKind::Request, "Could not get video URL.");
    }

    let settings = match state.store.get_settings().await {
        Ok(s) => s,
        Err(e) => return store_err(e),
    };

    let api_key = match settings
        .api_key()
        .map(str::to_string)
        .or_else(|| state.fallback_api_key.clone())
    {
        Some(k) => k,
        None => return generator_err(GeneratorError::MissingApiKey),
    };

    let request = GenerationRequest {
        api_key,
        video_url: video.video_url.clone(),
        prompt: build_prompt(settings.system_prompt(), &video),
    };

    tracing::info!(
        video_id = %video.video_id,
        generator = state.generator.name(),
        duration = ?video.known_duration(),
        "Generating summary"
    );

    let summary: SummaryResult = match state.generator.generate(&request).await {
        Ok(s) => s,
        Err(e) => return generator_err(e),
    };

    if let Err(e) = state
        .store
        .record_summary(&video.video_id, &video.video_title, summary.clone(), Utc::now())
        .await
    {
        return store_err(e);
    }

    TubesumResponse::ok(json!({
        "data": summary,
        "videoId": video.video_id,
        "videoTitle": video.video_title,
    }))
}

async fn initial_state(
    video_id: Option<&str>,
    state: &RouterState,
) -> Result<serde_json::Value, StoreError> {
    let settings = state.store.get_settings().await?;
    let api_key_missing = settings.api_key().is_none() && state.fallback_api_key.is_none();

    let cached = match video_id.filter(|v| !v.trim().is_empty()) {
        Some(id) => state.store.get_cached(id).await?,
        None => None,
    };
    let history = state.store.get_history().await?;

    Ok(json!({
        "apiKeyMissing": api_key_missing,
        "cachedData": cached,
        "history": history,
    }))
}

fn to_response<T: serde::Serialize>(value: &T) -> TubesumResponse {
    match serde_json::to_value(value) {
        Ok(v) => TubesumResponse::ok(v),
        Err(e) => TubesumResponse::err(ErrorKind::Storage, format!("Failed to encode response: {}", e)),
    }
}

fn store_err(e: StoreError) -> TubesumResponse {
    let kind = match e {
        StoreError::ReservedKey(_) => ErrorKind::Request,
        _ => ErrorKind::Storage,
    };
    TubesumResponse::err(kind, e.to_string())
}

fn generator_err(e: GeneratorError) -> TubesumResponse {
    TubesumResponse::err(e.kind(), e.to_string())
}
