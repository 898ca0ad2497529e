//! Summary generation via the Gemini `generateContent` API
//!
//! The video itself is passed to the model as `file_data` with the
//! `video/youtube` mime type; the prompt rides along as a text part. The model
//! is asked to answer in JSON and its text is parsed into a [`SummaryResult`].
//!
//! Generation is never retried here. A failed or malformed answer is reported
//! to the caller and nothing is written to the store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GeneratorSettings;
use crate::ipc::ErrorKind;
use crate::models::SummaryResult;

// ============================================================================
// SummaryGenerator trait
// ============================================================================

/// Abstraction over summary providers.
#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<SummaryResult, GeneratorError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// One summarization call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub api_key: String,
    pub video_url: String,
    pub prompt: String,
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum GeneratorError {
    /// Transport failure. The request URL carries the API key, so it is
    /// stripped before the error is kept.
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("API Error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("API Key not found. Please set it in the settings.")]
    MissingApiKey,

    #[error("Malformed summary response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for GeneratorError {
    fn from(e: reqwest::Error) -> Self {
        GeneratorError::Http(e.without_url())
    }
}

impl GeneratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GeneratorError::Http(_) | GeneratorError::Api { .. } => ErrorKind::Upstream,
            GeneratorError::Malformed(_) => ErrorKind::Malformed,
            GeneratorError::MissingApiKey => ErrorKind::Config,
        }
    }
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl From<&GeneratorSettings> for GeneratorConfig {
    fn from(s: &GeneratorSettings) -> Self {
        Self {
            model: s.model.clone(),
            base_url: s.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(s.timeout_seconds),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::from(&GeneratorSettings::default())
    }
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    File { file_data: FileData },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct FileData {
    file_uri: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

// ============================================================================
// GeminiSummaryClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeminiSummaryClient {
    client: Client,
    config: GeneratorConfig,
}

impl GeminiSummaryClient {
    pub fn new(config: GeneratorConfig) -> Result<Self, GeneratorError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Create a client against a custom base URL (for testing / proxies)
    pub fn with_base_url(mut config: GeneratorConfig, base_url: String) -> Result<Self, GeneratorError> {
        config.base_url = base_url.trim_end_matches('/').to_string();
        Self::new(config)
    }

    fn build_request(request: &GenerationRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart::File {
                        file_data: FileData {
                            file_uri: request.video_url.clone(),
                            mime_type: "video/youtube".to_string(),
                        },
                    },
                    GeminiPart::Text {
                        text: request.prompt.clone(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        }
    }
}

#[async_trait]
impl SummaryGenerator for GeminiSummaryClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<SummaryResult, GeneratorError> {
        if request.api_key.trim().is_empty() {
            return Err(GeneratorError::MissingApiKey);
        }

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url,
            self.config.model,
            request.api_key.trim()
        );

        tracing::debug!(model = %self.config.model, video_url = %request.video_url, "Requesting summary");

        let response = self
            .client
            .post(&url)
            .json(&Self::build_request(request))
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or_else(|| "Unknown error".to_string());

            tracing::error!(code = status.as_u16(), message = %message, "Gemini API error");

            return Err(GeneratorError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let parsed: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| GeneratorError::Malformed(format!("response body is not valid JSON: {}", e)))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| GeneratorError::Malformed("response has no candidate text".to_string()))?;

        let summary = SummaryResult::from_json_str(strip_code_fence(&text))
            .map_err(GeneratorError::Malformed)?;

        tracing::info!(
            action_steps = summary.action_steps.len(),
            concepts = summary.concepts.len(),
            "Summary generated"
        );
        Ok(summary)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Models occasionally wrap JSON in a ```json fence despite the mime type hint.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

// ============================================================================
// TESTS
// ============================================================================
