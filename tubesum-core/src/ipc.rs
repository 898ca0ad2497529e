use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Settings, SummaryResult, VideoDetails};

pub const PROTOCOL_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TubesumRequest {
    Ping,
    Health,
    GetCachedSummary {
        video_id: String,
    },
    GetHistory,
    SaveToHistory {
        video_id: String,
        title: String,
        data: SummaryResult,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    ClearHistory,
    GetTimeSaved,
    RecordUsage {
        #[serde(default)]
        duration_seconds: Option<u64>,
    },
    Summarize {
        video: VideoDetails,
    },
    GetInitialState {
        #[serde(default)]
        video_id: Option<String>,
    },
    GetSettings,
    SaveSettings {
        settings: Settings,
    },
}

impl TubesumRequest {
    /// Wire name of the action, for logging.
    pub fn action(&self) -> &'static str {
        match self {
            TubesumRequest::Ping => "ping",
            TubesumRequest::Health => "health",
            TubesumRequest::GetCachedSummary { .. } => "getCachedSummary",
            TubesumRequest::GetHistory => "getHistory",
            TubesumRequest::SaveToHistory { .. } => "saveToHistory",
            TubesumRequest::ClearHistory => "clearHistory",
            TubesumRequest::GetTimeSaved => "getTimeSaved",
            TubesumRequest::RecordUsage { .. } => "recordUsage",
            TubesumRequest::Summarize { .. } => "summarize",
            TubesumRequest::GetInitialState { .. } => "getInitialState",
            TubesumRequest::GetSettings => "getSettings",
            TubesumRequest::SaveSettings { .. } => "saveSettings",
        }
    }
}

/// Coarse classification carried to clients alongside an error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network failure or non-2xx answer from the summary provider.
    Upstream,
    /// Provider answered, but not with a usable summary.
    Malformed,
    /// Missing local configuration, e.g. no API key.
    Config,
    Storage,
    /// Request could not be decoded or was invalid.
    Request,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TubesumResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,
    pub version: String,
}

impl TubesumResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            error_kind: None,
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn err(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            error_kind: Some(kind),
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }

    pub fn success() -> Self {
        Self::ok(serde_json::json!({"success": true}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Encode a message as a MessagePack frame body (named fields).
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec_named(message)
}

pub fn decode_frame<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, rmp_serde::decode::Error> {
    rmp_serde::from_slice(bytes)
}
