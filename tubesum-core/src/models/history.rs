use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SummaryResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub video_id: String,
    pub title: String,
    pub summary: SummaryResult,
    pub timestamp: DateTime<Utc>,
}
