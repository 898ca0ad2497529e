use serde::{Deserialize, Serialize};

use super::SummaryResult;

/// Last summary computed for a video, stored under the literal video id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub summary_data: SummaryResult,
    pub video_title: String,
}
