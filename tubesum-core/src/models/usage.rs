use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    /// Cumulative seconds of video the user did not have to watch.
    pub time_saved: u64,
    pub videos_summarized: u64,
}
