use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Video metadata as observed by the client that asks for a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    pub video_id: String,
    pub video_url: String,
    pub video_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_duration: Option<String>,
}

impl VideoDetails {
    /// Build details from a video URL, deriving the id and formatted duration.
    pub fn from_url(video_url: &str, title: &str, duration: Option<u64>) -> Option<Self> {
        let video_id = extract_video_id(video_url)?;
        Some(Self {
            video_id,
            video_url: video_url.to_string(),
            video_title: clean_title(title),
            duration,
            formatted_duration: duration.and_then(format_duration),
        })
    }

    /// Known, non-zero duration in seconds.
    pub fn known_duration(&self) -> Option<u64> {
        self.duration.filter(|d| *d > 0)
    }
}

fn id_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"youtube\.com/watch\?(?:.*&)?v=([A-Za-z0-9_-]+)").expect("valid regex"),
            Regex::new(r"youtu\.be/([A-Za-z0-9_-]+)").expect("valid regex"),
            Regex::new(r"youtube\.com/shorts/([A-Za-z0-9_-]+)").expect("valid regex"),
        ]
    })
}

/// Extract the video id from a YouTube watch, short-link, or shorts URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    id_patterns()
        .iter()
        .find_map(|re| re.captures(url))
        .map(|caps| caps[1].to_string())
}

/// `H:MM:SS` for an hour or more, `M:SS` otherwise. `None` for zero.
pub fn format_duration(seconds: u64) -> Option<String> {
    if seconds == 0 {
        return None;
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        Some(format!("{}:{:02}:{:02}", hours, minutes, secs))
    } else {
        Some(format!("{}:{:02}", minutes, secs))
    }
}

/// Strip the site suffix browsers put in tab titles.
pub fn clean_title(title: &str) -> String {
    title
        .trim()
        .trim_end_matches(" - YouTube")
        .trim()
        .to_string()
}
