//! Prompt assembly. The prompt wording itself is configuration: the user's
//! `systemPrompt` setting wins, otherwise [`DEFAULT_SYSTEM_PROMPT`] is used.

use crate::models::{format_duration, VideoDetails};

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert at distilling videos into practical knowledge.
Watch the video and respond with a single JSON object with exactly these fields:
- "summary": a concise summary of the video (markdown **bold** allowed, newlines allowed)
- "action_steps": an array of short, concrete actions the viewer can take
- "concepts": an array of objects {"title": string, "timestamp": "M:SS" or "H:MM:SS"} marking where each key concept is discussed
Respond with JSON only."#;

/// System prompt plus a length hint when the video duration is known.
pub fn build_prompt(system_prompt: Option<&str>, video: &VideoDetails) -> String {
    let base = system_prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let length = video
        .formatted_duration
        .clone()
        .or_else(|| video.known_duration().and_then(format_duration));

    match length {
        Some(length) => format!(
            "{}\n\nThe video is {} long. Keep every concept timestamp within that length and scale the level of detail to it.",
            base, length
        ),
        None => base.to_string(),
    }
}
