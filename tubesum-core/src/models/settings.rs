use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// User settings. Every field is optional so a partial update only touches
/// the fields it carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
}

impl Settings {
    pub const API_KEY: &'static str = "apiKey";
    pub const SYSTEM_PROMPT: &'static str = "systemPrompt";
    pub const THEME: &'static str = "theme";

    pub const KEYS: [&'static str; 3] = [Self::API_KEY, Self::SYSTEM_PROMPT, Self::THEME];

    /// API key with surrounding whitespace removed; `None` when blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    pub fn theme(&self) -> Theme {
        self.theme.unwrap_or_default()
    }
}
