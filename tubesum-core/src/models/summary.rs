//! Structured summary returned by the generator.
//!
//! The generator is asked for JSON of the shape
//! `{ "summary": "...", "action_steps": ["..."], "concepts": [{ "title", "timestamp" }] }`.
//! Everything stored in the cache or history has passed [`SummaryResult::validate`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub summary: String,
    pub action_steps: Vec<String>,
    pub concepts: Vec<Concept>,
}

/// A key moment in the video, with the timestamp where it is discussed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub title: String,
    pub timestamp: String,
}

#[derive(Error, Debug, PartialEq)]
pub enum SummaryValidationError {
    #[error("summary text is empty")]
    EmptySummary,

    #[error("concept {index} has an empty title")]
    EmptyConceptTitle { index: usize },
}

impl SummaryResult {
    /// Parse and validate a generator payload.
    pub fn from_json_str(text: &str) -> Result<Self, String> {
        let parsed: SummaryResult =
            serde_json::from_str(text).map_err(|e| format!("invalid summary JSON: {}", e))?;
        parsed.validate().map_err(|e| e.to_string())?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), SummaryValidationError> {
        if self.summary.trim().is_empty() {
            return Err(SummaryValidationError::EmptySummary);
        }
        if let Some(index) = self.concepts.iter().position(|c| c.title.trim().is_empty()) {
            return Err(SummaryValidationError::EmptyConceptTitle { index });
        }
        Ok(())
    }
}

impl Concept {
    /// Offset in seconds for `M:SS` or `H:MM:SS`; anything else maps to 0.
    pub fn seconds(&self) -> u64 {
        let parts: Option<Vec<u64>> = self
            .timestamp
            .trim()
            .split(':')
            .map(|p| p.trim().parse::<u64>().ok())
            .collect();

        let total = match parts.as_deref() {
            Some([m, s]) => m.checked_mul(60).and_then(|v| v.checked_add(*s)),
            Some([h, m, s]) => h
                .checked_mul(3600)
                .and_then(|v| v.checked_add(m.checked_mul(60)?))
                .and_then(|v| v.checked_add(*s)),
            _ => None,
        };
        total.unwrap_or(0)
    }
}
