//! Append-only audit log of stage outputs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A workflow stage that produces output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Researcher,
    Writer,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Researcher => "researcher",
            Stage::Writer => "writer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "researcher" => Some(Stage::Researcher),
            "writer" => Some(Stage::Writer),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Position within the session's history (0-indexed).
    pub step_number: u32,
    /// Unix timestamp (milliseconds).
    pub timestamp: i64,
    pub role: Stage,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(step_number: u32, role: Stage, content: impl Into<String>) -> Self {
        Self {
            step_number,
            timestamp: chrono::Utc::now().timestamp_millis(),
            role,
            content: content.into(),
        }
    }
}
