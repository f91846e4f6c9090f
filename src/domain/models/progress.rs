use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Cloning,
    Parsing,
    Indexing,
    Complete,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Complete | Stage::Failed)
    }
}

/// One point in an ingestion pass's progress stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub message: String,
    /// `0..=100`, monotonic within a stage.
    pub percentage: u8,
    /// ISO-8601, e.g. `2026-07-28T12:00:00Z`.
    pub timestamp: String,
    pub metadata: BTreeMap<String, Value>,
}

impl ProgressEvent {
    pub fn new(stage: Stage, message: impl Into<String>, percentage: u8, timestamp: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            percentage: percentage.min(100),
            timestamp: timestamp.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn complete(message: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self::new(Stage::Complete, message, 100, timestamp)
    }

    pub fn failed(message: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self::new(Stage::Failed, message, 100, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_stages() {
        assert!(Stage::Complete.is_terminal());
        assert!(Stage::Failed.is_terminal());
        assert!(!Stage::Indexing.is_terminal());
    }

    #[test]
    fn percentage_clamped_to_100() {
        let event = ProgressEvent::new(Stage::Indexing, "batch 4/3", 250, "2026-07-28T00:00:00Z");
        assert_eq!(event.percentage, 100);
    }
}
