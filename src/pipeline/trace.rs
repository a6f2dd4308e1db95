// Pipeline stage summaries
// One timestamped entry per stage, logged as it happens and kept for the debug sidecar

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Summary of one completed pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    /// RFC 3339 timestamp of when this entry was created
    pub timestamp: String,

    /// Pipeline stage name (e.g., "onset_detection", "classification", "quantization")
    pub stage: String,

    /// Human-readable message describing what the stage produced
    pub message: String,

    /// Optional structured data (e.g., hit counts, tempo)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl StageSummary {
    /// Create a new summary with current timestamp
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        StageSummary {
            timestamp: Utc::now().to_rfc3339(),
            stage: stage.into(),
            message: message.into(),
            data: None,
        }
    }

    /// Create a summary with structured data
    pub fn with_data(
        stage: impl Into<String>,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        StageSummary {
            data: Some(data),
            ..StageSummary::new(stage, message)
        }
    }
}

/// Ordered stage summaries for one run
#[derive(Debug, Default)]
pub struct StageLog {
    entries: Vec<StageSummary>,
}

impl StageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log a stage at info level and keep it
    pub fn record(&mut self, summary: StageSummary) {
        log::info!("[{}] {}", summary.stage, summary.message);
        self.entries.push(summary);
    }

    pub fn entries(&self) -> &[StageSummary] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<StageSummary> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_creation() {
        let entry = StageSummary::new("classification", "12 hits");

        assert_eq!(entry.stage, "classification");
        assert_eq!(entry.message, "12 hits");
        assert!(entry.data.is_none());
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());
    }

    #[test]
    fn test_summary_with_data() {
        let data = serde_json::json!({
            "count": 42,
            "bpm": 123.45
        });

        let entry = StageSummary::with_data("tempo", "Estimated tempo", data);

        assert_eq!(entry.data.unwrap()["count"], 42);
    }

    #[test]
    fn test_data_omitted_when_absent() {
        let json = serde_json::to_value(StageSummary::new("output", "done")).unwrap();
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_stage_log_keeps_order() {
        let mut log = StageLog::new();
        log.record(StageSummary::new("ingest", "loaded"));
        log.record(StageSummary::new("onset_detection", "found 3"));

        let stages: Vec<&str> = log.entries().iter().map(|e| e.stage.as_str()).collect();
        assert_eq!(stages, vec!["ingest", "onset_detection"]);
        assert_eq!(log.into_entries().len(), 2);
    }
}
