// Beatmap file types
// The persisted beatmap and its metadata block

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::arranger::LANE_COUNT;
use crate::events::ClassifierMode;
use crate::groove::{BpmSource, GridResolution};

/// Generator string written into every beatmap
pub const GENERATOR: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// One playable note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatmapHit {
    /// Effective time in seconds (grid time when snapped)
    pub time: f64,

    pub lane: u8,

    /// Canonical component label
    pub component: String,

    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatmapMetadata {
    pub title: String,

    /// Tempo the hits were quantized at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,

    pub bpm_source: BpmSource,

    pub grid: GridResolution,

    pub lane_count: u8,

    pub hit_count: usize,

    pub classifier_mode: ClassifierMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_sha256: Option<String>,

    pub generator: String,

    /// RFC 3339 creation time
    pub created_at: String,

    pub beatmap_id: String,
}

impl BeatmapMetadata {
    /// Fresh metadata with a new id and timestamp. No tempo is recorded
    /// until `with_tempo` is called.
    pub fn new(title: impl Into<String>, grid: GridResolution, classifier_mode: ClassifierMode) -> Self {
        BeatmapMetadata {
            title: title.into(),
            bpm: None,
            bpm_source: BpmSource::Default,
            grid,
            lane_count: LANE_COUNT,
            hit_count: 0,
            classifier_mode,
            model_path: None,
            source_file: None,
            source_sha256: None,
            generator: GENERATOR.to_string(),
            created_at: Utc::now().to_rfc3339(),
            beatmap_id: Uuid::new_v4().to_string(),
        }
    }

    /// Record the tempo the grid was built from, including the fallback
    pub fn with_tempo(mut self, bpm: f64, source: BpmSource) -> Self {
        self.bpm = Some(bpm);
        self.bpm_source = source;
        self
    }

    pub fn with_source(mut self, file: impl Into<String>, sha256: impl Into<String>) -> Self {
        self.source_file = Some(file.into());
        self.source_sha256 = Some(sha256.into());
        self
    }

    pub fn with_model_path(mut self, model_path: Option<String>) -> Self {
        self.model_path = model_path;
        self
    }
}

/// A complete beatmap as written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beatmap {
    pub metadata: BeatmapMetadata,
    pub hits: Vec<BeatmapHit>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metadata() {
        let metadata = BeatmapMetadata::new("Song", GridResolution::Eighth, ClassifierMode::Heuristic);

        assert_eq!(metadata.lane_count, 7);
        assert_eq!(metadata.bpm_source, BpmSource::Default);
        assert!(metadata.generator.starts_with("beatmapper "));
        assert!(Uuid::parse_str(&metadata.beatmap_id).is_ok());
        assert!(chrono::DateTime::parse_from_rfc3339(&metadata.created_at).is_ok());
    }

    #[test]
    fn test_fallback_tempo_keeps_bpm() {
        let metadata = BeatmapMetadata::new("Song", GridResolution::Eighth, ClassifierMode::Ml);
        assert!(metadata.bpm.is_none());

        let metadata = metadata.with_tempo(120.0, BpmSource::Default);
        assert_eq!(metadata.bpm, Some(120.0));

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["bpm"], 120.0);
        assert_eq!(json["bpm_source"], "default");

        let metadata = metadata.with_tempo(98.0, BpmSource::Estimated);
        assert_eq!(metadata.bpm, Some(98.0));
        assert_eq!(metadata.bpm_source, BpmSource::Estimated);
    }

    #[test]
    fn test_hit_json_shape() {
        let hit = BeatmapHit {
            time: 1.25,
            lane: 3,
            component: "kick".to_string(),
            confidence: 0.5,
        };
        let json = serde_json::to_value(&hit).unwrap();
        let mut keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["component", "confidence", "lane", "time"]);
    }
}
