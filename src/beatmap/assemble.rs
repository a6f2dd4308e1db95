// Beatmap assembly and debug trace
// Packages lane hits into the beatmap and mirrors every stage per onset

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::types::{Beatmap, BeatmapHit, BeatmapMetadata};
use crate::arranger::{AlternationStats, LaneAssignment, LaneDecision, LaneHit};
use crate::audio::onsets::Onset;
use crate::events::{ClassifiedHit, Classification, ClassifierMode};
use crate::groove::TempoEstimate;
use crate::pipeline::trace::StageSummary;

/// Build the beatmap from ordered lane hits
pub fn assemble(lane_hits: &[LaneHit], mut metadata: BeatmapMetadata) -> Beatmap {
    let hits: Vec<BeatmapHit> = lane_hits
        .iter()
        .map(|hit| BeatmapHit {
            time: hit.time(),
            lane: hit.lane,
            component: hit.component.clone(),
            confidence: hit.quantized.hit.confidence,
        })
        .collect();

    metadata.hit_count = hits.len();
    Beatmap { metadata, hits }
}

/// Grid alignment of one hit, as recorded in the trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceQuantization {
    pub grid_time: f64,
    pub grid_index: i64,
    pub snap_error_ms: f64,
    pub unsnapped: bool,
}

/// Everything that happened to one onset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub onset_index: usize,

    /// Detected time; None when the detector reported a non-finite time
    #[serde(default)]
    pub onset_time: Option<f64>,

    pub onset_strength: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classified: Option<ClassifiedHit>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantized: Option<TraceQuantization>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lane: Option<u8>,

    /// Human-readable account of the decisions
    pub reasoning: String,
}

/// Debug sidecar for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugTrace {
    pub metadata: BeatmapMetadata,

    pub classifier_mode: ClassifierMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier_fallback_reason: Option<String>,

    pub tempo: TempoEstimate,

    pub alternation: AlternationStats,

    pub records: Vec<TraceRecord>,

    #[serde(default)]
    pub stages: Vec<StageSummary>,
}

/// Mirror each stage's output for the same run, keyed by onset index
pub fn build_debug_trace(
    onsets: &[Onset],
    classification: &Classification,
    assignment: &LaneAssignment,
    tempo: &TempoEstimate,
    beatmap: &Beatmap,
) -> DebugTrace {
    let classified: HashMap<usize, &ClassifiedHit> = classification
        .hits
        .iter()
        .map(|hit| (hit.onset_index, hit))
        .collect();
    let skipped: HashMap<usize, &str> = classification
        .skipped
        .iter()
        .map(|s| (s.onset_index, s.reason.as_str()))
        .collect();
    let placed: HashMap<usize, &LaneHit> = assignment
        .hits
        .iter()
        .map(|hit| (hit.quantized.hit.onset_index, hit))
        .collect();

    let records = onsets
        .iter()
        .enumerate()
        .map(|(index, onset)| {
            let classified_hit = classified.get(&index).copied();
            let lane_hit = placed.get(&index).copied();
            let reasoning = explain(
                classified_hit,
                lane_hit,
                skipped.get(&index).copied(),
                classification.mode,
            );

            TraceRecord {
                onset_index: index,
                onset_time: onset.time.is_finite().then_some(onset.time),
                onset_strength: if onset.strength.is_finite() {
                    onset.strength
                } else {
                    0.0
                },
                classified: classified_hit.cloned(),
                quantized: lane_hit.map(|hit| TraceQuantization {
                    grid_time: hit.quantized.grid_time,
                    grid_index: hit.quantized.grid_index,
                    snap_error_ms: hit.quantized.snap_error_ms,
                    unsnapped: hit.quantized.unsnapped,
                }),
                lane: lane_hit.map(|hit| hit.lane),
                reasoning,
            }
        })
        .collect();

    DebugTrace {
        metadata: beatmap.metadata.clone(),
        classifier_mode: classification.mode,
        classifier_fallback_reason: classification.fallback_reason.clone(),
        tempo: tempo.clone(),
        alternation: assignment.stats,
        records,
        stages: Vec::new(),
    }
}

fn explain(
    classified: Option<&ClassifiedHit>,
    lane_hit: Option<&LaneHit>,
    skipped: Option<&str>,
    mode: ClassifierMode,
) -> String {
    let Some(hit) = classified else {
        return match skipped {
            Some(reason) => format!("skipped: {}", reason),
            None => "skipped".to_string(),
        };
    };

    let mut parts = vec![format!(
        "classified as {} ({:.2}, {})",
        hit.component_label, hit.confidence, mode
    )];

    let Some(lane_hit) = lane_hit else {
        parts.push("dropped before lane assignment".to_string());
        return parts.join("; ");
    };

    let q = &lane_hit.quantized;
    if q.unsnapped {
        parts.push(format!(
            "left unsnapped ({:+.1} ms from grid line {})",
            q.snap_error_ms, q.grid_index
        ));
    } else {
        parts.push(format!(
            "snapped to grid line {} ({:+.1} ms)",
            q.grid_index, q.snap_error_ms
        ));
    }

    let how = match lane_hit.decision {
        LaneDecision::Fixed => "fixed",
        LaneDecision::RunStart => "run start",
        LaneDecision::Alternated => "alternated",
    };
    parts.push(format!("lane {} ({}, {})", lane_hit.lane, lane_hit.component, how));

    parts.join("; ")
}
