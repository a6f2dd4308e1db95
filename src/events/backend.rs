// Classifier backend selection
// Picks the reference model when one loads, the heuristic scorer otherwise

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::audio::features::{extract_features, onset_window};
use crate::audio::onsets::Onset;
use crate::events::heuristic::HeuristicClassifier;
use crate::events::model::ReferenceModel;
use crate::events::types::{ClassifiedHit, ClassifierMode, EventFeatures, UNKNOWN_LABEL};

/// Analysis window length after each onset
pub const DEFAULT_WINDOW_SECS: f64 = 0.050;

/// Errors that can occur while preparing a classifier
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Model loading failed: {0}")]
    ModelLoadError(String),

    #[error("No model path could be resolved")]
    NoModelPath,
}

/// Default model location under the user data directory
pub fn default_model_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| {
        dir.join("beatmapper")
            .join("models")
            .join("drum_classifier.json")
    })
}

/// An onset the classifier could not analyze
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedOnset {
    pub onset_index: usize,
    pub time: f64,
    pub reason: String,
}

/// Output of one classification call, including which path produced it
#[derive(Debug, Clone)]
pub struct Classification {
    pub hits: Vec<ClassifiedHit>,

    /// Scorer that produced the hits
    pub mode: ClassifierMode,

    /// Model file in use, only set in ML mode
    pub model_path: Option<PathBuf>,

    /// Why ML was requested but not used
    pub fallback_reason: Option<String>,

    pub skipped: Vec<SkippedOnset>,
}

/// Drum hit classifier with an ML/heuristic fallback.
///
/// Immutable once built, so a loaded instance can be shared and reused
/// across pipeline runs.
#[derive(Debug, Clone)]
pub struct Classifier {
    model: Option<(ReferenceModel, PathBuf)>,
    heuristic: HeuristicClassifier,
    fallback_reason: Option<String>,
    window_secs: f64,
}

impl Classifier {
    /// Heuristic-only classifier
    pub fn heuristic() -> Self {
        Classifier {
            model: None,
            heuristic: HeuristicClassifier::new(),
            fallback_reason: None,
            window_secs: DEFAULT_WINDOW_SECS,
        }
    }

    /// Resolve the classifier for a run.
    ///
    /// With `use_ml`, loads `model_path` (or the default model location).
    /// A missing or broken model never fails: it logs a warning and the
    /// heuristic scorer takes over.
    pub fn load(use_ml: bool, model_path: Option<&Path>) -> Self {
        if !use_ml {
            log::info!("ML classification disabled, using heuristic classifier");
            return Self::heuristic();
        }

        match Self::try_load_model(model_path) {
            Ok((model, path)) => {
                log::info!(
                    "Loaded classifier model '{}' ({} samples) from {}",
                    model.name,
                    model.samples.len(),
                    path.display()
                );
                Classifier {
                    model: Some((model, path)),
                    ..Self::heuristic()
                }
            }
            Err(e) => {
                log::warn!("{}; falling back to heuristic classifier", e);
                Classifier {
                    fallback_reason: Some(e.to_string()),
                    ..Self::heuristic()
                }
            }
        }
    }

    fn try_load_model(
        model_path: Option<&Path>,
    ) -> Result<(ReferenceModel, PathBuf), ClassifierError> {
        let path = model_path
            .map(Path::to_path_buf)
            .or_else(default_model_path)
            .ok_or(ClassifierError::NoModelPath)?;
        let model = ReferenceModel::load(&path)?;
        Ok((model, path))
    }

    /// Override the analysis window length
    pub fn with_window_secs(mut self, window_secs: f64) -> Self {
        self.window_secs = window_secs;
        self
    }

    pub fn mode(&self) -> ClassifierMode {
        if self.model.is_some() {
            ClassifierMode::Ml
        } else {
            ClassifierMode::Heuristic
        }
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model.as_ref().map(|(_, path)| path.as_path())
    }

    /// Label and confidence for one feature vector, plus whether the model decided
    pub fn score(&self, features: &EventFeatures) -> (String, f32, bool) {
        if let Some((model, _)) = &self.model {
            if let Some((label, confidence)) = model.classify(features) {
                return (label, confidence.clamp(0.0, 1.0), true);
            }
        }

        let result = self.heuristic.classify(features);
        (result.label.to_string(), result.confidence.clamp(0.0, 1.0), false)
    }

    /// Classify every onset against the mono audio it was detected in.
    ///
    /// Hits come back in onset order. Onsets whose window cannot be analyzed
    /// are skipped with a warning; low-confidence hits are kept as "unknown".
    pub fn classify(
        &self,
        audio: &[f32],
        sample_rate: u32,
        onsets: &[Onset],
        confidence_threshold: f32,
    ) -> Classification {
        let mut hits = Vec::with_capacity(onsets.len());
        let mut skipped = Vec::new();

        for (index, onset) in onsets.iter().enumerate() {
            let window = match onset_window(audio, sample_rate, onset.time, self.window_secs) {
                Ok(window) => window,
                Err(e) => {
                    log::warn!("Skipping onset {} at {:.3}s: {}", index, onset.time, e);
                    skipped.push(SkippedOnset {
                        onset_index: index,
                        time: onset.time,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let features = extract_features(window, sample_rate);
            let (label, confidence, ml_based) = self.score(&features);

            let component_label = if confidence < confidence_threshold {
                log::debug!(
                    "Onset {} best label '{}' at {:.2} is below threshold {:.2}",
                    index,
                    label,
                    confidence,
                    confidence_threshold
                );
                UNKNOWN_LABEL.to_string()
            } else {
                label
            };

            hits.push(ClassifiedHit {
                onset_index: index,
                onset_time: onset.time,
                component_label,
                confidence,
                ml_based,
                features,
            });
        }

        Classification {
            hits,
            mode: self.mode(),
            model_path: self.model_path().map(Path::to_path_buf),
            fallback_reason: self.fallback_reason.clone(),
            skipped,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::heuristic()
    }
}

/// One-shot classification: resolve the backend, then classify every onset
pub fn classify(
    audio: &[f32],
    sample_rate: u32,
    onsets: &[Onset],
    confidence_threshold: f32,
    use_ml: bool,
    model_path: Option<&Path>,
) -> Classification {
    Classifier::load(use_ml, model_path).classify(audio, sample_rate, onsets, confidence_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::model::ReferenceSample;
    use tempfile::TempDir;

    const RATE: u32 = 8000;

    /// One second of a decaying 100 Hz tone every quarter second
    fn test_audio() -> Vec<f32> {
        (0..RATE as usize)
            .map(|i| {
                let t = (i % (RATE as usize / 4)) as f32 / RATE as f32;
                (2.0 * std::f32::consts::PI * 100.0 * t).sin() * (-t * 40.0).exp()
            })
            .collect()
    }

    fn test_onsets() -> Vec<Onset> {
        vec![
            Onset::new(0.0, 1.0),
            Onset::new(0.25, 1.0),
            Onset::new(0.5, 1.0),
        ]
    }

    fn write_model(dir: &Path) -> PathBuf {
        let model = ReferenceModel {
            name: "unit".to_string(),
            version: 1,
            k: 1,
            samples: vec![ReferenceSample {
                label: "tom_low".to_string(),
                features: EventFeatures::zero(),
            }],
        };
        let path = dir.join("model.json");
        std::fs::write(&path, model.to_json_bytes().unwrap()).unwrap();
        path
    }

    #[test]
    fn test_heuristic_mode_when_ml_disabled() {
        let result = classify(&test_audio(), RATE, &test_onsets(), 0.0, false, None);

        assert_eq!(result.mode, ClassifierMode::Heuristic);
        assert!(result.model_path.is_none());
        assert!(result.fallback_reason.is_none());
        assert_eq!(result.hits.len(), 3);
        assert!(result.hits.iter().all(|h| !h.ml_based));
    }

    #[test]
    fn test_missing_model_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.json");

        let result = classify(&test_audio(), RATE, &test_onsets(), 0.0, true, Some(&missing));

        assert_eq!(result.mode, ClassifierMode::Heuristic);
        assert!(result.fallback_reason.is_some());
        assert_eq!(result.hits.len(), 3);
        assert!(result.hits.iter().all(|h| !h.ml_based));
    }

    #[test]
    fn test_model_mode_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_model(temp_dir.path());

        let result = classify(&test_audio(), RATE, &test_onsets(), 0.0, true, Some(&path));

        assert_eq!(result.mode, ClassifierMode::Ml);
        assert_eq!(result.model_path.as_deref(), Some(path.as_path()));
        assert!(result.hits.iter().all(|h| h.ml_based));
        // Single-sample model with k = 1 always votes for its only label
        assert!(result.hits.iter().all(|h| h.component_label == "tom_low"));
        assert!(result.hits.iter().all(|h| (h.confidence - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_below_threshold_becomes_unknown() {
        let result = classify(&test_audio(), RATE, &test_onsets(), 1.01, false, None);

        assert_eq!(result.hits.len(), 3);
        assert!(result.hits.iter().all(|h| h.is_unknown()));
    }

    #[test]
    fn test_bad_onsets_are_skipped_not_fatal() {
        let onsets = vec![
            Onset::new(0.0, 1.0),
            Onset::new(f64::NAN, 1.0),
            Onset::new(5.0, 1.0),
            Onset::new(0.5, 1.0),
        ];

        let result = classify(&test_audio(), RATE, &onsets, 0.0, false, None);

        assert_eq!(result.hits.len(), 2);
        assert_eq!(result.hits[0].onset_index, 0);
        assert_eq!(result.hits[1].onset_index, 3);
        let skipped: Vec<usize> = result.skipped.iter().map(|s| s.onset_index).collect();
        assert_eq!(skipped, vec![1, 2]);
    }

    #[test]
    fn test_confidence_in_unit_range() {
        let result = classify(&test_audio(), RATE, &test_onsets(), 0.0, false, None);
        for hit in &result.hits {
            assert!(hit.confidence >= 0.0 && hit.confidence <= 1.0);
        }
    }
}
