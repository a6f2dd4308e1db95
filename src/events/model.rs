// Reference-sample classifier model
// A JSON artifact of labeled feature vectors, scored with k-nearest neighbours

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::events::backend::ClassifierError;
use crate::events::types::EventFeatures;

fn default_k() -> usize {
    5
}

/// One labeled example inside a model file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceSample {
    pub label: String,
    pub features: EventFeatures,
}

/// Model artifact loaded from disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceModel {
    /// Model name (e.g., "studio-kit-v2")
    pub name: String,

    /// Format version for future compatibility
    #[serde(default)]
    pub version: u32,

    /// Number of neighbours that vote
    #[serde(default = "default_k")]
    pub k: usize,

    pub samples: Vec<ReferenceSample>,
}

impl ReferenceModel {
    /// Load and validate a model file
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let bytes = std::fs::read(path).map_err(|e| {
            ClassifierError::ModelLoadError(format!("{}: {}", path.display(), e))
        })?;
        let model = Self::from_json_bytes(&bytes).map_err(|e| {
            ClassifierError::ModelLoadError(format!("{}: {}", path.display(), e))
        })?;
        model.validate()?;
        Ok(model)
    }

    pub fn from_json_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    fn validate(&self) -> Result<(), ClassifierError> {
        if self.k == 0 {
            return Err(ClassifierError::ModelLoadError(format!(
                "model '{}' has k = 0",
                self.name
            )));
        }
        if self.samples.is_empty() {
            return Err(ClassifierError::ModelLoadError(format!(
                "model '{}' has no reference samples",
                self.name
            )));
        }
        Ok(())
    }

    /// Classify features by majority vote of the k nearest samples.
    ///
    /// Returns the winning label and the share of neighbours that voted for
    /// it. Vote ties go to the label with the smaller summed distance, then
    /// to the alphabetically first label.
    pub fn classify(&self, features: &EventFeatures) -> Option<(String, f32)> {
        let mut distances: Vec<(&str, f32)> = self
            .samples
            .iter()
            .map(|s| (s.label.as_str(), features.distance_to(&s.features)))
            .filter(|(_, d)| d.is_finite())
            .collect();

        if distances.is_empty() {
            return None;
        }

        distances.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));

        let k = self.k.min(distances.len());

        // label -> (votes, summed distance)
        let mut votes: BTreeMap<&str, (usize, f32)> = BTreeMap::new();
        for (label, distance) in distances.iter().take(k) {
            let entry = votes.entry(*label).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += distance;
        }

        let (label, (count, _)) = votes.into_iter().fold(
            None,
            |best: Option<(&str, (usize, f32))>, candidate| match best {
                Some(b)
                    if b.1 .0 > candidate.1 .0
                        || (b.1 .0 == candidate.1 .0 && b.1 .1 <= candidate.1 .1) =>
                {
                    Some(b)
                }
                _ => Some(candidate),
            },
        )?;

        Some((label.to_string(), count as f32 / k as f32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn features(centroid: f32, zcr: f32) -> EventFeatures {
        EventFeatures {
            spectral_centroid: centroid,
            zcr,
            low_band_energy: 0.5,
            mid_band_energy: 0.3,
            high_band_energy: 0.2,
            peak_amplitude: 0.5,
            decay_ratio: 0.3,
        }
    }

    fn sample(label: &str, centroid: f32, zcr: f32) -> ReferenceSample {
        ReferenceSample {
            label: label.to_string(),
            features: features(centroid, zcr),
        }
    }

    fn two_class_model(k: usize) -> ReferenceModel {
        let mut samples = Vec::new();
        for _ in 0..5 {
            samples.push(sample("kick", 300.0, 0.05));
            samples.push(sample("hihat_closed", 8000.0, 0.4));
        }
        ReferenceModel {
            name: "test".to_string(),
            version: 1,
            k,
            samples,
        }
    }

    #[test]
    fn test_knn_classification() {
        let model = two_class_model(3);

        let (label, confidence) = model.classify(&features(320.0, 0.06)).unwrap();
        assert_eq!(label, "kick");
        assert!((confidence - 1.0).abs() < 1e-6);

        let (label, _) = model.classify(&features(7500.0, 0.35)).unwrap();
        assert_eq!(label, "hihat_closed");
    }

    #[test]
    fn test_vote_share_confidence() {
        let model = ReferenceModel {
            name: "mixed".to_string(),
            version: 1,
            k: 4,
            samples: vec![
                sample("snare", 2000.0, 0.2),
                sample("snare", 2100.0, 0.2),
                sample("snare", 2200.0, 0.2),
                sample("tom_high", 2300.0, 0.2),
            ],
        };

        let (label, confidence) = model.classify(&features(2000.0, 0.2)).unwrap();
        assert_eq!(label, "snare");
        assert!((confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_vote_tie_prefers_closer_label() {
        let model = ReferenceModel {
            name: "tie".to_string(),
            version: 1,
            k: 2,
            samples: vec![sample("snare", 1000.0, 0.2), sample("kick", 1500.0, 0.2)],
        };

        let (label, confidence) = model.classify(&features(1400.0, 0.2)).unwrap();
        assert_eq!(label, "kick");
        assert!((confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_load_round_trip_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.json");
        std::fs::write(&path, two_class_model(3).to_json_bytes().unwrap()).unwrap();

        let model = ReferenceModel::load(&path).unwrap();
        assert_eq!(model.samples.len(), 10);
        assert_eq!(model.k, 3);
    }

    #[test]
    fn test_load_failures() {
        let temp_dir = TempDir::new().unwrap();

        let missing = temp_dir.path().join("missing.json");
        assert!(matches!(
            ReferenceModel::load(&missing),
            Err(ClassifierError::ModelLoadError(_))
        ));

        let garbage = temp_dir.path().join("garbage.json");
        std::fs::write(&garbage, b"{ not json").unwrap();
        assert!(ReferenceModel::load(&garbage).is_err());

        let empty = temp_dir.path().join("empty.json");
        std::fs::write(&empty, br#"{"name": "empty", "samples": []}"#).unwrap();
        assert!(ReferenceModel::load(&empty).is_err());
    }
}
