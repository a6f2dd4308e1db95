// Event detection types
// Feature vectors, classified hits and the classifier mode

use serde::{Deserialize, Serialize};

/// Label emitted when no candidate clears the confidence threshold
pub const UNKNOWN_LABEL: &str = "unknown";

/// Which scorer produced a batch of hits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierMode {
    /// Reference-sample model loaded from disk
    Ml,

    /// Rule-based scorer over spectral features
    Heuristic,
}

impl ClassifierMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierMode::Ml => "ml",
            ClassifierMode::Heuristic => "heuristic",
        }
    }
}

impl std::fmt::Display for ClassifierMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spectral and temporal features extracted from an onset window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFeatures {
    /// Spectral centroid (Hz) - "center of mass" of spectrum
    pub spectral_centroid: f32,

    /// Zero-crossing rate (crossings per sample)
    pub zcr: f32,

    /// Energy share below 200 Hz
    pub low_band_energy: f32,

    /// Energy share between 200 and 2000 Hz
    pub mid_band_energy: f32,

    /// Energy share above 2000 Hz
    pub high_band_energy: f32,

    /// Peak absolute amplitude [0.0, 1.0]
    #[serde(default)]
    pub peak_amplitude: f32,

    /// RMS of the window's second half over its first half, [0.0, 2.0]
    #[serde(default)]
    pub decay_ratio: f32,
}

impl EventFeatures {
    /// Create features with all zeros
    pub fn zero() -> Self {
        EventFeatures {
            spectral_centroid: 0.0,
            zcr: 0.0,
            low_band_energy: 0.0,
            mid_band_energy: 0.0,
            high_band_energy: 0.0,
            peak_amplitude: 0.0,
            decay_ratio: 0.0,
        }
    }

    /// Euclidean distance with each dimension scaled to roughly [0, 1]
    pub fn distance_to(&self, other: &EventFeatures) -> f32 {
        let d_centroid = (self.spectral_centroid - other.spectral_centroid) / 10000.0;
        let d_zcr = self.zcr - other.zcr;
        let d_low = self.low_band_energy - other.low_band_energy;
        let d_mid = self.mid_band_energy - other.mid_band_energy;
        let d_high = self.high_band_energy - other.high_band_energy;
        let d_peak = self.peak_amplitude - other.peak_amplitude;
        let d_decay = (self.decay_ratio - other.decay_ratio) / 2.0;

        (d_centroid * d_centroid
            + d_zcr * d_zcr
            + d_low * d_low
            + d_mid * d_mid
            + d_high * d_high
            + d_peak * d_peak
            + d_decay * d_decay)
            .sqrt()
    }
}

/// One classified onset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedHit {
    /// Index of the source onset in the detector output
    pub onset_index: usize,

    /// Onset time in seconds
    pub onset_time: f64,

    /// Instrument label, or "unknown" below the confidence threshold
    pub component_label: String,

    /// Score of the winning candidate [0.0, 1.0]
    pub confidence: f32,

    /// True when the reference model produced the label
    pub ml_based: bool,

    /// Features the decision was made on
    pub features: EventFeatures,
}

impl ClassifiedHit {
    pub fn is_unknown(&self) -> bool {
        self.component_label == UNKNOWN_LABEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_strings() {
        assert_eq!(ClassifierMode::Ml.as_str(), "ml");
        assert_eq!(ClassifierMode::Heuristic.to_string(), "heuristic");
        assert_eq!(
            serde_json::to_string(&ClassifierMode::Heuristic).unwrap(),
            "\"heuristic\""
        );
    }

    #[test]
    fn test_feature_distance() {
        let f1 = EventFeatures {
            spectral_centroid: 1000.0,
            zcr: 0.1,
            low_band_energy: 0.5,
            mid_band_energy: 0.3,
            high_band_energy: 0.2,
            peak_amplitude: 0.7,
            decay_ratio: 0.4,
        };
        let f2 = f1.clone();

        assert!(f1.distance_to(&f2) < 0.001);

        let f3 = EventFeatures {
            low_band_energy: 0.9,
            ..f1.clone()
        };
        assert!((f1.distance_to(&f3) - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_features_without_optional_fields_deserialize() {
        let json = r#"{
            "spectral_centroid": 300.0,
            "zcr": 0.02,
            "low_band_energy": 0.8,
            "mid_band_energy": 0.15,
            "high_band_energy": 0.05
        }"#;
        let features: EventFeatures = serde_json::from_str(json).unwrap();
        assert_eq!(features.peak_amplitude, 0.0);
        assert_eq!(features.decay_ratio, 0.0);
    }
}
