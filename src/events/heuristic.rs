// Heuristic (rule-based) drum classifier
// Scores each candidate instrument from hand-tuned feature ranges

use crate::events::types::EventFeatures;

/// Scored outcome of one classification
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    /// Most likely label
    pub label: &'static str,

    /// Score of the selected label [0.0, 1.0]
    pub confidence: f32,

    /// Scores for every candidate, in candidate order
    pub all_scores: Vec<(&'static str, f32)>,
}

/// Feature weights used when combining band memberships
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub centroid_weight: f32,
    pub zcr_weight: f32,
    pub energy_weight: f32,
    pub decay_weight: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            centroid_weight: 1.0,
            zcr_weight: 1.0,
            energy_weight: 1.5, // Energy bands are most discriminative
            decay_weight: 0.5,
        }
    }
}

/// Trapezoidal membership: 1.0 inside [lo, hi], falling linearly to 0.0 over `soft`
#[derive(Debug, Clone, Copy)]
struct Range {
    lo: f32,
    hi: f32,
    soft: f32,
}

impl Range {
    const fn new(lo: f32, hi: f32, soft: f32) -> Self {
        Range { lo, hi, soft }
    }

    fn membership(&self, value: f32) -> f32 {
        let distance = if value < self.lo {
            self.lo - value
        } else if value > self.hi {
            value - self.hi
        } else {
            return 1.0;
        };
        (1.0 - distance / self.soft).max(0.0)
    }
}

#[derive(Debug, Clone, Copy)]
enum Band {
    Low,
    Mid,
    High,
}

impl Band {
    fn energy(&self, f: &EventFeatures) -> f32 {
        match self {
            Band::Low => f.low_band_energy,
            Band::Mid => f.mid_band_energy,
            Band::High => f.high_band_energy,
        }
    }
}

/// Expected feature ranges for one instrument
struct Profile {
    label: &'static str,
    centroid: Range,
    band: Band,
    energy: Range,
    zcr: Range,
    decay: Range,
}

/// Candidate labels in tie-break order
const PROFILES: [Profile; 8] = [
    Profile {
        label: "kick",
        centroid: Range::new(0.0, 400.0, 600.0),
        band: Band::Low,
        energy: Range::new(0.5, 1.0, 0.3),
        zcr: Range::new(0.0, 0.05, 0.1),
        decay: Range::new(0.0, 0.45, 0.3),
    },
    Profile {
        label: "snare",
        centroid: Range::new(1000.0, 3500.0, 1000.0),
        band: Band::Mid,
        energy: Range::new(0.35, 0.8, 0.2),
        zcr: Range::new(0.1, 0.35, 0.1),
        decay: Range::new(0.0, 0.6, 0.4),
    },
    Profile {
        label: "tom_high",
        centroid: Range::new(300.0, 1000.0, 400.0),
        band: Band::Mid,
        energy: Range::new(0.4, 0.8, 0.2),
        zcr: Range::new(0.0, 0.08, 0.1),
        decay: Range::new(0.5, 1.0, 0.3),
    },
    Profile {
        label: "tom_low",
        centroid: Range::new(100.0, 400.0, 300.0),
        band: Band::Low,
        energy: Range::new(0.3, 0.65, 0.2),
        zcr: Range::new(0.0, 0.08, 0.1),
        decay: Range::new(0.5, 1.0, 0.3),
    },
    Profile {
        label: "hihat_closed",
        centroid: Range::new(5000.0, 20000.0, 2000.0),
        band: Band::High,
        energy: Range::new(0.6, 1.0, 0.3),
        zcr: Range::new(0.3, 1.0, 0.15),
        decay: Range::new(0.0, 0.4, 0.3),
    },
    Profile {
        label: "hihat_open",
        centroid: Range::new(5000.0, 20000.0, 2000.0),
        band: Band::High,
        energy: Range::new(0.6, 1.0, 0.3),
        zcr: Range::new(0.3, 1.0, 0.15),
        decay: Range::new(0.6, 2.0, 0.3),
    },
    Profile {
        label: "crash",
        centroid: Range::new(3000.0, 8000.0, 2000.0),
        band: Band::High,
        energy: Range::new(0.4, 0.9, 0.2),
        zcr: Range::new(0.15, 0.45, 0.15),
        decay: Range::new(0.7, 2.0, 0.3),
    },
    Profile {
        label: "ride",
        centroid: Range::new(2000.0, 5000.0, 1500.0),
        band: Band::High,
        energy: Range::new(0.3, 0.7, 0.2),
        zcr: Range::new(0.1, 0.3, 0.1),
        decay: Range::new(0.6, 2.0, 0.3),
    },
];

/// Rule-based classifier using spectral and temporal features
#[derive(Debug, Clone, Default)]
pub struct HeuristicClassifier {
    config: ClassifierConfig,
}

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ClassifierConfig) -> Self {
        HeuristicClassifier { config }
    }

    /// Labels this classifier can emit, in tie-break order
    pub fn candidates() -> impl Iterator<Item = &'static str> {
        PROFILES.iter().map(|p| p.label)
    }

    /// Score every candidate and pick the best; the earliest candidate wins exact ties
    pub fn classify(&self, features: &EventFeatures) -> ClassificationResult {
        let all_scores: Vec<(&'static str, f32)> = PROFILES
            .iter()
            .map(|profile| (profile.label, self.score(profile, features)))
            .collect();

        let (label, confidence) = all_scores
            .iter()
            .copied()
            .fold(None, |best: Option<(&'static str, f32)>, candidate| match best {
                Some(b) if b.1 >= candidate.1 => Some(b),
                _ => Some(candidate),
            })
            .unwrap_or(("kick", 0.0));

        ClassificationResult {
            label,
            confidence,
            all_scores,
        }
    }

    fn score(&self, profile: &Profile, f: &EventFeatures) -> f32 {
        let c = &self.config;
        let total_weight = c.centroid_weight + c.zcr_weight + c.energy_weight + c.decay_weight;
        if total_weight <= 0.0 {
            return 0.0;
        }

        let score = profile.centroid.membership(f.spectral_centroid) * c.centroid_weight
            + profile.energy.membership(profile.band.energy(f)) * c.energy_weight
            + profile.zcr.membership(f.zcr) * c.zcr_weight
            + profile.decay.membership(f.decay_ratio) * c.decay_weight;

        (score / total_weight).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(
        centroid: f32,
        zcr: f32,
        bands: [f32; 3],
        decay_ratio: f32,
    ) -> EventFeatures {
        EventFeatures {
            spectral_centroid: centroid,
            zcr,
            low_band_energy: bands[0],
            mid_band_energy: bands[1],
            high_band_energy: bands[2],
            peak_amplitude: 0.8,
            decay_ratio,
        }
    }

    #[test]
    fn test_kick_classification() {
        let classifier = HeuristicClassifier::new();
        let result = classifier.classify(&features(200.0, 0.02, [0.8, 0.15, 0.05], 0.2));

        assert_eq!(result.label, "kick");
        assert!(result.confidence > 0.99);
    }

    #[test]
    fn test_closed_hihat_classification() {
        let classifier = HeuristicClassifier::new();
        let result = classifier.classify(&features(9000.0, 0.5, [0.02, 0.18, 0.8], 0.2));

        assert_eq!(result.label, "hihat_closed");
        assert!(result.confidence > 0.99);
    }

    #[test]
    fn test_snare_classification() {
        let classifier = HeuristicClassifier::new();
        let result = classifier.classify(&features(2000.0, 0.2, [0.15, 0.6, 0.25], 0.3));

        assert_eq!(result.label, "snare");
    }

    #[test]
    fn test_high_tom_classification() {
        let classifier = HeuristicClassifier::new();
        let result = classifier.classify(&features(600.0, 0.03, [0.3, 0.6, 0.1], 0.8));

        assert_eq!(result.label, "tom_high");
    }

    #[test]
    fn test_exact_tie_prefers_earlier_candidate() {
        // Sits fully inside both the crash and the ride profile
        let classifier = HeuristicClassifier::new();
        let result = classifier.classify(&features(4000.0, 0.3, [0.05, 0.25, 0.7], 1.0));

        let crash = result.all_scores.iter().find(|(l, _)| *l == "crash").unwrap().1;
        let ride = result.all_scores.iter().find(|(l, _)| *l == "ride").unwrap().1;
        assert_eq!(crash, ride);
        assert_eq!(result.label, "crash");
    }

    #[test]
    fn test_silence_scores_low() {
        let classifier = HeuristicClassifier::new();
        let result = classifier.classify(&EventFeatures::zero());

        assert!(result.confidence < 0.7);
    }

    #[test]
    fn test_all_scores_in_range() {
        let classifier = HeuristicClassifier::new();
        let result = classifier.classify(&features(1000.0, 0.2, [0.3, 0.4, 0.3], 0.5));

        assert_eq!(result.all_scores.len(), HeuristicClassifier::candidates().count());
        for (_label, score) in result.all_scores.iter() {
            assert!(*score >= 0.0 && *score <= 1.0);
        }
    }

    #[test]
    fn test_range_membership() {
        let range = Range::new(1.0, 2.0, 0.5);
        assert_eq!(range.membership(1.5), 1.0);
        assert_eq!(range.membership(0.0), 0.0);
        assert!((range.membership(2.25) - 0.5).abs() < 1e-6);
    }
}
