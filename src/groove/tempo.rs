// Tempo Estimation - BPM detection using inter-onset intervals
// Uses an IOI histogram to find the dominant beat period

use serde::{Deserialize, Serialize};

use crate::audio::onsets::Onset;

/// Tempo used when nothing better is known
pub const DEFAULT_BPM: f64 = 120.0;

/// Where the tempo for a run came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BpmSource {
    /// Set explicitly in the configuration
    Configured,

    /// Estimated from the detected onsets
    Estimated,

    /// Too little material to estimate, fell back to the default
    Default,
}

/// Tempo estimation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoEstimate {
    /// Beats per minute
    pub bpm: f64,

    /// Confidence in the estimate [0.0, 1.0]
    /// Higher values indicate stronger periodic structure
    pub confidence: f32,

    pub source: BpmSource,
}

impl TempoEstimate {
    fn fallback() -> Self {
        TempoEstimate {
            bpm: DEFAULT_BPM,
            confidence: 0.0,
            source: BpmSource::Default,
        }
    }
}

/// Configuration for tempo estimation
#[derive(Debug, Clone)]
pub struct TempoConfig {
    /// Minimum BPM to consider (typically 60)
    pub min_bpm: f64,

    /// Maximum BPM to consider (typically 180)
    pub max_bpm: f64,

    /// Number of bins for IOI histogram
    pub histogram_bins: usize,

    /// Minimum number of onsets required for estimation
    pub min_onsets: usize,
}

impl Default for TempoConfig {
    fn default() -> Self {
        TempoConfig {
            min_bpm: 60.0,
            max_bpm: 180.0,
            histogram_bins: 300,
            min_onsets: 8,
        }
    }
}

/// Use the configured tempo when present, otherwise estimate it
pub fn resolve_tempo(configured_bpm: Option<f64>, onsets: &[Onset]) -> TempoEstimate {
    match configured_bpm {
        Some(bpm) => TempoEstimate {
            bpm,
            confidence: 1.0,
            source: BpmSource::Configured,
        },
        None => estimate_tempo(onsets),
    }
}

/// Estimate tempo from onset detections
///
/// Algorithm:
/// 1. Compute inter-onset intervals (IOIs)
/// 2. Build IOI histogram, folding in half and double intervals
/// 3. Pick strongest peak in valid BPM range
/// 4. Refine the period from the raw IOIs near that peak
pub fn estimate_tempo(onsets: &[Onset]) -> TempoEstimate {
    estimate_tempo_with_config(onsets, &TempoConfig::default())
}

/// Estimate tempo with custom configuration
pub fn estimate_tempo_with_config(onsets: &[Onset], config: &TempoConfig) -> TempoEstimate {
    if onsets.len() < config.min_onsets {
        log::debug!(
            "Only {} onsets, need {} to estimate tempo",
            onsets.len(),
            config.min_onsets
        );
        return TempoEstimate::fallback();
    }

    if config.min_bpm <= 0.0 || config.max_bpm <= config.min_bpm || config.histogram_bins < 3 {
        log::warn!("Invalid tempo estimation config, using default tempo");
        return TempoEstimate::fallback();
    }

    let iois = compute_iois(onsets);
    if iois.is_empty() {
        return TempoEstimate::fallback();
    }

    let histogram = build_ioi_histogram(&iois, config);

    let Some((best_bin, peak_strength)) = find_strongest_peak(&histogram) else {
        return TempoEstimate::fallback();
    };

    let (min_interval, _) = interval_range(config);
    let bin_width = bin_width(config);
    let coarse_interval = min_interval + (best_bin as f64 + 0.5) * bin_width;
    let interval = refine_interval(&iois, coarse_interval);

    if interval <= 0.0 {
        return TempoEstimate::fallback();
    }

    // Confidence from peak strength relative to histogram mean
    let histogram_mean: f32 = histogram.iter().sum::<f32>() / histogram.len() as f32;
    let confidence = if histogram_mean > 0.0 {
        let raw = peak_strength / (histogram_mean * 3.0);
        if raw.is_finite() {
            raw.min(1.0)
        } else {
            0.0
        }
    } else {
        0.0
    };

    let bpm = (60.0 / interval).clamp(config.min_bpm, config.max_bpm);
    log::debug!("Estimated tempo {:.2} BPM (confidence {:.2})", bpm, confidence);

    TempoEstimate {
        bpm,
        confidence,
        source: BpmSource::Estimated,
    }
}

/// Compute inter-onset intervals (seconds between consecutive onsets)
fn compute_iois(onsets: &[Onset]) -> Vec<f64> {
    onsets
        .windows(2)
        .map(|pair| pair[1].time - pair[0].time)
        .filter(|interval| interval.is_finite() && *interval > 0.0)
        .collect()
}

/// Beat period range in seconds (max BPM gives the shortest period)
fn interval_range(config: &TempoConfig) -> (f64, f64) {
    (60.0 / config.max_bpm, 60.0 / config.min_bpm)
}

fn bin_width(config: &TempoConfig) -> f64 {
    let (min_interval, max_interval) = interval_range(config);
    (max_interval - min_interval) / config.histogram_bins as f64
}

/// Build histogram of inter-onset intervals
/// Bins are distributed linearly across the tempo range
fn build_ioi_histogram(iois: &[f64], config: &TempoConfig) -> Vec<f32> {
    let (min_interval, max_interval) = interval_range(config);
    let bin_width = bin_width(config);
    let mut histogram = vec![0.0f32; config.histogram_bins];

    let mut add = |interval: f64, weight: f32| {
        if interval >= min_interval && interval <= max_interval {
            let bin = ((interval - min_interval) / bin_width) as usize;
            histogram[bin.min(config.histogram_bins - 1)] += weight;
        }
    };

    for &ioi in iois {
        add(ioi, 1.0);

        // Also consider related tempi (eighth and sixteenth note patterns)
        add(ioi / 2.0, 0.5);
        add(ioi * 2.0, 0.5);
        add(ioi * 4.0, 0.25);
    }

    smooth_histogram(&histogram, 3)
}

/// Smooth histogram using moving average filter
fn smooth_histogram(histogram: &[f32], window_size: usize) -> Vec<f32> {
    let half_window = window_size / 2;

    (0..histogram.len())
        .map(|i| {
            let start = i.saturating_sub(half_window);
            let end = (i + half_window + 1).min(histogram.len());
            histogram[start..end].iter().sum::<f32>() / (end - start) as f32
        })
        .collect()
}

/// Strongest local maximum; plateaus report their first bin
fn find_strongest_peak(histogram: &[f32]) -> Option<(usize, f32)> {
    (1..histogram.len().saturating_sub(1))
        .filter(|&i| histogram[i] > histogram[i - 1] && histogram[i] >= histogram[i + 1])
        .map(|i| (i, histogram[i]))
        .fold(None, |best: Option<(usize, f32)>, candidate| match best {
            Some(b) if b.1 >= candidate.1 => Some(b),
            _ => Some(candidate),
        })
}

/// Average the raw intervals (or their half/double multiples) near the
/// coarse estimate to undo the histogram quantization
fn refine_interval(iois: &[f64], coarse: f64) -> f64 {
    let tolerance = coarse * 0.08;
    let mut sum = 0.0;
    let mut count = 0usize;

    for &ioi in iois {
        for candidate in [ioi, ioi / 2.0, ioi * 2.0, ioi * 4.0] {
            if (candidate - coarse).abs() <= tolerance {
                sum += candidate;
                count += 1;
                break;
            }
        }
    }

    if count == 0 {
        coarse
    } else {
        sum / count as f64
    }
}
