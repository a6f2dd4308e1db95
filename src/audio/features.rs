// Spectral feature extraction
// Computes the per-onset feature vector used by the classifiers

use realfft::RealFftPlanner;
use thiserror::Error;

use crate::events::types::EventFeatures;

/// Band boundaries for energy ratios (Hz)
const LOW_BAND_MAX_HZ: f32 = 200.0;
const MID_BAND_MAX_HZ: f32 = 2000.0;

/// Largest FFT frame used for a single onset window
const MAX_FEATURE_WINDOW: usize = 2048;

/// Reasons an onset window cannot be analyzed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindowError {
    #[error("onset time {0} is not a valid position")]
    InvalidTime(f64),

    #[error("onset at {0:.3}s starts beyond the end of the audio")]
    BeyondAudio(f64),

    #[error("onset window is empty")]
    Empty,

    #[error("onset window contains non-finite samples")]
    NonFinite,
}

/// Slice the analysis window that starts at an onset
pub fn onset_window(
    mono: &[f32],
    sample_rate: u32,
    onset_time: f64,
    window_secs: f64,
) -> Result<&[f32], WindowError> {
    if !onset_time.is_finite() || onset_time < 0.0 {
        return Err(WindowError::InvalidTime(onset_time));
    }
    if sample_rate == 0 || !window_secs.is_finite() || window_secs <= 0.0 {
        return Err(WindowError::Empty);
    }

    let start = (onset_time * sample_rate as f64) as usize;
    if start >= mono.len() {
        return Err(WindowError::BeyondAudio(onset_time));
    }

    let len = (window_secs * sample_rate as f64) as usize;
    let end = start.saturating_add(len).min(mono.len());
    let window = &mono[start..end];

    if window.is_empty() {
        return Err(WindowError::Empty);
    }
    if window.iter().any(|s| !s.is_finite()) {
        return Err(WindowError::NonFinite);
    }

    Ok(window)
}

/// Extract spectral and amplitude features from an audio segment
pub fn extract_features(samples: &[f32], sample_rate: u32) -> EventFeatures {
    if samples.is_empty() || sample_rate == 0 {
        return EventFeatures::zero();
    }

    let zcr = calculate_zcr(samples);
    let peak_amplitude = samples
        .iter()
        .fold(0.0f32, |peak, s| peak.max(s.abs()))
        .min(1.0);
    let decay_ratio = calculate_decay_ratio(samples);

    let window_size = samples.len().min(MAX_FEATURE_WINDOW);
    let (centroid, bands) = calculate_spectral_features(samples, sample_rate, window_size);

    EventFeatures {
        spectral_centroid: centroid,
        zcr,
        low_band_energy: bands[0],
        mid_band_energy: bands[1],
        high_band_energy: bands[2],
        peak_amplitude,
        decay_ratio,
    }
}

/// Calculate Zero-Crossing Rate (crossings per sample)
fn calculate_zcr(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }

    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();

    crossings as f32 / (samples.len() - 1) as f32
}

/// RMS of the second half over RMS of the first half, clamped to [0, 2]
/// Short percussive hits fall well below 1.0, ringing cymbals sit near it
fn calculate_decay_ratio(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }

    let (head, tail) = samples.split_at(samples.len() / 2);
    let head_rms = rms(head);
    if head_rms <= f32::EPSILON {
        return 0.0;
    }

    (rms(tail) / head_rms).clamp(0.0, 2.0)
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Calculate spectral centroid and band energies
/// Returns (centroid in Hz, [low, mid, high] energy ratios)
fn calculate_spectral_features(
    samples: &[f32],
    sample_rate: u32,
    window_size: usize,
) -> (f32, [f32; 3]) {
    let mut windowed = vec![0.0; window_size];
    let copy_len = samples.len().min(window_size);
    windowed[..copy_len].copy_from_slice(&samples[..copy_len]);

    apply_hann_window(&mut windowed);
    let spectrum = compute_fft(&windowed);

    let centroid = calculate_spectral_centroid(&spectrum, sample_rate, window_size);
    let bands = calculate_band_energies(&spectrum, sample_rate, window_size);

    (centroid, bands)
}

/// Apply Hann window function to reduce spectral leakage
pub(crate) fn apply_hann_window(samples: &mut [f32]) {
    let n = samples.len();
    if n == 0 {
        return;
    }

    for (i, sample) in samples.iter_mut().enumerate() {
        let w = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos());
        *sample *= w;
    }
}

/// Compute real FFT and return magnitude spectrum
pub(crate) fn compute_fft(samples: &[f32]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(samples.len());

    let mut input = samples.to_vec();
    let mut spectrum = fft.make_output_vec();

    if let Err(e) = fft.process(&mut input, &mut spectrum) {
        log::warn!("FFT failed on {} samples: {}", samples.len(), e);
        return vec![0.0; spectrum.len()];
    }

    spectrum.iter().map(|c| c.norm()).collect()
}

/// Spectral centroid (center of mass of the spectrum) in Hz
fn calculate_spectral_centroid(spectrum: &[f32], sample_rate: u32, window_size: usize) -> f32 {
    if window_size == 0 {
        return 0.0;
    }

    let bin_width = sample_rate as f32 / window_size as f32;
    let (weighted_sum, total_magnitude) = spectrum.iter().enumerate().fold(
        (0.0f32, 0.0f32),
        |(weighted, total), (i, &magnitude)| {
            (weighted + i as f32 * bin_width * magnitude, total + magnitude)
        },
    );

    if total_magnitude > 0.0 {
        weighted_sum / total_magnitude
    } else {
        0.0
    }
}

/// Energy ratios in the low (0-200 Hz), mid (200-2000 Hz) and high (2000+ Hz) bands
fn calculate_band_energies(spectrum: &[f32], sample_rate: u32, window_size: usize) -> [f32; 3] {
    if window_size == 0 || sample_rate == 0 {
        return [0.0; 3];
    }

    let bin_width = sample_rate as f32 / window_size as f32;
    let low_max_bin = (LOW_BAND_MAX_HZ / bin_width) as usize;
    let mid_max_bin = (MID_BAND_MAX_HZ / bin_width) as usize;

    let mut energies = [0.0f32; 3];
    for (i, &magnitude) in spectrum.iter().enumerate() {
        let band = if i < low_max_bin {
            0
        } else if i < mid_max_bin {
            1
        } else {
            2
        };
        energies[band] += magnitude * magnitude;
    }

    let total: f32 = energies.iter().sum();
    if total > 0.0 {
        energies.map(|e| e / total)
    } else {
        [0.0; 3]
    }
}
