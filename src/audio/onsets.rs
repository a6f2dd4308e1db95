// Onset detection
// Spectral Flux onset detector behind a collaborator trait

use serde::{Deserialize, Serialize};

use super::features::{apply_hann_window, compute_fft};

/// A detected transient start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Onset {
    /// Time in seconds from the start of the audio
    pub time: f64,

    /// Onset strength [0.0, 1.0]
    pub strength: f32,
}

impl Onset {
    pub fn new(time: f64, strength: f32) -> Self {
        Onset { time, strength }
    }
}

/// Anything that turns mono samples into time-ordered onsets.
///
/// `sensitivity` is in [0.0, 1.0]; higher values report more onsets.
pub trait OnsetDetector {
    fn detect(&self, samples: &[f32], sample_rate: u32, sensitivity: f32) -> Vec<Onset>;
}

/// Configuration for the spectral flux detector
#[derive(Debug, Clone)]
pub struct OnsetConfig {
    /// FFT window size in samples (power of 2)
    pub window_size: usize,

    /// Hop size in samples (advance between frames)
    pub hop_size: usize,

    /// Minimum time between onsets in seconds
    pub min_onset_gap_secs: f64,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        OnsetConfig {
            window_size: 2048,
            hop_size: 512,
            min_onset_gap_secs: 0.030,
        }
    }
}

/// Spectral Flux detector with an adaptive `mean + factor * std` threshold
#[derive(Debug, Clone, Default)]
pub struct SpectralFluxDetector {
    config: OnsetConfig,
}

impl SpectralFluxDetector {
    pub fn new(config: OnsetConfig) -> Self {
        SpectralFluxDetector { config }
    }

    /// Threshold multiplier for a given sensitivity: 0.0 -> 3.0, 1.0 -> 0.0
    pub fn threshold_factor(sensitivity: f32) -> f32 {
        3.0 * (1.0 - sensitivity.clamp(0.0, 1.0))
    }
}

impl OnsetDetector for SpectralFluxDetector {
    fn detect(&self, samples: &[f32], sample_rate: u32, sensitivity: f32) -> Vec<Onset> {
        if samples.is_empty() || sample_rate == 0 {
            return Vec::new();
        }

        let flux = compute_spectral_flux(samples, &self.config);
        if flux.is_empty() {
            return Vec::new();
        }

        pick_onset_peaks(
            &flux,
            sample_rate,
            &self.config,
            Self::threshold_factor(sensitivity),
        )
    }
}

/// Spectral flux = sum of positive differences between consecutive magnitude spectra
fn compute_spectral_flux(samples: &[f32], config: &OnsetConfig) -> Vec<f32> {
    let window_size = config.window_size;
    let hop_size = config.hop_size;

    if hop_size == 0 || window_size == 0 || samples.len() < window_size {
        return Vec::new();
    }

    let num_frames = (samples.len() - window_size) / hop_size + 1;
    let mut flux = Vec::with_capacity(num_frames);
    let mut prev_spectrum: Option<Vec<f32>> = None;

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop_size;
        let mut windowed = samples[start..start + window_size].to_vec();
        apply_hann_window(&mut windowed);
        let spectrum = compute_fft(&windowed);

        let frame_flux = match prev_spectrum {
            Some(ref prev) => spectrum
                .iter()
                .zip(prev.iter())
                .map(|(curr, prev)| (curr - prev).max(0.0))
                .sum(),
            None => 0.0,
        };

        flux.push(frame_flux);
        prev_spectrum = Some(spectrum);
    }

    flux
}

/// Pick local flux maxima above the adaptive threshold
fn pick_onset_peaks(
    flux: &[f32],
    sample_rate: u32,
    config: &OnsetConfig,
    threshold_factor: f32,
) -> Vec<Onset> {
    if flux.len() < 3 || config.hop_size == 0 {
        return Vec::new();
    }

    let mean = flux.iter().sum::<f32>() / flux.len() as f32;
    let variance = flux.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / flux.len() as f32;
    let std_dev = variance.sqrt();
    let threshold = mean + threshold_factor * std_dev;

    let hop_secs = config.hop_size as f64 / sample_rate as f64;
    let min_gap_frames = (config.min_onset_gap_secs / hop_secs).ceil() as usize;

    let mut onsets = Vec::new();
    let mut last_onset_frame: Option<usize> = None;

    for i in 1..flux.len() - 1 {
        let is_peak = flux[i] > flux[i - 1] && flux[i] >= flux[i + 1];
        let above_threshold = flux[i] > threshold;
        let gap_ok = last_onset_frame.map_or(true, |last| i - last >= min_gap_frames);

        if is_peak && above_threshold && gap_ok {
            let strength = (flux[i] - threshold) / (std_dev + 1e-6);
            onsets.push(Onset::new(i as f64 * hop_secs, strength.clamp(0.0, 1.0)));
            last_onset_frame = Some(i);
        }
    }

    onsets
}
