// Audio processing module
// WAV ingestion, drum separation, onset detection and feature extraction

pub mod features;
pub mod ingest;
pub mod onsets;
pub mod separation;

pub use features::{extract_features, onset_window, WindowError};
pub use ingest::{ingest_wav, ingest_wav_file, AudioData, AudioError};
pub use onsets::{Onset, OnsetConfig, OnsetDetector, SpectralFluxDetector};
pub use separation::{DrumSeparator, HighPassSeparator, SeparationError, SeparationHandle};
