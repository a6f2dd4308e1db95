// Groove Engine - Tempo, Grid, and Quantization
// Musical timing for transcribed hits

pub mod grid;
pub mod quantize;
pub mod tempo;

pub use grid::{GridParseError, GridResolution};
pub use quantize::{quantize, quantize_hits, QuantizedHit};
pub use tempo::{estimate_tempo, resolve_tempo, BpmSource, TempoConfig, TempoEstimate, DEFAULT_BPM};
