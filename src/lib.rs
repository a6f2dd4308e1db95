// Beatmapper - Drum onsets to rhythm-game beatmaps
// Module declarations

pub mod arranger;
pub mod audio;
pub mod beatmap;
pub mod events;
pub mod groove;
pub mod pipeline;

pub use beatmap::{Beatmap, BeatmapHit, BeatmapMetadata, DebugTrace};
pub use pipeline::{process_audio_file, Pipeline, PipelineConfig, PipelineError, PipelineOutput};
