// Pipeline execution module
// Orchestrates the audio-to-beatmap pipeline

pub mod config;
pub mod runner;
pub mod storage;
pub mod trace;

pub use config::{ConfigError, PipelineConfig, ENV_DISABLE_ML, ENV_MODEL_PATH};
pub use runner::{process_audio_file, Pipeline, PipelineError, PipelineOutput};
pub use storage::{calculate_sha256, read_json, write_json, StorageError};
pub use trace::{StageLog, StageSummary};
