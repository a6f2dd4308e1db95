// Beatmap module
// Persisted beatmap types, assembly and the debug trace

pub mod assemble;
pub mod types;

pub use assemble::{assemble, build_debug_trace, DebugTrace, TraceQuantization, TraceRecord};
pub use types::{Beatmap, BeatmapHit, BeatmapMetadata, GENERATOR};
