// Arranger - Lane assignment for the game layout
// Converts quantized hits into lane-placed hits

pub mod alternation;
pub mod drum_lanes;

pub use alternation::{AlternationConfig, AlternationState, Alternator, DEFAULT_ALTERNATION_WINDOW_SECS};
pub use drum_lanes::{
    assign_lanes, assign_lanes_with_config, canonicalize, category, default_lane,
    AlternationStats, LaneAssignment, LaneCategory, LaneDecision, LaneHit, LANE_COUNT,
};
