// Drum Lanes - Maps classified hits to game lanes
// Static label table plus cymbal/tom alternation

use serde::{Deserialize, Serialize};

use super::alternation::{AlternationConfig, Alternator};
use crate::groove::quantize::QuantizedHit;

/// Number of lanes in the game layout (lanes 0..=6)
pub const LANE_COUNT: u8 = 7;

pub const LANE_AUX: u8 = 0; // hi-hat pedal, second crash, aux percussion
pub const LANE_SNARE: u8 = 1;
pub const LANE_HIGH_TOM: u8 = 2;
pub const LANE_KICK: u8 = 3;
pub const LANE_LOW_TOM: u8 = 4; // also catches unrecognized labels
pub const LANE_HIHAT: u8 = 5;
pub const LANE_CYMBAL: u8 = 6;

/// How a label participates in lane assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneCategory {
    /// crash, ride
    Cymbal,

    /// tom_high, tom_mid, tom_low
    Tom,

    /// Everything else, placed by the static table only
    Fixed,
}

/// How a hit's lane was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneDecision {
    /// Static table lookup
    Fixed,

    /// First hit of a cymbal or tom run
    RunStart,

    /// Switched to the other lane of the pair
    Alternated,
}

/// A quantized hit placed on a lane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneHit {
    #[serde(flatten)]
    pub quantized: QuantizedHit,

    /// Canonical component label
    pub component: String,

    pub lane: u8,

    pub decision: LaneDecision,
}

impl LaneHit {
    pub fn time(&self) -> f64 {
        self.quantized.time()
    }
}

/// Per-category switch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternationStats {
    pub cymbal_switches: u32,
    pub tom_switches: u32,
}

/// Output of one lane assignment pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneAssignment {
    pub hits: Vec<LaneHit>,
    pub stats: AlternationStats,
}

fn normalize(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

/// Fold a raw label onto its canonical name.
///
/// Matching ignores case and treats '-' and ' ' as '_'. Labels with no
/// alias are returned normalized.
pub fn canonicalize(label: &str) -> String {
    let normalized = normalize(label);
    let canonical = match normalized.as_str() {
        "kick" | "bass_drum" | "bd" | "kick_drum" => "kick",
        "snare" | "snare_drum" | "sd" => "snare",
        "hihat_closed" | "hi_hat" | "hihat" | "hh" | "closed_hihat" | "closed_hi_hat" => {
            "hihat_closed"
        }
        "hihat_open" | "open_hihat" | "open_hi_hat" => "hihat_open",
        "hihat_pedal" | "pedal_hihat" | "hihat_foot" | "pedal_hi_hat" => "hihat_pedal",
        "tom_high" | "high_tom" | "rack_tom" => "tom_high",
        "tom_mid" | "mid_tom" => "tom_mid",
        "tom_low" | "low_tom" | "floor_tom" => "tom_low",
        "crash" | "crash_cymbal" => "crash",
        "crash2" | "crash_2" => "crash2",
        "ride" | "ride_cymbal" | "ride_bell" => "ride",
        _ => return normalized,
    };
    canonical.to_string()
}

fn fixed_lane(canonical: &str) -> u8 {
    match canonical {
        "kick" => LANE_KICK,
        "snare" => LANE_SNARE,
        "hihat_closed" | "hihat_open" => LANE_HIHAT,
        "hihat_pedal" => LANE_AUX,
        "tom_high" => LANE_HIGH_TOM,
        "tom_mid" | "tom_low" => LANE_LOW_TOM,
        "crash" | "ride" => LANE_CYMBAL,
        "crash2" => LANE_AUX,
        "cowbell" | "shaker" | "tambourine" | "woodblock" | "clap" | "claves" => LANE_AUX,
        _ => LANE_LOW_TOM,
    }
}

/// Static lane for any label, ignoring alternation
pub fn default_lane(label: &str) -> u8 {
    fixed_lane(&canonicalize(label))
}

pub fn category(label: &str) -> LaneCategory {
    match canonicalize(label).as_str() {
        "crash" | "ride" => LaneCategory::Cymbal,
        "tom_high" | "tom_mid" | "tom_low" => LaneCategory::Tom,
        _ => LaneCategory::Fixed,
    }
}

/// Assign lanes with the default spacing windows
pub fn assign_lanes(hits: Vec<QuantizedHit>) -> LaneAssignment {
    assign_lanes_with_config(hits, &AlternationConfig::default())
}

/// Assign a lane to every hit in one left-to-right pass.
///
/// Alternation state starts idle on every call, so the result depends only
/// on the ordered hits and `config`.
pub fn assign_lanes_with_config(
    hits: Vec<QuantizedHit>,
    config: &AlternationConfig,
) -> LaneAssignment {
    let mut cymbals = Alternator::new((LANE_CYMBAL, LANE_AUX), config.cymbal_window_secs);
    let mut toms = Alternator::new((LANE_HIGH_TOM, LANE_LOW_TOM), config.tom_window_secs);

    let lane_hits: Vec<LaneHit> = hits
        .into_iter()
        .map(|quantized| {
            let component = canonicalize(&quantized.hit.component_label);
            let base_lane = fixed_lane(&component);
            let time = quantized.time();

            let (lane, decision) = match category(&component) {
                LaneCategory::Fixed => (base_lane, LaneDecision::Fixed),
                LaneCategory::Cymbal => run_decision(cymbals.place(base_lane, time)),
                LaneCategory::Tom => run_decision(toms.place(base_lane, time)),
            };

            LaneHit {
                quantized,
                component,
                lane,
                decision,
            }
        })
        .collect();

    let stats = AlternationStats {
        cymbal_switches: cymbals.switch_count(),
        tom_switches: toms.switch_count(),
    };
    log::debug!(
        "Assigned {} hits to lanes ({} cymbal switches, {} tom switches)",
        lane_hits.len(),
        stats.cymbal_switches,
        stats.tom_switches
    );

    LaneAssignment {
        hits: lane_hits,
        stats,
    }
}

fn run_decision((lane, switched): (u8, bool)) -> (u8, LaneDecision) {
    if switched {
        (lane, LaneDecision::Alternated)
    } else {
        (lane, LaneDecision::RunStart)
    }
}
