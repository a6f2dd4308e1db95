// Alternation - two-lane switching for cymbal and tom runs
// Close hits in the same category bounce between a pair of lanes

use serde::{Deserialize, Serialize};

/// Default spacing window for both categories, in seconds
pub const DEFAULT_ALTERNATION_WINDOW_SECS: f64 = 0.5;

fn default_window() -> f64 {
    DEFAULT_ALTERNATION_WINDOW_SECS
}

/// Spacing windows that decide whether a hit continues a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternationConfig {
    /// Max gap between cymbal hits that still alternate (inclusive)
    #[serde(default = "default_window")]
    pub cymbal_window_secs: f64,

    /// Max gap between tom hits that still alternate (inclusive)
    #[serde(default = "default_window")]
    pub tom_window_secs: f64,
}

impl Default for AlternationConfig {
    fn default() -> Self {
        AlternationConfig {
            cymbal_window_secs: DEFAULT_ALTERNATION_WINDOW_SECS,
            tom_window_secs: DEFAULT_ALTERNATION_WINDOW_SECS,
        }
    }
}

/// Per-category run state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlternationState {
    /// No hit seen yet in this category
    Idle,

    /// Last hit of the category and where it went
    Armed { last_lane: u8, last_time: f64 },
}

/// Alternation engine for one category
#[derive(Debug, Clone)]
pub struct Alternator {
    pair: (u8, u8),
    window_secs: f64,
    state: AlternationState,
    switch_count: u32,
}

impl Alternator {
    /// `pair` holds the two lanes the category bounces between
    pub fn new(pair: (u8, u8), window_secs: f64) -> Self {
        Alternator {
            pair,
            window_secs,
            state: AlternationState::Idle,
            switch_count: 0,
        }
    }

    pub fn state(&self) -> AlternationState {
        self.state
    }

    pub fn switch_count(&self) -> u32 {
        self.switch_count
    }

    fn other(&self, lane: u8) -> u8 {
        if lane == self.pair.0 {
            self.pair.1
        } else {
            self.pair.0
        }
    }

    /// Place a hit at `time` whose static lane is `base_lane`.
    ///
    /// Returns the lane and whether it came from a switch. Within the window
    /// the hit takes the other lane of the pair; otherwise it starts a fresh
    /// run on `base_lane`.
    pub fn place(&mut self, base_lane: u8, time: f64) -> (u8, bool) {
        let (lane, switched) = match self.state {
            AlternationState::Armed {
                last_lane,
                last_time,
            } if time - last_time >= 0.0 && time - last_time <= self.window_secs => {
                self.switch_count += 1;
                (self.other(last_lane), true)
            }
            _ => (base_lane, false),
        };

        self.state = AlternationState::Armed {
            last_lane: lane,
            last_time: time,
        };
        (lane, switched)
    }
}
