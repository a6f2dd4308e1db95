// Quantization grid - resolution names and grid line spacing
// Straight and triplet subdivisions of a 4/4 bar

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error for an unrecognized grid name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown grid resolution '{0}' (expected quarter, eighth, sixteenth, a triplet variant, or 1/4, 1/8, 1/16 with optional T)")]
pub struct GridParseError(pub String);

/// Grid resolution - defines the spacing of the quantization grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridResolution {
    /// Quarter notes (1/4)
    #[serde(alias = "1/4")]
    Quarter,

    /// Eighth notes (1/8)
    #[serde(alias = "1/8")]
    Eighth,

    /// Sixteenth notes (1/16)
    #[serde(alias = "1/16")]
    Sixteenth,

    /// Quarter-note triplets (1/4T), three per half note
    #[serde(alias = "1/4t", alias = "1/4T")]
    QuarterTriplet,

    /// Eighth-note triplets (1/8T), three per beat
    #[serde(alias = "1/8t", alias = "1/8T")]
    EighthTriplet,

    /// Sixteenth-note triplets (1/16T), six per beat
    #[serde(alias = "1/16t", alias = "1/16T")]
    SixteenthTriplet,
}

impl GridResolution {
    pub const ALL: [GridResolution; 6] = [
        GridResolution::Quarter,
        GridResolution::Eighth,
        GridResolution::Sixteenth,
        GridResolution::QuarterTriplet,
        GridResolution::EighthTriplet,
        GridResolution::SixteenthTriplet,
    ];

    /// Grid lines per whole note
    pub fn denominator(&self) -> u32 {
        match self {
            GridResolution::Quarter => 4,
            GridResolution::Eighth => 8,
            GridResolution::Sixteenth => 16,
            GridResolution::QuarterTriplet => 6,
            GridResolution::EighthTriplet => 12,
            GridResolution::SixteenthTriplet => 24,
        }
    }

    /// Canonical config name ("sixteenth", "eighth_triplet", ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            GridResolution::Quarter => "quarter",
            GridResolution::Eighth => "eighth",
            GridResolution::Sixteenth => "sixteenth",
            GridResolution::QuarterTriplet => "quarter_triplet",
            GridResolution::EighthTriplet => "eighth_triplet",
            GridResolution::SixteenthTriplet => "sixteenth_triplet",
        }
    }

    /// Musical notation ("1/16", "1/8T", ...)
    pub fn notation(&self) -> &'static str {
        match self {
            GridResolution::Quarter => "1/4",
            GridResolution::Eighth => "1/8",
            GridResolution::Sixteenth => "1/16",
            GridResolution::QuarterTriplet => "1/4T",
            GridResolution::EighthTriplet => "1/8T",
            GridResolution::SixteenthTriplet => "1/16T",
        }
    }

    /// Seconds between grid lines, or None when the tempo is unusable
    pub fn spacing_secs(&self, bpm: f64) -> Option<f64> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return None;
        }
        let secs_per_beat = 60.0 / bpm;
        Some(secs_per_beat * 4.0 / self.denominator() as f64)
    }
}

impl Default for GridResolution {
    fn default() -> Self {
        GridResolution::Sixteenth
    }
}

impl fmt::Display for GridResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GridResolution {
    type Err = GridParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();

        let resolution = match normalized.as_str() {
            "quarter" | "1/4" => GridResolution::Quarter,
            "eighth" | "1/8" => GridResolution::Eighth,
            "sixteenth" | "1/16" => GridResolution::Sixteenth,
            "quarter_triplet" | "1/4t" => GridResolution::QuarterTriplet,
            "eighth_triplet" | "1/8t" => GridResolution::EighthTriplet,
            "sixteenth_triplet" | "1/16t" => GridResolution::SixteenthTriplet,
            _ => return Err(GridParseError(s.to_string())),
        };
        Ok(resolution)
    }
}
