// Grid quantization - snaps classified hits to the nearest grid line
// Hits too far from any line keep their original time and are flagged

use serde::{Deserialize, Serialize};

use super::grid::GridResolution;
use crate::events::types::ClassifiedHit;

/// Times this close to a grid line count as exactly on it
const ON_GRID_EPSILON_SECS: f64 = 1e-9;

/// A classified hit with its grid alignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizedHit {
    #[serde(flatten)]
    pub hit: ClassifiedHit,

    /// Nearest grid line in seconds (the onset time when no grid applies)
    pub grid_time: f64,

    /// Index of that grid line counted from time zero
    pub grid_index: i64,

    /// How far the hit moves to reach the line (positive = later)
    pub snap_error_ms: f64,

    /// True when the hit keeps its original time
    pub unsnapped: bool,
}

impl QuantizedHit {
    /// Effective time: the grid line when snapped, the onset otherwise
    pub fn time(&self) -> f64 {
        if self.unsnapped {
            self.hit.onset_time
        } else {
            self.grid_time
        }
    }
}

/// Snap one hit to the nearest line of `grid` at `bpm`.
///
/// Exact midpoints go to the earlier line. A hit further than
/// `max_snap_error_ms` from its line is left unsnapped; so is every hit
/// when `bpm` is not a positive finite number.
pub fn quantize(
    hit: ClassifiedHit,
    grid: GridResolution,
    bpm: f64,
    max_snap_error_ms: f64,
) -> QuantizedHit {
    let t = hit.onset_time;

    let spacing = match grid.spacing_secs(bpm) {
        Some(spacing) => spacing,
        None => {
            log::debug!("No usable tempo ({}), leaving hit at {:.3}s unsnapped", bpm, t);
            return QuantizedHit {
                hit,
                grid_time: t,
                grid_index: 0,
                snap_error_ms: 0.0,
                unsnapped: true,
            };
        }
    };

    let position = t / spacing;
    let lower = position.floor();
    let index = if position - lower > 0.5 { lower + 1.0 } else { lower };

    let mut grid_time = index * spacing;
    if (grid_time - t).abs() < ON_GRID_EPSILON_SECS {
        grid_time = t;
    }

    let snap_error_ms = (grid_time - t) * 1000.0;
    let unsnapped = snap_error_ms.abs() > max_snap_error_ms;

    QuantizedHit {
        hit,
        grid_time,
        grid_index: index as i64,
        snap_error_ms,
        unsnapped,
    }
}

/// Quantize a batch of hits, preserving their order
pub fn quantize_hits(
    hits: Vec<ClassifiedHit>,
    grid: GridResolution,
    bpm: f64,
    max_snap_error_ms: f64,
) -> Vec<QuantizedHit> {
    if grid.spacing_secs(bpm).is_none() && !hits.is_empty() {
        log::warn!(
            "Tempo {} is not a positive finite BPM, all {} hits left unsnapped",
            bpm,
            hits.len()
        );
    }

    let quantized: Vec<QuantizedHit> = hits
        .into_iter()
        .map(|hit| quantize(hit, grid, bpm, max_snap_error_ms))
        .collect();

    let unsnapped = quantized.iter().filter(|q| q.unsnapped).count();
    if unsnapped > 0 {
        log::debug!(
            "{} of {} hits exceeded {:.1}ms snap limit",
            unsnapped,
            quantized.len(),
            max_snap_error_ms
        );
    }

    quantized
}
