//! Conversion between seconds and sample indices.

use serde::{Deserialize, Serialize};

/// Resolution the index timestamps are snapped to.
pub const INDEX_RESOLUTION_HZ: f64 = 195_312.5;

/// Products closer than this to an integer are treated as that integer.
const SNAP_TOLERANCE: f64 = 1e-9;

/// Half open time window `[start, stop)` in seconds relative to the block
/// start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub stop: f64,
}

impl TimeRange {
    #[must_use]
    pub fn new(start: f64, stop: f64) -> Self {
        Self { start, stop }
    }

    #[must_use]
    pub fn everything() -> Self {
        Self::new(0.0, f64::INFINITY)
    }

    #[must_use]
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t < self.stop
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// First sample at or after the time, use for range starts
    Ceil,
    /// Last sample strictly before the time, use for range ends
    LastBefore,
    /// Nearest sample, ties go to the even sample
    Nearest,
}

fn snap_near_integer(sample: f64) -> f64 {
    let rounded = sample.round();
    if (sample - rounded).abs() < SNAP_TOLERANCE {
        rounded
    } else {
        sample
    }
}

/// Sample index for a time in seconds given a sampling frequency.
///
/// Negative times clamp to sample zero.
#[must_use]
pub fn to_sample(seconds: f64, fs: f64, rounding: Rounding) -> u64 {
    let sample = seconds * fs;
    let index = match rounding {
        Rounding::LastBefore => {
            let exact = snap_near_integer(sample);
            let floored = sample.floor();
            if exact == floored {
                floored - 1.0
            } else {
                floored
            }
        }
        Rounding::Ceil => snap_near_integer(sample).ceil(),
        Rounding::Nearest => snap_near_integer(sample).round_ties_even(),
    };

    if index.is_nan() || index <= 0.0 {
        0
    } else {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let index = index as u64;
        index
    }
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn to_seconds(sample: u64, fs: f64) -> f64 {
    sample as f64 / fs
}

/// Moves a time onto the nearest sample of `fs`.
#[must_use]
pub fn snap(seconds: f64, fs: f64) -> f64 {
    to_seconds(to_sample(seconds, fs, Rounding::Nearest), fs)
}
