//! Clock and timing utilities for the capture pipeline.
//!
//! Every frame carries a presentation timestamp on the capture device's
//! monotonic clock. This module provides:
//! - The `MediaTime` timestamp type
//! - Per-frame processing budgets derived from the capture frame rate
//! - A fixed-interval tick gate for producers and samplers

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A presentation timestamp in nanoseconds on the capture clock.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct MediaTime(u64);

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime(0);

    pub const fn from_nanos(ns: u64) -> Self {
        Self(ns)
    }

    pub const fn from_millis(ms: u64) -> Self {
        Self(ms * 1_000_000)
    }

    pub fn from_duration(d: Duration) -> Self {
        Self(d.as_nanos() as u64)
    }

    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is later.
    pub fn saturating_sub(&self, earlier: MediaTime) -> MediaTime {
        MediaTime(self.0.saturating_sub(earlier.0))
    }
}

impl std::fmt::Display for MediaTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}s", self.as_secs_f64())
    }
}

/// Processing budget for one frame at a given capture rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBudget {
    interval: Duration,
}

impl FrameBudget {
    /// Budget for the given frame rate (clamped to at least 1 fps).
    pub fn for_frame_rate(fps: u32) -> Self {
        let fps = fps.max(1) as u64;
        Self {
            interval: Duration::from_nanos(1_000_000_000 / fps),
        }
    }

    /// One frame interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a measured processing time overran the budget.
    pub fn is_exceeded_by(&self, elapsed: Duration) -> bool {
        elapsed > self.interval
    }
}

/// Fixed-interval tick gate.
#[derive(Debug)]
pub struct RateController {
    target_interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ns: 1_000_000_000 / target_hz.max(1) as u64,
            last_tick_ns: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        match self.last_tick_ns {
            None => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            Some(last) if current_ns >= last + self.target_interval_ns => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            _ => false,
        }
    }

    /// Target interval in nanoseconds.
    pub fn interval_ns(&self) -> u64 {
        self.target_interval_ns
    }

    pub fn interval(&self) -> Duration {
        Duration::from_nanos(self.target_interval_ns)
    }
}
