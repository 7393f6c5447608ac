//! Master gain stage
//!
//! The gain is stored as a linear ramp between two breakpoints on the shared
//! clock. Writers replace the whole ramp atomically; the render path loads a
//! snapshot once per block and evaluates it per frame, so it never blocks
//! and a volume change never jumps.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::clock::ClockSource;

/// Shortest ramp applied to any gain change, seconds
pub const MIN_RAMP_SECONDS: f64 = 0.005;

/// Linear gain movement from `from` at `start` to `to` at `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRamp {
    pub from: f32,
    pub to: f32,
    pub start: f64,
    pub end: f64,
}

impl GainRamp {
    /// A ramp that has already settled at `gain`.
    pub fn constant(gain: f32) -> Self {
        Self {
            from: gain,
            to: gain,
            start: 0.0,
            end: 0.0,
        }
    }

    #[inline]
    pub fn value_at(&self, t: f64) -> f32 {
        if t >= self.end {
            return self.to;
        }
        if t <= self.start {
            return self.from;
        }
        let x = ((t - self.start) / (self.end - self.start)) as f32;
        self.from + (self.to - self.from) * x
    }
}

pub struct VolumeBus {
    ramp: ArcSwap<GainRamp>,
    clock: Arc<dyn ClockSource>,
}

impl VolumeBus {
    pub fn new(clock: Arc<dyn ClockSource>, initial_gain: f32) -> Self {
        let gain = sanitize(initial_gain).unwrap_or(0.0);
        Self {
            ramp: ArcSwap::from_pointee(GainRamp::constant(gain)),
            clock,
        }
    }

    /// Ramp toward `target` over at least [`MIN_RAMP_SECONDS`], starting
    /// from wherever the gain is right now. NaN targets are ignored and
    /// the rest are clamped to `[0, 1]`.
    ///
    /// Returns the gain actually targeted.
    pub fn set_gain(&self, target: f32, ramp_seconds: f64) -> Option<f32> {
        let target = sanitize(target)?;
        let ramp = if ramp_seconds.is_finite() {
            ramp_seconds.max(MIN_RAMP_SECONDS)
        } else {
            MIN_RAMP_SECONDS
        };
        let now = self.clock.now();
        self.ramp.rcu(|current| GainRamp {
            from: current.value_at(now),
            to: target,
            start: now,
            end: now + ramp,
        });
        Some(target)
    }

    /// Gain at the current clock time.
    pub fn current_gain(&self) -> f32 {
        self.gain_at(self.clock.now())
    }

    pub fn gain_at(&self, t: f64) -> f32 {
        self.ramp.load().value_at(t)
    }

    /// Gain the bus is heading to (or resting at).
    pub fn target_gain(&self) -> f32 {
        self.ramp.load().to
    }

    /// Copy of the active ramp, for evaluating a whole render block.
    #[inline]
    pub fn snapshot(&self) -> GainRamp {
        **self.ramp.load()
    }
}

impl std::fmt::Debug for VolumeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeBus")
            .field("ramp", &self.snapshot())
            .finish()
    }
}

fn sanitize(gain: f32) -> Option<f32> {
    if gain.is_nan() {
        None
    } else {
        Some(gain.clamp(0.0, 1.0))
    }
}
