//! Audio-rate time base
//!
//! Every absolute time in the scheduler (session anchors, voice start
//! instants, gain ramp breakpoints) is expressed in seconds on a single
//! [`ClockSource`]. The clock is distinct from the cadence at which the
//! lookahead driver happens to run.
//!
//! - [`SampleClock`] counts frames produced by the render path, so it advances
//!   in lockstep with what actually reaches the speakers.
//! - [`ManualClock`] is stepped explicitly, for tests and offline rendering.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A monotonic, high-resolution clock in seconds.
pub trait ClockSource: Send + Sync {
    /// Current time in seconds. Never decreases.
    fn now(&self) -> f64;
}

impl<C: ClockSource + ?Sized> ClockSource for Arc<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// Clock advanced by the render engine after each rendered block.
#[derive(Debug)]
pub struct SampleClock {
    frames: AtomicU64,
    sample_rate: u32,
}

impl SampleClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frames: AtomicU64::new(0),
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames rendered so far.
    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Advance by a block of frames. Render path only.
    #[inline]
    pub fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::AcqRel);
    }

    /// Frame index of an absolute time, rounded to the nearest frame.
    #[inline]
    pub fn seconds_to_frame(&self, seconds: f64) -> u64 {
        if !seconds.is_finite() || seconds <= 0.0 {
            return 0;
        }
        (seconds * self.sample_rate as f64).round() as u64
    }

    #[inline]
    pub fn frame_to_seconds(&self, frame: u64) -> f64 {
        frame as f64 / self.sample_rate as f64
    }
}

impl ClockSource for SampleClock {
    fn now(&self) -> f64 {
        self.frame_to_seconds(self.frames())
    }
}

/// Explicitly stepped clock. Stores the time as `f64` bits.
#[derive(Debug, Default)]
pub struct ManualClock {
    seconds: AtomicU64,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            seconds: AtomicU64::new(start.max(0.0).to_bits()),
        }
    }

    /// Move the clock to `seconds`. Attempts to move backwards are ignored.
    pub fn set(&self, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }
        let _ = self
            .seconds
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (seconds > f64::from_bits(bits)).then_some(seconds.to_bits())
            });
    }

    pub fn advance(&self, delta: f64) {
        if delta > 0.0 {
            self.set(self.now() + delta);
        }
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.seconds.load(Ordering::Acquire))
    }
}
