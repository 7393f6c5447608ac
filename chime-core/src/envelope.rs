//! Closed-form tone envelopes
//!
//! The level is a pure function of time since the voice started, so the
//! render path can evaluate it at any frame without per-sample state and a
//! late-started voice still plays its full attack.
//!
//! ```text
//!  peak ┐  /\
//!       │ /  \_________
//!       │/             \_
//!    0 ─┴───────────────┴── t
//!       0  a  a+d    d-r  d
//! ```

use crate::types::ToneShape;

/// Envelope stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    /// Outside `[0, duration)`, output is exactly 0
    Idle,
    /// Linear rise from 0 to peak
    Attack,
    /// Exponential fall from peak to sustain
    Decay,
    /// Holding at sustain level
    Sustain,
    /// Exponential fall from sustain to near silence, ending at the duration
    Release,
}

/// Fraction of the peak at which the release curve ends
const RELEASE_FLOOR: f32 = 0.001;

/// Amplitude envelope of one tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneEnvelope {
    peak: f32,
    sustain: f32,
    floor: f32,
    attack_end: f64,
    decay_end: f64,
    release_start: f64,
    duration: f64,
}

impl ToneEnvelope {
    /// Envelope with the default soft shape.
    pub fn new(amplitude: f32, duration: f64) -> Self {
        Self::with_shape(&ToneShape::soft(), amplitude, duration)
    }

    pub fn with_shape(shape: &ToneShape, amplitude: f32, duration: f64) -> Self {
        let amplitude = amplitude.clamp(0.0, 1.0);
        let duration = duration.max(0.0);
        let peak = shape.peak_scale * amplitude;
        let sustain = (shape.sustain_scale * amplitude)
            .max(shape.sustain_floor)
            .min(peak);
        let (attack, decay, release) = shape.stage_lengths(duration);

        Self {
            peak,
            sustain,
            floor: peak * RELEASE_FLOOR,
            attack_end: attack,
            decay_end: attack + decay,
            release_start: (duration - release).max(attack + decay),
            duration,
        }
    }

    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn sustain(&self) -> f32 {
        self.sustain
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn stage_at(&self, t: f64) -> EnvelopeStage {
        if !(0.0..self.duration).contains(&t) {
            EnvelopeStage::Idle
        } else if t < self.attack_end {
            EnvelopeStage::Attack
        } else if t < self.decay_end {
            EnvelopeStage::Decay
        } else if t < self.release_start {
            EnvelopeStage::Sustain
        } else {
            EnvelopeStage::Release
        }
    }

    /// Level at `t` seconds after the voice start.
    pub fn level_at(&self, t: f64) -> f32 {
        if self.peak <= 0.0 {
            return 0.0;
        }
        match self.stage_at(t) {
            EnvelopeStage::Idle => 0.0,
            EnvelopeStage::Attack => self.peak * (t / self.attack_end) as f32,
            EnvelopeStage::Decay => {
                let x = (t - self.attack_end) / (self.decay_end - self.attack_end);
                exp_ramp(self.peak, self.sustain, x)
            }
            EnvelopeStage::Sustain => self.sustain,
            EnvelopeStage::Release => {
                let x = (t - self.release_start) / (self.duration - self.release_start);
                exp_ramp(self.sustain, self.floor, x)
            }
        }
    }
}

/// `from * (to / from)^x` for `x` in `[0, 1]`. Both ends must be positive.
#[inline]
fn exp_ramp(from: f32, to: f32, x: f64) -> f32 {
    let x = x.clamp(0.0, 1.0) as f32;
    from * (to / from).powf(x)
}

/// Linear fade from `level_at_stop` to zero over `fade` seconds.
#[inline]
pub fn stop_fade_level(level_at_stop: f32, since_stop: f64, fade: f64) -> f32 {
    if since_stop <= 0.0 {
        return level_at_stop;
    }
    if fade <= 0.0 || since_stop >= fade {
        return 0.0;
    }
    level_at_stop * (1.0 - since_stop / fade) as f32
}
