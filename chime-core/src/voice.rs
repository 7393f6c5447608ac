//! Render-side tone voices
//!
//! A voice is created on the audio thread from a [`VoiceSpec`] and lives
//! until its envelope (or its stop fade) has reached zero. Start and stop
//! instants are resolved to frame indices, so timing is exact to one sample
//! regardless of buffer size.

use crate::envelope::{stop_fade_level, ToneEnvelope};
use crate::oscillator::Oscillator;
use crate::types::{ToneShape, Waveform};

pub type VoiceId = u64;

/// Everything the render side needs to play one note.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSpec {
    pub id: VoiceId,
    /// Absolute start on the shared clock, seconds
    pub start_time: f64,
    pub duration: f64,
    pub frequency: f32,
    pub amplitude: f32,
    pub waveform: Waveform,
    pub shape: ToneShape,
}

#[derive(Debug, Clone, Copy)]
struct StopPoint {
    frame: u64,
    fade_frames: u64,
    level: f32,
}

#[derive(Debug, Clone)]
pub struct ToneVoice {
    id: VoiceId,
    oscillator: Oscillator,
    envelope: ToneEnvelope,
    sample_rate: f64,
    start_frame: u64,
    end_frame: u64,
    stop: Option<StopPoint>,
}

impl ToneVoice {
    /// Resolve `spec` to frames. A start already in the past is moved to
    /// `not_before_frame` so the attack is heard in full.
    pub fn start(spec: &VoiceSpec, sample_rate: u32, not_before_frame: u64) -> Self {
        let rate = sample_rate.max(1) as f64;
        let requested = to_frame(spec.start_time, rate);
        let start_frame = requested.max(not_before_frame);
        let length = to_frame(spec.duration, rate).max(1);

        Self {
            id: spec.id,
            oscillator: Oscillator::new(spec.waveform, spec.frequency, sample_rate),
            envelope: ToneEnvelope::with_shape(&spec.shape, spec.amplitude, spec.duration),
            sample_rate: rate,
            start_frame,
            end_frame: start_frame + length,
            stop: None,
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    pub fn end_frame(&self) -> u64 {
        self.end_frame
    }

    /// Schedule a fade to silence starting at `at_frame`. An earlier stop
    /// wins over a later one.
    pub fn stop(&mut self, at_frame: u64, fade_seconds: f64) {
        if self.stop.is_some_and(|s| s.frame <= at_frame) {
            return;
        }
        let frame = at_frame.max(self.start_frame);
        let level = self.envelope.level_at(self.elapsed(frame));
        self.stop = Some(StopPoint {
            frame,
            fade_frames: to_frame(fade_seconds, self.sample_rate).max(1),
            level,
        });
    }

    /// Sample for absolute `frame`. Frames must be passed in increasing order.
    #[inline]
    pub fn next_sample(&mut self, frame: u64) -> f32 {
        if frame < self.start_frame || frame >= self.end_frame {
            return 0.0;
        }
        let mut level = self.envelope.level_at(self.elapsed(frame));
        if let Some(stop) = self.stop {
            if frame >= stop.frame {
                let since = (frame - stop.frame) as f64 / self.sample_rate;
                let fade = stop.fade_frames as f64 / self.sample_rate;
                level = level.min(stop_fade_level(stop.level, since, fade));
            }
        }
        self.oscillator.next_sample() * level
    }

    pub fn is_finished(&self, frame: u64) -> bool {
        if frame >= self.end_frame {
            return true;
        }
        self.stop
            .is_some_and(|stop| frame >= stop.frame + stop.fade_frames)
    }

    #[inline]
    fn elapsed(&self, frame: u64) -> f64 {
        frame.saturating_sub(self.start_frame) as f64 / self.sample_rate
    }
}

#[inline]
fn to_frame(seconds: f64, rate: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * rate).round() as u64
}
