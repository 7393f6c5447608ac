//! Phase-accumulator oscillator for sine, saw, square, and triangle waves

use crate::types::Waveform;
use std::f32::consts::PI;

/// Oscillator state for one voice. Output is in `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    phase: f32,
    increment: f32,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f32, sample_rate: u32) -> Self {
        Self {
            waveform,
            phase: 0.0,
            increment: frequency / sample_rate.max(1) as f32,
        }
    }

    /// Generate the next sample and advance the phase
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let value = self.generate_waveform();

        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        value
    }

    /// Generate raw waveform value based on current phase (0.0 to 1.0)
    fn generate_waveform(&self) -> f32 {
        match self.waveform {
            Waveform::Sine => (2.0 * PI * self.phase).sin(),
            // Ramps from -1 to 1, then resets
            Waveform::Saw => 2.0 * self.phase - 1.0,
            Waveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => {
                if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    3.0 - 4.0 * self.phase
                }
            }
        }
    }
}
