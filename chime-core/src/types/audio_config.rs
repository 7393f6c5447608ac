//! Audio configuration types
//!
//! Pure data with no synthesis logic: waveforms and the timing rules that
//! shape each tone's amplitude envelope.

/// Available waveform types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Waveform {
    #[default]
    Sine,
    Saw,
    Square,
    Triangle,
}

impl Waveform {
    /// Parse waveform from string (case-insensitive)
    pub fn from_name(s: &str) -> Option<Waveform> {
        match s.to_lowercase().as_str() {
            "sine" | "sin" => Some(Waveform::Sine),
            "saw" | "sawtooth" => Some(Waveform::Saw),
            "square" | "sq" => Some(Waveform::Square),
            "triangle" | "tri" => Some(Waveform::Triangle),
            _ => None,
        }
    }

    /// Get display name
    pub fn name(&self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Saw => "saw",
            Waveform::Square => "square",
            Waveform::Triangle => "triangle",
        }
    }
}

/// Timing rules for a tone's envelope, relative to its amplitude and duration.
///
/// Each stage length is `min(max_seconds, fraction * duration)`, so short
/// notes get proportionally short stages and the fractions always leave a
/// sustain segment (attack + decay + release fractions stay below 1).
///
/// - `peak_scale`: peak level as a multiple of the event amplitude
/// - `sustain_scale`: sustain level as a multiple of the event amplitude
/// - `sustain_floor`: lowest sustain level for audible events
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ToneShape {
    pub peak_scale: f32,
    pub sustain_scale: f32,
    pub sustain_floor: f32,
    pub attack_max: f64,
    pub attack_fraction: f64,
    pub decay_max: f64,
    pub decay_fraction: f64,
    pub release_max: f64,
    pub release_fraction: f64,
}

impl ToneShape {
    /// Soft, rounded tone used for melodic phrases
    pub fn soft() -> Self {
        Self {
            peak_scale: 0.3,
            sustain_scale: 0.2,
            sustain_floor: 0.01,
            attack_max: 0.02,
            attack_fraction: 0.15,
            decay_max: 0.05,
            decay_fraction: 0.2,
            release_max: 0.1,
            release_fraction: 0.3,
        }
    }

    /// Attack, decay and release lengths for a note of `duration` seconds.
    pub fn stage_lengths(&self, duration: f64) -> (f64, f64, f64) {
        let duration = duration.max(0.0);
        (
            self.attack_max.min(self.attack_fraction * duration),
            self.decay_max.min(self.decay_fraction * duration),
            self.release_max.min(self.release_fraction * duration),
        )
    }

    /// Returns `false` when the stage fractions would leave no sustain segment.
    pub fn is_consistent(&self) -> bool {
        let fractions = self.attack_fraction + self.decay_fraction + self.release_fraction;
        self.attack_fraction > 0.0
            && self.decay_fraction >= 0.0
            && self.release_fraction > 0.0
            && fractions < 1.0
            && self.peak_scale >= 0.0
            && self.sustain_scale >= 0.0
    }
}

impl Default for ToneShape {
    fn default() -> Self {
        Self::soft()
    }
}
