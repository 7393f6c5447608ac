//! Scheduled tone events
//!
//! An event is positioned relative to its session's anchor time, never to
//! wall-clock time. A `None` frequency is a rest: silence that still holds
//! its time window.

use super::audio_config::Waveform;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduledEvent {
    /// Seconds after the session anchor
    pub offset_seconds: f64,
    /// Pitch in Hz, `None` for a rest
    pub frequency_hz: Option<f32>,
    pub duration_seconds: f64,
    /// Relative loudness in `[0, 1]`
    pub amplitude: f32,
    /// Logical voice this event belongs to (phrase A, phrase B, ...)
    pub part_index: usize,
    /// Stable identity for diagnostics and UI highlighting, not an ordering key
    pub event_index: usize,
    pub waveform: Waveform,
}

impl ScheduledEvent {
    pub fn note(offset_seconds: f64, frequency_hz: f32, duration_seconds: f64, amplitude: f32) -> Self {
        Self {
            offset_seconds,
            frequency_hz: Some(frequency_hz),
            duration_seconds,
            amplitude,
            part_index: 0,
            event_index: 0,
            waveform: Waveform::Sine,
        }
    }

    pub fn rest(offset_seconds: f64, duration_seconds: f64) -> Self {
        Self {
            offset_seconds,
            frequency_hz: None,
            duration_seconds,
            amplitude: 0.0,
            part_index: 0,
            event_index: 0,
            waveform: Waveform::Sine,
        }
    }

    pub fn with_part(mut self, part_index: usize) -> Self {
        self.part_index = part_index;
        self
    }

    pub fn with_index(mut self, event_index: usize) -> Self {
        self.event_index = event_index;
        self
    }

    pub fn with_waveform(mut self, waveform: Waveform) -> Self {
        self.waveform = waveform;
        self
    }

    #[inline]
    pub fn is_rest(&self) -> bool {
        self.frequency_hz.is_none()
    }

    /// Offset at which this event's time window closes.
    #[inline]
    pub fn end_seconds(&self) -> f64 {
        self.offset_seconds + self.duration_seconds
    }
}
