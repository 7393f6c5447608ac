//! Validated, immutable event sequences

use std::sync::Arc;

use tracing::warn;

use super::scheduled_event::ScheduledEvent;
use crate::error::{InvalidReason, SchedulerError};

/// Lowest frequency a voice will play (Hz)
pub const MIN_FREQUENCY: f32 = 20.0;
/// Highest frequency a voice will play (Hz)
pub const MAX_FREQUENCY: f32 = 20_000.0;
/// Amplitude used when a phrase omits its dynamics
pub const DEFAULT_DYNAMIC: f32 = 0.7;

/// An ordered list of events that passed validation as a whole.
///
/// Cloning is cheap; the events are shared and never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    events: Arc<[ScheduledEvent]>,
    total_duration: f64,
}

impl Sequence {
    /// Validate every event before accepting any of them.
    ///
    /// Out-of-range frequencies are clamped to the audible band; every other
    /// violation rejects the whole list.
    pub fn new(mut events: Vec<ScheduledEvent>) -> Result<Self, SchedulerError> {
        if events.is_empty() {
            return Err(SchedulerError::InvalidEvent {
                position: None,
                reason: InvalidReason::EmptySequence,
            });
        }

        for (position, event) in events.iter().enumerate() {
            validate_event(position, event)?;
        }

        for event in events.iter_mut() {
            if let Some(freq) = event.frequency_hz {
                let clamped = freq.clamp(MIN_FREQUENCY, MAX_FREQUENCY);
                if clamped != freq {
                    warn!(
                        event_index = event.event_index,
                        requested = freq,
                        clamped,
                        "frequency outside audible range, clamping"
                    );
                    event.frequency_hz = Some(clamped);
                }
            }
        }

        Ok(Self::from_valid(events))
    }

    /// Build from events already known to be valid (crate presets).
    pub(crate) fn from_valid(events: Vec<ScheduledEvent>) -> Self {
        let total_duration = events
            .iter()
            .map(ScheduledEvent::end_seconds)
            .fold(0.0, f64::max);
        Self {
            events: events.into(),
            total_duration,
        }
    }

    /// Build a single-part phrase: notes back to back with `gap_seconds`
    /// between them.
    ///
    /// `durations_ms` must match `frequencies` in length. Missing dynamics
    /// default to [`DEFAULT_DYNAMIC`].
    pub fn phrase(
        frequencies: &[Option<f32>],
        durations_ms: &[f64],
        dynamics: &[f32],
        gap_seconds: f64,
    ) -> Result<Self, SchedulerError> {
        if durations_ms.len() != frequencies.len() {
            return Err(SchedulerError::InvalidEvent {
                position: None,
                reason: InvalidReason::MismatchedLengths {
                    expected: frequencies.len(),
                    found: durations_ms.len(),
                },
            });
        }
        if !gap_seconds.is_finite() || gap_seconds < 0.0 {
            return Err(SchedulerError::InvalidEvent {
                position: None,
                reason: InvalidReason::NegativeOffset(gap_seconds),
            });
        }

        let mut offset = 0.0;
        let mut events = Vec::with_capacity(frequencies.len());
        for (i, (freq, dur_ms)) in frequencies.iter().zip(durations_ms).enumerate() {
            let duration = dur_ms / 1000.0;
            let amplitude = dynamics.get(i).copied().unwrap_or(DEFAULT_DYNAMIC);
            let event = match freq {
                Some(f) => ScheduledEvent::note(offset, *f, duration, amplitude),
                None => ScheduledEvent::rest(offset, duration),
            };
            events.push(event.with_index(i));
            offset += duration + gap_seconds;
        }
        Self::new(events)
    }

    /// Append `next` after this sequence's end plus `gap_seconds`, as
    /// separate parts. Used to compare two phrases back to back.
    pub fn followed_by(&self, next: &Sequence, gap_seconds: f64) -> Self {
        let shift = self.total_duration + gap_seconds.max(0.0);
        let part_shift = self.part_count();
        let first_len = self.events.len();

        let mut events: Vec<ScheduledEvent> = self.events.to_vec();
        events.extend(next.events.iter().enumerate().map(|(i, e)| {
            let mut e = e.clone();
            e.offset_seconds += shift;
            e.part_index += part_shift;
            e.event_index = first_len + i;
            e
        }));
        Self::from_valid(events)
    }

    pub fn events(&self) -> &[ScheduledEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Always `false` for a constructed sequence.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Latest `offset + duration` over all events.
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// Number of logical parts (highest part index + 1).
    pub fn part_count(&self) -> usize {
        self.events
            .iter()
            .map(|e| e.part_index + 1)
            .max()
            .unwrap_or(0)
    }
}

fn validate_event(position: usize, event: &ScheduledEvent) -> Result<(), SchedulerError> {
    let fail = |reason| Err(SchedulerError::invalid(position, reason));

    if !event.offset_seconds.is_finite() {
        return fail(InvalidReason::NonFinite("offset"));
    }
    if event.offset_seconds < 0.0 {
        return fail(InvalidReason::NegativeOffset(event.offset_seconds));
    }
    if !event.duration_seconds.is_finite() {
        return fail(InvalidReason::NonFinite("duration"));
    }
    if event.duration_seconds <= 0.0 {
        return fail(InvalidReason::NonPositiveDuration(event.duration_seconds));
    }
    if !event.amplitude.is_finite() {
        return fail(InvalidReason::NonFinite("amplitude"));
    }
    if !(0.0..=1.0).contains(&event.amplitude) {
        return fail(InvalidReason::AmplitudeOutOfRange(event.amplitude));
    }
    if let Some(freq) = event.frequency_hz {
        if !freq.is_finite() {
            return fail(InvalidReason::NonFinite("frequency"));
        }
    }
    Ok(())
}
