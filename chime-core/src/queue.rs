//! Pending events of one session, ordered by absolute dispatch time.

use std::collections::VecDeque;

use crate::types::{ScheduledEvent, Sequence};

/// An event resolved against its session anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    /// Absolute time on the shared clock, seconds
    pub at: f64,
    pub event: ScheduledEvent,
}

/// Ordered by `at`; events with equal times keep submission order.
#[derive(Debug, Clone, Default)]
pub struct ScheduleQueue {
    entries: VecDeque<QueuedEvent>,
}

impl ScheduleQueue {
    /// Queue every event of `sequence` at `anchor + offset`.
    pub fn from_sequence(sequence: &Sequence, anchor: f64) -> Self {
        let mut entries: Vec<QueuedEvent> = sequence
            .events()
            .iter()
            .map(|event| QueuedEvent {
                at: anchor + event.offset_seconds,
                event: event.clone(),
            })
            .collect();
        // stable, so simultaneous events keep their order
        entries.sort_by(|a, b| a.at.total_cmp(&b.at));
        Self {
            entries: entries.into(),
        }
    }

    /// Remove and return every event due before `now + window`.
    ///
    /// Events already behind `now` are included: a late dispatch is still
    /// a dispatch, and the render side starts it as soon as it can.
    pub fn peek_due(&mut self, now: f64, window: f64) -> Vec<QueuedEvent> {
        let horizon = now + window;
        let due = self.entries.partition_point(|e| e.at < horizon);
        self.entries.drain(..due).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
