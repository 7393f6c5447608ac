//! Playback sessions
//!
//! A session is one run of one sequence. Its state lives in an atomic so
//! handles can query it without taking the player lock; everything else
//! is owned by the player and only touched under that lock.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::queue::ScheduleQueue;
use crate::types::ScheduledEvent;
use crate::voice::VoiceId;

pub type SessionId = u64;

/// Called once when a session ends on its own.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Called as each event is handed to the output.
pub type EventCallback = Arc<dyn Fn(&ScheduledEvent) + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Waiting for the first dispatch
    Scheduled = 0,
    Playing = 1,
    /// Every event played to its end
    Completed = 2,
    /// Stopped, or replaced by a newer session
    Canceled = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Scheduled,
            1 => SessionState::Playing,
            2 => SessionState::Completed,
            _ => SessionState::Canceled,
        }
    }

    /// `true` for `Scheduled` and `Playing`.
    pub fn is_live(self) -> bool {
        matches!(self, SessionState::Scheduled | SessionState::Playing)
    }

    pub fn name(self) -> &'static str {
        match self {
            SessionState::Scheduled => "scheduled",
            SessionState::Playing => "playing",
            SessionState::Completed => "completed",
            SessionState::Canceled => "canceled",
        }
    }
}

/// State shared between a session and its handles.
#[derive(Debug)]
pub(crate) struct SessionStatus {
    pub id: SessionId,
    state: AtomicU8,
    /// Absolute clock time of offset zero
    pub anchor: f64,
    pub total_duration: f64,
}

impl SessionStatus {
    pub fn new(id: SessionId, state: SessionState, anchor: f64, total_duration: f64) -> Self {
        Self {
            id,
            state: AtomicU8::new(state as u8),
            anchor,
            total_duration,
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move from a live state to `next`. Returns `false` if the session had
    /// already finished; finished sessions never change state again.
    pub fn finish(&self, next: SessionState) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                SessionState::from_u8(current)
                    .is_live()
                    .then_some(next as u8)
            })
            .is_ok()
    }

    /// `Scheduled → Playing`, a no-op in any other state.
    pub fn begin_playing(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Scheduled as u8,
                SessionState::Playing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// A dispatched event that still occupies time. Rests and dropped voices
/// have no render-side voice to stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ActiveVoice {
    pub voice: Option<VoiceId>,
    pub end_time: f64,
}

pub(crate) struct Session {
    pub status: Arc<SessionStatus>,
    pub queue: ScheduleQueue,
    pub active: Vec<ActiveVoice>,
    pub on_complete: Option<CompletionCallback>,
    pub on_event_start: Option<EventCallback>,
    pub dispatched: usize,
}

impl Session {
    pub fn new(
        status: Arc<SessionStatus>,
        queue: ScheduleQueue,
        on_complete: Option<CompletionCallback>,
        on_event_start: Option<EventCallback>,
    ) -> Self {
        Self {
            status,
            queue,
            active: Vec::new(),
            on_complete,
            on_event_start,
            dispatched: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.status.id
    }

    pub fn is_live(&self) -> bool {
        self.status.state().is_live()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_atomic() {
        for state in [
            SessionState::Scheduled,
            SessionState::Playing,
            SessionState::Completed,
            SessionState::Canceled,
        ] {
            let status = SessionStatus::new(1, state, 0.0, 1.0);
            assert_eq!(status.state(), state);
        }
    }

    #[test]
    fn test_finished_sessions_are_final() {
        let status = SessionStatus::new(1, SessionState::Scheduled, 0.0, 1.0);
        assert!(status.begin_playing());
        assert!(!status.begin_playing());
        assert!(status.finish(SessionState::Completed));
        assert!(!status.finish(SessionState::Canceled));
        assert_eq!(status.state(), SessionState::Completed);
    }

    #[test]
    fn test_cancel_before_first_dispatch() {
        let status = SessionStatus::new(2, SessionState::Scheduled, 0.0, 1.0);
        assert!(status.finish(SessionState::Canceled));
        assert!(!status.begin_playing());
        assert!(!status.state().is_live());
    }
}
