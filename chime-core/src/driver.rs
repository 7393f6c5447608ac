//! Lookahead dispatch
//!
//! [`LookaheadDriver::tick`] moves every queued event that starts within the
//! next `window` seconds to the output, each carrying its exact absolute
//! start time. How late or irregular the tick itself runs does not matter as
//! long as consecutive ticks are less than a window apart.
//!
//! [`DriverThread`] is the timer that calls the tick in threaded mode.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::output::VoiceSink;
use crate::session::{ActiveVoice, CompletionCallback, Session, SessionState};
use crate::types::{ScheduledEvent, ToneShape};
use crate::voice::{VoiceId, VoiceSpec};

/// Dispatches this far behind the clock are reported as late
const LATE_TOLERANCE: f64 = 0.001;

/// Voice ids are unique per process so players can share one renderer.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

fn next_voice_id() -> VoiceId {
    NEXT_VOICE_ID.fetch_add(1, Ordering::Relaxed)
}

/// What a tick produced, for the caller to act on outside its lock.
#[derive(Default)]
pub(crate) struct TickReport {
    /// Events dispatched by this tick, in dispatch order
    pub started: Vec<ScheduledEvent>,
    /// Set when this tick completed the session
    pub on_complete: Option<CompletionCallback>,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookaheadDriver {
    window: f64,
    stop_fade: f64,
    shape: ToneShape,
}

impl LookaheadDriver {
    pub fn new(window: f64, stop_fade: f64, shape: ToneShape) -> Self {
        Self {
            window,
            stop_fade,
            shape,
        }
    }

    pub(crate) fn tick(&self, session: &mut Session, now: f64, sink: &dyn VoiceSink) -> TickReport {
        let mut report = TickReport::default();
        if !session.is_live() {
            return report;
        }

        session.active.retain(|v| v.end_time > now);

        for due in session.queue.peek_due(now, self.window) {
            let event = due.event;
            if due.at < now - LATE_TOLERANCE {
                warn!(
                    session = session.id(),
                    event_index = event.event_index,
                    late_ms = (now - due.at) * 1000.0,
                    "dispatching late event"
                );
            }

            // a late voice starts at the block where it arrives, so it
            // sounds until `now + duration`, not its logical end
            let end_time = due.at.max(now) + event.duration_seconds;
            let voice = event.frequency_hz.and_then(|frequency| {
                let spec = VoiceSpec {
                    id: next_voice_id(),
                    start_time: due.at,
                    duration: event.duration_seconds,
                    frequency,
                    amplitude: event.amplitude,
                    waveform: event.waveform,
                    shape: self.shape,
                };
                let id = spec.id;
                sink.start_voice(spec).then_some(id)
            });

            debug!(
                session = session.id(),
                event_index = event.event_index,
                part = event.part_index,
                at = due.at,
                rest = event.is_rest(),
                "dispatched"
            );
            session.active.push(ActiveVoice { voice, end_time });
            session.dispatched += 1;
            report.started.push(event);
        }

        if !report.started.is_empty() && session.status.begin_playing() {
            debug!(session = session.id(), "session playing");
        }

        if session.queue.is_empty()
            && session.active.is_empty()
            && session.status.finish(SessionState::Completed)
        {
            info!(
                session = session.id(),
                events = session.dispatched,
                "session completed"
            );
            report.completed = true;
            report.on_complete = session.on_complete.take();
        }

        report
    }

    /// Drop everything `session` still has pending and collect its voices
    /// for a fade out from `now`. Nothing is sent until [`Silenced::send`].
    pub(crate) fn silence(&self, session: &mut Session, now: f64) -> Silenced {
        session.queue.clear();
        Silenced {
            at: now,
            fade: self.stop_fade,
            voices: session.active.drain(..).filter_map(|a| a.voice).collect(),
        }
    }
}

/// Stops owed to the renderer by a canceled session.
#[must_use]
#[derive(Debug)]
pub(crate) struct Silenced {
    at: f64,
    fade: f64,
    voices: Vec<VoiceId>,
}

impl Silenced {
    /// Every voice gets a stop, even one believed finished: the renderer
    /// ignores ids it no longer holds.
    pub(crate) fn send(self, sink: &dyn VoiceSink) {
        for id in self.voices {
            sink.stop_voice(id, self.at, self.fade);
        }
    }
}

#[derive(Debug)]
enum DriverCommand {
    /// A session became live, start ticking
    Wake,
    Shutdown,
}

/// Periodic timer thread. Ticks every `period` while the tick function
/// reports live work, then sleeps until woken.
pub struct DriverThread {
    command_tx: Sender<DriverCommand>,
    thread: Option<JoinHandle<()>>,
}

impl DriverThread {
    pub fn spawn<F>(period: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (command_tx, command_rx) = bounded(16);
        let thread = thread::Builder::new()
            .name("chime-driver".into())
            .spawn(move || run(period, command_rx, &mut tick))?;
        Ok(Self {
            command_tx,
            thread: Some(thread),
        })
    }

    pub fn wake(&self) {
        // a full channel already holds a pending wake
        let _ = self.command_tx.try_send(DriverCommand::Wake);
    }
}

impl Drop for DriverThread {
    fn drop(&mut self) {
        let _ = self.command_tx.send(DriverCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run(period: Duration, command_rx: Receiver<DriverCommand>, tick: &mut dyn FnMut() -> bool) {
    let mut running = false;
    let mut next_tick = Instant::now();

    loop {
        let command = if running {
            match command_rx.recv_deadline(next_tick) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match command_rx.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            }
        };

        match command {
            Some(DriverCommand::Shutdown) => break,
            Some(DriverCommand::Wake) => {
                running = true;
                next_tick = Instant::now();
            }
            None => {}
        }

        if running && Instant::now() >= next_tick {
            running = tick();
            // schedule from the intended time so the cadence does not drift,
            // but never try to catch up on missed ticks
            next_tick = (next_tick + period).max(Instant::now());
        }
    }
}
