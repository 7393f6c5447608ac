//! SequencePlayer facade
//!
//! The player owns at most one live session. Scheduling validates the whole
//! sequence, checks that the output can make sound, cancels whatever was
//! playing, anchors the new session slightly in the future and lets the
//! lookahead driver take it from there. Nothing here waits for playback;
//! completion is reported through the `on_complete` callback.
//!
//! Callbacks always run with the player lock released, so they may call
//! back into the player.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::clock::ClockSource;
use crate::config::{DriverMode, PlayerConfig};
use crate::driver::{DriverThread, LookaheadDriver, Silenced, TickReport};
use crate::error::SchedulerError;
use crate::output::{DeviceStatus, OutputDevice, VoiceSink};
use crate::queue::ScheduleQueue;
use crate::session::{
    CompletionCallback, EventCallback, Session, SessionId, SessionState, SessionStatus,
};
use crate::types::{Preset, ScheduledEvent, Sequence};
use crate::volume_bus::VolumeBus;

/// The collaborators a player drives.
#[derive(Clone)]
pub struct PlayerBackend {
    pub clock: Arc<dyn ClockSource>,
    pub sink: Arc<dyn VoiceSink>,
    pub device: Arc<dyn OutputDevice>,
    pub bus: Arc<VolumeBus>,
}

/// Callbacks for one scheduled session.
#[derive(Default)]
pub struct ScheduleOptions {
    on_complete: Option<CompletionCallback>,
    on_event_start: Option<EventCallback>,
}

impl ScheduleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once, with no arguments, when the session plays to its end.
    /// Never called for a session that was stopped or replaced.
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Called as each event is dispatched to the output, slightly ahead of
    /// its audible start.
    pub fn on_event_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&ScheduledEvent) + Send + Sync + 'static,
    {
        self.on_event_start = Some(Arc::new(f));
        self
    }
}

struct PlayerInner {
    session: Option<Session>,
    next_session: SessionId,
    capability_error: Option<SchedulerError>,
    error_reported: bool,
}

struct PlayerShared {
    config: PlayerConfig,
    driver: LookaheadDriver,
    backend: PlayerBackend,
    inner: Mutex<PlayerInner>,
}

pub struct SequencePlayer {
    shared: Arc<PlayerShared>,
    thread: Option<DriverThread>,
}

impl SequencePlayer {
    pub fn new(config: PlayerConfig, backend: PlayerBackend) -> Result<Self, SchedulerError> {
        config.validate()?;

        let driver = LookaheadDriver::new(config.lookahead_window, config.stop_fade, config.tone_shape);
        let shared = Arc::new(PlayerShared {
            driver,
            backend,
            inner: Mutex::new(PlayerInner {
                session: None,
                next_session: 1,
                capability_error: None,
                error_reported: false,
            }),
            config,
        });

        let thread = match shared.config.driver {
            DriverMode::Manual => None,
            DriverMode::Threaded => {
                let weak = Arc::downgrade(&shared);
                let period = Duration::from_secs_f64(shared.config.tick_period);
                let thread = DriverThread::spawn(period, move || match weak.upgrade() {
                    Some(shared) => shared.tick(),
                    None => false,
                })
                .map_err(|e| {
                    SchedulerError::InvalidConfig(format!("cannot start driver thread: {}", e))
                })?;
                Some(thread)
            }
        };

        Ok(Self { shared, thread })
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.shared.config
    }

    /// Validate `events` as a whole and schedule them.
    pub fn schedule_sequence(
        &self,
        events: Vec<ScheduledEvent>,
        options: ScheduleOptions,
    ) -> Result<PlaybackHandle, SchedulerError> {
        let sequence = Sequence::new(events)?;
        self.schedule(&sequence, options)
    }

    /// Schedule an already validated sequence, replacing any live session.
    ///
    /// Returns an already completed handle, without calling `on_complete`,
    /// when there is no audio output at all.
    pub fn schedule(
        &self,
        sequence: &Sequence,
        options: ScheduleOptions,
    ) -> Result<PlaybackHandle, SchedulerError> {
        let shared = &self.shared;
        if let Err(err) = shared.ensure_running() {
            return match err {
                SchedulerError::CapabilityUnavailable(_) => Ok(PlaybackHandle::finished(
                    shared.backend.clock.clone(),
                    sequence.total_duration(),
                )),
                other => Err(other),
            };
        }

        let (status, silenced) = {
            let mut inner = shared.lock();
            let silenced = inner
                .session
                .as_mut()
                .and_then(|previous| shared.cancel(previous, "replaced"));

            let id = inner.next_session;
            inner.next_session += 1;
            let anchor = shared.backend.clock.now() + shared.config.schedule_ahead;
            let status = Arc::new(SessionStatus::new(
                id,
                SessionState::Scheduled,
                anchor,
                sequence.total_duration(),
            ));
            inner.session = Some(Session::new(
                status.clone(),
                ScheduleQueue::from_sequence(sequence, anchor),
                options.on_complete,
                options.on_event_start,
            ));
            info!(
                session = id,
                events = sequence.len(),
                duration = sequence.total_duration(),
                anchor,
                "session scheduled"
            );
            (status, silenced)
        };

        if let Some(silenced) = silenced {
            silenced.send(shared.backend.sink.as_ref());
        }

        if let Some(thread) = &self.thread {
            thread.wake();
        }

        Ok(PlaybackHandle {
            status,
            player: Arc::downgrade(shared),
            clock: shared.backend.clock.clone(),
        })
    }

    /// Schedule a single note.
    pub fn play_tone(
        &self,
        frequency_hz: f32,
        duration_seconds: f64,
        amplitude: f32,
    ) -> Result<PlaybackHandle, SchedulerError> {
        self.schedule_sequence(
            vec![ScheduledEvent::note(0.0, frequency_hz, duration_seconds, amplitude)],
            ScheduleOptions::default(),
        )
    }

    pub fn play_preset(
        &self,
        preset: Preset,
        options: ScheduleOptions,
    ) -> Result<PlaybackHandle, SchedulerError> {
        self.schedule(&preset.sequence(), options)
    }

    /// Cancel the live session, if any. Idempotent. Its voices have been
    /// told to fade out by the time this returns.
    pub fn stop(&self) {
        let silenced = {
            let mut inner = self.shared.lock();
            inner
                .session
                .as_mut()
                .and_then(|session| self.shared.cancel(session, "stopped"))
        };
        if let Some(silenced) = silenced {
            silenced.send(self.shared.backend.sink.as_ref());
        }
    }

    /// Run one driver tick now. Returns `true` while a session is live.
    ///
    /// Required in [`DriverMode::Manual`]; harmless in threaded mode.
    pub fn tick(&self) -> bool {
        self.shared.tick()
    }

    /// Ramp the master gain to `volume`, over `ramp_seconds` or the
    /// configured default. NaN is ignored; other values are clamped to
    /// `[0, 1]`. Returns the gain now targeted.
    pub fn set_volume(&self, volume: f32, ramp_seconds: Option<f64>) -> f32 {
        let ramp = ramp_seconds.unwrap_or(self.shared.config.volume_ramp);
        match self.shared.backend.bus.set_gain(volume, ramp) {
            Some(target) => {
                debug!(target, ramp, "volume change");
                target
            }
            None => {
                warn!("ignoring NaN volume");
                self.volume()
            }
        }
    }

    /// Slider passthrough, 0 to 100.
    pub fn set_volume_percent(&self, percent: u8) -> f32 {
        self.set_volume(f32::from(percent.min(100)) / 100.0, None)
    }

    /// Volume the bus is set to (the end point of any running ramp).
    pub fn volume(&self) -> f32 {
        self.shared.backend.bus.target_gain()
    }

    /// Check the output and resume it if it is suspended. Call this from the
    /// user gesture that unlocks sound.
    pub fn initialize(&self) -> Result<(), SchedulerError> {
        self.shared.ensure_running()
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.shared.backend.device.status(), DeviceStatus::Unavailable(_))
    }

    /// The recorded capability error, if the output was ever found missing.
    pub fn initialization_error(&self) -> Option<SchedulerError> {
        self.shared.lock().capability_error.clone()
    }

    /// The capability error, returned once. Later calls return `None`.
    pub fn take_status(&self) -> Option<SchedulerError> {
        let mut inner = self.shared.lock();
        if inner.error_reported {
            return None;
        }
        let err = inner.capability_error.clone()?;
        inner.error_reported = true;
        Some(err)
    }

    /// State of the most recent session.
    pub fn session_state(&self) -> Option<SessionState> {
        self.shared
            .lock()
            .session
            .as_ref()
            .map(|s| s.status.state())
    }

    pub fn is_playing(&self) -> bool {
        self.session_state().is_some_and(SessionState::is_live)
    }
}

impl Drop for SequencePlayer {
    fn drop(&mut self) {
        self.stop();
        // joins the driver thread
        self.thread.take();
    }
}

impl PlayerShared {
    fn lock(&self) -> MutexGuard<'_, PlayerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_running(&self) -> Result<(), SchedulerError> {
        match self.backend.device.status() {
            DeviceStatus::Running => Ok(()),
            DeviceStatus::Suspended => {
                self.backend.device.resume().map_err(|reason| {
                    warn!(%reason, "audio output could not be resumed");
                    SchedulerError::SuspendedResource(reason)
                })?;
                info!("audio output resumed");
                Ok(())
            }
            DeviceStatus::Unavailable(reason) => {
                let err = SchedulerError::CapabilityUnavailable(reason);
                let mut inner = self.lock();
                if inner.capability_error.is_none() {
                    error!(error = %err, "audio disabled");
                    inner.capability_error = Some(err.clone());
                }
                Err(err)
            }
        }
    }

    /// Cancel `session` if it is still live and drop its completion
    /// callback. The returned stops must be sent after the lock is released.
    fn cancel(&self, session: &mut Session, why: &str) -> Option<Silenced> {
        if !session.status.finish(SessionState::Canceled) {
            return None;
        }
        let now = self.backend.clock.now();
        let silenced = self.driver.silence(session, now);
        session.on_complete = None;
        info!(
            session = session.id(),
            dispatched = session.dispatched,
            reason = why,
            "session canceled"
        );
        Some(silenced)
    }

    fn tick(&self) -> bool {
        let (report, on_event_start, status) = {
            let mut inner = self.lock();
            let Some(session) = inner.session.as_mut() else {
                return false;
            };
            let now = self.backend.clock.now();
            let report: TickReport = self.driver.tick(session, now, self.backend.sink.as_ref());
            (report, session.on_event_start.clone(), session.status.clone())
        };

        if let Some(callback) = on_event_start {
            for event in &report.started {
                if status.state() == SessionState::Canceled {
                    break;
                }
                callback(event);
            }
        }
        if let Some(on_complete) = report.on_complete {
            on_complete();
        }

        status.state().is_live()
    }

    fn stop_session(&self, id: SessionId) {
        let silenced = {
            let mut inner = self.lock();
            inner
                .session
                .as_mut()
                .filter(|s| s.id() == id)
                .and_then(|session| self.cancel(session, "stopped"))
        };
        if let Some(silenced) = silenced {
            silenced.send(self.backend.sink.as_ref());
        }
    }
}

/// Handle to one scheduled session.
#[derive(Clone)]
pub struct PlaybackHandle {
    status: Arc<SessionStatus>,
    player: Weak<PlayerShared>,
    clock: Arc<dyn ClockSource>,
}

impl PlaybackHandle {
    fn finished(clock: Arc<dyn ClockSource>, total_duration: f64) -> Self {
        Self {
            status: Arc::new(SessionStatus::new(
                0,
                SessionState::Completed,
                clock.now(),
                total_duration,
            )),
            player: Weak::new(),
            clock,
        }
    }

    /// Cancel this session. Does nothing if it already ended or a newer
    /// session replaced it.
    pub fn stop(&self) {
        if !self.status.state().is_live() {
            return;
        }
        if let Some(player) = self.player.upgrade() {
            player.stop_session(self.status.id);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.status.state().is_live()
    }

    pub fn state(&self) -> SessionState {
        self.status.state()
    }

    /// Zero for the handle returned when audio is unavailable.
    pub fn session_id(&self) -> SessionId {
        self.status.id
    }

    /// Seconds since the session anchor, zero before it and capped at the
    /// total duration.
    pub fn elapsed(&self) -> f64 {
        (self.clock.now() - self.status.anchor).clamp(0.0, self.status.total_duration)
    }

    pub fn total_duration(&self) -> f64 {
        self.status.total_duration
    }
}

impl std::fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("session", &self.status.id)
            .field("state", &self.status.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::output::NullDevice;
    use crate::voice::{VoiceId, VoiceSpec};

    struct Discard;

    impl VoiceSink for Discard {
        fn start_voice(&self, _spec: VoiceSpec) -> bool {
            true
        }

        fn stop_voice(&self, _id: VoiceId, _at: f64, _fade: f64) {}
    }

    fn player() -> (Arc<ManualClock>, SequencePlayer) {
        let clock = Arc::new(ManualClock::new(0.0));
        let backend = PlayerBackend {
            clock: clock.clone(),
            sink: Arc::new(Discard),
            device: Arc::new(NullDevice),
            bus: Arc::new(VolumeBus::new(clock.clone(), 0.3)),
        };
        (clock, SequencePlayer::new(PlayerConfig::manual(), backend).unwrap())
    }

    #[test]
    fn test_rejects_invalid_config() {
        let clock = Arc::new(ManualClock::new(0.0));
        let backend = PlayerBackend {
            clock: clock.clone(),
            sink: Arc::new(Discard),
            device: Arc::new(NullDevice),
            bus: Arc::new(VolumeBus::new(clock, 0.3)),
        };
        let config = PlayerConfig::manual().with_lookahead(0.1, 0.08);
        assert!(matches!(
            SequencePlayer::new(config, backend),
            Err(SchedulerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_handle_elapsed() {
        let (clock, player) = player();
        let handle = player.play_tone(440.0, 0.5, 0.5).unwrap();
        assert_eq!(handle.elapsed(), 0.0);
        clock.set(0.125);
        assert!((handle.elapsed() - 0.1).abs() < 1e-9);
        clock.set(10.0);
        assert_eq!(handle.elapsed(), 0.5);
    }

    #[test]
    fn test_volume_controls() {
        let (_, player) = player();
        assert_eq!(player.volume(), 0.3);
        assert_eq!(player.set_volume_percent(80), 0.8);
        assert_eq!(player.set_volume_percent(250), 1.0);
        assert_eq!(player.set_volume(f32::NAN, None), 1.0);
        assert_eq!(player.set_volume(-1.0, Some(0.0)), 0.0);
    }

    #[test]
    fn test_stop_idle_player_is_noop() {
        let (_, player) = player();
        player.stop();
        player.stop();
        assert_eq!(player.session_state(), None);
        assert!(!player.tick());
    }
}
