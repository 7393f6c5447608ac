//! Player configuration

use crate::error::SchedulerError;
use crate::types::ToneShape;

/// Who runs the lookahead driver ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverMode {
    /// A background timer thread ticks while a session is live
    #[default]
    Threaded,
    /// The caller invokes `SequencePlayer::tick` itself
    Manual,
}

/// Timing and envelope settings for a `SequencePlayer`.
///
/// All durations are in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    /// How far past `now` events are handed to the output on each tick
    pub lookahead_window: f64,
    /// Period of the driver tick, at most half the window
    pub tick_period: f64,
    /// Delay between the schedule call and the session anchor
    pub schedule_ahead: f64,
    /// Ramp used by `set_volume` when the caller gives none
    pub volume_ramp: f64,
    /// Fade applied when voices are cut short by `stop`
    pub stop_fade: f64,
    pub tone_shape: ToneShape,
    pub driver: DriverMode,
}

pub const MIN_STOP_FADE: f64 = 0.002;
pub const MAX_STOP_FADE: f64 = 0.005;

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            lookahead_window: 0.1,
            tick_period: 0.025,
            schedule_ahead: 0.025,
            volume_ramp: 0.05,
            stop_fade: 0.003,
            tone_shape: ToneShape::soft(),
            driver: DriverMode::Threaded,
        }
    }
}

impl PlayerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default timings with the driver left to the caller.
    pub fn manual() -> Self {
        Self::default().with_driver(DriverMode::Manual)
    }

    pub fn with_lookahead(mut self, window: f64, tick_period: f64) -> Self {
        self.lookahead_window = window;
        self.tick_period = tick_period;
        self
    }

    pub fn with_schedule_ahead(mut self, seconds: f64) -> Self {
        self.schedule_ahead = seconds;
        self
    }

    pub fn with_volume_ramp(mut self, seconds: f64) -> Self {
        self.volume_ramp = seconds;
        self
    }

    pub fn with_stop_fade(mut self, seconds: f64) -> Self {
        self.stop_fade = seconds;
        self
    }

    pub fn with_tone_shape(mut self, shape: ToneShape) -> Self {
        self.tone_shape = shape;
        self
    }

    pub fn with_driver(mut self, driver: DriverMode) -> Self {
        self.driver = driver;
        self
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        let invalid = |msg: String| Err(SchedulerError::InvalidConfig(msg));

        let finite = [
            ("lookahead_window", self.lookahead_window),
            ("tick_period", self.tick_period),
            ("schedule_ahead", self.schedule_ahead),
            ("volume_ramp", self.volume_ramp),
            ("stop_fade", self.stop_fade),
        ];
        if let Some((name, _)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return invalid(format!("{} is not a finite number", name));
        }

        if self.lookahead_window <= 0.0 {
            return invalid(format!(
                "lookahead_window must be positive, got {}s",
                self.lookahead_window
            ));
        }
        if self.tick_period <= 0.0 || self.tick_period > self.lookahead_window / 2.0 {
            return invalid(format!(
                "tick_period must be within (0, {}s], got {}s",
                self.lookahead_window / 2.0,
                self.tick_period
            ));
        }
        if self.schedule_ahead < 0.0 {
            return invalid(format!(
                "schedule_ahead must not be negative, got {}s",
                self.schedule_ahead
            ));
        }
        if self.volume_ramp < 0.0 {
            return invalid(format!("volume_ramp must not be negative, got {}s", self.volume_ramp));
        }
        if !(MIN_STOP_FADE..=MAX_STOP_FADE).contains(&self.stop_fade) {
            return invalid(format!(
                "stop_fade must be within [{}s, {}s], got {}s",
                MIN_STOP_FADE, MAX_STOP_FADE, self.stop_fade
            ));
        }
        if !self.tone_shape.is_consistent() {
            return invalid("tone_shape stages leave no sustain segment".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PlayerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.driver, DriverMode::Threaded);
        assert_eq!(PlayerConfig::manual().driver, DriverMode::Manual);
    }

    #[test]
    fn test_tick_must_fit_twice_in_window() {
        let config = PlayerConfig::default().with_lookahead(0.1, 0.06);
        assert!(matches!(config.validate(), Err(SchedulerError::InvalidConfig(_))));
        let config = PlayerConfig::default().with_lookahead(0.1, 0.05);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_stop_fade_bounds() {
        assert!(PlayerConfig::default().with_stop_fade(0.001).validate().is_err());
        assert!(PlayerConfig::default().with_stop_fade(0.006).validate().is_err());
        assert!(PlayerConfig::default().with_stop_fade(0.005).validate().is_ok());
    }

    #[test]
    fn test_rejects_nan() {
        let err = PlayerConfig::default()
            .with_schedule_ahead(f64::NAN)
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            SchedulerError::InvalidConfig("schedule_ahead is not a finite number".into())
        );
    }
}
