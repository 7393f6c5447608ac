//! Error taxonomy for the scheduling core.
//!
//! Every error is returned synchronously from the call that caused it.
//! None of them are fatal: the player degrades to silence instead.

use std::fmt;

/// Why a submitted event (or sequence) was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidReason {
    /// The sequence contained no events at all
    EmptySequence,
    /// `duration_seconds` was zero or negative
    NonPositiveDuration(f64),
    /// `amplitude` was outside `[0, 1]`
    AmplitudeOutOfRange(f32),
    /// `offset_seconds` was negative
    NegativeOffset(f64),
    /// A numeric field was NaN or infinite
    NonFinite(&'static str),
    /// Parallel input arrays had different lengths
    MismatchedLengths { expected: usize, found: usize },
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::EmptySequence => write!(f, "sequence has no events"),
            InvalidReason::NonPositiveDuration(d) => {
                write!(f, "duration must be positive, got {}s", d)
            }
            InvalidReason::AmplitudeOutOfRange(a) => {
                write!(f, "amplitude must be within [0, 1], got {}", a)
            }
            InvalidReason::NegativeOffset(o) => {
                write!(f, "offset must not be negative, got {}s", o)
            }
            InvalidReason::NonFinite(field) => write!(f, "{} is not a finite number", field),
            InvalidReason::MismatchedLengths { expected, found } => {
                write!(f, "expected {} values, found {}", expected, found)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerError {
    /// No audio output capability exists at all
    CapabilityUnavailable(String),
    /// The output exists but could not be resumed
    SuspendedResource(String),
    /// An event failed validation; nothing was scheduled
    InvalidEvent {
        /// Position of the offending event in the submitted list
        position: Option<usize>,
        reason: InvalidReason,
    },
    /// Player configuration is inconsistent
    InvalidConfig(String),
    /// Phrase text could not be parsed
    Parse { position: usize, message: String },
}

impl SchedulerError {
    pub(crate) fn invalid(position: usize, reason: InvalidReason) -> Self {
        SchedulerError::InvalidEvent {
            position: Some(position),
            reason,
        }
    }

    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        SchedulerError::Parse {
            position,
            message: message.into(),
        }
    }
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::CapabilityUnavailable(msg) => {
                write!(f, "audio output unavailable: {}", msg)
            }
            SchedulerError::SuspendedResource(msg) => {
                write!(f, "audio output is suspended and could not be resumed: {}", msg)
            }
            SchedulerError::InvalidEvent {
                position: Some(pos),
                reason,
            } => write!(f, "invalid event at position {}: {}", pos, reason),
            SchedulerError::InvalidEvent {
                position: None,
                reason,
            } => write!(f, "invalid sequence: {}", reason),
            SchedulerError::InvalidConfig(msg) => write!(f, "invalid player config: {}", msg),
            SchedulerError::Parse { position, message } => {
                write!(f, "phrase error at token {}: {}", position, message)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}
