//! # Chime Core
//!
//! Sample-accurate tone sequencing without an audio device dependency.
//!
//! A [`SequencePlayer`] takes a [`Sequence`] of note and rest events, anchors it
//! to an audio-rate [`ClockSource`] and hands each event to the output slightly
//! ahead of time with its exact start instant attached. The timing of the
//! periodic driver never shows up in the audio: it only has to keep the
//! lookahead window filled.
//!
//! The render side ([`RenderEngine`]) is built to run inside a real-time
//! audio callback and is fed through a bounded channel ([`RenderBridge`]).
//!
//! ## Features
//!
//! - **serde**: derive `Serialize`/`Deserialize` for event and shape types
//!
//! ## Example
//!
//! ```ignore
//! use chime_core::{parse_phrase, ScheduleOptions};
//!
//! let phrase = parse_phrase("C4 E4 G4:0.6 | C4+E4+G4:0.8")?;
//! let handle = player.schedule(&phrase, ScheduleOptions::new().on_complete(|| {
//!     println!("done");
//! }))?;
//! ```

pub mod clock;
pub mod config;
pub mod driver;
pub mod envelope;
pub mod error;
pub mod oscillator;
pub mod output;
pub mod player;
pub mod queue;
pub mod render;
pub mod session;
pub mod types;
pub mod voice;
pub mod volume_bus;

pub use clock::{ClockSource, ManualClock, SampleClock};
pub use config::{DriverMode, PlayerConfig};
pub use driver::{DriverThread, LookaheadDriver};
pub use envelope::{EnvelopeStage, ToneEnvelope};
pub use error::{InvalidReason, SchedulerError};
pub use output::{
    render_channel, DeviceStatus, NullDevice, OutputDevice, RenderBridge, RenderCommand, VoiceSink,
};
pub use player::{PlaybackHandle, PlayerBackend, ScheduleOptions, SequencePlayer};
pub use queue::{QueuedEvent, ScheduleQueue};
pub use render::{RenderEngine, DEFAULT_MAX_VOICES};
pub use session::{SessionId, SessionState};
pub use types::{parse_phrase, Preset, ScheduledEvent, Sequence, ToneShape, Waveform};
pub use voice::{ToneVoice, VoiceId, VoiceSpec};
pub use volume_bus::{GainRamp, VolumeBus, MIN_RAMP_SECONDS};
