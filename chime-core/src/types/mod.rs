// chime-core/src/types/mod.rs

pub mod audio_config;
pub mod note;
pub mod phrase;
pub mod presets;
pub mod scheduled_event;
pub mod sequence;

pub use audio_config::{ToneShape, Waveform};
pub use note::note_frequency;
pub use phrase::parse_phrase;
pub use presets::Preset;
pub use scheduled_event::ScheduledEvent;
pub use sequence::{Sequence, DEFAULT_DYNAMIC, MAX_FREQUENCY, MIN_FREQUENCY};
