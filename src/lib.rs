//! # Chime
//!
//! Interactive front end for [`chime_core`]: plays tone phrases and feedback
//! sounds on the default audio output with sample-accurate timing.
//!
//! ## Modules
//!
//! - `audio`: the cpal output device that hosts the core render engine, and
//!   [`AudioBackend`] which wires clock, volume bus and render channel
//!   together for a player.
//! - `commands`: the REPL command registry.
//! - `repl`: the Read-Eval-Print Loop and the phrase file watcher.

pub mod audio;
pub mod commands;
pub mod repl;

pub use crate::audio::{AudioBackend, OutputSettings};
pub use chime_core::{parse_phrase, PlayerConfig, Preset, ScheduleOptions, SequencePlayer};
