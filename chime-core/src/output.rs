//! Boundary between the control side and the audio device.
//!
//! The control side never touches render state directly. It sends
//! [`RenderCommand`]s through a bounded channel that the render engine
//! drains with `try_recv` at the top of every block, and it asks the
//! [`OutputDevice`] whether sound can be produced at all.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use tracing::warn;

use crate::voice::{VoiceId, VoiceSpec};

/// Control → render messages
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    Start(VoiceSpec),
    /// Fade voice `id` to silence starting at absolute time `at`
    Stop { id: VoiceId, at: f64, fade: f64 },
}

/// Where the lookahead driver sends dispatched voices.
pub trait VoiceSink: Send + Sync {
    /// Hand a voice to the renderer. Returns `false` if it was dropped.
    fn start_voice(&self, spec: VoiceSpec) -> bool;

    /// Force voice `id` to fade out from `at` over `fade` seconds.
    fn stop_voice(&self, id: VoiceId, at: f64, fade: f64);
}

/// How long a stop may wait for room in a full command channel
const STOP_SEND_TIMEOUT: Duration = Duration::from_millis(50);

/// [`VoiceSink`] backed by a bounded crossbeam channel to a `RenderEngine`.
#[derive(Debug, Clone)]
pub struct RenderBridge {
    tx: Sender<RenderCommand>,
}

/// Create a connected bridge and the receiver the render engine drains.
pub fn render_channel(capacity: usize) -> (RenderBridge, Receiver<RenderCommand>) {
    let (tx, rx) = bounded(capacity.max(1));
    (RenderBridge { tx }, rx)
}

impl VoiceSink for RenderBridge {
    fn start_voice(&self, spec: VoiceSpec) -> bool {
        let id = spec.id;
        match self.tx.try_send(RenderCommand::Start(spec)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(voice = id, "render queue full, dropping voice");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    fn stop_voice(&self, id: VoiceId, at: f64, fade: f64) {
        // A lost stop would leave a voice sounding, so this may wait briefly.
        match self
            .tx
            .send_timeout(RenderCommand::Stop { id, at, fade }, STOP_SEND_TIMEOUT)
        {
            Ok(()) | Err(SendTimeoutError::Disconnected(_)) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                warn!(voice = id, "render queue stalled, stop not delivered");
            }
        }
    }
}

/// Whether the output can currently produce sound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    Running,
    /// Exists but paused, pending a resume
    Suspended,
    /// No output at all, with the reason
    Unavailable(String),
}

/// Capability check and unlock for an audio output.
pub trait OutputDevice: Send + Sync {
    fn status(&self) -> DeviceStatus;

    /// Try to move a suspended output to running.
    fn resume(&self) -> Result<(), String>;
}

/// Output that always reports running. For headless use and tests,
/// paired with a manually driven render engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDevice;

impl OutputDevice for NullDevice {
    fn status(&self) -> DeviceStatus {
        DeviceStatus::Running
    }

    fn resume(&self) -> Result<(), String> {
        Ok(())
    }
}
