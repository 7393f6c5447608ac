//! cpal output device
//!
//! The cpal stream is owned by a dedicated thread because a `Stream` is not
//! `Send` on every host. That thread builds the stream paused, so the
//! device starts out [`DeviceStatus::Suspended`] until the player resumes it.
//! The stream callback hosts the core [`RenderEngine`], which advances the
//! shared [`SampleClock`] as it renders.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Result};
use chime_core::{
    render_channel, DeviceStatus, ManualClock, NullDevice, OutputDevice, PlayerBackend,
    PlayerConfig, RenderCommand, RenderEngine, SampleClock, SequencePlayer, VolumeBus,
    DEFAULT_MAX_VOICES,
};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{info, warn};

/// Device-side settings, fixed when the output is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    /// Initial master gain, in [0, 1]
    pub default_volume: f32,
    /// Voices the mixer preallocates room for
    pub max_voices: usize,
    /// Capacity of the control to render channel
    pub command_capacity: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            default_volume: 0.3,
            max_voices: DEFAULT_MAX_VOICES,
            command_capacity: 256,
        }
    }
}

/// Frames rendered per pass through the scratch buffer
const SCRATCH_FRAMES: usize = 2048;

/// How long `resume` waits for the stream thread
const RESUME_TIMEOUT: Duration = Duration::from_secs(1);

const STATUS_RUNNING: u8 = 0;
const STATUS_SUSPENDED: u8 = 1;
const STATUS_FAILED: u8 = 2;

enum DeviceCommand {
    Resume(Sender<Result<(), String>>),
    Shutdown,
}

/// What the stream thread reports back once the stream exists.
struct Opened {
    clock: Arc<SampleClock>,
    bus: Arc<VolumeBus>,
    name: String,
    channels: usize,
}

/// The default cpal output device, driven by the core render engine.
pub struct CpalOutput {
    status: Arc<AtomicU8>,
    failure: Arc<Mutex<Option<String>>>,
    command_tx: Sender<DeviceCommand>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
}

impl CpalOutput {
    fn open(
        settings: &OutputSettings,
        commands: Receiver<RenderCommand>,
    ) -> Result<(Self, Opened)> {
        let status = Arc::new(AtomicU8::new(STATUS_SUSPENDED));
        let failure = Arc::new(Mutex::new(None));
        let (command_tx, command_rx) = bounded(8);
        let (opened_tx, opened_rx) = bounded(1);

        let thread = {
            let settings = settings.clone();
            let status = status.clone();
            let failure = failure.clone();
            thread::Builder::new()
                .name("chime-audio".into())
                .spawn(move || {
                    match build_output(&settings, commands, status.clone(), failure) {
                        Ok((stream, opened)) => {
                            let _ = opened_tx.send(Ok(opened));
                            serve(stream, command_rx, &status);
                        }
                        Err(e) => {
                            let _ = opened_tx.send(Err(e));
                        }
                    }
                })?
        };

        let opened = match opened_rx.recv() {
            Ok(Ok(opened)) => opened,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(anyhow!("audio thread exited before opening a stream"));
            }
        };

        info!(
            device = %opened.name,
            sample_rate = opened.clock.sample_rate(),
            channels = opened.channels,
            "audio output opened"
        );

        let output = Self {
            status,
            failure,
            command_tx,
            thread: Some(thread),
            sample_rate: opened.clock.sample_rate(),
        };
        Ok((output, opened))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl OutputDevice for CpalOutput {
    fn status(&self) -> DeviceStatus {
        match self.status.load(Ordering::Acquire) {
            STATUS_RUNNING => DeviceStatus::Running,
            STATUS_SUSPENDED => DeviceStatus::Suspended,
            _ => {
                let reason = self
                    .failure
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone()
                    .unwrap_or_else(|| "audio stream failed".to_string());
                DeviceStatus::Unavailable(reason)
            }
        }
    }

    fn resume(&self) -> std::result::Result<(), String> {
        if self.status.load(Ordering::Acquire) == STATUS_RUNNING {
            return Ok(());
        }
        let (reply_tx, reply_rx) = bounded(1);
        self.command_tx
            .send(DeviceCommand::Resume(reply_tx))
            .map_err(|_| "audio thread is gone".to_string())?;
        reply_rx
            .recv_timeout(RESUME_TIMEOUT)
            .map_err(|_| "audio thread did not answer".to_string())?
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.command_tx.send(DeviceCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn build_output(
    settings: &OutputSettings,
    commands: Receiver<RenderCommand>,
    status: Arc<AtomicU8>,
    failure: Arc<Mutex<Option<String>>>,
) -> Result<(Stream, Opened)> {
    let host = cpal::default_host();
    info!("Audio host: {:?}", host.id());

    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("no output device available"))?;
    let name = device.name().unwrap_or_else(|_| "unknown device".to_string());
    let supported = device.default_output_config()?;

    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();
    let channels = config.channels as usize;

    let clock = Arc::new(SampleClock::new(config.sample_rate.0));
    let bus = Arc::new(VolumeBus::new(clock.clone(), settings.default_volume));
    let engine = RenderEngine::new(commands, clock.clone(), bus.clone(), settings.max_voices);

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, engine, status, failure)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, engine, status, failure)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, engine, status, failure)?,
        other => return Err(anyhow!("unsupported sample format: {:?}", other)),
    };
    // some hosts start streams on creation
    let _ = stream.pause();

    Ok((
        stream,
        Opened {
            clock,
            bus,
            name,
            channels,
        },
    ))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut engine: RenderEngine,
    status: Arc<AtomicU8>,
    failure: Arc<Mutex<Option<String>>>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
{
    let channels = (config.channels as usize).max(1);
    let mut scratch = vec![0.0f32; SCRATCH_FRAMES * channels];

    let err_fn = move |err: cpal::StreamError| {
        warn!("audio stream error: {}", err);
        if let cpal::StreamError::DeviceNotAvailable = err {
            *failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
            status.store(STATUS_FAILED, Ordering::Release);
        }
    };

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for out in data.chunks_mut(scratch.len()) {
                    let block = &mut scratch[..out.len()];
                    engine.render(block, channels);
                    for (sample, value) in out.iter_mut().zip(block.iter()) {
                        *sample = T::from_sample(*value);
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| anyhow!("failed to build output stream: {}", e))?;

    Ok(stream)
}

fn serve(stream: Stream, command_rx: Receiver<DeviceCommand>, status: &AtomicU8) {
    loop {
        match command_rx.recv() {
            Ok(DeviceCommand::Resume(reply)) => {
                let result = if status.load(Ordering::Acquire) == STATUS_FAILED {
                    Err("audio stream failed".to_string())
                } else {
                    stream.play().map_err(|e| e.to_string())
                };
                if result.is_ok() {
                    status.store(STATUS_RUNNING, Ordering::Release);
                    info!("audio output running");
                }
                let _ = reply.send(result);
            }
            Ok(DeviceCommand::Shutdown) | Err(_) => break,
        }
    }
}

/// Stands in for a device that could not be opened.
struct MissingDevice {
    reason: String,
}

impl OutputDevice for MissingDevice {
    fn status(&self) -> DeviceStatus {
        DeviceStatus::Unavailable(self.reason.clone())
    }

    fn resume(&self) -> std::result::Result<(), String> {
        Err(self.reason.clone())
    }
}

/// Everything a [`SequencePlayer`] needs, wired to one output.
pub struct AudioBackend {
    backend: PlayerBackend,
    description: String,
    sample_rate: Option<u32>,
}

impl AudioBackend {
    /// Open the default output device. Never fails: without a usable device
    /// the backend reports the output as unavailable and the player stays
    /// silent.
    pub fn open(settings: &OutputSettings) -> Self {
        let (bridge, commands) = render_channel(settings.command_capacity);
        match CpalOutput::open(settings, commands) {
            Ok((output, opened)) => {
                let sample_rate = output.sample_rate();
                Self {
                    backend: PlayerBackend {
                        clock: opened.clock,
                        sink: Arc::new(bridge),
                        device: Arc::new(output),
                        bus: opened.bus,
                    },
                    description: format!("{} ({} Hz, {} ch)", opened.name, sample_rate, opened.channels),
                    sample_rate: Some(sample_rate),
                }
            }
            Err(e) => {
                warn!("audio output unavailable: {:#}", e);
                let clock = Arc::new(ManualClock::new(0.0));
                Self {
                    backend: PlayerBackend {
                        clock: clock.clone(),
                        sink: Arc::new(bridge),
                        device: Arc::new(MissingDevice {
                            reason: e.to_string(),
                        }),
                        bus: Arc::new(VolumeBus::new(clock, settings.default_volume)),
                    },
                    description: "no output device".to_string(),
                    sample_rate: None,
                }
            }
        }
    }

    /// A device-free backend. The caller renders by hand with the returned
    /// engine.
    pub fn headless(settings: &OutputSettings, sample_rate: u32) -> (Self, RenderEngine) {
        let clock = Arc::new(SampleClock::new(sample_rate));
        let bus = Arc::new(VolumeBus::new(clock.clone(), settings.default_volume));
        let (bridge, commands) = render_channel(settings.command_capacity);
        let engine = RenderEngine::new(commands, clock.clone(), bus.clone(), settings.max_voices);
        let backend = Self {
            backend: PlayerBackend {
                clock,
                sink: Arc::new(bridge),
                device: Arc::new(NullDevice),
                bus,
            },
            description: format!("headless ({} Hz)", sample_rate),
            sample_rate: Some(sample_rate),
        };
        (backend, engine)
    }

    pub fn player(&self, config: PlayerConfig) -> Result<SequencePlayer> {
        Ok(SequencePlayer::new(config, self.backend.clone())?)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_core::{ScheduleOptions, SessionState};

    #[test]
    fn test_default_settings() {
        let settings = OutputSettings::default();
        assert_eq!(settings.default_volume, 0.3);
        assert_eq!(settings.max_voices, 64);
        assert_eq!(settings.command_capacity, 256);
    }

    #[test]
    fn test_open_default_device() {
        // This test may find no device on CI hosts
        let backend = AudioBackend::open(&OutputSettings::default());
        let player = backend.player(PlayerConfig::manual()).unwrap();
        match backend.sample_rate() {
            Some(rate) => {
                assert!(rate > 0);
                assert!(player.is_available());
            }
            None => {
                println!("No audio device available: {}", backend.description());
                assert!(!player.is_available());
                let handle = player
                    .play_preset(chime_core::Preset::Click, ScheduleOptions::new())
                    .unwrap();
                assert_eq!(handle.state(), SessionState::Completed);
                assert!(player.take_status().is_some());
            }
        }
        assert_eq!(player.volume(), 0.3);
    }

    #[test]
    fn test_headless_backend_renders() {
        let (backend, mut engine) = AudioBackend::headless(&OutputSettings::default(), 48_000);
        let player = backend.player(PlayerConfig::manual()).unwrap();
        player.play_tone(440.0, 0.2, 1.0).unwrap();

        let mut block = [0.0f32; 960];
        let mut peak = 0.0f32;
        for _ in 0..20 {
            player.tick();
            engine.render(&mut block, 2);
            peak = block.iter().fold(peak, |m, s| m.max(s.abs()));
        }
        assert!(peak > 0.0);
        // default volume scales the mix
        assert!(peak <= 0.3 * 0.3 + 1e-6);
        assert_eq!(backend.description(), "headless (48000 Hz)");
    }
}
