//! Audio-thread mixer
//!
//! [`RenderEngine::render`] is meant to be called from a real-time audio
//! callback. It never blocks, logs, or allocates: commands are drained with
//! `try_recv`, the voice pool is preallocated, and the master gain is read
//! from a lock-free snapshot.

use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::clock::SampleClock;
use crate::output::RenderCommand;
use crate::voice::ToneVoice;
use crate::volume_bus::VolumeBus;

pub const DEFAULT_MAX_VOICES: usize = 64;

pub struct RenderEngine {
    commands: Receiver<RenderCommand>,
    clock: Arc<SampleClock>,
    bus: Arc<VolumeBus>,
    voices: Vec<ToneVoice>,
    max_voices: usize,
    dropped: u64,
}

impl RenderEngine {
    pub fn new(
        commands: Receiver<RenderCommand>,
        clock: Arc<SampleClock>,
        bus: Arc<VolumeBus>,
        max_voices: usize,
    ) -> Self {
        let max_voices = max_voices.max(1);
        Self {
            commands,
            clock,
            bus,
            voices: Vec::with_capacity(max_voices),
            max_voices,
            dropped: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Voices refused because the pool was full.
    pub fn dropped_voices(&self) -> u64 {
        self.dropped
    }

    /// Fill an interleaved buffer with `channels` channels, then advance the
    /// clock by the number of frames written. The same mono signal goes to
    /// every channel.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let first_frame = self.clock.frames();
        self.apply_commands(first_frame);

        let gain = self.bus.snapshot();
        let mut frames = 0u64;
        let mut chunks = out.chunks_exact_mut(channels);
        for (i, frame_out) in chunks.by_ref().enumerate() {
            let frame = first_frame + i as u64;
            let mut mix = 0.0;
            for voice in self.voices.iter_mut() {
                mix += voice.next_sample(frame);
            }
            let level = gain.value_at(self.clock.frame_to_seconds(frame));
            frame_out.fill((mix * level).clamp(-1.0, 1.0));
            frames += 1;
        }
        chunks.into_remainder().fill(0.0);

        let end_frame = first_frame + frames;
        self.voices.retain(|v| !v.is_finished(end_frame));
        self.clock.advance(frames);
    }

    fn apply_commands(&mut self, block_start: u64) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                RenderCommand::Start(spec) => {
                    if self.voices.len() < self.max_voices {
                        self.voices
                            .push(ToneVoice::start(&spec, self.clock.sample_rate(), block_start));
                    } else {
                        self.dropped += 1;
                    }
                }
                RenderCommand::Stop { id, at, fade } => {
                    let at_frame = self.clock.seconds_to_frame(at).max(block_start);
                    if let Some(voice) = self.voices.iter_mut().find(|v| v.id() == id) {
                        voice.stop(at_frame, fade);
                    }
                }
            }
        }
    }
}
