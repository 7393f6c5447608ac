//! Command registry for REPL commands
//!
//! Commands are matched by longest prefix. Anything that is not a command
//! is played as phrase text.

pub mod general;
pub mod playback;

use chime_core::{parse_phrase, ScheduleOptions, SequencePlayer};
use colored::*;
use crossbeam_channel::Sender;
use std::sync::Arc;

/// Result of executing a command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Command executed successfully, continue REPL
    Success,
    /// Command executed, show this message
    Message(String),
    /// Exit the REPL
    Exit,
    /// Not a command, try playing it as a phrase
    NotACommand,
    /// Error occurred
    Error(String),
    /// Replay a phrase file whenever it changes
    Watch(String),
    /// Stop watching
    Unwatch,
}

/// Context passed to command handlers
pub struct CommandContext {
    pub player: Arc<SequencePlayer>,
    /// Human readable output device name
    pub device: String,
    /// Messages printed by the REPL loop when they arrive, e.g. from
    /// completion callbacks on the driver thread
    notices: Sender<String>,
}

impl CommandContext {
    pub fn new(player: Arc<SequencePlayer>, device: impl Into<String>, notices: Sender<String>) -> Self {
        Self {
            player,
            device: device.into(),
            notices,
        }
    }

    /// Options that post "finished <label>" when the session plays out.
    pub fn completion_notice(&self, label: impl Into<String>) -> ScheduleOptions {
        let notices = self.notices.clone();
        let label = label.into();
        ScheduleOptions::new().on_complete(move || {
            let _ = notices.send(format!("{} finished {}", "✓".bright_green(), label));
        })
    }

    /// Parse and schedule phrase text, replacing whatever is playing.
    pub fn play_phrase(&self, text: &str) -> CommandResult {
        let phrase = match parse_phrase(text) {
            Ok(phrase) => phrase,
            Err(e) => return CommandResult::Error(e.to_string()),
        };
        let label = if phrase.part_count() > 1 {
            format!("{} parts", phrase.part_count())
        } else {
            "phrase".to_string()
        };

        match self.player.schedule(&phrase, self.completion_notice(label)) {
            Ok(_) => match self.player.take_status() {
                Some(e) => CommandResult::Error(format!("{} (playing silently)", e)),
                None if !self.player.is_available() => CommandResult::Success,
                None => CommandResult::Message(
                    format!(
                        "🎵 Playing {} events ({:.2}s)",
                        phrase.len(),
                        phrase.total_duration()
                    )
                    .bright_green()
                    .to_string(),
                ),
            },
            Err(e) => CommandResult::Error(e.to_string()),
        }
    }
}

/// A command handler function
pub type CommandHandler = fn(&str, &mut CommandContext) -> CommandResult;

/// Registry of available commands
pub struct CommandRegistry {
    /// Sorted by prefix length descending for longest-match-first lookup
    commands: Vec<(String, CommandHandler)>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Register a command with its prefix
    pub fn register(&mut self, prefix: &str, handler: CommandHandler) {
        self.commands.push((prefix.to_string(), handler));
        self.commands.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Execute a command, returning NotACommand if no match found
    pub fn execute(&self, input: &str, ctx: &mut CommandContext) -> CommandResult {
        for (prefix, handler) in &self.commands {
            if input == prefix || input.starts_with(&format!("{} ", prefix)) {
                let args = input[prefix.len()..].trim();
                return handler(args, ctx);
            }
        }
        CommandResult::NotACommand
    }

    /// Get all registered command prefixes
    pub fn list_commands(&self) -> Vec<&str> {
        self.commands.iter().map(|(p, _)| p.as_str()).collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a fully populated command registry with all built-in commands
pub fn create_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    registry.register("play", playback::cmd_play);
    registry.register("tone", playback::cmd_tone);
    registry.register("stop", playback::cmd_stop);
    registry.register("volume", playback::cmd_volume);
    registry.register("status", playback::cmd_status);

    registry.register("help", general::cmd_help);
    registry.register("quit", general::cmd_quit);
    registry.register("exit", general::cmd_quit);
    registry.register("watch", general::cmd_watch);
    registry.register("unwatch", general::cmd_unwatch);

    registry
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::{AudioBackend, OutputSettings};
    use chime_core::{PlayerConfig, RenderEngine, SessionState};
    use crossbeam_channel::{unbounded, Receiver};

    /// Headless context with a manually driven player.
    pub(crate) fn headless_context() -> (CommandContext, RenderEngine, Receiver<String>) {
        let (backend, engine) = AudioBackend::headless(&OutputSettings::default(), 48_000);
        let player = Arc::new(backend.player(PlayerConfig::manual()).unwrap());
        let (tx, rx) = unbounded();
        (CommandContext::new(player, backend.description(), tx), engine, rx)
    }

    /// Tick and render until the notice channel has something, or give up.
    pub(crate) fn run_until_notice(
        ctx: &CommandContext,
        engine: &mut RenderEngine,
        notices: &Receiver<String>,
    ) -> Option<String> {
        let mut block = [0.0f32; 480];
        for _ in 0..500 {
            ctx.player.tick();
            engine.render(&mut block, 1);
            if let Ok(notice) = notices.try_recv() {
                return Some(notice);
            }
        }
        None
    }

    #[test]
    fn test_longest_prefix_wins() {
        fn short(_: &str, _: &mut CommandContext) -> CommandResult {
            CommandResult::Message("short".into())
        }
        fn long(args: &str, _: &mut CommandContext) -> CommandResult {
            CommandResult::Message(format!("long:{}", args))
        }

        let mut registry = CommandRegistry::new();
        registry.register("tone", short);
        registry.register("tone list", long);
        let (mut ctx, _engine, _rx) = headless_context();

        assert_eq!(
            registry.execute("tone list  all", &mut ctx),
            CommandResult::Message("long:all".into())
        );
        assert_eq!(
            registry.execute("tone", &mut ctx),
            CommandResult::Message("short".into())
        );
        // a prefix must end at a word boundary
        assert_eq!(registry.execute("tones", &mut ctx), CommandResult::NotACommand);
        assert_eq!(registry.list_commands(), vec!["tone list", "tone"]);
    }

    #[test]
    fn test_phrase_plays_and_reports_completion() {
        let (ctx, mut engine, notices) = headless_context();
        match ctx.play_phrase("C4:0.1 E4:0.1") {
            CommandResult::Message(msg) => assert!(msg.contains("2 events")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(ctx.player.is_playing());

        let notice = run_until_notice(&ctx, &mut engine, &notices).expect("completion notice");
        assert!(notice.contains("finished phrase"));
        assert_eq!(ctx.player.session_state(), Some(SessionState::Completed));
    }

    #[test]
    fn test_bad_phrase_is_an_error() {
        let (ctx, _engine, _rx) = headless_context();
        match ctx.play_phrase("C4 H9") {
            CommandResult::Error(msg) => assert!(msg.contains("token 2")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ctx.player.session_state(), None);
    }
}
