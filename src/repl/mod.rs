//! REPL (Read-Eval-Print Loop) for playing phrases

use crate::audio::{AudioBackend, OutputSettings};
use crate::commands::{create_registry, CommandContext, CommandRegistry, CommandResult};
use crate::repl::watcher::{is_content_change, phrase_text, FileWatcher};
use anyhow::{anyhow, Result};
use chime_core::{PlayerConfig, SequencePlayer};
use colored::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use notify::Event;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::Path;
use std::sync::Arc;
use std::thread;

pub mod watcher;

/// Interactive REPL around one [`SequencePlayer`]
pub struct Repl {
    editor: Option<DefaultEditor>,
    registry: CommandRegistry,
    ctx: CommandContext,
    /// Keeps the output device open for the life of the REPL
    _backend: AudioBackend,

    // Event channels
    tx_input: Sender<std::result::Result<String, ReadlineError>>,
    rx_input: Receiver<std::result::Result<String, ReadlineError>>,
    tx_watcher: Sender<notify::Result<Event>>,
    rx_watcher: Receiver<notify::Result<Event>>,
    rx_notices: Receiver<String>,

    watcher: Option<FileWatcher>,
}

impl Repl {
    /// Open the default output and build the player.
    pub fn new() -> Result<Self> {
        let editor =
            DefaultEditor::new().map_err(|e| anyhow!("Failed to initialize REPL: {}", e))?;
        let backend = AudioBackend::open(&OutputSettings::default());
        let player = Arc::new(backend.player(PlayerConfig::default())?);

        let (tx_input, rx_input) = unbounded();
        let (tx_watcher, rx_watcher) = unbounded();
        let (tx_notices, rx_notices) = unbounded();

        Ok(Repl {
            editor: Some(editor),
            registry: create_registry(),
            ctx: CommandContext::new(player, backend.description(), tx_notices),
            _backend: backend,
            tx_input,
            rx_input,
            tx_watcher,
            rx_watcher,
            rx_notices,
            watcher: None,
        })
    }

    fn player(&self) -> &SequencePlayer {
        &self.ctx.player
    }

    /// Resume the output. Without a device this says so once and the REPL
    /// carries on silently.
    fn initialize(&self) {
        if let Err(e) = self.player().initialize() {
            println!("{} {} (running silently)", "Audio:".bright_red().bold(), e);
            // already reported
            let _ = self.player().take_status();
        } else {
            println!("{} {}", "Audio:".bright_green().bold(), self.ctx.device);
        }
    }

    /// Start the REPL loop
    pub fn run(&mut self) -> Result<()> {
        println!(
            "{} {}",
            "🎵".bright_yellow(),
            "Chime Tone Player".bright_cyan().bold()
        );
        println!(
            "Type a phrase like: {}, {}, {}",
            "C4 E4 G4".cyan(),
            "A4:0.5 _ A4".cyan(),
            "C4+E4+G4:0.8".cyan()
        );
        println!(
            "Type '{}' for more information, '{}' or {} to exit.\n",
            "help".bright_green(),
            "quit".bright_red(),
            "Ctrl+C".bright_red()
        );
        self.initialize();

        let mut editor = self
            .editor
            .take()
            .ok_or_else(|| anyhow!("REPL is already running"))?;
        let tx_input = self.tx_input.clone();

        thread::spawn(move || loop {
            let prompt = format!("{} ", "chime>".bright_magenta().bold());
            match editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if !line.is_empty() {
                        let _ = editor.add_history_entry(&line);
                    }
                    if tx_input.send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = tx_input.send(Err(err));
                    break;
                }
            }
        });

        loop {
            crossbeam_channel::select! {
                recv(self.rx_input) -> msg => match msg {
                    Ok(Ok(line)) => {
                        if line.is_empty() {
                            continue;
                        }
                        if !self.handle_line(&line) {
                            println!("{} 🎵", "Goodbye!".bright_cyan());
                            break;
                        }
                    }
                    Ok(Err(ReadlineError::Interrupted)) | Ok(Err(ReadlineError::Eof)) => {
                        println!("{} 🎵", "Goodbye!".bright_cyan());
                        break;
                    }
                    Ok(Err(err)) => {
                        println!(
                            "{} {}",
                            "Error reading input:".bright_red().bold(),
                            err.to_string().red()
                        );
                        break;
                    }
                    Err(_) => break, // Channel closed
                },

                recv(self.rx_watcher) -> msg => match msg {
                    Ok(Ok(event)) => {
                        if is_content_change(&event) {
                            if let Some(path) = event.paths.first() {
                                self.replay_file(path);
                            }
                        }
                    }
                    Ok(Err(e)) => println!("{} Watch error: {}", "Error:".red(), e),
                    Err(_) => break,
                },

                recv(self.rx_notices) -> msg => {
                    if let Ok(notice) = msg {
                        println!("{}", notice);
                    }
                }
            }
        }

        self.player().stop();
        Ok(())
    }

    /// Run one input line. Returns `false` when the REPL should exit.
    fn handle_line(&mut self, line: &str) -> bool {
        match self.registry.execute(line, &mut self.ctx) {
            CommandResult::Success => {}
            CommandResult::Message(msg) => println!("{}", msg),
            CommandResult::Exit => return false,
            CommandResult::Error(e) => println!("{} {}", "Error:".bright_red().bold(), e.red()),
            CommandResult::Watch(path) => self.watch(&path),
            CommandResult::Unwatch => self.unwatch(),
            CommandResult::NotACommand => match self.ctx.play_phrase(line) {
                CommandResult::Message(msg) => println!("{}", msg),
                CommandResult::Error(e) => {
                    println!("{} {}", "Error:".bright_red().bold(), e.red())
                }
                _ => {}
            },
        }
        true
    }

    fn watch(&mut self, path: &str) {
        if self.watcher.is_none() {
            match FileWatcher::new(self.tx_watcher.clone()) {
                Ok(w) => self.watcher = Some(w),
                Err(e) => {
                    println!("{} Failed to create watcher: {}", "Error:".red(), e);
                    return;
                }
            }
        }

        if let Some(w) = &mut self.watcher {
            match w.watch(path) {
                Ok(()) => {
                    println!("{} Watching {} for changes...", "👀", path.bright_green());
                    self.replay_file(Path::new(path));
                }
                Err(e) => println!("{} Failed to watch {}: {}", "Error:".red(), path, e),
            }
        }
    }

    fn unwatch(&mut self) {
        match self.watcher.as_mut().map(FileWatcher::unwatch) {
            Some(Ok(Some(path))) => println!("Stopped watching {}", path.display()),
            Some(Err(e)) => println!("{} Failed to unwatch: {}", "Error:".red(), e),
            _ => println!("Not watching anything."),
        }
    }

    /// Play the phrase in `path` from the top.
    fn replay_file(&mut self, path: &Path) {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                println!("{} Failed to read {}: {}", "Error:".red(), path.display(), e);
                return;
            }
        };
        let text = phrase_text(&contents);
        if text.is_empty() {
            return;
        }

        println!("{} Replaying {}", "⚡".bright_yellow(), path.display());
        match self.ctx.play_phrase(&text) {
            CommandResult::Message(msg) => println!("{}", msg),
            CommandResult::Error(e) => println!("{} {}", "Error:".red(), e),
            _ => {}
        }
    }
}

/// Convenience function to start the REPL
pub fn start() -> Result<()> {
    let mut repl = Repl::new()?;
    repl.run()
}
