//! General REPL commands (help, quit, watch)

use crate::commands::{CommandContext, CommandResult};
use colored::*;

/// Handle `help` command
pub fn cmd_help(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    print_help();
    CommandResult::Success
}

/// Handle `quit` or `exit` command
pub fn cmd_quit(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    CommandResult::Exit
}

/// Handle `watch <file>` command
pub fn cmd_watch(args: &str, _ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: watch <file>".to_string());
    }
    CommandResult::Watch(args.to_string())
}

/// Handle `unwatch` command
pub fn cmd_unwatch(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    CommandResult::Unwatch
}

/// Print help information
fn print_help() {
    println!("{}", "🎵 Chime Help".bold());
    println!("{}", "=============".bold());
    println!();
    println!("{}", "Phrases:".green());
    println!("  {}            - Notes back to back", "C4 E4 G4".cyan());
    println!("  {}       - Duration in seconds or ms", "C4:0.5 E4:250ms".cyan());
    println!("  {}         - Amplitude 0-1", "C4@0.3".cyan());
    println!("  {}   - Waveform (sine, saw, square, triangle)", "C4~square".cyan());
    println!("  {}         - Frequency in Hz", "440:0.2".cyan());
    println!("  {}          - Rest", "C4 _ G4".cyan());
    println!("  {}   - Chord", "C4+E4+G4:0.8".cyan());
    println!("  {}      - Second part, 0.5s after the first", "C4 E4 | G4 E4".cyan());
    println!();
    println!("{}", "Commands:".green());
    println!("  {}   - Play a phrase (or just type it)", "play <phrase>".cyan());
    println!(
        "  {}    - Feedback tone: success, error, levelup, click, crane, grab",
        "tone <name>".cyan()
    );
    println!("  {}            - Stop current playback", "stop".cyan());
    println!("  {}  - Show or set volume", "volume [0-100]".cyan());
    println!("  {}          - Output and session state", "status".cyan());
    println!("  {}    - Replay a phrase file on every save", "watch <file>".cyan());
    println!("  {}         - Stop watching", "unwatch".cyan());
    println!("  {}            - Show this help", "help".bright_green());
    println!("  {}            - Exit the REPL", "quit".bright_red());
}
