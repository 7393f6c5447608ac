//! Playback commands (play, tone, stop, volume, status)

use crate::commands::{CommandContext, CommandResult};
use chime_core::Preset;
use colored::*;

/// Handle `play <phrase>`
pub fn cmd_play(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: play <phrase>, e.g. play C4 E4 G4:0.6".to_string());
    }
    ctx.play_phrase(args)
}

/// Handle `tone <name>`
pub fn cmd_tone(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let Some(preset) = Preset::from_name(args) else {
        let names: Vec<&str> = Preset::ALL.iter().map(Preset::name).collect();
        return CommandResult::Error(format!(
            "Unknown tone '{}'. Available: {}",
            args,
            names.join(", ")
        ));
    };

    match ctx
        .player
        .play_preset(preset, ctx.completion_notice(preset.name()))
    {
        Ok(_) => match ctx.player.take_status() {
            Some(e) => CommandResult::Error(format!("{} (playing silently)", e)),
            None => CommandResult::Success,
        },
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

/// Handle `stop`
pub fn cmd_stop(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    if !ctx.player.is_playing() {
        return CommandResult::Message("Nothing is playing.".to_string());
    }
    ctx.player.stop();
    CommandResult::Message("🔇 Playback stopped.".bright_green().to_string())
}

/// Handle `volume [0-100]`
pub fn cmd_volume(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Message(format!("Volume: {:.0}%", ctx.player.volume() * 100.0));
    }

    match args.trim_end_matches('%').parse::<u8>() {
        Ok(percent) if percent <= 100 => {
            let volume = ctx.player.set_volume_percent(percent);
            CommandResult::Message(
                format!("🔊 Volume set to {:.0}%", volume * 100.0)
                    .bright_green()
                    .to_string(),
            )
        }
        _ => CommandResult::Error("Invalid volume. Use a value between 0-100".to_string()),
    }
}

/// Handle `status`
pub fn cmd_status(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    let output = if ctx.player.is_available() {
        ctx.device.green().to_string()
    } else {
        match ctx.player.initialization_error() {
            Some(e) => format!("{} ({})", "unavailable".red(), e),
            None => "unavailable".red().to_string(),
        }
    };
    let session = ctx
        .player
        .session_state()
        .map_or("none", |state| state.name());

    CommandResult::Message(format!(
        "Output:  {}\nSession: {}\nVolume:  {:.0}%",
        output,
        session,
        ctx.player.volume() * 100.0
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{headless_context, run_until_notice};
    use chime_core::SessionState;

    #[test]
    fn test_play_requires_a_phrase() {
        let (mut ctx, _engine, _rx) = headless_context();
        assert!(matches!(cmd_play("", &mut ctx), CommandResult::Error(_)));
    }

    #[test]
    fn test_tone_plays_preset() {
        let (mut ctx, mut engine, notices) = headless_context();
        assert_eq!(cmd_tone("levelup", &mut ctx), CommandResult::Success);
        let notice = run_until_notice(&ctx, &mut engine, &notices).unwrap();
        assert!(notice.contains("finished levelup"));
    }

    #[test]
    fn test_unknown_tone_lists_presets() {
        let (mut ctx, _engine, _rx) = headless_context();
        match cmd_tone("fanfare", &mut ctx) {
            CommandResult::Error(msg) => assert!(msg.contains("success, error, levelup, click")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_stop_cancels_without_completion() {
        let (mut ctx, mut engine, notices) = headless_context();
        ctx.play_phrase("C4:1.0");
        assert!(matches!(cmd_stop("", &mut ctx), CommandResult::Message(_)));
        assert_eq!(ctx.player.session_state(), Some(SessionState::Canceled));
        assert!(run_until_notice(&ctx, &mut engine, &notices).is_none());
        assert_eq!(
            cmd_stop("", &mut ctx),
            CommandResult::Message("Nothing is playing.".to_string())
        );
    }

    #[test]
    fn test_volume_percent() {
        let (mut ctx, _engine, _rx) = headless_context();
        assert_eq!(
            cmd_volume("", &mut ctx),
            CommandResult::Message("Volume: 30%".to_string())
        );
        assert!(matches!(cmd_volume("80", &mut ctx), CommandResult::Message(_)));
        assert!((ctx.player.volume() - 0.8).abs() < 1e-6);
        assert!(matches!(cmd_volume("150", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_volume("loud", &mut ctx), CommandResult::Error(_)));
    }

    #[test]
    fn test_status_reports_session() {
        let (mut ctx, _engine, _rx) = headless_context();
        ctx.play_phrase("A4");
        match cmd_status("", &mut ctx) {
            CommandResult::Message(msg) => {
                assert!(msg.contains("Session: scheduled"));
                assert!(msg.contains("Volume:  30%"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
