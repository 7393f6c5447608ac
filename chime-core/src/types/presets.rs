//! Built-in feedback sounds

use super::scheduled_event::ScheduledEvent;
use super::audio_config::Waveform;
use super::sequence::Sequence;

/// Named feedback sounds for UI and game events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Two ascending beeps
    Success,
    /// Two descending beeps
    Error,
    /// Overlapping A major arpeggio
    LevelUp,
    /// Single short tick
    Click,
    /// Low sawtooth buzz for a moving crane
    CraneMove,
    /// Short high square ping for a grab
    Grab,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Preset::Success,
        Preset::Error,
        Preset::LevelUp,
        Preset::Click,
        Preset::CraneMove,
        Preset::Grab,
    ];

    pub fn from_name(name: &str) -> Option<Preset> {
        match name.to_lowercase().as_str() {
            "success" | "ok" => Some(Preset::Success),
            "error" | "fail" => Some(Preset::Error),
            "levelup" | "level-up" | "level_up" => Some(Preset::LevelUp),
            "click" => Some(Preset::Click),
            "crane" | "cranemove" | "crane-move" => Some(Preset::CraneMove),
            "grab" => Some(Preset::Grab),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Success => "success",
            Preset::Error => "error",
            Preset::LevelUp => "levelup",
            Preset::Click => "click",
            Preset::CraneMove => "crane",
            Preset::Grab => "grab",
        }
    }

    pub fn sequence(&self) -> Sequence {
        match self {
            Preset::Success => success_tone(),
            Preset::Error => error_tone(),
            Preset::LevelUp => level_up(),
            Preset::Click => click(),
            Preset::CraneMove => crane_move(),
            Preset::Grab => grab(),
        }
    }
}

/// 660 Hz then 880 Hz, 70 ms apart.
pub fn success_tone() -> Sequence {
    Sequence::from_valid(vec![
        ScheduledEvent::note(0.0, 660.0, 0.14, 1.0),
        ScheduledEvent::note(0.21, 880.0, 0.14, 1.0).with_index(1),
    ])
}

/// 300 Hz then a longer 200 Hz, 60 ms apart.
pub fn error_tone() -> Sequence {
    Sequence::from_valid(vec![
        ScheduledEvent::note(0.0, 300.0, 0.16, 1.0),
        ScheduledEvent::note(0.22, 200.0, 0.18, 1.0).with_index(1),
    ])
}

/// A major arpeggio; each 100 ms note starts 50 ms after the previous one.
pub fn level_up() -> Sequence {
    let events = [440.0, 554.0, 659.0, 880.0]
        .iter()
        .enumerate()
        .map(|(i, &freq)| ScheduledEvent::note(i as f64 * 0.05, freq, 0.1, 1.0).with_index(i))
        .collect();
    Sequence::from_valid(events)
}

pub fn click() -> Sequence {
    Sequence::from_valid(vec![ScheduledEvent::note(0.0, 800.0, 0.05, 1.0)])
}

/// 100 Hz sawtooth, 0.2 s.
pub fn crane_move() -> Sequence {
    Sequence::from_valid(vec![
        ScheduledEvent::note(0.0, 100.0, 0.2, 1.0).with_waveform(Waveform::Saw)
    ])
}

/// 1200 Hz square, 0.1 s.
pub fn grab() -> Sequence {
    Sequence::from_valid(vec![
        ScheduledEvent::note(0.0, 1200.0, 0.1, 1.0).with_waveform(Waveform::Square)
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_pass_validation() {
        for preset in Preset::ALL {
            let seq = preset.sequence();
            let revalidated = Sequence::new(seq.events().to_vec()).unwrap();
            assert_eq!(revalidated, seq, "{} changed on validation", preset.name());
        }
    }

    #[test]
    fn test_level_up_overlaps() {
        let seq = level_up();
        let events = seq.events();
        assert!(events[1].offset_seconds < events[0].end_seconds());
        assert!((seq.total_duration() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_success_gap() {
        let seq = success_tone();
        let gap = seq.events()[1].offset_seconds - seq.events()[0].end_seconds();
        assert!((gap - 0.07).abs() < 1e-9);
    }

    #[test]
    fn test_names_round_trip() {
        for preset in Preset::ALL {
            assert_eq!(Preset::from_name(preset.name()), Some(preset));
        }
        assert_eq!(Preset::from_name("Level-Up"), Some(Preset::LevelUp));
        assert_eq!(Preset::from_name("fanfare"), None);
    }

    #[test]
    fn test_crane_tones_carry_waveforms() {
        let crane = Preset::from_name("crane").unwrap().sequence();
        assert_eq!(crane.events()[0].waveform, Waveform::Saw);
        assert_eq!(crane.events()[0].frequency_hz, Some(100.0));
        assert!((crane.total_duration() - 0.2).abs() < 1e-12);

        let grab = Preset::Grab.sequence();
        assert_eq!(grab.events()[0].waveform, Waveform::Square);
        assert_eq!(grab.events()[0].frequency_hz, Some(1200.0));
        assert!((grab.total_duration() - 0.1).abs() < 1e-12);
    }
}
