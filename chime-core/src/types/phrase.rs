//! Text phrases
//!
//! ```text
//! C4 E4:0.2 G4@0.5 _:150ms 880~square | A3+C4+E4:0.6
//! ```
//!
//! Each token is `PITCH[:DUR][@AMP][~WAVE]`. `PITCH` is Hz, a note name or
//! `_` for a rest, and `+` joins pitches into a chord sharing one duration.
//! Notes inside a part play back to back. `|` begins a new part
//! [`PART_GAP_SECONDS`] after the previous one ends.
//!
//! Error positions are 1-based token numbers, counting `|` separators.

use super::audio_config::Waveform;
use super::note::note_frequency;
use super::scheduled_event::ScheduledEvent;
use super::sequence::{Sequence, DEFAULT_DYNAMIC};
use crate::error::SchedulerError;

pub const DEFAULT_NOTE_SECONDS: f64 = 0.3;
/// Silence between two parts
pub const PART_GAP_SECONDS: f64 = 0.5;

/// One parsed token before it is positioned in time.
#[derive(Debug, Clone, PartialEq)]
struct Step {
    pitches: Vec<Option<f32>>,
    duration: f64,
    amplitude: f32,
    waveform: Waveform,
}

/// Parse phrase text into a validated [`Sequence`].
pub fn parse_phrase(text: &str) -> Result<Sequence, SchedulerError> {
    let mut parts: Vec<Vec<Step>> = vec![Vec::new()];
    let mut token_no = 0;

    for raw in text.split_whitespace() {
        // `a|b` is the same as `a | b`
        let mut pieces = raw.split('|').peekable();
        while let Some(piece) = pieces.next() {
            if !piece.is_empty() {
                token_no += 1;
                let step = parse_step(piece, token_no)?;
                if let Some(current) = parts.last_mut() {
                    current.push(step);
                }
            }
            if pieces.peek().is_some() {
                token_no += 1;
                if parts.last().is_some_and(Vec::is_empty) {
                    return Err(SchedulerError::parse(token_no, "part separator with no notes before it"));
                }
                parts.push(Vec::new());
            }
        }
    }

    if parts.last().is_some_and(Vec::is_empty) {
        if parts.len() == 1 {
            return Err(SchedulerError::parse(0, "phrase is empty"));
        }
        return Err(SchedulerError::parse(token_no, "phrase ends with a part separator"));
    }

    let mut events = Vec::new();
    let mut part_start = 0.0;
    for (part_index, steps) in parts.iter().enumerate() {
        let mut offset = part_start;
        for step in steps {
            for pitch in &step.pitches {
                let event = match pitch {
                    Some(freq) => ScheduledEvent::note(offset, *freq, step.duration, step.amplitude)
                        .with_waveform(step.waveform),
                    None => ScheduledEvent::rest(offset, step.duration),
                };
                let index = events.len();
                events.push(event.with_part(part_index).with_index(index));
            }
            offset += step.duration;
        }
        part_start = offset + PART_GAP_SECONDS;
    }

    Sequence::new(events)
}

fn parse_step(token: &str, token_no: usize) -> Result<Step, SchedulerError> {
    let modifiers_at = token.find([':', '@', '~']).unwrap_or(token.len());
    let (pitch_text, mut modifiers) = token.split_at(modifiers_at);

    let pitches = pitch_text
        .split('+')
        .map(|p| parse_pitch(p, token_no))
        .collect::<Result<Vec<_>, _>>()?;
    if pitches.len() > 1 && pitches.iter().any(Option::is_none) {
        return Err(SchedulerError::parse(token_no, "a rest cannot be part of a chord"));
    }

    let mut step = Step {
        pitches,
        duration: DEFAULT_NOTE_SECONDS,
        amplitude: DEFAULT_DYNAMIC,
        waveform: Waveform::Sine,
    };

    while let Some(marker) = modifiers.chars().next() {
        let body = &modifiers[1..];
        let end = body.find([':', '@', '~']).unwrap_or(body.len());
        let value = &body[..end];
        modifiers = &body[end..];

        match marker {
            ':' => step.duration = parse_duration(value, token_no)?,
            '@' => {
                step.amplitude = value.parse().map_err(|_| {
                    SchedulerError::parse(token_no, format!("invalid amplitude '{}'", value))
                })?
            }
            _ => {
                step.waveform = Waveform::from_name(value).ok_or_else(|| {
                    SchedulerError::parse(token_no, format!("unknown waveform '{}'", value))
                })?
            }
        }
    }

    Ok(step)
}

fn parse_pitch(text: &str, token_no: usize) -> Result<Option<f32>, SchedulerError> {
    if text == "_" {
        return Ok(None);
    }
    if text.is_empty() {
        return Err(SchedulerError::parse(token_no, "missing pitch"));
    }
    if text.starts_with(|c: char| c.is_ascii_digit()) {
        return text
            .parse::<f32>()
            .map(Some)
            .map_err(|_| SchedulerError::parse(token_no, format!("invalid frequency '{}'", text)));
    }
    note_frequency(text)
        .map(Some)
        .ok_or_else(|| SchedulerError::parse(token_no, format!("unknown note '{}'", text)))
}

fn parse_duration(text: &str, token_no: usize) -> Result<f64, SchedulerError> {
    let (number, scale) = match text.strip_suffix("ms") {
        Some(ms) => (ms, 0.001),
        None => (text.strip_suffix('s').unwrap_or(text), 1.0),
    };
    number
        .parse::<f64>()
        .map(|v| v * scale)
        .map_err(|_| SchedulerError::parse(token_no, format!("invalid duration '{}'", text)))
}
