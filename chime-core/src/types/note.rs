//! Note names to frequencies
//!
//! Scientific pitch notation with A4 = 440 Hz equal temperament. The octave
//! defaults to 4 and may be negative (`C-1`).

/// Concert pitch of A4
pub const A4_FREQUENCY: f32 = 440.0;

/// Parse a note name such as `C4`, `F#3`, `Bb2` or `a` into Hz.
///
/// Returns `None` for anything that is not a note name.
pub fn note_frequency(name: &str) -> Option<f32> {
    midi_number(name).map(midi_to_frequency)
}

/// MIDI note number of a note name (C4 = 60), allowing values outside 0..=127.
pub fn midi_number(name: &str) -> Option<i32> {
    let name = name.trim();
    let mut chars = name.chars();

    let pitch_class = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let (accidental, octave_part) = match rest.as_bytes().first() {
        Some(b'#') | Some(b's') | Some(b'S') => (1, &rest[1..]),
        Some(b'b') => (-1, &rest[1..]),
        _ => (0, rest),
    };

    let octave: i32 = if octave_part.is_empty() {
        4
    } else {
        octave_part.parse().ok()?
    };
    if !(-1..=9).contains(&octave) {
        return None;
    }

    Some((octave + 1) * 12 + pitch_class + accidental)
}

#[inline]
pub fn midi_to_frequency(midi: i32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((midi - 69) as f32 / 12.0)
}
