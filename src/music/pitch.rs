// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Pitch names as played on the trainer keyboard.
//!
//! A pitch is written as a letter, an optional sharp and a single octave
//! digit (`C3`, `F#4`). The keyboard spans C3 to C5.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MIDI note number of A4
const A4_MIDI: i32 = 69;

/// Concert pitch of A4 in Hz
const A4_FREQUENCY: f64 = 440.0;

/// Pitch class (letter plus optional sharp)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Note {
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

impl Note {
    /// Semitones above C
    pub fn pitch_class(self) -> u8 {
        match self {
            Note::C => 0,
            Note::Cs => 1,
            Note::D => 2,
            Note::Ds => 3,
            Note::E => 4,
            Note::F => 5,
            Note::Fs => 6,
            Note::G => 7,
            Note::Gs => 8,
            Note::A => 9,
            Note::As => 10,
            Note::B => 11,
        }
    }

    fn from_letter(letter: char, sharp: bool) -> Option<Self> {
        let note = match (letter, sharp) {
            ('C', false) => Note::C,
            ('C', true) => Note::Cs,
            ('D', false) => Note::D,
            ('D', true) => Note::Ds,
            ('E', false) => Note::E,
            ('F', false) => Note::F,
            ('F', true) => Note::Fs,
            ('G', false) => Note::G,
            ('G', true) => Note::Gs,
            ('A', false) => Note::A,
            ('A', true) => Note::As,
            ('B', false) => Note::B,
            _ => return None,
        };
        Some(note)
    }

    /// The black key directly above a white key, if there is one
    pub fn sharpened(self) -> Option<Self> {
        match self {
            Note::C => Some(Note::Cs),
            Note::D => Some(Note::Ds),
            Note::F => Some(Note::Fs),
            Note::G => Some(Note::Gs),
            Note::A => Some(Note::As),
            _ => None,
        }
    }

    /// Whether this pitch class sits on a black key
    pub fn is_sharp(self) -> bool {
        matches!(self, Note::Cs | Note::Ds | Note::Fs | Note::Gs | Note::As)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Note::C => "C",
            Note::Cs => "C#",
            Note::D => "D",
            Note::Ds => "D#",
            Note::E => "E",
            Note::F => "F",
            Note::Fs => "F#",
            Note::G => "G",
            Note::Gs => "G#",
            Note::A => "A",
            Note::As => "A#",
            Note::B => "B",
        };
        f.write_str(name)
    }
}

/// Errors from parsing a pitch name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PitchError {
    #[error("empty pitch name")]
    Empty,
    #[error("invalid pitch name '{0}'")]
    Invalid(String),
}

/// A concrete pitch: pitch class plus octave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pitch {
    note: Note,
    octave: u8,
}

impl Pitch {
    /// Create a pitch from its parts
    pub fn new(note: Note, octave: u8) -> Self {
        Self {
            note,
            octave: octave.min(9),
        }
    }

    pub fn note(&self) -> Note {
        self.note
    }

    pub fn octave(&self) -> u8 {
        self.octave
    }

    /// MIDI note number (C4 = 60)
    pub fn midi(&self) -> u8 {
        (self.octave + 1) * 12 + self.note.pitch_class()
    }

    /// Equal-tempered frequency in Hz
    pub fn frequency(&self) -> f64 {
        let offset = self.midi() as i32 - A4_MIDI;
        A4_FREQUENCY * 2f64.powf(offset as f64 / 12.0)
    }
}

impl FromStr for Pitch {
    type Err = PitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PitchError::Empty);
        }

        let invalid = || PitchError::Invalid(trimmed.to_string());
        let mut chars = trimmed.chars();
        let letter = chars.next().ok_or_else(invalid)?.to_ascii_uppercase();
        let rest: String = chars.collect();
        let (sharp, octave) = match rest.strip_prefix('#') {
            Some(octave) => (true, octave),
            None => (false, rest.as_str()),
        };

        if octave.len() != 1 {
            return Err(invalid());
        }
        let octave = octave
            .chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(invalid)?;
        let note = Note::from_letter(letter, sharp).ok_or_else(invalid)?;

        Ok(Pitch::new(note, octave as u8))
    }
}

impl TryFrom<String> for Pitch {
    type Error = PitchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pitch> for String {
    fn from(pitch: Pitch) -> Self {
        pitch.to_string()
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.note, self.octave)
    }
}

/// One white key of the on-screen keyboard, with its black neighbour if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySlot {
    pub white: Pitch,
    pub black: Option<Pitch>,
}

/// The trainer keyboard from C3 up to C5
pub fn keyboard_layout() -> Vec<KeySlot> {
    const WHITES: [Note; 7] = [Note::C, Note::D, Note::E, Note::F, Note::G, Note::A, Note::B];

    let mut slots = Vec::with_capacity(15);
    for octave in 3..=4 {
        for note in WHITES {
            let black = note.sharpened().map(|sharp| Pitch::new(sharp, octave));
            slots.push(KeySlot {
                white: Pitch::new(note, octave),
                black,
            });
        }
    }
    slots.push(KeySlot {
        white: Pitch::new(Note::C, 5),
        black: None,
    });
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let pitch: Pitch = "C#3".parse().unwrap();
        assert_eq!(pitch.note(), Note::Cs);
        assert_eq!(pitch.octave(), 3);
        assert_eq!(pitch.to_string(), "C#3");

        let pitch: Pitch = " a4 ".parse().unwrap();
        assert_eq!(pitch.to_string(), "A4");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!("".parse::<Pitch>(), Err(PitchError::Empty));
        assert!("H3".parse::<Pitch>().is_err());
        assert!("E#3".parse::<Pitch>().is_err());
        assert!("C".parse::<Pitch>().is_err());
        assert!("C10".parse::<Pitch>().is_err());
    }

    #[test]
    fn test_midi_and_frequency() {
        let a4: Pitch = "A4".parse().unwrap();
        assert_eq!(a4.midi(), 69);
        assert!((a4.frequency() - 440.0).abs() < 1e-9);

        let c4: Pitch = "C4".parse().unwrap();
        assert_eq!(c4.midi(), 60);
        assert!((c4.frequency() - 261.6256).abs() < 1e-3);
    }

    #[test]
    fn test_keyboard_layout() {
        let layout = keyboard_layout();
        assert_eq!(layout.len(), 15);
        assert_eq!(layout[0].white.to_string(), "C3");
        assert_eq!(layout[0].black.map(|p| p.to_string()), Some("C#3".to_string()));
        assert_eq!(layout[2].black, None);
        assert_eq!(layout[14].white.to_string(), "C5");
        assert_eq!(layout[14].black, None);

        let blacks = layout.iter().filter(|slot| slot.black.is_some()).count();
        assert_eq!(blacks, 10);
    }

    #[test]
    fn test_serde_as_string() {
        let pitch: Pitch = serde_yaml::from_str("\"G#3\"").unwrap();
        assert_eq!(pitch.to_string(), "G#3");
        let yaml = serde_yaml::to_string(&pitch).unwrap();
        assert!(yaml.contains("G#3"));
    }
}
