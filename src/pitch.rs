//! Note names and absolute pitch ordering.
//!
//! A note's pitch value is `octave * 12 + pitch_class`, with C = 0 through
//! B = 11. Scientific pitch notation puts the octave boundary at C, so A0 is
//! 9 and C8 is 96. The values are only used to order simultaneous notes.

use crate::error::FormatError;
use crate::types::KEY_COUNT;
use std::fmt;
use std::str::FromStr;

/// Width every note label is padded to in sheet output.
pub const LABEL_WIDTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    /// Pitch class of the natural note.
    fn natural_index(self) -> i32 {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }

    fn as_char(self) -> char {
        match self {
            Letter::C => 'C',
            Letter::D => 'D',
            Letter::E => 'E',
            Letter::F => 'F',
            Letter::G => 'G',
            Letter::A => 'A',
            Letter::B => 'B',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'C' => Letter::C,
            'D' => Letter::D,
            'E' => Letter::E,
            'F' => Letter::F,
            'G' => Letter::G,
            'A' => Letter::A,
            'B' => Letter::B,
            _ => return None,
        })
    }

    /// E and B have no sharp on a keyboard.
    fn has_sharp(self) -> bool {
        !matches!(self, Letter::E | Letter::B)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteName {
    pub letter: Letter,
    pub sharp: bool,
    pub octave: i32,
}

impl NoteName {
    pub const fn new(letter: Letter, sharp: bool, octave: i32) -> Self {
        Self {
            letter,
            sharp,
            octave,
        }
    }

    pub fn pitch_class_index(&self) -> i32 {
        self.letter.natural_index() + i32::from(self.sharp)
    }

    pub fn pitch_value(&self) -> i32 {
        self.octave * 12 + self.pitch_class_index()
    }

    /// Sharps are the black keys.
    pub fn is_black_key(&self) -> bool {
        self.sharp
    }

    /// Label padded to exactly three characters (`"C4 "`, `"C#4"`).
    pub fn format_fixed_width(&self) -> Result<String, FormatError> {
        format_fixed_width(&self.to_string())
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sharp {
            write!(f, "{}#{}", self.letter.as_char(), self.octave)
        } else {
            write!(f, "{}{}", self.letter.as_char(), self.octave)
        }
    }
}

impl FromStr for NoteName {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || FormatError::Parse(s.to_string());
        let mut chars = s.chars();
        let letter = chars.next().and_then(Letter::from_char).ok_or_else(bad)?;
        let rest = chars.as_str();
        let (sharp, octave) = match rest.strip_prefix('#') {
            Some(octave) => (true, octave),
            None => (false, rest),
        };
        if sharp && !letter.has_sharp() {
            return Err(bad());
        }
        if octave.is_empty() || !octave.chars().all(|c| c.is_ascii_digit()) {
            return Err(bad());
        }
        let octave = octave.parse().map_err(|_| bad())?;
        Ok(NoteName::new(letter, sharp, octave))
    }
}

/// Pad a two-character label with a trailing space; three-character labels
/// pass through. Anything else means a label was built wrong upstream.
pub fn format_fixed_width(label: &str) -> Result<String, FormatError> {
    match label.chars().count() {
        2 => Ok(format!("{} ", label)),
        LABEL_WIDTH => Ok(label.to_string()),
        len => Err(FormatError::LabelLength {
            label: label.to_string(),
            len,
        }),
    }
}

/// Highest pitch first. Stable, so equal pitches keep their input order.
pub fn sort_descending(notes: &mut [NoteName]) {
    notes.sort_by(|a, b| b.pitch_value().cmp(&a.pitch_value()));
}

/// The 88 keys left to right: A0 up to C8, octave bumping at every C.
pub fn piano_keys() -> Vec<NoteName> {
    const CYCLE: [(Letter, bool); 12] = [
        (Letter::A, false),
        (Letter::A, true),
        (Letter::B, false),
        (Letter::C, false),
        (Letter::C, true),
        (Letter::D, false),
        (Letter::D, true),
        (Letter::E, false),
        (Letter::F, false),
        (Letter::F, true),
        (Letter::G, false),
        (Letter::G, true),
    ];

    let mut octave = 0;
    CYCLE
        .iter()
        .cycle()
        .take(KEY_COUNT)
        .enumerate()
        .map(|(i, &(letter, sharp))| {
            if i > 0 && letter == Letter::C && !sharp {
                octave += 1;
            }
            NoteName::new(letter, sharp, octave)
        })
        .collect()
}
