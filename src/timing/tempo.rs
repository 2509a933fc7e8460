// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Tempo settings that stay valid no matter what the user types.
//!
//! Raw values are stored as entered and clamped on every read, so a tempo
//! can be edited live while the metronome runs.

/// Slowest accepted tempo
pub const MIN_BPM: f64 = 30.0;
/// Fastest accepted tempo
pub const MAX_BPM: f64 = 220.0;
/// Tempo used when the input cannot be read
pub const DEFAULT_BPM: f64 = 96.0;

pub const MIN_BEATS_PER_BAR: u32 = 1;
pub const MAX_BEATS_PER_BAR: u32 = 12;
pub const DEFAULT_BEATS_PER_BAR: u32 = 4;

/// Read the leading integer of a text field.
///
/// Unreadable input and zero both yield `None`.
fn leading_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    let value: i64 = digits[..end].parse().ok()?;
    match sign * value {
        0 => None,
        v => Some(v),
    }
}

/// Live tempo and meter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoSettings {
    bpm: f64,
    beats_per_bar: i64,
}

impl TempoSettings {
    /// Create settings from raw values
    pub fn new(bpm: f64, beats_per_bar: i64) -> Self {
        Self { bpm, beats_per_bar }
    }

    /// Tempo in BPM, clamped to [30, 220]
    pub fn bpm(&self) -> f64 {
        if !self.bpm.is_finite() || self.bpm == 0.0 {
            return DEFAULT_BPM;
        }
        self.bpm.clamp(MIN_BPM, MAX_BPM)
    }

    /// Beats per bar, clamped to [1, 12]
    pub fn beats_per_bar(&self) -> u32 {
        if self.beats_per_bar == 0 {
            return DEFAULT_BEATS_PER_BAR;
        }
        self.beats_per_bar
            .clamp(MIN_BEATS_PER_BAR as i64, MAX_BEATS_PER_BAR as i64) as u32
    }

    /// Seconds per beat at the current tempo
    pub fn beat_length(&self) -> f64 {
        60.0 / self.bpm()
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = bpm;
    }

    pub fn set_beats_per_bar(&mut self, beats: i64) {
        self.beats_per_bar = beats;
    }

    /// Set the tempo from text input, falling back to the default tempo
    pub fn set_bpm_text(&mut self, text: &str) {
        self.bpm = leading_integer(text).map(|v| v as f64).unwrap_or(DEFAULT_BPM);
    }

    /// Set beats per bar from text input, falling back to four
    pub fn set_beats_per_bar_text(&mut self, text: &str) {
        self.beats_per_bar = leading_integer(text).unwrap_or(DEFAULT_BEATS_PER_BAR as i64);
    }
}

impl Default for TempoSettings {
    fn default() -> Self {
        Self::new(DEFAULT_BPM, DEFAULT_BEATS_PER_BAR as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let tempo = TempoSettings::default();
        assert_eq!(tempo.bpm(), 96.0);
        assert_eq!(tempo.beats_per_bar(), 4);
        assert!((tempo.beat_length() - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_clamped_on_read() {
        let mut tempo = TempoSettings::new(500.0, 40);
        assert_eq!(tempo.bpm(), 220.0);
        assert_eq!(tempo.beats_per_bar(), 12);

        tempo.set_bpm(10.0);
        tempo.set_beats_per_bar(-3);
        assert_eq!(tempo.bpm(), 30.0);
        assert_eq!(tempo.beats_per_bar(), 1);

        tempo.set_bpm(f64::NAN);
        assert_eq!(tempo.bpm(), 96.0);
    }

    #[test]
    fn test_text_input() {
        let mut tempo = TempoSettings::default();

        tempo.set_bpm_text("140 bpm");
        assert_eq!(tempo.bpm(), 140.0);

        tempo.set_bpm_text("fast");
        assert_eq!(tempo.bpm(), 96.0);

        tempo.set_bpm_text("0");
        assert_eq!(tempo.bpm(), 96.0);

        tempo.set_bpm_text("999");
        assert_eq!(tempo.bpm(), 220.0);

        tempo.set_beats_per_bar_text("3/4");
        assert_eq!(tempo.beats_per_bar(), 3);

        tempo.set_beats_per_bar_text("");
        assert_eq!(tempo.beats_per_bar(), 4);
    }

    #[test]
    fn test_leading_integer() {
        assert_eq!(leading_integer("  42abc"), Some(42));
        assert_eq!(leading_integer("-7"), Some(-7));
        assert_eq!(leading_integer("+5"), Some(5));
        assert_eq!(leading_integer("abc"), None);
        assert_eq!(leading_integer("0"), None);
    }
}
