// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration for the trainer.
//!
//! A single YAML file sets the tempo, metronome sound, recording and
//! playback defaults, and may add templates to the built-in demo. Every
//! field is optional. Out-of-range values are reported by
//! [`TrainerConfig::validate`] and clamped wherever they are read.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::audio::ClickSound;
use crate::metronome::{ClickLevels, DEFAULT_VOLUME};
use crate::playback::{PlaybackOptions, Template};
use crate::recording::QuantizeMode;
use crate::sequencer::DEFAULT_NOTE_DURATION;
use crate::timing::{
    TempoSettings, DEFAULT_BEATS_PER_BAR, DEFAULT_BPM, MAX_BEATS_PER_BAR, MAX_BPM,
    MIN_BEATS_PER_BAR, MIN_BPM,
};

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainerConfig {
    /// Tempo in BPM
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    /// Beats per bar
    #[serde(default = "default_beats_per_bar")]
    pub beats_per_bar: i64,
    #[serde(default)]
    pub metronome: MetronomeConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    /// Templates available next to the built-in demo
    #[serde(default)]
    pub templates: Vec<Template>,
}

fn default_bpm() -> f64 {
    DEFAULT_BPM
}
fn default_beats_per_bar() -> i64 {
    DEFAULT_BEATS_PER_BAR as i64
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            bpm: default_bpm(),
            beats_per_bar: default_beats_per_bar(),
            metronome: MetronomeConfig::default(),
            recording: RecordingConfig::default(),
            playback: PlaybackConfig::default(),
            templates: Vec::new(),
        }
    }
}

impl TrainerConfig {
    /// Load a configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    /// Parse a configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration to YAML")
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))
    }

    /// Tempo settings, clamped on read
    pub fn tempo(&self) -> TempoSettings {
        TempoSettings::new(self.bpm, self.beats_per_bar)
    }

    /// Playback options from the playback section
    pub fn playback_options(&self) -> PlaybackOptions {
        PlaybackOptions {
            sync_with_metronome: self.playback.sync_with_metronome,
            count_in_beats: self.playback.count_in_beats,
            base_beat_length: None,
        }
    }

    /// Human-readable descriptions of out-of-range values
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !(MIN_BPM..=MAX_BPM).contains(&self.bpm) {
            issues.push(format!("bpm {} outside {}..={}", self.bpm, MIN_BPM, MAX_BPM));
        }
        if !(MIN_BEATS_PER_BAR as i64..=MAX_BEATS_PER_BAR as i64).contains(&self.beats_per_bar) {
            issues.push(format!(
                "beats_per_bar {} outside {}..={}",
                self.beats_per_bar, MIN_BEATS_PER_BAR, MAX_BEATS_PER_BAR
            ));
        }
        let levels = [
            ("metronome.volume", self.metronome.volume),
            ("metronome.accent_level", self.metronome.accent_level),
            ("metronome.normal_level", self.metronome.normal_level),
        ];
        for (name, value) in levels {
            if !(0.0..=1.0).contains(&value) {
                issues.push(format!("{} {} outside 0..=1", name, value));
            }
        }
        if !(self.recording.note_duration > 0.0) {
            issues.push(format!(
                "recording.note_duration {} must be positive",
                self.recording.note_duration
            ));
        }
        if self.playback.repeats == 0 {
            issues.push("playback.repeats must be at least 1".to_string());
        }
        if !(self.playback.pause_bars >= 0.0) {
            issues.push(format!(
                "playback.pause_bars {} must not be negative",
                self.playback.pause_bars
            ));
        }
        for template in &self.templates {
            if template.events.is_empty() {
                issues.push(format!("template {:?} has no notes", template.name));
            }
        }
        issues
    }

    /// Fail if any value is out of range
    pub fn validate(&self) -> Result<()> {
        let issues = self.issues();
        if !issues.is_empty() {
            bail!("Invalid configuration: {}", issues.join("; "));
        }
        Ok(())
    }
}

/// Metronome sound settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetronomeConfig {
    /// Metronome bus volume (0.0 - 1.0)
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Level of the first beat of a bar
    #[serde(default = "default_accent_level")]
    pub accent_level: f32,
    /// Level of the other beats
    #[serde(default = "default_normal_level")]
    pub normal_level: f32,
    #[serde(default)]
    pub sound: ClickSound,
}

fn default_volume() -> f32 {
    DEFAULT_VOLUME
}
fn default_accent_level() -> f32 {
    ClickLevels::default().accent
}
fn default_normal_level() -> f32 {
    ClickLevels::default().normal
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            accent_level: default_accent_level(),
            normal_level: default_normal_level(),
            sound: ClickSound::default(),
        }
    }
}

impl MetronomeConfig {
    pub fn levels(&self) -> ClickLevels {
        ClickLevels {
            accent: self.accent_level,
            normal: self.normal_level,
        }
    }
}

/// Capture settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordingConfig {
    /// Length given to each captured note, in seconds
    #[serde(default = "default_note_duration")]
    pub note_duration: f64,
    /// Grid applied on replay and when saving; raw timing when absent
    #[serde(default)]
    pub quantize: Option<QuantizeMode>,
}

fn default_note_duration() -> f64 {
    DEFAULT_NOTE_DURATION
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            note_duration: default_note_duration(),
            quantize: None,
        }
    }
}

/// Playback and practice queue settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackConfig {
    /// Play at the metronome tempo
    #[serde(default)]
    pub sync_with_metronome: bool,
    /// Beats counted in before playback
    #[serde(default)]
    pub count_in_beats: u32,
    /// Times the practice queue is played
    #[serde(default = "default_repeats")]
    pub repeats: u32,
    /// Bars of silence between queue repeats
    #[serde(default)]
    pub pause_bars: f64,
}

fn default_repeats() -> u32 {
    1
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sync_with_metronome: false,
            count_in_beats: 0,
            repeats: default_repeats(),
            pause_bars: 0.0,
        }
    }
}

/// Load a configuration file and reject out-of-range values
pub fn validate_config<P: AsRef<Path>>(path: P) -> Result<TrainerConfig> {
    let config = TrainerConfig::load(path.as_ref())?;
    config
        .validate()
        .with_context(|| format!("Config file {:?} failed validation", path.as_ref()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::NoteEvent;
    use tempfile::tempdir;

    #[test]
    fn test_parse_trainer_config() {
        let yaml = r#"
bpm: 120
beats_per_bar: 3
metronome:
  volume: 0.5
  sound: kick
recording:
  quantize: eighth
playback:
  sync_with_metronome: true
  count_in_beats: 4
  repeats: 3
  pause_bars: 1
templates:
  - name: "Fifths"
    events:
      - { note: C3, time: 0.0, duration: 0.5 }
      - { note: G3, time: 0.5, duration: 0.5 }
"#;

        let config = TrainerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.bpm, 120.0);
        assert_eq!(config.tempo().beats_per_bar(), 3);
        assert_eq!(config.metronome.volume, 0.5);
        assert_eq!(config.metronome.sound, ClickSound::Kick);
        assert_eq!(config.recording.quantize, Some(QuantizeMode::Eighth));
        assert_eq!(config.playback.repeats, 3);
        assert_eq!(config.templates.len(), 1);
        assert_eq!(config.templates[0].events[1].note.to_string(), "G3");
        assert_eq!(config.templates[0].length, None);

        let options = config.playback_options();
        assert!(options.sync_with_metronome);
        assert_eq!(options.count_in_beats, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        let config = TrainerConfig::from_yaml("{}").unwrap();
        assert_eq!(config, TrainerConfig::default());
        assert_eq!(config.bpm, 96.0);
        assert_eq!(config.beats_per_bar, 4);
        assert_eq!(config.metronome.levels(), ClickLevels::default());
        assert_eq!(config.recording.note_duration, 0.6);
        assert_eq!(config.recording.quantize, None);
        assert_eq!(config.playback.repeats, 1);
    }

    #[test]
    fn test_out_of_range_values_are_reported_and_clamped() {
        let yaml = r#"
bpm: 400
beats_per_bar: 0
metronome:
  volume: 1.5
playback:
  repeats: 0
"#;
        let config = TrainerConfig::from_yaml(yaml).unwrap();
        let issues = config.issues();
        assert_eq!(issues.len(), 4, "{:?}", issues);
        assert!(config.validate().is_err());

        let tempo = config.tempo();
        assert_eq!(tempo.bpm(), 220.0);
        assert_eq!(tempo.beats_per_bar(), 4);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(TrainerConfig::from_yaml("bpm: [").is_err());
        assert!(TrainerConfig::from_yaml("recording: { quantize: dotted }").is_err());
    }

    #[test]
    fn test_round_trip() {
        let mut original = TrainerConfig::default();
        original.bpm = 140.0;
        original.recording.quantize = Some(QuantizeMode::EighthTriplet);
        original.templates.push(
            Template::new("Pair", vec![NoteEvent::new("A4".parse().unwrap(), 0.0, 0.5)])
                .with_length(Some(2.0)),
        );

        let yaml = original.to_yaml().unwrap();
        let parsed = TrainerConfig::from_yaml(&yaml).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_save_and_validate_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("trainer.yaml");

        let config = TrainerConfig::default();
        config.save(&file_path).unwrap();
        let loaded = validate_config(&file_path).unwrap();
        assert_eq!(loaded, config);

        std::fs::write(&file_path, "bpm: 10\n").unwrap();
        assert!(validate_config(&file_path).is_err());
        assert!(TrainerConfig::load(dir.path().join("missing.yaml")).is_err());
    }
}
