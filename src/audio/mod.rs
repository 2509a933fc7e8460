// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Tone rendering seam.
//!
//! The trainer does not synthesize sound itself. It hands tones to a
//! [`ToneRenderer`] with an absolute start time on the audio clock and keeps
//! the returned [`Voice`] so the sound can be cut short later.
//!
//! This module provides:
//! - The renderer and voice traits
//! - Mix bus handles for sub-mixes such as the metronome
//! - An in-memory renderer for simulations and tests
//! - A renderer that only logs, for headless real-time runs

pub mod log;
pub mod memory;

pub use self::log::LogRenderer;
pub use memory::{MemoryRenderer, RenderedTone};

use thiserror::Error;

use crate::music::Pitch;

/// Which of the two click voicings the metronome uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickSound {
    /// Bright square-wave click
    #[default]
    Click,
    /// Low sine thump
    Kick,
}

/// Something the renderer can play
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tone {
    /// A piano note
    Note(Pitch),
    /// A metronome tick
    Click {
        accent: bool,
        sound: ClickSound,
        level: f32,
    },
}

/// Handle to a sub-mix created by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusId(pub u32);

/// Where a tone is routed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    /// The master output
    #[default]
    Master,
    /// A sub-mix bus
    Bus(BusId),
}

/// Per-render options
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderOptions {
    /// Sounding length in seconds; `None` lets the tone ring out naturally
    pub duration: Option<f64>,
    pub destination: Destination,
}

impl RenderOptions {
    /// Options for a tone of fixed length on the master output
    pub fn for_duration(duration: f64) -> Self {
        Self {
            duration: Some(duration),
            destination: Destination::Master,
        }
    }
}

/// A sounding (or scheduled) tone
pub trait Voice {
    /// Stop the tone at the given clock time.
    ///
    /// Must be safe to call repeatedly and after the tone has finished.
    fn stop(&mut self, at: f64);
}

/// External sound generator
pub trait ToneRenderer {
    type Voice: Voice;

    /// Schedule a tone to start at `start_time` on the audio clock
    fn render(
        &mut self,
        tone: &Tone,
        start_time: f64,
        options: RenderOptions,
    ) -> Result<Self::Voice, AudioError>;

    /// Create a sub-mix bus with the given gain
    fn create_bus(&mut self, gain: f32) -> Result<BusId, AudioError>;

    /// Change a bus gain from the given clock time on
    fn set_bus_gain(&mut self, bus: BusId, gain: f32, at: f64);
}

/// Audio error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AudioError {
    /// No audio clock could be created or resumed
    #[error("audio backend unavailable: {0}")]
    Unavailable(String),
    /// A single tone could not be rendered
    #[error("failed to render {tone}: {reason}")]
    Render { tone: String, reason: String },
    /// A mix bus could not be created
    #[error("failed to create mix bus: {0}")]
    Bus(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_options_default() {
        let options = RenderOptions::default();
        assert_eq!(options.duration, None);
        assert_eq!(options.destination, Destination::Master);

        let options = RenderOptions::for_duration(0.5);
        assert_eq!(options.duration, Some(0.5));
    }

    #[test]
    fn test_error_display() {
        let err = AudioError::Render {
            tone: "C3".into(),
            reason: "sample missing".into(),
        };
        assert_eq!(err.to_string(), "failed to render C3: sample missing");

        let err = AudioError::Unavailable("no device".into());
        assert!(err.to_string().contains("no device"));
    }
}
