// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing and scheduling core of a piano practice trainer.
//!
//! A lookahead metronome keeps sample-accurate time on an audio clock, a
//! recorder captures played notes in bar-aligned takes after a one-bar
//! count-in, and a playback engine replays takes, templates and a practice
//! queue at the metronome tempo. Sound output and the audio clock are
//! reached through the [`audio::ToneRenderer`] and [`timing::ClockSource`]
//! traits.

pub mod audio;
pub mod config;
pub mod metronome;
pub mod music;
pub mod playback;
pub mod recording;
pub mod sequencer;
pub mod timing;
pub mod trainer;

pub use config::TrainerConfig;
pub use trainer::{HighlightSink, Trainer};
