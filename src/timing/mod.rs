// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing and clock module.
//!
//! This module provides the audio clock abstraction and the tempo
//! settings shared by the metronome, recorder and playback engine.

pub mod clock;
pub mod tempo;

pub use clock::{ClockSource, ClockState, ManualClock, SystemClock};
pub use tempo::{
    TempoSettings, DEFAULT_BEATS_PER_BAR, DEFAULT_BPM, MAX_BEATS_PER_BAR, MAX_BPM,
    MIN_BEATS_PER_BAR, MIN_BPM,
};
