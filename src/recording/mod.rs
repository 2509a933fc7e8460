// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Recording and quantization.
//!
//! This module provides:
//! - The count-in / bar-aligned capture state machine
//! - Grid quantization of captured takes

pub mod capture;
pub mod quantize;

pub use capture::{
    BeatOutcome, Finalized, Recorder, Recording, RecordingPhase, StopOutcome, TakeOutcome,
    BEAT_EPSILON,
};
pub use quantize::{quantize, quantize_recording, QuantizeMode};
