// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Pitch names and the trainer keyboard layout.

pub mod pitch;

pub use pitch::{keyboard_layout, KeySlot, Note, Pitch, PitchError};
