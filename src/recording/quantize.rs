// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Grid quantization of captured notes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::capture::Recording;
use crate::sequencer::NoteEvent;

/// Note value the grid snaps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantizeMode {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    EighthTriplet,
}

impl QuantizeMode {
    pub const ALL: [QuantizeMode; 6] = [
        QuantizeMode::Whole,
        QuantizeMode::Half,
        QuantizeMode::Quarter,
        QuantizeMode::Eighth,
        QuantizeMode::Sixteenth,
        QuantizeMode::EighthTriplet,
    ];

    /// Grid size in beats
    pub fn beat_multiplier(self) -> f64 {
        match self {
            QuantizeMode::Whole => 4.0,
            QuantizeMode::Half => 2.0,
            QuantizeMode::Quarter => 1.0,
            QuantizeMode::Eighth => 0.5,
            QuantizeMode::Sixteenth => 0.25,
            QuantizeMode::EighthTriplet => 1.0 / 3.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            QuantizeMode::Whole => "whole",
            QuantizeMode::Half => "half",
            QuantizeMode::Quarter => "quarter",
            QuantizeMode::Eighth => "eighth",
            QuantizeMode::Sixteenth => "sixteenth",
            QuantizeMode::EighthTriplet => "eighth_triplet",
        }
    }

    /// Grid in seconds for a given beat length
    pub fn grid(self, beat_length: f64) -> f64 {
        beat_length * self.beat_multiplier()
    }
}

impl fmt::Display for QuantizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QuantizeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "whole" | "1/1" => Ok(QuantizeMode::Whole),
            "half" | "1/2" => Ok(QuantizeMode::Half),
            "quarter" | "1/4" => Ok(QuantizeMode::Quarter),
            "eighth" | "1/8" => Ok(QuantizeMode::Eighth),
            "sixteenth" | "1/16" => Ok(QuantizeMode::Sixteenth),
            "eighth_triplet" | "triplet" | "1/8t" => Ok(QuantizeMode::EighthTriplet),
            _ => Err(format!("Unknown quantize mode: {}", s)),
        }
    }
}

/// Snap every onset to the nearest multiple of `grid`.
///
/// Halfway points round away from zero. The result is re-sorted by the new
/// onsets, keeping the original order for ties. A grid that is not a positive
/// finite number returns the events unchanged.
pub fn quantize(events: &[NoteEvent], grid: f64) -> Vec<NoteEvent> {
    if !(grid > 0.0 && grid.is_finite()) {
        return events.to_vec();
    }
    let mut snapped: Vec<NoteEvent> = events
        .iter()
        .map(|e| NoteEvent {
            time: ((e.time / grid).round() * grid).max(0.0),
            ..*e
        })
        .collect();
    snapped.sort_by(|a, b| a.time.total_cmp(&b.time));
    snapped
}

/// Quantized copy of a take, or its raw events when `mode` is `None`
pub fn quantize_recording(recording: &Recording, mode: Option<QuantizeMode>) -> Vec<NoteEvent> {
    match mode {
        Some(mode) => quantize(&recording.events, mode.grid(recording.beat_length())),
        None => recording.events.clone(),
    }
}
