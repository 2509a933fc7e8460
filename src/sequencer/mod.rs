// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Note sequences and deferred work.
//!
//! This module provides:
//! - The note event shared by recordings, templates and the practice queue
//! - Sequence helpers (sorting, span, gap inference)
//! - The deferred task queue used by playback

pub mod scheduler;

pub use scheduler::{ScheduledTask, SessionToken, TaskQueue};

use serde::{Deserialize, Serialize};

use crate::music::Pitch;

/// Length of a captured note in seconds
pub const DEFAULT_NOTE_DURATION: f64 = 0.6;

/// Onsets closer than this are treated as simultaneous
pub const ONSET_EPSILON: f64 = 1e-4;

/// One note of a sequence, relative to the sequence origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub note: Pitch,
    /// Onset in seconds from the sequence origin
    pub time: f64,
    /// Base length in seconds
    pub duration: f64,
}

impl NoteEvent {
    pub fn new(note: Pitch, time: f64, duration: f64) -> Self {
        Self {
            note,
            time: time.max(0.0),
            duration,
        }
    }

    /// Onset plus base length
    pub fn end(&self) -> f64 {
        self.time + self.duration
    }

    /// Copy shifted later by `offset` seconds
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            time: (self.time + offset).max(0.0),
            ..*self
        }
    }
}

/// Copy of `events` sorted by onset; ties keep their original order
pub fn sorted_by_time(events: &[NoteEvent]) -> Vec<NoteEvent> {
    let mut sorted = events.to_vec();
    sorted.sort_by(|a, b| a.time.total_cmp(&b.time));
    sorted
}

/// Latest note end in the sequence, zero when empty
pub fn span(events: &[NoteEvent]) -> f64 {
    events.iter().map(NoteEvent::end).fold(0.0, f64::max)
}

/// Smallest gap between distinct onsets, ignoring near-duplicates
pub fn smallest_gap(events: &[NoteEvent]) -> Option<f64> {
    let sorted = sorted_by_time(events);
    sorted
        .windows(2)
        .map(|w| w[1].time - w[0].time)
        .filter(|gap| *gap > ONSET_EPSILON)
        .min_by(|a, b| a.total_cmp(b))
}

/// Note names joined for display, e.g. `C3 | D3 | E3`
pub fn summary(events: &[NoteEvent]) -> String {
    events
        .iter()
        .map(|e| e.note.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}
