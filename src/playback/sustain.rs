// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Sustain inference.
//!
//! A note is held into the next onset when that onset follows closely
//! enough, so legato phrases do not sound chopped on replay.

use crate::sequencer::{sorted_by_time, NoteEvent, ONSET_EPSILON};

/// Gaps longer than this many note lengths are left as rests
pub const MAX_SUSTAIN_RATIO: f64 = 2.5;

/// Overlap added past the next onset when bridging a gap
pub const SUSTAIN_OVERLAP: f64 = 0.1;

/// Sounding length of a note given the gap to the next onset
pub fn sustain_for(duration: f64, gap: Option<f64>) -> f64 {
    match gap {
        Some(gap) if gap <= MAX_SUSTAIN_RATIO * duration => duration.max(gap + SUSTAIN_OVERLAP),
        _ => duration,
    }
}

/// Events sorted by onset with inferred sounding lengths
pub fn resolve_sustain(events: &[NoteEvent]) -> Vec<NoteEvent> {
    let sorted = sorted_by_time(events);
    sorted
        .iter()
        .enumerate()
        .map(|(i, event)| {
            let gap = sorted[i + 1..]
                .iter()
                .find(|next| next.time - event.time > ONSET_EPSILON)
                .map(|next| next.time - event.time);
            NoteEvent {
                duration: sustain_for(event.duration, gap),
                ..*event
            }
        })
        .collect()
}
