// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Sequence playback.
//!
//! This module provides:
//! - Playback planning (tempo retargeting, sustain, end time)
//! - The state of the single in-flight playback session
//! - Templates and the practice queue

pub mod queue;
pub mod sustain;

pub use queue::{
    build_cycle, queue_beat_length, with_repeats, PracticeQueue, QueuedSequence, Template,
    UNTITLED_TEMPLATE,
};
pub use sustain::{resolve_sustain, sustain_for, MAX_SUSTAIN_RATIO, SUSTAIN_OVERLAP};

use crate::audio::Voice;
use crate::music::Pitch;
use crate::sequencer::{NoteEvent, SessionToken};

/// Delay before the first note when there is no count-in
pub const PLAYBACK_LEAD: f64 = 0.08;

/// Time after the last note end at which playback is cleaned up
pub const END_MARGIN: f64 = 0.05;

/// How a sequence is played
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackOptions {
    /// Retarget the sequence to the metronome tempo and keep it running
    pub sync_with_metronome: bool,
    /// Metronome beats to count in before the first note
    pub count_in_beats: u32,
    /// Beat length the sequence was written at; inferred when `None`
    pub base_beat_length: Option<f64>,
}

impl PlaybackOptions {
    pub fn synced() -> Self {
        Self {
            sync_with_metronome: true,
            ..Self::default()
        }
    }

    pub fn with_count_in(mut self, beats: u32) -> Self {
        self.count_in_beats = beats;
        self
    }

    pub fn with_base_beat_length(mut self, beat_length: Option<f64>) -> Self {
        self.base_beat_length = beat_length;
        self
    }
}

/// Factor applied to onsets and lengths to play at the metronome tempo
pub fn tempo_scale(metronome_beat_length: f64, base_beat_length: f64) -> f64 {
    let scale = metronome_beat_length / base_beat_length;
    if scale > 0.0 && scale.is_finite() {
        scale
    } else {
        1.0
    }
}

/// A note placed on the clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedNote {
    pub note: Pitch,
    pub start: f64,
    pub duration: f64,
}

impl PlannedNote {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Clock placement of a whole sequence
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackPlan {
    pub notes: Vec<PlannedNote>,
    pub start_at: f64,
    pub tempo_scale: f64,
    /// Clock time of the end-of-playback cleanup
    pub end_at: f64,
}

impl PlaybackPlan {
    /// Place `events` on the clock from `start_at`, onsets scaled by `tempo_scale`.
    ///
    /// Lengths come from sustain inference and are not rescaled.
    pub fn new(events: &[NoteEvent], start_at: f64, tempo_scale: f64) -> Self {
        let notes: Vec<PlannedNote> = resolve_sustain(events)
            .iter()
            .map(|e| PlannedNote {
                note: e.note,
                start: start_at + e.time * tempo_scale,
                duration: e.duration,
            })
            .collect();
        let last_end = notes.iter().map(PlannedNote::end).fold(start_at, f64::max);
        Self {
            notes,
            start_at,
            tempo_scale,
            end_at: last_end + END_MARGIN,
        }
    }
}

/// Who started the metronome on behalf of a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetronomeClaim {
    /// Started to keep time for a synced playback
    pub for_playback: bool,
    /// Started only for the count-in bar
    pub for_count_in: bool,
}

impl MetronomeClaim {
    pub fn is_held(&self) -> bool {
        self.for_playback || self.for_count_in
    }
}

/// The in-flight playback session
#[derive(Debug)]
pub struct PlaybackSession<V: Voice> {
    pub token: SessionToken,
    pub voices: Vec<V>,
    pub claim: MetronomeClaim,
}

impl<V: Voice> PlaybackSession<V> {
    pub fn new(token: SessionToken) -> Self {
        Self {
            token,
            voices: Vec::new(),
            claim: MetronomeClaim::default(),
        }
    }

    /// Silence every voice from `at` on
    pub fn stop_voices(&mut self, at: f64) {
        for voice in self.voices.iter_mut() {
            voice.stop(at);
        }
    }
}
