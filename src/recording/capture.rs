// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Bar-aligned note capture.
//!
//! A take always starts on a downbeat after one full bar of count-in and
//! always ends on a bar line: a stop request is deferred until the beat that
//! closes the current bar. The recorder itself is a plain state machine fed
//! with beats and timing snapshots; the trainer owns the metronome and acts
//! on the outcomes returned here.

use std::mem;

use tracing::{debug, info};

use crate::metronome::{BeatEvent, TimingSnapshot};
use crate::music::Pitch;
use crate::sequencer::{smallest_gap, NoteEvent, DEFAULT_NOTE_DURATION};

/// Tolerance when comparing fractional beat positions
pub const BEAT_EPSILON: f64 = 1e-4;

/// Recording phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingPhase {
    /// Not recording
    #[default]
    Idle,
    /// Counting one bar in before capture
    CountIn,
    /// Count-in done, the next beat starts capture
    AwaitingStart,
    /// Capturing notes
    Recording,
}

/// A finished take
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    /// Captured notes in capture order
    pub events: Vec<NoteEvent>,
    /// Metronome timing at the first captured beat
    pub timing: Option<TimingSnapshot>,
    /// Every beat seen from the first captured beat to the closing bar line
    pub beat_timeline: Vec<BeatEvent>,
    /// Whole bars spanned by the take
    pub bars: u64,
}

impl Recording {
    /// Beat length the take was played at.
    ///
    /// Taken from the capture timing, else inferred from the smallest gap
    /// between notes, else the default note length.
    pub fn beat_length(&self) -> f64 {
        self.timing
            .map(|t| t.beat_length_seconds)
            .filter(|len| *len > 0.0)
            .or_else(|| smallest_gap(&self.events))
            .unwrap_or(DEFAULT_NOTE_DURATION)
    }

    pub fn beats_per_bar(&self) -> Option<u32> {
        self.timing.map(|t| t.beats_per_bar)
    }

    /// Seconds from the first captured beat to the closing bar line
    pub fn length(&self) -> Option<f64> {
        if self.bars == 0 {
            return None;
        }
        match (self.beat_timeline.first(), self.beat_timeline.last()) {
            (Some(first), Some(last)) if last.time > first.time => Some(last.time - first.time),
            _ => self.timing.map(|timing| {
                self.bars as f64 * timing.beats_per_bar as f64 * timing.beat_length_seconds
            }),
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TakeOutcome {
    /// A take was committed
    Committed { notes: usize, bars: u64 },
    /// Capture ran but no note was played
    NothingCaptured,
    /// Stopped before capture began
    Aborted,
}

/// Result of closing a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finalized {
    pub outcome: TakeOutcome,
    /// The recorder started the metronome and it should now be stopped
    pub release_metronome: bool,
}

/// Reaction to a beat
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeatOutcome {
    /// Not listening to beats
    Ignored,
    /// Count-in waits for the first downbeat
    WaitingForDownbeat,
    /// Count-in in progress
    CountIn { remaining: u32 },
    /// Count-in finished
    AwaitingStart,
    /// Capture started at this beat
    Started { start_time: f64 },
    /// Capture continues
    Recording { bar: u64 },
    /// The closing bar line arrived
    Finished(Finalized),
}

/// Reaction to a stop request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopOutcome {
    /// Nothing to stop
    Idle,
    /// Waiting for the beat at `target_beat`
    Pending { target_beat: f64 },
    Finished(Finalized),
}

/// Recording state machine
#[derive(Debug)]
pub struct Recorder {
    phase: RecordingPhase,
    /// Beats left in the count-in bar
    count_in_remaining: u32,
    /// First downbeat of the count-in has arrived
    downbeat_seen: bool,
    /// Clock time of capture beat zero
    record_start_time: Option<f64>,
    /// Metronome beat number of capture beat zero
    start_beat: u64,
    buffer: Vec<NoteEvent>,
    timing: Option<TimingSnapshot>,
    timeline: Vec<BeatEvent>,
    /// Set while a stop waits for the bar line
    stop_target_beat: Option<f64>,
    /// The metronome was started for this session
    owns_metronome: bool,
    note_duration: f64,
    last_take: Option<Recording>,
}

impl Recorder {
    /// Create an idle recorder
    pub fn new() -> Self {
        Self {
            phase: RecordingPhase::Idle,
            count_in_remaining: 0,
            downbeat_seen: false,
            record_start_time: None,
            start_beat: 0,
            buffer: Vec::new(),
            timing: None,
            timeline: Vec::new(),
            stop_target_beat: None,
            owns_metronome: false,
            note_duration: DEFAULT_NOTE_DURATION,
            last_take: None,
        }
    }

    pub fn phase(&self) -> RecordingPhase {
        self.phase
    }

    /// Whether the recorder wants beat events
    pub fn is_listening(&self) -> bool {
        self.phase != RecordingPhase::Idle
    }

    pub fn is_stop_pending(&self) -> bool {
        self.stop_target_beat.is_some()
    }

    pub fn stop_target_beat(&self) -> Option<f64> {
        self.stop_target_beat
    }

    pub fn count_in_remaining(&self) -> u32 {
        self.count_in_remaining
    }

    pub fn owns_metronome(&self) -> bool {
        self.owns_metronome
    }

    /// Notes captured so far in the running session
    pub fn buffer(&self) -> &[NoteEvent] {
        &self.buffer
    }

    /// The most recent committed take
    pub fn last_take(&self) -> Option<&Recording> {
        self.last_take.as_ref()
    }

    /// Length given to captured notes
    pub fn set_note_duration(&mut self, seconds: f64) {
        if seconds > 0.0 && seconds.is_finite() {
            self.note_duration = seconds;
        }
    }

    /// Begin a session with a one-bar count-in.
    ///
    /// Clears the previous take. Returns false if a session is already active.
    pub fn begin(&mut self, beats_per_bar: u32, owns_metronome: bool) -> bool {
        if self.phase != RecordingPhase::Idle {
            return false;
        }
        self.reset_session();
        self.last_take = None;
        self.count_in_remaining = beats_per_bar.max(1);
        self.owns_metronome = owns_metronome;
        self.phase = RecordingPhase::CountIn;

        info!(count_in = self.count_in_remaining, "recording armed");
        true
    }

    /// Feed one scheduled beat.
    ///
    /// `snapshot` is the metronome timing at `beat.time`; it becomes the
    /// tempo reference of the take when this beat starts capture.
    pub fn on_beat(&mut self, beat: &BeatEvent, snapshot: Option<TimingSnapshot>) -> BeatOutcome {
        match self.phase {
            RecordingPhase::Idle => BeatOutcome::Ignored,
            RecordingPhase::CountIn => {
                if !self.downbeat_seen {
                    if !beat.accent {
                        return BeatOutcome::WaitingForDownbeat;
                    }
                    self.downbeat_seen = true;
                }
                self.count_in_remaining = self.count_in_remaining.saturating_sub(1);
                if self.count_in_remaining == 0 {
                    self.phase = RecordingPhase::AwaitingStart;
                    BeatOutcome::AwaitingStart
                } else {
                    BeatOutcome::CountIn {
                        remaining: self.count_in_remaining,
                    }
                }
            }
            RecordingPhase::AwaitingStart => {
                self.record_start_time = Some(beat.time);
                self.start_beat = beat.total_beats;
                self.timing = snapshot;
                self.timeline.clear();
                self.timeline.push(*beat);
                self.phase = RecordingPhase::Recording;

                info!(start = beat.time, bpm = beat.bpm, "capture started");
                BeatOutcome::Started {
                    start_time: beat.time,
                }
            }
            RecordingPhase::Recording => {
                self.timeline.push(*beat);
                match self.stop_target_beat {
                    Some(target) if beat.total_beats as f64 >= target - BEAT_EPSILON => {
                        BeatOutcome::Finished(self.finalize())
                    }
                    _ => BeatOutcome::Recording {
                        bar: (beat.total_beats - self.start_beat) / beat.beats_per_bar.max(1) as u64,
                    },
                }
            }
        }
    }

    /// Capture a played note at clock time `now`.
    ///
    /// Returns false when no capture is running.
    pub fn capture(&mut self, note: Pitch, now: f64) -> bool {
        if self.phase != RecordingPhase::Recording {
            return false;
        }
        let Some(start) = self.record_start_time else {
            return false;
        };
        self.buffer
            .push(NoteEvent::new(note, (now - start).max(0.0), self.note_duration));
        debug!(%note, count = self.buffer.len(), "note captured");
        true
    }

    /// Ask the session to stop.
    ///
    /// Before capture begins this aborts. During capture the stop is deferred
    /// to the next bar line at or after the position in `snapshot`; without a
    /// snapshot (metronome gone) the take closes immediately.
    pub fn request_stop(&mut self, snapshot: Option<TimingSnapshot>) -> StopOutcome {
        match self.phase {
            RecordingPhase::Idle => StopOutcome::Idle,
            RecordingPhase::CountIn | RecordingPhase::AwaitingStart => {
                StopOutcome::Finished(self.abort())
            }
            RecordingPhase::Recording => {
                let Some(snapshot) = snapshot else {
                    return StopOutcome::Finished(self.finalize());
                };
                if let Some(target_beat) = self.stop_target_beat {
                    return StopOutcome::Pending { target_beat };
                }

                let position = self.elapsed_beats(&snapshot);
                let target_beat = self.bar_line_after(position, snapshot.beats_per_bar);
                if position >= target_beat - BEAT_EPSILON {
                    self.timeline
                        .retain(|b| b.total_beats as f64 <= target_beat + BEAT_EPSILON);
                    return StopOutcome::Finished(self.finalize());
                }

                // The closing beat may already be scheduled but not sounded
                if let Some(pos) = self.timeline.iter().position(|b| {
                    b.time >= snapshot.reference_time
                        && b.total_beats as f64 >= target_beat - BEAT_EPSILON
                }) {
                    self.timeline.truncate(pos + 1);
                    return StopOutcome::Finished(self.finalize());
                }

                self.stop_target_beat = Some(target_beat);
                info!(target_beat, "stop pending until bar line");
                StopOutcome::Pending { target_beat }
            }
        }
    }

    /// Drop the running session without producing a take
    pub fn abort(&mut self) -> Finalized {
        let release_metronome = self.owns_metronome;
        let was_active = self.phase != RecordingPhase::Idle;
        self.reset_session();
        if was_active {
            info!("recording aborted");
        }
        Finalized {
            outcome: TakeOutcome::Aborted,
            release_metronome,
        }
    }

    /// Abort any session and forget the last take
    pub fn clear(&mut self) -> Finalized {
        let finalized = self.abort();
        self.last_take = None;
        finalized
    }

    /// Metronome beat number of the bar line that closes the take
    /// Beats elapsed at the snapshot's reference time, measured from the
    /// latest sounded beat at the beat length it was scheduled with
    fn elapsed_beats(&self, snapshot: &TimingSnapshot) -> f64 {
        match self
            .timeline
            .iter()
            .rev()
            .find(|b| b.time <= snapshot.reference_time)
        {
            Some(beat) if beat.beat_length > 0.0 => {
                beat.total_beats as f64 + (snapshot.reference_time - beat.time) / beat.beat_length
            }
            _ => snapshot.total_beats,
        }
    }

    /// First bar line at or after `position`, never before the end of the
    /// first captured bar
    fn bar_line_after(&self, position: f64, beats_per_bar: u32) -> f64 {
        let beats_per_bar = beats_per_bar.max(1) as f64;
        let bar = (position / beats_per_bar).floor();
        let within_bar = position - bar * beats_per_bar;
        let mut target_bar = if within_bar.abs() < BEAT_EPSILON {
            bar
        } else {
            bar + 1.0
        };

        // A take is at least one bar long
        let start_bar = (self.start_beat as f64 / beats_per_bar).floor();
        target_bar = target_bar.max(start_bar + 1.0);

        target_bar * beats_per_bar
    }

    fn finalize(&mut self) -> Finalized {
        let release_metronome = self.owns_metronome;
        let events = mem::take(&mut self.buffer);
        let timeline = mem::take(&mut self.timeline);
        let timing = self.timing.take();
        let start_beat = self.start_beat;
        self.reset_session();

        if events.is_empty() {
            info!("recording finished without notes");
            return Finalized {
                outcome: TakeOutcome::NothingCaptured,
                release_metronome,
            };
        }

        let bars = match (timeline.last(), timing) {
            (Some(last), Some(timing)) => {
                (last.total_beats.saturating_sub(start_beat)) / timing.beats_per_bar.max(1) as u64
            }
            (Some(last), None) => {
                (last.total_beats.saturating_sub(start_beat)) / last.beats_per_bar.max(1) as u64
            }
            _ => 0,
        };
        let notes = events.len();
        self.last_take = Some(Recording {
            events,
            timing,
            beat_timeline: timeline,
            bars,
        });

        info!(notes, bars, "recording committed");
        Finalized {
            outcome: TakeOutcome::Committed { notes, bars },
            release_metronome,
        }
    }

    fn reset_session(&mut self) {
        self.phase = RecordingPhase::Idle;
        self.count_in_remaining = 0;
        self.downbeat_seen = false;
        self.record_start_time = None;
        self.start_beat = 0;
        self.buffer.clear();
        self.timing = None;
        self.timeline.clear();
        self.stop_target_beat = None;
        self.owns_metronome = false;
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}
