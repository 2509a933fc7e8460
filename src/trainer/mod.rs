// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! The practice session.
//!
//! [`Trainer`] owns every piece of mutable session state: the metronome, the
//! recorder, the deferred task queue, the in-flight playback, the templates
//! and the practice queue. It is driven cooperatively: the caller invokes
//! [`Trainer::pump`] at least every [`LOOKAHEAD_MS`](crate::metronome::LOOKAHEAD_MS)
//! milliseconds and each call runs to completion.
//!
//! Beats go straight from the metronome to the recorder inside `pump`, so a
//! take that ends on a bar line can stop the metronome without re-entering
//! the scheduler.

pub mod highlight;

pub use highlight::{highlight_millis, HighlightSink, NoHighlights};

use tracing::{debug, info, warn};

use crate::audio::{ClickSound, RenderOptions, Tone, ToneRenderer};
use crate::config::TrainerConfig;
use crate::metronome::{
    BeatEvent, ClickLevels, ListenerId, Metronome, TimingSnapshot, START_DELAY,
};
use crate::music::Pitch;
use crate::playback::{
    queue_beat_length, tempo_scale, MetronomeClaim, PlaybackOptions, PlaybackPlan,
    PlaybackSession, PracticeQueue, Template, PLAYBACK_LEAD,
};
use crate::recording::{
    quantize_recording, BeatOutcome, Finalized, QuantizeMode, Recorder, Recording,
    RecordingPhase, StopOutcome, TakeOutcome,
};
use crate::sequencer::{
    smallest_gap, summary, NoteEvent, SessionToken, TaskQueue, DEFAULT_NOTE_DURATION,
};
use crate::timing::{ClockSource, ClockState, TempoSettings};

/// Deferred work of a playback session
#[derive(Debug, Clone, Copy, PartialEq)]
enum Task {
    /// Light a key when its note starts
    Highlight { note: Pitch, duration_ms: u64 },
    /// Stop a metronome started only for the count-in
    EndCountIn,
    /// Release the session after the last note
    EndPlayback,
}

/// Session context of the practice trainer
pub struct Trainer<C: ClockSource, R: ToneRenderer> {
    clock: C,
    renderer: R,
    metronome: Metronome,
    recorder: Recorder,
    tasks: TaskQueue<Task>,
    playback: Option<PlaybackSession<R::Voice>>,
    templates: Vec<Template>,
    queue: PracticeQueue,
    quantize: Option<QuantizeMode>,
    note_duration: f64,
    status: String,
    highlights: Box<dyn HighlightSink>,
}

impl<C: ClockSource, R: ToneRenderer> Trainer<C, R> {
    /// Create a trainer with the built-in demo template
    pub fn new(clock: C, renderer: R, tempo: TempoSettings) -> Self {
        Self {
            clock,
            renderer,
            metronome: Metronome::new(tempo),
            recorder: Recorder::new(),
            tasks: TaskQueue::new(),
            playback: None,
            templates: vec![Template::demo()],
            queue: PracticeQueue::new(),
            quantize: None,
            note_duration: DEFAULT_NOTE_DURATION,
            status: "Ready.".to_string(),
            highlights: Box::new(NoHighlights),
        }
    }

    /// Create a trainer from a loaded configuration
    pub fn with_config(clock: C, renderer: R, config: &TrainerConfig) -> Self {
        let mut trainer = Self::new(clock, renderer, config.tempo());
        let now = trainer.now();
        trainer.metronome.set_levels(config.metronome.levels());
        trainer.metronome.set_sound(config.metronome.sound);
        trainer
            .metronome
            .set_volume(config.metronome.volume, now, &mut trainer.renderer);

        if config.recording.note_duration > 0.0 && config.recording.note_duration.is_finite() {
            trainer.note_duration = config.recording.note_duration;
        }
        trainer.quantize = config.recording.quantize;
        trainer.queue.set_repeats(config.playback.repeats);
        trainer.queue.set_pause_bars(config.playback.pause_bars);
        for template in &config.templates {
            trainer.add_template(template.clone());
        }
        trainer
    }

    /// Current clock time
    pub fn now(&self) -> f64 {
        self.clock.current_time()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn metronome(&self) -> &Metronome {
        &self.metronome
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Latest status line
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_highlight_sink<H: HighlightSink + 'static>(&mut self, sink: H) {
        self.highlights = Box::new(sink);
    }

    /// One cooperative step: run due tasks, then the lookahead pass if due
    pub fn pump(&mut self) {
        let now = self.now();
        for scheduled in self.tasks.drain_due(now) {
            debug!(due = scheduled.due, task = ?scheduled.task, "running task");
            self.run_task(scheduled.session, scheduled.task);
        }

        if self.metronome.begin_pass(now) {
            while let Some(beat) = self.metronome.schedule_next(now, &mut self.renderer) {
                self.route_beat(&beat);
            }
        }
    }

    /// Earliest clock time at which a deferred task is due
    pub fn next_task_due(&self) -> Option<f64> {
        self.tasks.next_due()
    }

    // ----- Keyboard -----

    /// Sound and highlight a played key, capturing it while recording.
    ///
    /// Returns false when no audio clock is available.
    pub async fn on_note_triggered(&mut self, note: Pitch) -> bool {
        if !self.acquire_clock().await {
            return false;
        }
        let now = self.now();
        let options = RenderOptions::for_duration(self.note_duration);
        if let Err(err) = self.renderer.render(&Tone::Note(note), now, options) {
            warn!(%err, %note, "note render failed");
        }
        self.highlights
            .highlight(note, highlight_millis(self.note_duration));

        if self.recorder.capture(note, now) {
            let count = self.recorder.buffer().len();
            self.set_status(&format!("Recording: {} notes", count));
        }
        true
    }

    // ----- Recording -----

    pub fn recording_phase(&self) -> RecordingPhase {
        self.recorder.phase()
    }

    /// Arm a take with a one-bar count-in.
    ///
    /// Starts the metronome when it is not running and stops it again when
    /// the take ends. Returns false if a session is already active or there
    /// is no audio clock.
    pub async fn start_recording(&mut self) -> bool {
        if self.recorder.is_listening() {
            return false;
        }
        if !self.acquire_clock().await {
            return false;
        }
        self.stop_playback();

        let now = self.now();
        let owns_metronome = !self.metronome.is_active();
        if owns_metronome {
            self.metronome.start(now, &mut self.renderer);
        }
        self.recorder.set_note_duration(self.note_duration);
        self.recorder
            .begin(self.metronome.beats_per_bar(), owns_metronome);
        self.set_status("Count-in: waiting for the bar to start");
        true
    }

    /// Stop the take at the next bar line, or abort it during count-in
    pub fn stop_recording(&mut self) -> bool {
        let snapshot = self.metronome.timing_state(self.now());
        match self.recorder.request_stop(snapshot) {
            StopOutcome::Idle => false,
            StopOutcome::Pending { target_beat } => {
                debug!(target_beat, "stop requested");
                self.set_status("Stopping at the end of the bar ...");
                true
            }
            StopOutcome::Finished(finalized) => {
                self.finish_take(finalized);
                true
            }
        }
    }

    /// Abort any take and discard the last one
    pub fn clear_recording(&mut self) {
        self.stop_playback();
        let finalized = self.recorder.clear();
        if finalized.release_metronome {
            self.metronome.stop();
        }
        self.set_status("Recording deleted.");
    }

    /// The last committed take
    pub fn last_recording(&self) -> Option<&Recording> {
        self.recorder.last_take()
    }

    /// The last take with the current quantize mode applied
    pub fn preview_recording(&self) -> Vec<NoteEvent> {
        self.recorder
            .last_take()
            .map(|take| quantize_recording(take, self.quantize))
            .unwrap_or_default()
    }

    /// Note names of the last take, e.g. `C3 | D3 | E3`
    pub fn recording_summary(&self) -> String {
        match self.recorder.last_take() {
            Some(take) if !take.events.is_empty() => summary(&take.events),
            _ => "No recording yet.".to_string(),
        }
    }

    pub fn set_quantize_mode(&mut self, mode: Option<QuantizeMode>) {
        self.quantize = mode;
    }

    pub fn quantize_mode(&self) -> Option<QuantizeMode> {
        self.quantize
    }

    /// Store the last take as a template under `name`.
    ///
    /// Returns the saved events (quantized when a mode is set), empty when
    /// there is no take. A template with the same name is replaced.
    pub fn save_as_template(&mut self, name: &str) -> Vec<NoteEvent> {
        let Some(take) = self.recorder.last_take() else {
            self.set_status("No recording yet. Record something first.");
            return Vec::new();
        };
        let events = quantize_recording(take, self.quantize);
        let template = Template::new(name, events.clone()).with_length(take.length());

        let saved_name = template.name.clone();
        self.add_template(template);
        self.set_status(&format!("Template \"{}\" saved.", saved_name));
        events
    }

    // ----- Templates and queue -----

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }

    /// Add a template, replacing one with the same name
    pub fn add_template(&mut self, template: Template) {
        self.templates.retain(|t| t.name != template.name);
        self.templates.push(template);
    }

    pub fn queue(&self) -> &PracticeQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut PracticeQueue {
        &mut self.queue
    }

    /// Append a stored template to the practice queue
    pub fn enqueue_template(&mut self, name: &str) -> bool {
        match self.template(name).cloned() {
            Some(template) => {
                self.queue.add(template);
                true
            }
            None => false,
        }
    }

    // ----- Playback -----

    pub fn is_playing(&self) -> bool {
        self.playback.is_some()
    }

    /// Play a note sequence, replacing any playback in flight.
    ///
    /// Returns false for an empty sequence, during a take, or when there is
    /// no audio clock.
    pub async fn play_sequence(
        &mut self,
        events: &[NoteEvent],
        status: &str,
        options: PlaybackOptions,
    ) -> bool {
        if events.is_empty() {
            self.set_status("Nothing to play.");
            return false;
        }
        if self.recorder.is_listening() {
            self.set_status("Finish the recording first.");
            return false;
        }
        if !self.acquire_clock().await {
            return false;
        }
        self.stop_playback();

        let now = self.now();
        let token = self.tasks.open_session();
        let mut session = PlaybackSession::new(token);
        let beat_length = self.metronome.tempo().beat_length();

        let mut scale = 1.0;
        if options.sync_with_metronome {
            if !self.metronome.is_active() {
                self.metronome.start(now, &mut self.renderer);
                session.claim.for_playback = true;
            }
            let base = options
                .base_beat_length
                .filter(|len| *len > 0.0)
                .or_else(|| smallest_gap(events))
                .unwrap_or(DEFAULT_NOTE_DURATION);
            scale = tempo_scale(beat_length, base);
        }

        let start_at = if options.count_in_beats > 0 {
            if !self.metronome.is_active() {
                self.metronome.start(now, &mut self.renderer);
                session.claim.for_count_in = true;
            }
            let start_at = self.upcoming_beat(now) + options.count_in_beats as f64 * beat_length;
            if session.claim.for_count_in {
                // Between the last count-in tick and the first note
                self.tasks
                    .schedule(token, start_at - beat_length / 2.0, Task::EndCountIn);
            }
            start_at
        } else {
            now + PLAYBACK_LEAD
        };

        let plan = PlaybackPlan::new(events, start_at, scale);
        for planned in &plan.notes {
            let options = RenderOptions::for_duration(planned.duration);
            match self
                .renderer
                .render(&Tone::Note(planned.note), planned.start, options)
            {
                Ok(voice) => {
                    session.voices.push(voice);
                    self.tasks.schedule(
                        token,
                        planned.start,
                        Task::Highlight {
                            note: planned.note,
                            duration_ms: highlight_millis(planned.duration),
                        },
                    );
                }
                Err(err) => warn!(%err, note = %planned.note, "skipping note"),
            }
        }

        self.tasks.schedule(token, plan.end_at, Task::EndPlayback);
        info!(
            notes = plan.notes.len(),
            start_at,
            tempo_scale = scale,
            end_at = plan.end_at,
            "playback scheduled"
        );
        self.playback = Some(session);
        self.set_status(status);
        true
    }

    /// Play the last take, quantized by the current mode
    pub async fn play_recording(&mut self, options: PlaybackOptions) -> bool {
        let Some(take) = self.recorder.last_take() else {
            self.set_status("No recording yet. Record something first.");
            return false;
        };
        let events = quantize_recording(take, self.quantize);
        let options = PlaybackOptions {
            base_beat_length: options.base_beat_length.or(Some(take.beat_length())),
            ..options
        };
        self.play_sequence(&events, "Playing recording ...", options)
            .await
    }

    /// Play a stored template
    pub async fn play_template(&mut self, name: &str, options: PlaybackOptions) -> bool {
        let Some(template) = self.template(name).cloned() else {
            self.set_status(&format!("Unknown template \"{}\".", name));
            return false;
        };
        let options = PlaybackOptions {
            base_beat_length: options
                .base_beat_length
                .or_else(|| queue_beat_length(&template.events)),
            ..options
        };
        let status = format!("Playing template \"{}\" ...", template.name);
        self.play_sequence(&template.events, &status, options).await
    }

    /// Play the practice queue with its repeats and pauses
    pub async fn play_queue(&mut self, options: PlaybackOptions) -> bool {
        let Some(sequence) = self.queue.sequence(self.metronome.beats_per_bar()) else {
            self.set_status("The practice queue is empty.");
            return false;
        };
        let options = PlaybackOptions {
            base_beat_length: Some(sequence.base_beat_length),
            ..options
        };
        let status = format!(
            "Playing queue: {} ({}x)",
            self.queue.names(),
            sequence.repeats
        );
        self.play_sequence(&sequence.events, &status, options).await
    }

    /// Cancel the playback in flight; its voices fall silent now
    pub fn stop_playback(&mut self) -> bool {
        let Some(mut session) = self.playback.take() else {
            return false;
        };
        let now = self.now();
        let dropped = self.tasks.cancel(session.token);
        session.stop_voices(now);
        if session.claim.is_held() {
            self.metronome.stop();
        }
        self.highlights.clear();
        debug!(dropped, "playback cancelled");
        true
    }

    // ----- Metronome -----

    /// Start the metronome; false when no audio clock is available
    pub async fn start_metronome(&mut self) -> bool {
        if !self.acquire_clock().await {
            return false;
        }
        let now = self.now();
        self.metronome.start(now, &mut self.renderer);
        self.metronome.is_active()
    }

    /// Stop the metronome.
    ///
    /// A take still counting in is aborted; a take in progress closes now.
    pub fn stop_metronome(&mut self) {
        if !self.metronome.is_active() {
            return;
        }
        self.metronome.stop();
        if let Some(session) = self.playback.as_mut() {
            session.claim = MetronomeClaim::default();
        }

        match self.recorder.phase() {
            RecordingPhase::Idle => {}
            RecordingPhase::CountIn | RecordingPhase::AwaitingStart => {
                let finalized = self.recorder.abort();
                self.finish_take(finalized);
            }
            RecordingPhase::Recording => {
                if let StopOutcome::Finished(finalized) = self.recorder.request_stop(None) {
                    self.finish_take(finalized);
                }
            }
        }
    }

    /// Flip the metronome; returns whether it is now running
    pub async fn toggle_metronome(&mut self) -> bool {
        if self.metronome.is_active() {
            self.stop_metronome();
            false
        } else {
            self.start_metronome().await
        }
    }

    /// The host went to the background
    pub fn visibility_hidden(&mut self) {
        self.stop_metronome();
    }

    pub fn add_beat_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&BeatEvent) + 'static,
    {
        self.metronome.add_beat_listener(listener)
    }

    pub fn remove_beat_listener(&mut self, id: ListenerId) -> bool {
        self.metronome.remove_beat_listener(id)
    }

    /// Metronome timing at the current clock time
    pub fn timing_state(&self) -> Option<TimingSnapshot> {
        self.metronome.timing_state(self.now())
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.metronome.tempo_mut().set_bpm(bpm);
    }

    /// Set the tempo from raw text input
    pub fn set_bpm_text(&mut self, text: &str) {
        self.metronome.tempo_mut().set_bpm_text(text);
    }

    pub fn set_beats_per_bar(&mut self, beats: i64) {
        self.metronome.tempo_mut().set_beats_per_bar(beats);
    }

    /// Set the meter from raw text input
    pub fn set_beats_per_bar_text(&mut self, text: &str) {
        self.metronome.tempo_mut().set_beats_per_bar_text(text);
    }

    pub fn set_metronome_volume(&mut self, volume: f32) {
        let now = self.now();
        self.metronome.set_volume(volume, now, &mut self.renderer);
    }

    pub fn metronome_volume(&self) -> f32 {
        self.metronome.volume()
    }

    pub fn set_click_sound(&mut self, sound: ClickSound) {
        self.metronome.set_sound(sound);
    }

    pub fn set_click_levels(&mut self, levels: ClickLevels) {
        self.metronome.set_levels(levels);
    }

    // ----- Internals -----

    async fn acquire_clock(&mut self) -> bool {
        if self.clock.state() == ClockState::Running {
            return true;
        }
        match self.clock.resume().await {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "audio clock unavailable");
                self.set_status("Audio is not available.");
                false
            }
        }
    }

    /// Clock time of the next audible beat, or of the first tick of a
    /// metronome that is not running yet
    fn upcoming_beat(&self, now: f64) -> f64 {
        match self.metronome.timing_state(now) {
            Some(timing) => match timing.last_beat_time {
                Some(last) if last >= now => last,
                _ => timing.next_beat_time,
            },
            None => now + START_DELAY,
        }
    }

    fn route_beat(&mut self, beat: &BeatEvent) {
        if !self.recorder.is_listening() {
            return;
        }
        let snapshot = self.metronome.timing_state(beat.time);
        match self.recorder.on_beat(beat, snapshot) {
            BeatOutcome::Ignored | BeatOutcome::Recording { .. } => {}
            BeatOutcome::WaitingForDownbeat => {
                self.set_status("Count-in: waiting for the bar to start")
            }
            BeatOutcome::CountIn { remaining } => {
                self.set_status(&format!("Count-in: {}", remaining))
            }
            BeatOutcome::AwaitingStart => self.set_status("Get ready ..."),
            BeatOutcome::Started { .. } => self.set_status("Recording: play your pattern."),
            BeatOutcome::Finished(finalized) => self.finish_take(finalized),
        }
    }

    fn finish_take(&mut self, finalized: Finalized) {
        if finalized.release_metronome {
            self.metronome.stop();
        }
        match finalized.outcome {
            TakeOutcome::Committed { notes, bars } => self.set_status(&format!(
                "Recording finished: {} notes over {} bars.",
                notes, bars
            )),
            TakeOutcome::NothingCaptured => self.set_status("No notes captured. Try again."),
            TakeOutcome::Aborted => self.set_status("Recording cancelled."),
        }
    }

    fn run_task(&mut self, session: SessionToken, task: Task) {
        let Some(current) = self.playback.as_mut() else {
            return;
        };
        if current.token != session {
            return;
        }

        match task {
            Task::Highlight { note, duration_ms } => self.highlights.highlight(note, duration_ms),
            Task::EndCountIn => {
                if current.claim.for_count_in {
                    current.claim.for_count_in = false;
                    self.metronome.stop();
                }
            }
            Task::EndPlayback => {
                let claim = current.claim;
                self.playback = None;
                if claim.is_held() {
                    self.metronome.stop();
                }
                self.highlights.clear();
                self.set_status("Playback finished.");
            }
        }
    }

    fn set_status(&mut self, status: &str) {
        if self.status != status {
            info!(status, "status");
            self.status = status.to_string();
        }
    }
}
