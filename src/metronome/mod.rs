// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Lookahead metronome.
//!
//! Beat ticks are placed arithmetically on the audio clock, `60 / bpm`
//! seconds apart, and handed to the renderer slightly ahead of time. The
//! coarse periodic pass that drives the scheduler only decides *when* ticks
//! get scheduled, never *where* they land, so timer jitter does not move
//! the audible beat.
//!
//! Each tick is published as a [`BeatEvent`] to subscribed listeners at
//! schedule time, which is up to [`SCHEDULE_AHEAD`] seconds before it sounds.

pub mod listeners;

pub use listeners::{BeatListeners, ListenerId};

use tracing::{debug, info, warn};

use crate::audio::{BusId, ClickSound, Destination, RenderOptions, Tone, ToneRenderer};
use crate::timing::TempoSettings;

/// Period of the lookahead pass in milliseconds
pub const LOOKAHEAD_MS: u64 = 25;

/// How far ahead of the clock ticks are scheduled, in seconds
pub const SCHEDULE_AHEAD: f64 = 0.1;

/// Delay between `start` and the first tick, so it is still schedulable
pub const START_DELAY: f64 = 0.1;

pub const DEFAULT_VOLUME: f32 = 0.9;

/// One scheduled metronome tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEvent {
    /// Clock time at which the tick sounds
    pub time: f64,
    /// True on the first beat of a bar
    pub accent: bool,
    /// Position in the bar, `0..beats_per_bar`
    pub beat_index: u32,
    pub beats_per_bar: u32,
    /// `total_beats / beats_per_bar`
    pub bar: u64,
    /// `total_beats % beats_per_bar`
    pub beat_in_bar: u32,
    /// Ticks scheduled before this one since start
    pub total_beats: u64,
    /// Seconds per beat at this tick
    pub beat_length: f64,
    pub bpm: f64,
}

/// Derived view of the scheduler at a point in time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSnapshot {
    pub bpm: f64,
    pub beats_per_bar: u32,
    pub beat_length_seconds: f64,
    /// Clock time of the first tick
    pub started_at: f64,
    /// Clock time this snapshot describes
    pub reference_time: f64,
    /// Elapsed beats since the first tick (fractional, negative before it)
    pub total_beats: f64,
    pub bar: i64,
    /// Fractional beat within `bar`
    pub beat_position: f64,
    pub last_beat_time: Option<f64>,
    pub next_beat_time: f64,
    /// Ticks scheduled so far
    pub beat_counter: u64,
}

/// Output levels of the two tick kinds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickLevels {
    pub accent: f32,
    pub normal: f32,
}

impl Default for ClickLevels {
    fn default() -> Self {
        Self {
            accent: 0.45,
            normal: 0.28,
        }
    }
}

/// The metronome scheduler
#[derive(Debug)]
pub struct Metronome {
    tempo: TempoSettings,
    running: bool,
    /// Clock time of the next tick to schedule
    next_tick_time: f64,
    /// Beat index of the next tick
    current_beat: u32,
    /// Ticks scheduled since start
    beat_counter: u64,
    started_at: Option<f64>,
    last_beat_time: Option<f64>,
    /// Beat length used for the most recent tick
    beat_length: f64,
    /// Clock time at which the next lookahead pass is due
    next_pass_at: Option<f64>,
    volume: f32,
    levels: ClickLevels,
    sound: ClickSound,
    bus: Option<BusId>,
    listeners: BeatListeners,
}

impl Metronome {
    /// Create a stopped metronome
    pub fn new(tempo: TempoSettings) -> Self {
        Self {
            beat_length: tempo.beat_length(),
            tempo,
            running: false,
            next_tick_time: 0.0,
            current_beat: 0,
            beat_counter: 0,
            started_at: None,
            last_beat_time: None,
            next_pass_at: None,
            volume: DEFAULT_VOLUME,
            levels: ClickLevels::default(),
            sound: ClickSound::default(),
            bus: None,
            listeners: BeatListeners::new(),
        }
    }

    /// Tempo in BPM, clamped
    pub fn bpm(&self) -> f64 {
        self.tempo.bpm()
    }

    /// Beats per bar, clamped
    pub fn beats_per_bar(&self) -> u32 {
        self.tempo.beats_per_bar()
    }

    pub fn tempo(&self) -> &TempoSettings {
        &self.tempo
    }

    /// Live access to the tempo; changes apply from the next tick on
    pub fn tempo_mut(&mut self) -> &mut TempoSettings {
        &mut self.tempo
    }

    /// Beat length of the latest tick, or of the current tempo when stopped
    pub fn beat_length(&self) -> f64 {
        if self.running && self.beat_length > 0.0 {
            self.beat_length
        } else {
            self.tempo.beat_length()
        }
    }

    pub fn is_active(&self) -> bool {
        self.running
    }

    /// Clock time of the first tick of the current run
    pub fn started_at(&self) -> Option<f64> {
        self.started_at
    }

    /// Clock time of the next tick to be scheduled
    pub fn next_tick_time(&self) -> Option<f64> {
        self.running.then_some(self.next_tick_time)
    }

    /// Start ticking. The first tick lands [`START_DELAY`] after `now`.
    ///
    /// Does nothing when already running.
    pub fn start<R: ToneRenderer>(&mut self, now: f64, renderer: &mut R) {
        if self.running {
            return;
        }
        self.ensure_bus(renderer);

        self.current_beat = 0;
        self.beat_counter = 0;
        self.next_tick_time = now + START_DELAY;
        self.started_at = Some(self.next_tick_time);
        self.last_beat_time = None;
        self.beat_length = self.tempo.beat_length();
        self.next_pass_at = Some(now);
        self.running = true;

        info!(bpm = self.bpm(), beats_per_bar = self.beats_per_bar(), "metronome started");
    }

    /// Stop ticking. Ticks already handed to the renderer still sound.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.next_pass_at = None;
        self.last_beat_time = None;
        self.started_at = None;
        self.beat_counter = 0;
        self.current_beat = 0;

        info!("metronome stopped");
    }

    /// Start when stopped, stop when running; returns the new state
    pub fn toggle<R: ToneRenderer>(&mut self, now: f64, renderer: &mut R) -> bool {
        if self.running {
            self.stop();
        } else {
            self.start(now, renderer);
        }
        self.running
    }

    /// Subscribe to beat events
    pub fn add_beat_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&BeatEvent) + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Unsubscribe a listener
    pub fn remove_beat_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Set the metronome bus volume, clamped to [0, 1]
    pub fn set_volume<R: ToneRenderer>(&mut self, volume: f32, now: f64, renderer: &mut R) {
        self.volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        if let Some(bus) = self.bus {
            renderer.set_bus_gain(bus, self.volume, now);
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_levels(&mut self, levels: ClickLevels) {
        self.levels = ClickLevels {
            accent: levels.accent.clamp(0.0, 1.0),
            normal: levels.normal.clamp(0.0, 1.0),
        };
    }

    pub fn levels(&self) -> ClickLevels {
        self.levels
    }

    pub fn set_sound(&mut self, sound: ClickSound) {
        self.sound = sound;
    }

    pub fn sound(&self) -> ClickSound {
        self.sound
    }

    /// Whether the periodic lookahead pass is due at `now`.
    ///
    /// Claims the pass: the next one becomes due [`LOOKAHEAD_MS`] later.
    pub fn begin_pass(&mut self, now: f64) -> bool {
        let Some(due) = self.next_pass_at else {
            return false;
        };
        if !self.running || now < due {
            return false;
        }

        let period = LOOKAHEAD_MS as f64 / 1000.0;
        let mut next = due + period;
        while next <= now {
            next += period;
        }
        self.next_pass_at = Some(next);
        true
    }

    /// Schedule the next tick if it falls inside the lookahead window.
    ///
    /// The tick uses the tempo read right now, is rendered through the
    /// metronome bus and published to listeners before this returns.
    pub fn schedule_next<R: ToneRenderer>(&mut self, now: f64, renderer: &mut R) -> Option<BeatEvent> {
        if !self.running || self.next_tick_time >= now + SCHEDULE_AHEAD {
            return None;
        }

        let bpm = self.bpm();
        let beats_per_bar = self.beats_per_bar();
        let beat_length = 60.0 / bpm;
        let beat_index = self.current_beat % beats_per_bar;
        let total_beats = self.beat_counter;

        let beat = BeatEvent {
            time: self.next_tick_time,
            accent: beat_index == 0,
            beat_index,
            beats_per_bar,
            bar: total_beats / beats_per_bar as u64,
            beat_in_bar: (total_beats % beats_per_bar as u64) as u32,
            total_beats,
            beat_length,
            bpm,
        };

        self.render_tick(&beat, renderer);
        debug!(
            total = beat.total_beats,
            time = beat.time,
            accent = beat.accent,
            "tick scheduled"
        );
        self.listeners.emit(&beat);

        self.next_tick_time += beat_length;
        self.beat_length = beat_length;
        self.last_beat_time = Some(beat.time);
        self.beat_counter = total_beats + 1;
        self.current_beat = (beat_index + 1) % beats_per_bar;

        Some(beat)
    }

    /// One full lookahead pass: schedule every tick inside the window
    pub fn run_pass<R: ToneRenderer>(&mut self, now: f64, renderer: &mut R) -> Vec<BeatEvent> {
        let mut beats = Vec::new();
        while let Some(beat) = self.schedule_next(now, renderer) {
            beats.push(beat);
        }
        beats
    }

    /// Timing view at `reference_time`, `None` when stopped.
    ///
    /// Elapsed beats are computed from the start time and beat length, not
    /// from the tick counter, so the view is consistent between passes.
    pub fn timing_state(&self, reference_time: f64) -> Option<TimingSnapshot> {
        if !self.running {
            return None;
        }
        let started_at = self.started_at?;

        let beat_length = self.beat_length();
        let beats_per_bar = self.beats_per_bar();
        let total_beats = (reference_time - started_at) / beat_length;
        let bar = (total_beats / beats_per_bar as f64).floor();
        let beat_position = total_beats - bar * beats_per_bar as f64;
        let next_beat_time = self
            .last_beat_time
            .map(|last| last + beat_length)
            .unwrap_or(started_at);

        Some(TimingSnapshot {
            bpm: self.bpm(),
            beats_per_bar,
            beat_length_seconds: beat_length,
            started_at,
            reference_time,
            total_beats,
            bar: bar as i64,
            beat_position,
            last_beat_time: self.last_beat_time,
            next_beat_time,
            beat_counter: self.beat_counter,
        })
    }

    fn ensure_bus<R: ToneRenderer>(&mut self, renderer: &mut R) {
        if self.bus.is_some() {
            return;
        }
        match renderer.create_bus(self.volume) {
            Ok(bus) => self.bus = Some(bus),
            Err(err) => warn!(%err, "metronome bus unavailable, ticks go to master"),
        }
    }

    fn render_tick<R: ToneRenderer>(&self, beat: &BeatEvent, renderer: &mut R) {
        let level = if beat.accent {
            self.levels.accent
        } else {
            self.levels.normal
        };
        let tone = Tone::Click {
            accent: beat.accent,
            sound: self.sound,
            level,
        };
        let options = RenderOptions {
            duration: None,
            destination: self.bus.map(Destination::Bus).unwrap_or_default(),
        };
        if let Err(err) = renderer.render(&tone, beat.time, options) {
            warn!(%err, time = beat.time, "tick render failed");
        }
    }
}

impl Default for Metronome {
    fn default() -> Self {
        Self::new(TempoSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MemoryRenderer;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn metronome(bpm: f64, beats: i64) -> Metronome {
        Metronome::new(TempoSettings::new(bpm, beats))
    }

    /// Run passes every 25ms from `from` to `to`
    fn drive(m: &mut Metronome, r: &mut MemoryRenderer, from: f64, to: f64) -> Vec<BeatEvent> {
        let mut beats = Vec::new();
        let mut now = from;
        while now <= to {
            if m.begin_pass(now) {
                beats.extend(m.run_pass(now, r));
            }
            now += 0.025;
        }
        beats
    }

    #[test]
    fn test_start_stop() {
        let mut renderer = MemoryRenderer::new();
        let mut m = metronome(120.0, 4);
        assert!(!m.is_active());
        assert!(m.timing_state(0.0).is_none());

        m.start(1.0, &mut renderer);
        assert!(m.is_active());
        assert_eq!(m.started_at(), Some(1.1));

        // Idempotent start keeps the original origin
        m.start(5.0, &mut renderer);
        assert_eq!(m.started_at(), Some(1.1));

        m.stop();
        m.stop();
        assert!(!m.is_active());
        assert_eq!(m.started_at(), None);
        assert_eq!(m.bpm(), 120.0);
    }

    #[test]
    fn test_ticks_are_exactly_one_beat_apart() {
        let mut renderer = MemoryRenderer::new();
        let mut m = metronome(120.0, 4);
        m.start(0.0, &mut renderer);

        let beats = drive(&mut m, &mut renderer, 0.0, 3.0);
        assert!(beats.len() >= 6);
        for pair in beats.windows(2) {
            assert!((pair[1].time - pair[0].time - 0.5).abs() < 1e-9);
            assert_eq!(pair[1].total_beats, pair[0].total_beats + 1);
        }
        assert_eq!(beats[0].time, 0.1);
    }

    #[test]
    fn test_tempo_accuracy_over_a_minute() {
        for bpm in [30.0, 60.0, 96.0, 120.0, 157.0, 220.0] {
            let mut renderer = MemoryRenderer::new();
            let mut m = metronome(bpm, 4);
            m.start(0.0, &mut renderer);
            let beats = drive(&mut m, &mut renderer, 0.0, 60.0);

            let in_window = beats.iter().filter(|b| b.time < 60.1).count() as f64;
            let expected = (60.0_f64 / (60.0 / bpm)).round();
            assert!((in_window - expected).abs() <= 1.0, "bpm {}: {} beats", bpm, in_window);
        }
    }

    #[test]
    fn test_coarse_passes_do_not_move_ticks() {
        let mut renderer = MemoryRenderer::new();
        let mut m = metronome(100.0, 4);
        m.start(0.0, &mut renderer);

        // Irregular pass times
        let mut beats = Vec::new();
        for now in [0.0, 0.013, 0.61, 0.62, 1.3, 1.95, 2.5] {
            if m.begin_pass(now) {
                beats.extend(m.run_pass(now, &mut renderer));
            }
        }
        for (i, beat) in beats.iter().enumerate() {
            let expected = 0.1 + i as f64 * 0.6;
            assert!((beat.time - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_accent_and_bar_counting() {
        let mut renderer = MemoryRenderer::new();
        let mut m = metronome(120.0, 3);
        m.start(0.0, &mut renderer);
        let beats = drive(&mut m, &mut renderer, 0.0, 3.0);

        for beat in &beats {
            assert_eq!(beat.accent, beat.beat_index == 0);
            assert_eq!(beat.bar, beat.total_beats / 3);
            assert_eq!(beat.beat_in_bar as u64, beat.total_beats % 3);
        }
        assert!(beats[3].accent);

        let clicks = renderer.clicks();
        assert_eq!(clicks.len(), beats.len());
        assert!(matches!(clicks[0].tone, Tone::Click { accent: true, level, .. } if level == 0.45));
        assert!(matches!(clicks[1].tone, Tone::Click { accent: false, level, .. } if level == 0.28));
        assert!(matches!(clicks[0].destination, Destination::Bus(_)));
    }

    #[test]
    fn test_tempo_change_applies_to_next_tick_only() {
        let mut renderer = MemoryRenderer::new();
        let mut m = metronome(120.0, 4);
        m.start(0.0, &mut renderer);
        let first = drive(&mut m, &mut renderer, 0.0, 1.0);
        let last = *first.last().unwrap();

        m.tempo_mut().set_bpm(60.0);
        let more = drive(&mut m, &mut renderer, 1.025, 4.0);
        // The tick after the change was placed with the old beat length
        assert!((more[0].time - (last.time + 0.5)).abs() < 1e-9);
        assert!((more[1].time - more[0].time - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_shrinking_bar_keeps_beat_index_in_range() {
        let mut renderer = MemoryRenderer::new();
        let mut m = metronome(120.0, 6);
        m.start(0.0, &mut renderer);
        drive(&mut m, &mut renderer, 0.0, 2.5);

        m.tempo_mut().set_beats_per_bar(2);
        let beats = drive(&mut m, &mut renderer, 2.525, 5.0);
        for beat in beats {
            assert!(beat.beat_index < 2);
            assert_eq!(beat.beats_per_bar, 2);
        }
    }

    #[test]
    fn test_listeners_see_each_tick_once() {
        let mut renderer = MemoryRenderer::new();
        let mut m = metronome(120.0, 4);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = m.add_beat_listener(move |beat| sink.borrow_mut().push(beat.total_beats));

        m.start(0.0, &mut renderer);
        let beats = drive(&mut m, &mut renderer, 0.0, 2.0);
        assert_eq!(*seen.borrow(), beats.iter().map(|b| b.total_beats).collect::<Vec<_>>());

        assert!(m.remove_beat_listener(id));
        drive(&mut m, &mut renderer, 2.025, 3.0);
        assert_eq!(seen.borrow().len(), beats.len());
    }

    #[test]
    fn test_stop_does_not_cancel_scheduled_clicks() {
        let mut renderer = MemoryRenderer::new();
        let mut m = metronome(120.0, 4);
        m.start(0.0, &mut renderer);
        drive(&mut m, &mut renderer, 0.0, 0.05);
        m.stop();

        let clicks = renderer.clicks();
        assert_eq!(clicks.len(), 1);
        assert_eq!(clicks[0].stopped_at, None);
        assert!(m.schedule_next(0.05, &mut renderer).is_none());
    }

    #[test]
    fn test_timing_state_is_analytic() {
        let mut renderer = MemoryRenderer::new();
        let mut m = metronome(120.0, 4);
        m.start(0.0, &mut renderer);
        drive(&mut m, &mut renderer, 0.0, 1.0);

        let snapshot = m.timing_state(0.1 + 3.7).unwrap();
        assert!((snapshot.total_beats - 7.4).abs() < 1e-9);
        assert_eq!(snapshot.bar, 1);
        assert!((snapshot.beat_position - 3.4).abs() < 1e-9);
        assert_eq!(snapshot.started_at, 0.1);
        assert_eq!(snapshot.beats_per_bar, 4);

        let last = snapshot.last_beat_time.unwrap();
        assert!((snapshot.next_beat_time - (last + 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_timing_state_before_first_tick() {
        let mut renderer = MemoryRenderer::new();
        let mut m = metronome(120.0, 4);
        m.start(0.0, &mut renderer);

        let snapshot = m.timing_state(0.0).unwrap();
        assert!(snapshot.total_beats < 0.0);
        assert_eq!(snapshot.bar, -1);
        assert_eq!(snapshot.last_beat_time, None);
        assert_eq!(snapshot.next_beat_time, 0.1);
    }

    #[test]
    fn test_volume_goes_to_bus() {
        let mut renderer = MemoryRenderer::new();
        let mut m = metronome(120.0, 4);
        m.start(0.0, &mut renderer);

        m.set_volume(1.7, 0.0, &mut renderer);
        assert_eq!(m.volume(), 1.0);
        m.set_volume(0.25, 0.0, &mut renderer);
        assert_eq!(m.volume(), 0.25);
        assert_eq!(renderer.bus_gain(crate::audio::BusId(0)), Some(0.25));

        m.set_volume(f32::NAN, 0.0, &mut renderer);
        assert_eq!(m.volume(), 0.0);
    }

    #[test]
    fn test_toggle() {
        let mut renderer = MemoryRenderer::new();
        let mut m = metronome(120.0, 4);
        assert!(m.toggle(0.0, &mut renderer));
        assert!(!m.toggle(0.1, &mut renderer));
    }
}
