// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Integration tests for the practice trainer
//!
//! These tests drive a whole session on a manual clock and check what the
//! renderer was asked to play.

use std::cell::RefCell;
use std::rc::Rc;

use piano_trainer::audio::MemoryRenderer;
use piano_trainer::config::TrainerConfig;
use piano_trainer::metronome::BeatEvent;
use piano_trainer::music::Pitch;
use piano_trainer::playback::{PlaybackOptions, Template};
use piano_trainer::recording::{QuantizeMode, RecordingPhase};
use piano_trainer::sequencer::NoteEvent;
use piano_trainer::timing::{ClockSource, ManualClock, TempoSettings};
use piano_trainer::Trainer;

type TestTrainer = Trainer<ManualClock, MemoryRenderer>;

const STEP: f64 = 0.025;

fn session(bpm: f64, beats: i64) -> (TestTrainer, ManualClock, MemoryRenderer) {
    let clock = ManualClock::new();
    let renderer = MemoryRenderer::new();
    let trainer = Trainer::new(
        clock.clone(),
        renderer.clone(),
        TempoSettings::new(bpm, beats),
    );
    (trainer, clock, renderer)
}

/// Pump at 25ms intervals up to `until`, then once at `until`
fn run_until(trainer: &mut TestTrainer, clock: &ManualClock, until: f64) {
    while clock.current_time() + STEP < until {
        clock.advance(STEP);
        trainer.pump();
    }
    clock.set_time(until);
    trainer.pump();
}

fn pitch(name: &str) -> Pitch {
    name.parse().unwrap()
}

fn record_beats(trainer: &mut TestTrainer) -> Rc<RefCell<Vec<BeatEvent>>> {
    let beats = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&beats);
    trainer.add_beat_listener(move |beat| sink.borrow_mut().push(*beat));
    beats
}

/// 120 BPM 4/4: count-in from the first downbeat, four notes, stop at 1.7s
#[tokio::test]
async fn test_end_to_end_bar_aligned_take() {
    let (mut trainer, clock, _renderer) = session(120.0, 4);
    let beats = record_beats(&mut trainer);

    assert!(trainer.start_recording().await);
    assert_eq!(trainer.recording_phase(), RecordingPhase::CountIn);

    // Downbeat at 0.1, count-in bar ends with capture beat zero at 2.1
    run_until(&mut trainer, &clock, 2.05);
    assert_eq!(trainer.recording_phase(), RecordingPhase::Recording);
    let start = 2.1;

    for (i, name) in ["C3", "D3", "E3", "F3"].iter().enumerate() {
        run_until(&mut trainer, &clock, start + i as f64 * 0.5);
        assert!(trainer.on_note_triggered(pitch(name)).await);
    }

    run_until(&mut trainer, &clock, start + 1.7);
    assert!(trainer.stop_recording());
    assert_eq!(trainer.recording_phase(), RecordingPhase::Recording);
    assert!(trainer.recorder().is_stop_pending());

    // The closing bar line is at start + 2.0
    run_until(&mut trainer, &clock, start + 1.85);
    assert_eq!(trainer.recording_phase(), RecordingPhase::Recording);
    run_until(&mut trainer, &clock, start + 1.95);
    assert_eq!(trainer.recording_phase(), RecordingPhase::Idle);
    assert!(!trainer.metronome().is_active());

    let take = trainer.last_recording().unwrap();
    assert_eq!(take.events.len(), 4);
    assert_eq!(take.bars, 1);
    for (i, event) in take.events.iter().enumerate() {
        assert!((event.time - i as f64 * 0.5).abs() < 1e-9);
        assert_eq!(event.duration, 0.6);
    }
    let last = take.beat_timeline.last().unwrap();
    assert_eq!(last.total_beats % 4, 0);
    assert!((last.time - (start + 2.0)).abs() < 1e-9);
    assert_eq!(take.timing.unwrap().beat_length_seconds, 0.5);
    assert_eq!(trainer.recording_summary(), "C3 | D3 | E3 | F3");

    // Listeners saw every tick in order, one beat apart
    let beats = beats.borrow();
    assert_eq!(beats.first().unwrap().time, 0.1);
    for pair in beats.windows(2) {
        assert_eq!(pair[1].total_beats, pair[0].total_beats + 1);
        assert!((pair[1].time - pair[0].time - 0.5).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_bar_aligned_stop_for_every_meter() {
    for beats_per_bar in [1, 3, 4, 7] {
        for stop_after in [0.2, 1.3, 2.9] {
            let (mut trainer, clock, _renderer) = session(150.0, beats_per_bar);
            trainer.start_recording().await;
            while trainer.recording_phase() != RecordingPhase::Recording {
                run_until(&mut trainer, &clock, clock.current_time() + STEP);
            }
            trainer.on_note_triggered(pitch("A3")).await;
            let stop_at = clock.current_time() + stop_after;
            run_until(&mut trainer, &clock, stop_at);
            trainer.stop_recording();
            run_until(&mut trainer, &clock, stop_at + 6.0);

            let take = trainer.last_recording().unwrap();
            let last = take.beat_timeline.last().unwrap();
            assert_eq!(last.total_beats % beats_per_bar as u64, 0);
            assert!(take.bars >= 1, "{}/{}", beats_per_bar, stop_after);
        }
    }
}

/// Slowing down mid-take must not close the take on a bar line already past
#[tokio::test]
async fn test_stop_after_tempo_change_closes_on_a_future_bar() {
    let (mut trainer, clock, _renderer) = session(120.0, 4);
    trainer.start_recording().await;
    let start = 2.1;
    for i in 0..12 {
        run_until(&mut trainer, &clock, start + i as f64 * 0.5);
        trainer.on_note_triggered(pitch("C3")).await;
    }
    // Beat 16 at 8.1 is scheduled at the new tempo, one second long
    trainer.set_bpm(60.0);
    let stop_at = 8.3;
    run_until(&mut trainer, &clock, stop_at);
    assert!(trainer.stop_recording());
    assert_eq!(trainer.recorder().stop_target_beat(), Some(20.0));
    assert_eq!(trainer.recording_phase(), RecordingPhase::Recording);

    run_until(&mut trainer, &clock, 12.5);
    assert_eq!(trainer.recording_phase(), RecordingPhase::Idle);

    let take = trainer.last_recording().unwrap();
    assert_eq!(take.events.len(), 12);
    assert_eq!(take.bars, 4);
    let last = take.beat_timeline.last().unwrap();
    assert_eq!(last.total_beats, 20);
    assert!(last.time > stop_at);
    let length = take.length().unwrap();
    assert!((length - 10.0).abs() < 1e-9);
    assert!(take.events.iter().all(|e| e.time < length));

    trainer.save_as_template("Slowing down");
    let template = trainer.template("Slowing down").unwrap();
    assert!(template.events.iter().all(|e| e.time < template.span()));
}

#[tokio::test]
async fn test_empty_take_is_discarded() {
    let (mut trainer, clock, _renderer) = session(120.0, 4);
    trainer.start_recording().await;
    run_until(&mut trainer, &clock, 2.5);
    trainer.stop_recording();
    run_until(&mut trainer, &clock, 4.5);

    assert_eq!(trainer.recording_phase(), RecordingPhase::Idle);
    assert!(trainer.last_recording().is_none());
    assert_eq!(trainer.status(), "No notes captured. Try again.");
    assert!(!trainer.metronome().is_active());
}

#[tokio::test]
async fn test_unavailable_backend() {
    let clock = ManualClock::unavailable();
    let renderer = MemoryRenderer::new();
    let mut trainer = Trainer::new(clock, renderer.clone(), TempoSettings::default());

    assert!(!trainer.start_recording().await);
    let demo = Template::demo();
    assert!(
        !trainer
            .play_sequence(&demo.events, "demo", PlaybackOptions::default())
            .await
    );
    assert!(renderer.tones().is_empty());
    assert_eq!(trainer.status(), "Audio is not available.");
}

#[tokio::test]
async fn test_single_flight_playback() {
    let (mut trainer, clock, renderer) = session(120.0, 4);
    let demo = Template::demo();

    for round in 0..3 {
        assert!(
            trainer
                .play_sequence(&demo.events, "demo", PlaybackOptions::default())
                .await
        );
        run_until(&mut trainer, &clock, clock.current_time() + 0.3 + round as f64 * 0.1);
    }
    let restart = clock.current_time();
    trainer
        .play_sequence(&demo.events, "last", PlaybackOptions::default())
        .await;

    let notes = renderer.notes();
    let (old, new) = notes.split_at(notes.len() - 4);
    assert!(old.iter().all(|n| !n.sounds_after(restart)));
    assert!(new.iter().all(|n| n.stopped_at.is_none()));

    run_until(&mut trainer, &clock, restart + 3.0);
    assert!(!trainer.is_playing());
    assert_eq!(trainer.status(), "Playback finished.");
}

#[tokio::test]
async fn test_render_failure_does_not_stop_playback() {
    let (mut trainer, clock, renderer) = session(120.0, 4);
    renderer.fail_on(pitch("E3"));
    let events = vec![
        NoteEvent::new(pitch("C3"), 0.0, 0.4),
        NoteEvent::new(pitch("E3"), 0.5, 0.4),
        NoteEvent::new(pitch("G3"), 1.0, 0.4),
    ];
    assert!(
        trainer
            .play_sequence(&events, "arpeggio", PlaybackOptions::default())
            .await
    );
    assert_eq!(renderer.notes().len(), 2);
    run_until(&mut trainer, &clock, 2.0);
    assert!(!trainer.is_playing());
}

#[tokio::test]
async fn test_quantized_replay_at_new_tempo() {
    let (mut trainer, clock, renderer) = session(120.0, 4);
    trainer.start_recording().await;
    run_until(&mut trainer, &clock, 2.1);
    for offset in [0.03, 0.52, 0.98] {
        run_until(&mut trainer, &clock, 2.1 + offset);
        trainer.on_note_triggered(pitch("C4")).await;
    }
    trainer.stop_recording();
    run_until(&mut trainer, &clock, 4.2);

    trainer.set_quantize_mode(Some(QuantizeMode::Quarter));
    let preview: Vec<f64> = trainer.preview_recording().iter().map(|e| e.time).collect();
    assert_eq!(preview, vec![0.0, 0.5, 1.0]);

    // Half the tempo: onsets one second apart
    trainer.set_bpm(60.0);
    renderer.clear();
    assert!(trainer.play_recording(PlaybackOptions::synced()).await);
    let notes = renderer.notes();
    let starts: Vec<f64> = notes.iter().map(|n| n.start_time).collect();
    assert!((starts[1] - starts[0] - 1.0).abs() < 1e-9);
    assert!((starts[2] - starts[0] - 2.0).abs() < 1e-9);
    // Only onsets move; the last note keeps its captured length
    assert_eq!(notes[2].duration, Some(0.6));
    assert!(trainer.metronome().is_active());

    run_until(&mut trainer, &clock, clock.current_time() + 4.0);
    assert!(!trainer.metronome().is_active());
}

#[tokio::test]
async fn test_practice_queue_from_config() {
    let yaml = r#"
bpm: 100
playback:
  repeats: 2
  pause_bars: 1
templates:
  - name: "Steps"
    events:
      - { note: C3, time: 0.0, duration: 0.3 }
      - { note: D3, time: 0.5, duration: 0.3 }
"#;
    let config = TrainerConfig::from_yaml(yaml).unwrap();
    let clock = ManualClock::new();
    let renderer = MemoryRenderer::new();
    let mut trainer = Trainer::with_config(clock.clone(), renderer.clone(), &config);

    assert_eq!(trainer.templates().len(), 2);
    assert!(trainer.enqueue_template("Steps"));
    assert!(trainer.enqueue_template("Demo"));
    assert!(trainer.play_queue(PlaybackOptions::default()).await);

    // Steps spans 0.8s and Demo 2.4s. The smallest onset gap is 0.3s, so the
    // one-bar pause is 1.2s and the second pass starts at 4.4s
    let starts: Vec<f64> = renderer.notes().iter().map(|n| n.start_time - 0.08).collect();
    assert_eq!(starts.len(), 12);
    assert!((starts[2] - 0.8).abs() < 1e-9);
    assert!((starts[6] - 4.4).abs() < 1e-9);

    run_until(&mut trainer, &clock, 12.0);
    assert!(!trainer.is_playing());
}
