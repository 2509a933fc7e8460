// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use piano_trainer::audio::{LogRenderer, MemoryRenderer};
use piano_trainer::config::validate_config;
use piano_trainer::metronome::LOOKAHEAD_MS;
use piano_trainer::music::Pitch;
use piano_trainer::playback::PlaybackOptions;
use piano_trainer::recording::{QuantizeMode, RecordingPhase};
use piano_trainer::timing::{
    ClockSource, ManualClock, SystemClock, TempoSettings, DEFAULT_BEATS_PER_BAR, DEFAULT_BPM,
};
use piano_trainer::Trainer;
use tokio::runtime::Builder;
use tokio::time::{interval, MissedTickBehavior};

fn print_usage() {
    println!("piano-trainer - Practice trainer timing core");
    println!();
    println!("Usage: piano-trainer [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --demo                              Simulate a recording session and replay it");
    println!("  --metronome [BPM] [BEATS] [SECONDS] Run the metronome in real time (default 96 4 8)");
    println!("  --config <PATH>                     Load, validate and print a configuration file");
    println!("  --help                              Show this help message");
}

/// Step a simulated session in lookahead-sized increments
fn drive(trainer: &mut Trainer<ManualClock, MemoryRenderer>, clock: &ManualClock, until: f64) {
    let step = LOOKAHEAD_MS as f64 / 1000.0;
    while clock.current_time() + step <= until {
        clock.advance(step);
        trainer.pump();
    }
    clock.set_time(until);
    trainer.pump();
}

async fn run_demo() -> Result<()> {
    let clock = ManualClock::new();
    let renderer = MemoryRenderer::new();
    let mut trainer = Trainer::new(clock.clone(), renderer.clone(), TempoSettings::new(120.0, 4));

    println!("Recording at 120 BPM, 4/4 with a one-bar count-in...");
    if !trainer.start_recording().await {
        return Err(anyhow!("could not start recording: {}", trainer.status()));
    }
    while trainer.recording_phase() != RecordingPhase::Recording {
        drive(&mut trainer, &clock, clock.current_time() + 0.005);
    }
    let start = clock.current_time();

    // Slightly uneven playing
    let played = [("C3", 0.02), ("D3", 0.48), ("E3", 1.03), ("C3", 1.49)];
    for (name, offset) in played {
        drive(&mut trainer, &clock, start + offset);
        let pitch: Pitch = name.parse()?;
        trainer.on_note_triggered(pitch).await;
    }

    drive(&mut trainer, &clock, start + 1.7);
    trainer.stop_recording();
    println!("{}", trainer.status());
    while trainer.recording_phase() != RecordingPhase::Idle {
        drive(&mut trainer, &clock, clock.current_time() + 0.005);
    }
    println!("{}", trainer.status());

    let take = trainer
        .last_recording()
        .context("the demo take was not committed")?;
    println!();
    println!("Captured: {}", trainer.recording_summary());
    for event in &take.events {
        println!("  {:<4} at {:.3}s", event.note.to_string(), event.time);
    }

    trainer.set_quantize_mode(Some(QuantizeMode::Eighth));
    println!("Quantized to eighths:");
    for event in trainer.preview_recording() {
        println!("  {:<4} at {:.3}s", event.note.to_string(), event.time);
    }

    trainer.save_as_template("Demo take");
    println!("{}", trainer.status());

    println!();
    println!("Replaying at 90 BPM...");
    trainer.set_bpm(90.0);
    renderer.clear();
    trainer
        .play_recording(PlaybackOptions::synced().with_count_in(4))
        .await;
    while trainer.is_playing() {
        drive(&mut trainer, &clock, clock.current_time() + 0.05);
    }
    for tone in renderer.notes() {
        if let Some(pitch) = tone.pitch() {
            println!(
                "  {:<4} at {:.3}s for {:.3}s",
                pitch.to_string(),
                tone.start_time,
                tone.duration.unwrap_or_default()
            );
        }
    }
    println!("{}", trainer.status());
    Ok(())
}

async fn run_metronome(bpm: f64, beats: i64, seconds: f64) -> Result<()> {
    let clock = SystemClock::new();
    let mut trainer = Trainer::new(clock.clone(), LogRenderer::new(), TempoSettings::new(bpm, beats));
    trainer.add_beat_listener(|beat| {
        let mark = if beat.accent { "ONE" } else { "   " };
        println!("{} bar {:>3} beat {} at {:.3}s", mark, beat.bar + 1, beat.beat_in_bar + 1, beat.time);
    });

    if !trainer.start_metronome().await {
        return Err(anyhow!("audio clock unavailable"));
    }
    println!(
        "Metronome at {} BPM, {} beats per bar for {}s",
        trainer.metronome().bpm(),
        trainer.metronome().beats_per_bar(),
        seconds
    );

    let mut ticker = interval(Duration::from_millis(LOOKAHEAD_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Clock time zero is when the clock was created
    let deadline = tokio::time::Instant::now() + clock.until(seconds);
    while tokio::time::Instant::now() < deadline {
        ticker.tick().await;
        trainer.pump();
    }

    trainer.stop_metronome();
    clock.close();
    println!("Metronome stopped");
    Ok(())
}

/// Parse a run length in seconds; must be finite and positive
fn parse_seconds(arg: &str) -> Result<f64> {
    let seconds: f64 = arg
        .parse()
        .map_err(|_| anyhow!("Invalid duration: {}", arg))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(anyhow!("Invalid duration: {} (expected a positive number of seconds)", arg));
    }
    Ok(seconds)
}

fn show_config(path: &str) -> Result<()> {
    let config = validate_config(path)?;
    println!("Configuration {} is valid", path);
    println!();
    print!("{}", config.to_yaml()?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("piano-trainer - Practice trainer timing core");
        println!("Run with --help for usage information");
        return Ok(());
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    match args[1].as_str() {
        "--demo" => {
            runtime.block_on(run_demo())?;
        }
        "--metronome" => {
            let bpm: f64 = match args.get(2) {
                Some(arg) => arg
                    .parse()
                    .map_err(|_| anyhow!("Invalid BPM: {}", arg))?,
                None => DEFAULT_BPM,
            };
            let beats: i64 = match args.get(3) {
                Some(arg) => arg
                    .parse()
                    .map_err(|_| anyhow!("Invalid beats per bar: {}", arg))?,
                None => DEFAULT_BEATS_PER_BAR as i64,
            };
            let seconds = match args.get(4) {
                Some(arg) => parse_seconds(arg)?,
                None => 8.0,
            };
            runtime.block_on(run_metronome(bpm, beats, seconds))?;
        }
        "--config" => {
            if args.len() < 3 {
                eprintln!("Error: --config requires a file path");
                std::process::exit(1);
            }
            show_config(&args[2])?;
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
