// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio clock sources.
//!
//! The trainer never reads wall-clock time directly. Every timestamp comes
//! from a [`ClockSource`], which models an audio device clock: monotonic
//! seconds plus a suspend/resume lifecycle. [`SystemClock`] follows
//! `Instant`; [`ManualClock`] is advanced by hand for simulations and tests.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::audio::AudioError;

/// Lifecycle of an audio clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    /// Time is advancing and sounds can be scheduled
    Running,
    /// Created but not yet resumed
    Suspended,
    /// The backend is gone; the clock cannot be resumed
    Closed,
}

/// A monotonic audio clock
#[allow(async_fn_in_trait)]
pub trait ClockSource {
    /// Current clock time in seconds
    fn current_time(&self) -> f64;

    /// Current lifecycle state
    fn state(&self) -> ClockState;

    /// Bring a suspended clock into the running state
    async fn resume(&self) -> Result<(), AudioError>;
}

/// Clock backed by `Instant`, starting suspended like a fresh audio device
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
    state: Rc<Cell<ClockState>>,
}

impl SystemClock {
    /// Create a suspended system clock
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Rc::new(Cell::new(ClockState::Suspended)),
        }
    }

    /// Close the clock; later resumes fail
    pub fn close(&self) {
        self.state.set(ClockState::Closed);
    }

    /// Wall-clock duration until the given clock time, saturating at
    /// `Duration::MAX` for times too far out to represent
    pub fn until(&self, time: f64) -> Duration {
        let seconds = (time - self.current_time()).max(0.0);
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for SystemClock {
    fn current_time(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn state(&self) -> ClockState {
        self.state.get()
    }

    async fn resume(&self) -> Result<(), AudioError> {
        match self.state.get() {
            ClockState::Closed => Err(AudioError::Unavailable("audio clock is closed".into())),
            _ => {
                self.state.set(ClockState::Running);
                Ok(())
            }
        }
    }
}

/// Hand-driven clock; clones share the same time and state
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
    state: Rc<Cell<ClockState>>,
}

impl ManualClock {
    /// Create a suspended clock at time zero
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(0.0)),
            state: Rc::new(Cell::new(ClockState::Suspended)),
        }
    }

    /// Create a clock whose backend is unavailable
    pub fn unavailable() -> Self {
        let clock = Self::new();
        clock.state.set(ClockState::Closed);
        clock
    }

    /// Move the clock forward; time never runs backwards
    pub fn advance(&self, seconds: f64) {
        if seconds > 0.0 {
            self.now.set(self.now.get() + seconds);
        }
    }

    /// Jump to an absolute time if it lies in the future
    pub fn set_time(&self, seconds: f64) {
        if seconds > self.now.get() {
            self.now.set(seconds);
        }
    }

    /// Force the lifecycle state
    pub fn set_state(&self, state: ClockState) {
        self.state.set(state);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for ManualClock {
    fn current_time(&self) -> f64 {
        self.now.get()
    }

    fn state(&self) -> ClockState {
        self.state.get()
    }

    async fn resume(&self) -> Result<(), AudioError> {
        match self.state.get() {
            ClockState::Closed => Err(AudioError::Unavailable("audio backend not available".into())),
            _ => {
                self.state.set(ClockState::Running);
                Ok(())
            }
        }
    }
}
