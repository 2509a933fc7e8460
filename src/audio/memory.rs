// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! In-memory renderer.
//!
//! Records every scheduled tone and every early stop instead of producing
//! sound. Clones share the same log, so a test can keep one handle while the
//! trainer owns another.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use super::{AudioError, BusId, Destination, RenderOptions, Tone, ToneRenderer, Voice};
use crate::music::Pitch;

/// One tone handed to the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTone {
    pub tone: Tone,
    pub start_time: f64,
    pub duration: Option<f64>,
    pub destination: Destination,
    /// Clock time of the first early stop, if any
    pub stopped_at: Option<f64>,
}

impl RenderedTone {
    /// The pitch, for note tones
    pub fn pitch(&self) -> Option<Pitch> {
        match self.tone {
            Tone::Note(pitch) => Some(pitch),
            Tone::Click { .. } => None,
        }
    }

    pub fn is_click(&self) -> bool {
        matches!(self.tone, Tone::Click { .. })
    }

    /// When the tone falls silent, taking early stops into account
    pub fn end_time(&self) -> Option<f64> {
        let natural = self.duration.map(|d| self.start_time + d);
        match (natural, self.stopped_at) {
            (Some(end), Some(stop)) => Some(end.min(stop)),
            (None, Some(stop)) => Some(stop),
            (end, None) => end,
        }
    }

    /// Whether any of this tone is audible after `time`
    pub fn sounds_after(&self, time: f64) -> bool {
        if let Some(stop) = self.stopped_at {
            if stop <= time || stop <= self.start_time {
                return false;
            }
        }
        match self.end_time() {
            Some(end) => end > time,
            None => true,
        }
    }
}

#[derive(Debug, Default)]
struct Log {
    tones: Vec<RenderedTone>,
    buses: Vec<f32>,
    failing: HashSet<Pitch>,
}

/// Renderer that keeps a log of what it was asked to play
#[derive(Debug, Clone, Default)]
pub struct MemoryRenderer {
    log: Rc<RefCell<Log>>,
}

impl MemoryRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every render of `pitch` fail
    pub fn fail_on(&self, pitch: Pitch) {
        self.log.borrow_mut().failing.insert(pitch);
    }

    /// Everything rendered so far
    pub fn tones(&self) -> Vec<RenderedTone> {
        self.log.borrow().tones.clone()
    }

    /// Rendered note tones in render order
    pub fn notes(&self) -> Vec<RenderedTone> {
        self.log
            .borrow()
            .tones
            .iter()
            .filter(|t| !t.is_click())
            .cloned()
            .collect()
    }

    /// Rendered metronome clicks in render order
    pub fn clicks(&self) -> Vec<RenderedTone> {
        self.log
            .borrow()
            .tones
            .iter()
            .filter(|t| t.is_click())
            .cloned()
            .collect()
    }

    /// Current gain of a bus
    pub fn bus_gain(&self, bus: BusId) -> Option<f32> {
        self.log.borrow().buses.get(bus.0 as usize).copied()
    }

    /// Forget all rendered tones
    pub fn clear(&self) {
        self.log.borrow_mut().tones.clear();
    }
}

/// Voice handle into the shared log
#[derive(Debug, Clone)]
pub struct MemoryVoice {
    log: Rc<RefCell<Log>>,
    index: usize,
}

impl Voice for MemoryVoice {
    fn stop(&mut self, at: f64) {
        let mut log = self.log.borrow_mut();
        if let Some(tone) = log.tones.get_mut(self.index) {
            if tone.stopped_at.is_none() {
                tone.stopped_at = Some(at);
            }
        }
    }
}

impl ToneRenderer for MemoryRenderer {
    type Voice = MemoryVoice;

    fn render(
        &mut self,
        tone: &Tone,
        start_time: f64,
        options: RenderOptions,
    ) -> Result<MemoryVoice, AudioError> {
        let mut log = self.log.borrow_mut();
        if let Tone::Note(pitch) = tone {
            if log.failing.contains(pitch) {
                return Err(AudioError::Render {
                    tone: pitch.to_string(),
                    reason: "sample unavailable".into(),
                });
            }
        }

        log.tones.push(RenderedTone {
            tone: *tone,
            start_time,
            duration: options.duration,
            destination: options.destination,
            stopped_at: None,
        });

        Ok(MemoryVoice {
            log: Rc::clone(&self.log),
            index: log.tones.len() - 1,
        })
    }

    fn create_bus(&mut self, gain: f32) -> Result<BusId, AudioError> {
        let mut log = self.log.borrow_mut();
        log.buses.push(gain);
        Ok(BusId(log.buses.len() as u32 - 1))
    }

    fn set_bus_gain(&mut self, bus: BusId, gain: f32, _at: f64) {
        if let Some(slot) = self.log.borrow_mut().buses.get_mut(bus.0 as usize) {
            *slot = gain;
        }
    }
}
