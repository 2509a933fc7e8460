// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Renderer that writes scheduled tones to the log.

use tracing::{debug, info};

use super::{AudioError, BusId, RenderOptions, Tone, ToneRenderer, Voice};

/// Headless renderer for running the trainer without an audio device
#[derive(Debug, Default)]
pub struct LogRenderer {
    next_voice: u64,
    buses: u32,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Voice that only logs its early stop
#[derive(Debug)]
pub struct LogVoice {
    id: u64,
    stopped: bool,
}

impl Voice for LogVoice {
    fn stop(&mut self, at: f64) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        debug!(voice = self.id, at, "voice stopped");
    }
}

impl ToneRenderer for LogRenderer {
    type Voice = LogVoice;

    fn render(
        &mut self,
        tone: &Tone,
        start_time: f64,
        options: RenderOptions,
    ) -> Result<LogVoice, AudioError> {
        self.next_voice += 1;
        match tone {
            Tone::Note(pitch) => info!(
                voice = self.next_voice,
                note = %pitch,
                start = start_time,
                duration = ?options.duration,
                "note"
            ),
            Tone::Click { accent, sound, .. } => info!(
                voice = self.next_voice,
                accent,
                sound = ?sound,
                start = start_time,
                "tick"
            ),
        }
        Ok(LogVoice {
            id: self.next_voice,
            stopped: false,
        })
    }

    fn create_bus(&mut self, gain: f32) -> Result<BusId, AudioError> {
        self.buses += 1;
        debug!(bus = self.buses - 1, gain, "bus created");
        Ok(BusId(self.buses - 1))
    }

    fn set_bus_gain(&mut self, bus: BusId, gain: f32, at: f64) {
        debug!(bus = bus.0, gain, at, "bus gain");
    }
}
