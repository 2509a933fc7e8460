// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Key highlight output.

use tracing::trace;

use crate::music::Pitch;

/// Receives key highlight requests from live play and playback
pub trait HighlightSink {
    /// Light a key for `duration_ms` milliseconds
    fn highlight(&mut self, note: Pitch, duration_ms: u64);

    /// Turn every highlight off
    fn clear(&mut self);
}

/// Sink that only traces requests
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHighlights;

impl HighlightSink for NoHighlights {
    fn highlight(&mut self, note: Pitch, duration_ms: u64) {
        trace!(%note, duration_ms, "highlight");
    }

    fn clear(&mut self) {}
}

/// Convert seconds to whole milliseconds for a highlight
pub fn highlight_millis(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_millis() {
        assert_eq!(highlight_millis(0.6), 600);
        assert_eq!(highlight_millis(-1.0), 0);
        assert_eq!(highlight_millis(0.0004), 0);
    }
}
