// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Templates and the practice queue.
//!
//! The queue concatenates saved templates into one cycle and repeats it with
//! an optional pause between repeats.

use serde::{Deserialize, Serialize};

use crate::music::{Note, Pitch};
use crate::sequencer::{sorted_by_time, span, NoteEvent, ONSET_EPSILON};

/// Name given to templates saved without one
pub const UNTITLED_TEMPLATE: &str = "Untitled template";

/// A saved practice pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub events: Vec<NoteEvent>,
    /// Bar-aligned length in seconds; defaults to the latest note end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
}

impl Template {
    /// Create a template; a blank name becomes [`UNTITLED_TEMPLATE`]
    pub fn new(name: &str, events: Vec<NoteEvent>) -> Self {
        let name = name.trim();
        Self {
            name: if name.is_empty() {
                UNTITLED_TEMPLATE.to_string()
            } else {
                name.to_string()
            },
            description: String::new(),
            events,
            length: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Set an explicit length; non-positive values are ignored
    pub fn with_length(mut self, length: Option<f64>) -> Self {
        self.length = length.filter(|l| *l > 0.0 && l.is_finite());
        self
    }

    /// Seconds this template occupies in a cycle
    pub fn span(&self) -> f64 {
        self.length.unwrap_or_else(|| span(&self.events))
    }

    /// Built-in demo: C3 D3 E3 C3, one note every 0.6s
    pub fn demo() -> Self {
        let notes = [
            Pitch::new(Note::C, 3),
            Pitch::new(Note::D, 3),
            Pitch::new(Note::E, 3),
            Pitch::new(Note::C, 3),
        ];
        let events = notes
            .iter()
            .enumerate()
            .map(|(i, note)| NoteEvent::new(*note, i as f64 * 0.6, 0.6))
            .collect();
        Template::new("Demo", events).with_description("C3 D3 E3 C3")
    }
}

/// Beat length implied by a queued cycle.
///
/// The smallest positive gap between onsets; when every onset coincides,
/// the first event's duration. `None` for an empty cycle.
pub fn queue_beat_length(events: &[NoteEvent]) -> Option<f64> {
    let sorted = sorted_by_time(events);
    let first = sorted.first()?;
    sorted
        .windows(2)
        .map(|w| w[1].time - w[0].time)
        .filter(|gap| *gap > ONSET_EPSILON)
        .min_by(|a, b| a.total_cmp(b))
        .or(Some(first.duration))
}

/// Concatenate templates, each shifted by the spans of those before it
pub fn build_cycle<'a, I>(templates: I) -> Vec<NoteEvent>
where
    I: IntoIterator<Item = &'a Template>,
{
    let mut offset = 0.0;
    let mut cycle = Vec::new();
    for template in templates {
        cycle.extend(template.events.iter().map(|e| e.shifted(offset)));
        offset += template.span();
    }
    cycle
}

/// Total span of a cycle built from `templates`
pub fn cycle_span<'a, I>(templates: I) -> f64
where
    I: IntoIterator<Item = &'a Template>,
{
    templates.into_iter().map(Template::span).sum()
}

/// Repeat a cycle `repeats` times with `pause` seconds between repeats
pub fn with_repeats(cycle: &[NoteEvent], cycle_length: f64, repeats: u32, pause: f64) -> Vec<NoteEvent> {
    let stride = cycle_length + pause.max(0.0);
    (0..repeats.max(1))
        .flat_map(|i| cycle.iter().map(move |e| e.shifted(i as f64 * stride)))
        .collect()
}

/// A queued sequence ready for playback
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedSequence {
    pub events: Vec<NoteEvent>,
    /// Beat length the sequence was written at
    pub base_beat_length: f64,
    pub repeats: u32,
}

/// Ordered list of templates with repeat settings
#[derive(Debug, Clone, PartialEq)]
pub struct PracticeQueue {
    entries: Vec<Template>,
    repeats: u32,
    pause_bars: f64,
}

impl PracticeQueue {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            repeats: 1,
            pause_bars: 0.0,
        }
    }

    pub fn add(&mut self, template: Template) {
        self.entries.push(template);
    }

    /// Remove the entry at `index`
    pub fn remove(&mut self, index: usize) -> Option<Template> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    /// Move an entry to a new position
    pub fn move_entry(&mut self, from: usize, to: usize) -> bool {
        if from >= self.entries.len() || to >= self.entries.len() {
            return false;
        }
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[Template] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of cycles played, at least one
    pub fn set_repeats(&mut self, repeats: u32) {
        self.repeats = repeats.max(1);
    }

    pub fn repeats(&self) -> u32 {
        self.repeats
    }

    /// Bars of silence between repeats
    pub fn set_pause_bars(&mut self, bars: f64) {
        self.pause_bars = if bars.is_finite() { bars.max(0.0) } else { 0.0 };
    }

    pub fn pause_bars(&self) -> f64 {
        self.pause_bars
    }

    /// One pass over every entry
    pub fn cycle(&self) -> Vec<NoteEvent> {
        build_cycle(&self.entries)
    }

    /// Template names joined for display
    pub fn names(&self) -> String {
        self.entries
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(" → ")
    }

    /// Full sequence with repeats and pauses, `None` when nothing is queued.
    ///
    /// The pause is measured in bars of the queue's own beat length.
    pub fn sequence(&self, beats_per_bar: u32) -> Option<QueuedSequence> {
        let cycle = self.cycle();
        let base_beat_length = queue_beat_length(&cycle)?;
        let pause = self.pause_bars * base_beat_length * beats_per_bar.max(1) as f64;
        let events = with_repeats(&cycle, cycle_span(&self.entries), self.repeats, pause);
        Some(QueuedSequence {
            events,
            base_beat_length,
            repeats: self.repeats,
        })
    }
}

impl Default for PracticeQueue {
    fn default() -> Self {
        Self::new()
    }
}
