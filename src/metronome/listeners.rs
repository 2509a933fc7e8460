// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Beat listener registry.

use super::BeatEvent;

/// Token returned by [`BeatListeners::subscribe`]; pass it back to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&BeatEvent)>;

/// Ordered list of beat subscribers
#[derive(Default)]
pub struct BeatListeners {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
}

impl BeatListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; it receives every beat until unsubscribed
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&BeatEvent) + 'static,
    {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener; returns false if it was already gone
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Deliver a beat to every listener
    pub fn emit(&mut self, beat: &BeatEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(beat);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for BeatListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeatListeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}
