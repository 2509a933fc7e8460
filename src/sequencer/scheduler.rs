// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Deferred task queue with session-scoped cancellation.
//!
//! Every delayed unit of work (highlight, metronome auto-stop, end of
//! playback) is registered under the [`SessionToken`] of the session that
//! created it. Cancelling a session drops all of its tasks at once.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Identifies the session a task belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionToken(u64);

/// A task waiting for its due time
#[derive(Debug, Clone)]
pub struct ScheduledTask<T> {
    /// Clock time at which the task fires
    pub due: f64,
    pub session: SessionToken,
    pub task: T,
    /// Insertion order, breaks ties between equal due times
    seq: u64,
}

// For BinaryHeap - we want earliest due time first
impl<T> Eq for ScheduledTask<T> {}

impl<T> PartialEq for ScheduledTask<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Ord for ScheduledTask<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T> PartialOrd for ScheduledTask<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of deferred tasks
#[derive(Debug)]
pub struct TaskQueue<T> {
    queue: BinaryHeap<ScheduledTask<T>>,
    next_session: u64,
    next_seq: u64,
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::with_capacity(64),
            next_session: 0,
            next_seq: 0,
        }
    }

    /// Open a new session for grouping tasks
    pub fn open_session(&mut self) -> SessionToken {
        self.next_session += 1;
        SessionToken(self.next_session)
    }

    /// Schedule a task under a session
    pub fn schedule(&mut self, session: SessionToken, due: f64, task: T) {
        self.next_seq += 1;
        self.queue.push(ScheduledTask {
            due,
            session,
            task,
            seq: self.next_seq,
        });
    }

    /// Drop every pending task of a session; returns how many were dropped
    pub fn cancel(&mut self, session: SessionToken) -> usize {
        let before = self.queue.len();
        self.queue.retain(|t| t.session != session);
        before - self.queue.len()
    }

    /// Pop the earliest task if it is due at `now`
    pub fn pop_due(&mut self, now: f64) -> Option<ScheduledTask<T>> {
        match self.queue.peek() {
            Some(task) if task.due <= now => self.queue.pop(),
            _ => None,
        }
    }

    /// Pop all tasks due at `now`, earliest first
    pub fn drain_due(&mut self, now: f64) -> Vec<ScheduledTask<T>> {
        let mut due = Vec::new();
        while let Some(task) = self.pop_due(now) {
            due.push(task);
        }
        due
    }

    /// Due time of the earliest pending task
    pub fn next_due(&self) -> Option<f64> {
        self.queue.peek().map(|t| t.due)
    }

    /// Number of pending tasks of a session
    pub fn pending(&self, session: SessionToken) -> usize {
        self.queue.iter().filter(|t| t.session == session).count()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_creation() {
        let queue: TaskQueue<&str> = TaskQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.next_due(), None);
    }

    #[test]
    fn test_task_ordering() {
        let mut queue = TaskQueue::new();
        let session = queue.open_session();

        // Schedule tasks out of order
        queue.schedule(session, 2.0, "c");
        queue.schedule(session, 0.5, "a");
        queue.schedule(session, 1.0, "b");

        let tasks = queue.drain_due(10.0);
        let order: Vec<_> = tasks.iter().map(|t| t.task).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_equal_due_times_keep_insertion_order() {
        let mut queue = TaskQueue::new();
        let session = queue.open_session();
        queue.schedule(session, 1.0, 1);
        queue.schedule(session, 1.0, 2);
        queue.schedule(session, 1.0, 3);

        let order: Vec<_> = queue.drain_due(1.0).into_iter().map(|t| t.task).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_pop_due_respects_time() {
        let mut queue = TaskQueue::new();
        let session = queue.open_session();
        queue.schedule(session, 1.0, "later");

        assert!(queue.pop_due(0.5).is_none());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_due(1.0).map(|t| t.task), Some("later"));
    }

    #[test]
    fn test_cancel_session_is_all_or_nothing() {
        let mut queue = TaskQueue::new();
        let old = queue.open_session();
        let new = queue.open_session();
        assert_ne!(old, new);

        queue.schedule(old, 1.0, "old-1");
        queue.schedule(old, 2.0, "old-2");
        queue.schedule(new, 1.5, "new");

        assert_eq!(queue.cancel(old), 2);
        assert_eq!(queue.pending(old), 0);
        assert_eq!(queue.pending(new), 1);

        let remaining: Vec<_> = queue.drain_due(10.0).into_iter().map(|t| t.task).collect();
        assert_eq!(remaining, vec!["new"]);
    }
}
