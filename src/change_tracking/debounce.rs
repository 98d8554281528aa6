use std::time::Duration;

use tokio::time::Instant;

use crate::canvas::CanvasElement;

/// Holds the latest scene snapshot until changes stop arriving for `delay`.
///
/// Every `schedule` replaces the pending snapshot and pushes the deadline back,
/// so a burst of edits collapses into one reconcile of the last snapshot.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
    pending: Option<Vec<CanvasElement>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            pending: None,
        }
    }

    pub fn schedule(&mut self, elements: Vec<CanvasElement>) {
        self.pending = Some(elements);
        self.deadline = Some(Instant::now() + self.delay);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Hands out the pending snapshot, if any, and clears the deadline.
    pub fn take(&mut self) -> Option<Vec<CanvasElement>> {
        self.deadline = None;
        self.pending.take()
    }
}
