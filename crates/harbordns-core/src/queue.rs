//! Debounced action queue
//!
//! Holds at most one pending [`Action`] per record key. A newer action for
//! the same key replaces the older one and restarts its age clock, so a
//! container that flaps add → modify → modify collapses to its latest
//! intent. Actions are released only once they are old enough.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

use crate::action::Action;
use crate::record::RecordKey;

/// Pending actions, keyed by `(hostname, type)`
///
/// Insertion order is kept so release order is deterministic; correctness
/// does not depend on it.
#[derive(Debug, Default)]
pub struct ActionQueue {
    actions: Vec<Action>,
}

impl ActionQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an action, replacing any pending action for the same key
    pub fn enqueue(&mut self, action: Action) {
        let before = self.actions.len();
        self.actions.retain(|pending| pending.key != action.key);
        if self.actions.len() != before {
            debug!("Replacing pending action for {}", action.key);
        }
        self.actions.push(action);
    }

    /// Drop the pending action for `key`, if any
    pub fn cancel(&mut self, key: &RecordKey) -> Option<Action> {
        let index = self.actions.iter().position(|pending| &pending.key == key)?;
        let action = self.actions.remove(index);
        debug!("Cancelled pending action for {}", key);
        Some(action)
    }

    /// Release actions at least `threshold` old, using the wall clock
    pub fn release(&mut self, threshold: Duration) -> Vec<Action> {
        self.release_at(Utc::now(), threshold)
    }

    /// Release actions at least `threshold` old as of `now`
    ///
    /// Released actions are removed from the queue; younger ones stay.
    pub fn release_at(&mut self, now: DateTime<Utc>, threshold: Duration) -> Vec<Action> {
        let threshold = chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::MAX);

        let (ready, waiting): (Vec<Action>, Vec<Action>) = std::mem::take(&mut self.actions)
            .into_iter()
            .partition(|action| action.age_at(now) >= threshold);

        self.actions = waiting;
        ready
    }

    /// Number of pending actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Pending actions in insertion order
    pub fn pending(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }
}
