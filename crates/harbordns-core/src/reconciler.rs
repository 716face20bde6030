//! Snapshot diffing
//!
//! The reconciler compares two consecutive discovery snapshots and queues
//! one action per changed key. It never talks to the provider; it only
//! records intent. The previous snapshot is owned by the caller and passed
//! in, so [`diff`] is a plain function of its inputs.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::action::{Action, ActionKind};
use crate::config::RecordDefaults;
use crate::error::Result;
use crate::queue::ActionQueue;
use crate::record::{DesiredRecord, FieldSet, RecordKey};

/// Desired state at one point in time, keyed by `(hostname, type)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    records: BTreeMap<RecordKey, FieldSet>,
}

impl Snapshot {
    /// Build a snapshot from discovered descriptors
    ///
    /// Descriptors without a hostname or type are dropped. When a key
    /// repeats, the last descriptor wins.
    pub fn from_records<'a, I>(records: I, defaults: &RecordDefaults) -> Self
    where
        I: IntoIterator<Item = &'a DesiredRecord>,
    {
        let mut map = BTreeMap::new();
        for record in records {
            let Some(key) = record.key() else {
                debug!(
                    "Ignoring descriptor without hostname or type (origin: {})",
                    record.origin.as_deref().unwrap_or("unknown")
                );
                continue;
            };
            map.insert(key, record.fields(defaults));
        }
        Self { records: map }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &RecordKey) -> Option<&FieldSet> {
        self.records.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecordKey, &FieldSet)> {
        self.records.iter()
    }

    /// Roll one key back to the state an action started from
    ///
    /// After a failed apply, the next diff against this snapshot emits the
    /// same change again.
    pub fn revert(&mut self, action: &Action) {
        match &action.kind {
            ActionKind::Add { .. } => {
                self.records.remove(&action.key);
            }
            ActionKind::Modify { previous, .. } | ActionKind::Delete { previous } => {
                self.records.insert(action.key.clone(), previous.clone());
            }
        }
    }
}

/// Counts of what a diff queued
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
    /// Changes that could not be turned into a valid action
    pub rejected: usize,
}

impl DiffSummary {
    /// Whether any change was detected
    pub fn has_changes(&self) -> bool {
        self.added + self.modified + self.deleted + self.rejected > 0
    }

    /// Number of actions queued
    pub fn queued(&self) -> usize {
        self.added + self.modified + self.deleted
    }
}

/// Diff two snapshots and queue the resulting actions
///
/// With no previous snapshot every current record is an Add. Records only
/// in `previous` become Deletes, records whose comparison fields differ
/// become Modifies.
pub fn diff(
    previous: Option<&Snapshot>,
    current: &Snapshot,
    now: DateTime<Utc>,
    queue: &mut ActionQueue,
) -> DiffSummary {
    let mut summary = DiffSummary::default();

    let Some(previous) = previous else {
        info!(
            "No previous snapshot; treating all {} record(s) as new",
            current.len()
        );
        for (key, fields) in current.iter() {
            queue_built(key, Action::add(key.clone(), fields, now), queue, &mut summary);
        }
        return summary;
    };

    for (key, fields) in current.iter() {
        match previous.get(key) {
            None => {
                queue_built(key, Action::add(key.clone(), fields, now), queue, &mut summary);
            }
            Some(old) if old != fields => {
                queue_built(
                    key,
                    Action::modify(key.clone(), fields, old.clone(), now),
                    queue,
                    &mut summary,
                );
            }
            Some(_) => {}
        }
    }

    for (key, old) in previous.iter() {
        if current.get(key).is_none() {
            queue_built(
                key,
                Ok(Action::delete(key.clone(), old.clone(), now)),
                queue,
                &mut summary,
            );
        }
    }

    summary
}

fn queue_built(
    key: &RecordKey,
    action: Result<Action>,
    queue: &mut ActionQueue,
    summary: &mut DiffSummary,
) {
    match action {
        Ok(action) => {
            info!("Queued {}", action);
            match action.kind {
                ActionKind::Add { .. } => summary.added += 1,
                ActionKind::Modify { .. } => summary.modified += 1,
                ActionKind::Delete { .. } => summary.deleted += 1,
            }
            queue.enqueue(action);
        }
        Err(e) => {
            // An older intent for this key is stale now
            if queue.cancel(key).is_some() {
                warn!("Rejected change for {}: {}; dropped its pending action", key, e);
            } else {
                warn!("Rejected change for {}: {}", key, e);
            }
            summary.rejected += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(records: &[DesiredRecord]) -> Snapshot {
        Snapshot::from_records(records, &RecordDefaults::default())
    }

    fn cname(hostname: &str, target: &str) -> DesiredRecord {
        DesiredRecord::new(hostname, "CNAME").with_target(target)
    }

    #[test]
    fn identical_snapshots_produce_nothing() {
        let s = snapshot(&[cname("a.example.com", "x"), cname("b.example.com", "y")]);
        let mut queue = ActionQueue::new();

        let summary = diff(Some(&s), &s, Utc::now(), &mut queue);
        assert!(!summary.has_changes());
        assert!(queue.is_empty());
    }

    #[test]
    fn first_cycle_adds_each_distinct_key_once() {
        let s = snapshot(&[
            cname("a.example.com", "x"),
            cname("a.example.com", "y"),
            cname("b.example.com", "x"),
        ]);
        let mut queue = ActionQueue::new();

        let summary = diff(None, &s, Utc::now(), &mut queue);
        assert_eq!(summary.added, 2);
        assert_eq!(queue.len(), 2);
        assert!(
            queue
                .pending()
                .all(|a| matches!(a.kind, ActionKind::Add { .. }))
        );
    }

    #[test]
    fn duplicate_keys_last_writer_wins() {
        let s = snapshot(&[cname("a.example.com", "x"), cname("A.example.com", "y")]);
        assert_eq!(s.len(), 1);
        let key = RecordKey::new("a.example.com", "CNAME").unwrap();
        assert_eq!(s.get(&key).unwrap().target, "y");
    }

    #[test]
    fn descriptors_without_key_are_ignored() {
        let s = snapshot(&[
            DesiredRecord {
                hostname: Some("a.example.com".to_string()),
                ..DesiredRecord::default()
            },
            DesiredRecord::default(),
        ]);
        assert!(s.is_empty());
    }

    #[test]
    fn added_modified_and_deleted_keys() {
        let prev = snapshot(&[
            cname("keep.example.com", "x"),
            cname("gone.example.com", "x"),
            cname("moved.example.com", "x"),
        ]);
        let curr = snapshot(&[
            cname("keep.example.com", "x"),
            cname("moved.example.com", "y"),
            cname("new.example.com", "x"),
        ]);
        let mut queue = ActionQueue::new();

        let summary = diff(Some(&prev), &curr, Utc::now(), &mut queue);
        assert_eq!(
            summary,
            DiffSummary {
                added: 1,
                modified: 1,
                deleted: 1,
                rejected: 0
            }
        );

        for action in queue.pending() {
            match (action.hostname(), &action.kind) {
                ("new.example.com", ActionKind::Add { .. }) => {}
                ("moved.example.com", ActionKind::Modify { spec, previous }) => {
                    assert_eq!(spec.target, "y");
                    assert_eq!(previous.target, "x");
                }
                ("gone.example.com", ActionKind::Delete { previous }) => {
                    assert_eq!(previous.target, "x");
                }
                other => panic!("unexpected action {:?}", other),
            }
        }
    }

    #[test]
    fn defaulted_and_explicit_fields_compare_equal() {
        let prev = snapshot(&[DesiredRecord::new("a.example.com", "CNAME")]);
        let curr = snapshot(&[DesiredRecord::new("a.example.com", "CNAME")
            .with_target("a.example.com")
            .with_ttl("300")
            .with_proxied("false")
            .with_provider("cloudflare")]);
        let mut queue = ActionQueue::new();

        assert!(!diff(Some(&prev), &curr, Utc::now(), &mut queue).has_changes());
    }

    #[test]
    fn proxied_flip_is_a_modify() {
        let prev = snapshot(&[cname("a.example.com", "x")]);
        let curr = snapshot(&[cname("a.example.com", "x").with_proxied("true")]);
        let mut queue = ActionQueue::new();

        let summary = diff(Some(&prev), &curr, Utc::now(), &mut queue);
        assert_eq!(summary.modified, 1);
        assert_eq!(queue.pending().next().unwrap().spec().unwrap().ttl, 1);
    }

    #[test]
    fn invalid_change_is_rejected_not_queued() {
        let prev = snapshot(&[cname("a.example.com", "x")]);
        let curr = snapshot(&[cname("a.example.com", "x").with_ttl("forever")]);
        let mut queue = ActionQueue::new();

        let summary = diff(Some(&prev), &curr, Utc::now(), &mut queue);
        assert_eq!(summary.rejected, 1);
        assert!(summary.has_changes());
        assert!(queue.is_empty());
    }

    #[test]
    fn rejected_change_cancels_stale_pending_action() {
        let t0 = Utc::now();
        let first = snapshot(&[cname("a.example.com", "x")]);
        let mut queue = ActionQueue::new();
        diff(None, &first, t0, &mut queue);
        assert_eq!(queue.len(), 1);

        let second = snapshot(&[cname("a.example.com", "y").with_ttl("bad")]);
        let summary = diff(Some(&first), &second, t0, &mut queue);
        assert_eq!(summary.rejected, 1);
        assert!(queue.is_empty());
        assert!(
            queue
                .release_at(t0 + chrono::Duration::seconds(60), std::time::Duration::ZERO)
                .is_empty()
        );
    }

    #[test]
    fn reverted_action_is_emitted_again() {
        let prev = snapshot(&[cname("a.example.com", "x"), cname("b.example.com", "x")]);
        let desired = snapshot(&[cname("a.example.com", "y"), cname("c.example.com", "x")]);
        let mut curr = desired.clone();
        let mut queue = ActionQueue::new();
        let now = Utc::now();

        let first = diff(Some(&prev), &curr, now, &mut queue);
        for action in &queue.release_at(now, std::time::Duration::ZERO) {
            curr.revert(action);
        }
        assert_eq!(curr, prev);

        let second = diff(Some(&curr), &desired, now, &mut queue);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_current_deletes_everything() {
        let prev = snapshot(&[cname("a.example.com", "x"), cname("b.example.com", "x")]);
        let mut queue = ActionQueue::new();

        let summary = diff(Some(&prev), &Snapshot::default(), Utc::now(), &mut queue);
        assert_eq!(summary.deleted, 2);
    }
}
