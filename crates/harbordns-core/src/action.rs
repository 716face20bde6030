//! Pending DNS mutations
//!
//! An [`Action`] is one intended change to one record. The variant carries
//! exactly the data its kind needs: Add and Modify carry the effective
//! [`RecordSpec`], Modify and Delete carry the prior [`FieldSet`] for logs.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::Result;
use crate::record::{FieldSet, RecordKey, RecordSpec};

/// What an action intends to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// Record appeared in desired state
    Add { spec: RecordSpec },
    /// Record fields changed in desired state
    Modify { spec: RecordSpec, previous: FieldSet },
    /// Record disappeared from desired state
    Delete { previous: FieldSet },
}

impl ActionKind {
    /// Short lowercase label for logs and events
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Add { .. } => "add",
            ActionKind::Modify { .. } => "modify",
            ActionKind::Delete { .. } => "delete",
        }
    }
}

/// One pending change to one DNS record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub key: RecordKey,
    pub kind: ActionKind,
    /// Enqueue time, used for age gating only
    pub created_at: DateTime<Utc>,
}

impl Action {
    /// Build an Add from the current fields
    pub fn add(key: RecordKey, fields: &FieldSet, created_at: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            key,
            kind: ActionKind::Add {
                spec: RecordSpec::from_fields(fields)?,
            },
            created_at,
        })
    }

    /// Build a Modify from the current fields and the ones they replace
    pub fn modify(
        key: RecordKey,
        fields: &FieldSet,
        previous: FieldSet,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            key,
            kind: ActionKind::Modify {
                spec: RecordSpec::from_fields(fields)?,
                previous,
            },
            created_at,
        })
    }

    /// Build a Delete for a record that left desired state
    pub fn delete(key: RecordKey, previous: FieldSet, created_at: DateTime<Utc>) -> Self {
        Self {
            key,
            kind: ActionKind::Delete { previous },
            created_at,
        }
    }

    pub fn hostname(&self) -> &str {
        self.key.hostname()
    }

    pub fn record_type(&self) -> &str {
        self.key.record_type()
    }

    /// Effective values to apply; `None` for Delete
    pub fn spec(&self) -> Option<&RecordSpec> {
        match &self.kind {
            ActionKind::Add { spec } | ActionKind::Modify { spec, .. } => Some(spec),
            ActionKind::Delete { .. } => None,
        }
    }

    /// Provider the action is addressed to
    pub fn provider(&self) -> &str {
        match &self.kind {
            ActionKind::Add { spec } | ActionKind::Modify { spec, .. } => &spec.provider,
            ActionKind::Delete { previous } => &previous.provider,
        }
    }

    /// Seconds since the action was enqueued, as of `now`
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.created_at)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ActionKind::Add { spec } => write!(
                f,
                "add {} -> {} (ttl {}, proxied {})",
                self.key, spec.target, spec.ttl, spec.proxied
            ),
            ActionKind::Modify { spec, previous } => write!(
                f,
                "modify {} -> {} (ttl {}, proxied {}; was {})",
                self.key, spec.target, spec.ttl, spec.proxied, previous
            ),
            ActionKind::Delete { previous } => {
                write!(f, "delete {} (was {})", self.key, previous)
            }
        }
    }
}
