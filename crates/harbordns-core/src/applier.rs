//! Apply state machine
//!
//! Drives one released [`Action`] against the provider:
//!
//! ```text
//! Resolve ──► Lookup ──► Decide ──► Execute ──► Done
//!    │           │          │           │
//!    └───────────┴──── Failed / Skipped ┘
//! ```
//!
//! - **Resolve**: check the action targets this provider, find its zone
//! - **Lookup**: fetch existing records for `(hostname, type)`
//! - **Decide**: create, update, delete, or skip when already converged
//! - **Execute**: exactly one mutating provider call
//!
//! A failed action is dropped, never re-queued here. The next diff cycle
//! re-detects any mismatch that still exists.

use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::action::{Action, ActionKind};
use crate::record::RecordSpec;
use crate::traits::{DnsProvider, ExistingRecord, NewRecord, Zone};
use crate::zones::ZoneCache;

/// Stage at which an action failed
///
/// Decide cannot fail, so it has no variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStage {
    Resolve,
    Lookup,
    Execute,
}

impl fmt::Display for ApplyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplyStage::Resolve => "resolve",
            ApplyStage::Lookup => "lookup",
            ApplyStage::Execute => "execute",
        };
        f.write_str(name)
    }
}

/// Provider call an applied action made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Created,
    Updated,
    Deleted,
}

/// Why an action needed no provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Existing record already matches
    UpToDate,
    /// Delete requested but no record exists
    AlreadyAbsent,
}

/// Result of applying one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(Mutation),
    Skipped(SkipReason),
    Failed { stage: ApplyStage, error: String },
}

impl ApplyOutcome {
    fn failed(stage: ApplyStage, error: impl fmt::Display) -> Self {
        ApplyOutcome::Failed {
            stage,
            error: error.to_string(),
        }
    }
}

/// What Decide settled on
enum Plan {
    Create(NewRecord),
    Update {
        record_id: String,
        record: NewRecord,
        changes: Vec<String>,
    },
    Delete {
        record_id: String,
    },
    Skip(SkipReason),
}

/// Executes released actions against a provider
pub struct Applier {
    provider: Box<dyn DnsProvider>,
    zones: ZoneCache,
    dry_run: bool,
}

impl Applier {
    /// Create an applier with an empty zone cache
    pub fn new(provider: Box<dyn DnsProvider>, zone_cache_max_age: Duration, dry_run: bool) -> Self {
        Self::with_zone_cache(provider, ZoneCache::new(zone_cache_max_age), dry_run)
    }

    /// Create an applier around an existing zone cache
    pub fn with_zone_cache(provider: Box<dyn DnsProvider>, zones: ZoneCache, dry_run: bool) -> Self {
        Self {
            provider,
            zones,
            dry_run,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    pub fn zone_cache(&self) -> &ZoneCache {
        &self.zones
    }

    /// Run one action through Resolve → Lookup → Decide → Execute
    pub async fn apply(&mut self, action: &Action) -> ApplyOutcome {
        debug!("Applying {}", action);

        // Resolve
        if !action
            .provider()
            .eq_ignore_ascii_case(self.provider.provider_name())
        {
            let reason = format!(
                "action targets provider {:?}, configured provider is {:?}",
                action.provider(),
                self.provider.provider_name()
            );
            error!("Cannot apply {}: {}", action, reason);
            return ApplyOutcome::failed(ApplyStage::Resolve, reason);
        }

        let zone = match self
            .zones
            .resolve(self.provider.as_ref(), action.hostname())
            .await
        {
            Ok(zone) => zone,
            Err(e) => {
                error!("Failed to resolve zone for {}: {}", action.key, e);
                return ApplyOutcome::failed(ApplyStage::Resolve, e);
            }
        };

        // Lookup
        let existing = match self
            .provider
            .lookup(&zone, action.hostname(), action.record_type())
            .await
        {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to look up {} in zone {}: {}", action.key, zone.name, e);
                return ApplyOutcome::failed(ApplyStage::Lookup, e);
            }
        };

        if existing.len() > 1 {
            warn!(
                "Found {} records for {}, acting on the first ({})",
                existing.len(),
                action.key,
                existing[0].id
            );
        }

        // Decide
        let plan = decide(action, existing.first());

        // Execute
        self.execute(action, &zone, plan).await
    }

    async fn execute(&self, action: &Action, zone: &Zone, plan: Plan) -> ApplyOutcome {
        let mode = if self.dry_run { "[DRY-RUN] Would" } else { "Will" };

        match plan {
            Plan::Skip(reason) => {
                match reason {
                    SkipReason::UpToDate => {
                        info!("No changes needed for {} - skipping update", action.key)
                    }
                    SkipReason::AlreadyAbsent => {
                        info!("No existing record found for {} - nothing to delete", action.key)
                    }
                }
                ApplyOutcome::Skipped(reason)
            }
            Plan::Create(record) => {
                info!(
                    "{} create {} record {} -> {} (ttl {}, proxied {}) in zone {}",
                    mode,
                    record.record_type,
                    record.hostname,
                    record.content,
                    record.ttl,
                    record.proxied,
                    zone.name
                );
                if self.dry_run {
                    return ApplyOutcome::Applied(Mutation::Created);
                }
                match self.provider.create(zone, &record).await {
                    Ok(created) => {
                        info!("Created DNS record {} (ID: {})", action.key, created.id);
                        ApplyOutcome::Applied(Mutation::Created)
                    }
                    Err(e) => {
                        error!("Failed to create DNS record {}: {}", action.key, e);
                        ApplyOutcome::failed(ApplyStage::Execute, e)
                    }
                }
            }
            Plan::Update {
                record_id,
                record,
                changes,
            } => {
                info!(
                    "{} update {} in zone {}: {}",
                    mode,
                    action.key,
                    zone.name,
                    changes.join(", ")
                );
                if self.dry_run {
                    return ApplyOutcome::Applied(Mutation::Updated);
                }
                match self.provider.update(zone, &record_id, &record).await {
                    Ok(_) => {
                        info!("Updated DNS record {} (ID: {})", action.key, record_id);
                        ApplyOutcome::Applied(Mutation::Updated)
                    }
                    Err(e) => {
                        error!("Failed to update DNS record {}: {}", action.key, e);
                        ApplyOutcome::failed(ApplyStage::Execute, e)
                    }
                }
            }
            Plan::Delete { record_id } => {
                info!(
                    "{} delete {} (ID: {}) in zone {}",
                    mode, action.key, record_id, zone.name
                );
                if self.dry_run {
                    return ApplyOutcome::Applied(Mutation::Deleted);
                }
                match self.provider.delete(zone, &record_id).await {
                    Ok(()) => {
                        info!("Deleted DNS record {} (ID: {})", action.key, record_id);
                        ApplyOutcome::Applied(Mutation::Deleted)
                    }
                    Err(e) => {
                        error!("Failed to delete DNS record {}: {}", action.key, e);
                        ApplyOutcome::failed(ApplyStage::Execute, e)
                    }
                }
            }
        }
    }
}

fn decide(action: &Action, existing: Option<&ExistingRecord>) -> Plan {
    match (&action.kind, existing) {
        (ActionKind::Add { spec } | ActionKind::Modify { spec, .. }, Some(current)) => {
            let record = new_record(action, spec);
            let changes = describe_changes(current, &record);
            if changes.is_empty() {
                Plan::Skip(SkipReason::UpToDate)
            } else {
                Plan::Update {
                    record_id: current.id.clone(),
                    record,
                    changes,
                }
            }
        }
        (ActionKind::Add { spec } | ActionKind::Modify { spec, .. }, None) => {
            Plan::Create(new_record(action, spec))
        }
        (ActionKind::Delete { .. }, Some(current)) => Plan::Delete {
            record_id: current.id.clone(),
        },
        (ActionKind::Delete { .. }, None) => Plan::Skip(SkipReason::AlreadyAbsent),
    }
}

fn new_record(action: &Action, spec: &RecordSpec) -> NewRecord {
    NewRecord {
        hostname: action.hostname().to_string(),
        record_type: action.record_type().to_string(),
        content: spec.target.clone(),
        ttl: spec.ttl,
        proxied: spec.proxied,
    }
}

/// Human-readable field differences; empty when already converged
fn describe_changes(current: &ExistingRecord, wanted: &NewRecord) -> Vec<String> {
    let mut changes = Vec::new();
    if current.content != wanted.content {
        changes.push(format!("content: {} -> {}", current.content, wanted.content));
    }
    if !current.record_type.eq_ignore_ascii_case(&wanted.record_type) {
        changes.push(format!("type: {} -> {}", current.record_type, wanted.record_type));
    }
    if current.proxied != wanted.proxied {
        changes.push(format!("proxied: {} -> {}", current.proxied, wanted.proxied));
    }
    if current.ttl != wanted.ttl {
        changes.push(format!("ttl: {} -> {}", current.ttl, wanted.ttl));
    }
    changes
}
