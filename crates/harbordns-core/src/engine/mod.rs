//! Reconciliation loop driver
//!
//! The ReconcileEngine is responsible for:
//! - Polling the RecordSource for the desired state
//! - Diffing it against the previous cycle's snapshot
//! - Debouncing the resulting actions in the ActionQueue
//! - Applying released actions via the Applier
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ RecordSource │─── Vec<DesiredRecord> ───┐
//! └──────────────┘                          │
//!                                           ▼
//!                                  ┌─────────────────┐
//!                                  │ ReconcileEngine │
//!                                  └─────────────────┘
//!                                           │
//!         ┌─────────────────────────────────┼──────────────────────────┐
//!         │                                 │                          │
//!         ▼                                 ▼                          ▼
//! ┌──────────────┐  release  ┌──────────────────────────┐      ┌─────────────┐
//! │ diff → Queue │─────────► │ Applier → DnsProvider    │      │   Events    │
//! │  (debounce)  │           │ (lookup / create / ...)  │      │  (notify)   │
//! └──────────────┘           └──────────────────────────┘      └─────────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. Discover the current snapshot S(t)
//! 2. Diff S(t-1) against S(t), queueing actions
//! 3. Release actions older than the debounce window
//! 4. Apply every released action
//! 5. S(t) becomes S(t-1), then sleep for the poll interval
//!
//! The loop is strictly sequential. The queue and the previous snapshot
//! are owned by the engine and only touched between awaits of one cycle,
//! so no locking is needed.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::applier::{ApplyOutcome, ApplyStage, Applier, Mutation, SkipReason};
use crate::config::{HarborConfig, RecordDefaults};
use crate::error::Result;
use crate::queue::ActionQueue;
use crate::reconciler::{DiffSummary, Snapshot, diff};
use crate::traits::{DnsProvider, RecordSource};

/// Events emitted by the ReconcileEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        poll_interval_secs: u64,
        debounce_secs: u64,
    },

    /// A diff found changes and queued actions
    ChangesDetected { summary: DiffSummary },

    /// A provider call was made (or would have been, in dry-run)
    ActionApplied {
        hostname: String,
        record_type: String,
        mutation: Mutation,
    },

    /// Nothing to do for a released action
    ActionSkipped {
        hostname: String,
        record_type: String,
        reason: SkipReason,
    },

    /// A released action failed and was dropped
    ActionFailed {
        hostname: String,
        record_type: String,
        stage: ApplyStage,
        error: String,
    },

    /// Discovery failed; the cycle was abandoned
    DiscoveryFailed { error: String },

    /// A cycle ran to completion
    CycleCompleted { report: CycleReport },

    /// Engine stopped
    Stopped { reason: String },
}

/// What one reconciliation cycle did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Distinct keys in the discovered snapshot
    pub discovered: usize,
    /// Actions queued by the diff
    pub changes: DiffSummary,
    /// Actions released by the debounce gate
    pub released: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Actions still waiting after this cycle
    pub pending: usize,
}

/// Container-driven DNS reconciliation engine
///
/// ## Lifecycle
///
/// 1. Create with [`ReconcileEngine::new()`]
/// 2. Start with [`ReconcileEngine::run()`]
/// 3. Engine cycles until a shutdown signal is received
///
/// Nothing is persisted. After a restart the first cycle re-adds every
/// discovered record; the applier's skip-when-converged check makes that
/// harmless.
pub struct ReconcileEngine {
    /// Discovery collaborator
    source: Box<dyn RecordSource>,

    /// Provider-facing apply state machine
    applier: Applier,

    /// Debounced pending actions
    queue: ActionQueue,

    /// Snapshot from the last successful discovery
    previous: Option<Snapshot>,

    /// Fallbacks for missing descriptor fields
    defaults: RecordDefaults,

    /// Sleep between cycles
    poll_interval: Duration,

    /// Minimum pending age before an action may run
    debounce: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl ReconcileEngine {
    /// Create a new reconciliation engine
    ///
    /// # Parameters
    ///
    /// - `source`: discovery implementation
    /// - `provider`: DNS provider implementation
    /// - `config`: HarborDNS configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        source: Box<dyn RecordSource>,
        provider: Box<dyn DnsProvider>,
        config: HarborConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let applier = Applier::new(
            provider,
            Duration::from_secs(config.engine.zone_cache_max_age_secs),
            config.engine.dry_run,
        );

        let engine = Self {
            source,
            applier,
            queue: ActionQueue::new(),
            previous: None,
            defaults: config.defaults,
            poll_interval: Duration::from_secs(config.engine.poll_interval_secs),
            debounce: Duration::from_secs(config.engine.debounce_secs),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run the engine
    ///
    /// Cycles until SIGINT is received. Cycle errors are logged and the
    /// loop continues.
    pub async fn run(&mut self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Internal run implementation that accepts an optional shutdown signal
    async fn run_internal(
        &mut self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.emit_event(EngineEvent::Started {
            poll_interval_secs: self.poll_interval.as_secs(),
            debounce_secs: self.debounce.as_secs(),
        });
        info!(
            "Reconciling every {:?} with a {:?} debounce window (source: {}, provider: {})",
            self.poll_interval,
            self.debounce,
            self.source.source_name(),
            self.applier.provider_name()
        );

        let mut shutdown: Pin<Box<dyn Future<Output = ()> + Send>> = match shutdown_rx {
            // Caller-provided signal; a dropped sender also stops the loop
            Some(rx) => Box::pin(async move {
                let _ = rx.await;
            }),
            // No channel: wait for SIGINT
            None => Box::pin(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for shutdown signal: {}", e);
                    std::future::pending::<()>().await;
                }
            }),
        };

        loop {
            if let Err(e) = self.cycle().await {
                error!("Reconciliation cycle failed: {}", e);
                // Continue running despite errors
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        if !self.queue.is_empty() {
            warn!(
                "Discarding {} pending action(s) on shutdown",
                self.queue.len()
            );
        }

        Ok(())
    }

    /// Run one cycle against the wall clock
    pub async fn cycle(&mut self) -> Result<CycleReport> {
        self.cycle_at(Utc::now()).await
    }

    /// Run one cycle as of `now`
    ///
    /// `now` stamps newly queued actions and gates their release, which
    /// makes the debounce window testable without sleeping.
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: the cycle ran; individual action failures are
    ///   counted in the report, not returned
    /// - `Err(Error)`: discovery failed; the previous snapshot is kept
    pub async fn cycle_at(&mut self, now: DateTime<Utc>) -> Result<CycleReport> {
        let records = match self.source.discover().await {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    "Discovery via {} failed, keeping previous snapshot: {}",
                    self.source.source_name(),
                    e
                );
                self.emit_event(EngineEvent::DiscoveryFailed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        let mut current = Snapshot::from_records(&records, &self.defaults);
        debug!(
            "Discovered {} descriptor(s), {} distinct record(s)",
            records.len(),
            current.len()
        );

        let changes = diff(self.previous.as_ref(), &current, now, &mut self.queue);
        if changes.has_changes() {
            info!(
                "Changes detected: {} add, {} modify, {} delete, {} rejected ({} pending)",
                changes.added,
                changes.modified,
                changes.deleted,
                changes.rejected,
                self.queue.len()
            );
            self.emit_event(EngineEvent::ChangesDetected { summary: changes });
        }

        let ready = self.queue.release_at(now, self.debounce);
        let mut report = CycleReport {
            discovered: current.len(),
            changes,
            released: ready.len(),
            ..CycleReport::default()
        };

        for action in &ready {
            let hostname = action.hostname().to_string();
            let record_type = action.record_type().to_string();

            match self.applier.apply(action).await {
                ApplyOutcome::Applied(mutation) => {
                    report.applied += 1;
                    self.emit_event(EngineEvent::ActionApplied {
                        hostname,
                        record_type,
                        mutation,
                    });
                }
                ApplyOutcome::Skipped(reason) => {
                    report.skipped += 1;
                    self.emit_event(EngineEvent::ActionSkipped {
                        hostname,
                        record_type,
                        reason,
                    });
                }
                ApplyOutcome::Failed { stage, error } => {
                    report.failed += 1;
                    // Not requeued; the next diff re-emits it while the mismatch stands.
                    current.revert(action);
                    debug!("{} will be re-detected on the next cycle", action.key);
                    self.emit_event(EngineEvent::ActionFailed {
                        hostname,
                        record_type,
                        stage,
                        error,
                    });
                }
            }
        }

        self.previous = Some(current);
        report.pending = self.queue.len();

        if report.released > 0 {
            info!(
                "Cycle applied {} action(s): {} applied, {} skipped, {} failed",
                report.released, report.applied, report.skipped, report.failed
            );
        }
        self.emit_event(EngineEvent::CycleCompleted { report });

        Ok(report)
    }

    /// Number of actions waiting for the debounce window
    pub fn pending_actions(&self) -> usize {
        self.queue.len()
    }

    /// Pending action queue
    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    /// Snapshot the next cycle will diff against
    pub fn previous_snapshot(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Send event, logging warning if channel is full (backpressure)
        if self.event_tx.try_send(event).is_err() {
            warn!(
                "Event channel full, dropping event. Consider increasing event_channel_capacity."
            );
        }
    }

    /// Run the engine until `shutdown_rx` fires
    ///
    /// With `None` this is [`ReconcileEngine::run()`]. Callers that handle
    /// more than SIGINT (the daemon also stops on SIGTERM) pass their own
    /// channel. A cycle in progress finishes before the loop exits.
    pub async fn run_with_shutdown(
        &mut self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }
}
