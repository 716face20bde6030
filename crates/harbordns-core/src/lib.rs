// # harbordns-core
//
// Core library for the container-driven DNS reconciler.
//
// ## Architecture Overview
//
// This library keeps provider DNS records in step with what is running:
// - **RecordSource**: Trait for discovering desired records (e.g. container labels)
// - **DnsProvider**: Trait for looking up and mutating records via provider APIs
// - **reconciler::diff**: Snapshot diff that turns changes into actions
// - **ActionQueue**: Debounce buffer, one pending action per record key
// - **Applier**: Per-action state machine that makes at most one mutating call
// - **ZoneCache**: Longest-suffix hostname → zone resolution
// - **ReconcileEngine**: Poll → diff → debounce → apply loop
// - **ProviderRegistry**: Plugin-based registry for providers and sources
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Level-Triggered**: Each cycle compares whole snapshots, not events
// 3. **Plugin-Based**: Providers are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Idempotency**: The applier re-reads provider state before every change

pub mod action;
pub mod applier;
pub mod config;
pub mod engine;
pub mod error;
pub mod queue;
pub mod reconciler;
pub mod record;
pub mod registry;
pub mod sources;
pub mod traits;
pub mod zones;

// Re-export core types for convenience
pub use action::{Action, ActionKind};
pub use applier::{ApplyOutcome, ApplyStage, Applier, Mutation, SkipReason};
pub use config::{EngineConfig, HarborConfig, ProviderConfig, RecordDefaults, SourceConfig};
pub use engine::{CycleReport, EngineEvent, ReconcileEngine};
pub use error::{Error, Result};
pub use queue::ActionQueue;
pub use reconciler::{DiffSummary, Snapshot};
pub use record::{DesiredRecord, FieldSet, RecordKey, RecordSpec};
pub use registry::ProviderRegistry;
pub use sources::StaticRecordSource;
pub use traits::{DnsProvider, ExistingRecord, NewRecord, RecordSource, Zone};
pub use zones::ZoneCache;
