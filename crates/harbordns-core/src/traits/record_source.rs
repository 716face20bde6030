// # Record Source Trait
//
// Defines the interface for discovering desired DNS records.
//
// ## Implementations
//
// - Docker/Traefik labels: `harbordns-discovery-docker` crate
// - Fixed list: `harbordns_core::sources::StaticRecordSource`
//
// ## Usage
//
// ```rust,ignore
// use harbordns_core::RecordSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* RecordSource implementation */;
//
//     for record in source.discover().await? {
//         println!("wants {:?}", record.key());
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::record::DesiredRecord;

/// Trait for discovery source implementations
///
/// A source is polled once per reconciliation cycle. It is an observer: it
/// reports what is running and leaves every decision to the engine.
///
/// # Contract
///
/// - No ordering or uniqueness guarantee on the returned descriptors; the
///   engine deduplicates by `(hostname, type)`, last one wins
/// - Fields may be missing; the engine applies defaults
/// - An `Err` aborts the cycle and leaves the previous snapshot in place,
///   so an unreachable source never reads as "everything was removed"
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Enumerate the desired records right now
    async fn discover(&self) -> Result<Vec<DesiredRecord>, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing record sources from configuration
pub trait RecordSourceFactory: Send + Sync {
    /// Create a RecordSource instance from configuration
    fn create(
        &self,
        config: &crate::config::SourceConfig,
    ) -> Result<Box<dyn RecordSource>, crate::Error>;
}
