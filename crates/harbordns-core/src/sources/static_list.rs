// # Static Record Source
//
// A fixed, in-memory list of desired records.
//
// ## Purpose
//
// Manages a hand-written set of hostnames without any container runtime,
// and gives tests a source whose output they can change between cycles.
//
// ## Sharing
//
// Clones share the same list, so a handle kept outside the engine can
// replace the records the engine will see on its next cycle.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::SourceConfig;
use crate::record::DesiredRecord;
use crate::traits::{RecordSource, RecordSourceFactory};

/// In-memory record source
///
/// # Example
///
/// ```rust,no_run
/// use harbordns_core::record::DesiredRecord;
/// use harbordns_core::sources::StaticRecordSource;
/// use harbordns_core::traits::RecordSource;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let source = StaticRecordSource::new(vec![
///         DesiredRecord::new("app.example.com", "CNAME").with_target("edge.example.com"),
///     ]);
///
///     assert_eq!(source.discover().await?.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticRecordSource {
    inner: Arc<RwLock<Vec<DesiredRecord>>>,
}

impl StaticRecordSource {
    /// Create a source returning `records` on every cycle
    pub fn new(records: Vec<DesiredRecord>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(records)),
        }
    }

    /// Replace the records returned from the next cycle on
    pub async fn set_records(&self, records: Vec<DesiredRecord>) {
        *self.inner.write().await = records;
    }

    /// Number of records currently configured
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the source is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl RecordSource for StaticRecordSource {
    async fn discover(&self) -> Result<Vec<DesiredRecord>, Error> {
        Ok(self.inner.read().await.clone())
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

/// Factory for static sources
pub struct StaticSourceFactory;

impl RecordSourceFactory for StaticSourceFactory {
    fn create(&self, config: &SourceConfig) -> Result<Box<dyn RecordSource>, Error> {
        match config {
            SourceConfig::Static { records } => {
                Ok(Box::new(StaticRecordSource::new(records.clone())))
            }
            _ => Err(Error::config("Invalid config for static source")),
        }
    }
}
