// # DNS Provider Trait
//
// Defines the interface for reading and mutating records held by a DNS
// provider.
//
// ## Implementations
//
// - Cloudflare: `harbordns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use harbordns_core::DnsProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     let zones = provider.list_zones().await?;
//     let existing = provider.lookup(&zones[0], "app.example.com", "CNAME").await?;
//     println!("{} record(s)", existing.len());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A provider-managed zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Provider zone ID
    pub id: String,
    /// Zone apex name (e.g. "example.com")
    pub name: String,
}

impl Zone {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A record as it currently exists at the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingRecord {
    /// Provider record ID
    pub id: String,
    /// Fully-qualified record name
    pub name: String,
    /// Record type (A, AAAA, CNAME, ...)
    pub record_type: String,
    /// Record content (address or target hostname)
    pub content: String,
    /// Time-to-live in seconds (1 = automatic)
    pub ttl: u32,
    /// Whether traffic is proxied by the provider
    pub proxied: bool,
}

/// Record values sent on create or update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub hostname: String,
    pub record_type: String,
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
}

/// Trait for DNS provider implementations
///
/// Providers are thin API clients. Every method is a single request (or a
/// paginated listing) with no retry, no backoff and no decision about
/// whether a change is needed; the applier owns those decisions.
///
/// # Errors
///
/// Every method may fail. Failures are returned, never panicked, and the
/// applier reports them as a failed action. Convergence is recovered on a
/// later cycle while the mismatch persists.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List every zone the credentials can manage
    async fn list_zones(&self) -> Result<Vec<Zone>, crate::Error>;

    /// Find existing records with this name and type in a zone
    ///
    /// An empty list means "not found"; it is not an error.
    async fn lookup(
        &self,
        zone: &Zone,
        hostname: &str,
        record_type: &str,
    ) -> Result<Vec<ExistingRecord>, crate::Error>;

    /// Create a record in a zone
    async fn create(&self, zone: &Zone, record: &NewRecord)
    -> Result<ExistingRecord, crate::Error>;

    /// Overwrite an existing record
    async fn update(
        &self,
        zone: &Zone,
        record_id: &str,
        record: &NewRecord,
    ) -> Result<ExistingRecord, crate::Error>;

    /// Delete an existing record
    async fn delete(&self, zone: &Zone, record_id: &str) -> Result<(), crate::Error>;

    /// Get the provider name (for logging and for matching descriptors)
    ///
    /// # Returns
    ///
    /// A static string identifying the provider (e.g., "cloudflare")
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this provider
    ///
    /// # Returns
    ///
    /// A boxed DnsProvider trait object
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
