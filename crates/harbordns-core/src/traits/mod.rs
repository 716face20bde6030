//! Collaborator interfaces for HarborDNS
//!
//! The core never talks to Docker or to a DNS API directly. It consumes:
//!
//! - [`RecordSource`]: produce the desired-record descriptors for a cycle
//! - [`DnsProvider`]: look up and mutate records in provider-managed zones

pub mod dns_provider;
pub mod record_source;

pub use dns_provider::{DnsProvider, DnsProviderFactory, ExistingRecord, NewRecord, Zone};
pub use record_source::{RecordSource, RecordSourceFactory};
