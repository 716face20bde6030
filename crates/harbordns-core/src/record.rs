//! Desired-record descriptors and their normalized field values
//!
//! Discovery hands the core loosely-typed descriptors: every field is an
//! optional string. This module turns them into:
//!
//! - [`RecordKey`]: the `(hostname, type)` identity of a record
//! - [`FieldSet`]: the comparison field set, with defaults applied
//! - [`RecordSpec`]: the effective values sent to the provider
//!
//! The proxied/TTL coupling lives in [`RecordSpec::from_fields`]: a proxied
//! record always carries [`AUTO_TTL`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::RecordDefaults;
use crate::error::{Error, Result};

/// Provider TTL value meaning "governed by proxy/automatic settings"
pub const AUTO_TTL: u32 = 1;

/// Identity of a DNS record: hostname plus record type
///
/// Hostnames are lower-cased and record types upper-cased so that label
/// spelling differences do not produce distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    hostname: String,
    record_type: String,
}

impl RecordKey {
    /// Build a key, or `None` if either part is blank
    pub fn new(hostname: &str, record_type: &str) -> Option<Self> {
        let hostname = hostname.trim();
        let record_type = record_type.trim();
        if hostname.is_empty() || record_type.is_empty() {
            return None;
        }
        Some(Self {
            hostname: hostname.to_ascii_lowercase(),
            record_type: record_type.to_ascii_uppercase(),
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.hostname, self.record_type)
    }
}

/// A desired record as produced by discovery
///
/// Nothing here is guaranteed: discovery may omit any field and may emit
/// the same key more than once per cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredRecord {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub record_type: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub ttl: Option<String>,
    #[serde(default)]
    pub proxied: Option<String>,
    /// Where the descriptor came from (container name, config entry)
    #[serde(default)]
    pub origin: Option<String>,
}

impl DesiredRecord {
    /// Create a descriptor with its identifying key set
    pub fn new(hostname: impl Into<String>, record_type: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            record_type: Some(record_type.into()),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_ttl(mut self, ttl: impl Into<String>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }

    pub fn with_proxied(mut self, proxied: impl Into<String>) -> Self {
        self.proxied = Some(proxied.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// The record key, if both hostname and type are present
    pub fn key(&self) -> Option<RecordKey> {
        RecordKey::new(self.hostname.as_deref()?, self.record_type.as_deref()?)
    }

    /// Resolve the comparison field set, applying defaults
    ///
    /// The target falls back to the hostname.
    pub fn fields(&self, defaults: &RecordDefaults) -> FieldSet {
        let hostname = non_blank(&self.hostname)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        FieldSet {
            provider: non_blank(&self.provider)
                .unwrap_or(&defaults.provider)
                .to_string(),
            target: non_blank(&self.target)
                .map(str::to_string)
                .unwrap_or(hostname),
            ttl: non_blank(&self.ttl).unwrap_or(&defaults.ttl).to_string(),
            proxied: non_blank(&self.proxied)
                .unwrap_or(&defaults.proxied)
                .to_string(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// The fields compared between two snapshots, as raw strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSet {
    pub provider: String,
    pub target: String,
    pub ttl: String,
    pub proxied: String,
}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "target {}, ttl {}, proxied {}, provider {}",
            self.target, self.ttl, self.proxied, self.provider
        )
    }
}

/// Effective record values, normalized for the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSpec {
    pub provider: String,
    pub target: String,
    pub ttl: u32,
    pub proxied: bool,
}

impl RecordSpec {
    /// Normalize a field set
    ///
    /// Fails if the TTL is not an integer. A proxied record always gets
    /// [`AUTO_TTL`], whatever TTL was supplied.
    pub fn from_fields(fields: &FieldSet) -> Result<Self> {
        let proxied = parse_proxied(&fields.proxied);
        let ttl = if proxied {
            AUTO_TTL
        } else {
            parse_ttl(&fields.ttl)?
        };

        Ok(Self {
            provider: fields.provider.clone(),
            target: fields.target.clone(),
            ttl,
            proxied,
        })
    }
}

/// Fold a proxied label into a boolean
///
/// Only `true` (any case) counts as proxied.
pub fn parse_proxied(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Parse a TTL label as whole seconds
pub fn parse_ttl(value: &str) -> Result<u32> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| Error::invalid_action(format!("ttl is not an integer: {:?}", value)))
}
