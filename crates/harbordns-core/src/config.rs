//! Configuration types for HarborDNS
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

use crate::record::DesiredRecord;

/// Local Docker daemon socket, used when no endpoint is configured
pub const DEFAULT_DOCKER_ENDPOINT: &str = "unix:///var/run/docker.sock";

/// Endpoint schemes the Docker source understands
const DOCKER_ENDPOINT_SCHEMES: [&str; 4] = ["unix://", "tcp://", "http://", "https://"];

/// Main HarborDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarborConfig {
    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Discovery source configuration
    pub source: SourceConfig,

    /// Fallbacks for descriptor fields discovery leaves out
    #[serde(default)]
    pub defaults: RecordDefaults,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl HarborConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            provider: ProviderConfig::default(),
            source: SourceConfig::default(),
            defaults: RecordDefaults::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.source.validate()?;
        self.defaults.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

impl Default for HarborConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    ///
    /// Authenticates with either a scoped API token or the account email
    /// plus global API key.
    Cloudflare {
        /// Cloudflare API token
        #[serde(default)]
        api_token: Option<String>,
        /// Account email (global key authentication)
        #[serde(default)]
        api_email: Option<String>,
        /// Global API key (global key authentication)
        #[serde(default)]
        api_key: Option<String>,
        /// Override for the API base URL
        #[serde(default)]
        base_url: Option<String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare {
                api_token,
                api_email,
                api_key,
                ..
            } => {
                let has_token = api_token.as_deref().is_some_and(|t| !t.is_empty());
                let has_key = api_email.as_deref().is_some_and(|e| !e.is_empty())
                    && api_key.as_deref().is_some_and(|k| !k.is_empty());
                if !has_token && !has_key {
                    return Err(crate::Error::config(
                        "Cloudflare credentials missing: set an API token or email and API key",
                    ));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Cloudflare {
            api_token: None,
            api_email: None,
            api_key: None,
            base_url: None,
        }
    }
}

/// Discovery source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Running Docker containers carrying Traefik router rules
    Docker {
        /// Docker Engine API endpoint: `unix://` socket path, `tcp://`,
        /// or `http(s)://` (socket proxies)
        #[serde(default = "default_docker_endpoint")]
        endpoint: String,
        /// Target used when a container sets none
        default_target: String,
        /// Record type used when a container sets none
        #[serde(default = "default_record_type")]
        default_type: String,
    },

    /// A fixed list of descriptors
    Static {
        /// Descriptors returned on every cycle
        records: Vec<DesiredRecord>,
    },

    /// Custom source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SourceConfig {
    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SourceConfig::Docker {
                endpoint,
                default_target,
                default_type,
            } => {
                let address = DOCKER_ENDPOINT_SCHEMES
                    .iter()
                    .find_map(|scheme| endpoint.strip_prefix(scheme));
                match address {
                    None => {
                        return Err(crate::Error::config(format!(
                            "Docker endpoint must be a unix://, tcp:// or http(s):// URL, got: {}",
                            endpoint
                        )));
                    }
                    Some(rest) if rest.trim_matches('/').is_empty() => {
                        return Err(crate::Error::config(format!(
                            "Docker endpoint has no address: {}",
                            endpoint
                        )));
                    }
                    Some(_) => {}
                }
                if default_target.is_empty() {
                    return Err(crate::Error::config("Default target cannot be empty"));
                }
                if default_type.is_empty() {
                    return Err(crate::Error::config("Default record type cannot be empty"));
                }
                Ok(())
            }
            SourceConfig::Static { .. } => Ok(()),
            SourceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom source factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom source config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the source type name
    pub fn type_name(&self) -> &str {
        match self {
            SourceConfig::Docker { .. } => "docker",
            SourceConfig::Static { .. } => "static",
            SourceConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Static {
            records: Vec::new(),
        }
    }
}

/// Fallback values applied to descriptor fields discovery leaves out
///
/// The same fallbacks are used when comparing snapshots and when building
/// actions, so an omitted field never reads as a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDefaults {
    /// Provider named when the descriptor names none
    #[serde(default = "default_provider")]
    pub provider: String,

    /// TTL in seconds, as a string
    #[serde(default = "default_ttl")]
    pub ttl: String,

    /// Proxied flag, as a string
    #[serde(default = "default_proxied")]
    pub proxied: String,
}

impl RecordDefaults {
    /// Validate the defaults
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.provider.is_empty() {
            return Err(crate::Error::config("Default provider cannot be empty"));
        }
        if self.ttl.trim().parse::<u32>().is_err() {
            return Err(crate::Error::config(format!(
                "Default ttl must be an integer, got: {}",
                self.ttl
            )));
        }
        Ok(())
    }
}

impl Default for RecordDefaults {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            ttl: default_ttl(),
            proxied: default_proxied(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sleep between reconciliation cycles (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Minimum age of a pending action before it may execute (in seconds)
    ///
    /// Should cover at least two or three poll intervals, otherwise a
    /// restarting container can still flap a record.
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,

    /// Age after which the zone cache is considered stale (in seconds)
    ///
    /// A stale cache is refreshed on the next zone lookup miss. It is
    /// never refreshed on a timer.
    #[serde(default = "default_zone_cache_max_age_secs")]
    pub zone_cache_max_age_secs: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, new engine events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Decide every action but skip the mutating provider call
    #[serde(default)]
    pub dry_run: bool,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        let two_polls = self.poll_interval_secs.saturating_mul(2);
        if self.debounce_secs < two_polls {
            tracing::warn!(
                "Debounce window ({}s) is shorter than two poll intervals ({}s); flapping containers may cause churn",
                self.debounce_secs,
                two_polls
            );
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            debounce_secs: default_debounce_secs(),
            zone_cache_max_age_secs: default_zone_cache_max_age_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            dry_run: false,
        }
    }
}

fn default_docker_endpoint() -> String {
    DEFAULT_DOCKER_ENDPOINT.to_string()
}

fn default_record_type() -> String {
    "CNAME".to_string()
}

fn default_provider() -> String {
    "cloudflare".to_string()
}

fn default_ttl() -> String {
    "300".to_string()
}

fn default_proxied() -> String {
    "false".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_debounce_secs() -> u64 {
    30
}

fn default_zone_cache_max_age_secs() -> u64 {
    300
}

fn default_event_channel_capacity() -> usize {
    1000
}
