// # Docker Discovery Source
//
// This crate derives desired DNS records from running Docker containers.
//
// ## Label Contract
//
// Every container label whose key ends in `.rule` (Traefik router rules,
// e.g. `traefik.http.routers.app.rule`) is scanned for ``Host(`name`)``
// matchers. Each host found becomes one descriptor:
//
// | field    | source                                      |
// |----------|---------------------------------------------|
// | hostname | the `Host(...)` argument                    |
// | type     | `harbordns.type` label, else default type   |
// | target   | `harbordns.target` label, else default      |
// | ttl      | `harbordns.ttl` label (optional)            |
// | proxied  | `harbordns.proxied` label (optional)        |
// | provider | `harbordns.provider` label (optional)       |
//
// ## Transport
//
// Talks to the Docker Engine API (`GET /containers/json`) through one of:
//
// - `unix:///var/run/docker.sock`: the local daemon socket (default)
// - `tcp://host:2375`: a TCP-exposed daemon, spoken to as plain HTTP
// - `http(s)://...`: a socket proxy or TLS-terminating front
//
// Only running containers are listed. Any failure to reach the daemon is
// reported as a discovery error, which makes the engine keep its previous
// snapshot.

use harbordns_core::ProviderRegistry;
use harbordns_core::config::SourceConfig;
use harbordns_core::record::DesiredRecord;
use harbordns_core::traits::{RecordSource, RecordSourceFactory};
use harbordns_core::{Error, Result};

use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

/// Default HTTP timeout for Docker API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Request authority used when talking over the daemon socket
const SOCKET_BASE_URL: &str = "http://localhost";

/// Container label overriding the record target
pub const TARGET_LABEL: &str = "harbordns.target";
/// Container label overriding the record type
pub const TYPE_LABEL: &str = "harbordns.type";
/// Container label setting the record TTL
pub const TTL_LABEL: &str = "harbordns.ttl";
/// Container label setting the proxied flag
pub const PROXIED_LABEL: &str = "harbordns.proxied";
/// Container label naming the DNS provider
pub const PROVIDER_LABEL: &str = "harbordns.provider";

static HOST_RULE_RE: OnceLock<Regex> = OnceLock::new();

/// Every hostname named by a ``Host(`...`)`` matcher in a router rule
///
/// ```
/// use harbordns_discovery_docker::hosts_in_rule;
///
/// let hosts = hosts_in_rule("Host(`a.example.com`) || Host(`b.example.com`)");
/// assert_eq!(hosts, vec!["a.example.com", "b.example.com"]);
/// ```
pub fn hosts_in_rule(rule: &str) -> Vec<&str> {
    let re = HOST_RULE_RE.get_or_init(|| Regex::new(r"Host\(`([^`]+)`\)").unwrap());
    re.captures_iter(rule)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|host| !host.is_empty())
        .collect()
}

/// A running container as reported by `GET /containers/json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerSummary {
    #[serde(rename = "Id", default)]
    pub id: String,

    #[serde(rename = "Names", default)]
    pub names: Vec<String>,

    #[serde(rename = "Labels", default)]
    pub labels: BTreeMap<String, String>,
}

impl ContainerSummary {
    /// Container name without the leading slash, else the short ID
    pub fn display_name(&self) -> String {
        self.names
            .first()
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_else(|| self.id.chars().take(12).collect())
    }

    fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Descriptors for one container
///
/// A container without router rules yields nothing. Labels are visited in
/// key order, so the output is deterministic.
pub fn records_for_container(
    container: &ContainerSummary,
    default_target: &str,
    default_type: &str,
) -> Vec<DesiredRecord> {
    let name = container.display_name();
    let target = container.label(TARGET_LABEL).unwrap_or(default_target);
    let record_type = container.label(TYPE_LABEL).unwrap_or(default_type);

    let mut records = Vec::new();
    for (key, value) in &container.labels {
        if !key.ends_with(".rule") {
            continue;
        }

        for host in hosts_in_rule(value) {
            let mut record = DesiredRecord::new(host, record_type)
                .with_target(target)
                .with_origin(name.clone());
            if let Some(ttl) = container.label(TTL_LABEL) {
                record = record.with_ttl(ttl);
            }
            if let Some(proxied) = container.label(PROXIED_LABEL) {
                record = record.with_proxied(proxied);
            }
            if let Some(provider) = container.label(PROVIDER_LABEL) {
                record = record.with_provider(provider);
            }

            tracing::debug!(
                "Processed container {} with host: {}, target: {}, type: {}",
                name,
                host,
                target,
                record_type
            );
            records.push(record);
        }
    }
    records
}

/// Where Engine API requests are sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Unix domain socket of the local daemon
    Socket(PathBuf),
    /// HTTP base URL
    Http(String),
}

impl Endpoint {
    /// Parse a `unix://`, `tcp://` or `http(s)://` endpoint
    ///
    /// ```
    /// use harbordns_discovery_docker::Endpoint;
    ///
    /// assert_eq!(
    ///     Endpoint::parse("tcp://10.0.0.5:2375").unwrap(),
    ///     Endpoint::Http("http://10.0.0.5:2375".to_string())
    /// );
    /// ```
    pub fn parse(endpoint: &str) -> Result<Self> {
        let endpoint = endpoint.trim();
        if let Some(path) = endpoint.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(Error::config("Docker socket path cannot be empty"));
            }
            return Ok(Endpoint::Socket(PathBuf::from(path)));
        }

        let url = match endpoint.strip_prefix("tcp://") {
            Some(address) => format!("http://{}", address),
            None if endpoint.starts_with("http://") || endpoint.starts_with("https://") => {
                endpoint.to_string()
            }
            None => {
                return Err(Error::config(format!(
                    "Unsupported Docker endpoint: {}",
                    endpoint
                )));
            }
        };
        Ok(Endpoint::Http(url.trim_end_matches('/').to_string()))
    }

    /// Base URL for request paths
    fn base_url(&self) -> &str {
        match self {
            Endpoint::Socket(_) => SOCKET_BASE_URL,
            Endpoint::Http(url) => url,
        }
    }
}

/// Record source backed by the Docker Engine API
#[derive(Debug)]
pub struct DockerRecordSource {
    /// Socket or HTTP root of the Engine API
    endpoint: Endpoint,

    /// Target used when a container sets none
    default_target: String,

    /// Record type used when a container sets none
    default_type: String,

    /// HTTP client
    client: reqwest::Client,
}

impl DockerRecordSource {
    /// Create a new Docker source
    ///
    /// # Parameters
    ///
    /// - `endpoint`: `unix://` socket, `tcp://` address or `http(s)://` root
    /// - `default_target`: fallback for `harbordns.target`
    /// - `default_type`: fallback for `harbordns.type`
    pub fn new(
        endpoint: impl Into<String>,
        default_target: impl Into<String>,
        default_type: impl Into<String>,
    ) -> Result<Self> {
        let endpoint = Endpoint::parse(&endpoint.into())?;

        let builder = reqwest::Client::builder().timeout(DEFAULT_HTTP_TIMEOUT);
        let builder = match &endpoint {
            #[cfg(unix)]
            Endpoint::Socket(path) => builder.unix_socket(path.clone()),
            #[cfg(not(unix))]
            Endpoint::Socket(path) => {
                return Err(Error::config(format!(
                    "Docker socket {} is only reachable on Unix",
                    path.display()
                )));
            }
            Endpoint::Http(_) => builder,
        };
        let client = builder
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            default_target: default_target.into(),
            default_type: default_type.into(),
            client,
        })
    }

    /// Fetch running containers
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        let url = format!("{}/containers/json", self.endpoint.base_url());

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::discovery(format!("Docker API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::discovery(format!(
                "Docker API error: {} - {}",
                status,
                body.trim()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::discovery(format!("Invalid container list: {}", e)))
    }
}

#[async_trait::async_trait]
impl RecordSource for DockerRecordSource {
    async fn discover(&self) -> Result<Vec<DesiredRecord>> {
        let containers = self.list_containers().await?;

        let records: Vec<DesiredRecord> = containers
            .iter()
            .flat_map(|c| records_for_container(c, &self.default_target, &self.default_type))
            .collect();

        tracing::debug!(
            "Docker discovery: {} container(s), {} host rule(s)",
            containers.len(),
            records.len()
        );
        Ok(records)
    }

    fn source_name(&self) -> &'static str {
        "docker"
    }
}

/// Factory for creating Docker sources
pub struct DockerSourceFactory;

impl RecordSourceFactory for DockerSourceFactory {
    fn create(&self, config: &SourceConfig) -> Result<Box<dyn RecordSource>> {
        match config {
            SourceConfig::Docker {
                endpoint,
                default_target,
                default_type,
            } => Ok(Box::new(DockerRecordSource::new(
                endpoint.clone(),
                default_target.clone(),
                default_type.clone(),
            )?)),
            _ => Err(Error::config("Invalid config for Docker source")),
        }
    }
}

/// Register the Docker source with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_source("docker", Box::new(DockerSourceFactory));
}
