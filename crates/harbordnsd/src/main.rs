// # harbordnsd - HarborDNS Daemon
//
// Thin integration layer: all reconciliation logic lives in harbordns-core.
// Configuration is via environment variables only.
//
// The harbordnsd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering providers and discovery sources
// 4. Running the reconcile engine until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Discovery
// - `HARBORDNS_SOURCE_TYPE`: Discovery source (docker, static)
// - `HARBORDNS_DOCKER_HOST`: Docker Engine API endpoint (for docker);
//   falls back to `DOCKER_HOST`, then `unix:///var/run/docker.sock`
// - `HARBORDNS_RECORDS`: Comma-separated hostnames (for static)
// - `HARBORDNS_TARGET`: Default record target
// - `HARBORDNS_TYPE`: Default record type
//
// ### DNS Provider
// - `HARBORDNS_PROVIDER_TYPE`: Provider type (cloudflare)
// - `CLOUDFLARE_API_TOKEN`: Scoped API token, or
// - `CLOUDFLARE_EMAIL` + `CLOUDFLARE_API_KEY`: Global API key
//
// ### Engine
// - `HARBORDNS_POLL_INTERVAL_SECS`: Seconds between cycles
// - `HARBORDNS_DEBOUNCE_SECS`: Minimum age of an action before it runs
// - `HARBORDNS_ZONE_CACHE_MAX_AGE_SECS`: Zone list staleness
// - `HARBORDNS_MODE`: `live` or `dry-run`
// - `HARBORDNS_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export HARBORDNS_TARGET=edge.example.com
// export CLOUDFLARE_API_TOKEN=your_token
//
// harbordnsd
// ```

use anyhow::Result;
use harbordns_core::config::{
    DEFAULT_DOCKER_ENDPOINT, EngineConfig, ProviderConfig, RecordDefaults, SourceConfig,
};
use harbordns_core::{DesiredRecord, EngineEvent, HarborConfig, ProviderRegistry, ReconcileEngine};
use std::env;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Grace period for the engine to finish its cycle after a signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum HarborExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<HarborExitCode> for ExitCode {
    fn from(code: HarborExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    default_target: String,
    default_type: String,
    source_type: String,
    docker_host: String,
    records: Vec<String>,
    provider_type: String,
    cloudflare_token: Option<String>,
    cloudflare_email: Option<String>,
    cloudflare_key: Option<String>,
    poll_interval_secs: u64,
    debounce_secs: u64,
    zone_cache_max_age_secs: u64,
    mode: String,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through a variable lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let number = |key: &str, default: u64| -> Result<u64> {
            match var(key) {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds, got: {}", key, raw)),
                None => Ok(default),
            }
        };

        Ok(Self {
            default_target: var("HARBORDNS_TARGET").unwrap_or_else(|| "localhost".to_string()),
            default_type: var("HARBORDNS_TYPE").unwrap_or_else(|| "CNAME".to_string()),
            source_type: var("HARBORDNS_SOURCE_TYPE").unwrap_or_else(|| "docker".to_string()),
            docker_host: var("HARBORDNS_DOCKER_HOST")
                .or_else(|| var("DOCKER_HOST"))
                .unwrap_or_else(|| DEFAULT_DOCKER_ENDPOINT.to_string()),
            records: var("HARBORDNS_RECORDS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            provider_type: var("HARBORDNS_PROVIDER_TYPE")
                .unwrap_or_else(|| "cloudflare".to_string()),
            cloudflare_token: var("CLOUDFLARE_API_TOKEN"),
            cloudflare_email: var("CLOUDFLARE_EMAIL"),
            cloudflare_key: var("CLOUDFLARE_API_KEY"),
            poll_interval_secs: number("HARBORDNS_POLL_INTERVAL_SECS", 10)?,
            debounce_secs: number("HARBORDNS_DEBOUNCE_SECS", 30)?,
            zone_cache_max_age_secs: number("HARBORDNS_ZONE_CACHE_MAX_AGE_SECS", 300)?,
            mode: var("HARBORDNS_MODE").unwrap_or_else(|| "live".to_string()),
            log_level: var("HARBORDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        match self.provider_type.as_str() {
            "cloudflare" => {}
            _ => anyhow::bail!(
                "HARBORDNS_PROVIDER_TYPE '{}' is not supported. \
                Supported providers: cloudflare",
                self.provider_type
            ),
        }

        if self.cloudflare_token.is_none()
            && (self.cloudflare_email.is_none() || self.cloudflare_key.is_none())
        {
            anyhow::bail!(
                "Cloudflare credentials are required. \
                Set CLOUDFLARE_API_TOKEN, or CLOUDFLARE_EMAIL and CLOUDFLARE_API_KEY"
            );
        }

        match self.source_type.as_str() {
            "docker" => {
                if let Err(e) = self.to_harbor_config().source.validate() {
                    anyhow::bail!("HARBORDNS_DOCKER_HOST is not usable: {}", e);
                }
            }
            "static" => {
                if self.records.is_empty() {
                    anyhow::bail!(
                        "HARBORDNS_RECORDS must contain at least one hostname when \
                        HARBORDNS_SOURCE_TYPE=static. \
                        Set it via: export HARBORDNS_RECORDS=app.example.com,www.example.com"
                    );
                }
            }
            _ => anyhow::bail!(
                "HARBORDNS_SOURCE_TYPE '{}' is not supported. \
                Supported types: docker, static",
                self.source_type
            ),
        }

        if self.poll_interval_secs == 0 {
            anyhow::bail!("HARBORDNS_POLL_INTERVAL_SECS must be at least 1");
        }

        match self.mode.as_str() {
            "live" | "dry-run" => {}
            _ => anyhow::bail!(
                "HARBORDNS_MODE '{}' is not valid. Valid modes: live, dry-run",
                self.mode
            ),
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "HARBORDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Translate into the library configuration
    fn to_harbor_config(&self) -> HarborConfig {
        let provider = ProviderConfig::Cloudflare {
            api_token: self.cloudflare_token.clone(),
            api_email: self.cloudflare_email.clone(),
            api_key: self.cloudflare_key.clone(),
            base_url: None,
        };

        let source = match self.source_type.as_str() {
            "static" => SourceConfig::Static {
                records: self
                    .records
                    .iter()
                    .map(|host| {
                        DesiredRecord::new(host.as_str(), self.default_type.as_str())
                            .with_target(self.default_target.as_str())
                            .with_origin("HARBORDNS_RECORDS")
                    })
                    .collect(),
            },
            _ => SourceConfig::Docker {
                endpoint: self.docker_host.clone(),
                default_target: self.default_target.clone(),
                default_type: self.default_type.clone(),
            },
        };

        HarborConfig {
            provider,
            source,
            defaults: RecordDefaults {
                provider: self.provider_type.clone(),
                ..RecordDefaults::default()
            },
            engine: EngineConfig {
                poll_interval_secs: self.poll_interval_secs,
                debounce_secs: self.debounce_secs,
                zone_cache_max_age_secs: self.zone_cache_max_age_secs,
                dry_run: self.mode == "dry-run",
                ..EngineConfig::default()
            },
        }
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return HarborExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return HarborExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return HarborExitCode::ConfigError.into();
    }

    info!("Starting harbordnsd daemon");
    if env::var("HARBORDNS_TARGET").is_err() {
        warn!("HARBORDNS_TARGET is not set; records default to target 'localhost'");
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return HarborExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let engine = match build_engine(&config) {
            Ok(parts) => parts,
            Err(e) => {
                error!("Startup error: {}", e);
                return HarborExitCode::ConfigError;
            }
        };

        if let Err(e) = run_daemon(engine).await {
            error!("Daemon error: {}", e);
            HarborExitCode::RuntimeError
        } else {
            HarborExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Wire the registry, collaborators and engine together
fn build_engine(config: &Config) -> Result<(ReconcileEngine, mpsc::Receiver<EngineEvent>)> {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "cloudflare")]
    {
        info!("Registering Cloudflare provider");
        harbordns_provider_cloudflare::register(&registry);
    }

    #[cfg(feature = "docker")]
    {
        info!("Registering Docker discovery source");
        harbordns_discovery_docker::register(&registry);
    }

    let harbor_config = config.to_harbor_config();
    info!(
        "Source: {}, provider: {}, default record: {} -> {}{}",
        harbor_config.source.type_name(),
        harbor_config.provider.type_name(),
        config.default_type,
        config.default_target,
        if harbor_config.engine.dry_run {
            " (dry run)"
        } else {
            ""
        }
    );

    let source = registry.create_source(&harbor_config.source)?;
    let provider = registry.create_provider(&harbor_config.provider)?;

    Ok(ReconcileEngine::new(source, provider, harbor_config)?)
}

/// Run the engine until a shutdown signal arrives
async fn run_daemon(
    (mut engine, events): (ReconcileEngine, mpsc::Receiver<EngineEvent>),
) -> Result<()> {
    tokio::spawn(log_events(events));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let mut engine_task =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::select! {
        signal = wait_for_shutdown() => {
            info!("Received shutdown signal: {}", signal?);
        }
        joined = &mut engine_task => {
            // The engine only returns early on error
            return match joined {
                Ok(result) => result.map_err(Into::into),
                Err(e) => Err(anyhow::anyhow!("Engine task failed: {}", e)),
            };
        }
    }

    let _ = shutdown_tx.send(());

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, engine_task).await {
        Ok(Ok(result)) => {
            info!("Shutting down daemon");
            result.map_err(Into::into)
        }
        Ok(Err(e)) => Err(anyhow::anyhow!("Engine task failed: {}", e)),
        Err(_) => Err(anyhow::anyhow!(
            "Shutdown timeout after {:?}",
            SHUTDOWN_TIMEOUT
        )),
    }
}

/// Log cycle summaries from the engine event stream
async fn log_events(events: mpsc::Receiver<EngineEvent>) {
    let mut stream = ReceiverStream::new(events);
    while let Some(event) = stream.next().await {
        match event {
            EngineEvent::CycleCompleted { report } if report.changes.has_changes() => {
                info!(
                    "Cycle: {} discovered, +{} ~{} -{} queued, {} applied, {} skipped, {} failed, {} pending",
                    report.discovered,
                    report.changes.added,
                    report.changes.modified,
                    report.changes.deleted,
                    report.applied,
                    report.skipped,
                    report.failed,
                    report.pending
                );
            }
            other => debug!("Engine event: {:?}", other),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
