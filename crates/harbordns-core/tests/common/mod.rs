//! Test doubles and common utilities for reconciliation contract tests
//!
//! The provider double keeps an in-memory record table per zone and logs
//! every call, so tests can assert both the end state and exactly which
//! provider calls were made to reach it.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use harbordns_core::config::{EngineConfig, HarborConfig, ProviderConfig, SourceConfig};
use harbordns_core::engine::EngineEvent;
use harbordns_core::error::{Error, Result};
use harbordns_core::record::DesiredRecord;
use harbordns_core::traits::{DnsProvider, ExistingRecord, NewRecord, RecordSource, Zone};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A provider call, as seen by [`RecordingProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListZones,
    Lookup { zone: String, hostname: String },
    Create { zone: String, hostname: String, content: String },
    Update { record_id: String, content: String },
    Delete { record_id: String },
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::Create { .. } | Call::Update { .. } | Call::Delete { .. }
        )
    }
}

#[derive(Default)]
struct ProviderState {
    zones: Vec<Zone>,
    /// (zone id, record)
    records: Vec<(String, ExistingRecord)>,
    next_id: usize,
    calls: Vec<Call>,
    /// Operations that currently fail ("list_zones", "lookup", "create", ...)
    failing: HashSet<&'static str>,
}

/// In-memory DnsProvider that records every call
///
/// Clones share state, so a test can keep one handle while the engine
/// owns another.
#[derive(Clone)]
pub struct RecordingProvider {
    state: Arc<Mutex<ProviderState>>,
    name: &'static str,
}

impl RecordingProvider {
    /// Provider named "cloudflare" managing the given zones
    pub fn new(zones: &[(&str, &str)]) -> Self {
        Self::named("cloudflare", zones)
    }

    pub fn named(name: &'static str, zones: &[(&str, &str)]) -> Self {
        let state = ProviderState {
            zones: zones.iter().map(|(id, name)| Zone::new(*id, *name)).collect(),
            ..ProviderState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            name,
        }
    }

    /// Insert a record directly, without logging a call
    pub fn seed(
        &self,
        zone_id: &str,
        hostname: &str,
        record_type: &str,
        content: &str,
        ttl: u32,
        proxied: bool,
    ) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("seed-{}", state.next_id);
        state.records.push((
            zone_id.to_string(),
            ExistingRecord {
                id: id.clone(),
                name: hostname.to_string(),
                record_type: record_type.to_string(),
                content: content.to_string(),
                ttl,
                proxied,
            },
        ));
        id
    }

    /// Make an operation fail until [`RecordingProvider::recover`] is called
    pub fn fail(&self, op: &'static str) {
        self.state.lock().unwrap().failing.insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.state.lock().unwrap().failing.remove(op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn list_zone_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::ListZones))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// All records with the zone id they live in
    pub fn records(&self) -> Vec<(String, ExistingRecord)> {
        self.state.lock().unwrap().records.clone()
    }

    /// The first record with this name and type, in any zone
    pub fn record(&self, hostname: &str, record_type: &str) -> Option<ExistingRecord> {
        self.records()
            .into_iter()
            .map(|(_, r)| r)
            .find(|r| {
                r.name.eq_ignore_ascii_case(hostname)
                    && r.record_type.eq_ignore_ascii_case(record_type)
            })
    }

    fn begin(&self, op: &'static str, call: Call) -> Result<std::sync::MutexGuard<'_, ProviderState>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.failing.contains(op) {
            return Err(Error::provider(self.name, format!("injected {} failure", op)));
        }
        Ok(state)
    }
}

#[async_trait::async_trait]
impl DnsProvider for RecordingProvider {
    async fn list_zones(&self) -> Result<Vec<Zone>> {
        let state = self.begin("list_zones", Call::ListZones)?;
        Ok(state.zones.clone())
    }

    async fn lookup(
        &self,
        zone: &Zone,
        hostname: &str,
        record_type: &str,
    ) -> Result<Vec<ExistingRecord>> {
        let state = self.begin(
            "lookup",
            Call::Lookup {
                zone: zone.id.clone(),
                hostname: hostname.to_string(),
            },
        )?;
        Ok(state
            .records
            .iter()
            .filter(|(zone_id, r)| {
                *zone_id == zone.id
                    && r.name.eq_ignore_ascii_case(hostname)
                    && r.record_type.eq_ignore_ascii_case(record_type)
            })
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn create(&self, zone: &Zone, record: &NewRecord) -> Result<ExistingRecord> {
        let mut state = self.begin(
            "create",
            Call::Create {
                zone: zone.id.clone(),
                hostname: record.hostname.clone(),
                content: record.content.clone(),
            },
        )?;
        state.next_id += 1;
        let created = ExistingRecord {
            id: format!("rec-{}", state.next_id),
            name: record.hostname.clone(),
            record_type: record.record_type.clone(),
            content: record.content.clone(),
            ttl: record.ttl,
            proxied: record.proxied,
        };
        state.records.push((zone.id.clone(), created.clone()));
        Ok(created)
    }

    async fn update(&self, _zone: &Zone, record_id: &str, record: &NewRecord) -> Result<ExistingRecord> {
        let mut state = self.begin(
            "update",
            Call::Update {
                record_id: record_id.to_string(),
                content: record.content.clone(),
            },
        )?;
        let (_, existing) = state
            .records
            .iter_mut()
            .find(|(_, r)| r.id == record_id)
            .ok_or_else(|| Error::not_found(record_id.to_string()))?;
        existing.record_type = record.record_type.clone();
        existing.content = record.content.clone();
        existing.ttl = record.ttl;
        existing.proxied = record.proxied;
        Ok(existing.clone())
    }

    async fn delete(&self, _zone: &Zone, record_id: &str) -> Result<()> {
        let mut state = self.begin(
            "delete",
            Call::Delete {
                record_id: record_id.to_string(),
            },
        )?;
        let before = state.records.len();
        state.records.retain(|(_, r)| r.id != record_id);
        if state.records.len() == before {
            return Err(Error::not_found(record_id.to_string()));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

/// A source that can be switched into a failing state
#[derive(Clone, Default)]
pub struct FlakySource {
    records: Arc<Mutex<Vec<DesiredRecord>>>,
    failing: Arc<AtomicBool>,
    discover_calls: Arc<AtomicUsize>,
}

impl FlakySource {
    pub fn new(records: Vec<DesiredRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            ..Self::default()
        }
    }

    pub fn set_records(&self, records: Vec<DesiredRecord>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn discover_calls(&self) -> usize {
        self.discover_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RecordSource for FlakySource {
    async fn discover(&self) -> Result<Vec<DesiredRecord>> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::discovery("container runtime unreachable"));
        }
        Ok(self.records.lock().unwrap().clone())
    }

    fn source_name(&self) -> &'static str {
        "flaky"
    }
}

/// A CNAME descriptor with an explicit target
pub fn cname(hostname: &str, target: &str) -> DesiredRecord {
    DesiredRecord::new(hostname, "CNAME").with_target(target)
}

/// Configuration with token credentials and the given debounce window
pub fn minimal_config(debounce_secs: u64) -> HarborConfig {
    HarborConfig {
        provider: ProviderConfig::Cloudflare {
            api_token: Some("test-token".to_string()),
            api_email: None,
            api_key: None,
            base_url: None,
        },
        source: SourceConfig::Static {
            records: Vec::new(),
        },
        defaults: Default::default(),
        engine: EngineConfig {
            poll_interval_secs: 1,
            debounce_secs,
            ..EngineConfig::default()
        },
    }
}

/// `base` shifted by `secs` seconds
pub fn at(base: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
    base + chrono::Duration::seconds(secs)
}

/// Every event currently buffered on the engine channel
pub fn drain(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
