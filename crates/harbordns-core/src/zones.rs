//! Zone resolution
//!
//! Maps a hostname to the provider zone that should hold its record. The
//! zone list is fetched lazily and cached for the life of the process; it
//! is refreshed only when a lookup misses and the cache is empty or older
//! than its configured maximum age. There is no timer-driven refresh.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::traits::{DnsProvider, Zone};

/// Whether `hostname` lives in `zone_name`
///
/// Matches on a label boundary: the hostname equals the zone apex or ends
/// with `"." + zone`. Case and a trailing dot are ignored.
pub fn zone_matches(zone_name: &str, hostname: &str) -> bool {
    let zone = normalize(zone_name);
    let host = normalize(hostname);
    if zone.is_empty() {
        return false;
    }
    host == zone
        || (host.len() > zone.len()
            && host.ends_with(zone.as_str())
            && host.as_bytes()[host.len() - zone.len() - 1] == b'.')
}

fn normalize(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Process-wide zone name → id cache
#[derive(Debug)]
pub struct ZoneCache {
    zones: Vec<Zone>,
    refreshed_at: Option<DateTime<Utc>>,
    max_age: Duration,
}

impl ZoneCache {
    /// Create an empty cache that goes stale after `max_age`
    pub fn new(max_age: Duration) -> Self {
        Self {
            zones: Vec::new(),
            refreshed_at: None,
            max_age,
        }
    }

    /// Create a cache pre-filled with zones, as if refreshed at `refreshed_at`
    pub fn with_zones(zones: Vec<Zone>, refreshed_at: DateTime<Utc>, max_age: Duration) -> Self {
        Self {
            zones,
            refreshed_at: Some(refreshed_at),
            max_age,
        }
    }

    /// Cached zones
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// The cached zone with the longest name containing `hostname`
    ///
    /// For zones `example.com` and `api.example.com`, the hostname
    /// `svc.api.example.com` resolves to `api.example.com`.
    pub fn longest_match(&self, hostname: &str) -> Option<&Zone> {
        self.zones
            .iter()
            .filter(|zone| zone_matches(&zone.name, hostname))
            .max_by_key(|zone| normalize(&zone.name).len())
    }

    /// Whether a miss should trigger a refresh
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        if self.zones.is_empty() {
            return true;
        }
        match self.refreshed_at {
            None => true,
            Some(at) => {
                let max_age =
                    chrono::Duration::from_std(self.max_age).unwrap_or(chrono::Duration::MAX);
                now.signed_duration_since(at) >= max_age
            }
        }
    }

    /// Replace the cache with the provider's current zone list
    pub async fn refresh_at(&mut self, provider: &dyn DnsProvider, now: DateTime<Utc>) -> Result<()> {
        let zones = provider.list_zones().await?;
        info!("Zone cache refreshed: {} zone(s)", zones.len());
        for zone in &zones {
            debug!("Zone: {} (ID: {})", zone.name, zone.id);
        }
        self.zones = zones;
        self.refreshed_at = Some(now);
        Ok(())
    }

    /// Resolve the zone for a hostname, using the wall clock
    pub async fn resolve(&mut self, provider: &dyn DnsProvider, hostname: &str) -> Result<Zone> {
        self.resolve_at(provider, hostname, Utc::now()).await
    }

    /// Resolve the zone for a hostname as of `now`
    ///
    /// On a miss with an empty or stale cache, refreshes once and retries.
    pub async fn resolve_at(
        &mut self,
        provider: &dyn DnsProvider,
        hostname: &str,
        now: DateTime<Utc>,
    ) -> Result<Zone> {
        if let Some(zone) = self.longest_match(hostname) {
            return Ok(zone.clone());
        }

        if !self.is_stale_at(now) {
            return Err(Error::zone_not_found(hostname));
        }

        debug!("No cached zone for {}, refreshing", hostname);
        self.refresh_at(provider, now).await?;

        self.longest_match(hostname)
            .cloned()
            .ok_or_else(|| Error::zone_not_found(hostname))
    }
}
