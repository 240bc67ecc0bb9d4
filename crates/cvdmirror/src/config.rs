//! Run-scoped configuration.
//!
//! Constructed once at startup from an optional TOML file plus CLI
//! overrides, then passed by reference. Nothing here is process-global
//! or mutable after load.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use cvdmirror_fetch::Timeouts;
use serde::Deserialize;

pub const DEFAULT_MIRROR: &str = "http://database.clamav.net";
pub const FALLBACK_MIRROR: &str = "https://pivotal-clamav-mirror.s3.amazonaws.com";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Candidate mirror bases, probed in order.
    pub mirrors: Vec<String>,
    /// Port the serving layer binds.
    pub port: u16,
    /// Seconds between scheduled pipeline runs.
    pub update_interval_secs: u64,
    /// Follow each full artifact with its incremental patch.
    pub follow_diffs: bool,
    /// Reject admission of headers that parsed with field problems.
    pub strict_headers: bool,
    pub probe_timeout_secs: u64,
    pub transfer_timeout_secs: u64,
    /// Cache TTL; a stale entry is refreshed by a later run.
    pub cache_ttl_secs: u64,
    /// Total cache capacity, weighed by entry size.
    pub cache_capacity_bytes: u64,
    /// Upper bound for a single cached artifact.
    pub max_entry_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mirrors: vec![DEFAULT_MIRROR.to_string(), FALLBACK_MIRROR.to_string()],
            port: 8080,
            update_interval_secs: 3600,
            follow_diffs: true,
            strict_headers: true,
            probe_timeout_secs: 5,
            transfer_timeout_secs: 60,
            cache_ttl_secs: 3 * 3600,
            cache_capacity_bytes: 512 * 1024 * 1024,
            max_entry_bytes: 256 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load from a TOML file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            probe: Duration::from_secs(self.probe_timeout_secs),
            transfer: Duration::from_secs(self.transfer_timeout_secs),
        }
    }
}
