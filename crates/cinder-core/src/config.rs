//! Cluster configuration: the recognized option set and its defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Process-wide, read-mostly configuration.
///
/// All durations are in seconds, RAM quantities in GiB unless noted. The
/// defaults are sized for a small production cluster and can be overridden
/// wholesale from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CinderConfig {
    /// Name this process records as the holder of substrate locks.
    pub node_name: String,

    /// How long scheduler metrics snapshots stay fresh.
    pub scheduler_cache_timeout_secs: u64,
    /// vCPUs offered per schedulable physical core.
    pub cpu_overcommit_ratio: f64,
    /// Virtual RAM offered per unit of physical RAM.
    pub ram_overcommit_ratio: f64,
    /// RAM held back for the operating system, in GiB.
    pub ram_system_reservation_gb: f64,
    /// Disk space the scheduler keeps free on every node, in GiB.
    pub minimum_free_disk_gb: u64,

    /// Grace period before a released address returns to the free pool.
    pub ip_deletion_halo_secs: u64,

    /// How long to wait for a substrate lock before failing.
    pub lock_attempt_timeout_secs: u64,
    /// Lease TTL on substrate locks.
    pub lock_ttl_secs: u64,
    /// How often a long-held lock should be refreshed by its holder.
    pub lock_refresh_interval_secs: u64,
}

impl Default for CinderConfig {
    fn default() -> Self {
        Self {
            node_name: "localhost".to_string(),
            scheduler_cache_timeout_secs: 5,
            cpu_overcommit_ratio: 16.0,
            ram_overcommit_ratio: 3.0,
            ram_system_reservation_gb: 5.0,
            minimum_free_disk_gb: 20,
            ip_deletion_halo_secs: 300,
            lock_attempt_timeout_secs: 60,
            lock_ttl_secs: 120,
            lock_refresh_interval_secs: 5,
        }
    }
}

impl CinderConfig {
    /// Load configuration from a TOML file. Unset options take defaults.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CinderConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = CinderConfig::default();
        assert_eq!(config.scheduler_cache_timeout_secs, 5);
        assert_eq!(config.cpu_overcommit_ratio, 16.0);
        assert_eq!(config.ram_overcommit_ratio, 3.0);
        assert_eq!(config.minimum_free_disk_gb, 20);
        assert!(config.lock_ttl_secs > config.lock_refresh_interval_secs);
    }

    #[test]
    fn parse_partial_toml_keeps_defaults() {
        let toml_str = r#"
node_name = "cg-node-1"
cpu_overcommit_ratio = 4.0
"#;
        let config: CinderConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.node_name, "cg-node-1");
        assert_eq!(config.cpu_overcommit_ratio, 4.0);
        // Everything else falls back to defaults.
        assert_eq!(config.ram_overcommit_ratio, 3.0);
        assert_eq!(config.ip_deletion_halo_secs, 300);
    }

    #[test]
    fn toml_round_trip() {
        let config = CinderConfig {
            node_name: "cg-node-2".to_string(),
            minimum_free_disk_gb: 50,
            ..CinderConfig::default()
        };
        let rendered = config.to_toml_string().unwrap();
        let parsed: CinderConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
