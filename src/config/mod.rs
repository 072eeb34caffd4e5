//! # Configuration Management
//!
//! TOML-backed configuration for the trace engine and the analyzer CLI,
//! organized into sections:
//!
//! - [`TraceConfig`] - probe timeouts, retry policy, encoding mode
//! - [`CodecConfig`] - wire-format limits
//! - [`TopologyConfig`] - edge recency/expiration window
//! - [`StorageConfig`] - sled data directory
//! - [`LoggingConfig`] - log level and optional file target
//!
//! Every field has a sensible default, so an empty file (or no file) yields a
//! working configuration.
//!
//! ```toml
//! [trace]
//! timeout_base_seconds = 1.0
//! timeout_per_hop_seconds = 0.5
//! retry_count = 2
//! retry_delay_seconds = 1.0
//! mode = "one_byte"
//!
//! [topology]
//! edge_expiration_days = 7
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::time::Duration;

use crate::codec::DEFAULT_MAX_PATH_SIZE;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub codec: CodecConfig,
    #[serde(default)]
    pub topology: TopologyConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Trace protocol runner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Fixed component of the response window.
    pub timeout_base_seconds: f64,
    /// Per-hop component of the response window. Typical meshes land around
    /// ~1s for 6 hops with the defaults.
    pub timeout_per_hop_seconds: f64,
    /// Total attempts per logical trace (minimum 1).
    pub retry_count: u32,
    /// Fixed delay between attempts.
    pub retry_delay_seconds: f64,
    /// Cap on user-supplied path length.
    pub maximum_hops: usize,
    /// Wire encoding mode: "one_byte" (default) or "two_byte" prefixes.
    pub mode: TraceMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TraceMode {
    #[default]
    OneByte,
    TwoByte,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            timeout_base_seconds: 1.0,
            timeout_per_hop_seconds: 0.5,
            retry_count: 2,
            retry_delay_seconds: 1.0,
            maximum_hops: 16,
            mode: TraceMode::OneByte,
        }
    }
}

impl TraceConfig {
    /// Response window for a probe with `hops` hops: `base + max(1, hops) *
    /// per_hop`. The `max(1, ..)` keeps a floor for zero-hop flood probes.
    pub fn timeout_for_hops(&self, hops: usize) -> Duration {
        let total =
            self.timeout_base_seconds + hops.max(1) as f64 * self.timeout_per_hop_seconds;
        Duration::from_secs_f64(total.max(0.0))
    }

    /// Probe flags for the configured encoding mode.
    pub fn flags(&self) -> u8 {
        match self.mode {
            TraceMode::OneByte => 0,
            TraceMode::TwoByte => 1,
        }
    }
}

/// Wire-format limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Largest path byte length accepted from the packed encoding before the
    /// decoder assumes the legacy format.
    pub max_path_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_path_size: DEFAULT_MAX_PATH_SIZE,
        }
    }
}

/// Topology graph settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Window within which an edge observation (or a directory entry used to
    /// resolve one) still counts as current.
    pub edge_expiration_days: i64,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            edge_expiration_days: 7,
        }
    }
}

impl TopologyConfig {
    pub fn recency_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.edge_expiration_days.max(0))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the sled topology database.
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Write a default configuration file.
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.trace.retry_count, 2);
        assert_eq!(config.trace.retry_delay_seconds, 1.0);
        assert_eq!(config.codec.max_path_size, 64);
        assert_eq!(config.topology.edge_expiration_days, 7);
        assert_eq!(config.trace.flags(), 0);
    }

    #[test]
    fn timeout_scaling() {
        let trace = TraceConfig::default();
        assert_eq!(trace.timeout_for_hops(0), Duration::from_secs_f64(1.5));
        assert_eq!(trace.timeout_for_hops(1), Duration::from_secs_f64(1.5));
        assert_eq!(trace.timeout_for_hops(6), Duration::from_secs_f64(4.0));
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").expect("parse empty");
        assert_eq!(config.trace.retry_count, 2);
        assert_eq!(config.storage.data_dir, "./data");
    }

    #[test]
    fn partial_section_overrides() {
        let config: Config = toml::from_str(
            r#"
            [trace]
            timeout_base_seconds = 2.0
            timeout_per_hop_seconds = 0.25
            retry_count = 3
            retry_delay_seconds = 0.5
            maximum_hops = 8
            mode = "two_byte"
            "#,
        )
        .expect("parse");
        assert_eq!(config.trace.retry_count, 3);
        assert_eq!(config.trace.flags(), 1);
        // Untouched sections keep defaults.
        assert_eq!(config.topology.edge_expiration_days, 7);
    }

    #[test]
    fn single_field_override_keeps_sibling_defaults() {
        // The common user config: one section, one value.
        let config: Config = toml::from_str(
            r#"
            [trace]
            retry_count = 3
            "#,
        )
        .expect("parse single-field section");
        assert_eq!(config.trace.retry_count, 3);
        assert_eq!(config.trace.timeout_base_seconds, 1.0);
        assert_eq!(config.trace.mode, TraceMode::OneByte);

        let config: Config = toml::from_str("[storage]\ndata_dir = \"/var/mesh\"\n")
            .expect("parse single-field storage");
        assert_eq!(config.storage.data_dir, "/var/mesh");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).expect("serialize");
        let back: Config = toml::from_str(&text).expect("reparse");
        assert_eq!(back.trace.retry_count, config.trace.retry_count);
        assert_eq!(back.codec.max_path_size, config.codec.max_path_size);
    }
}
