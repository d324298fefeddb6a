//! # Configuration
//!
//! TOML configuration for the decoder, the patient registry, logging and the
//! capture replay tool. Every section is optional and falls back to the
//! defaults below.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use podlink::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Write a default file, then load it back
//!     Config::create_default("podlink.toml").await?;
//!     let config = Config::load("podlink.toml").await?;
//!
//!     println!("Buffer cap: {}", config.decoder.buffer_cap);
//!     println!("History window: {}", config.registry.history_window);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [decoder]
//! buffer_cap = 10000
//! duplicate_window_len = 20
//! checksum_policy = "advisory"   # or "reject"
//!
//! [registry]
//! history_window = 6
//! zero_means_unset = true
//!
//! [registry.pod_aliases]
//! "01" = "patient-01"
//!
//! [logging]
//! level = "info"
//! file = "podlink.log"
//!
//! [replay]
//! chunk_size = 20
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::fs;

use crate::patient::{MergePolicy, DEFAULT_HISTORY_WINDOW};
use crate::telemetry::framer::{DEFAULT_BUFFER_CAP, DEFAULT_DUPLICATE_WINDOW};
use crate::telemetry::packet::ChecksumPolicy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Hard cap of the per-connection decode buffer, in characters.
    #[serde(default = "default_buffer_cap")]
    pub buffer_cap: usize,
    /// Window used to detect a retransmitted chunk at the buffer head.
    #[serde(default = "default_duplicate_window_len")]
    pub duplicate_window_len: usize,
    #[serde(default)]
    pub checksum_policy: ChecksumPolicy,
}

fn default_buffer_cap() -> usize {
    DEFAULT_BUFFER_CAP
}

fn default_duplicate_window_len() -> usize {
    DEFAULT_DUPLICATE_WINDOW
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            buffer_cap: DEFAULT_BUFFER_CAP,
            duplicate_window_len: DEFAULT_DUPLICATE_WINDOW,
            checksum_policy: ChecksumPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Readings kept per patient.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Total packets never overwrite a value with `0`.
    #[serde(default = "default_zero_means_unset")]
    pub zero_means_unset: bool,
    /// Pod id to patient id. Pods without an entry use their own id.
    #[serde(default)]
    pub pod_aliases: BTreeMap<String, String>,
}

fn default_history_window() -> usize {
    DEFAULT_HISTORY_WINDOW
}

fn default_zero_means_unset() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
            zero_means_unset: true,
            pod_aliases: BTreeMap::new(),
        }
    }
}

impl RegistryConfig {
    pub fn merge_policy(&self) -> MergePolicy {
        MergePolicy {
            history_window: self.history_window,
            zero_means_unset: self.zero_means_unset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: Some("podlink.log".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Fragment size used when replaying a capture file.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    20
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;
        config.validate()?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.decoder.buffer_cap == 0 {
            return Err(anyhow!("decoder.buffer_cap must be greater than 0"));
        }
        if self.decoder.duplicate_window_len == 0 {
            return Err(anyhow!("decoder.duplicate_window_len must be greater than 0"));
        }
        let doubled = self.decoder.duplicate_window_len.checked_mul(2);
        if doubled.map_or(true, |len| len > self.decoder.buffer_cap) {
            return Err(anyhow!(
                "decoder.duplicate_window_len ({}) must fit twice into buffer_cap ({})",
                self.decoder.duplicate_window_len,
                self.decoder.buffer_cap
            ));
        }
        if self.registry.history_window == 0 {
            return Err(anyhow!("registry.history_window must be greater than 0"));
        }
        if self.replay.chunk_size == 0 {
            return Err(anyhow!("replay.chunk_size must be greater than 0"));
        }
        if let Some((pod, _)) = self
            .registry
            .pod_aliases
            .iter()
            .find(|(pod, patient)| pod.trim().is_empty() || patient.trim().is_empty())
        {
            return Err(anyhow!("registry.pod_aliases: empty alias for pod {:?}", pod));
        }
        Ok(())
    }
}
