//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to. `0` scans the fallback range.
    /// Override: `A2DP_BIND_PORT`
    pub bind_port: u16,

    /// Raw maximum simultaneous A2DP connections. Only `2` selects two.
    /// Override: `A2DP_MAX_CONNECTIONS`
    pub max_connections: i32,

    /// Whether the multicast feature is provisioned.
    /// Override: `A2DP_MULTICAST`
    pub multicast: bool,

    /// Raw split-streaming flag. Absent, empty or `"true"` means enabled.
    /// Override: `A2DP_SPLIT_A2DP`
    pub split_a2dp: Option<String>,

    /// Capacity of the `/api/events` broadcast channel.
    pub event_channel_capacity: usize,

    /// Directory for persisted device facts.
    /// Override: `A2DP_DATA_DIR`
    pub data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core = a2dp_core::Config::default();
        Self {
            bind_port: core.preferred_port,
            max_connections: core.max_a2dp_connections,
            multicast: core.multicast,
            split_a2dp: core.split_a2dp,
            event_channel_capacity: core.event_channel_capacity,
            data_dir: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`; unparsable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("A2DP_BIND_PORT").and_then(|v| v.parse().ok()) {
            self.bind_port = port;
        }

        if let Some(max) = lookup("A2DP_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
            self.max_connections = max;
        }

        if let Some(val) = lookup("A2DP_MULTICAST") {
            match parse_flag(&val) {
                Some(multicast) => self.multicast = multicast,
                None => log::warn!("Ignoring unparsable A2DP_MULTICAST value: {:?}", val),
            }
        }

        if let Some(split) = lookup("A2DP_SPLIT_A2DP") {
            self.split_a2dp = Some(split);
        }

        // Note: A2DP_DATA_DIR is handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Converts to a2dp-core's Config type.
    pub fn to_core_config(&self) -> a2dp_core::Config {
        a2dp_core::Config {
            max_a2dp_connections: self.max_connections,
            multicast: self.multicast,
            split_a2dp: self.split_a2dp.clone(),
            preferred_port: self.bind_port,
            data_dir: self.data_dir.clone(),
            event_channel_capacity: self.event_channel_capacity,
        }
    }
}

/// Parses a boolean flag written as `true`/`false` or `1`/`0`.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
