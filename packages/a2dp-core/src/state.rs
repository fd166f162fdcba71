//! Core configuration types.
//!
//! [`Config`] carries the raw startup values exactly as provisioned. The
//! interpretation (clamping the connection count, forcing two connections
//! for multicast, parsing the split-streaming flag) lives in
//! [`MulticastPolicy::from_config`](crate::services::MulticastPolicy::from_config)
//! so the raw values stay inspectable.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default HTTP control port.
pub const DEFAULT_PORT: u16 = 8095;

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Startup configuration for the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Raw maximum simultaneous connections. Only `2` selects two; any other
    /// value means one.
    pub max_a2dp_connections: i32,

    /// Whether the multicast feature is provisioned.
    pub multicast: bool,

    /// Raw split-streaming flag. Absent, empty or `"true"` means enabled.
    pub split_a2dp: Option<String>,

    /// Port the HTTP control surface binds to.
    pub preferred_port: u16,

    /// Directory for persisted device facts. `None` keeps them in memory.
    pub data_dir: Option<PathBuf>,

    /// Capacity of the broadcast channel feeding `/api/events` subscribers.
    pub event_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_a2dp_connections: 1,
            multicast: false,
            split_a2dp: None,
            preferred_port: DEFAULT_PORT,
            data_dir: None,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}
