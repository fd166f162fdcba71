//! Durable key-value settings backing the device capability store.
//!
//! The coordinator treats persistent storage as an external service: it only
//! reads and writes integer facts keyed by device address. Two
//! implementations are provided:
//!
//! - [`MemorySettingsStore`]: process-lifetime storage for tests and
//!   deployments without a data directory.
//! - [`JsonFileSettingsStore`]: a JSON file in the data directory, written
//!   atomically on every change.

mod file;
mod memory;

use std::fmt;

pub use file::JsonFileSettingsStore;
pub use memory::MemorySettingsStore;

use crate::device::DeviceAddress;
use crate::error::SettingsError;
use crate::protocol_constants::{
    OPTIONAL_CODECS_ENABLED_KEY_PREFIX, PRIORITY_KEY_PREFIX, SUPPORTS_OPTIONAL_CODECS_KEY_PREFIX,
};

/// The independent facts persisted per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFact {
    /// Connection priority.
    Priority,
    /// Observed optional-codec support.
    OptionalCodecsSupported,
    /// User preference for optional codecs.
    OptionalCodecsEnabled,
}

impl DeviceFact {
    fn key_prefix(self) -> &'static str {
        match self {
            Self::Priority => PRIORITY_KEY_PREFIX,
            Self::OptionalCodecsSupported => SUPPORTS_OPTIONAL_CODECS_KEY_PREFIX,
            Self::OptionalCodecsEnabled => OPTIONAL_CODECS_ENABLED_KEY_PREFIX,
        }
    }
}

/// Storage key for one fact about one device.
///
/// Renders as `<fact prefix><address>`, e.g.
/// `bluetooth_a2dp_sink_priority_00:1A:7D:DA:71:13`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SettingsKey {
    pub address: DeviceAddress,
    pub fact: DeviceFact,
}

impl SettingsKey {
    pub fn new(address: DeviceAddress, fact: DeviceFact) -> Self {
        Self { address, fact }
    }
}

impl fmt::Display for SettingsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.fact.key_prefix(), self.address)
    }
}

/// Trait for the external durable key-value service.
///
/// Calls are synchronous and expected to be fast. Concurrent writers to the
/// same key resolve as last-writer-wins.
pub trait SettingsStore: Send + Sync {
    /// Reads an integer value, returning `default` if the key is absent.
    fn get(&self, key: &SettingsKey, default: i32) -> i32;

    /// Writes an integer value.
    fn put(&self, key: &SettingsKey, value: i32) -> Result<(), SettingsError>;
}
