use dashmap::DashMap;

use super::{SettingsKey, SettingsStore};
use crate::error::SettingsError;

/// In-memory settings store.
///
/// Values live for the lifetime of the process. Keys are stored in their
/// rendered string form so the contents match what a file-backed store
/// would persist.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: DashMap<String, i32>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &SettingsKey, default: i32) -> i32 {
        self.values
            .get(&key.to_string())
            .map(|v| *v.value())
            .unwrap_or(default)
    }

    fn put(&self, key: &SettingsKey, value: i32) -> Result<(), SettingsError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}
