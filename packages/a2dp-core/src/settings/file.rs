use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{SettingsKey, SettingsStore};
use crate::error::SettingsError;
use crate::protocol_constants::SETTINGS_FILE;

/// Settings store persisted as a JSON object in the data directory.
///
/// The file is read once on open and kept in memory. Every `put` rewrites the
/// whole file via a temp file + rename so a crash never leaves it half
/// written. Writes that don't change the stored value skip the disk.
pub struct JsonFileSettingsStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, i32>>,
}

impl JsonFileSettingsStore {
    /// Opens (or lazily creates) the settings file in `data_dir`.
    ///
    /// A missing file starts empty. A corrupt file is logged and replaced on
    /// the next write rather than failing startup.
    pub fn open(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                log::warn!(
                    "[Settings] Ignoring unreadable settings file {}: {}",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        log::info!(
            "[Settings] Loaded {} value(s) from {}",
            values.len(),
            path.display()
        );
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, values: &BTreeMap<String, i32>) -> Result<(), SettingsError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(values)?;
        std::fs::write(&temp_path, contents)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl SettingsStore for JsonFileSettingsStore {
    fn get(&self, key: &SettingsKey, default: i32) -> i32 {
        self.values
            .lock()
            .get(&key.to_string())
            .copied()
            .unwrap_or(default)
    }

    fn put(&self, key: &SettingsKey, value: i32) -> Result<(), SettingsError> {
        let mut values = self.values.lock();
        let previous = values.insert(key.to_string(), value);
        if previous == Some(value) {
            return Ok(());
        }
        if let Err(e) = self.save(&values) {
            // Keep memory consistent with disk.
            match previous {
                Some(old) => values.insert(key.to_string(), old),
                None => values.remove(&key.to_string()),
            };
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DeviceFact;

    fn key(fact: DeviceFact) -> SettingsKey {
        SettingsKey::new("AA:BB:CC:DD:EE:FF".parse().unwrap(), fact)
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = JsonFileSettingsStore::open(dir.path());
        store.put(&key(DeviceFact::OptionalCodecsEnabled), 1).unwrap();
        store.put(&key(DeviceFact::Priority), 0).unwrap();
        drop(store);

        let reopened = JsonFileSettingsStore::open(dir.path());
        assert_eq!(reopened.get(&key(DeviceFact::OptionalCodecsEnabled), -1), 1);
        assert_eq!(reopened.get(&key(DeviceFact::Priority), -1), 0);
        assert_eq!(
            reopened.get(&key(DeviceFact::OptionalCodecsSupported), -1),
            -1
        );
    }

    #[test]
    fn file_uses_rendered_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSettingsStore::open(dir.path());
        store.put(&key(DeviceFact::Priority), 100).unwrap();

        let contents = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(json["bluetooth_a2dp_sink_priority_AA:BB:CC:DD:EE:FF"], 100);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "not json").unwrap();

        let store = JsonFileSettingsStore::open(dir.path());
        assert_eq!(store.get(&key(DeviceFact::Priority), -1), -1);

        store.put(&key(DeviceFact::Priority), 0).unwrap();
        assert_eq!(
            JsonFileSettingsStore::open(dir.path()).get(&key(DeviceFact::Priority), -1),
            0
        );
    }
}
