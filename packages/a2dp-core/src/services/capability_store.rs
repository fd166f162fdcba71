//! Persisted per-device facts.
//!
//! Three independent facts per device address: observed optional-codec
//! support, the user's optional-codec preference and the connection
//! priority. Reads never fail; an absent or unrecognised value reads as
//! Unknown/Undefined.

use std::sync::Arc;

use serde::Serialize;

use crate::device::DeviceAddress;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::settings::{DeviceFact, SettingsKey, SettingsStore};
use crate::types::{OptionalCodecPreference, OptionalCodecSupport, Priority};

/// Snapshot of everything stored about one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityRecord {
    pub address: DeviceAddress,
    pub optional_codec_support: OptionalCodecSupport,
    pub optional_codec_preference: OptionalCodecPreference,
    pub priority: Priority,
}

/// Typed view over the durable settings service.
pub struct CapabilityStore {
    settings: Arc<dyn SettingsStore>,
}

impl CapabilityStore {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    fn read(&self, device: &DeviceAddress, fact: DeviceFact, default: i32) -> i32 {
        self.settings.get(&SettingsKey::new(*device, fact), default)
    }

    fn write(&self, device: &DeviceAddress, fact: DeviceFact, value: i32) -> CoordinatorResult<()> {
        let key = SettingsKey::new(*device, fact);
        self.settings.put(&key, value).map_err(|e| {
            log::warn!("[Capabilities] Failed to persist {}={}: {}", key, value, e);
            CoordinatorError::from(e)
        })
    }

    pub fn optional_codecs_supported(&self, device: &DeviceAddress) -> OptionalCodecSupport {
        OptionalCodecSupport::from_raw(self.read(
            device,
            DeviceFact::OptionalCodecsSupported,
            OptionalCodecSupport::Unknown.to_raw(),
        ))
    }

    pub fn set_optional_codecs_supported(
        &self,
        device: &DeviceAddress,
        supported: bool,
    ) -> CoordinatorResult<()> {
        let value = OptionalCodecSupport::from(supported);
        self.write(device, DeviceFact::OptionalCodecsSupported, value.to_raw())
    }

    pub fn optional_codecs_enabled(&self, device: &DeviceAddress) -> OptionalCodecPreference {
        OptionalCodecPreference::from_raw(self.read(
            device,
            DeviceFact::OptionalCodecsEnabled,
            OptionalCodecPreference::Unknown.to_raw(),
        ))
    }

    pub fn set_optional_codecs_enabled(
        &self,
        device: &DeviceAddress,
        preference: OptionalCodecPreference,
    ) -> CoordinatorResult<()> {
        self.write(device, DeviceFact::OptionalCodecsEnabled, preference.to_raw())
    }

    /// Stores a raw preference value.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::InvalidArgument`] without touching storage
    /// if `raw` is not one of -1, 0 or 1.
    pub fn set_optional_codecs_enabled_raw(
        &self,
        device: &DeviceAddress,
        raw: i32,
    ) -> CoordinatorResult<()> {
        match OptionalCodecPreference::try_from_raw(raw) {
            Some(preference) => self.set_optional_codecs_enabled(device, preference),
            None => {
                log::warn!(
                    "[Capabilities] Rejecting optional codec preference {} for {}",
                    raw,
                    device
                );
                Err(CoordinatorError::InvalidArgument(format!(
                    "optional codec preference must be -1, 0 or 1, got {raw}"
                )))
            }
        }
    }

    pub fn priority(&self, device: &DeviceAddress) -> Priority {
        Priority::from_raw(self.read(device, DeviceFact::Priority, Priority::Undefined.to_raw()))
    }

    pub fn set_priority(&self, device: &DeviceAddress, priority: Priority) -> CoordinatorResult<()> {
        log::debug!("[Capabilities] Priority of {} -> {:?}", device, priority);
        self.write(device, DeviceFact::Priority, priority.to_raw())
    }

    pub fn record(&self, device: &DeviceAddress) -> CapabilityRecord {
        CapabilityRecord {
            address: *device,
            optional_codec_support: self.optional_codecs_supported(device),
            optional_codec_preference: self.optional_codecs_enabled(device),
            priority: self.priority(device),
        }
    }
}
