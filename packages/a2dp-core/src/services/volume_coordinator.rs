//! Absolute volume brokering.
//!
//! [`VolumeCoordinator`] owns the volume lock: the only path to the AVRCP
//! engine. It never touches the session lock, and nothing holding the
//! session lock calls into it.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::DeviceAddress;
use crate::stack::AvrcpController;
use crate::types::AudioState;

/// Guarded handle to the AVRCP engine.
pub struct VolumeCoordinator {
    avrcp: Mutex<Option<Arc<dyn AvrcpController>>>,
}

impl VolumeCoordinator {
    pub fn new(avrcp: Arc<dyn AvrcpController>) -> Self {
        Self {
            avrcp: Mutex::new(Some(avrcp)),
        }
    }

    fn with_avrcp<R>(&self, default: R, f: impl FnOnce(&dyn AvrcpController) -> R) -> R {
        let guard = self.avrcp.lock();
        match guard.as_deref() {
            Some(avrcp) => f(avrcp),
            None => {
                log::debug!("[Volume] AVRCP engine not available");
                default
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.avrcp.lock().is_some()
    }

    /// Whether the active sink accepts absolute volume. `false` once torn
    /// down.
    pub fn is_absolute_volume_supported(&self) -> bool {
        self.with_avrcp(false, |a| a.is_absolute_volume_supported())
    }

    /// Moves the volume by `direction` steps. No-op once torn down.
    pub fn adjust_volume(&self, direction: i32) {
        self.with_avrcp((), |a| a.adjust_volume(direction));
    }

    /// Sets the absolute volume. No-op once torn down.
    pub fn set_absolute_volume(&self, level: u8) {
        self.with_avrcp((), |a| a.set_absolute_volume(level));
    }

    /// Relays a streaming state change to the AVRCP engine.
    pub fn notify_audio_state(&self, state: AudioState, device: &DeviceAddress) {
        log::debug!("[Volume] {} audio state {:?}", device, state);
        self.with_avrcp((), |a| a.notify_audio_state(state, device));
    }

    pub fn reset_blacklist(&self, device: &DeviceAddress) {
        self.with_avrcp((), |a| a.reset_blacklist(device));
    }

    pub fn dump(&self) -> serde_json::Value {
        self.with_avrcp(serde_json::Value::Null, |a| a.dump())
    }

    /// Stops the engine under the volume lock.
    pub fn shutdown(&self) {
        self.with_avrcp((), |a| {
            log::info!("[Volume] Stopping AVRCP engine");
            a.shutdown();
        });
    }

    /// Drops the engine. Subsequent calls are no-ops or return defaults.
    pub fn detach(&self) -> Option<Arc<dyn AvrcpController>> {
        self.avrcp.lock().take()
    }
}
