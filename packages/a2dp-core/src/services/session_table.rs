//! The session lock.
//!
//! [`SessionTable`] is the only path to the session machine. Every read of
//! connection, playing and codec state, and every directive forwarded to the
//! machine, happens while holding its mutex, so a check-then-forward sequence
//! run inside [`SessionTable::try_with_machine`] is atomic with respect to
//! other callers.
//!
//! The volume lock lives in
//! [`VolumeCoordinator`](super::VolumeCoordinator); nothing holds both.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::DeviceAddress;
use crate::error::SessionError;
use crate::stack::SessionMachine;
use crate::types::{CodecDescriptor, CodecStatus, ConnectionState, Directive};

/// Guarded handle to the session machine.
///
/// Holds `None` once the machine has been detached during teardown; every
/// accessor then degrades to a safe default.
pub struct SessionTable {
    machine: Mutex<Option<Arc<dyn SessionMachine>>>,
}

impl SessionTable {
    pub fn new(machine: Arc<dyn SessionMachine>) -> Self {
        Self {
            machine: Mutex::new(Some(machine)),
        }
    }

    /// Whether the session machine is still attached.
    pub fn is_attached(&self) -> bool {
        self.machine.lock().is_some()
    }

    /// Runs `f` against the machine under the session lock.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TornDown`] if the machine has been detached.
    pub fn try_with_machine<R>(
        &self,
        f: impl FnOnce(&dyn SessionMachine) -> R,
    ) -> Result<R, SessionError> {
        let guard = self.machine.lock();
        match guard.as_deref() {
            Some(machine) => Ok(f(machine)),
            None => Err(SessionError::TornDown),
        }
    }

    /// Runs `f` against the machine under the session lock, or returns
    /// `default` if it has been detached.
    pub fn with_machine<R>(&self, default: R, f: impl FnOnce(&dyn SessionMachine) -> R) -> R {
        self.try_with_machine(f).unwrap_or(default)
    }

    pub fn connection_state(&self, device: &DeviceAddress) -> ConnectionState {
        self.with_machine(ConnectionState::Disconnected, |m| {
            m.connection_state(device)
        })
    }

    pub fn connected_devices(&self) -> Vec<DeviceAddress> {
        self.with_machine(Vec::new(), |m| m.connected_devices())
    }

    pub fn devices_matching_states(&self, states: &[ConnectionState]) -> Vec<DeviceAddress> {
        self.with_machine(Vec::new(), |m| m.devices_matching_states(states))
    }

    pub fn playing_devices(&self) -> Vec<DeviceAddress> {
        self.with_machine(Vec::new(), |m| m.playing_devices())
    }

    pub fn is_playing(&self, device: &DeviceAddress) -> bool {
        self.with_machine(false, |m| m.is_playing(device))
    }

    /// Codec status for a device.
    ///
    /// # Errors
    ///
    /// [`SessionError::TornDown`] if detached, [`SessionError::NotAvailable`]
    /// if the machine has not negotiated codecs with the device yet.
    pub fn codec_status(&self, device: &DeviceAddress) -> Result<CodecStatus, SessionError> {
        self.try_with_machine(|m| m.codec_status(device))?
    }

    /// Selectable codec capabilities for a device.
    ///
    /// # Errors
    ///
    /// Same as [`codec_status`](Self::codec_status).
    pub fn codec_capabilities(
        &self,
        device: &DeviceAddress,
    ) -> Result<Vec<CodecDescriptor>, SessionError> {
        self.try_with_machine(|m| m.codec_capabilities(device))?
    }

    /// Forwards a directive. Returns `false` if the machine is detached.
    pub fn send_directive(&self, directive: Directive) -> bool {
        self.try_with_machine(|m| m.send_directive(directive)).is_ok()
    }

    pub fn is_multicast_enabled(&self) -> bool {
        self.with_machine(false, |m| m.is_multicast_enabled())
    }

    pub fn is_multicast_feature_enabled(&self) -> bool {
        self.with_machine(false, |m| m.is_multicast_feature_enabled())
    }

    pub fn latest_device(&self) -> Option<DeviceAddress> {
        self.with_machine(None, |m| m.latest_device())
    }

    pub fn dump(&self) -> serde_json::Value {
        self.with_machine(serde_json::Value::Null, |m| m.dump())
    }

    /// Stops the machine under the session lock. The machine stays attached
    /// so late readers still get answers until [`detach`](Self::detach).
    pub fn shutdown(&self) {
        let guard = self.machine.lock();
        if let Some(machine) = guard.as_deref() {
            log::info!("[Sessions] Stopping session machine");
            machine.shutdown();
        }
    }

    /// Drops the machine. Subsequent calls return safe defaults.
    pub fn detach(&self) -> Option<Arc<dyn SessionMachine>> {
        self.machine.lock().take()
    }
}
