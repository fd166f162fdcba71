//! Trait abstractions for the external Bluetooth collaborators.
//!
//! These traits enable dependency injection for testability and modularity.
//! Coordinator services depend on traits rather than concrete stack
//! implementations. All calls are synchronous, in-process and expected to
//! return quickly; none of them may block waiting on a remote device.

use crate::device::DeviceAddress;
use crate::error::SessionError;
use crate::types::{AudioState, CodecDescriptor, CodecStatus, ConnectionState, Directive};

/// The per-device A2DP stream state machine.
///
/// Owns the authoritative connection table. The coordinator only queries it
/// and sends it directives, always under the session lock.
pub trait SessionMachine: Send + Sync {
    /// Current connection state of a device (Disconnected if unknown).
    fn connection_state(&self, device: &DeviceAddress) -> ConnectionState;

    /// Devices currently in any of the given states.
    fn devices_matching_states(&self, states: &[ConnectionState]) -> Vec<DeviceAddress>;

    /// Devices in the Connected state.
    fn connected_devices(&self) -> Vec<DeviceAddress> {
        self.devices_matching_states(&[ConnectionState::Connected])
    }

    /// Connected devices that are currently streaming.
    fn playing_devices(&self) -> Vec<DeviceAddress>;

    /// Whether a specific device is streaming.
    fn is_playing(&self, device: &DeviceAddress) -> bool {
        self.playing_devices().contains(device)
    }

    /// Negotiated codec status for a device.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotAvailable`] if the codec exchange has not
    /// completed yet.
    fn codec_status(&self, device: &DeviceAddress) -> Result<CodecStatus, SessionError>;

    /// The codec configurations both sides can use.
    fn codec_capabilities(
        &self,
        device: &DeviceAddress,
    ) -> Result<Vec<CodecDescriptor>, SessionError> {
        self.codec_status(device)
            .map(|status| status.selectable_capabilities)
    }

    /// Queues a directive. Must return without waiting for the transition.
    fn send_directive(&self, directive: Directive);

    /// Whether multicast is currently usable (may depend on SoC support).
    fn is_multicast_enabled(&self) -> bool;

    /// Whether the multicast feature was provisioned.
    fn is_multicast_feature_enabled(&self) -> bool;

    /// Most recently connected device, if any.
    fn latest_device(&self) -> Option<DeviceAddress>;

    /// Stops processing and disconnects all devices.
    fn shutdown(&self);

    /// Diagnostic snapshot.
    fn dump(&self) -> serde_json::Value;
}

/// The AVRCP remote-control engine (absolute volume side).
pub trait AvrcpController: Send + Sync {
    /// Whether the active sink accepts absolute volume commands.
    fn is_absolute_volume_supported(&self) -> bool;

    /// Moves the volume by a signed number of steps.
    fn adjust_volume(&self, direction: i32);

    /// Sets the absolute volume level.
    fn set_absolute_volume(&self, level: u8);

    /// Informs the engine that a sink started or stopped streaming.
    fn notify_audio_state(&self, state: AudioState, device: &DeviceAddress);

    /// Clears any absolute-volume blacklisting for a device.
    fn reset_blacklist(&self, device: &DeviceAddress);

    /// Stops the engine.
    fn shutdown(&self);

    /// Diagnostic snapshot.
    fn dump(&self) -> serde_json::Value;
}

/// Whether the system is currently rendering audio.
pub trait AudioActivity: Send + Sync {
    fn is_audio_active(&self) -> bool;
}
