//! The coordinator facade.
//!
//! [`A2dpCoordinator`] is constructed once by the composition root and
//! shared by `Arc` with every caller. It is the only exposed surface: the
//! HTTP layer and embedders never reach the services directly.
//!
//! Two flavours of most operations exist:
//!
//! - plain methods (`connect`, `set_priority`, ...) keep the legacy
//!   contract: a policy rejection is `false`, a torn-down collaborator
//!   yields a safe default (empty list, `false`, Disconnected, Unknown)
//! - `try_*` methods return [`CoordinatorResult`] so callers that care can
//!   tell a rejection from an unavailable collaborator

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;

use crate::device::{Device, DeviceAddress};
use crate::error::{CoordinatorError, CoordinatorResult, PolicyRejection};
use crate::events::{AdmissionEvent, AdmissionRequest, EventEmitter};
use crate::protocol_constants::AVRCP_MAX_VOLUME;
use crate::services::{
    AdmissionController, CapabilityRecord, CapabilityStore, MulticastEvaluator, MulticastPolicy,
    SessionTable, VolumeCoordinator,
};
use crate::stack::AudioActivity;
use crate::types::{
    AudioState, CodecDescriptor, CodecStatus, ConnectionState, Directive, OptionalCodecPreference,
    OptionalCodecSupport, Priority,
};
use crate::utils::now_millis;

/// The A2DP session coordinator.
pub struct A2dpCoordinator {
    policy: MulticastPolicy,
    available: AtomicBool,
    sessions: Arc<SessionTable>,
    volume: Arc<VolumeCoordinator>,
    capabilities: Arc<CapabilityStore>,
    admission: AdmissionController,
    multicast: MulticastEvaluator,
    emitter: Arc<dyn EventEmitter>,
}

impl A2dpCoordinator {
    pub fn new(
        policy: MulticastPolicy,
        sessions: Arc<SessionTable>,
        volume: Arc<VolumeCoordinator>,
        capabilities: Arc<CapabilityStore>,
        audio: Arc<dyn AudioActivity>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        Self {
            policy,
            available: AtomicBool::new(true),
            admission: AdmissionController::new(Arc::clone(&sessions), Arc::clone(&capabilities)),
            multicast: MulticastEvaluator::new(Arc::clone(&sessions), audio),
            sessions,
            volume,
            capabilities,
            emitter,
        }
    }

    /// Whether the coordinator still accepts calls. `false` once
    /// [`shutdown`](Self::shutdown) has started.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> CoordinatorResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(CoordinatorError::Unavailable(
                "coordinator is shut down".to_string(),
            ))
        }
    }

    /// The immutable connection policy.
    pub fn policy(&self) -> MulticastPolicy {
        self.policy
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Admission
    // ─────────────────────────────────────────────────────────────────────────

    /// Requests a connection to `device`.
    ///
    /// Refused while multicast is ongoing and `device` is not one of the
    /// playing sinks; otherwise delegated to the admission controller.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::Rejected`] on policy refusal,
    /// [`CoordinatorError::Unavailable`] once torn down.
    pub fn try_connect(&self, device: &Device) -> CoordinatorResult<()> {
        self.ensure_available()?;
        let result = if self.multicast.is_multicast_ongoing(Some(&device.address)) {
            log::info!(
                "[Coordinator] Refusing connect to {}: multicast ongoing",
                device.address
            );
            Err(PolicyRejection::MulticastOngoing.into())
        } else {
            self.admission.request_connect(device)
        };
        self.report_admission(&device.address, AdmissionRequest::Connect, &result);
        result
    }

    pub fn connect(&self, device: &Device) -> bool {
        self.try_connect(device).is_ok()
    }

    /// Requests a disconnection of `device`.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::Rejected`] if not Connected or Connecting,
    /// [`CoordinatorError::Unavailable`] once torn down.
    pub fn try_disconnect(&self, device: &DeviceAddress) -> CoordinatorResult<()> {
        self.ensure_available()?;
        let result = self.admission.request_disconnect(device);
        self.report_admission(device, AdmissionRequest::Disconnect, &result);
        result
    }

    pub fn disconnect(&self, device: &DeviceAddress) -> bool {
        self.try_disconnect(device).is_ok()
    }

    fn report_admission(
        &self,
        device: &DeviceAddress,
        request: AdmissionRequest,
        result: &CoordinatorResult<()>,
    ) {
        let event = match result {
            Ok(()) => AdmissionEvent::Accepted {
                device: *device,
                request,
                timestamp: now_millis(),
            },
            Err(CoordinatorError::Rejected(reason)) => AdmissionEvent::Rejected {
                device: *device,
                request,
                reason: *reason,
                timestamp: now_millis(),
            },
            Err(_) => return,
        };
        self.emitter.emit_admission(event);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn connection_state(&self, device: &DeviceAddress) -> ConnectionState {
        if !self.is_available() {
            return ConnectionState::Disconnected;
        }
        self.sessions.connection_state(device)
    }

    pub fn connected_devices(&self) -> Vec<DeviceAddress> {
        if !self.is_available() {
            return Vec::new();
        }
        self.sessions.connected_devices()
    }

    pub fn devices_matching_states(&self, states: &[ConnectionState]) -> Vec<DeviceAddress> {
        if !self.is_available() {
            return Vec::new();
        }
        self.sessions.devices_matching_states(states)
    }

    pub fn playing_devices(&self) -> Vec<DeviceAddress> {
        if !self.is_available() {
            return Vec::new();
        }
        self.sessions.playing_devices()
    }

    pub fn is_playing(&self, device: &DeviceAddress) -> bool {
        self.is_available() && self.sessions.is_playing(device)
    }

    /// Most recently connected device.
    pub fn latest_device(&self) -> Option<DeviceAddress> {
        if !self.is_available() {
            return None;
        }
        self.sessions.latest_device()
    }

    /// Makes a connected device the active stream target.
    ///
    /// # Errors
    ///
    /// [`PolicyRejection::NotConnected`] unless the device is Connected.
    pub fn try_select_stream(&self, device: &DeviceAddress) -> CoordinatorResult<()> {
        self.ensure_available()?;
        self.sessions.try_with_machine(|machine| {
            if machine.connection_state(device) != ConnectionState::Connected {
                return Err(PolicyRejection::NotConnected);
            }
            machine.send_directive(Directive::SelectStream(*device));
            Ok(())
        })??;
        log::info!("[Coordinator] Selected {} as stream target", device);
        Ok(())
    }

    pub fn select_stream(&self, device: &DeviceAddress) -> bool {
        self.try_select_stream(device).is_ok()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Priority
    // ─────────────────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// [`CoordinatorError::Settings`] if the write fails.
    pub fn try_set_priority(
        &self,
        device: &DeviceAddress,
        priority: Priority,
    ) -> CoordinatorResult<()> {
        self.ensure_available()?;
        self.capabilities.set_priority(device, priority)
    }

    pub fn set_priority(&self, device: &DeviceAddress, priority: Priority) -> bool {
        self.try_set_priority(device, priority).is_ok()
    }

    pub fn priority(&self, device: &DeviceAddress) -> Priority {
        if !self.is_available() {
            return Priority::Undefined;
        }
        self.capabilities.priority(device)
    }

    /// Everything stored about a device.
    pub fn capability_record(&self, device: &DeviceAddress) -> CapabilityRecord {
        self.capabilities.record(device)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Codecs
    // ─────────────────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// [`CoordinatorError::Unavailable`] if codecs have not been negotiated
    /// with the device or the session machine is gone.
    pub fn try_codec_status(&self, device: &DeviceAddress) -> CoordinatorResult<CodecStatus> {
        self.ensure_available()?;
        Ok(self.sessions.codec_status(device)?)
    }

    pub fn codec_status(&self, device: &DeviceAddress) -> Option<CodecStatus> {
        self.try_codec_status(device).ok()
    }

    /// Asks the session machine to prefer a specific codec configuration.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::Unavailable`] once torn down.
    pub fn try_set_codec_config_preference(
        &self,
        device: &DeviceAddress,
        codec: CodecDescriptor,
    ) -> CoordinatorResult<()> {
        self.forward(Directive::SetCodecPreference {
            device: *device,
            codec,
        })
    }

    pub fn set_codec_config_preference(&self, device: &DeviceAddress, codec: CodecDescriptor) -> bool {
        self.try_set_codec_config_preference(device, codec).is_ok()
    }

    /// # Errors
    ///
    /// [`CoordinatorError::Unavailable`] once torn down.
    pub fn try_enable_optional_codecs(&self, device: &DeviceAddress) -> CoordinatorResult<()> {
        self.forward(Directive::EnableOptionalCodecs(*device))
    }

    pub fn enable_optional_codecs(&self, device: &DeviceAddress) -> bool {
        self.try_enable_optional_codecs(device).is_ok()
    }

    /// # Errors
    ///
    /// [`CoordinatorError::Unavailable`] once torn down.
    pub fn try_disable_optional_codecs(&self, device: &DeviceAddress) -> CoordinatorResult<()> {
        self.forward(Directive::DisableOptionalCodecs(*device))
    }

    pub fn disable_optional_codecs(&self, device: &DeviceAddress) -> bool {
        self.try_disable_optional_codecs(device).is_ok()
    }

    fn forward(&self, directive: Directive) -> CoordinatorResult<()> {
        self.ensure_available()?;
        self.sessions
            .try_with_machine(|machine| machine.send_directive(directive))?;
        Ok(())
    }

    pub fn supports_optional_codecs(&self, device: &DeviceAddress) -> OptionalCodecSupport {
        if !self.is_available() {
            return OptionalCodecSupport::Unknown;
        }
        self.capabilities.optional_codecs_supported(device)
    }

    pub fn optional_codecs_enabled(&self, device: &DeviceAddress) -> OptionalCodecPreference {
        if !self.is_available() {
            return OptionalCodecPreference::Unknown;
        }
        self.capabilities.optional_codecs_enabled(device)
    }

    /// Stores the optional-codec preference from its raw value (-1, 0, 1).
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::InvalidArgument`] for any other value; nothing is
    /// written in that case.
    pub fn try_set_optional_codecs_enabled(
        &self,
        device: &DeviceAddress,
        raw: i32,
    ) -> CoordinatorResult<()> {
        self.ensure_available()?;
        self.capabilities.set_optional_codecs_enabled_raw(device, raw)
    }

    pub fn set_optional_codecs_enabled(&self, device: &DeviceAddress, raw: i32) -> bool {
        self.try_set_optional_codecs_enabled(device, raw).is_ok()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Multicast
    // ─────────────────────────────────────────────────────────────────────────

    pub fn is_multicast_enabled(&self) -> bool {
        self.is_available() && self.multicast.is_multicast_enabled()
    }

    pub fn is_multicast_feature_enabled(&self) -> bool {
        self.is_available() && self.multicast.is_multicast_feature_enabled()
    }

    pub fn is_multicast_ongoing(&self, device: Option<&DeviceAddress>) -> bool {
        self.is_available() && self.multicast.is_multicast_ongoing(device)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Volume
    // ─────────────────────────────────────────────────────────────────────────

    pub fn is_absolute_volume_supported(&self) -> bool {
        self.is_available() && self.volume.is_absolute_volume_supported()
    }

    pub fn adjust_absolute_volume(&self, direction: i32) {
        if self.is_available() {
            self.volume.adjust_volume(direction);
        }
    }

    /// # Errors
    ///
    /// [`CoordinatorError::InvalidArgument`] if `level` exceeds the AVRCP
    /// maximum.
    pub fn try_set_absolute_volume(&self, level: u8) -> CoordinatorResult<()> {
        self.ensure_available()?;
        if level > AVRCP_MAX_VOLUME {
            log::warn!("[Coordinator] Rejecting absolute volume {}", level);
            return Err(CoordinatorError::InvalidArgument(format!(
                "absolute volume must be at most {AVRCP_MAX_VOLUME}, got {level}"
            )));
        }
        self.volume.set_absolute_volume(level);
        Ok(())
    }

    pub fn set_absolute_volume(&self, level: u8) {
        if let Err(e) = self.try_set_absolute_volume(level) {
            log::debug!("[Coordinator] Absolute volume not applied: {}", e);
        }
    }

    /// Tells the AVRCP engine a sink started or stopped streaming.
    pub fn set_avrcp_audio_state(&self, state: AudioState, device: &DeviceAddress) {
        if self.is_available() {
            self.volume.notify_audio_state(state, device);
        }
    }

    pub fn reset_avrcp_blacklist(&self, device: &DeviceAddress) {
        if self.is_available() {
            self.volume.reset_blacklist(device);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Diagnostic snapshot. Each subsystem is dumped under its own lock in
    /// turn.
    pub fn dump(&self) -> serde_json::Value {
        let sessions = self.sessions.dump();
        let avrcp = self.volume.dump();
        json!({
            "available": self.is_available(),
            "policy": self.policy,
            "sessionMachine": sessions,
            "avrcp": avrcp,
        })
    }

    /// Stops and releases both collaborators.
    ///
    /// Marks the coordinator unavailable first, then stops the session
    /// machine under the session lock and the AVRCP engine under the volume
    /// lock, then drops both. Safe to call more than once.
    pub fn shutdown(&self) {
        if !self.available.swap(false, Ordering::SeqCst) {
            return;
        }
        log::info!("[Coordinator] Shutting down");
        self.sessions.shutdown();
        self.volume.shutdown();
        self.sessions.detach();
        self.volume.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use crate::device::{AUDIO_SINK, AUDIO_SOURCE};
    use crate::events::{CodecEvent, SessionEvent};
    use crate::settings::MemorySettingsStore;
    use crate::stack::{
        session_event_channel, AudioActivityFlag, LoopbackAvrcp, LoopbackSessionMachine,
        SessionMachine,
    };

    #[derive(Default)]
    struct RecordingEmitter {
        admissions: Mutex<Vec<AdmissionEvent>>,
    }

    impl EventEmitter for RecordingEmitter {
        fn emit_admission(&self, event: AdmissionEvent) {
            self.admissions.lock().push(event);
        }

        fn emit_session(&self, _event: SessionEvent) {}

        fn emit_codec(&self, _event: CodecEvent) {}
    }

    struct Fixture {
        machine: Arc<LoopbackSessionMachine>,
        avrcp: Arc<LoopbackAvrcp>,
        audio: Arc<AudioActivityFlag>,
        emitter: Arc<RecordingEmitter>,
        coordinator: A2dpCoordinator,
    }

    fn fixture(policy: MulticastPolicy) -> Fixture {
        let (tx, _rx) = session_event_channel();
        let machine = Arc::new(LoopbackSessionMachine::new(policy, tx));
        let avrcp = Arc::new(LoopbackAvrcp::new());
        let audio = Arc::new(AudioActivityFlag::new(false));
        let emitter = Arc::new(RecordingEmitter::default());
        let coordinator = A2dpCoordinator::new(
            policy,
            Arc::new(SessionTable::new(machine.clone())),
            Arc::new(VolumeCoordinator::new(avrcp.clone())),
            Arc::new(CapabilityStore::new(Arc::new(MemorySettingsStore::new()))),
            audio.clone(),
            emitter.clone(),
        );
        Fixture {
            machine,
            avrcp,
            audio,
            emitter,
            coordinator,
        }
    }

    fn multicast_policy() -> MulticastPolicy {
        MulticastPolicy {
            max_connections: 2,
            multicast_feature_enabled: true,
            split_streaming_enabled: true,
        }
    }

    fn device(last: u8) -> Device {
        Device::new(
            DeviceAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, last]),
            vec![AUDIO_SINK],
        )
    }

    fn connect_count(f: &Fixture) -> usize {
        f.machine
            .directive_log()
            .iter()
            .filter(|d| matches!(d, Directive::Connect(_)))
            .count()
    }

    #[test]
    fn priority_off_blocks_connect_without_directive() {
        let f = fixture(MulticastPolicy::default());
        let a = device(1);
        assert!(f.coordinator.set_priority(&a.address, Priority::Off));

        assert!(!f.coordinator.connect(&a));
        assert_eq!(connect_count(&f), 0);
        assert_eq!(
            f.coordinator.connection_state(&a.address),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn repeated_connect_while_connecting_forwards_once() {
        let f = fixture(MulticastPolicy::default());
        f.machine.set_auto_complete(false);
        let a = device(1);

        assert!(f.coordinator.connect(&a));
        assert_eq!(
            f.coordinator.connection_state(&a.address),
            ConnectionState::Connecting
        );
        assert!(!f.coordinator.connect(&a));
        assert_eq!(connect_count(&f), 1);
    }

    #[test]
    fn single_connection_policy_never_exceeds_one() {
        let f = fixture(MulticastPolicy::default());
        for last in 1..=4 {
            assert!(f.coordinator.connect(&device(last)));
            assert!(f.coordinator.connected_devices().len() <= 1);
        }
        assert_eq!(f.coordinator.connected_devices(), vec![device(4).address]);
        assert!(!f.coordinator.is_multicast_ongoing(None));
    }

    #[test]
    fn multicast_scenario_blocks_third_device() {
        let f = fixture(multicast_policy());
        let (a, b, c) = (device(1), device(2), device(3));
        f.audio.set_active(true);

        assert!(f.coordinator.connect(&a));
        assert!(f.machine.set_playing(&a.address, true));
        assert!(!f.coordinator.is_multicast_ongoing(Some(&b.address)));

        assert!(f.coordinator.connect(&b));
        assert!(f.machine.set_playing(&b.address, true));
        assert!(f.coordinator.is_multicast_ongoing(None));
        assert!(!f.coordinator.is_multicast_ongoing(Some(&a.address)));

        let err = f.coordinator.try_connect(&c).unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::Rejected(PolicyRejection::MulticastOngoing)
        ));
        assert_eq!(connect_count(&f), 2);
        assert_eq!(f.coordinator.connected_devices().len(), 2);
    }

    #[test]
    fn multicast_needs_active_audio() {
        let f = fixture(multicast_policy());
        let (a, b) = (device(1), device(2));
        f.coordinator.connect(&a);
        f.coordinator.connect(&b);
        f.machine.set_playing(&a.address, true);
        f.machine.set_playing(&b.address, true);

        assert!(!f.coordinator.is_multicast_ongoing(None));
        assert!(f.coordinator.connect(&device(3)));
    }

    #[test]
    fn incompatible_remote_is_rejected() {
        let f = fixture(MulticastPolicy::default());
        let source_only = Device::new(device(1).address, vec![AUDIO_SOURCE]);

        assert!(matches!(
            f.coordinator.try_connect(&source_only),
            Err(CoordinatorError::Rejected(PolicyRejection::IncompatibleRemote))
        ));
        assert_eq!(connect_count(&f), 0);
    }

    #[test]
    fn disconnect_of_idle_device_is_rejected() {
        let f = fixture(MulticastPolicy::default());
        let a = device(1);
        assert!(!f.coordinator.disconnect(&a.address));

        f.coordinator.connect(&a);
        assert!(f.coordinator.disconnect(&a.address));
        assert_eq!(
            f.coordinator.connection_state(&a.address),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn admission_decisions_are_emitted() {
        let f = fixture(MulticastPolicy::default());
        let a = device(1);
        f.coordinator.connect(&a);
        f.coordinator.connect(&a);

        let events = f.emitter.admissions.lock();
        assert!(matches!(events[0], AdmissionEvent::Accepted { .. }));
        assert!(matches!(
            events[1],
            AdmissionEvent::Rejected {
                reason: PolicyRejection::AlreadyConnected,
                ..
            }
        ));
    }

    #[test]
    fn optional_codec_preference_round_trip() {
        let f = fixture(MulticastPolicy::default());
        let a = device(1).address;

        assert!(f.coordinator.set_optional_codecs_enabled(&a, 1));
        assert_eq!(
            f.coordinator.optional_codecs_enabled(&a),
            OptionalCodecPreference::Enabled
        );

        assert!(!f.coordinator.set_optional_codecs_enabled(&a, 5));
        assert_eq!(
            f.coordinator.optional_codecs_enabled(&a),
            OptionalCodecPreference::Enabled
        );
        assert!(matches!(
            f.coordinator.try_set_optional_codecs_enabled(&a, -2),
            Err(CoordinatorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn codec_directives_are_forwarded() {
        let f = fixture(MulticastPolicy::default());
        let a = device(1).address;
        f.coordinator.connect(&device(1));

        assert!(f.coordinator.enable_optional_codecs(&a));
        assert!(f.machine.optional_codecs_enabled(&a));
        assert!(f.coordinator.disable_optional_codecs(&a));
        assert!(!f.machine.optional_codecs_enabled(&a));

        let sbc = CodecDescriptor::cd_quality(crate::types::CodecType::Sbc);
        assert!(f.coordinator.set_codec_config_preference(&a, sbc));
        assert_eq!(
            f.coordinator.codec_status(&a).and_then(|s| s.current),
            Some(sbc)
        );
    }

    #[test]
    fn select_stream_requires_connection() {
        let f = fixture(multicast_policy());
        let (a, b) = (device(1), device(2));
        assert!(!f.coordinator.select_stream(&a.address));

        f.coordinator.connect(&a);
        f.coordinator.connect(&b);
        assert!(f.coordinator.select_stream(&b.address));
        assert_eq!(f.machine.active_device(), Some(b.address));
        assert_eq!(f.coordinator.latest_device(), Some(b.address));
    }

    #[test]
    fn volume_operations_reach_avrcp() {
        let f = fixture(MulticastPolicy::default());
        let a = device(1).address;

        f.coordinator.set_absolute_volume(100);
        assert_eq!(f.avrcp.volume(), 100);
        assert!(f.coordinator.try_set_absolute_volume(128).is_err());
        f.coordinator.set_absolute_volume(200);
        assert_eq!(f.avrcp.volume(), 100);

        f.coordinator.set_avrcp_audio_state(AudioState::Playing, &a);
        f.avrcp.blacklist(a);
        assert!(!f.coordinator.is_absolute_volume_supported());
        f.coordinator.reset_avrcp_blacklist(&a);
        assert!(f.coordinator.is_absolute_volume_supported());
    }

    #[test]
    fn shutdown_degrades_every_call_to_safe_defaults() {
        let f = fixture(multicast_policy());
        let a = device(1);
        f.coordinator.connect(&a);
        f.coordinator.set_optional_codecs_enabled(&a.address, 1);

        f.coordinator.shutdown();
        f.coordinator.shutdown();

        assert!(!f.coordinator.is_available());
        assert!(!f.coordinator.connect(&device(2)));
        assert!(!f.coordinator.disconnect(&a.address));
        assert_eq!(
            f.coordinator.connection_state(&a.address),
            ConnectionState::Disconnected
        );
        assert!(f.coordinator.connected_devices().is_empty());
        assert!(f.coordinator.playing_devices().is_empty());
        assert_eq!(
            f.coordinator.optional_codecs_enabled(&a.address),
            OptionalCodecPreference::Unknown
        );
        assert!(!f.coordinator.is_multicast_enabled());
        assert!(!f.coordinator.is_absolute_volume_supported());
        assert!(f.coordinator.codec_status(&a.address).is_none());
        assert!(matches!(
            f.coordinator.try_connect(&device(2)),
            Err(CoordinatorError::Unavailable(_))
        ));
        assert_eq!(f.coordinator.dump()["available"], false);
        // Loopback machine disconnected everything on stop.
        assert!(f.machine.connected_devices().is_empty());
    }

    #[test]
    fn concurrent_volume_and_session_traffic_does_not_deadlock() {
        let f = Arc::new(fixture(multicast_policy()));
        let mut handles = Vec::new();
        for worker in 0..4u8 {
            let f = Arc::clone(&f);
            handles.push(std::thread::spawn(move || {
                for i in 0..200 {
                    let d = device(worker);
                    if worker % 2 == 0 {
                        f.coordinator.connect(&d);
                        f.coordinator.is_multicast_ongoing(Some(&d.address));
                        f.coordinator.disconnect(&d.address);
                    } else {
                        f.coordinator.adjust_absolute_volume(if i % 2 == 0 { 1 } else { -1 });
                        f.coordinator.set_avrcp_audio_state(AudioState::Playing, &d.address);
                        f.coordinator.dump();
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(f.coordinator.connected_devices().len() <= 2);
    }
}
