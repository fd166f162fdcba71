//! Connect and disconnect admission.
//!
//! Connect checks run in order: stored priority, advertised audio roles,
//! then the current connection state. The state check and the forward of the
//! directive happen inside one session-lock critical section, so two racing
//! connects for the same device cannot both be forwarded.

use std::sync::Arc;

use super::{CapabilityStore, SessionTable};
use crate::device::{Device, DeviceAddress};
use crate::error::{CoordinatorResult, PolicyRejection};
use crate::types::{Directive, Priority};

/// Gatekeeper for connection requests.
pub struct AdmissionController {
    sessions: Arc<SessionTable>,
    capabilities: Arc<CapabilityStore>,
}

impl AdmissionController {
    pub fn new(sessions: Arc<SessionTable>, capabilities: Arc<CapabilityStore>) -> Self {
        Self {
            sessions,
            capabilities,
        }
    }

    /// Validates a connect request and forwards it to the session machine.
    ///
    /// Acceptance means the directive was handed over, not that the
    /// connection completed.
    ///
    /// # Errors
    ///
    /// - [`PolicyRejection::PriorityOff`] if the stored priority is Off
    /// - [`PolicyRejection::IncompatibleRemote`] if the remote is a source
    ///   without a sink role
    /// - [`PolicyRejection::AlreadyConnected`] if already Connected or
    ///   Connecting
    /// - [`CoordinatorError::Unavailable`] if the session machine is gone
    ///
    /// [`CoordinatorError::Unavailable`]: crate::error::CoordinatorError::Unavailable
    pub fn request_connect(&self, device: &Device) -> CoordinatorResult<()> {
        let address = device.address;

        if self.capabilities.priority(&address) == Priority::Off {
            log::info!("[Admission] Refusing connect to {}: priority off", address);
            return Err(PolicyRejection::PriorityOff.into());
        }

        if device.has_incompatible_audio_roles() {
            log::error!(
                "[Admission] Remote {} advertises AudioSource without AudioSink",
                address
            );
            return Err(PolicyRejection::IncompatibleRemote.into());
        }

        self.sessions.try_with_machine(|machine| {
            let state = machine.connection_state(&address);
            if state.is_connected_or_connecting() {
                log::info!("[Admission] Refusing connect to {}: {:?}", address, state);
                return Err(PolicyRejection::AlreadyConnected);
            }
            machine.send_directive(Directive::Connect(address));
            Ok(())
        })??;

        log::info!("[Admission] Connect forwarded for {}", address);
        Ok(())
    }

    /// Validates a disconnect request and forwards it to the session machine.
    ///
    /// # Errors
    ///
    /// [`PolicyRejection::NotConnected`] unless the device is Connected or
    /// Connecting; `Unavailable` if the session machine is gone.
    pub fn request_disconnect(&self, device: &DeviceAddress) -> CoordinatorResult<()> {
        self.sessions.try_with_machine(|machine| {
            let state = machine.connection_state(device);
            if !state.is_connected_or_connecting() {
                log::info!("[Admission] Refusing disconnect of {}: {:?}", device, state);
                return Err(PolicyRejection::NotConnected);
            }
            machine.send_directive(Directive::Disconnect(*device));
            Ok(())
        })??;

        log::info!("[Admission] Disconnect forwarded for {}", device);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use crate::device::{AUDIO_SINK, AUDIO_SOURCE};
    use crate::error::{CoordinatorError, SessionError};
    use crate::settings::MemorySettingsStore;
    use crate::stack::SessionMachine;
    use crate::types::{CodecStatus, ConnectionState};

    /// Session machine mock with a fixed state and a directive counter.
    struct MockMachine {
        state: Mutex<ConnectionState>,
        directives: Mutex<Vec<Directive>>,
        state_reads: AtomicUsize,
    }

    impl MockMachine {
        fn new(state: ConnectionState) -> Arc<Self> {
            Arc::new(Self {
                state: Mutex::new(state),
                directives: Mutex::new(Vec::new()),
                state_reads: AtomicUsize::new(0),
            })
        }
    }

    impl SessionMachine for MockMachine {
        fn connection_state(&self, _device: &DeviceAddress) -> ConnectionState {
            self.state_reads.fetch_add(1, Ordering::SeqCst);
            *self.state.lock()
        }

        fn devices_matching_states(&self, _states: &[ConnectionState]) -> Vec<DeviceAddress> {
            Vec::new()
        }

        fn playing_devices(&self) -> Vec<DeviceAddress> {
            Vec::new()
        }

        fn codec_status(&self, device: &DeviceAddress) -> Result<CodecStatus, SessionError> {
            Err(SessionError::NotAvailable(device.to_string()))
        }

        fn send_directive(&self, directive: Directive) {
            // Mimic a machine that moves to Connecting synchronously.
            if matches!(directive, Directive::Connect(_)) {
                *self.state.lock() = ConnectionState::Connecting;
            }
            self.directives.lock().push(directive);
        }

        fn is_multicast_enabled(&self) -> bool {
            false
        }

        fn is_multicast_feature_enabled(&self) -> bool {
            false
        }

        fn latest_device(&self) -> Option<DeviceAddress> {
            None
        }

        fn shutdown(&self) {}

        fn dump(&self) -> serde_json::Value {
            serde_json::Value::Null
        }
    }

    fn addr() -> DeviceAddress {
        "00:11:22:33:44:55".parse().unwrap()
    }

    fn controller(machine: Arc<MockMachine>) -> (AdmissionController, Arc<CapabilityStore>) {
        let capabilities = Arc::new(CapabilityStore::new(Arc::new(MemorySettingsStore::new())));
        let sessions = Arc::new(SessionTable::new(machine));
        (
            AdmissionController::new(sessions, capabilities.clone()),
            capabilities,
        )
    }

    fn rejection(result: CoordinatorResult<()>) -> PolicyRejection {
        match result {
            Err(CoordinatorError::Rejected(reason)) => reason,
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn connect_forwards_for_disconnected_device() {
        let machine = MockMachine::new(ConnectionState::Disconnected);
        let (admission, _) = controller(machine.clone());

        admission.request_connect(&Device::bare(addr())).unwrap();
        assert_eq!(*machine.directives.lock(), vec![Directive::Connect(addr())]);
    }

    #[test]
    fn priority_off_rejects_without_reading_state() {
        let machine = MockMachine::new(ConnectionState::Disconnected);
        let (admission, capabilities) = controller(machine.clone());
        capabilities.set_priority(&addr(), Priority::Off).unwrap();

        assert_eq!(
            rejection(admission.request_connect(&Device::bare(addr()))),
            PolicyRejection::PriorityOff
        );
        assert_eq!(machine.state_reads.load(Ordering::SeqCst), 0);
        assert!(machine.directives.lock().is_empty());
    }

    #[test]
    fn source_only_remote_is_rejected() {
        let machine = MockMachine::new(ConnectionState::Disconnected);
        let (admission, _) = controller(machine.clone());

        let device = Device::new(addr(), vec![AUDIO_SOURCE]);
        assert_eq!(
            rejection(admission.request_connect(&device)),
            PolicyRejection::IncompatibleRemote
        );
        assert!(machine.directives.lock().is_empty());

        let dual_role = Device::new(addr(), vec![AUDIO_SOURCE, AUDIO_SINK]);
        admission.request_connect(&dual_role).unwrap();
    }

    #[test]
    fn connected_or_connecting_device_is_rejected() {
        for state in [ConnectionState::Connected, ConnectionState::Connecting] {
            let machine = MockMachine::new(state);
            let (admission, _) = controller(machine.clone());
            assert_eq!(
                rejection(admission.request_connect(&Device::bare(addr()))),
                PolicyRejection::AlreadyConnected
            );
            assert!(machine.directives.lock().is_empty());
        }
    }

    #[test]
    fn second_connect_is_rejected_once_first_is_forwarded() {
        let machine = MockMachine::new(ConnectionState::Disconnected);
        let (admission, _) = controller(machine.clone());

        admission.request_connect(&Device::bare(addr())).unwrap();
        assert_eq!(
            rejection(admission.request_connect(&Device::bare(addr()))),
            PolicyRejection::AlreadyConnected
        );
        assert_eq!(machine.directives.lock().len(), 1);
    }

    #[test]
    fn concurrent_connects_forward_once() {
        let machine = MockMachine::new(ConnectionState::Disconnected);
        let (admission, _) = controller(machine.clone());
        let admission = Arc::new(admission);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let admission = admission.clone();
                std::thread::spawn(move || admission.request_connect(&Device::bare(addr())).is_ok())
            })
            .collect();
        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(accepted, 1);
        assert_eq!(machine.directives.lock().len(), 1);
    }

    #[test]
    fn disconnect_requires_connected_or_connecting() {
        for state in [ConnectionState::Disconnected, ConnectionState::Disconnecting] {
            let machine = MockMachine::new(state);
            let (admission, _) = controller(machine.clone());
            assert_eq!(
                rejection(admission.request_disconnect(&addr())),
                PolicyRejection::NotConnected
            );
            assert!(machine.directives.lock().is_empty());
        }

        for state in [ConnectionState::Connected, ConnectionState::Connecting] {
            let machine = MockMachine::new(state);
            let (admission, _) = controller(machine.clone());
            admission.request_disconnect(&addr()).unwrap();
            assert_eq!(
                *machine.directives.lock(),
                vec![Directive::Disconnect(addr())]
            );
        }
    }

    #[test]
    fn torn_down_machine_is_unavailable() {
        let machine = MockMachine::new(ConnectionState::Disconnected);
        let capabilities = Arc::new(CapabilityStore::new(Arc::new(MemorySettingsStore::new())));
        let sessions = Arc::new(SessionTable::new(machine));
        sessions.detach();
        let admission = AdmissionController::new(sessions, capabilities);

        assert!(matches!(
            admission.request_connect(&Device::bare(addr())),
            Err(CoordinatorError::Unavailable(_))
        ));
        assert!(matches!(
            admission.request_disconnect(&addr()),
            Err(CoordinatorError::Unavailable(_))
        ));
    }
}
