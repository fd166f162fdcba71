//! Codec negotiation reactor.
//!
//! When a device reaches Connected, the reactor:
//! 1. reads the negotiated codec capabilities (under the session lock),
//! 2. persists whether any of them is optional, if the stored fact is
//!    Unknown or disagrees,
//! 3. if optional codecs are supported, pushes the stored user preference
//!    (Enabled or Disabled) back to the session machine.
//!
//! If codec status is not yet available, or the session machine is gone,
//! the whole cycle is skipped: nothing is persisted and no directive sent.

use std::sync::Arc;

use super::{CapabilityStore, SessionTable};
use crate::device::DeviceAddress;
use crate::events::{CodecEvent, EventEmitter};
use crate::types::{
    CodecDescriptor, ConnectionState, Directive, OptionalCodecPreference, OptionalCodecSupport,
};
use crate::utils::now_millis;

/// What one reactor cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationOutcome {
    /// The transition was not into Connected.
    Ignored,
    /// Codec status was unavailable or the session machine torn down.
    Skipped,
    /// The cycle ran to completion.
    Negotiated {
        support: OptionalCodecSupport,
        /// Whether the support fact was (re)written.
        support_written: bool,
        /// Preference pushed to the session machine, if any.
        applied: Option<OptionalCodecPreference>,
    },
}

/// Reacts to connection transitions by reconciling codec facts.
pub struct CodecNegotiationReactor {
    sessions: Arc<SessionTable>,
    capabilities: Arc<CapabilityStore>,
    emitter: Arc<dyn EventEmitter>,
}

impl CodecNegotiationReactor {
    pub fn new(
        sessions: Arc<SessionTable>,
        capabilities: Arc<CapabilityStore>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        Self {
            sessions,
            capabilities,
            emitter,
        }
    }

    /// Handles one connection state change.
    ///
    /// Only a transition into Connected does anything. The session lock is
    /// released between reading capabilities and sending the preference
    /// directive.
    pub fn on_connection_state_changed(
        &self,
        device: &DeviceAddress,
        state: ConnectionState,
    ) -> NegotiationOutcome {
        if state != ConnectionState::Connected {
            return NegotiationOutcome::Ignored;
        }

        let capabilities = match self.sessions.codec_capabilities(device) {
            Ok(capabilities) => capabilities,
            Err(e) => {
                log::warn!("[CodecNegotiation] Skipping {}: {}", device, e);
                return NegotiationOutcome::Skipped;
            }
        };

        let support = OptionalCodecSupport::from(has_optional_codec(&capabilities));
        let stored = self.capabilities.optional_codecs_supported(device);
        let mut support_written = false;
        // A stored Unknown never equals a computed value, so it is always written.
        if stored != support
            && self
                .capabilities
                .set_optional_codecs_supported(device, support == OptionalCodecSupport::Supported)
                .is_ok()
        {
            support_written = true;
            log::info!(
                "[CodecNegotiation] {} optional codec support: {:?} -> {:?}",
                device,
                stored,
                support
            );
            self.emitter.emit_codec(CodecEvent::SupportUpdated {
                device: *device,
                support,
                timestamp: now_millis(),
            });
        }

        let applied = if support == OptionalCodecSupport::Supported {
            self.apply_preference(device)
        } else {
            None
        };

        NegotiationOutcome::Negotiated {
            support,
            support_written,
            applied,
        }
    }

    fn apply_preference(&self, device: &DeviceAddress) -> Option<OptionalCodecPreference> {
        let preference = self.capabilities.optional_codecs_enabled(device);
        let directive = match preference {
            OptionalCodecPreference::Enabled => Directive::EnableOptionalCodecs(*device),
            OptionalCodecPreference::Disabled => Directive::DisableOptionalCodecs(*device),
            OptionalCodecPreference::Unknown => return None,
        };
        if !self.sessions.send_directive(directive) {
            log::debug!(
                "[CodecNegotiation] Session machine gone before applying preference for {}",
                device
            );
            return None;
        }
        log::info!(
            "[CodecNegotiation] Applied optional codec preference {:?} to {}",
            preference,
            device
        );
        self.emitter.emit_codec(CodecEvent::PreferenceApplied {
            device: *device,
            preference,
            timestamp: now_millis(),
        });
        Some(preference)
    }
}

/// Returns `true` if any codec beyond the mandatory baseline is selectable.
pub fn has_optional_codec(capabilities: &[CodecDescriptor]) -> bool {
    capabilities.iter().any(|codec| !codec.is_mandatory())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::events::{AdmissionEvent, SessionEvent};
    use crate::services::MulticastPolicy;
    use crate::settings::MemorySettingsStore;
    use crate::stack::{session_event_channel, LoopbackSessionMachine, SessionMachine};
    use crate::types::CodecType;

    struct CountingEmitter {
        support_updates: AtomicUsize,
        preferences: AtomicUsize,
    }

    impl EventEmitter for CountingEmitter {
        fn emit_admission(&self, _event: AdmissionEvent) {}

        fn emit_session(&self, _event: SessionEvent) {}

        fn emit_codec(&self, event: CodecEvent) {
            match event {
                CodecEvent::SupportUpdated { .. } => {
                    self.support_updates.fetch_add(1, Ordering::SeqCst)
                }
                CodecEvent::PreferenceApplied { .. } => {
                    self.preferences.fetch_add(1, Ordering::SeqCst)
                }
            };
        }
    }

    struct Fixture {
        machine: Arc<LoopbackSessionMachine>,
        sessions: Arc<SessionTable>,
        capabilities: Arc<CapabilityStore>,
        emitter: Arc<CountingEmitter>,
        reactor: CodecNegotiationReactor,
    }

    fn fixture() -> Fixture {
        let (tx, _rx) = session_event_channel();
        let machine = Arc::new(LoopbackSessionMachine::new(MulticastPolicy::default(), tx));
        let sessions = Arc::new(SessionTable::new(machine.clone()));
        let capabilities = Arc::new(CapabilityStore::new(Arc::new(MemorySettingsStore::new())));
        let emitter = Arc::new(CountingEmitter {
            support_updates: AtomicUsize::new(0),
            preferences: AtomicUsize::new(0),
        });
        let reactor =
            CodecNegotiationReactor::new(sessions.clone(), capabilities.clone(), emitter.clone());
        Fixture {
            machine,
            sessions,
            capabilities,
            emitter,
            reactor,
        }
    }

    fn addr() -> DeviceAddress {
        "00:11:22:33:44:55".parse().unwrap()
    }

    fn connect(f: &Fixture, codecs: Vec<CodecType>) {
        f.machine.register_remote_codecs(addr(), codecs);
        f.machine.send_directive(Directive::Connect(addr()));
    }

    fn optional_directives(f: &Fixture) -> Vec<Directive> {
        f.machine
            .directive_log()
            .into_iter()
            .filter(|d| {
                matches!(
                    d,
                    Directive::EnableOptionalCodecs(_) | Directive::DisableOptionalCodecs(_)
                )
            })
            .collect()
    }

    #[test]
    fn non_connected_transitions_are_ignored() {
        let f = fixture();
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Disconnecting,
            ConnectionState::Disconnected,
        ] {
            assert_eq!(
                f.reactor.on_connection_state_changed(&addr(), state),
                NegotiationOutcome::Ignored
            );
        }
    }

    #[test]
    fn first_connect_records_support_and_applies_enabled_preference() {
        let f = fixture();
        f.capabilities
            .set_optional_codecs_enabled(&addr(), OptionalCodecPreference::Enabled)
            .unwrap();
        connect(&f, vec![CodecType::Sbc, CodecType::Ldac]);

        let outcome = f
            .reactor
            .on_connection_state_changed(&addr(), ConnectionState::Connected);

        assert_eq!(
            outcome,
            NegotiationOutcome::Negotiated {
                support: OptionalCodecSupport::Supported,
                support_written: true,
                applied: Some(OptionalCodecPreference::Enabled),
            }
        );
        assert_eq!(
            f.capabilities.optional_codecs_supported(&addr()),
            OptionalCodecSupport::Supported
        );
        assert_eq!(
            optional_directives(&f),
            vec![Directive::EnableOptionalCodecs(addr())]
        );
        assert!(f.machine.optional_codecs_enabled(&addr()));
    }

    #[test]
    fn disabled_preference_sends_disable() {
        let f = fixture();
        f.capabilities
            .set_optional_codecs_enabled(&addr(), OptionalCodecPreference::Disabled)
            .unwrap();
        connect(&f, vec![CodecType::Sbc, CodecType::Aac]);

        f.reactor
            .on_connection_state_changed(&addr(), ConnectionState::Connected);
        assert_eq!(
            optional_directives(&f),
            vec![Directive::DisableOptionalCodecs(addr())]
        );
    }

    #[test]
    fn unknown_preference_sends_nothing() {
        let f = fixture();
        connect(&f, vec![CodecType::Sbc, CodecType::AptX]);

        let outcome = f
            .reactor
            .on_connection_state_changed(&addr(), ConnectionState::Connected);
        assert!(matches!(
            outcome,
            NegotiationOutcome::Negotiated { applied: None, .. }
        ));
        assert!(optional_directives(&f).is_empty());
    }

    #[test]
    fn sbc_only_device_is_unsupported_and_gets_no_directive() {
        let f = fixture();
        f.capabilities
            .set_optional_codecs_enabled(&addr(), OptionalCodecPreference::Enabled)
            .unwrap();
        connect(&f, vec![CodecType::Sbc]);

        let outcome = f
            .reactor
            .on_connection_state_changed(&addr(), ConnectionState::Connected);
        assert_eq!(
            outcome,
            NegotiationOutcome::Negotiated {
                support: OptionalCodecSupport::Unsupported,
                support_written: true,
                applied: None,
            }
        );
        assert!(optional_directives(&f).is_empty());
    }

    #[test]
    fn matching_stored_support_is_not_rewritten() {
        let f = fixture();
        f.capabilities
            .set_optional_codecs_supported(&addr(), true)
            .unwrap();
        connect(&f, vec![CodecType::Sbc, CodecType::Aac]);

        let outcome = f
            .reactor
            .on_connection_state_changed(&addr(), ConnectionState::Connected);
        assert!(matches!(
            outcome,
            NegotiationOutcome::Negotiated {
                support_written: false,
                ..
            }
        ));
        assert_eq!(f.emitter.support_updates.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn disagreeing_stored_support_is_corrected() {
        let f = fixture();
        f.capabilities
            .set_optional_codecs_supported(&addr(), true)
            .unwrap();
        connect(&f, vec![CodecType::Sbc]);

        f.reactor
            .on_connection_state_changed(&addr(), ConnectionState::Connected);
        assert_eq!(
            f.capabilities.optional_codecs_supported(&addr()),
            OptionalCodecSupport::Unsupported
        );
        assert_eq!(f.emitter.support_updates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stored_unsupported_is_upgraded_when_optional_codec_appears() {
        let f = fixture();
        f.capabilities
            .set_optional_codecs_supported(&addr(), false)
            .unwrap();
        connect(&f, vec![CodecType::Sbc, CodecType::Ldac]);

        let outcome = f
            .reactor
            .on_connection_state_changed(&addr(), ConnectionState::Connected);
        assert_eq!(
            outcome,
            NegotiationOutcome::Negotiated {
                support: OptionalCodecSupport::Supported,
                support_written: true,
                applied: None,
            }
        );
        assert_eq!(
            f.capabilities.optional_codecs_supported(&addr()),
            OptionalCodecSupport::Supported
        );
        assert_eq!(f.emitter.support_updates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unavailable_codec_status_skips_cycle() {
        let f = fixture();
        f.capabilities
            .set_optional_codecs_enabled(&addr(), OptionalCodecPreference::Enabled)
            .unwrap();
        connect(&f, vec![CodecType::Sbc, CodecType::Aac]);
        f.machine.set_codec_status_pending(addr(), true);

        assert_eq!(
            f.reactor
                .on_connection_state_changed(&addr(), ConnectionState::Connected),
            NegotiationOutcome::Skipped
        );
        assert_eq!(
            f.capabilities.optional_codecs_supported(&addr()),
            OptionalCodecSupport::Unknown
        );
        assert!(optional_directives(&f).is_empty());
    }

    #[test]
    fn torn_down_machine_skips_cycle() {
        let f = fixture();
        connect(&f, vec![CodecType::Sbc, CodecType::Aac]);
        f.sessions.detach();

        assert_eq!(
            f.reactor
                .on_connection_state_changed(&addr(), ConnectionState::Connected),
            NegotiationOutcome::Skipped
        );
        assert_eq!(f.emitter.preferences.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn mandatory_only_capabilities_have_no_optional_codec() {
        assert!(!has_optional_codec(&[]));
        assert!(!has_optional_codec(&[CodecDescriptor::cd_quality(
            CodecType::Sbc
        )]));
        assert!(has_optional_codec(&[
            CodecDescriptor::cd_quality(CodecType::Sbc),
            CodecDescriptor::cd_quality(CodecType::AptXHd),
        ]));
    }
}
