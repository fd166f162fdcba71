//! Bridge from domain events to the broadcast transport.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::emitter::EventEmitter;
use super::{AdmissionEvent, CodecEvent, CoordinatorEvent, SessionEvent};

/// Bridges coordinator events to a `tokio::sync::broadcast` channel that
/// HTTP event-stream subscribers read from.
///
/// An optional external emitter (typically [`LoggingEventEmitter`]) receives
/// every event first.
///
/// [`LoggingEventEmitter`]: super::LoggingEventEmitter
#[derive(Clone)]
pub struct BroadcastEventBridge {
    tx: broadcast::Sender<CoordinatorEvent>,
    external_emitter: Arc<RwLock<Option<Arc<dyn EventEmitter>>>>,
}

impl BroadcastEventBridge {
    /// Creates a new bridge with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            external_emitter: Arc::new(RwLock::new(None)),
        }
    }

    /// Sets an external emitter that also receives every event.
    pub fn set_external_emitter(&self, emitter: Arc<dyn EventEmitter>) {
        *self.external_emitter.write() = Some(emitter);
    }

    /// Returns a new receiver for the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.tx.subscribe()
    }
}

/// Generates an [`EventEmitter`] method that forwards to the external emitter
/// (if set) and then sends to the broadcast channel.
macro_rules! impl_emit {
    ($method:ident, $event_ty:ty, $variant:ident) => {
        fn $method(&self, event: $event_ty) {
            if let Some(ref emitter) = *self.external_emitter.read() {
                emitter.$method(event.clone());
            }
            if let Err(e) = self.tx.send(CoordinatorEvent::$variant(event)) {
                log::trace!("[EventBridge] No broadcast receivers: {}", e);
            }
        }
    };
}

impl EventEmitter for BroadcastEventBridge {
    impl_emit!(emit_admission, AdmissionEvent, Admission);
    impl_emit!(emit_session, SessionEvent, Session);
    impl_emit!(emit_codec, CodecEvent, Codec);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AdmissionRequest;

    #[test]
    fn subscribers_receive_wrapped_events() {
        let bridge = BroadcastEventBridge::new(8);
        let mut rx = bridge.subscribe();

        bridge.emit_admission(AdmissionEvent::Accepted {
            device: "00:11:22:33:44:55".parse().unwrap(),
            request: AdmissionRequest::Disconnect,
            timestamp: 5,
        });

        match rx.try_recv().unwrap() {
            CoordinatorEvent::Admission(AdmissionEvent::Accepted { request, .. }) => {
                assert_eq!(request, AdmissionRequest::Disconnect);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn emitting_without_subscribers_is_harmless() {
        let bridge = BroadcastEventBridge::new(1);
        bridge.emit_codec(CodecEvent::SupportUpdated {
            device: "00:11:22:33:44:55".parse().unwrap(),
            support: crate::types::OptionalCodecSupport::Unsupported,
            timestamp: 0,
        });
    }
}
