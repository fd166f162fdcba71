//! Event emitter abstraction for decoupling services from transport.
//!
//! Services depend on the [`EventEmitter`] trait rather than concrete
//! broadcast channels, enabling testing and alternative transports.

use super::{AdmissionEvent, CodecEvent, SessionEvent};

/// Trait for emitting coordinator events without knowledge of transport.
pub trait EventEmitter: Send + Sync {
    /// Emits a connect/disconnect admission decision.
    fn emit_admission(&self, event: AdmissionEvent);

    /// Emits a session machine transition.
    fn emit_session(&self, event: SessionEvent);

    /// Emits a codec negotiation outcome.
    fn emit_codec(&self, event: CodecEvent);
}

/// No-op emitter for tests and embedders that don't observe events.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_admission(&self, _event: AdmissionEvent) {}

    fn emit_session(&self, _event: SessionEvent) {}

    fn emit_codec(&self, _event: CodecEvent) {}
}

/// Logging emitter for debugging and development.
///
/// Logs all events at debug level.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_admission(&self, event: AdmissionEvent) {
        tracing::debug!(?event, "admission_event");
    }

    fn emit_session(&self, event: SessionEvent) {
        tracing::debug!(?event, "session_event");
    }

    fn emit_codec(&self, event: CodecEvent) {
        tracing::debug!(?event, "codec_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::events::AdmissionRequest;
    use crate::types::OptionalCodecSupport;

    /// Test emitter that counts events.
    struct CountingEventEmitter {
        admission_count: AtomicUsize,
        codec_count: AtomicUsize,
    }

    impl EventEmitter for CountingEventEmitter {
        fn emit_admission(&self, _event: AdmissionEvent) {
            self.admission_count.fetch_add(1, Ordering::SeqCst);
        }

        fn emit_session(&self, _event: SessionEvent) {}

        fn emit_codec(&self, _event: CodecEvent) {
            self.codec_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn emitter_is_object_safe() {
        let counting = Arc::new(CountingEventEmitter {
            admission_count: AtomicUsize::new(0),
            codec_count: AtomicUsize::new(0),
        });
        let emitter: Arc<dyn EventEmitter> = counting.clone();
        let device = "00:11:22:33:44:55".parse().unwrap();

        emitter.emit_admission(AdmissionEvent::Accepted {
            device,
            request: AdmissionRequest::Connect,
            timestamp: 0,
        });
        emitter.emit_codec(CodecEvent::SupportUpdated {
            device,
            support: OptionalCodecSupport::Supported,
            timestamp: 0,
        });

        assert_eq!(counting.admission_count.load(Ordering::SeqCst), 1);
        assert_eq!(counting.codec_count.load(Ordering::SeqCst), 1);
    }
}
