//! Event system for observing coordinator decisions.
//!
//! This module provides:
//! - [`EventEmitter`] trait for services to emit events
//! - [`BroadcastEventBridge`] feeding the `/api/events` stream
//! - Event types for admission decisions and codec negotiation
//!
//! Session transitions use [`SessionEvent`] from the stack module unchanged.

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

pub use crate::stack::SessionEvent;

use serde::Serialize;

use crate::device::DeviceAddress;
use crate::error::PolicyRejection;
use crate::types::{OptionalCodecPreference, OptionalCodecSupport};

/// Every event the coordinator publishes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum CoordinatorEvent {
    /// Connect/disconnect admission decisions.
    Admission(AdmissionEvent),

    /// Transitions reported by the session machine.
    Session(SessionEvent),

    /// Codec negotiation outcomes.
    Codec(CodecEvent),
}

/// Which operation an admission decision was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionRequest {
    Connect,
    Disconnect,
}

/// Outcome of a connect or disconnect request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AdmissionEvent {
    /// The request was forwarded to the session machine.
    Accepted {
        device: DeviceAddress,
        request: AdmissionRequest,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The request was refused by policy.
    Rejected {
        device: DeviceAddress,
        request: AdmissionRequest,
        reason: PolicyRejection,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

/// Outcomes of the codec negotiation reactor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CodecEvent {
    /// The persisted optional-codec support fact changed.
    SupportUpdated {
        device: DeviceAddress,
        support: OptionalCodecSupport,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A stored preference was pushed to the session machine.
    PreferenceApplied {
        device: DeviceAddress,
        preference: OptionalCodecPreference,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

impl From<AdmissionEvent> for CoordinatorEvent {
    fn from(event: AdmissionEvent) -> Self {
        CoordinatorEvent::Admission(event)
    }
}

impl From<SessionEvent> for CoordinatorEvent {
    fn from(event: SessionEvent) -> Self {
        CoordinatorEvent::Session(event)
    }
}

impl From<CodecEvent> for CoordinatorEvent {
    fn from(event: CodecEvent) -> Self {
        CoordinatorEvent::Codec(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_category_and_type() {
        let event = CoordinatorEvent::from(AdmissionEvent::Rejected {
            device: "00:11:22:33:44:55".parse().unwrap(),
            request: AdmissionRequest::Connect,
            reason: PolicyRejection::PriorityOff,
            timestamp: 1,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["category"], "admission");
        assert_eq!(json["type"], "rejected");
        assert_eq!(json["request"], "connect");
        assert_eq!(json["reason"], "priority_off");
        assert_eq!(json["device"], "00:11:22:33:44:55");
    }
}
