//! Boundary to the external Bluetooth stack.
//!
//! - [`traits`]: contracts for the session machine, AVRCP engine and audio
//!   activity signal
//! - [`loopback`]: in-process implementations used by the daemon and tests
//!
//! Also defines [`SessionEvent`], the inbound notification feed produced by
//! the session machine.

pub mod loopback;
pub mod traits;

use serde::Serialize;
use tokio::sync::mpsc;

pub use loopback::{AudioActivityFlag, LoopbackAvrcp, LoopbackSessionMachine};
pub use traits::{AudioActivity, AvrcpController, SessionMachine};

use crate::device::DeviceAddress;
use crate::types::{AudioState, ConnectionState};

/// Notifications published by the session machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// A device moved between connection states.
    ConnectionStateChanged {
        device: DeviceAddress,
        previous: ConnectionState,
        state: ConnectionState,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A connected device started or stopped streaming.
    AudioStateChanged {
        device: DeviceAddress,
        state: AudioState,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

impl SessionEvent {
    pub fn device(&self) -> &DeviceAddress {
        match self {
            Self::ConnectionStateChanged { device, .. } | Self::AudioStateChanged { device, .. } => {
                device
            }
        }
    }
}

/// Sending half of the session event feed.
pub type SessionEventSender = mpsc::UnboundedSender<SessionEvent>;

/// Receiving half of the session event feed.
pub type SessionEventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Creates a session event feed.
///
/// Unbounded so the session machine never blocks or drops a transition while
/// publishing; the consumer processes events strictly in arrival order.
pub fn session_event_channel() -> (SessionEventSender, SessionEventReceiver) {
    mpsc::unbounded_channel()
}
