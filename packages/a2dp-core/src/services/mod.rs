//! Application services layer.
//!
//! The coordination logic that sits between the exposed surface
//! ([`A2dpCoordinator`](crate::coordinator::A2dpCoordinator)) and the stack
//! collaborators. Two lock-owning structures guard all collaborator access:
//! [`SessionTable`] (session lock) and [`VolumeCoordinator`] (volume lock).

pub mod admission;
pub mod capability_store;
pub mod codec_negotiation;
pub mod multicast;
pub mod session_event_processor;
pub mod session_table;
pub mod volume_coordinator;

pub use admission::AdmissionController;
pub use capability_store::{CapabilityRecord, CapabilityStore};
pub use codec_negotiation::{CodecNegotiationReactor, NegotiationOutcome};
pub use multicast::{MulticastEvaluator, MulticastPolicy};
pub use session_event_processor::SessionEventProcessor;
pub use session_table::SessionTable;
pub use volume_coordinator::VolumeCoordinator;
