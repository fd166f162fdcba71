//! A2DP Core - session coordination for an audio-source Bluetooth stack.
//!
//! This crate sits between callers (settings UIs, media frameworks, the HTTP
//! API) and two external collaborators: the per-device A2DP session machine
//! and the AVRCP volume engine. It decides whether connections are admitted,
//! whether multicast streaming is active, persists per-device codec facts and
//! brokers absolute-volume commands.
//!
//! # Architecture
//!
//! - [`coordinator`]: The [`A2dpCoordinator`] facade every caller goes through
//! - [`services`]: Admission, multicast policy, capability persistence, codec
//!   negotiation and volume brokering
//! - [`stack`]: Collaborator contracts and the in-process loopback stack
//! - [`settings`]: Durable per-device key-value storage
//! - [`events`]: Event system for observers
//! - [`api`]: HTTP surface over the coordinator
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! - [`SessionMachine`](stack::SessionMachine): The per-device A2DP state machine
//! - [`AvrcpController`](stack::AvrcpController): The AVRCP volume engine
//! - [`AudioActivity`](stack::AudioActivity): Whether any audio is active
//! - [`SettingsStore`](settings::SettingsStore): Durable device facts
//! - [`TaskSpawner`](runtime::TaskSpawner): Spawning background tasks
//! - [`EventEmitter`](events::EventEmitter): Emitting domain events

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod coordinator;
pub mod device;
pub mod error;
pub mod events;
pub mod protocol_constants;
pub mod runtime;
pub mod services;
pub mod settings;
pub mod stack;
pub mod state;
pub mod types;
pub mod utils;

// Re-export commonly used types at the crate root
pub use coordinator::A2dpCoordinator;
pub use device::{Device, DeviceAddress, AUDIO_SINK, AUDIO_SOURCE, AV_REMOTE_CONTROL};
pub use error::{CoordinatorError, CoordinatorResult, ErrorCode, PolicyRejection, SessionError};
pub use events::{
    AdmissionEvent, AdmissionRequest, BroadcastEventBridge, CodecEvent, CoordinatorEvent,
    EventEmitter, SessionEvent,
};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use state::Config;
pub use types::{
    AudioState, CodecDescriptor, CodecStatus, CodecType, ConnectionState, Directive,
    OptionalCodecPreference, OptionalCodecSupport, Priority,
};
pub use utils::now_millis;

// Re-export service types
pub use services::{CapabilityRecord, MulticastPolicy};

// Re-export stack types
pub use stack::{AudioActivity, AvrcpController, SessionMachine};

// Re-export bootstrap types
pub use bootstrap::{
    bootstrap_loopback, bootstrap_services, settings_store_for, BootstrappedServices,
    Collaborators, LoopbackStack,
};

// Re-export API types
pub use api::{start_server, AppState, ServerError};
