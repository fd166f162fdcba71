//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where all
//! services are instantiated and wired together. The resulting
//! [`A2dpCoordinator`] is handed out by `Arc`; nothing looks it up globally.

use std::sync::Arc;

use crate::coordinator::A2dpCoordinator;
use crate::events::{BroadcastEventBridge, EventEmitter, LoggingEventEmitter};
use crate::runtime::TokioSpawner;
use crate::services::{
    CapabilityStore, CodecNegotiationReactor, MulticastPolicy, SessionEventProcessor,
    SessionTable, VolumeCoordinator,
};
use crate::settings::{JsonFileSettingsStore, MemorySettingsStore, SettingsStore};
use crate::stack::{
    session_event_channel, AudioActivity, AudioActivityFlag, AvrcpController, LoopbackAvrcp,
    LoopbackSessionMachine, SessionEventReceiver, SessionMachine,
};
use crate::state::Config;

/// The external services the coordinator runs against.
pub struct Collaborators {
    pub session_machine: Arc<dyn SessionMachine>,
    /// Feed the session machine publishes transitions on.
    pub session_events: SessionEventReceiver,
    pub avrcp: Arc<dyn AvrcpController>,
    pub audio: Arc<dyn AudioActivity>,
    pub settings: Arc<dyn SettingsStore>,
}

/// Concrete handles to the loopback stack, for driving the simulated
/// remote side.
#[derive(Clone)]
pub struct LoopbackStack {
    pub machine: Arc<LoopbackSessionMachine>,
    pub avrcp: Arc<LoopbackAvrcp>,
    pub audio: Arc<AudioActivityFlag>,
}

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// The coordinator facade.
    pub coordinator: Arc<A2dpCoordinator>,
    /// Consumer of the session event feed.
    pub event_processor: Arc<SessionEventProcessor>,
    /// Event bridge feeding `/api/events` subscribers.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// The startup configuration.
    pub config: Config,
    /// Present when running against the loopback stack.
    pub loopback: Option<LoopbackStack>,
}

impl BootstrappedServices {
    /// Starts the session event consumer.
    pub fn start_background_tasks(&self) {
        self.event_processor.start();
    }

    /// Stops the consumer, then shuts the coordinator down.
    pub fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");
        self.event_processor.stop();
        self.coordinator.shutdown();
        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Picks the settings backend: a JSON file when a data directory is
/// configured, otherwise process memory.
pub fn settings_store_for(config: &Config) -> Arc<dyn SettingsStore> {
    match &config.data_dir {
        Some(dir) => Arc::new(JsonFileSettingsStore::open(dir)),
        None => {
            log::warn!("[Bootstrap] No data directory configured; device facts will not persist");
            Arc::new(MemorySettingsStore::new())
        }
    }
}

/// Wires the coordinator against caller-supplied collaborators.
///
/// Background tasks are not started; call
/// [`BootstrappedServices::start_background_tasks`].
pub fn bootstrap_services(
    config: &Config,
    collaborators: Collaborators,
    spawner: TokioSpawner,
) -> BootstrappedServices {
    let policy = MulticastPolicy::from_config(config);
    wire(config, policy, collaborators, spawner, None)
}

/// Wires the coordinator against the in-process loopback stack.
pub fn bootstrap_loopback(
    config: &Config,
    settings: Arc<dyn SettingsStore>,
    spawner: TokioSpawner,
) -> BootstrappedServices {
    let policy = MulticastPolicy::from_config(config);
    let (events_tx, events_rx) = session_event_channel();
    let loopback = LoopbackStack {
        machine: Arc::new(LoopbackSessionMachine::new(policy, events_tx)),
        avrcp: Arc::new(LoopbackAvrcp::new()),
        audio: Arc::new(AudioActivityFlag::new(false)),
    };
    let collaborators = Collaborators {
        session_machine: loopback.machine.clone(),
        session_events: events_rx,
        avrcp: loopback.avrcp.clone(),
        audio: loopback.audio.clone(),
        settings,
    };
    wire(config, policy, collaborators, spawner, Some(loopback))
}

fn wire(
    config: &Config,
    policy: MulticastPolicy,
    collaborators: Collaborators,
    spawner: TokioSpawner,
    loopback: Option<LoopbackStack>,
) -> BootstrappedServices {
    let event_bridge = Arc::new(BroadcastEventBridge::new(config.event_channel_capacity));
    event_bridge.set_external_emitter(Arc::new(LoggingEventEmitter));
    let emitter: Arc<dyn EventEmitter> = event_bridge.clone();

    let sessions = Arc::new(SessionTable::new(collaborators.session_machine));
    let volume = Arc::new(VolumeCoordinator::new(collaborators.avrcp));
    let capabilities = Arc::new(CapabilityStore::new(collaborators.settings));

    let reactor = Arc::new(CodecNegotiationReactor::new(
        Arc::clone(&sessions),
        Arc::clone(&capabilities),
        Arc::clone(&emitter),
    ));
    let event_processor = Arc::new(SessionEventProcessor::new(
        reactor,
        Arc::clone(&volume),
        Arc::clone(&emitter),
        collaborators.session_events,
        spawner,
    ));

    let coordinator = Arc::new(A2dpCoordinator::new(
        policy,
        sessions,
        volume,
        capabilities,
        collaborators.audio,
        emitter,
    ));

    log::info!(
        "[Bootstrap] Coordinator ready (max_connections={}, multicast={})",
        policy.max_connections,
        policy.multicast_feature_enabled
    );

    BootstrappedServices {
        coordinator,
        event_processor,
        event_bridge,
        config: config.clone(),
        loopback,
    }
}
