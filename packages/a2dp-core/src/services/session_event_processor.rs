//! Session event processing service.
//!
//! Responsibilities:
//! - Draining the session machine's event feed, strictly in arrival order
//! - Routing connection transitions to the codec negotiation reactor
//! - Relaying audio state changes to the AVRCP engine
//! - Re-emitting every event to listeners

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{CodecNegotiationReactor, VolumeCoordinator};
use crate::events::EventEmitter;
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::stack::{SessionEvent, SessionEventReceiver};

/// Dependencies required for event processing.
///
/// Extracted so the spawned consumer task can own a copy.
#[derive(Clone)]
struct EventProcessorDeps {
    reactor: Arc<CodecNegotiationReactor>,
    volume: Arc<VolumeCoordinator>,
    emitter: Arc<dyn EventEmitter>,
}

/// Single consumer of the session event feed.
pub struct SessionEventProcessor {
    deps: EventProcessorDeps,
    event_rx: Arc<Mutex<Option<SessionEventReceiver>>>,
    cancel: CancellationToken,
    spawner: TokioSpawner,
}

impl SessionEventProcessor {
    pub fn new(
        reactor: Arc<CodecNegotiationReactor>,
        volume: Arc<VolumeCoordinator>,
        emitter: Arc<dyn EventEmitter>,
        event_rx: SessionEventReceiver,
        spawner: TokioSpawner,
    ) -> Self {
        Self {
            deps: EventProcessorDeps {
                reactor,
                volume,
                emitter,
            },
            event_rx: Arc::new(Mutex::new(Some(event_rx))),
            cancel: CancellationToken::new(),
            spawner,
        }
    }

    /// Processes one event to completion on the calling thread.
    pub fn process_event(&self, event: &SessionEvent) {
        Self::process_event_with_deps(&self.deps, event);
    }

    fn process_event_with_deps(deps: &EventProcessorDeps, event: &SessionEvent) {
        match event {
            SessionEvent::ConnectionStateChanged {
                device,
                previous,
                state,
                ..
            } => {
                log::info!(
                    "[SessionEvents] {} connection {:?} -> {:?}",
                    device,
                    previous,
                    state
                );
                deps.reactor.on_connection_state_changed(device, *state);
            }
            SessionEvent::AudioStateChanged { device, state, .. } => {
                log::info!("[SessionEvents] {} audio {:?}", device, state);
                deps.volume.notify_audio_state(*state, device);
            }
        }

        deps.emitter.emit_session(event.clone());
    }

    /// Spawns the consumer task.
    ///
    /// The receiver is taken on first start; later calls are no-ops. The task
    /// ends when [`stop`](Self::stop) is called or the feed closes.
    pub fn start(&self) {
        let Some(mut rx) = self.event_rx.lock().take() else {
            log::warn!("[SessionEvents] Consumer already started");
            return;
        };
        let deps = self.deps.clone();
        let cancel = self.cancel.clone();

        self.spawner.spawn(async move {
            log::info!("[SessionEvents] Consumer started");
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => Self::process_event_with_deps(&deps, &event),
                        None => break,
                    },
                }
            }
            log::info!("[SessionEvents] Consumer stopped");
        });
    }

    /// Stops the consumer task. Events still queued are dropped.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}
