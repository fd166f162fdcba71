//! HTTP API layer.
//!
//! Thin handlers over the [`A2dpCoordinator`]; router construction and server
//! startup. Caller authorization is not handled here.

use std::sync::Arc;

use thiserror::Error;

use crate::bootstrap::{BootstrappedServices, LoopbackStack};
use crate::coordinator::A2dpCoordinator;
use crate::events::BroadcastEventBridge;
use crate::state::Config;

pub mod http;
pub mod response;

/// First port tried when no preferred port is configured.
const PORT_RANGE_START: u16 = 49500;
/// Last port tried when no preferred port is configured.
const PORT_RANGE_END: u16 = 49510;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),

    /// No available ports in the specified range.
    #[error("No available ports in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },
}

/// Shared application state for the API layer.
#[derive(Clone)]
pub struct AppState {
    /// The coordinator facade.
    pub coordinator: Arc<A2dpCoordinator>,
    /// Source for `/api/events` subscribers.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Startup configuration.
    pub config: Arc<Config>,
    /// Loopback stack handles, when the daemon runs against it.
    pub loopback: Option<LoopbackStack>,
}

impl AppState {
    pub fn new(services: &BootstrappedServices) -> Self {
        Self {
            coordinator: Arc::clone(&services.coordinator),
            event_bridge: Arc::clone(&services.event_bridge),
            config: Arc::new(services.config.clone()),
            loopback: services.loopback.clone(),
        }
    }
}

async fn find_available_port(
    start: u16,
    end: u16,
) -> Result<(u16, tokio::net::TcpListener), ServerError> {
    for port in start..=end {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => return Ok((port, listener)),
            Err(_) => continue,
        }
    }
    Err(ServerError::NoAvailablePort { start, end })
}

/// Starts the HTTP server on the configured or auto-discovered port.
///
/// Runs until the task is aborted.
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let preferred_port = state.config.preferred_port;
    let (port, listener) = if preferred_port > 0 {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], preferred_port));
        (preferred_port, tokio::net::TcpListener::bind(&addr).await?)
    } else {
        find_available_port(PORT_RANGE_START, PORT_RANGE_END).await?
    };

    log::info!("Server listening on http://0.0.0.0:{}", port);
    let app = http::create_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
