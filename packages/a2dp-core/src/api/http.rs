//! HTTP route handlers.
//!
//! All handlers are thin - they parse the address, delegate to the
//! coordinator and shape the JSON. Policy rejections come back as 409,
//! bad input as 400 and torn-down collaborators as 503 via
//! [`CoordinatorError`]'s `IntoResponse`.

use std::convert::Infallible;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::api::response::{api_ok, api_success};
use crate::api::AppState;
use crate::bootstrap::LoopbackStack;
use crate::device::{Device, DeviceAddress};
use crate::error::{CoordinatorError, CoordinatorResult, PolicyRejection};
use crate::types::{AudioState, CodecDescriptor, CodecType, ConnectionState, Priority};

/// Service identifier reported by `/health`.
const SERVICE_ID: &str = "a2dp-coordinator";

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectRequest {
    /// Service UUIDs advertised by the remote, if known.
    #[serde(default)]
    uuids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct PriorityRequest {
    priority: Priority,
}

#[derive(Debug, Deserialize)]
struct OptionalCodecsRequest {
    /// Raw preference: -1 unknown, 0 disabled, 1 enabled.
    enabled: i32,
}

#[derive(Debug, Deserialize)]
struct AudioStateRequest {
    state: AudioState,
}

#[derive(Debug, Deserialize)]
struct VolumeRequest {
    level: u8,
}

#[derive(Debug, Deserialize)]
struct AdjustVolumeRequest {
    direction: i32,
}

#[derive(Debug, Deserialize)]
struct DeviceListQuery {
    /// Comma-separated connection states, e.g. `connected,connecting`.
    states: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlayingRequest {
    playing: bool,
}

#[derive(Debug, Deserialize)]
struct RemoteCodecsRequest {
    codecs: Vec<CodecType>,
}

#[derive(Debug, Deserialize)]
struct AudioActiveRequest {
    active: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn parse_address(raw: &str) -> CoordinatorResult<DeviceAddress> {
    raw.parse()
}

fn parse_states(raw: &str) -> CoordinatorResult<Vec<ConnectionState>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(|_| {
                CoordinatorError::InvalidArgument(format!("unknown connection state: {s}"))
            })
        })
        .collect()
}

fn require_loopback(state: &AppState) -> CoordinatorResult<&LoopbackStack> {
    state.loopback.as_ref().ok_or_else(|| {
        CoordinatorError::Unavailable("loopback stack is not in use".to_string())
    })
}

fn device_summary(state: &AppState, address: &DeviceAddress) -> serde_json::Value {
    let coordinator = &state.coordinator;
    json!({
        "address": address,
        "connectionState": coordinator.connection_state(address),
        "playing": coordinator.is_playing(address),
        "capabilities": coordinator.capability_record(address),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/state", get(get_state))
        .route("/api/events", get(event_stream))
        .route("/api/devices", get(list_devices))
        .route("/api/devices/playing", get(list_playing))
        .route("/api/devices/{address}", get(get_device))
        .route("/api/devices/{address}/connect", post(connect_device))
        .route("/api/devices/{address}/disconnect", post(disconnect_device))
        .route(
            "/api/devices/{address}/priority",
            get(get_priority).post(set_priority),
        )
        .route("/api/devices/{address}/codec", get(get_codec_status))
        .route(
            "/api/devices/{address}/codec/preference",
            post(set_codec_preference),
        )
        .route(
            "/api/devices/{address}/optional-codecs",
            get(get_optional_codecs).post(set_optional_codecs),
        )
        .route(
            "/api/devices/{address}/optional-codecs/enable",
            post(enable_optional_codecs),
        )
        .route(
            "/api/devices/{address}/optional-codecs/disable",
            post(disable_optional_codecs),
        )
        .route("/api/devices/{address}/select", post(select_stream))
        .route(
            "/api/devices/{address}/audio-state",
            post(set_avrcp_audio_state),
        )
        .route(
            "/api/devices/{address}/avrcp/reset-blacklist",
            post(reset_avrcp_blacklist),
        )
        .route("/api/multicast", get(get_multicast))
        .route("/api/volume", get(get_volume).post(set_volume))
        .route("/api/volume/adjust", post(adjust_volume))
        .route(
            "/api/loopback/devices/{address}/playing",
            post(loopback_set_playing),
        )
        .route(
            "/api/loopback/devices/{address}/remote-codecs",
            post(loopback_remote_codecs),
        )
        .route(
            "/api/loopback/devices/{address}/remote-disconnect",
            post(loopback_remote_disconnect),
        )
        .route("/api/loopback/audio-active", post(loopback_audio_active))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// General Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe. Reports whether the coordinator is still available.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({
        "status": "ok",
        "service": SERVICE_ID,
        "available": state.coordinator.is_available(),
    }))
}

async fn get_state(State(state): State<AppState>) -> impl IntoResponse {
    api_success(state.coordinator.dump())
}

/// Server-sent events stream of every coordinator event.
async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.event_bridge.subscribe()).filter_map(|message| {
        match message {
            Ok(event) => match Event::default().json_data(&event) {
                Ok(sse_event) => Some(Ok(sse_event)),
                Err(e) => {
                    log::warn!("[Events] Failed to encode event: {}", e);
                    None
                }
            },
            Err(e) => {
                log::debug!("[Events] Subscriber fell behind: {}", e);
                None
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ─────────────────────────────────────────────────────────────────────────────
// Device Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn list_devices(
    State(state): State<AppState>,
    Query(query): Query<DeviceListQuery>,
) -> CoordinatorResult<impl IntoResponse> {
    let devices = match query.states.as_deref() {
        Some(raw) => state
            .coordinator
            .devices_matching_states(&parse_states(raw)?),
        None => state.coordinator.connected_devices(),
    };
    let devices: Vec<_> = devices
        .iter()
        .map(|address| device_summary(&state, address))
        .collect();
    Ok(api_success(json!({ "devices": devices })))
}

async fn list_playing(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({ "devices": state.coordinator.playing_devices() }))
}

async fn get_device(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> CoordinatorResult<impl IntoResponse> {
    let address = parse_address(&address)?;
    Ok(api_success(device_summary(&state, &address)))
}

/// Requests a connection. The optional body lists the remote's advertised
/// service UUIDs.
async fn connect_device(
    Path(address): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> CoordinatorResult<impl IntoResponse> {
    let address = parse_address(&address)?;
    let request: ConnectRequest = if body.is_empty() {
        ConnectRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| CoordinatorError::InvalidArgument(e.to_string()))?
    };
    state
        .coordinator
        .try_connect(&Device::new(address, request.uuids))?;
    Ok(api_ok())
}

async fn disconnect_device(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> CoordinatorResult<impl IntoResponse> {
    let address = parse_address(&address)?;
    state.coordinator.try_disconnect(&address)?;
    Ok(api_ok())
}

async fn get_priority(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> CoordinatorResult<impl IntoResponse> {
    let address = parse_address(&address)?;
    Ok(api_success(json!({
        "address": address,
        "priority": state.coordinator.priority(&address),
    })))
}

async fn set_priority(
    Path(address): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<PriorityRequest>,
) -> CoordinatorResult<impl IntoResponse> {
    let address = parse_address(&address)?;
    state
        .coordinator
        .try_set_priority(&address, payload.priority)?;
    Ok(api_success(json!({
        "address": address,
        "priority": payload.priority,
    })))
}

async fn select_stream(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> CoordinatorResult<impl IntoResponse> {
    let address = parse_address(&address)?;
    state.coordinator.try_select_stream(&address)?;
    Ok(api_ok())
}

// ─────────────────────────────────────────────────────────────────────────────
// Codec Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn get_codec_status(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> CoordinatorResult<impl IntoResponse> {
    let address = parse_address(&address)?;
    Ok(api_success(state.coordinator.try_codec_status(&address)?))
}

async fn set_codec_preference(
    Path(address): Path<String>,
    State(state): State<AppState>,
    Json(codec): Json<CodecDescriptor>,
) -> CoordinatorResult<impl IntoResponse> {
    let address = parse_address(&address)?;
    state
        .coordinator
        .try_set_codec_config_preference(&address, codec)?;
    Ok(api_ok())
}

async fn get_optional_codecs(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> CoordinatorResult<impl IntoResponse> {
    let address = parse_address(&address)?;
    Ok(api_success(json!({
        "address": address,
        "supported": state.coordinator.supports_optional_codecs(&address),
        "enabled": state.coordinator.optional_codecs_enabled(&address),
    })))
}

async fn set_optional_codecs(
    Path(address): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<OptionalCodecsRequest>,
) -> CoordinatorResult<impl IntoResponse> {
    let address = parse_address(&address)?;
    state
        .coordinator
        .try_set_optional_codecs_enabled(&address, payload.enabled)?;
    Ok(api_success(json!({
        "address": address,
        "enabled": state.coordinator.optional_codecs_enabled(&address),
    })))
}

async fn enable_optional_codecs(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> CoordinatorResult<impl IntoResponse> {
    let address = parse_address(&address)?;
    state.coordinator.try_enable_optional_codecs(&address)?;
    Ok(api_ok())
}

async fn disable_optional_codecs(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> CoordinatorResult<impl IntoResponse> {
    let address = parse_address(&address)?;
    state.coordinator.try_disable_optional_codecs(&address)?;
    Ok(api_ok())
}

// ─────────────────────────────────────────────────────────────────────────────
// Multicast / Volume Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn get_multicast(State(state): State<AppState>) -> impl IntoResponse {
    let coordinator = &state.coordinator;
    api_success(json!({
        "policy": coordinator.policy(),
        "enabled": coordinator.is_multicast_enabled(),
        "featureEnabled": coordinator.is_multicast_feature_enabled(),
        "ongoing": coordinator.is_multicast_ongoing(None),
        "latestDevice": coordinator.latest_device(),
    }))
}

async fn get_volume(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({
        "absoluteVolumeSupported": state.coordinator.is_absolute_volume_supported(),
    }))
}

async fn set_volume(
    State(state): State<AppState>,
    Json(payload): Json<VolumeRequest>,
) -> CoordinatorResult<impl IntoResponse> {
    state.coordinator.try_set_absolute_volume(payload.level)?;
    Ok(api_success(json!({ "level": payload.level })))
}

async fn adjust_volume(
    State(state): State<AppState>,
    Json(payload): Json<AdjustVolumeRequest>,
) -> impl IntoResponse {
    state.coordinator.adjust_absolute_volume(payload.direction);
    api_ok()
}

async fn set_avrcp_audio_state(
    Path(address): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<AudioStateRequest>,
) -> CoordinatorResult<impl IntoResponse> {
    let address = parse_address(&address)?;
    state
        .coordinator
        .set_avrcp_audio_state(payload.state, &address);
    Ok(api_ok())
}

async fn reset_avrcp_blacklist(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> CoordinatorResult<impl IntoResponse> {
    let address = parse_address(&address)?;
    state.coordinator.reset_avrcp_blacklist(&address);
    Ok(api_ok())
}

// ─────────────────────────────────────────────────────────────────────────────
// Loopback Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn loopback_set_playing(
    Path(address): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<PlayingRequest>,
) -> CoordinatorResult<impl IntoResponse> {
    let address = parse_address(&address)?;
    let loopback = require_loopback(&state)?;
    if !loopback.machine.set_playing(&address, payload.playing) {
        return Err(PolicyRejection::NotConnected.into());
    }
    Ok(api_ok())
}

async fn loopback_remote_codecs(
    Path(address): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<RemoteCodecsRequest>,
) -> CoordinatorResult<impl IntoResponse> {
    let address = parse_address(&address)?;
    require_loopback(&state)?
        .machine
        .register_remote_codecs(address, payload.codecs);
    Ok(api_ok())
}

async fn loopback_remote_disconnect(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> CoordinatorResult<impl IntoResponse> {
    let address = parse_address(&address)?;
    let disconnected = require_loopback(&state)?.machine.remote_disconnect(&address);
    Ok(api_success(json!({ "disconnected": disconnected })))
}

async fn loopback_audio_active(
    State(state): State<AppState>,
    Json(payload): Json<AudioActiveRequest>,
) -> CoordinatorResult<impl IntoResponse> {
    require_loopback(&state)?.audio.set_active(payload.active);
    Ok(api_ok())
}
