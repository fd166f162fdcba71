//! Centralized error types for the A2DP coordination core.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Separates policy rejections from collaborator and argument failures
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

/// A well-formed request that the admission policy refuses.
///
/// Surfaced to legacy callers as a plain `false`; never a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyRejection {
    /// The device's stored connection priority is Off.
    #[error("connection priority is off")]
    PriorityOff,

    /// The remote advertises the audio source role without the audio sink role.
    #[error("remote advertises audio source without audio sink")]
    IncompatibleRemote,

    /// The device is already connected or a connection is in flight.
    #[error("device is already connected or connecting")]
    AlreadyConnected,

    /// The device is already disconnected or a disconnection is in flight.
    #[error("device is not connected")]
    NotConnected,

    /// Two sinks are already streaming; no further admissions.
    #[error("multicast is ongoing")]
    MulticastOngoing,
}

impl ErrorCode for PolicyRejection {
    fn code(&self) -> &'static str {
        match self {
            Self::PriorityOff => "priority_off",
            Self::IncompatibleRemote => "incompatible_remote",
            Self::AlreadyConnected => "already_connected",
            Self::NotConnected => "not_connected",
            Self::MulticastOngoing => "multicast_ongoing",
        }
    }
}

/// Errors reported by the external session machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Codec status has not been populated for the device yet.
    #[error("codec status not available for {0}")]
    NotAvailable(String),

    /// The session machine has been shut down.
    #[error("session machine torn down")]
    TornDown,
}

impl ErrorCode for SessionError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotAvailable(_) => "codec_status_unavailable",
            Self::TornDown => "session_torn_down",
        }
    }
}

/// Errors from the durable settings store.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading or writing the backing file failed.
    #[error("settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file could not be encoded or decoded.
    #[error("settings serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Application-wide error type for the coordinator.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum CoordinatorError {
    /// The admission policy refused the request.
    #[error("Request rejected: {0}")]
    Rejected(PolicyRejection),

    /// An out-of-range value was passed to a setter.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A device address could not be parsed.
    #[error("Invalid device address: {0}")]
    InvalidAddress(String),

    /// The coordinator or a collaborator has been torn down.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Persisting a device fact failed.
    #[error("Settings error: {0}")]
    Settings(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoordinatorError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Rejected(reason) => reason.code(),
            Self::InvalidArgument(_) => "invalid_argument",
            Self::InvalidAddress(_) => "invalid_address",
            Self::Unavailable(_) => "service_unavailable",
            Self::Settings(_) => "settings_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Rejected(_) => StatusCode::CONFLICT,
            Self::InvalidArgument(_) | Self::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for CoordinatorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<PolicyRejection> for CoordinatorError {
    fn from(reason: PolicyRejection) -> Self {
        Self::Rejected(reason)
    }
}

impl From<SessionError> for CoordinatorError {
    fn from(err: SessionError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<SettingsError> for CoordinatorError {
    fn from(err: SettingsError) -> Self {
        Self::Settings(err.to_string())
    }
}
