//! Error types for ssf-sync
//!
//! Every state machine surfaces exactly one `SyncError` per failed operation,
//! after local state has been rolled back or replaced.

use thiserror::Error;

use crate::focus::GeolocationError;
use crate::transport::TransportError;

/// Engine error type
#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote call failed (non-2xx status or network error)
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Client-side precondition not met; raised before any network call
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Response was not the expected object/array
    #[error("Unexpected response shape: {0}")]
    Shape(String),

    /// A submission from the same form is still in flight
    #[error("A submission is already in progress")]
    SubmissionInProgress,

    /// Device location unavailable
    #[error(transparent)]
    Geolocation(#[from] GeolocationError),
}

impl SyncError {
    /// HTTP status, when the failure came from the service
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Transport(e) => e.status(),
            _ => None,
        }
    }
}

/// Result alias for engine operations
pub type Result<T> = std::result::Result<T, SyncError>;
