//! Unified error handling for the trip-trace library.
//!
//! The pure parts of the pipeline (codec, coordinate validation) return these
//! errors directly. The snapping orchestrator and the trace cache never return
//! them: they record the error in a report and degrade to raw coordinates.

use crate::Coordinate;

/// Unified error type for trip-trace operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error), uniffi(flat_error))]
pub enum TraceError {
    /// Encoded polyline is truncated or contains invalid characters
    #[error("Corrupt polyline encoding at byte {position}: {reason}")]
    CorruptEncoding { position: usize, reason: String },

    /// Coordinate is non-finite or outside the valid latitude/longitude range
    #[error("Invalid coordinate ({latitude}, {longitude})")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// Trace has fewer points than the operation needs
    #[error("Trace has {point_count} points, minimum {minimum_required} required")]
    DegenerateInput {
        point_count: usize,
        minimum_required: usize,
    },

    /// Could not reach the snap service
    #[error("Network failure: {message}")]
    NetworkFailure { message: String },

    /// Snap service answered, but not with usable points
    #[error("{}", remote_message(*.status_code, .message))]
    RemoteService {
        status_code: Option<u16>,
        message: String,
    },

    /// Request or pipeline budget ran out
    #[error("Timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    /// No credential for the snap service
    #[error("Snap service credential is not configured")]
    ConfigurationMissing,
}

fn remote_message(status_code: Option<u16>, message: &str) -> String {
    match status_code {
        Some(code) => format!("Snap service error ({}): {}", code, message),
        None => format!("Snap service error: {}", message),
    }
}

impl TraceError {
    pub(crate) fn invalid(coord: &Coordinate) -> Self {
        TraceError::InvalidCoordinate {
            latitude: coord.latitude,
            longitude: coord.longitude,
        }
    }

    pub(crate) fn corrupt(position: usize, reason: &str) -> Self {
        TraceError::CorruptEncoding {
            position,
            reason: reason.to_string(),
        }
    }

    /// Whether the error came from talking to the snap service.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            TraceError::NetworkFailure { .. }
                | TraceError::RemoteService { .. }
                | TraceError::Timeout { .. }
        )
    }
}

/// Result type alias for trip-trace operations.
pub type Result<T> = std::result::Result<T, TraceError>;
