//! # Trip Trace
//!
//! GPS trace processing for field-sales trips.
//!
//! This library provides:
//! - Haversine distance and cumulative trip length
//! - Encoded polyline codec (1e5 precision)
//! - Downsampling, gap segmentation and chunking of traces
//! - Road snapping against an external snap-to-roads service, with chunk
//!   overlap, bounded timeouts and fallback to raw coordinates
//! - A single-slot cache so re-renders do not re-snap the same trace
//!
//! ## Features
//!
//! - **`http`** - Enable the HTTP client for the snap-to-roads service
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use trip_trace::{Coordinate, geo_utils, polyline};
//!
//! let trip = vec![
//!     Coordinate::new(19.0760, 72.8777),
//!     Coordinate::new(19.0800, 72.8800),
//!     Coordinate::new(19.0850, 72.8850),
//! ];
//!
//! let km = geo_utils::total_distance_km(&trip);
//! let encoded = polyline::encode(&trip).unwrap();
//! assert_eq!(polyline::decode(&encoded).unwrap().len(), 3);
//! println!("Trip: {} km, {}", km, encoded);
//! ```

use geo::{Coord, LineString, Point};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, TraceError};

// Geographic utilities (haversine distance, path length)
pub mod geo_utils;
pub use geo_utils::{distance_km, path_length_km, round_km, total_distance_km};

// Encoded polyline codec
pub mod polyline;

// Downsampling, gap splitting, dedup and chunking
pub mod segmentation;
pub use segmentation::{chunk_with_overlap, deduplicate, downsample, split_at_gaps, Chunk};

// Noise filtering and live odometer
pub mod trace;
pub use trace::{Odometer, TraceFilter};

// Road-snapping orchestrator
pub mod snapping;
pub use snapping::{ChunkReport, RoadSnapper, SnapConfig, SnapOutcome, SnapService, SnappedPoint};

// Single-slot snap cache
pub mod cache;
pub use cache::{SnapCacheEntry, TraceCache, TraceFingerprint};

// Algorithm toolbox - pure functions without the async pipeline
pub mod algorithms;

// HTTP client for the snap-to-roads service
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::RoadsApiClient;

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("TripTraceRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A latitude/longitude pair in degrees.
///
/// # Example
/// ```
/// use trip_trace::Coordinate;
/// let office = Coordinate::new(19.0760, 72.8777); // Mumbai
/// assert!(office.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the coordinate is finite and within WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

impl From<Coordinate> for Point<f64> {
    fn from(c: Coordinate) -> Self {
        Point::new(c.longitude, c.latitude)
    }
}

impl From<Coord<f64>> for Coordinate {
    fn from(c: Coord<f64>) -> Self {
        Coordinate::new(c.y, c.x)
    }
}

/// One GPS fix as delivered by the sampling subsystem.
///
/// Timestamps are epoch milliseconds. They are non-decreasing within a trip
/// but may repeat, and occasionally step backwards on some devices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_ms: i64,
    /// Horizontal accuracy radius in meters
    pub accuracy_m: Option<f64>,
    /// Ground speed in meters/second
    pub speed_mps: Option<f64>,
}

impl LocationSample {
    /// Create a sample without accuracy or speed.
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms,
            accuracy_m: None,
            speed_mps: None,
        }
    }

    /// Set the horizontal accuracy.
    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    /// Set the ground speed.
    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }
}

/// Anything that carries a position.
///
/// Lets the pipeline accept raw samples and plain coordinates alike.
pub trait AsCoordinate {
    fn coordinate(&self) -> Coordinate;
}

impl AsCoordinate for Coordinate {
    #[inline]
    fn coordinate(&self) -> Coordinate {
        *self
    }
}

impl AsCoordinate for LocationSample {
    #[inline]
    fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Project a trace onto plain coordinates.
pub fn to_coordinates<T: AsCoordinate>(trace: &[T]) -> Vec<Coordinate> {
    trace.iter().map(AsCoordinate::coordinate).collect()
}

/// Return the first invalid coordinate as an error.
pub fn validate_coordinates(coords: &[Coordinate]) -> Result<()> {
    match coords.iter().find(|c| !c.is_valid()) {
        Some(bad) => Err(TraceError::invalid(bad)),
        None => Ok(()),
    }
}

/// Convert a trace into a `geo` line string (x = longitude, y = latitude)
/// for rendering collaborators.
pub fn to_line_string<T: AsCoordinate>(trace: &[T]) -> LineString<f64> {
    trace
        .iter()
        .map(|p| {
            let c = p.coordinate();
            Coord {
                x: c.longitude,
                y: c.latitude,
            }
        })
        .collect()
}
