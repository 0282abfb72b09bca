//! # Algorithm Toolbox
//!
//! Direct access to the pure, synchronous parts of the pipeline. Use these
//! when integrating a single step into another system without the async
//! snapping orchestrator.
//!
//! ## Geographic Utilities
//!
//! - **Haversine Distance**: great-circle distance between two coordinates
//! - **Path Length**: total and rounded trip distance
//!
//! ## Encoding
//!
//! - **Encoded Polyline**: 1e5-precision delta/varint text encoding
//!
//! ## Trace Shaping
//!
//! - **Downsample**: bound the point count, keep endpoints
//! - **Gap Split**: cut at GPS dropouts
//! - **Chunking**: request-sized chunks with overlap
//! - **Noise Filter**: drop inaccurate fixes and teleports
//!
//! # Example
//!
//! ```rust
//! use trip_trace::algorithms::{
//!     distance_km, encode_polyline, split_at_gaps, Coordinate,
//! };
//!
//! let trace = vec![
//!     Coordinate::new(19.0760, 72.8777),
//!     Coordinate::new(19.0770, 72.8780),
//!     Coordinate::new(19.2000, 72.9000), // dropout jump
//!     Coordinate::new(19.2010, 72.9005),
//! ];
//! assert!(distance_km(&trace[0], &trace[1]) < 0.2);
//! assert_eq!(split_at_gaps(&trace, 0.5).len(), 2);
//! assert!(!encode_polyline(&trace).unwrap().is_empty());
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{AsCoordinate, Coordinate, LocationSample, TraceError};

// =============================================================================
// Geographic Utilities
// =============================================================================

pub use crate::geo_utils::{
    distance_km, distance_m, path_length_km, round_km, total_distance_km, EARTH_RADIUS_KM,
};

// =============================================================================
// Encoding
// =============================================================================

/// Encode coordinates as an encoded polyline string.
pub use crate::polyline::encode as encode_polyline;
/// Decode an encoded polyline string.
pub use crate::polyline::decode as decode_polyline;

// =============================================================================
// Trace Shaping
// =============================================================================

pub use crate::segmentation::{chunk_with_overlap, deduplicate, downsample, split_at_gaps, Chunk};
pub use crate::trace::{Odometer, TraceFilter};

/// Filter, then measure: the distance a trip would persist after noise removal.
///
/// # Example
/// ```rust
/// use trip_trace::algorithms::{filtered_distance_km, LocationSample, TraceFilter};
///
/// let samples = vec![
///     LocationSample::new(19.000, 72.0, 0),
///     LocationSample::new(19.001, 72.0, 30_000),
///     LocationSample::new(19.002, 72.0, 60_000).with_accuracy(400.0),
/// ];
/// assert_eq!(filtered_distance_km(&samples, &TraceFilter::default()), 0.11);
/// ```
pub fn filtered_distance_km(samples: &[LocationSample], filter: &TraceFilter) -> f64 {
    total_distance_km(&filter.filter_samples(samples))
}
