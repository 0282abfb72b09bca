//! # Geographic Utilities
//!
//! Great-circle distance and trip length for GPS traces.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`distance_km`] | Haversine distance between two coordinates, in km |
//! | [`path_length_km`] | Unrounded length of a trace, in km |
//! | [`total_distance_km`] | Trip length rounded to 2 decimals for persistence |
//! | [`distance_m`] | Haversine distance in meters |
//! | [`round_km`] | The rounding rule used for persisted distances |
//!
//! ## Example
//!
//! ```rust
//! use trip_trace::{Coordinate, geo_utils};
//!
//! let mumbai = Coordinate::new(19.0760, 72.8777);
//! let delhi = Coordinate::new(28.7041, 77.1025);
//!
//! let km = geo_utils::distance_km(&mumbai, &delhi);
//! assert!(km > 1150.0 && km < 1165.0);
//! ```
//!
//! ## Algorithm Notes
//!
//! Spherical Earth with radius 6371 km. The haversine term is clamped to
//! `[0, 1]` before the square root and arcsine, so rounding noise on identical
//! or antipodal points never produces NaN.
//!
//! Persisted totals are rounded half away from zero (half-up for the
//! non-negative values involved): `0.125` becomes `0.13`.

use crate::{AsCoordinate, Coordinate};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two coordinates in kilometers.
///
/// Returns exactly 0.0 for identical points and never returns NaN: a
/// non-finite intermediate (from non-finite input) collapses to 0.0. Callers
/// that care about invalid input should validate upstream.
#[inline]
pub fn distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    if a == b {
        return 0.0;
    }

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let h = h.clamp(0.0, 1.0);
    let d = 2.0 * EARTH_RADIUS_KM * h.sqrt().asin();

    if d.is_finite() {
        d
    } else {
        0.0
    }
}

/// Great-circle distance in meters.
#[inline]
pub fn distance_m(a: &Coordinate, b: &Coordinate) -> f64 {
    distance_km(a, b) * 1000.0
}

/// Sum of consecutive distances along a trace, in kilometers, unrounded.
///
/// Empty or single-point traces return 0.0.
pub fn path_length_km<T: AsCoordinate>(trace: &[T]) -> f64 {
    if trace.len() < 2 {
        return 0.0;
    }

    trace
        .windows(2)
        .map(|w| distance_km(&w[0].coordinate(), &w[1].coordinate()))
        .sum()
}

/// Trip length in kilometers, rounded to 2 decimal places.
///
/// This is the value handed to persistence and shown to the user.
///
/// # Example
///
/// ```rust
/// use trip_trace::{Coordinate, geo_utils};
///
/// assert_eq!(geo_utils::total_distance_km::<Coordinate>(&[]), 0.0);
/// ```
pub fn total_distance_km<T: AsCoordinate>(trace: &[T]) -> f64 {
    round_km(path_length_km(trace))
}

/// Round a distance to 2 decimal places, half away from zero.
#[inline]
pub fn round_km(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}

// =============================================================================
// Unit Tests
// =============================================================================
