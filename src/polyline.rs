//! # Encoded Polyline Codec
//!
//! Compact text encoding of coordinate sequences, compatible with the widely
//! used "encoded polyline" format at 1e5 precision.
//!
//! Each coordinate is scaled by 1e5, rounded, and stored as a delta from the
//! previous point (starting at 0,0). Deltas are zig-zagged (shift left, invert
//! when negative) and written as 5-bit groups, least significant first, with
//! 0x20 as the continuation bit and 63 added to land in printable ASCII.
//!
//! ```rust
//! use trip_trace::{Coordinate, polyline};
//!
//! let coords = vec![
//!     Coordinate::new(38.5, -120.2),
//!     Coordinate::new(40.7, -120.95),
//!     Coordinate::new(43.252, -126.453),
//! ];
//! assert_eq!(polyline::encode(&coords).unwrap(), "_p~iF~ps|U_ulLnnqC_mqNvxq`@");
//! ```

use ::polyline::errors::PolylineError;
use geo::Coord;
use log::debug;

use crate::{Coordinate, Result, TraceError};

/// Scale factor for 5 decimal places.
pub const PRECISION: f64 = 1e5;

/// Decimal digits kept by the encoding.
const DIGITS: u32 = 5;

const ASCII_OFFSET: u8 = 63;
const CONTINUATION: u8 = 0x20;

/// Longest value a coordinate delta can need: 360 degrees at 1e5,
/// zig-zagged, is under 2^30, which is 6 groups of 5 bits.
const MAX_CHUNKS: usize = 6;

/// Encode a coordinate sequence.
///
/// Empty input yields an empty string. Coordinates that are non-finite or
/// outside WGS84 ranges are rejected with [`TraceError::InvalidCoordinate`].
pub fn encode(coords: &[Coordinate]) -> Result<String> {
    if let Some(bad) = coords.iter().find(|c| !c.is_valid()) {
        return Err(TraceError::invalid(bad));
    }

    let line = coords.iter().map(|c| Coord {
        x: c.longitude,
        y: c.latitude,
    });
    ::polyline::encode_coordinates(line, DIGITS).map_err(|e| {
        debug!("[Polyline] Encoding failed: {}", e);
        match e {
            PolylineError::LatitudeCoordError { idx, .. }
            | PolylineError::LongitudeCoordError { idx, .. }
            | PolylineError::CoordEncodingError { idx, .. } => coords
                .get(idx)
                .map(TraceError::invalid)
                .unwrap_or_else(|| TraceError::corrupt(idx, "unencodable coordinate")),
            other => TraceError::corrupt(0, &other.to_string()),
        }
    })
}

/// Decode an encoded polyline.
///
/// Fails with [`TraceError::CorruptEncoding`] when the input ends inside a
/// value, ends after a latitude with no longitude, contains a byte outside
/// `'?'..='~'`, holds a value wider than any coordinate delta, or decodes to
/// a coordinate outside WGS84 ranges. No partial result is returned.
pub fn decode(encoded: &str) -> Result<Vec<Coordinate>> {
    check_framing(encoded.as_bytes())?;

    let line = ::polyline::decode_polyline(encoded, DIGITS).map_err(|e| {
        debug!("[Polyline] Decoding failed: {}", e);
        match e {
            PolylineError::LatitudeCoordError { idx, .. }
            | PolylineError::LongitudeCoordError { idx, .. } => {
                TraceError::corrupt(idx, "coordinate out of range")
            }
            PolylineError::NoLongError { idx } => {
                TraceError::corrupt(idx, "latitude without longitude")
            }
            PolylineError::DecodeError { idx } => {
                TraceError::corrupt(idx, "invalid character")
            }
            other => TraceError::corrupt(0, &other.to_string()),
        }
    })?;

    Ok(line.into_iter().map(Coordinate::from).collect())
}

/// Check value boundaries without decoding.
///
/// Every byte must be printable polyline ASCII, every value must terminate
/// within [`MAX_CHUNKS`] groups, and values must pair up as lat/lng. A value
/// that passes cannot push the running coordinate sums out of `i64`.
fn check_framing(bytes: &[u8]) -> Result<()> {
    let mut values = 0usize;
    let mut value_start = 0usize;
    let mut chunks = 0usize;

    for (pos, &byte) in bytes.iter().enumerate() {
        if !(ASCII_OFFSET..=ASCII_OFFSET + 63).contains(&byte) {
            return Err(TraceError::corrupt(pos, "invalid character"));
        }
        if chunks == 0 {
            value_start = pos;
        }
        chunks += 1;
        if chunks > MAX_CHUNKS {
            return Err(TraceError::corrupt(value_start, "value out of range"));
        }
        if byte - ASCII_OFFSET < CONTINUATION {
            values += 1;
            chunks = 0;
        }
    }

    if chunks > 0 {
        return Err(TraceError::corrupt(bytes.len(), "truncated value"));
    }
    if values % 2 == 1 {
        return Err(TraceError::corrupt(bytes.len(), "latitude without longitude"));
    }
    Ok(())
}
