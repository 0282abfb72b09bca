//! # Point Reduction and Gap Segmentation
//!
//! Pure helpers that shape a trace before it goes to the snap service:
//!
//! - [`downsample`] bounds the point count while keeping both endpoints
//! - [`split_at_gaps`] cuts the trace where the GPS dropped out
//! - [`chunk_with_overlap`] slices a segment into request-sized chunks
//! - [`deduplicate`] removes repeated points left behind by chunk overlap

use crate::geo_utils::distance_km;
use crate::Coordinate;

/// Reduce a trace to at most `max_count` points.
///
/// Traces already within the limit are returned unchanged. Otherwise the
/// first and last points are kept and `max_count - 2` interior points are
/// picked at an even stride of `(len - 1) / (max_count - 1)`, each target
/// index rounded to the nearest integer. Indices are strictly increasing, so
/// no point is picked twice and order is preserved. A `max_count` below 2 is
/// treated as 2.
pub fn downsample<T: Clone>(trace: &[T], max_count: usize) -> Vec<T> {
    let max_count = max_count.max(2);
    if trace.len() <= max_count {
        return trace.to_vec();
    }

    let last = trace.len() - 1;
    let stride = last as f64 / (max_count - 1) as f64;

    let mut result = Vec::with_capacity(max_count);
    result.push(trace[0].clone());

    let mut prev_idx = 0usize;
    for i in 1..max_count - 1 {
        let idx = (i as f64 * stride).round() as usize;
        // stride > 1 keeps rounded indices increasing, but never trust float math at the ends
        if idx <= prev_idx || idx >= last {
            continue;
        }
        result.push(trace[idx].clone());
        prev_idx = idx;
    }

    result.push(trace[last].clone());
    result
}

/// Split a trace wherever consecutive points are more than `max_gap_km` apart.
///
/// A segment closed by a gap is emitted only when it has at least 2 points;
/// shorter ones are dropped. The final segment is always emitted, even with a
/// single point. Empty input yields no segments.
pub fn split_at_gaps(trace: &[Coordinate], max_gap_km: f64) -> Vec<Vec<Coordinate>> {
    let Some((first, rest)) = trace.split_first() else {
        return Vec::new();
    };

    let mut segments = Vec::new();
    let mut current = vec![*first];

    for point in rest {
        // current is never empty: it starts with one point and only gets replaced by a one-point vec
        let prev = current[current.len() - 1];
        if distance_km(&prev, point) > max_gap_km {
            let closed = std::mem::replace(&mut current, vec![*point]);
            if closed.len() >= 2 {
                segments.push(closed);
            }
        } else {
            current.push(*point);
        }
    }

    segments.push(current);
    segments
}

/// Drop points exactly equal to their immediate predecessor.
///
/// The first point is always kept.
pub fn deduplicate(coords: &[Coordinate]) -> Vec<Coordinate> {
    let mut result: Vec<Coordinate> = Vec::with_capacity(coords.len());
    for c in coords {
        if result.last() != Some(c) {
            result.push(*c);
        }
    }
    result
}

/// A request-sized slice of a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chunk<'a> {
    /// Points to send
    pub points: &'a [Coordinate],
    /// Leading points shared with the previous chunk (0 for the first chunk)
    pub overlap: usize,
}

impl<'a> Chunk<'a> {
    /// Points not already covered by the previous chunk.
    pub fn fresh_points(&self) -> &'a [Coordinate] {
        &self.points[self.overlap..]
    }
}

/// Slice `points` into chunks of at most `max_size`, each chunk after the
/// first repeating the last `overlap` points of its predecessor.
///
/// `max_size` below 2 is treated as 2 and `overlap` is clamped to
/// `max_size - 1` so every chunk makes progress.
pub fn chunk_with_overlap(points: &[Coordinate], max_size: usize, overlap: usize) -> Vec<Chunk<'_>> {
    let max_size = max_size.max(2);
    let overlap = overlap.min(max_size - 1);

    let mut chunks = Vec::new();
    if points.is_empty() {
        return chunks;
    }

    let mut start = 0usize;
    loop {
        let end = (start + max_size).min(points.len());
        chunks.push(Chunk {
            points: &points[start..end],
            overlap: if start == 0 { 0 } else { overlap },
        });
        if end == points.len() {
            break;
        }
        start = end - overlap;
    }

    chunks
}
