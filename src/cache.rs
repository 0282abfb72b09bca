//! # Trace Cache
//!
//! Single-slot memo in front of the [`RoadSnapper`]. Map screens re-render
//! with the same trip many times; the cache keeps the most recent snap result
//! and returns it while the trace still looks the same.
//!
//! "Looks the same" is a cheap fingerprint: point count plus the first and
//! last coordinates rounded to 5 decimals. A change the fingerprint cannot
//! see (an interior point rewritten in place) needs an explicit
//! [`TraceCache::clear`].
//!
//! The cache owns its snapper and takes `&mut self`, so two snaps can never
//! race to overwrite the slot.

use std::fmt;

use log::debug;

use crate::polyline::PRECISION;
use crate::snapping::{RoadSnapper, SnapService};
use crate::{AsCoordinate, Coordinate};

/// Cheap summary of a trace used to detect "probably unchanged" input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceFingerprint {
    pub len: usize,
    /// First point as (lat, lng) scaled by 1e5 and rounded
    pub first: Option<(i64, i64)>,
    /// Last point as (lat, lng) scaled by 1e5 and rounded
    pub last: Option<(i64, i64)>,
}

impl TraceFingerprint {
    pub fn of<T: AsCoordinate>(trace: &[T]) -> Self {
        Self {
            len: trace.len(),
            first: trace.first().map(|p| quantize(&p.coordinate())),
            last: trace.last().map(|p| quantize(&p.coordinate())),
        }
    }
}

fn quantize(c: &Coordinate) -> (i64, i64) {
    (
        (c.latitude * PRECISION).round() as i64,
        (c.longitude * PRECISION).round() as i64,
    )
}

impl fmt::Display for TraceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.len)?;
        for (lat, lng) in [self.first, self.last].into_iter().flatten() {
            write!(
                f,
                ":{:.5},{:.5}",
                lat as f64 / PRECISION,
                lng as f64 / PRECISION
            )?;
        }
        Ok(())
    }
}

/// The cached snap result.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapCacheEntry {
    pub fingerprint: TraceFingerprint,
    pub coordinates: Vec<Coordinate>,
}

/// Single-slot snap cache.
pub struct TraceCache<S> {
    snapper: RoadSnapper<S>,
    entry: Option<SnapCacheEntry>,
    hits: u64,
    misses: u64,
}

impl<S: SnapService> TraceCache<S> {
    pub fn new(snapper: RoadSnapper<S>) -> Self {
        Self {
            snapper,
            entry: None,
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached result for this trace, or snap and cache it.
    ///
    /// Every result is cached, including raw fallbacks.
    pub async fn get_or_snap<T: AsCoordinate>(&mut self, trace: &[T]) -> Vec<Coordinate> {
        let fingerprint = TraceFingerprint::of(trace);

        if let Some(entry) = &self.entry {
            if entry.fingerprint == fingerprint {
                self.hits += 1;
                debug!("[TraceCache] Hit for {}", fingerprint);
                return entry.coordinates.clone();
            }
        }

        self.misses += 1;
        debug!("[TraceCache] Miss for {}, snapping", fingerprint);
        let coordinates = self.snapper.snap(trace).await;
        self.entry = Some(SnapCacheEntry {
            fingerprint,
            coordinates: coordinates.clone(),
        });
        coordinates
    }

    /// Cached result for this trace without snapping.
    ///
    /// Lets callers re-check relevance of a result they obtained earlier.
    pub fn peek<T: AsCoordinate>(&self, trace: &[T]) -> Option<&[Coordinate]> {
        let fingerprint = TraceFingerprint::of(trace);
        self.entry
            .as_ref()
            .filter(|e| e.fingerprint == fingerprint)
            .map(|e| e.coordinates.as_slice())
    }

    /// Evict the stored entry.
    pub fn clear(&mut self) {
        if self.entry.take().is_some() {
            debug!("[TraceCache] Cleared");
        }
    }

    pub fn entry(&self) -> Option<&SnapCacheEntry> {
        self.entry.as_ref()
    }

    pub fn snapper(&self) -> &RoadSnapper<S> {
        &self.snapper
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
