//! FFI bindings for mobile platforms (iOS/Android).
//!
//! This module provides the UniFFI bindings that expose the trace pipeline
//! to Kotlin and Swift. Free functions are prefixed with `ffi_` to avoid
//! naming conflicts with the internal API. Snapping is exposed as blocking
//! calls; the host runs them off its UI thread.

use std::sync::{Arc, Mutex};

use log::{info, warn};
use tokio::runtime::{Builder, Runtime};

use crate::{
    geo_utils, init_logging, polyline, segmentation, to_coordinates, Coordinate, LocationSample,
    RoadSnapper, RoadsApiClient, SnapConfig, SnapOutcome, TraceCache, TraceError, TraceFilter,
};

fn build_runtime() -> std::io::Result<Runtime> {
    Builder::new_current_thread().enable_all().build()
}

fn flat_to_coordinates(coords: &[f64]) -> Vec<Coordinate> {
    coords
        .chunks_exact(2)
        .map(|pair| Coordinate::new(pair[0], pair[1]))
        .collect()
}

// ============================================================================
// Distance
// ============================================================================

#[uniffi::export]
pub fn ffi_distance_km(a: Coordinate, b: Coordinate) -> f64 {
    geo_utils::distance_km(&a, &b)
}

/// Trip distance in km, rounded to 2 decimals.
#[uniffi::export]
pub fn ffi_total_distance_km(points: Vec<Coordinate>) -> f64 {
    geo_utils::total_distance_km(&points)
}

/// Trip distance from a flat buffer: [lat1, lng1, lat2, lng2, ...].
/// Avoids deserializing Coordinate objects for long trips.
#[uniffi::export]
pub fn ffi_total_distance_from_flat(coords: Vec<f64>) -> f64 {
    geo_utils::total_distance_km(&flat_to_coordinates(&coords))
}

// ============================================================================
// Polyline
// ============================================================================

#[uniffi::export]
pub fn ffi_encode_polyline(points: Vec<Coordinate>) -> Result<String, TraceError> {
    polyline::encode(&points)
}

#[uniffi::export]
pub fn ffi_decode_polyline(encoded: String) -> Result<Vec<Coordinate>, TraceError> {
    polyline::decode(&encoded)
}

// ============================================================================
// Trace Shaping
// ============================================================================

#[uniffi::export]
pub fn ffi_filter_samples(samples: Vec<LocationSample>, filter: TraceFilter) -> Vec<LocationSample> {
    filter.filter_samples(&samples)
}

#[uniffi::export]
pub fn ffi_downsample(points: Vec<Coordinate>, max_count: u32) -> Vec<Coordinate> {
    segmentation::downsample(&points, max_count as usize)
}

#[uniffi::export]
pub fn ffi_split_at_gaps(points: Vec<Coordinate>, max_gap_km: f64) -> Vec<Vec<Coordinate>> {
    segmentation::split_at_gaps(&points, max_gap_km)
}

// ============================================================================
// Snapping
// ============================================================================

/// Snap result for the mobile host.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSnapResult {
    pub coordinates: Vec<Coordinate>,
    pub snapped_chunks: u32,
    pub total_chunks: u32,
    /// Set when the whole trace came back raw
    pub fallback_reason: Option<String>,
}

impl From<SnapOutcome> for FfiSnapResult {
    fn from(outcome: SnapOutcome) -> Self {
        Self {
            snapped_chunks: outcome.snapped_chunk_count() as u32,
            total_chunks: outcome.chunks.len() as u32,
            fallback_reason: outcome.fallback.as_ref().map(ToString::to_string),
            coordinates: outcome.coordinates,
        }
    }
}

fn raw_result(samples: &[LocationSample], reason: String) -> FfiSnapResult {
    FfiSnapResult {
        coordinates: to_coordinates(samples),
        snapped_chunks: 0,
        total_chunks: 0,
        fallback_reason: Some(reason),
    }
}

/// Default snapping configuration, with the credential taken from the environment.
#[uniffi::export]
pub fn default_snap_config() -> SnapConfig {
    init_logging();
    SnapConfig::from_env()
}

/// Snap a trace to roads (blocking). Never fails; degrades to raw coordinates.
#[uniffi::export]
pub fn ffi_snap_to_roads(samples: Vec<LocationSample>, config: SnapConfig) -> FfiSnapResult {
    init_logging();
    info!(
        "[TripTraceRust] ffi_snap_to_roads called with {} samples",
        samples.len()
    );

    let rt = match build_runtime() {
        Ok(rt) => rt,
        Err(e) => {
            warn!("[TripTraceRust] Failed to create tokio runtime: {}", e);
            return raw_result(&samples, format!("Runtime error: {}", e));
        }
    };
    let client = match RoadsApiClient::new(&config) {
        Ok(client) => client,
        Err(e) => {
            warn!("[TripTraceRust] Failed to create snap client: {}", e);
            return raw_result(&samples, e.to_string());
        }
    };

    let snapper = RoadSnapper::new(config, client);
    rt.block_on(snapper.snap_with_report(&samples)).into()
}

/// Single-slot snap cache owned by the mobile host.
#[derive(uniffi::Object)]
pub struct TraceCacheHandle {
    cache: Mutex<TraceCache<RoadsApiClient>>,
    runtime: Runtime,
}

#[uniffi::export]
impl TraceCacheHandle {
    #[uniffi::constructor]
    pub fn new(config: SnapConfig) -> Result<Arc<Self>, TraceError> {
        init_logging();
        let runtime = build_runtime().map_err(|e| TraceError::NetworkFailure {
            message: format!("Runtime error: {}", e),
        })?;
        let client = RoadsApiClient::new(&config)?;
        Ok(Arc::new(Self {
            cache: Mutex::new(TraceCache::new(RoadSnapper::new(config, client))),
            runtime,
        }))
    }

    /// Cached snap result for this trace, snapping on a miss (blocking).
    pub fn get_or_snap(&self, samples: Vec<LocationSample>) -> Vec<Coordinate> {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.runtime.block_on(cache.get_or_snap(&samples))
    }

    /// Evict the cached entry.
    pub fn clear(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.clear();
    }
}
