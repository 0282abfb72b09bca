//! # Road Snapping
//!
//! Aligns a raw GPS trace onto road geometry using an external snap-to-roads
//! service, and degrades to the raw coordinates whenever that fails.
//!
//! ## Pipeline
//!
//! 1. Bail out with raw coordinates if no credential is configured or the
//!    trace has fewer than 2 points
//! 2. Downsample to `max_total_points`
//! 3. Split at GPS dropouts (`max_gap_km`) so the service never bridges a gap
//! 4. Chunk each segment to the per-request limit, overlapping chunks by a few
//!    points so the service has context at the seams
//! 5. One request per chunk, bounded by a per-request timeout and a total
//!    budget shared by the whole trace
//! 6. Stitch: snapped points the service traces back to the chunk's overlap
//!    prefix are dropped, then the first remaining point is dropped when it
//!    lands within `overlap_merge_m` of the previous accepted point; a failed
//!    chunk contributes its raw points instead
//! 7. Deduplicate, and return raw coordinates if fewer than 2 points survive
//!    or nothing snapped at all
//!
//! [`RoadSnapper::snap`] never fails. [`RoadSnapper::snap_with_report`]
//! additionally says which chunks were snapped and why the others were not.

use std::future::Future;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::geo_utils::distance_m;
use crate::segmentation::{chunk_with_overlap, deduplicate, downsample, split_at_gaps};
use crate::{to_coordinates, AsCoordinate, Coordinate, Result, TraceError};

/// Environment variable holding the snap service credential.
pub const API_KEY_ENV: &str = "ROADS_API_KEY";
/// Environment variable overriding the snap service base URL.
pub const BASE_URL_ENV: &str = "ROADS_API_BASE_URL";

/// Default snap-to-roads endpoint host.
pub const DEFAULT_BASE_URL: &str = "https://roads.googleapis.com";

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the road-snapping pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct SnapConfig {
    /// Credential for the snap service. `None` (or blank) disables snapping
    /// and every trace comes back as raw coordinates.
    pub api_key: Option<String>,

    /// Snap service base URL.
    /// Default: "https://roads.googleapis.com"
    pub base_url: String,

    /// Ask the service to interpolate road geometry between input points.
    /// Default: true
    pub interpolate: bool,

    /// Maximum points considered per trace after downsampling.
    /// Default: 500
    pub max_total_points: u32,

    /// Maximum points per request (the service's per-request limit).
    /// Default: 100
    pub max_points_per_request: u32,

    /// Points shared between consecutive chunks.
    /// Default: 3
    pub overlap_points: u32,

    /// Consecutive points further apart than this start a new segment.
    /// Default: 0.5 km
    pub max_gap_km: f64,

    /// A snapped chunk's first point within this distance of the previous
    /// accepted point is treated as an overlap duplicate.
    /// Default: 10.0 meters
    pub overlap_merge_m: f64,

    /// Timeout for a single request.
    /// Default: 10000 ms
    pub request_timeout_ms: u64,

    /// Budget for the whole trace across all chunks and segments.
    /// Default: 30000 ms
    pub total_timeout_ms: u64,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            interpolate: true,
            max_total_points: 500,
            max_points_per_request: 100,
            overlap_points: 3,
            max_gap_km: 0.5,
            overlap_merge_m: 10.0,
            request_timeout_ms: 10_000,
            total_timeout_ms: 30_000,
        }
    }
}

impl SnapConfig {
    /// Defaults, with the credential and base URL taken from the environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        config.api_key = lookup(API_KEY_ENV).filter(|key| !key.trim().is_empty());
        if let Some(url) = lookup(BASE_URL_ENV).filter(|url| !url.trim().is_empty()) {
            config.base_url = url;
        }
        config
    }

    /// Set the credential.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// The credential, if one is configured and not blank.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn has_credential(&self) -> bool {
        self.credential().is_some()
    }

    /// Downsampling limit, at least 2.
    pub fn max_total_points(&self) -> usize {
        (self.max_total_points as usize).max(2)
    }

    /// Chunk size, at least 2.
    pub fn chunk_size(&self) -> usize {
        (self.max_points_per_request as usize).max(2)
    }

    /// Overlap, always smaller than the chunk size.
    pub fn overlap(&self) -> usize {
        (self.overlap_points as usize).min(self.chunk_size() - 1)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_millis(self.total_timeout_ms)
    }
}

// ============================================================================
// Service Seam
// ============================================================================

/// One point returned by the snap service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnappedPoint {
    pub coordinate: Coordinate,
    /// Index of the input point this was snapped from, within the chunk.
    /// `None` for interpolated points or services that do not report it.
    pub original_index: Option<usize>,
}

impl SnappedPoint {
    pub fn new(coordinate: Coordinate, original_index: Option<usize>) -> Self {
        Self {
            coordinate,
            original_index,
        }
    }
}

impl From<Coordinate> for SnappedPoint {
    fn from(coordinate: Coordinate) -> Self {
        Self::new(coordinate, None)
    }
}

/// An external snap-to-roads service.
///
/// Implementations issue one request for one chunk and return the snapped
/// points in travel order. Every failure (transport, status, body, empty
/// result) is an `Err`; the orchestrator owns timeouts and fallback.
pub trait SnapService {
    fn snap_chunk(&self, chunk: &[Coordinate]) -> impl Future<Output = Result<Vec<SnappedPoint>>>;
}

// ============================================================================
// Reports
// ============================================================================

/// What happened to one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkReport {
    /// Index of the gap segment the chunk belongs to
    pub segment_index: usize,
    /// Points sent (or that would have been sent)
    pub input_points: usize,
    /// Points the service returned (0 on failure)
    pub snapped_points: usize,
    /// Whether the chunk's output is snapped or raw fallback
    pub snapped: bool,
    /// Why the chunk fell back to raw coordinates
    pub error: Option<TraceError>,
}

/// Result of snapping a trace.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapOutcome {
    /// Final coordinates: snapped where possible, raw elsewhere
    pub coordinates: Vec<Coordinate>,
    /// One report per chunk, in order
    pub chunks: Vec<ChunkReport>,
    /// Set when the whole trace came back raw
    pub fallback: Option<TraceError>,
}

impl SnapOutcome {
    fn raw(coordinates: Vec<Coordinate>, chunks: Vec<ChunkReport>, reason: TraceError) -> Self {
        Self {
            coordinates,
            chunks,
            fallback: Some(reason),
        }
    }

    /// True when at least part of the trace is road-aligned.
    pub fn is_snapped(&self) -> bool {
        self.fallback.is_none()
    }

    pub fn snapped_chunk_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.snapped).count()
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Shared time budget for one trace.
struct Budget {
    started: Instant,
    deadline: Instant,
}

impl Budget {
    fn new(total: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started + total,
        }
    }

    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Road-snapping orchestrator.
///
/// # Example
///
/// ```rust,no_run
/// # #[cfg(feature = "http")]
/// # async fn demo(trace: Vec<trip_trace::LocationSample>) {
/// use trip_trace::{RoadSnapper, RoadsApiClient, SnapConfig};
///
/// let config = SnapConfig::from_env();
/// let client = RoadsApiClient::new(&config).unwrap();
/// let snapper = RoadSnapper::new(config, client);
/// let path = snapper.snap(&trace).await;
/// # }
/// ```
pub struct RoadSnapper<S> {
    config: SnapConfig,
    service: S,
}

impl<S: SnapService> RoadSnapper<S> {
    pub fn new(config: SnapConfig, service: S) -> Self {
        Self { config, service }
    }

    pub fn config(&self) -> &SnapConfig {
        &self.config
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Snap a trace. Never fails; degrades to raw coordinates.
    pub async fn snap<T: AsCoordinate>(&self, trace: &[T]) -> Vec<Coordinate> {
        self.snap_with_report(trace).await.coordinates
    }

    /// Snap a trace and report per-chunk results.
    pub async fn snap_with_report<T: AsCoordinate>(&self, trace: &[T]) -> SnapOutcome {
        let raw = to_coordinates(trace);

        if !self.config.has_credential() {
            warn!("[RoadSnapper] No snap service credential configured, using raw coordinates");
            return SnapOutcome::raw(raw, Vec::new(), TraceError::ConfigurationMissing);
        }
        if raw.len() < 2 {
            let reason = TraceError::DegenerateInput {
                point_count: raw.len(),
                minimum_required: 2,
            };
            return SnapOutcome::raw(raw, Vec::new(), reason);
        }

        let budget = Budget::new(self.config.total_timeout());
        let reduced = downsample(&raw, self.config.max_total_points());
        let segments = split_at_gaps(&reduced, self.config.max_gap_km);

        debug!(
            "[RoadSnapper] {} points -> {} after downsampling, {} segments",
            raw.len(),
            reduced.len(),
            segments.len()
        );

        let mut stitched: Vec<Coordinate> = Vec::with_capacity(reduced.len());
        let mut reports = Vec::new();

        for (segment_index, segment) in segments.iter().enumerate() {
            if segment.len() < 2 {
                stitched.extend_from_slice(segment);
                continue;
            }

            for chunk in chunk_with_overlap(segment, self.config.chunk_size(), self.config.overlap()) {
                match self.request_chunk(chunk.points, &budget).await {
                    Ok(points) => {
                        reports.push(ChunkReport {
                            segment_index,
                            input_points: chunk.points.len(),
                            snapped_points: points.len(),
                            snapped: true,
                            error: None,
                        });
                        self.append_snapped(&mut stitched, points, chunk.overlap);
                    }
                    Err(err) => {
                        warn!(
                            "[RoadSnapper] Segment {} chunk of {} points fell back to raw: {}",
                            segment_index,
                            chunk.points.len(),
                            err
                        );
                        stitched.extend_from_slice(chunk.fresh_points());
                        reports.push(ChunkReport {
                            segment_index,
                            input_points: chunk.points.len(),
                            snapped_points: 0,
                            snapped: false,
                            error: Some(err),
                        });
                    }
                }
            }
        }

        let snapped_chunks = reports.iter().filter(|r| r.snapped).count();
        if snapped_chunks == 0 {
            let reason = reports
                .iter()
                .find_map(|r| r.error.clone())
                .unwrap_or(TraceError::DegenerateInput {
                    point_count: stitched.len(),
                    minimum_required: 2,
                });
            warn!("[RoadSnapper] No chunk snapped, using raw coordinates: {}", reason);
            return SnapOutcome::raw(raw, reports, reason);
        }

        let coordinates = deduplicate(&stitched);
        if coordinates.len() < 2 {
            warn!(
                "[RoadSnapper] Only {} point(s) after stitching, using raw coordinates",
                coordinates.len()
            );
            let reason = TraceError::DegenerateInput {
                point_count: coordinates.len(),
                minimum_required: 2,
            };
            return SnapOutcome::raw(raw, reports, reason);
        }

        info!(
            "[RoadSnapper] Snapped {}/{} chunks across {} segments: {} -> {} points in {} ms",
            snapped_chunks,
            reports.len(),
            segments.len(),
            raw.len(),
            coordinates.len(),
            budget.elapsed_ms()
        );

        SnapOutcome {
            coordinates,
            chunks: reports,
            fallback: None,
        }
    }

    /// One request, bounded by the per-request timeout and what is left of the budget.
    async fn request_chunk(&self, points: &[Coordinate], budget: &Budget) -> Result<Vec<SnappedPoint>> {
        let remaining = budget.remaining();
        if remaining.is_zero() {
            return Err(TraceError::Timeout {
                elapsed_ms: budget.elapsed_ms(),
            });
        }

        let limit = remaining.min(self.config.request_timeout());
        let started = Instant::now();
        let snapped = match tokio::time::timeout(limit, self.service.snap_chunk(points)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(TraceError::Timeout {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            }
        };

        if snapped.is_empty() {
            return Err(TraceError::RemoteService {
                status_code: None,
                message: "no snapped points returned".to_string(),
            });
        }
        if let Some(bad) = snapped.iter().find(|p| !p.coordinate.is_valid()) {
            return Err(TraceError::RemoteService {
                status_code: None,
                message: format!("invalid coordinate in response: {:?}", bad.coordinate),
            });
        }

        debug!(
            "[RoadSnapper] Chunk {} -> {} points in {:?}",
            points.len(),
            snapped.len(),
            started.elapsed()
        );
        Ok(snapped)
    }

    /// Append a snapped chunk, collapsing what it repeats of the previous one.
    fn append_snapped(&self, stitched: &mut Vec<Coordinate>, points: Vec<SnappedPoint>, overlap: usize) {
        // Everything up to the last point snapped from an overlap input is already stitched
        let covered = points
            .iter()
            .rposition(|p| p.original_index.is_some_and(|i| i < overlap))
            .map_or(0, |pos| pos + 1);
        let mut fresh = points
            .into_iter()
            .skip(covered)
            .map(|p| p.coordinate)
            .peekable();

        let near_last = match (stitched.last(), fresh.peek()) {
            (Some(last), Some(first)) => distance_m(last, first) <= self.config.overlap_merge_m,
            _ => false,
        };
        if near_last {
            fresh.next();
        }
        stitched.extend(fresh);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Service replaying scripted responses; defaults to echoing the input.
    #[derive(Default)]
    struct ScriptedService {
        responses: RefCell<VecDeque<Result<Vec<Coordinate>>>>,
        requests: RefCell<Vec<Vec<Coordinate>>>,
    }

    impl ScriptedService {
        fn with(responses: Vec<Result<Vec<Coordinate>>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                requests: RefCell::new(Vec::new()),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl SnapService for ScriptedService {
        async fn snap_chunk(&self, chunk: &[Coordinate]) -> Result<Vec<SnappedPoint>> {
            self.requests.borrow_mut().push(chunk.to_vec());
            let response = self
                .responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(chunk.to_vec()));
            response.map(|points| points.into_iter().map(SnappedPoint::from).collect())
        }
    }

    fn keyed() -> SnapConfig {
        SnapConfig::default().with_api_key("test-key")
    }

    fn line(n: usize) -> Vec<Coordinate> {
        (0..n)
            .map(|i| Coordinate::new(19.0 + i as f64 * 0.001, 72.0))
            .collect()
    }

    fn shifted(points: &[Coordinate], dlng: f64) -> Vec<Coordinate> {
        points
            .iter()
            .map(|c| Coordinate::new(c.latitude, c.longitude + dlng))
            .collect()
    }

    #[test]
    fn test_config_defaults() {
        let config = SnapConfig::default();
        assert_eq!(config.api_key, None);
        assert_eq!(config.max_total_points(), 500);
        assert_eq!(config.chunk_size(), 100);
        assert_eq!(config.overlap(), 3);
        assert_eq!(config.max_gap_km, 0.5);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.total_timeout(), Duration::from_secs(30));
        assert!(!config.has_credential());
    }

    #[test]
    fn test_config_blank_key_is_missing() {
        assert!(!SnapConfig::default().with_api_key("   ").has_credential());
        assert_eq!(
            SnapConfig::default().with_api_key(" abc ").credential(),
            Some("abc")
        );
    }

    #[test]
    fn test_config_from_lookup() {
        let config = SnapConfig::from_lookup(|name| match name {
            API_KEY_ENV => Some("env-key".to_string()),
            BASE_URL_ENV => Some("http://localhost:9999".to_string()),
            _ => None,
        });
        assert_eq!(config.credential(), Some("env-key"));
        assert_eq!(config.base_url, "http://localhost:9999");

        let empty = SnapConfig::from_lookup(|_| Some(String::new()));
        assert!(!empty.has_credential());
        assert_eq!(empty.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_config_deserializes_partial_json() {
        let config: SnapConfig =
            serde_json::from_str(r#"{"api_key":"k","max_points_per_request":50}"#).unwrap();
        assert_eq!(config.credential(), Some("k"));
        assert_eq!(config.chunk_size(), 50);
        assert_eq!(config.overlap_points, 3);
    }

    #[test]
    fn test_config_clamps_overlap() {
        let config = SnapConfig {
            max_points_per_request: 1,
            overlap_points: 5,
            ..SnapConfig::default()
        };
        assert_eq!(config.chunk_size(), 2);
        assert_eq!(config.overlap(), 1);
    }

    #[tokio::test]
    async fn test_missing_credential_returns_raw_without_requests() {
        let snapper = RoadSnapper::new(SnapConfig::default(), ScriptedService::default());
        let trace = line(5);
        let outcome = snapper.snap_with_report(&trace).await;
        assert_eq!(outcome.coordinates, trace);
        assert_eq!(outcome.fallback, Some(TraceError::ConfigurationMissing));
        assert_eq!(snapper.service().request_count(), 0);
    }

    #[tokio::test]
    async fn test_degenerate_traces() {
        let snapper = RoadSnapper::new(keyed(), ScriptedService::default());
        assert!(snapper.snap::<Coordinate>(&[]).await.is_empty());

        let single = [Coordinate::new(19.0, 72.0)];
        assert_eq!(snapper.snap(&single).await, single.to_vec());
        assert_eq!(snapper.service().request_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_snap_uses_service_points() {
        let trace = line(10);
        let road = shifted(&trace, 0.0005);
        let service = ScriptedService::with(vec![Ok(road.clone())]);
        let snapper = RoadSnapper::new(keyed(), service);

        let outcome = snapper.snap_with_report(&trace).await;
        assert!(outcome.is_snapped());
        assert_eq!(outcome.coordinates, road);
        assert_eq!(outcome.snapped_chunk_count(), 1);
        assert_eq!(snapper.service().request_count(), 1);
    }

    #[tokio::test]
    async fn test_all_chunks_failing_returns_raw_in_order() {
        let trace = line(250);
        let failure = || {
            Err(TraceError::RemoteService {
                status_code: Some(500),
                message: "boom".to_string(),
            })
        };
        let service = ScriptedService::with(vec![failure(), failure(), failure()]);
        let snapper = RoadSnapper::new(keyed(), service);

        let outcome = snapper.snap_with_report(&trace).await;
        assert_eq!(outcome.coordinates, trace);
        assert_eq!(outcome.chunks.len(), 3);
        assert!(outcome.chunks.iter().all(|c| !c.snapped));
        assert!(matches!(
            outcome.fallback,
            Some(TraceError::RemoteService { status_code: Some(500), .. })
        ));
    }

    #[tokio::test]
    async fn test_partial_failure_is_local_to_the_chunk() {
        // 250 points -> chunks [0,100) [97,197) [194,250); the middle one fails
        let trace = line(250);
        let first = shifted(&trace[0..100], 0.0003);
        let last = shifted(&trace[194..250], 0.0003);
        let service = ScriptedService::with(vec![
            Ok(first.clone()),
            Err(TraceError::NetworkFailure {
                message: "reset".to_string(),
            }),
            Ok(last.clone()),
        ]);
        let snapper = RoadSnapper::new(keyed(), service);

        let outcome = snapper.snap_with_report(&trace).await;
        assert!(outcome.is_snapped());
        assert_eq!(outcome.snapped_chunk_count(), 2);
        assert!(!outcome.chunks[1].snapped);

        let mut expected = first;
        expected.extend_from_slice(&trace[100..197]);
        expected.extend(last);
        assert_eq!(outcome.coordinates, expected);
    }

    #[tokio::test]
    async fn test_overlap_duplicate_is_collapsed() {
        let trace = line(150);
        let first = trace[0..100].to_vec();
        // Second chunk starts at index 97; make its first returned point coincide with the
        // last accepted point and the rest distinct
        let mut second = vec![trace[99]];
        second.extend(shifted(&trace[100..150], 0.0002));
        let service = ScriptedService::with(vec![Ok(first.clone()), Ok(second.clone())]);
        let snapper = RoadSnapper::new(keyed(), service);

        let coords = snapper.snap(&trace).await;
        let mut expected = first;
        expected.extend_from_slice(&second[1..]);
        assert_eq!(coords, expected);
    }

    #[tokio::test]
    async fn test_near_duplicate_within_merge_distance_is_dropped() {
        let trace = line(150);
        let first = trace[0..100].to_vec();
        // ~5 m east of the last accepted point
        let near = Coordinate::new(trace[99].latitude, trace[99].longitude + 0.00005);
        let far = Coordinate::new(trace[99].latitude + 0.01, trace[99].longitude);
        let service = ScriptedService::with(vec![Ok(first), Ok(vec![near, far])]);
        let snapper = RoadSnapper::new(keyed(), service);

        let coords = snapper.snap(&trace).await;
        assert_eq!(coords.len(), 101);
        assert_eq!(coords[100], far);
    }

    #[tokio::test]
    async fn test_empty_result_falls_back_for_that_chunk() {
        let trace = line(10);
        let service = ScriptedService::with(vec![Ok(vec![])]);
        let snapper = RoadSnapper::new(keyed(), service);

        let outcome = snapper.snap_with_report(&trace).await;
        assert_eq!(outcome.coordinates, trace);
        assert!(matches!(
            outcome.chunks[0].error,
            Some(TraceError::RemoteService { status_code: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_points_in_response_fall_back() {
        let trace = line(10);
        let service = ScriptedService::with(vec![Ok(vec![
            Coordinate::new(19.0, 72.0),
            Coordinate::new(f64::NAN, 72.0),
        ])]);
        let snapper = RoadSnapper::new(keyed(), service);
        assert_eq!(snapper.snap(&trace).await, trace);
    }

    #[tokio::test]
    async fn test_gap_segments_are_requested_separately() {
        let mut trace = line(10);
        trace.extend((0..10).map(|i| Coordinate::new(20.0 + i as f64 * 0.001, 72.0)));
        let snapper = RoadSnapper::new(keyed(), ScriptedService::default());

        let outcome = snapper.snap_with_report(&trace).await;
        assert_eq!(snapper.service().request_count(), 2);
        assert_eq!(outcome.chunks[0].segment_index, 0);
        assert_eq!(outcome.chunks[1].segment_index, 1);
        let requests = snapper.service().requests.borrow();
        assert_eq!(requests[0], trace[..10].to_vec());
        assert_eq!(requests[1], trace[10..].to_vec());
    }

    #[tokio::test]
    async fn test_trailing_single_point_segment_is_kept_raw() {
        let mut trace = line(10);
        let tail = Coordinate::new(21.0, 72.0);
        trace.push(tail);
        let snapper = RoadSnapper::new(keyed(), ScriptedService::default());

        let coords = snapper.snap(&trace).await;
        assert_eq!(snapper.service().request_count(), 1);
        assert_eq!(coords.last(), Some(&tail));
        assert_eq!(coords.len(), 11);
    }

    #[tokio::test]
    async fn test_large_trace_is_downsampled_before_chunking() {
        let trace = line(1000);
        let config = SnapConfig {
            max_gap_km: 5.0,
            ..keyed()
        };
        let snapper = RoadSnapper::new(config, ScriptedService::default());

        let coords = snapper.snap(&trace).await;
        let sent: usize = snapper
            .service()
            .requests
            .borrow()
            .iter()
            .map(|r| r.len())
            .sum();
        // 500 points in chunks of 100 with 3 overlap -> 6 requests
        assert_eq!(snapper.service().request_count(), 6);
        assert_eq!(sent, 500 + 5 * 3);
        // An echo without original indices re-returns the overlap points; only a seam
        // point within overlap_merge_m of the previous one is collapsed, and these are
        // ~220 m apart
        assert_eq!(coords.len(), sent);
        assert_eq!(coords[0], trace[0]);
        assert_eq!(coords[coords.len() - 1], trace[999]);
    }

    #[tokio::test]
    async fn test_repeated_points_inside_a_chunk_are_collapsed() {
        let trace = line(10);
        let p = Coordinate::new(19.0001, 72.0001);
        let q = Coordinate::new(19.0031, 72.0001);
        let r = Coordinate::new(19.0061, 72.0001);
        let service = ScriptedService::with(vec![Ok(vec![p, p, q, q, r])]);
        let snapper = RoadSnapper::new(keyed(), service);

        let outcome = snapper.snap_with_report(&trace).await;
        assert!(outcome.is_snapped());
        assert_eq!(outcome.coordinates, vec![p, q, r]);
    }

    /// Snaps every input point slightly east, reports its index, and
    /// interpolates a midpoint between neighbours.
    struct InterpolatingService;

    impl SnapService for InterpolatingService {
        async fn snap_chunk(&self, chunk: &[Coordinate]) -> Result<Vec<SnappedPoint>> {
            let snapped = shifted(chunk, 0.0001);
            let mut points = Vec::with_capacity(snapped.len() * 2);
            for (i, c) in snapped.iter().enumerate() {
                if i > 0 {
                    let prev = snapped[i - 1];
                    let mid = Coordinate::new(
                        (prev.latitude + c.latitude) / 2.0,
                        (prev.longitude + c.longitude) / 2.0,
                    );
                    points.push(SnappedPoint::new(mid, None));
                }
                points.push(SnappedPoint::new(*c, Some(i)));
            }
            Ok(points)
        }
    }

    #[tokio::test]
    async fn test_overlap_points_reported_by_index_are_not_stitched_twice() {
        // Chunks [0,100) and [97,150); the second repeats inputs 97..=99
        let trace = line(150);
        let snapper = RoadSnapper::new(keyed(), InterpolatingService);

        let coords = snapper.snap(&trace).await;
        // 150 snapped inputs plus one midpoint per consecutive pair
        assert_eq!(coords.len(), 150 + 149);
        assert!(coords.windows(2).all(|w| w[0].latitude < w[1].latitude));
        assert_eq!(coords[0], shifted(&trace[..1], 0.0001)[0]);
        assert_eq!(coords[coords.len() - 1], shifted(&trace[149..], 0.0001)[0]);
    }
}
