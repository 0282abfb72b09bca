//! HTTP client for the snap-to-roads service.
//!
//! One GET per chunk:
//!
//! ```text
//! {base_url}/v1/snapToRoads?path=lat,lng|lat,lng|...&interpolate=true&key=...
//! ```
//!
//! The response is decoded into a small typed structure at the boundary.
//! Anything other than a 2xx with a non-empty `snappedPoints` array is an
//! error; the orchestrator turns errors into raw-coordinate fallback.

use std::time::{Duration, Instant};

use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::snapping::{SnapConfig, SnapService, SnappedPoint};
use crate::{Coordinate, Result, TraceError};

const SNAP_PATH: &str = "/v1/snapToRoads";

/// API response for the snap endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapApiResponse {
    snapped_points: Option<Vec<ApiSnappedPoint>>,
    warning_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSnappedPoint {
    location: ApiLatLng,
    /// Present for points snapped from an input; absent for interpolated ones
    original_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ApiLatLng {
    latitude: f64,
    longitude: f64,
}

/// Error body returned alongside non-2xx statuses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Snap-to-roads client
pub struct RoadsApiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    interpolate: bool,
}

impl RoadsApiClient {
    /// Create a client from the snapping configuration.
    ///
    /// The client-level timeout is the per-request timeout. A missing
    /// credential is not an error here: the orchestrator never calls the
    /// service without one.
    pub fn new(config: &SnapConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TraceError::NetworkFailure {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self::with_client(config, client))
    }

    /// Create a client around a pre-built reqwest client.
    pub fn with_client(config: &SnapConfig, client: Client) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", config.base_url.trim_end_matches('/'), SNAP_PATH),
            api_key: config.credential().unwrap_or_default().to_string(),
            interpolate: config.interpolate,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch(&self, chunk: &[Coordinate]) -> Result<Vec<SnappedPoint>> {
        let req_start = Instant::now();
        let path = encode_path(chunk);
        let interpolate = if self.interpolate { "true" } else { "false" };

        // Phase 1: Send request, receive headers
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("path", path.as_str()),
                ("interpolate", interpolate),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| network_error("Request error", e, req_start))?;
        let headers_elapsed = req_start.elapsed();
        let status = resp.status();

        // Phase 2: Download response body
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| network_error("Body download error", e, req_start))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiErrorBody>(&bytes)
                .map(|body| body.error.message)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(TraceError::RemoteService {
                status_code: Some(status.as_u16()),
                message,
            });
        }

        // Phase 3: JSON deserialization
        let data: SnapApiResponse =
            serde_json::from_slice(&bytes).map_err(|e| TraceError::RemoteService {
                status_code: Some(status.as_u16()),
                message: format!("JSON parse error: {}", e),
            })?;

        if let Some(warning) = &data.warning_message {
            warn!("[RoadsApiClient] Service warning: {}", warning);
        }

        let points: Vec<SnappedPoint> = data
            .snapped_points
            .ok_or_else(|| TraceError::RemoteService {
                status_code: Some(status.as_u16()),
                message: "response has no snappedPoints".to_string(),
            })?
            .into_iter()
            .map(|p| {
                SnappedPoint::new(
                    Coordinate::new(p.location.latitude, p.location.longitude),
                    p.original_index,
                )
            })
            .collect();

        if points.is_empty() {
            return Err(TraceError::RemoteService {
                status_code: Some(status.as_u16()),
                message: "snappedPoints is empty".to_string(),
            });
        }

        debug!(
            "[RoadsApiClient] headers={:?} body={:.1}KB total={:?} points {} -> {}",
            headers_elapsed,
            bytes.len() as f64 / 1024.0,
            req_start.elapsed(),
            chunk.len(),
            points.len()
        );

        Ok(points)
    }
}

impl SnapService for RoadsApiClient {
    async fn snap_chunk(&self, chunk: &[Coordinate]) -> Result<Vec<SnappedPoint>> {
        self.fetch(chunk).await
    }
}

fn network_error(context: &str, e: reqwest::Error, started: Instant) -> TraceError {
    if e.is_timeout() {
        TraceError::Timeout {
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    } else {
        TraceError::NetworkFailure {
            message: format!("{}: {}", context, e),
        }
    }
}

/// `lat,lng|lat,lng|...` as the service expects in its `path` parameter.
pub fn encode_path(chunk: &[Coordinate]) -> String {
    chunk
        .iter()
        .map(|c| format!("{},{}", c.latitude, c.longitude))
        .collect::<Vec<_>>()
        .join("|")
}
