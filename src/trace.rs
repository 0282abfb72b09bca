//! # Trace Filtering and Live Odometer
//!
//! Raw fixes from the sampling subsystem are noisy: indoor fixes with a
//! 300 m accuracy radius, occasional teleports, repeated or backwards
//! timestamps. [`TraceFilter`] drops the obvious junk before distance or
//! snapping work, and [`Odometer`] keeps a running trip distance for the live
//! display while samples are still arriving.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::geo_utils::{distance_km, round_km};
use crate::{AsCoordinate, Coordinate, LocationSample};

/// Noise filter for raw location samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct TraceFilter {
    /// Samples reporting a worse (larger) accuracy radius are dropped.
    /// `None` keeps every sample regardless of accuracy.
    /// Default: 50.0 meters
    pub max_accuracy_m: Option<f64>,

    /// Samples implying a faster movement from the last kept sample are dropped.
    /// Default: 70.0 m/s (~250 km/h)
    pub max_speed_mps: f64,
}

impl Default for TraceFilter {
    fn default() -> Self {
        Self {
            max_accuracy_m: Some(50.0),
            max_speed_mps: 70.0,
        }
    }
}

impl TraceFilter {
    /// Filter samples, preserving order.
    ///
    /// Invalid coordinates, poor accuracy and implausible jumps are removed.
    /// When the timestamp does not advance (duplicate or backwards step) the
    /// speed check is skipped and the sample is kept.
    pub fn filter_samples(&self, samples: &[LocationSample]) -> Vec<LocationSample> {
        let mut kept: Vec<LocationSample> = Vec::with_capacity(samples.len());

        for sample in samples {
            if !self.accepts(sample, kept.last()) {
                continue;
            }
            kept.push(*sample);
        }

        if kept.len() != samples.len() {
            debug!(
                "[TraceFilter] Kept {}/{} samples",
                kept.len(),
                samples.len()
            );
        }
        kept
    }

    fn accepts(&self, sample: &LocationSample, last: Option<&LocationSample>) -> bool {
        if !sample.coordinate().is_valid() {
            return false;
        }

        if let (Some(limit), Some(accuracy)) = (self.max_accuracy_m, sample.accuracy_m) {
            if accuracy > limit {
                return false;
            }
        }

        let Some(last) = last else {
            return true;
        };
        let dt_ms = sample.timestamp_ms - last.timestamp_ms;
        if dt_ms <= 0 {
            return true;
        }

        let meters = distance_km(&last.coordinate(), &sample.coordinate()) * 1000.0;
        let speed = meters / (dt_ms as f64 / 1000.0);
        speed <= self.max_speed_mps
    }
}

/// Running trip distance for the live display.
#[derive(Debug, Clone, Default)]
pub struct Odometer {
    last: Option<Coordinate>,
    total_km: f64,
    points: usize,
}

impl Odometer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a point and return the distance it added, in km.
    ///
    /// Invalid coordinates are ignored and add nothing.
    pub fn push<T: AsCoordinate>(&mut self, point: &T) -> f64 {
        let coord = point.coordinate();
        if !coord.is_valid() {
            return 0.0;
        }

        let added = self
            .last
            .map_or(0.0, |prev| distance_km(&prev, &coord));
        self.total_km += added;
        self.last = Some(coord);
        self.points += 1;
        added
    }

    /// Add every point of a batch.
    pub fn extend<T: AsCoordinate>(&mut self, points: &[T]) {
        for p in points {
            self.push(p);
        }
    }

    /// Distance so far, rounded to 2 decimals.
    pub fn total_km(&self) -> f64 {
        round_km(self.total_km)
    }

    /// Distance so far, unrounded.
    pub fn raw_total_km(&self) -> f64 {
        self.total_km
    }

    /// Number of accepted points.
    pub fn point_count(&self) -> usize {
        self.points
    }

    /// Start a new trip.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::total_distance_km;

    fn sample(lat: f64, lng: f64, t: i64) -> LocationSample {
        LocationSample::new(lat, lng, t)
    }

    #[test]
    fn test_filter_drops_invalid_and_inaccurate() {
        let samples = vec![
            sample(19.0, 72.0, 0).with_accuracy(10.0),
            sample(f64::NAN, 72.0, 1_000),
            sample(19.0001, 72.0, 2_000).with_accuracy(300.0),
            sample(19.0002, 72.0, 3_000),
        ];
        let kept = TraceFilter::default().filter_samples(&samples);
        assert_eq!(kept, vec![samples[0], samples[3]]);
    }

    #[test]
    fn test_filter_accuracy_disabled() {
        let filter = TraceFilter {
            max_accuracy_m: None,
            ..TraceFilter::default()
        };
        let samples = vec![sample(19.0, 72.0, 0).with_accuracy(500.0)];
        assert_eq!(filter.filter_samples(&samples).len(), 1);
    }

    #[test]
    fn test_filter_drops_teleport() {
        // 0.1 degrees (~11 km) in one second is far beyond 70 m/s
        let samples = vec![
            sample(19.0, 72.0, 0),
            sample(19.1, 72.0, 1_000),
            sample(19.0005, 72.0, 10_000),
        ];
        let kept = TraceFilter::default().filter_samples(&samples);
        assert_eq!(kept, vec![samples[0], samples[2]]);
    }

    #[test]
    fn test_filter_tolerates_duplicate_and_backward_timestamps() {
        let samples = vec![
            sample(19.0, 72.0, 5_000),
            sample(19.0001, 72.0, 5_000),
            sample(19.0002, 72.0, 4_000),
            sample(19.0003, 72.0, 9_000),
        ];
        let kept = TraceFilter::default().filter_samples(&samples);
        assert_eq!(kept.len(), 4);
    }

    #[test]
    fn test_odometer_matches_batch_distance() {
        let trace: Vec<Coordinate> = (0..20)
            .map(|i| Coordinate::new(19.0 + i as f64 * 0.0013, 72.0 + i as f64 * 0.0007))
            .collect();
        let mut odo = Odometer::new();
        odo.extend(&trace);
        assert_eq!(odo.point_count(), 20);
        assert_eq!(odo.total_km(), total_distance_km(&trace));
    }

    #[test]
    fn test_odometer_ignores_invalid_and_resets() {
        let mut odo = Odometer::new();
        assert_eq!(odo.push(&Coordinate::new(19.0, 72.0)), 0.0);
        assert_eq!(odo.push(&Coordinate::new(f64::NAN, 72.0)), 0.0);
        let added = odo.push(&sample(19.01, 72.0, 1_000));
        assert!((added - 1.11195).abs() < 1e-4);
        assert_eq!(odo.point_count(), 2);
        assert_eq!(odo.total_km(), 1.11);

        odo.reset();
        assert_eq!(odo.point_count(), 0);
        assert_eq!(odo.raw_total_km(), 0.0);
    }
}
