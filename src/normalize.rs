//! Telemetry repair
//!
//! Fills gaps in a raw sample stream so that every downstream analyzer sees a
//! cumulative distance that never decreases and a speed wherever one can be
//! derived. Normalization never drops or reorders samples.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{OrderingError, Result};
use crate::models::{seconds_between, NormalizedStream, TelemetrySample};

/// Mean Earth radius used for great-circle distances
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two coordinates in decimal degrees
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Counters describing what a normalization pass repaired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairStats {
    pub distances_backfilled: usize,
    pub distances_clamped: usize,
    pub speeds_derived: usize,
}

/// Repair a raw sample stream
///
/// Samples must already be sorted by timestamp; a sample older than its
/// predecessor is rejected rather than silently producing a wrong distance.
pub fn normalize(samples: &[TelemetrySample]) -> Result<NormalizedStream> {
    normalize_with_stats(samples).map(|(stream, _)| stream)
}

/// Same as [`normalize`], also returning repair counters
pub fn normalize_with_stats(samples: &[TelemetrySample]) -> Result<(NormalizedStream, RepairStats)> {
    ensure_sorted(samples)?;

    let mut stats = RepairStats::default();
    let mut repaired: Vec<TelemetrySample> = Vec::with_capacity(samples.len());

    for sample in samples {
        let mut current = sample.clone();

        match repaired.last() {
            None => {
                if current.distance.filter(|d| d.is_finite()).is_none() {
                    current.distance = Some(0.0);
                    stats.distances_backfilled += 1;
                }
            }
            Some(previous) => {
                let previous_distance = previous.distance.unwrap_or(0.0);
                let mut delta_known = true;

                match current.distance.filter(|d| d.is_finite()) {
                    Some(reported) if reported < previous_distance => {
                        current.distance = Some(previous_distance);
                        stats.distances_clamped += 1;
                    }
                    Some(_) => {}
                    None => {
                        let step = match (previous.position(), current.position()) {
                            (Some((lat1, lon1)), Some((lat2, lon2))) => {
                                haversine_distance(lat1, lon1, lat2, lon2)
                            }
                            // Distance stalls until both coordinates are known again
                            _ => {
                                delta_known = false;
                                0.0
                            }
                        };
                        current.distance = Some(previous_distance + step);
                        stats.distances_backfilled += 1;
                    }
                }

                let speed_missing = current.valid_speed().map_or(true, |s| s == 0.0);
                if speed_missing && delta_known {
                    let dt = seconds_between(previous.timestamp, current.timestamp);
                    if dt > 0.0 {
                        let dd = current.distance.unwrap_or(previous_distance) - previous_distance;
                        current.speed = Some(dd / dt);
                        stats.speeds_derived += 1;
                    }
                }
            }
        }

        repaired.push(current);
    }

    debug!(
        samples = repaired.len(),
        distances_backfilled = stats.distances_backfilled,
        distances_clamped = stats.distances_clamped,
        speeds_derived = stats.speeds_derived,
        "Normalized telemetry stream"
    );

    Ok((NormalizedStream::from_repaired(repaired), stats))
}

fn ensure_sorted(samples: &[TelemetrySample]) -> Result<()> {
    for (index, pair) in samples.windows(2).enumerate() {
        if pair[1].timestamp < pair[0].timestamp {
            return Err(OrderingError::UnsortedTimestamps {
                index: index + 1,
                previous: pair[0].timestamp,
                current: pair[1].timestamp,
            }
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AnalyticsError, ErrorCategory};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 2, 6, 30, 0).unwrap()
    }

    fn at(seconds: i64) -> TelemetrySample {
        TelemetrySample::new(start() + Duration::seconds(seconds))
    }

    #[test]
    fn test_haversine_one_millidegree_latitude() {
        let dist = haversine_distance(45.0, 7.0, 45.001, 7.0);
        assert!((dist - 111.19).abs() < 0.1);
    }

    #[test]
    fn test_missing_distance_backfill_from_coordinates() {
        let samples = vec![
            TelemetrySample {
                latitude: Some(45.0),
                longitude: Some(7.0),
                ..at(0)
            },
            TelemetrySample {
                latitude: Some(45.001),
                longitude: Some(7.0),
                ..at(30)
            },
        ];

        let stream = normalize(&samples).unwrap();
        let d0 = stream.samples()[0].distance.unwrap();
        let d1 = stream.samples()[1].distance.unwrap();

        assert_eq!(d0, 0.0);
        assert!(((d1 - d0) - 111.0).abs() / 111.0 < 0.01);
    }

    #[test]
    fn test_distance_stalls_without_coordinates() {
        let samples = vec![
            TelemetrySample {
                distance: Some(250.0),
                ..at(0)
            },
            TelemetrySample {
                latitude: Some(45.0),
                ..at(1)
            },
            at(2),
        ];

        let (stream, stats) = normalize_with_stats(&samples).unwrap();
        let distances: Vec<f64> = stream.samples().iter().map(|s| s.distance.unwrap()).collect();
        assert_eq!(distances, vec![250.0, 250.0, 250.0]);

        // A stalled distance is not a measured stop
        assert!(stream.samples().iter().all(|s| s.speed.is_none()));
        assert_eq!(stats.speeds_derived, 0);
    }

    #[test]
    fn test_heart_rate_only_stream_keeps_moving_time() {
        let samples: Vec<TelemetrySample> = (0..=600)
            .map(|i| TelemetrySample {
                heart_rate: Some(135.0),
                ..at(i)
            })
            .collect();

        let stream = normalize(&samples).unwrap();
        assert!(stream.samples().iter().all(|s| s.speed.is_none()));

        let segmenter = crate::laps::LapSegmenter::new();
        assert_eq!(segmenter.moving_seconds(stream.samples()), 600.0);
    }

    #[test]
    fn test_speed_derived_when_absent_or_zero() {
        let samples = vec![
            TelemetrySample {
                distance: Some(0.0),
                ..at(0)
            },
            TelemetrySample {
                distance: Some(10.0),
                speed: Some(0.0),
                ..at(2)
            },
            TelemetrySample {
                distance: Some(22.0),
                ..at(4)
            },
            TelemetrySample {
                distance: Some(30.0),
                speed: Some(3.5),
                ..at(6)
            },
        ];

        let (stream, stats) = normalize_with_stats(&samples).unwrap();
        let speeds: Vec<Option<f64>> = stream.samples().iter().map(|s| s.speed).collect();

        assert_eq!(speeds, vec![None, Some(5.0), Some(6.0), Some(3.5)]);
        assert_eq!(stats.speeds_derived, 2);
    }

    #[test]
    fn test_speed_not_derived_for_zero_time_delta() {
        let samples = vec![
            TelemetrySample {
                distance: Some(0.0),
                ..at(0)
            },
            TelemetrySample {
                distance: Some(5.0),
                ..at(0)
            },
        ];

        let stream = normalize(&samples).unwrap();
        assert_eq!(stream.samples()[1].speed, None);
    }

    #[test]
    fn test_backwards_distance_is_clamped() {
        let samples = vec![
            TelemetrySample {
                distance: Some(100.0),
                ..at(0)
            },
            TelemetrySample {
                distance: Some(90.0),
                ..at(1)
            },
            TelemetrySample {
                distance: Some(105.0),
                ..at(2)
            },
        ];

        let (stream, stats) = normalize_with_stats(&samples).unwrap();
        let distances: Vec<f64> = stream.samples().iter().map(|s| s.distance.unwrap()).collect();
        assert_eq!(distances, vec![100.0, 100.0, 105.0]);
        assert_eq!(stats.distances_clamped, 1);
    }

    #[test]
    fn test_unsorted_timestamps_rejected() {
        let samples = vec![at(0), at(5), at(3)];

        let err = normalize(&samples).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InputOrdering);
        match err {
            AnalyticsError::Ordering(OrderingError::UnsortedTimestamps { index, .. }) => {
                assert_eq!(index, 2)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_stream() {
        let stream = normalize(&[]).unwrap();
        assert!(stream.is_empty());
        assert_eq!(stream.duration_seconds(), 0.0);
    }

    #[test]
    fn test_no_sample_dropped() {
        let samples: Vec<TelemetrySample> = (0..50).map(at).collect();
        let stream = normalize(&samples).unwrap();
        assert_eq!(stream.len(), 50);
        for (raw, repaired) in samples.iter().zip(stream.samples()) {
            assert_eq!(raw.timestamp, repaired.timestamp);
        }
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_distance_is_monotonic(
            steps in proptest::collection::vec(
                (0i64..5, proptest::option::of(-50.0f64..5000.0), proptest::option::of((-0.01f64..0.01, -0.01f64..0.01))),
                1..200
            )
        ) {
            let mut elapsed = 0i64;
            let samples: Vec<TelemetrySample> = steps
                .iter()
                .map(|(gap, distance, offset)| {
                    elapsed += gap;
                    TelemetrySample {
                        distance: *distance,
                        latitude: offset.map(|(dlat, _)| 45.0 + dlat),
                        longitude: offset.map(|(_, dlon)| 7.0 + dlon),
                        ..at(elapsed)
                    }
                })
                .collect();

            let stream = normalize(&samples).unwrap();
            prop_assert_eq!(stream.len(), samples.len());
            for pair in stream.samples().windows(2) {
                prop_assert!(pair[1].distance.unwrap() >= pair[0].distance.unwrap());
            }
        }
    }
}
