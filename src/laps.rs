//! Lap segmentation
//!
//! Device-reported laps are trusted verbatim. Without them, laps are cut from
//! the normalized stream every time cumulative distance crosses the next split
//! multiple. Each step between two consecutive samples belongs to exactly one
//! lap: the boundary sample closes one lap and is the baseline of the next.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{seconds_between, Lap, LapSource, NativeLap, NormalizedStream, TelemetrySample};

/// Lap segmentation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LapConfig {
    /// Synthesized lap length in meters
    pub split_distance_m: f64,

    /// Speeds at or below this count as stopped (m/s)
    pub stopped_speed_mps: f64,

    /// Stops longer than this are removed from moving time (seconds)
    pub max_pause_seconds: f64,

    /// Altitude change needed before it counts as gain or loss (meters)
    pub elevation_noise_threshold_m: f64,

    /// Distance steps outside (0, this] are ignored for grade integration (meters)
    pub max_grade_step_m: f64,
}

impl Default for LapConfig {
    fn default() -> Self {
        LapConfig {
            split_distance_m: 1000.0,
            stopped_speed_mps: 0.1,
            max_pause_seconds: 10.0,
            elevation_noise_threshold_m: 0.8,
            max_grade_step_m: 100.0,
        }
    }
}

/// Format seconds-per-kilometer as "m:ss"
pub fn format_pace(sec_per_km: f64) -> String {
    if !sec_per_km.is_finite() || sec_per_km <= 0.0 {
        return "--:--".to_string();
    }
    let total = sec_per_km.round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Splits a normalized stream into laps
pub struct LapSegmenter {
    config: LapConfig,
}

impl LapSegmenter {
    pub fn new() -> Self {
        LapSegmenter {
            config: LapConfig::default(),
        }
    }

    pub fn with_config(config: LapConfig) -> Self {
        LapSegmenter { config }
    }

    /// Produce laps, preferring device-reported boundaries when present
    pub fn segment(&self, stream: &NormalizedStream, native_laps: Option<&[NativeLap]>) -> Vec<Lap> {
        match native_laps {
            Some(laps) if !laps.is_empty() => {
                debug!(laps = laps.len(), "Using device-reported laps");
                self.from_native(laps)
            }
            _ => {
                let laps = self.synthesize(stream.samples());
                debug!(laps = laps.len(), split_m = self.config.split_distance_m, "Synthesized laps");
                laps
            }
        }
    }

    /// Reformat device laps without recomputing anything from the stream
    pub fn from_native(&self, laps: &[NativeLap]) -> Vec<Lap> {
        laps.iter()
            .enumerate()
            .map(|(i, native)| {
                let duration = native
                    .total_timer_time
                    .filter(|t| t.is_finite() && *t >= 0.0)
                    .unwrap_or(native.total_elapsed_time);

                let pace = match native.avg_speed {
                    Some(speed) if speed.is_finite() && speed > 0.0 => 1000.0 / speed,
                    _ => pace_from(duration, native.total_distance),
                };

                Lap {
                    index: (i + 1) as u32,
                    distance_meters: native.total_distance,
                    duration_seconds: duration,
                    elapsed_seconds: native.total_elapsed_time,
                    avg_pace_sec_per_km: pace,
                    avg_heart_rate: native.avg_heart_rate.filter(|hr| *hr > 0.0),
                    avg_power: native.avg_power,
                    elevation_gain: native.total_ascent.unwrap_or(0.0),
                    elevation_loss: native.total_descent.unwrap_or(0.0),
                    source: LapSource::Device,
                }
            })
            .collect()
    }

    fn synthesize(&self, samples: &[TelemetrySample]) -> Vec<Lap> {
        let mut laps = Vec::new();
        if samples.len() < 2 {
            return laps;
        }

        let split = if self.config.split_distance_m > 0.0 {
            self.config.split_distance_m
        } else {
            LapConfig::default().split_distance_m
        };

        let last = samples.len() - 1;
        let mut start = 0;
        let mut next_mark = split;

        for i in 1..=last {
            let distance = samples[i].distance.unwrap_or(0.0);
            if distance >= next_mark || i == last {
                laps.push(self.build_lap(laps.len() as u32 + 1, samples, start, i));
                start = i;
                next_mark = ((distance / split).floor() + 1.0) * split;
            }
        }

        laps
    }

    fn build_lap(&self, index: u32, samples: &[TelemetrySample], start: usize, end: usize) -> Lap {
        let window = &samples[start..=end];
        // The boundary sample at `start` belongs to the previous lap
        let owned = if start == 0 { window } else { &window[1..] };

        let start_distance = window[0].distance.unwrap_or(0.0);
        let end_distance = window[window.len() - 1].distance.unwrap_or(start_distance);
        let distance = (end_distance - start_distance).max(0.0);

        let moving = self.moving_seconds(window);
        let (gain, loss) = self.elevation_change(window, start == 0);

        Lap {
            index,
            distance_meters: distance,
            duration_seconds: moving,
            elapsed_seconds: seconds_between(window[0].timestamp, window[window.len() - 1].timestamp),
            avg_pace_sec_per_km: pace_from(moving, distance),
            avg_heart_rate: mean(owned.iter().filter_map(|s| s.valid_heart_rate())),
            avg_power: mean(owned.iter().filter_map(|s| s.power.filter(|p| p.is_finite()))),
            elevation_gain: gain,
            elevation_loss: loss,
            source: LapSource::Synthesized,
        }
    }

    /// Moving time across a window, dropping stops longer than the pause limit
    pub fn moving_seconds(&self, window: &[TelemetrySample]) -> f64 {
        let mut moving = 0.0;
        let mut paused = 0.0;

        for pair in window.windows(2) {
            let dt = seconds_between(pair[0].timestamp, pair[1].timestamp).max(0.0);
            let stopped = pair[1]
                .valid_speed()
                .map_or(false, |speed| speed <= self.config.stopped_speed_mps);

            if stopped {
                paused += dt;
            } else {
                if paused <= self.config.max_pause_seconds {
                    moving += paused;
                }
                paused = 0.0;
                moving += dt;
            }
        }

        if paused <= self.config.max_pause_seconds {
            moving += paused;
        }
        moving
    }

    /// Elevation gain and loss across a window
    ///
    /// Grade integration is used when every owned sample carries a grade;
    /// otherwise raw altitude is filtered through the noise threshold.
    pub fn elevation_change(&self, window: &[TelemetrySample], includes_first: bool) -> (f64, f64) {
        let owned = if includes_first { window } else { &window[1..] };
        let grade_complete = !owned.is_empty() && owned.iter().all(|s| s.grade.map_or(false, f64::is_finite));

        if grade_complete {
            self.grade_integrated(window)
        } else {
            self.threshold_filtered(window)
        }
    }

    fn grade_integrated(&self, window: &[TelemetrySample]) -> (f64, f64) {
        let mut gain = 0.0;
        let mut loss = 0.0;

        for pair in window.windows(2) {
            let step = pair[1].distance.unwrap_or(0.0) - pair[0].distance.unwrap_or(0.0);
            if step <= 0.0 || step > self.config.max_grade_step_m {
                continue;
            }
            let rise = step * pair[1].grade.unwrap_or(0.0) / 100.0;
            if rise > 0.0 {
                gain += rise;
            } else {
                loss += -rise;
            }
        }

        (gain, loss)
    }

    fn threshold_filtered(&self, window: &[TelemetrySample]) -> (f64, f64) {
        let mut gain = 0.0;
        let mut loss = 0.0;
        let mut last_valid: Option<f64> = None;

        for altitude in window.iter().filter_map(|s| s.altitude.filter(|a| a.is_finite())) {
            let Some(reference) = last_valid else {
                last_valid = Some(altitude);
                continue;
            };

            let delta = altitude - reference;
            if delta.abs() > self.config.elevation_noise_threshold_m {
                if delta > 0.0 {
                    gain += delta;
                } else {
                    loss += -delta;
                }
                last_valid = Some(altitude);
            }
        }

        (gain, loss)
    }
}

impl Default for LapSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

/// Segment laps with default settings
pub fn segment_laps(stream: &NormalizedStream, native_laps: Option<&[NativeLap]>) -> Vec<Lap> {
    LapSegmenter::new().segment(stream, native_laps)
}

fn pace_from(seconds: f64, meters: f64) -> f64 {
    if meters > 0.0 && seconds.is_finite() {
        seconds / (meters / 1000.0)
    } else {
        0.0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
