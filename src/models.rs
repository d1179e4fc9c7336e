use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

/// One timestamped reading from an activity recording
///
/// Optional fields may be absent or zero. Zero and absence are not the same
/// thing for rate computations: see [`TelemetrySample::valid_heart_rate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Instant the reading was taken
    pub timestamp: DateTime<Utc>,

    /// Heart rate in beats per minute
    #[serde(default, alias = "heartrate", alias = "hr")]
    pub heart_rate: Option<f64>,

    /// Speed in meters per second
    #[serde(default, alias = "velocity_smooth")]
    pub speed: Option<f64>,

    /// Altitude in meters
    #[serde(default, alias = "elevation", alias = "enhanced_altitude")]
    pub altitude: Option<f64>,

    /// Cumulative distance in meters
    #[serde(default)]
    pub distance: Option<f64>,

    /// Power output in watts
    #[serde(default, alias = "watts")]
    pub power: Option<f64>,

    /// Cadence (steps or revolutions per minute)
    #[serde(default)]
    pub cadence: Option<f64>,

    /// Latitude in decimal degrees
    #[serde(default, alias = "lat", alias = "position_lat")]
    pub latitude: Option<f64>,

    /// Longitude in decimal degrees
    #[serde(default, alias = "lng", alias = "lon", alias = "long", alias = "position_long")]
    pub longitude: Option<f64>,

    /// Grade in percent
    #[serde(default, alias = "grade_smooth")]
    pub grade: Option<f64>,
}

impl TelemetrySample {
    /// Create a sample carrying only a timestamp
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        TelemetrySample {
            timestamp,
            heart_rate: None,
            speed: None,
            altitude: None,
            distance: None,
            power: None,
            cadence: None,
            latitude: None,
            longitude: None,
            grade: None,
        }
    }

    /// Heart rate if the sensor reported a usable value (0 bpm counts as absent)
    pub fn valid_heart_rate(&self) -> Option<f64> {
        self.heart_rate.filter(|hr| hr.is_finite() && *hr > 0.0)
    }

    /// Speed if present and finite
    pub fn valid_speed(&self) -> Option<f64> {
        self.speed.filter(|s| s.is_finite() && *s >= 0.0)
    }

    /// Coordinate pair if both halves are present
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Seconds elapsed between two instants (negative if `to` precedes `from`)
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

/// A repaired sample sequence: monotonic distance, backfilled speed
///
/// Only [`crate::normalize::normalize`] produces one, so every downstream
/// analyzer can rely on the repaired invariants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedStream {
    samples: Vec<TelemetrySample>,
}

impl NormalizedStream {
    pub(crate) fn from_repaired(samples: Vec<TelemetrySample>) -> Self {
        NormalizedStream { samples }
    }

    pub fn samples(&self) -> &[TelemetrySample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Wall-clock duration from first to last sample
    pub fn duration_seconds(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => seconds_between(first.timestamp, last.timestamp),
            _ => 0.0,
        }
    }

    /// Cumulative distance at the final sample
    pub fn total_distance(&self) -> f64 {
        self.samples
            .last()
            .and_then(|s| s.distance)
            .unwrap_or(0.0)
    }

    pub fn into_samples(self) -> Vec<TelemetrySample> {
        self.samples
    }
}

/// Where a lap's boundaries came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LapSource {
    /// Reported by the recording device, trusted verbatim
    Device,
    /// Cut from the stream at distance multiples
    Synthesized,
}

/// Device-reported lap summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeLap {
    /// Lap distance in meters
    #[serde(alias = "distance")]
    pub total_distance: f64,

    /// Wall-clock lap time in seconds
    #[serde(alias = "elapsed_time")]
    pub total_elapsed_time: f64,

    /// Moving (timer) time in seconds
    #[serde(default, alias = "moving_time")]
    pub total_timer_time: Option<f64>,

    /// Average speed in meters per second
    #[serde(default, alias = "average_speed")]
    pub avg_speed: Option<f64>,

    #[serde(default, alias = "average_heartrate")]
    pub avg_heart_rate: Option<f64>,

    #[serde(default, alias = "average_watts")]
    pub avg_power: Option<f64>,

    #[serde(default, alias = "total_elevation_gain")]
    pub total_ascent: Option<f64>,

    #[serde(default)]
    pub total_descent: Option<f64>,
}

/// Per-lap statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lap {
    /// 1-based lap number
    pub index: u32,

    /// Lap distance in meters
    pub distance_meters: f64,

    /// Moving time in seconds (long pauses excluded)
    pub duration_seconds: f64,

    /// Wall-clock time in seconds
    pub elapsed_seconds: f64,

    /// Pace over moving time, seconds per kilometer
    pub avg_pace_sec_per_km: f64,

    pub avg_heart_rate: Option<f64>,

    pub avg_power: Option<f64>,

    /// Elevation gain in meters
    pub elevation_gain: f64,

    /// Elevation loss in meters (positive number)
    pub elevation_loss: f64,

    pub source: LapSource,
}

impl Lap {
    /// Pace as "m:ss" per kilometer
    pub fn pace_label(&self) -> String {
        crate::laps::format_pace(self.avg_pace_sec_per_km)
    }
}

/// Time spent in one heart rate zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneBucket {
    /// Zone number (1..=5)
    pub zone: u8,

    /// Display label ("Z1".."Z5")
    pub label: String,

    pub seconds_in_zone: f64,

    pub minutes_in_zone: f64,

    /// Share of valid heart rate samples, 0-100
    pub percent_of_total: f64,
}

/// Workout type derived from the zone distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationLabel {
    Hiit,
    FatiguedThreshold,
    Recovery,
    Endurance,
    Base,
}

impl ClassificationLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationLabel::Hiit => "HIIT",
            ClassificationLabel::FatiguedThreshold => "FATIGUED_THRESHOLD",
            ClassificationLabel::Recovery => "RECOVERY",
            ClassificationLabel::Endurance => "ENDURANCE",
            ClassificationLabel::Base => "BASE",
        }
    }
}

impl std::fmt::Display for ClassificationLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ascending heart rate zone floors (bpm) for zones 1 through 5
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[u16; 5]", into = "[u16; 5]")]
pub struct HrZoneFloors([u16; 5]);

impl HrZoneFloors {
    pub const DEFAULT: [u16; 5] = [100, 120, 140, 160, 180];

    /// Validate and wrap a floor array; floors must be strictly ascending
    pub fn new(floors: [u16; 5]) -> Result<Self> {
        if floors.windows(2).any(|w| w[1] <= w[0]) {
            return Err(AnalyticsError::Validation(format!(
                "heart rate zone floors must be strictly ascending, got {:?}",
                floors
            )));
        }
        Ok(HrZoneFloors(floors))
    }

    /// Floors at 50/60/70/80/90 % of maximum heart rate
    pub fn from_max_hr(max_hr: u16) -> Result<Self> {
        if !(100..=230).contains(&max_hr) {
            return Err(AnalyticsError::Validation(format!(
                "max heart rate must be between 100 and 230 bpm, got {}",
                max_hr
            )));
        }
        let max = u32::from(max_hr);
        let floor = |pct: u32| ((max * pct + 50) / 100) as u16;
        Self::new([floor(50), floor(60), floor(70), floor(80), floor(90)])
    }

    pub fn floors(&self) -> &[u16; 5] {
        &self.0
    }

    /// Floor of a zone, 1-based
    pub fn floor(&self, zone: usize) -> u16 {
        self.0[zone.clamp(1, 5) - 1]
    }
}

impl Default for HrZoneFloors {
    fn default() -> Self {
        HrZoneFloors(Self::DEFAULT)
    }
}

impl TryFrom<[u16; 5]> for HrZoneFloors {
    type Error = AnalyticsError;

    fn try_from(floors: [u16; 5]) -> Result<Self> {
        HrZoneFloors::new(floors)
    }
}

impl From<HrZoneFloors> for [u16; 5] {
    fn from(floors: HrZoneFloors) -> Self {
        floors.0
    }
}

/// Athlete data supplied by the profile source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AthleteProfile {
    /// Unique athlete identifier
    pub id: String,

    /// Maximum heart rate
    #[serde(default)]
    pub max_hr: Option<u16>,

    /// Explicit zone floors, if the athlete has configured them
    #[serde(default)]
    pub hr_zone_floors: Option<HrZoneFloors>,

    /// Functional Threshold Power in watts
    #[serde(default)]
    pub ftp: Option<f64>,
}

impl AthleteProfile {
    pub fn new(id: impl Into<String>) -> Self {
        AthleteProfile {
            id: id.into(),
            ..AthleteProfile::default()
        }
    }

    /// Zone floors to use: explicit floors, then max-HR-derived, then the fallback
    pub fn resolve_zone_floors(&self, fallback: HrZoneFloors) -> HrZoneFloors {
        if let Some(floors) = self.hr_zone_floors {
            return floors;
        }
        self.max_hr
            .and_then(|max_hr| HrZoneFloors::from_max_hr(max_hr).ok())
            .unwrap_or(fallback)
    }
}
