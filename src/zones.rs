//! Heart rate zone distribution and workout classification
//!
//! Classification is an ordered rule chain: the first rule that matches wins.
//! The order in [`CLASSIFICATION_RULES`] resolves overlapping conditions and is
//! part of the public contract.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{seconds_between, ClassificationLabel, HrZoneFloors, NormalizedStream, ZoneBucket};

pub const ZONE_COUNT: usize = 5;

/// Cutoffs used by the classification rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationThresholds {
    /// Zone 5 share above which a session is HIIT (percent)
    pub hiit_zone5_pct: f64,

    /// Readiness below which the athlete counts as fatigued (0-100)
    pub fatigued_readiness: u8,

    /// Zone 4 share that marks a fatigued threshold session (percent)
    pub fatigued_zone4_pct: f64,

    /// Zone 3 share that marks a fatigued threshold session (percent)
    pub fatigued_zone3_pct: f64,

    /// Recovery sessions are shorter than this (seconds)
    pub recovery_max_duration_s: f64,

    /// Recovery sessions keep zone 4 below this share (percent)
    pub recovery_max_zone4_pct: f64,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        ClassificationThresholds {
            hiit_zone5_pct: 15.0,
            fatigued_readiness: 50,
            fatigued_zone4_pct: 20.0,
            fatigued_zone3_pct: 40.0,
            recovery_max_duration_s: 3600.0,
            recovery_max_zone4_pct: 5.0,
        }
    }
}

/// Everything the rule chain looks at
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationInput {
    /// Percent of valid heart rate samples in zones 1..=5
    pub zone_percentages: [f64; ZONE_COUNT],

    /// `None` when no sample carried a valid heart rate
    pub mean_heart_rate: Option<f64>,

    pub duration_seconds: f64,

    /// External readiness score (0-100)
    pub readiness: Option<u8>,
}

impl ClassificationInput {
    fn zone_pct(&self, zone: usize) -> f64 {
        self.zone_percentages[zone - 1]
    }
}

/// One entry of the classification decision table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassificationRule {
    /// No sample with a valid heart rate
    ///
    /// Wider than an empty stream: samples that only carry GPS, speed or
    /// power still have nothing to classify on, so they label as BASE too.
    NoData,
    /// Zone 5 share above the HIIT cutoff
    HighIntensity,
    /// Low readiness with a heavy zone 3/4 share
    FatiguedThreshold,
    /// Short, easy session: mean HR under the zone 3 floor
    Recovery,
    /// Fallback for everything else
    Endurance,
}

/// Evaluation order; the first match decides the label
pub const CLASSIFICATION_RULES: [ClassificationRule; 5] = [
    ClassificationRule::NoData,
    ClassificationRule::HighIntensity,
    ClassificationRule::FatiguedThreshold,
    ClassificationRule::Recovery,
    ClassificationRule::Endurance,
];

impl ClassificationRule {
    pub fn label(&self) -> ClassificationLabel {
        match self {
            ClassificationRule::NoData => ClassificationLabel::Base,
            ClassificationRule::HighIntensity => ClassificationLabel::Hiit,
            ClassificationRule::FatiguedThreshold => ClassificationLabel::FatiguedThreshold,
            ClassificationRule::Recovery => ClassificationLabel::Recovery,
            ClassificationRule::Endurance => ClassificationLabel::Endurance,
        }
    }

    pub fn matches(
        &self,
        input: &ClassificationInput,
        floors: &HrZoneFloors,
        thresholds: &ClassificationThresholds,
    ) -> bool {
        match self {
            ClassificationRule::NoData => input.mean_heart_rate.is_none(),
            ClassificationRule::HighIntensity => input.zone_pct(5) > thresholds.hiit_zone5_pct,
            ClassificationRule::FatiguedThreshold => {
                let fatigued = input
                    .readiness
                    .map_or(false, |r| r < thresholds.fatigued_readiness);
                fatigued
                    && (input.zone_pct(4) > thresholds.fatigued_zone4_pct
                        || input.zone_pct(3) > thresholds.fatigued_zone3_pct)
            }
            ClassificationRule::Recovery => {
                input
                    .mean_heart_rate
                    .map_or(false, |hr| hr < f64::from(floors.floor(3)))
                    && input.duration_seconds < thresholds.recovery_max_duration_s
                    && input.zone_pct(4) < thresholds.recovery_max_zone4_pct
            }
            ClassificationRule::Endurance => true,
        }
    }
}

/// Zone histogram plus workout label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneAnalysis {
    pub buckets: Vec<ZoneBucket>,
    pub label: ClassificationLabel,
    pub rule: ClassificationRule,
    pub mean_heart_rate: Option<f64>,
    /// Samples that carried a valid heart rate
    pub valid_samples: usize,
}

impl ZoneAnalysis {
    pub fn zone_percentages(&self) -> [f64; ZONE_COUNT] {
        let mut pct = [0.0; ZONE_COUNT];
        for bucket in &self.buckets {
            pct[usize::from(bucket.zone) - 1] = bucket.percent_of_total;
        }
        pct
    }
}

pub struct ZoneClassifier {
    floors: HrZoneFloors,
    thresholds: ClassificationThresholds,
}

impl ZoneClassifier {
    pub fn new(floors: HrZoneFloors) -> Self {
        ZoneClassifier {
            floors,
            thresholds: ClassificationThresholds::default(),
        }
    }

    pub fn with_thresholds(floors: HrZoneFloors, thresholds: ClassificationThresholds) -> Self {
        ZoneClassifier { floors, thresholds }
    }

    /// Zone (1..=5) for a heart rate
    pub fn zone_for(&self, heart_rate: f64) -> usize {
        (2..=ZONE_COUNT)
            .find(|zone| heart_rate < f64::from(self.floors.floor(*zone)))
            .map_or(ZONE_COUNT, |zone| zone - 1)
    }

    pub fn classify(
        &self,
        stream: &NormalizedStream,
        duration_seconds: f64,
        readiness: Option<u8>,
    ) -> ZoneAnalysis {
        let readiness = match readiness {
            Some(score) if score > 100 => {
                warn!(score, "Readiness outside 0-100, ignoring");
                None
            }
            other => other,
        };

        let samples = stream.samples();
        let mut counts = [0usize; ZONE_COUNT];
        let mut seconds = [0.0f64; ZONE_COUNT];
        let mut hr_sum = 0.0;

        for (i, sample) in samples.iter().enumerate() {
            let Some(hr) = sample.valid_heart_rate() else {
                continue;
            };
            let zone = self.zone_for(hr);
            counts[zone - 1] += 1;
            hr_sum += hr;

            if let Some(next) = samples.get(i + 1) {
                seconds[zone - 1] += seconds_between(sample.timestamp, next.timestamp).max(0.0);
            }
        }

        let valid_samples: usize = counts.iter().sum();
        let mean_heart_rate = if valid_samples > 0 {
            Some(hr_sum / valid_samples as f64)
        } else {
            None
        };

        let buckets: Vec<ZoneBucket> = (0..ZONE_COUNT)
            .map(|i| ZoneBucket {
                zone: (i + 1) as u8,
                label: format!("Z{}", i + 1),
                seconds_in_zone: seconds[i],
                minutes_in_zone: seconds[i] / 60.0,
                percent_of_total: if valid_samples > 0 {
                    counts[i] as f64 * 100.0 / valid_samples as f64
                } else {
                    0.0
                },
            })
            .collect();

        let mut zone_percentages = [0.0; ZONE_COUNT];
        for (pct, bucket) in zone_percentages.iter_mut().zip(&buckets) {
            *pct = bucket.percent_of_total;
        }

        let input = ClassificationInput {
            zone_percentages,
            mean_heart_rate,
            duration_seconds,
            readiness,
        };
        let rule = self.matching_rule(&input);

        debug!(valid_samples, label = %rule.label(), ?rule, "Classified workout");

        ZoneAnalysis {
            buckets,
            label: rule.label(),
            rule,
            mean_heart_rate,
            valid_samples,
        }
    }

    /// First rule in [`CLASSIFICATION_RULES`] that matches
    pub fn matching_rule(&self, input: &ClassificationInput) -> ClassificationRule {
        CLASSIFICATION_RULES
            .iter()
            .copied()
            .find(|rule| rule.matches(input, &self.floors, &self.thresholds))
            .unwrap_or(ClassificationRule::Endurance)
    }

    pub fn label_for(&self, input: &ClassificationInput) -> ClassificationLabel {
        self.matching_rule(input).label()
    }
}

/// Zone distribution and label with default thresholds
pub fn classify_zones(
    stream: &NormalizedStream,
    floors: &HrZoneFloors,
    duration_seconds: f64,
    readiness: Option<u8>,
) -> ZoneAnalysis {
    ZoneClassifier::new(*floors).classify(stream, duration_seconds, readiness)
}
