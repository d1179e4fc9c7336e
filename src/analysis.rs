//! Per-activity pipeline
//!
//! Normalizes a telemetry stream once and runs the lap, power, efficiency and
//! zone analyzers over it. Activities share no state, so batches are analyzed
//! in parallel with rayon.

use rayon::prelude::*;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::config::EngineConfig;
use crate::efficiency::{EfficiencyAnalysis, EfficiencyAnalyzer};
use crate::error::{AnalyticsError, Result};
use crate::laps::LapSegmenter;
use crate::models::{AthleteProfile, Lap, NativeLap, TelemetrySample};
use crate::normalize::{normalize_with_stats, RepairStats};
use crate::power::{PowerAnalysis, PowerAnalyzer};
use crate::zones::{ZoneAnalysis, ZoneClassifier};

/// One completed activity as delivered by the telemetry source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityInput {
    pub activity_id: String,

    /// Samples in ascending timestamp order
    pub samples: Vec<TelemetrySample>,

    /// Device-reported laps, if the recording has them
    #[serde(default)]
    pub native_laps: Option<Vec<NativeLap>>,

    /// Readiness score (0-100) for the activity's day
    #[serde(default)]
    pub readiness: Option<u8>,

    /// Training Stress Score, when already known
    #[serde(default)]
    pub tss: Option<Decimal>,
}

impl ActivityInput {
    pub fn new(activity_id: impl Into<String>, samples: Vec<TelemetrySample>) -> Self {
        Self {
            activity_id: activity_id.into(),
            samples,
            native_laps: None,
            readiness: None,
            tss: None,
        }
    }
}

/// Everything derived from one activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityReport {
    pub activity_id: String,
    pub sample_count: usize,
    pub duration_seconds: f64,
    pub total_distance_m: f64,
    pub repairs: RepairStats,
    pub laps: Vec<Lap>,
    pub power: PowerAnalysis,
    pub efficiency: EfficiencyAnalysis,
    pub zones: ZoneAnalysis,

    /// Supplied TSS, or a power-based estimate when FTP is known
    pub tss: Option<Decimal>,
}

/// Outcome of analyzing several activities
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Reports in input order, skipping failures
    pub reports: Vec<ActivityReport>,
    pub failures: Vec<(String, AnalyticsError)>,
}

impl BatchSummary {
    pub fn is_fully_successful(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct ActivityAnalyzer {
    config: EngineConfig,
}

impl ActivityAnalyzer {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the full pipeline for one activity
    pub fn analyze(&self, input: &ActivityInput, profile: &AthleteProfile) -> Result<ActivityReport> {
        let span = info_span!("analyze_activity", activity_id = %input.activity_id, athlete = %profile.id);
        let _guard = span.enter();

        let (stream, repairs) = normalize_with_stats(&input.samples)?;
        let duration_seconds = stream.duration_seconds();

        let laps = LapSegmenter::with_config(self.config.laps.clone())
            .segment(&stream, input.native_laps.as_deref());

        let ftp = profile.ftp.or(self.config.power.ftp);
        let power = PowerAnalyzer::with_config(self.config.power.clone())
            .with_ftp(ftp)
            .analyze(&stream);

        let efficiency = EfficiencyAnalyzer::with_config(self.config.efficiency.clone()).analyze(&stream);

        let floors = profile.resolve_zone_floors(self.config.zones.default_floors);
        let zones = ZoneClassifier::with_thresholds(floors, self.config.zones.thresholds.clone())
            .classify(&stream, duration_seconds, input.readiness);

        let tss = match input.tss {
            Some(tss) if tss < Decimal::ZERO => {
                warn!(%tss, "Ignoring negative TSS");
                None
            }
            Some(tss) => Some(tss),
            None => estimate_power_tss(&power, duration_seconds),
        };

        info!(
            samples = stream.len(),
            laps = laps.len(),
            label = %zones.label,
            normalized_power = power.normalized_power,
            "Activity analyzed"
        );

        Ok(ActivityReport {
            activity_id: input.activity_id.clone(),
            sample_count: stream.len(),
            duration_seconds,
            total_distance_m: stream.total_distance(),
            repairs,
            laps,
            power,
            efficiency,
            zones,
            tss,
        })
    }

    /// Analyze independent activities in parallel
    pub fn analyze_batch(&self, inputs: &[ActivityInput], profile: &AthleteProfile) -> BatchSummary {
        info!(activities = inputs.len(), "Starting batch analysis");

        let outcomes: Vec<(String, Result<ActivityReport>)> = inputs
            .par_iter()
            .map(|input| (input.activity_id.clone(), self.analyze(input, profile)))
            .collect();

        let mut summary = BatchSummary::default();
        for (activity_id, outcome) in outcomes {
            match outcome {
                Ok(report) => summary.reports.push(report),
                Err(err) => {
                    warn!(%activity_id, error = %err, "Activity analysis failed");
                    summary.failures.push((activity_id, err));
                }
            }
        }

        debug!(
            succeeded = summary.reports.len(),
            failed = summary.failures.len(),
            "Batch analysis complete"
        );
        summary
    }
}

impl Default for ActivityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// TSS = duration_hours x IF^2 x 100, when an intensity factor is available
fn estimate_power_tss(power: &PowerAnalysis, duration_seconds: f64) -> Option<Decimal> {
    let intensity_factor = power.intensity_factor.filter(|f| *f > 0.0)?;
    let duration_hours = duration_seconds.max(0.0) / 3600.0;
    let tss = duration_hours * intensity_factor * intensity_factor * 100.0;
    Decimal::from_f64(tss).map(|tss| tss.round_dp(1))
}
