//! Aerobic efficiency and cardiac decoupling

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{NormalizedStream, TelemetrySample};

/// Efficiency analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EfficiencyConfig {
    /// Streams shorter than this report zero decoupling
    pub min_decoupling_samples: usize,

    /// Samples at or below this speed are excluded from half-session EF (m/s)
    pub min_moving_speed_mps: f64,

    /// Decoupling below this percentage indicates good aerobic control
    pub good_decoupling_pct: f64,
}

impl Default for EfficiencyConfig {
    fn default() -> Self {
        EfficiencyConfig {
            min_decoupling_samples: 120,
            min_moving_speed_mps: 0.1,
            good_decoupling_pct: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyAnalysis {
    /// (mean speed m/s x 60) / mean heart rate
    pub efficiency_factor: f64,

    /// Percent drop in EF from the first half to the second half
    pub decoupling_pct: f64,

    pub first_half_ef: Option<f64>,

    pub second_half_ef: Option<f64>,

    /// Threshold the decoupling was judged against
    pub good_decoupling_pct: f64,
}

impl EfficiencyAnalysis {
    pub fn has_good_aerobic_control(&self) -> bool {
        self.decoupling_pct < self.good_decoupling_pct
    }
}

pub struct EfficiencyAnalyzer {
    config: EfficiencyConfig,
}

impl EfficiencyAnalyzer {
    pub fn new() -> Self {
        EfficiencyAnalyzer {
            config: EfficiencyConfig::default(),
        }
    }

    pub fn with_config(config: EfficiencyConfig) -> Self {
        EfficiencyAnalyzer { config }
    }

    pub fn analyze(&self, stream: &NormalizedStream) -> EfficiencyAnalysis {
        let samples = stream.samples();
        let efficiency_factor = efficiency_factor(
            samples
                .iter()
                .filter_map(|s| Some((s.valid_speed()?, s.valid_heart_rate()?))),
        )
        .unwrap_or(0.0);

        if samples.len() < self.config.min_decoupling_samples {
            debug!(
                samples = samples.len(),
                required = self.config.min_decoupling_samples,
                "Too few samples for decoupling"
            );
            return EfficiencyAnalysis {
                efficiency_factor,
                decoupling_pct: 0.0,
                first_half_ef: None,
                second_half_ef: None,
                good_decoupling_pct: self.config.good_decoupling_pct,
            };
        }

        let (first, second) = samples.split_at(samples.len() / 2);
        let first_half_ef = self.half_efficiency(first);
        let second_half_ef = self.half_efficiency(second);

        let decoupling_pct = match (first_half_ef, second_half_ef) {
            (Some(ef1), Some(ef2)) if ef1 > 0.0 => (ef1 - ef2) / ef1 * 100.0,
            _ => 0.0,
        };

        EfficiencyAnalysis {
            efficiency_factor,
            decoupling_pct,
            first_half_ef,
            second_half_ef,
            good_decoupling_pct: self.config.good_decoupling_pct,
        }
    }

    fn half_efficiency(&self, half: &[TelemetrySample]) -> Option<f64> {
        efficiency_factor(half.iter().filter_map(|s| {
            let speed = s.valid_speed().filter(|v| *v > self.config.min_moving_speed_mps)?;
            Some((speed, s.valid_heart_rate()?))
        }))
    }
}

impl Default for EfficiencyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Analyze efficiency with default settings
pub fn analyze_efficiency(stream: &NormalizedStream) -> EfficiencyAnalysis {
    EfficiencyAnalyzer::new().analyze(stream)
}

/// EF over (speed, heart rate) pairs; `None` when there are no pairs
fn efficiency_factor(pairs: impl Iterator<Item = (f64, f64)>) -> Option<f64> {
    let (speed_sum, hr_sum, count) = pairs.fold((0.0, 0.0, 0usize), |(s, h, n), (speed, hr)| {
        (s + speed, h + hr, n + 1)
    });

    if count == 0 {
        return None;
    }

    let mean_hr = hr_sum / count as f64;
    if mean_hr <= 0.0 {
        return Some(0.0);
    }
    Some(speed_sum / count as f64 * 60.0 / mean_hr)
}
