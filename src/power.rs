//! Power analysis
//!
//! Normalized Power, mechanical work, intensity factor and a smoothed power
//! series for charting. Missing power readings are treated as zero watts so a
//! stream without a power meter degrades to all-zero results instead of NaN.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::NormalizedStream;

/// Power analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    /// Trailing window (samples) for Normalized Power
    pub rolling_window: usize,

    /// Trailing window (samples) for the chart series
    pub smoothing_window: usize,

    /// Functional Threshold Power used for Intensity Factor
    pub ftp: Option<f64>,
}

impl Default for PowerConfig {
    fn default() -> Self {
        PowerConfig {
            rolling_window: 30,
            smoothing_window: 10,
            ftp: None,
        }
    }
}

/// Power-based metrics for one activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerAnalysis {
    /// 4th root of the mean 4th power of the 30-sample rolling average
    pub normalized_power: f64,

    /// Arithmetic mean of raw power (absent samples count as 0 W)
    pub average_power: f64,

    /// Mean power times duration, in kilojoules
    pub work_kj: f64,

    /// NP / FTP, when an FTP is known
    pub intensity_factor: Option<f64>,

    /// NP / average power, when average power is positive
    pub variability_index: Option<f64>,

    /// Chart-only 10-sample rolling average
    pub smoothed_series: Vec<f64>,
}

pub struct PowerAnalyzer {
    config: PowerConfig,
}

impl PowerAnalyzer {
    pub fn new() -> Self {
        PowerAnalyzer {
            config: PowerConfig::default(),
        }
    }

    pub fn with_config(config: PowerConfig) -> Self {
        PowerAnalyzer { config }
    }

    /// Override the FTP, keeping the other settings
    pub fn with_ftp(mut self, ftp: Option<f64>) -> Self {
        self.config.ftp = ftp;
        self
    }

    pub fn analyze(&self, stream: &NormalizedStream) -> PowerAnalysis {
        let watts: Vec<f64> = stream
            .samples()
            .iter()
            .map(|s| s.power.filter(|p| p.is_finite() && *p >= 0.0).unwrap_or(0.0))
            .collect();

        if watts.iter().all(|w| *w == 0.0) {
            debug!(samples = watts.len(), "No power data, returning zero power metrics");
        }

        let normalized_power = Self::normalized_power(&watts, self.config.rolling_window);
        let average_power = if watts.is_empty() {
            0.0
        } else {
            watts.iter().sum::<f64>() / watts.len() as f64
        };
        let work_kj = average_power * stream.duration_seconds().max(0.0) / 1000.0;

        let intensity_factor = self
            .config
            .ftp
            .filter(|ftp| ftp.is_finite() && *ftp > 0.0)
            .map(|ftp| normalized_power / ftp);

        let variability_index = if average_power > 0.0 {
            Some(normalized_power / average_power)
        } else {
            None
        };

        PowerAnalysis {
            normalized_power,
            average_power,
            work_kj,
            intensity_factor,
            variability_index,
            smoothed_series: Self::rolling_average(&watts, self.config.smoothing_window),
        }
    }

    /// Trailing average at every index; the window is `min(window, index + 1)`
    pub fn rolling_average(values: &[f64], window: usize) -> Vec<f64> {
        let window = window.max(1);
        let mut averages = Vec::with_capacity(values.len());
        let mut sum = 0.0;

        for (i, value) in values.iter().enumerate() {
            sum += value;
            if i >= window {
                sum -= values[i - window];
            }
            let count = (i + 1).min(window);
            averages.push(sum / count as f64);
        }

        averages
    }

    /// Normalized Power over a zero-filled power series
    pub fn normalized_power(watts: &[f64], window: usize) -> f64 {
        if watts.is_empty() {
            return 0.0;
        }

        let rolling = Self::rolling_average(watts, window);
        let mean_fourth = rolling.iter().map(|avg| avg.powi(4)).sum::<f64>() / rolling.len() as f64;

        // Two square roots keep exact results for exact fourth powers
        mean_fourth.sqrt().sqrt()
    }
}

impl Default for PowerAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Analyze power with default settings
pub fn analyze_power(stream: &NormalizedStream) -> PowerAnalysis {
    PowerAnalyzer::new().analyze(stream)
}
