use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::efficiency::EfficiencyConfig;
use crate::error::AnalyticsError;
use crate::laps::LapConfig;
use crate::logging::LogConfig;
use crate::models::HrZoneFloors;
use crate::pmc::PmcConfig;
use crate::power::PowerConfig;
use crate::zones::ClassificationThresholds;

/// Engine configuration, one section per analyzer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lap segmentation
    pub laps: LapConfig,

    /// Normalized Power and smoothing
    pub power: PowerConfig,

    /// Efficiency factor and decoupling
    pub efficiency: EfficiencyConfig,

    /// Heart rate zones and workout classification
    pub zones: ZoneSettings,

    /// Performance Management Chart settings
    pub pmc: PmcConfig,

    pub logging: LogConfig,
}

/// Heart rate zone settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneSettings {
    /// Floors used when the athlete profile supplies neither floors nor max HR
    pub default_floors: HrZoneFloors,

    pub thresholds: ClassificationThresholds,
}

impl Default for ZoneSettings {
    fn default() -> Self {
        Self {
            default_floors: HrZoneFloors::default(),
            thresholds: ClassificationThresholds::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: EngineConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".stridemetrics")
            .join("config.toml")
    }

    /// Load the default file, falling back to built-in defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();
        if !config_path.exists() {
            debug!(path = %config_path.display(), "No config file, using defaults");
            return Self::default();
        }

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %config_path.display(), error = %err, "Ignoring unreadable config file");
                Self::default()
            }
        }
    }

    /// Reject settings that would make the analyzers degenerate
    pub fn validate(&self) -> crate::error::Result<()> {
        let invalid = |msg: &str| Err(AnalyticsError::Configuration(msg.to_string()));

        if !(self.laps.split_distance_m.is_finite() && self.laps.split_distance_m > 0.0) {
            return invalid("laps.split_distance_m must be positive");
        }
        if self.laps.max_pause_seconds < 0.0 || self.laps.elevation_noise_threshold_m < 0.0 {
            return invalid("laps thresholds must not be negative");
        }
        if self.power.rolling_window == 0 || self.power.smoothing_window == 0 {
            return invalid("power windows must be at least one sample");
        }
        if self.power.ftp.map_or(false, |ftp| !(ftp > 0.0)) {
            return invalid("power.ftp must be positive when set");
        }
        if self.pmc.ctl_time_constant == 0 || self.pmc.atl_time_constant == 0 {
            return invalid("pmc time constants must be at least one day");
        }
        if self.pmc.acute_window_days == 0 || self.pmc.chronic_window_days < self.pmc.acute_window_days {
            return invalid("pmc.chronic_window_days must be at least pmc.acute_window_days");
        }
        if self.pmc.overreaching_threshold >= self.pmc.fresh_threshold {
            return invalid("pmc.overreaching_threshold must be below pmc.fresh_threshold");
        }
        Ok(())
    }
}
