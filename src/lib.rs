// Library interface for the stridemetrics engine
// The CLI and integration tests both go through these modules

pub mod analysis;
pub mod config;
pub mod efficiency;
pub mod error;
pub mod export;
pub mod laps;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod pmc;
pub mod power;
pub mod zones;

// Re-export commonly used types for convenience
pub use analysis::{ActivityAnalyzer, ActivityInput, ActivityReport, BatchSummary};
pub use config::EngineConfig;
pub use efficiency::{analyze_efficiency, EfficiencyAnalysis, EfficiencyAnalyzer};
pub use error::{AnalyticsError, CorrectionError, ErrorCategory, OrderingError, Result};
pub use laps::{format_pace, segment_laps, LapSegmenter};
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
pub use models::*;
pub use normalize::{haversine_distance, normalize};
pub use pmc::{
    advance_training_load, aggregate_weekly, FormStatus, PmcHistory, PmcPoint, TrainingLoadEngine,
    WeeklyAggregate,
};
pub use power::{analyze_power, PowerAnalysis, PowerAnalyzer};
pub use zones::{classify_zones, ZoneAnalysis, ZoneClassifier, CLASSIFICATION_RULES};
