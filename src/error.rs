//! Unified error hierarchy for the analytics engine
//!
//! Numeric degeneracy (missing sensors, too few samples) is never an error here:
//! those cases resolve to documented sentinel values inside each analyzer. The
//! variants below cover caller contract violations and failed history updates.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

/// Top-level error type for all engine operations
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Input arrived out of order (timestamps or PMC dates)
    #[error("Input ordering violation: {0}")]
    Ordering(#[from] OrderingError),

    /// A historical correction could not be applied
    #[error("History correction failed: {0}")]
    Correction(#[from] CorrectionError),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Caller ordering contract violations
#[derive(Debug, Error)]
pub enum OrderingError {
    /// A telemetry sample is older than its predecessor
    #[error("sample {index} at {current} precedes previous sample at {previous}")]
    UnsortedTimestamps {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    /// Prior PMC state skips or repeats a calendar day
    #[error("PMC history point {index} is dated {found}, expected {expected}")]
    NonContiguousHistory {
        index: usize,
        expected: NaiveDate,
        found: NaiveDate,
    },

    /// An append targets a day that is already behind the latest point
    #[error("cannot append {date}: history already runs to {last}")]
    DateInPast { date: NaiveDate, last: NaiveDate },
}

/// Failures while recomputing a PMC suffix
#[derive(Debug, Error)]
pub enum CorrectionError {
    /// Corrected day lies outside the stored history
    #[error("{date} is outside the stored history ({first} to {last})")]
    DateOutOfRange {
        date: NaiveDate,
        first: NaiveDate,
        last: NaiveDate,
    },

    /// There is no history to correct
    #[error("no PMC history to correct")]
    EmptyHistory,

    /// Calendar arithmetic ran past the representable range
    #[error("date arithmetic overflowed after {date}")]
    DateOverflow { date: NaiveDate },
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Failure category surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Unsorted timestamps or out-of-order PMC dates
    InputOrdering,
    /// Suffix recomputation rejected; prior state untouched
    CorrectionCascade,
    /// Malformed values supplied by the caller
    InvalidInput,
    /// Engine configuration is unusable
    Configuration,
    /// Filesystem failures (config, export)
    Io,
}

impl AnalyticsError {
    /// Map the error onto the caller-facing taxonomy
    pub fn category(&self) -> ErrorCategory {
        match self {
            AnalyticsError::Ordering(_) => ErrorCategory::InputOrdering,
            AnalyticsError::Correction(_) => ErrorCategory::CorrectionCascade,
            AnalyticsError::Validation(_) => ErrorCategory::InvalidInput,
            AnalyticsError::Configuration(_) => ErrorCategory::Configuration,
            AnalyticsError::Io(_) => ErrorCategory::Io,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AnalyticsError::Ordering(_) => ErrorSeverity::Error,
            AnalyticsError::Correction(CorrectionError::EmptyHistory) => ErrorSeverity::Warning,
            AnalyticsError::Correction(_) => ErrorSeverity::Error,
            AnalyticsError::Validation(_) => ErrorSeverity::Warning,
            AnalyticsError::Configuration(_) => ErrorSeverity::Critical,
            AnalyticsError::Io(_) => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            AnalyticsError::Ordering(OrderingError::UnsortedTimestamps { index, .. }) => {
                format!(
                    "Activity samples are not in time order (sample {}). Sort the recording before analysis.",
                    index
                )
            }
            AnalyticsError::Ordering(OrderingError::DateInPast { date, .. }) => {
                format!(
                    "Training load for {} is already recorded. Submit it as a correction instead.",
                    date
                )
            }
            AnalyticsError::Correction(CorrectionError::DateOutOfRange { date, .. }) => {
                format!("No training history exists for {}.", date)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical error requiring immediate attention
    Critical,
    /// Error that prevents the operation
    Error,
    /// Warning that doesn't prevent other operations
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}
