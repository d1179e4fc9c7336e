//! Report export
//!
//! Only CSV is produced here; JSON output goes through serde directly.

use std::path::Path;
use thiserror::Error;

pub mod csv;

pub use self::csv::{write_laps, write_pmc_series, write_weekly};

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] ::csv::Error),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Guess the format from a file extension, defaulting to CSV
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()) {
            None => Ok(ExportFormat::Csv),
            Some(ext) if ext == "csv" => Ok(ExportFormat::Csv),
            Some(ext) if ext == "json" => Ok(ExportFormat::Json),
            Some(ext) => Err(ExportError::UnsupportedFormat(ext)),
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}
