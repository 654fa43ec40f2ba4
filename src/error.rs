//! Error handling for trip batch processing.
//!
//! Distinguishes run-level failures (nothing to process, bad configuration)
//! from batch-level failures (unreadable file, missing required column),
//! which the pipeline logs and skips.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TripError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Input directory not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("No input batches found in {path} matching '{pattern}'")]
    NoInputBatches { path: PathBuf, pattern: String },

    #[error("File name does not follow <prefix>_<year>-<month>.<ext>: {path}")]
    InvalidBatchName { path: PathBuf },

    #[error("Unsupported file format for {path} (expected .parquet or .csv)")]
    UnsupportedFormat { path: PathBuf },

    #[error("Required column '{column}' missing in batch {path}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Processing failed for batch {path} - {reason}")]
    ProcessingFailed { path: PathBuf, reason: String },

    #[error("Processing interrupted: {reason}")]
    ProcessingInterrupted { reason: String },
}

impl TripError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn processing_interrupted(reason: impl Into<String>) -> Self {
        Self::ProcessingInterrupted {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TripError>;
