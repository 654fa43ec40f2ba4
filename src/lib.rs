//! Trip KPI Processor Library
//!
//! Cleans monthly taxi trip record batches, reports per-rule data quality,
//! and aggregates the clean trips into yearly KPI tables.
//!
//! This library provides tools for:
//! - Discovering `<prefix>_<YYYY>-<MM>` batches in parquet or csv
//! - Normalizing records with derived duration, speed and calendar fields
//! - Evaluating thirteen row-level quality rules and deduplicating
//! - Aggregating daily, weekly, monthly, hourly and per-dimension KPIs
//! - Merging per-batch aggregates into share-of-year tables

pub mod aggregation;
pub mod cleaning;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod processor;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{Result, TripError};
pub use processor::{PipelineRun, TripPipeline};
