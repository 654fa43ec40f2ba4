//! Configuration management and validation.
//!
//! Provides the pipeline configuration: batch discovery settings, quality
//! rule thresholds, imputation defaults, the KPI table list and output
//! formats.

use crate::aggregation::granularity::{KpiTable, KpiTableSpec};
use crate::constants::{self, imputation, quality};
use crate::error::{Result, TripError};
use crate::models::FileFormat;
use polars::prelude::ParquetCompression;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Supported compression algorithms for parquet output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum CompressionAlgorithm {
    /// Snappy compression - good balance of speed and compression
    Snappy,
    /// ZSTD compression - better compression ratio, slower
    Zstd,
    /// LZ4 compression - fastest, lower compression ratio
    Lz4,
    /// No compression
    Uncompressed,
}

impl CompressionAlgorithm {
    /// Convert to polars ParquetCompression type
    pub fn to_polars_compression(&self) -> ParquetCompression {
        match self {
            CompressionAlgorithm::Snappy => ParquetCompression::Snappy,
            CompressionAlgorithm::Zstd => ParquetCompression::Zstd(None),
            CompressionAlgorithm::Lz4 => ParquetCompression::Lz4Raw,
            CompressionAlgorithm::Uncompressed => ParquetCompression::Uncompressed,
        }
    }
}

/// System profiling information used to size batch concurrency
#[derive(Debug, Clone)]
pub struct SystemProfile {
    /// Number of CPU cores available
    pub cpu_cores: usize,
    /// Performance cores (for systems with efficiency cores)
    pub performance_cores: usize,
    /// Available memory in MB
    pub memory_mb: usize,
}

impl SystemProfile {
    /// Auto-detect system capabilities
    pub fn detect() -> Self {
        use sysinfo::System;

        let mut system = System::new();
        system.refresh_memory();

        Self {
            cpu_cores: num_cpus::get(),
            performance_cores: num_cpus::get_physical(),
            memory_mb: (system.total_memory() / 1024 / 1024) as usize,
        }
    }

    /// Concurrent batches the machine can hold.
    ///
    /// A decoded month of trips is a few GB, so memory caps the result
    /// before cores do.
    pub fn recommended_batch_concurrency(&self) -> usize {
        const MB_PER_BATCH: usize = 4096;
        let by_memory = (self.memory_mb / MB_PER_BATCH).max(1);
        self.performance_cores.max(1).min(by_memory)
    }
}

/// Thresholds for the row-level quality rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Exclusive upper bound on trip duration, minutes
    pub max_trip_duration_minutes: f64,
    /// Inclusive upper bound on average speed, mph
    pub max_avg_speed_mph: f64,
    /// Exclusive upper bound on total amount
    pub max_total_amount: f64,
    pub payment_type_range: (f64, f64),
    /// Inclusive upper bound on pickup zone id (lower bound is exclusive 0)
    pub max_pickup_location_id: f64,
    pub max_dropoff_location_id: f64,
    pub max_ratecode_id: f64,
    pub vendor_allow_list: Vec<f64>,
    pub passenger_count_range: (f64, f64),
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            max_trip_duration_minutes: quality::MAX_TRIP_DURATION_MINUTES,
            max_avg_speed_mph: quality::MAX_AVG_SPEED_MPH,
            max_total_amount: quality::MAX_TOTAL_AMOUNT,
            payment_type_range: (quality::MIN_PAYMENT_TYPE, quality::MAX_PAYMENT_TYPE),
            max_pickup_location_id: quality::MAX_PICKUP_LOCATION_ID,
            max_dropoff_location_id: quality::MAX_DROPOFF_LOCATION_ID,
            max_ratecode_id: quality::MAX_RATECODE_ID,
            vendor_allow_list: quality::VENDOR_ALLOW_LIST.to_vec(),
            passenger_count_range: (quality::MIN_PASSENGER_COUNT, quality::MAX_PASSENGER_COUNT),
        }
    }
}

/// Fill values for fields that are commonly missing in source batches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationDefaults {
    pub passenger_count: f64,
    pub ratecode_id: f64,
    pub store_and_fwd_flag: String,
    pub congestion_surcharge: f64,
    pub airport_fee: f64,
    pub avg_speed: f64,
}

impl Default for ImputationDefaults {
    fn default() -> Self {
        Self {
            passenger_count: imputation::PASSENGER_COUNT,
            ratecode_id: imputation::RATECODE_ID,
            store_and_fwd_flag: imputation::STORE_AND_FWD_FLAG.to_string(),
            congestion_surcharge: imputation::CONGESTION_SURCHARGE,
            airport_fee: imputation::AIRPORT_FEE,
            avg_speed: imputation::AVG_SPEED,
        }
    }
}

/// Global configuration for a processing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// File prefix of input batches (`<prefix>_<year>-<month>.<ext>`)
    pub file_prefix: String,

    /// Year to process; inferred from the discovered batches when unset
    pub year: Option<i32>,

    /// Batches processed concurrently; 1 keeps execution sequential
    pub max_concurrent_batches: usize,

    /// Memory usage ratio above which concurrency is halved
    pub memory_threshold: f64,

    /// Format of cleaned batch files
    pub clean_format: FileFormat,

    /// Format of KPI tables and the QA summary
    pub table_format: FileFormat,

    /// Parquet compression for any parquet output
    pub compression: CompressionAlgorithm,

    /// Show progress bars while processing batches
    pub show_progress: bool,

    /// List batches and exit without processing
    pub discovery_only: bool,

    /// Quality rule thresholds
    pub quality: QualityThresholds,

    /// Imputation defaults applied during normalization
    pub imputation: ImputationDefaults,

    /// KPI tables to compute, in output order
    pub kpi_tables: Vec<KpiTableSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            file_prefix: constants::DEFAULT_FILE_PREFIX.to_string(),
            year: None,
            max_concurrent_batches: 1,
            memory_threshold: constants::DEFAULT_MEMORY_THRESHOLD,
            clean_format: FileFormat::Parquet,
            table_format: FileFormat::Csv,
            compression: CompressionAlgorithm::Snappy,
            show_progress: true,
            discovery_only: false,
            quality: QualityThresholds::default(),
            imputation: ImputationDefaults::default(),
            kpi_tables: KpiTableSpec::defaults(),
        }
    }
}

impl PipelineConfig {
    /// Set the input file prefix
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    /// Restrict processing to one year
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Set concurrent batch count; 0 selects a value from the system profile
    pub fn with_max_concurrent_batches(mut self, batches: usize) -> Self {
        self.max_concurrent_batches = if batches == 0 {
            let profile = SystemProfile::detect();
            let recommended = profile.recommended_batch_concurrency();
            debug!(
                "Auto-selected {} concurrent batches ({} cores, {}MB memory)",
                recommended, profile.performance_cores, profile.memory_mb
            );
            recommended
        } else {
            batches
        };
        self
    }

    pub fn with_clean_format(mut self, format: FileFormat) -> Self {
        self.clean_format = format;
        self
    }

    pub fn with_table_format(mut self, format: FileFormat) -> Self {
        self.table_format = format;
        self
    }

    pub fn with_compression(mut self, compression: CompressionAlgorithm) -> Self {
        self.compression = compression;
        self
    }

    /// Disable progress bars (tests, quiet mode)
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Enable discovery only mode
    pub fn with_discovery_only(mut self) -> Self {
        self.discovery_only = true;
        self
    }

    pub fn with_quality(mut self, quality: QualityThresholds) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_kpi_tables(mut self, tables: Vec<KpiTableSpec>) -> Self {
        self.kpi_tables = tables;
        self
    }

    /// Check settings that would otherwise fail late in a run
    pub fn validate(&self) -> Result<()> {
        if self.file_prefix.trim().is_empty() {
            return Err(TripError::configuration("file prefix must not be empty"));
        }
        if self.max_concurrent_batches == 0 {
            return Err(TripError::configuration(
                "max_concurrent_batches must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.memory_threshold) {
            return Err(TripError::configuration(format!(
                "memory_threshold must be within [0, 1], got {}",
                self.memory_threshold
            )));
        }
        if !self
            .kpi_tables
            .iter()
            .any(|spec| spec.table == KpiTable::Monthly)
        {
            return Err(TripError::configuration(
                "the monthly KPI table is required: it provides the share-of-year denominators",
            ));
        }
        for (i, spec) in self.kpi_tables.iter().enumerate() {
            if self.kpi_tables[..i].iter().any(|s| s.table == spec.table) {
                return Err(TripError::configuration(format!(
                    "KPI table '{}' configured more than once",
                    spec.table.name()
                )));
            }
        }

        let q = &self.quality;
        if q.payment_type_range.0 > q.payment_type_range.1
            || q.passenger_count_range.0 > q.passenger_count_range.1
        {
            return Err(TripError::configuration(
                "quality ranges must have lower bound <= upper bound",
            ));
        }
        if q.vendor_allow_list.is_empty() {
            return Err(TripError::configuration(
                "vendor allow-list must not be empty",
            ));
        }
        Ok(())
    }
}
