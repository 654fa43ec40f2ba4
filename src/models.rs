//! Core data structures and types for trip record processing.
//!
//! Defines the batch month tag, the normalized trip record and its
//! calendar fields, the clean trip wrapper handed to aggregation, and
//! run-level processing statistics.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Tabular file formats understood by the reader and writer
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Parquet,
    Csv,
}

impl FileFormat {
    /// Detect format from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "parquet" => Some(FileFormat::Parquet),
            "csv" => Some(FileFormat::Csv),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Parquet => "parquet",
            FileFormat::Csv => "csv",
        }
    }
}

/// Nominal calendar month of a source batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchMonth {
    pub year: i32,
    pub month: u32,
}

impl BatchMonth {
    /// Returns `None` for months outside 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Inclusive lower bound of the month
    pub fn start(&self) -> NaiveDateTime {
        self.first_day().and_hms_opt(0, 0, 0).unwrap_or_default()
    }

    /// Exclusive upper bound of the month
    pub fn next_start(&self) -> NaiveDateTime {
        let next = self
            .first_day()
            .checked_add_months(Months::new(1))
            .unwrap_or(NaiveDate::MAX);
        next.and_hms_opt(0, 0, 0).unwrap_or_default()
    }

    pub fn contains(&self, timestamp: &NaiveDateTime) -> bool {
        *timestamp >= self.start() && *timestamp < self.next_start()
    }
}

impl fmt::Display for BatchMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A discovered monthly input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSource {
    pub path: PathBuf,
    pub prefix: String,
    pub month: BatchMonth,
    pub format: FileFormat,
}

impl BatchSource {
    /// `<prefix>_<YYYY>-<MM>` without extension
    pub fn stem(&self) -> String {
        format!("{}_{}", self.prefix, self.month)
    }
}

/// Calendar fields derived from the pickup timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarFields {
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub iso_year: i32,
    pub iso_week: u32,
    /// Monday of the ISO week
    pub week_start: NaiveDate,
    /// Monday = 0
    pub day_of_week: u32,
    pub hour: u32,
}

impl CalendarFields {
    pub fn from_timestamp(timestamp: &NaiveDateTime) -> Self {
        let date = timestamp.date();
        let iso = date.iso_week();
        let day_of_week = date.weekday().num_days_from_monday();
        Self {
            date,
            year: date.year(),
            month: date.month(),
            iso_year: iso.year(),
            iso_week: iso.week(),
            week_start: date - Duration::days(i64::from(day_of_week)),
            day_of_week,
            hour: timestamp.hour(),
        }
    }

    pub fn batch_month(&self) -> BatchMonth {
        BatchMonth {
            year: self.year,
            month: self.month,
        }
    }
}

/// A trip record after type coercion, derivation and imputation.
///
/// Numeric fields are `f64`; a missing value is NaN so that every range
/// comparison against it fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub vendor_id: f64,
    pub pickup: Option<NaiveDateTime>,
    pub dropoff: Option<NaiveDateTime>,
    pub passenger_count: f64,
    pub trip_distance: f64,
    pub ratecode_id: f64,
    pub store_and_fwd_flag: String,
    pub pu_location_id: f64,
    pub do_location_id: f64,
    pub payment_type: f64,
    pub fare_amount: f64,
    pub extra: f64,
    pub mta_tax: f64,
    pub tip_amount: f64,
    pub tolls_amount: f64,
    pub improvement_surcharge: f64,
    pub total_amount: f64,
    pub congestion_surcharge: f64,
    pub airport_fee: f64,
    /// Minutes between pickup and dropoff, NaN when either is missing
    pub trip_duration: f64,
    /// Miles per hour, 0 when the duration is not positive
    pub avg_speed: f64,
    pub calendar: Option<CalendarFields>,
}

impl TripRecord {
    /// Record with every field missing; used as a base by the normalizer
    pub fn empty() -> Self {
        Self {
            vendor_id: f64::NAN,
            pickup: None,
            dropoff: None,
            passenger_count: f64::NAN,
            trip_distance: f64::NAN,
            ratecode_id: f64::NAN,
            store_and_fwd_flag: String::new(),
            pu_location_id: f64::NAN,
            do_location_id: f64::NAN,
            payment_type: f64::NAN,
            fare_amount: f64::NAN,
            extra: f64::NAN,
            mta_tax: f64::NAN,
            tip_amount: f64::NAN,
            tolls_amount: f64::NAN,
            improvement_surcharge: f64::NAN,
            total_amount: f64::NAN,
            congestion_surcharge: f64::NAN,
            airport_fee: f64::NAN,
            trip_duration: f64::NAN,
            avg_speed: f64::NAN,
            calendar: None,
        }
    }

    /// Recompute `trip_duration`, `avg_speed` and calendar fields from the
    /// stored timestamps and distance.
    ///
    /// Idempotent. A speed that cannot be computed (missing distance) is
    /// replaced by `missing_speed`.
    pub fn recompute_derived(&mut self, missing_speed: f64) {
        self.trip_duration = match (self.pickup, self.dropoff) {
            (Some(pickup), Some(dropoff)) => (dropoff - pickup)
                .num_microseconds()
                .map(|us| us as f64 / 60_000_000.0)
                .unwrap_or(f64::NAN),
            _ => f64::NAN,
        };

        self.avg_speed = if self.trip_duration > 0.0 {
            self.trip_distance / (self.trip_duration / 60.0)
        } else {
            0.0
        };
        if !self.avg_speed.is_finite() {
            self.avg_speed = missing_speed;
        }

        self.calendar = self.pickup.as_ref().map(CalendarFields::from_timestamp);
    }

    /// The seven non-total charge components
    pub fn charges(&self) -> [f64; 7] {
        [
            self.fare_amount,
            self.extra,
            self.mta_tax,
            self.improvement_surcharge,
            self.tolls_amount,
            self.congestion_surcharge,
            self.airport_fee,
        ]
    }
}

/// A record that passed every quality rule and survived deduplication.
///
/// Construction guarantees a pickup timestamp, so calendar fields are
/// always available to aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanTrip {
    record: TripRecord,
    calendar: CalendarFields,
}

impl CleanTrip {
    /// Wrap a validated record; `None` if it carries no calendar fields
    pub fn from_valid(record: TripRecord) -> Option<Self> {
        let calendar = record.calendar?;
        Some(Self { record, calendar })
    }

    pub fn record(&self) -> &TripRecord {
        &self.record
    }

    pub fn calendar(&self) -> &CalendarFields {
        &self.calendar
    }
}

/// A batch that could not be processed, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Run-level processing statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub batches_discovered: usize,
    pub batches_processed: usize,
    pub batches_failed: usize,
    /// Batches with zero rows; no QA row is reported for them
    pub batches_skipped: usize,
    pub total_rows: usize,
    pub clean_rows: usize,
    pub output_dir: PathBuf,
    pub processing_time_ms: u128,
    pub failures: Vec<BatchFailure>,
}

impl ProcessingStats {
    /// Percentage of input rows kept after cleaning
    pub fn retention_rate(&self) -> f64 {
        if self.total_rows == 0 {
            0.0
        } else {
            (self.clean_rows as f64 / self.total_rows as f64) * 100.0
        }
    }

    pub fn has_output(&self) -> bool {
        self.batches_processed > 0
    }
}
