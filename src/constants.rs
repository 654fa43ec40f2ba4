//! Application constants for the trip KPI processor
//!
//! Column names of the TLC trip record schema, file naming conventions,
//! and the default thresholds and imputation values used by the cleaning
//! stage.

// =============================================================================
// File Naming and Layout
// =============================================================================

/// Default file prefix for monthly trip record batches
pub const DEFAULT_FILE_PREFIX: &str = "yellow_tripdata";

/// Prefix prepended to cleaned batch file names
pub const CLEAN_FILE_PREFIX: &str = "clean_";

/// Prefix of KPI table file names (`kpi_<table>_<year>`)
pub const KPI_FILE_PREFIX: &str = "kpi_";

/// File stem of the QA summary report
pub const QA_SUMMARY_FILE_STEM: &str = "qa_summary";

/// Sub-directory for cleaned batches and KPI tables
pub const PROCESSED_DIR_NAME: &str = "processed";

/// Sub-directory for the QA summary report
pub const REPORTS_DIR_NAME: &str = "reports";

/// Application directory used under the user data dir when no input is given
pub const APP_DATA_DIR_NAME: &str = "trip-kpi";

/// Batch file name pattern: `<prefix>_<year>-<month>.<ext>`
pub const BATCH_FILE_REGEX: &str = r"^(?P<prefix>.+)_(?P<year>\d{4})-(?P<month>\d{2})\.(?P<ext>[A-Za-z]+)$";

// =============================================================================
// Trip Record Columns
// =============================================================================

pub mod columns {
    pub const VENDOR_ID: &str = "VendorID";
    pub const PICKUP_DATETIME: &str = "tpep_pickup_datetime";
    pub const DROPOFF_DATETIME: &str = "tpep_dropoff_datetime";
    pub const PASSENGER_COUNT: &str = "passenger_count";
    pub const TRIP_DISTANCE: &str = "trip_distance";
    pub const RATECODE_ID: &str = "RatecodeID";
    pub const STORE_AND_FWD_FLAG: &str = "store_and_fwd_flag";
    pub const PU_LOCATION_ID: &str = "PULocationID";
    pub const DO_LOCATION_ID: &str = "DOLocationID";
    pub const PAYMENT_TYPE: &str = "payment_type";
    pub const FARE_AMOUNT: &str = "fare_amount";
    pub const EXTRA: &str = "extra";
    pub const MTA_TAX: &str = "mta_tax";
    pub const TIP_AMOUNT: &str = "tip_amount";
    pub const TOLLS_AMOUNT: &str = "tolls_amount";
    pub const IMPROVEMENT_SURCHARGE: &str = "improvement_surcharge";
    pub const TOTAL_AMOUNT: &str = "total_amount";
    pub const CONGESTION_SURCHARGE: &str = "congestion_surcharge";
    pub const AIRPORT_FEE: &str = "airport_fee";

    /// Capitalised spelling used by newer TLC releases
    pub const AIRPORT_FEE_ALIAS: &str = "Airport_fee";

    /// Derived during normalization
    pub const TRIP_DURATION: &str = "trip_duration";
    pub const AVG_SPEED: &str = "avg_speed";

    /// Columns whose absence makes a batch unusable
    pub const REQUIRED: &[&str] = &[PICKUP_DATETIME, DROPOFF_DATETIME, TRIP_DISTANCE];
}

// =============================================================================
// Quality Rule Defaults
// =============================================================================

pub mod quality {
    /// Trips at or above this many minutes are rejected
    pub const MAX_TRIP_DURATION_MINUTES: f64 = 600.0;

    /// Average speed ceiling in miles per hour
    pub const MAX_AVG_SPEED_MPH: f64 = 70.0;

    /// Upper (exclusive) bound on the total charged amount
    pub const MAX_TOTAL_AMOUNT: f64 = 1000.0;

    pub const MIN_PAYMENT_TYPE: f64 = 0.0;
    pub const MAX_PAYMENT_TYPE: f64 = 6.0;

    /// Highest pickup zone; zones above are outside the city
    pub const MAX_PICKUP_LOCATION_ID: f64 = 263.0;
    pub const MAX_DROPOFF_LOCATION_ID: f64 = 265.0;

    pub const MAX_RATECODE_ID: f64 = 6.0;

    pub const VENDOR_ALLOW_LIST: &[f64] = &[1.0, 2.0, 6.0, 7.0];

    pub const MIN_PASSENGER_COUNT: f64 = 0.0;
    pub const MAX_PASSENGER_COUNT: f64 = 9.0;
}

// =============================================================================
// Imputation Defaults
// =============================================================================

pub mod imputation {
    pub const PASSENGER_COUNT: f64 = 1.0;
    pub const RATECODE_ID: f64 = 1.0;
    pub const STORE_AND_FWD_FLAG: &str = "N";
    pub const CONGESTION_SURCHARGE: f64 = 0.0;
    pub const AIRPORT_FEE: f64 = 0.0;
    pub const AVG_SPEED: f64 = 0.0;
}

// =============================================================================
// Report Formatting
// =============================================================================

/// Decimal places kept for QA percentages
pub const QA_PERCENT_DECIMALS: i32 = 2;

/// Memory usage ratio above which batch concurrency is halved
pub const DEFAULT_MEMORY_THRESHOLD: f64 = 0.8;
