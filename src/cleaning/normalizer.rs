//! Conversion of a raw trip batch into normalized records.
//!
//! Numeric columns are coerced to `f64` (unparseable or missing values
//! become NaN), timestamps are parsed, derived fields are computed and the
//! commonly missing fields are imputed.

use crate::config::ImputationDefaults;
use crate::constants::columns;
use crate::error::{Result, TripError};
use crate::models::{BatchSource, TripRecord};
use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use tracing::debug;

/// Accepted string layouts for timestamp columns
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse a timestamp string in any of the accepted layouts
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// Turns raw batch frames into `TripRecord`s
#[derive(Debug, Clone, Default)]
pub struct RecordNormalizer {
    defaults: ImputationDefaults,
}

impl RecordNormalizer {
    pub fn new(defaults: ImputationDefaults) -> Self {
        Self { defaults }
    }

    /// Normalize every row of `df`.
    ///
    /// Fails only when a required column is absent; any other malformed
    /// value surfaces as a missing field.
    pub fn normalize_frame(&self, df: &DataFrame, batch: &BatchSource) -> Result<Vec<TripRecord>> {
        for &required in columns::REQUIRED {
            if df.column(required).is_err() {
                return Err(TripError::MissingColumn {
                    path: batch.path.clone(),
                    column: required.to_string(),
                });
            }
        }

        let height = df.height();
        let pickups = timestamp_column(df, columns::PICKUP_DATETIME, batch)?;
        let dropoffs = timestamp_column(df, columns::DROPOFF_DATETIME, batch)?;

        let number = |name: &str| -> Result<Vec<f64>> {
            Ok(float_column(df, name)?.unwrap_or_else(|| vec![f64::NAN; height]))
        };
        let vendor = number(columns::VENDOR_ID)?;
        let passengers = number(columns::PASSENGER_COUNT)?;
        let distance = number(columns::TRIP_DISTANCE)?;
        let ratecode = number(columns::RATECODE_ID)?;
        let pu = number(columns::PU_LOCATION_ID)?;
        let dol = number(columns::DO_LOCATION_ID)?;
        let payment = number(columns::PAYMENT_TYPE)?;
        let fare = number(columns::FARE_AMOUNT)?;
        let extra = number(columns::EXTRA)?;
        let mta = number(columns::MTA_TAX)?;
        let tip = number(columns::TIP_AMOUNT)?;
        let tolls = number(columns::TOLLS_AMOUNT)?;
        let improvement = number(columns::IMPROVEMENT_SURCHARGE)?;
        let total = number(columns::TOTAL_AMOUNT)?;
        let congestion = number(columns::CONGESTION_SURCHARGE)?;
        let airport = match float_column(df, columns::AIRPORT_FEE)? {
            Some(values) => values,
            None => number(columns::AIRPORT_FEE_ALIAS)?,
        };
        let flags = string_column(df, columns::STORE_AND_FWD_FLAG)?;

        let mut records = Vec::with_capacity(height);
        for i in 0..height {
            let mut record = TripRecord {
                vendor_id: vendor[i],
                pickup: pickups[i],
                dropoff: dropoffs[i],
                passenger_count: passengers[i],
                trip_distance: distance[i],
                ratecode_id: ratecode[i],
                store_and_fwd_flag: flags
                    .as_ref()
                    .and_then(|f| f[i].clone())
                    .unwrap_or_default(),
                pu_location_id: pu[i],
                do_location_id: dol[i],
                payment_type: payment[i],
                fare_amount: fare[i],
                extra: extra[i],
                mta_tax: mta[i],
                tip_amount: tip[i],
                tolls_amount: tolls[i],
                improvement_surcharge: improvement[i],
                total_amount: total[i],
                congestion_surcharge: congestion[i],
                airport_fee: airport[i],
                ..TripRecord::empty()
            };
            self.impute(&mut record);
            record.recompute_derived(self.defaults.avg_speed);
            records.push(record);
        }

        debug!("Normalized {} rows from {}", records.len(), batch.path.display());
        Ok(records)
    }

    /// Fill missing values with the configured defaults
    pub fn impute(&self, record: &mut TripRecord) {
        let d = &self.defaults;
        fill(&mut record.passenger_count, d.passenger_count);
        fill(&mut record.ratecode_id, d.ratecode_id);
        fill(&mut record.congestion_surcharge, d.congestion_surcharge);
        fill(&mut record.airport_fee, d.airport_fee);
        if record.store_and_fwd_flag.is_empty() {
            record.store_and_fwd_flag = d.store_and_fwd_flag.clone();
        }
    }

    /// Recompute derived fields of already normalized records
    pub fn renormalize(&self, records: &mut [TripRecord]) {
        for record in records {
            record.recompute_derived(self.defaults.avg_speed);
        }
    }
}

fn fill(value: &mut f64, default: f64) {
    if value.is_nan() {
        *value = default;
    }
}

/// Column coerced to `f64`; `None` when the batch does not have it
fn float_column(df: &DataFrame, name: &str) -> Result<Option<Vec<f64>>> {
    let Ok(column) = df.column(name) else {
        debug!("Column {} absent, treating as missing", name);
        return Ok(None);
    };
    let coerced = column.cast(&DataType::Float64)?;
    let values = coerced
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();
    Ok(Some(values))
}

fn string_column(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<String>>>> {
    let Ok(column) = df.column(name) else {
        debug!("Column {} absent, treating as missing", name);
        return Ok(None);
    };
    let coerced = column.cast(&DataType::String)?;
    let values = coerced
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(Some(values))
}

fn timestamp_column(
    df: &DataFrame,
    name: &str,
    batch: &BatchSource,
) -> Result<Vec<Option<NaiveDateTime>>> {
    let column = df.column(name).map_err(|_| TripError::MissingColumn {
        path: batch.path.clone(),
        column: name.to_string(),
    })?;

    match column.dtype() {
        DataType::String => Ok(column
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_timestamp))
            .collect()),
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let raw = column.cast(&DataType::Int64)?;
            Ok(raw
                .i64()?
                .into_iter()
                .map(|v| {
                    v.and_then(|v| match unit {
                        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(v)),
                        TimeUnit::Microseconds => DateTime::from_timestamp_micros(v),
                        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(v),
                    })
                    .map(|dt| dt.naive_utc())
                })
                .collect())
        }
        DataType::Date => {
            let days = column.cast(&DataType::Int32)?;
            Ok(days
                .i32()?
                .into_iter()
                .map(|v| {
                    v.and_then(|d| DateTime::from_timestamp(i64::from(d) * 86_400, 0))
                        .map(|dt| dt.naive_utc())
                })
                .collect())
        }
        other => Err(TripError::ProcessingFailed {
            path: batch.path.clone(),
            reason: format!("column {} has unsupported type {}", name, other),
        }),
    }
}
