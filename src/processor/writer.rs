//! Output writing for cleaned batches, KPI tables and the QA summary
//!
//! Layout under the output directory:
//! ```text
//! processed/clean_<prefix>_<YYYY>-<MM>.<ext>
//! processed/kpi_<table>_<YYYY>.<ext>
//! reports/qa_summary.<ext>
//! ```

use crate::aggregation::granularity::{BucketKey, Granularity, StatColumn};
use crate::aggregation::rollup::{KpiReport, KpiTableOutput};
use crate::cleaning::quality_rules::QaRule;
use crate::cleaning::stats::QaBatchSummary;
use crate::config::{CompressionAlgorithm, PipelineConfig};
use crate::constants::{
    columns, CLEAN_FILE_PREFIX, KPI_FILE_PREFIX, PROCESSED_DIR_NAME, QA_SUMMARY_FILE_STEM,
    REPORTS_DIR_NAME,
};
use crate::error::{Result, TripError};
use crate::models::{BatchSource, CleanTrip, FileFormat, TripRecord};
use chrono::{Datelike, NaiveDateTime};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes every pipeline artifact in the configured formats
#[derive(Debug, Clone)]
pub struct OutputWriter {
    output_dir: PathBuf,
    clean_format: FileFormat,
    table_format: FileFormat,
    compression: CompressionAlgorithm,
}

impl OutputWriter {
    pub fn new(output_dir: PathBuf, config: &PipelineConfig) -> Self {
        Self {
            output_dir,
            clean_format: config.clean_format,
            table_format: config.table_format,
            compression: config.compression,
        }
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.output_dir.join(PROCESSED_DIR_NAME)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.output_dir.join(REPORTS_DIR_NAME)
    }

    /// Create the output directories
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(self.processed_dir())?;
        std::fs::create_dir_all(self.reports_dir())?;
        Ok(())
    }

    pub fn clean_batch_path(&self, source: &BatchSource) -> PathBuf {
        self.processed_dir().join(format!(
            "{}{}.{}",
            CLEAN_FILE_PREFIX,
            source.stem(),
            self.clean_format.extension()
        ))
    }

    pub fn kpi_table_path(&self, table_name: &str, year: i32) -> PathBuf {
        self.processed_dir().join(format!(
            "{}{}_{}.{}",
            KPI_FILE_PREFIX,
            table_name,
            year,
            self.table_format.extension()
        ))
    }

    pub fn qa_summary_path(&self) -> PathBuf {
        self.reports_dir().join(format!(
            "{}.{}",
            QA_SUMMARY_FILE_STEM,
            self.table_format.extension()
        ))
    }

    /// Write the clean trips of one batch
    pub fn write_clean_batch(&self, source: &BatchSource, trips: &[CleanTrip]) -> Result<PathBuf> {
        let path = self.clean_batch_path(source);
        let mut df = clean_trips_frame(trips.iter().map(CleanTrip::record))?;
        self.write_frame(&mut df, &path, self.clean_format)?;
        debug!("Wrote {} clean rows to {}", df.height(), path.display());
        Ok(path)
    }

    /// Write every KPI table of the report
    pub fn write_kpi_report(&self, report: &KpiReport) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(report.tables.len());
        for table in &report.tables {
            let path = self.kpi_table_path(table.spec.table.name(), report.year);
            let mut df = kpi_table_frame(table)?;
            self.write_frame(&mut df, &path, self.table_format)?;
            debug!("Wrote {} rows to {}", df.height(), path.display());
            written.push(path);
        }
        Ok(written)
    }

    pub fn write_qa_summary(&self, summaries: &[QaBatchSummary]) -> Result<PathBuf> {
        let path = self.qa_summary_path();
        let mut df = qa_summary_frame(summaries)?;
        self.write_frame(&mut df, &path, self.table_format)?;
        Ok(path)
    }

    fn write_frame(&self, df: &mut DataFrame, path: &Path, format: FileFormat) -> Result<()> {
        let file = File::create(path)?;
        let written = match format {
            FileFormat::Parquet => ParquetWriter::new(file)
                .with_compression(self.compression.to_polars_compression())
                .finish(df)
                .map(|_| ()),
            FileFormat::Csv => {
                let mut file = file;
                CsvWriter::new(&mut file).include_header(true).finish(df)
            }
        };
        written.map_err(|e| TripError::ProcessingFailed {
            path: path.to_path_buf(),
            reason: format!("failed to write output: {}", e),
        })
    }
}

fn datetime_column(name: &str, values: Vec<Option<NaiveDateTime>>) -> PolarsResult<Column> {
    let micros: Vec<Option<i64>> = values
        .into_iter()
        .map(|v| v.map(|ts| ts.and_utc().timestamp_micros()))
        .collect();
    Column::new(name.into(), micros).cast(&DataType::Datetime(TimeUnit::Microseconds, None))
}

fn float_column(name: &str, records: &[&TripRecord], field: impl Fn(&TripRecord) -> f64) -> Column {
    let values: Vec<Option<f64>> = records
        .iter()
        .map(|r| Some(field(*r)).filter(|v| !v.is_nan()))
        .collect();
    Column::new(name.into(), values)
}

/// Clean records in the input schema plus the derived duration and speed
pub fn clean_trips_frame<'a>(records: impl Iterator<Item = &'a TripRecord>) -> PolarsResult<DataFrame> {
    let records: Vec<&TripRecord> = records.collect();

    DataFrame::new(vec![
        float_column(columns::VENDOR_ID, &records, |r| r.vendor_id),
        datetime_column(
            columns::PICKUP_DATETIME,
            records.iter().map(|r| r.pickup).collect(),
        )?,
        datetime_column(
            columns::DROPOFF_DATETIME,
            records.iter().map(|r| r.dropoff).collect(),
        )?,
        float_column(columns::PASSENGER_COUNT, &records, |r| r.passenger_count),
        float_column(columns::TRIP_DISTANCE, &records, |r| r.trip_distance),
        float_column(columns::RATECODE_ID, &records, |r| r.ratecode_id),
        Column::new(
            columns::STORE_AND_FWD_FLAG.into(),
            records
                .iter()
                .map(|r| r.store_and_fwd_flag.as_str())
                .collect::<Vec<&str>>(),
        ),
        float_column(columns::PU_LOCATION_ID, &records, |r| r.pu_location_id),
        float_column(columns::DO_LOCATION_ID, &records, |r| r.do_location_id),
        float_column(columns::PAYMENT_TYPE, &records, |r| r.payment_type),
        float_column(columns::FARE_AMOUNT, &records, |r| r.fare_amount),
        float_column(columns::EXTRA, &records, |r| r.extra),
        float_column(columns::MTA_TAX, &records, |r| r.mta_tax),
        float_column(columns::TIP_AMOUNT, &records, |r| r.tip_amount),
        float_column(columns::TOLLS_AMOUNT, &records, |r| r.tolls_amount),
        float_column(columns::IMPROVEMENT_SURCHARGE, &records, |r| {
            r.improvement_surcharge
        }),
        float_column(columns::TOTAL_AMOUNT, &records, |r| r.total_amount),
        float_column(columns::CONGESTION_SURCHARGE, &records, |r| {
            r.congestion_surcharge
        }),
        float_column(columns::AIRPORT_FEE, &records, |r| r.airport_fee),
        float_column(columns::TRIP_DURATION, &records, |r| r.trip_duration),
        float_column(columns::AVG_SPEED, &records, |r| r.avg_speed),
    ])
}

/// Key columns for a table of the given granularity
fn key_columns(granularity: Granularity, keys: &[BucketKey]) -> Vec<Column> {
    let names = granularity.key_columns();
    match granularity {
        Granularity::Daily => {
            let dates: Vec<Option<String>> = keys
                .iter()
                .map(|k| match k {
                    BucketKey::Date(date) => Some(date.to_string()),
                    _ => None,
                })
                .collect();
            vec![Column::new(names[0].into(), dates)]
        }
        Granularity::Weekly => {
            let mut years = Vec::with_capacity(keys.len());
            let mut weeks = Vec::with_capacity(keys.len());
            let mut starts = Vec::with_capacity(keys.len());
            for key in keys {
                match key {
                    BucketKey::Week {
                        iso_year,
                        week,
                        week_start,
                    } => {
                        years.push(Some(i64::from(*iso_year)));
                        weeks.push(Some(i64::from(*week)));
                        starts.push(Some(week_start.to_string()));
                    }
                    _ => {
                        years.push(None);
                        weeks.push(None);
                        starts.push(None);
                    }
                }
            }
            vec![
                Column::new(names[0].into(), years),
                Column::new(names[1].into(), weeks),
                Column::new(names[2].into(), starts),
            ]
        }
        Granularity::Monthly => {
            let months: Vec<Option<String>> = keys
                .iter()
                .map(|k| match k {
                    BucketKey::Month(month) => Some(month.to_string()),
                    _ => None,
                })
                .collect();
            vec![Column::new(names[0].into(), months)]
        }
        Granularity::Hourly => {
            let mut dates = Vec::with_capacity(keys.len());
            let mut days = Vec::with_capacity(keys.len());
            let mut hours = Vec::with_capacity(keys.len());
            for key in keys {
                match key {
                    BucketKey::Hour { date, hour } => {
                        dates.push(Some(date.to_string()));
                        days.push(Some(i64::from(date.weekday().num_days_from_monday())));
                        hours.push(Some(i64::from(*hour)));
                    }
                    _ => {
                        dates.push(None);
                        days.push(None);
                        hours.push(None);
                    }
                }
            }
            vec![
                Column::new(names[0].into(), dates),
                Column::new(names[1].into(), days),
                Column::new(names[2].into(), hours),
            ]
        }
    }
}

/// Dimension ids are integral once a row passes the quality rules
fn dimension_column(name: &str, values: Vec<f64>) -> Column {
    let ids: Vec<Option<i64>> = values
        .iter()
        .map(|v| v.is_finite().then(|| *v as i64))
        .collect();
    Column::new(name.into(), ids)
}

/// Frame of one KPI table: key columns, configured stats, share-of-year
pub fn kpi_table_frame(table: &KpiTableOutput) -> PolarsResult<DataFrame> {
    let spec = &table.spec;
    let rows = &table.rows;

    let keys: Vec<BucketKey> = rows.iter().map(|r| r.key.bucket).collect();
    let mut frame_columns = key_columns(spec.table.granularity(), &keys);

    if let Some(dimension) = spec.table.dimension() {
        let values = rows.iter().map(|r| r.key.dimension.unwrap_or(f64::NAN)).collect();
        frame_columns.push(dimension_column(dimension.column_name(), values));
    }

    for stat in &spec.stats {
        let column = if *stat == StatColumn::Trips {
            let trips: Vec<i64> = rows.iter().map(|r| r.stats.trips as i64).collect();
            Column::new(stat.name().into(), trips)
        } else {
            let values: Vec<f64> = rows.iter().map(|r| r.stats.get(*stat)).collect();
            Column::new(stat.name().into(), values)
        };
        frame_columns.push(column);
    }

    let trip_pct: Vec<f64> = rows.iter().map(|r| r.trip_pct).collect();
    let money_pct: Vec<f64> = rows.iter().map(|r| r.money_pct).collect();
    frame_columns.push(Column::new("trip_pct".into(), trip_pct));
    frame_columns.push(Column::new("money_pct".into(), money_pct));

    DataFrame::new(frame_columns)
}

/// QA summary: one row per processed month
pub fn qa_summary_frame(summaries: &[QaBatchSummary]) -> PolarsResult<DataFrame> {
    let months: Vec<String> = summaries.iter().map(|s| s.month.to_string()).collect();
    let totals: Vec<i64> = summaries.iter().map(|s| s.total_rows as i64).collect();

    let mut frame_columns = vec![
        Column::new("month".into(), months),
        Column::new("total_rows".into(), totals),
    ];
    for rule in QaRule::ALL {
        let pct: Vec<f64> = summaries.iter().map(|s| s.fail_pct(rule)).collect();
        frame_columns.push(Column::new(rule.fail_pct_column().into(), pct));
    }

    let dropped: Vec<i64> = summaries
        .iter()
        .map(|s| s.total_dropped_count as i64)
        .collect();
    let dropped_pct: Vec<f64> = summaries.iter().map(|s| s.total_dropped_pct).collect();
    frame_columns.push(Column::new("total_dropped_count".into(), dropped));
    frame_columns.push(Column::new("total_dropped_pct".into(), dropped_pct));

    DataFrame::new(frame_columns)
}
