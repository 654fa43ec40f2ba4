//! Integration tests for the processor module
//!
//! Tests the complete processing pipeline against monthly CSV batches
//! written to temporary directories.

pub mod error_handling;

use crate::config::PipelineConfig;
use chrono::{Duration, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};

pub const HEADER: &str = "VendorID,tpep_pickup_datetime,tpep_dropoff_datetime,passenger_count,\
trip_distance,RatecodeID,store_and_fwd_flag,PULocationID,DOLocationID,payment_type,fare_amount,\
extra,mta_tax,tip_amount,tolls_amount,improvement_surcharge,total_amount,congestion_surcharge,\
airport_fee";

fn format_ts(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// One csv row: 15 minute trip of 3 miles that passes every rule
pub fn trip_row(pickup: NaiveDateTime) -> String {
    let dropoff = pickup + Duration::minutes(15);
    format!(
        "1,{},{},1,3.0,1,N,161,236,1,12.5,0.5,0.5,2.0,0.0,0.3,15.8,0.0,0.0",
        format_ts(pickup),
        format_ts(dropoff)
    )
}

/// Row whose dropoff precedes its pickup
pub fn reversed_row(pickup: NaiveDateTime) -> String {
    let dropoff = pickup - Duration::minutes(5);
    format!(
        "2,{},{},1,1.0,1,N,161,236,1,6.0,0.5,0.5,0.0,0.0,0.3,7.3,0.0,0.0",
        format_ts(pickup),
        format_ts(dropoff)
    )
}

/// `count` valid rows starting at `start`, one minute apart
pub fn valid_rows(start: &str, count: i64) -> Vec<String> {
    let start = NaiveDateTime::parse_from_str(start, "%Y-%m-%d %H:%M:%S").unwrap();
    (0..count)
        .map(|i| trip_row(start + Duration::minutes(i)))
        .collect()
}

/// Write a csv batch file with the full trip schema
pub fn write_batch(dir: &Path, name: &str, rows: &[String]) -> PathBuf {
    let mut content = String::from(HEADER);
    content.push('\n');
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

pub fn test_config() -> PipelineConfig {
    PipelineConfig::default().without_progress()
}
