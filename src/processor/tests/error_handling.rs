//! Error handling tests: failed and empty batches, fatal run errors

use super::{HEADER, test_config, valid_rows, write_batch};
use crate::aggregation::granularity::{KpiTable, KpiTableSpec};
use crate::error::TripError;
use crate::processor::TripPipeline;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn input_dir(temp_dir: &TempDir) -> PathBuf {
    let dir = temp_dir.path().join("raw");
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[tokio::test]
async fn test_failed_batch_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let input = input_dir(&temp_dir);
    write_batch(
        &input,
        "yellow_tripdata_2019-01.csv",
        &valid_rows("2019-01-10 08:00:00", 3),
    );
    // no trip_distance column
    fs::write(
        input.join("yellow_tripdata_2019-02.csv"),
        "VendorID,tpep_pickup_datetime,tpep_dropoff_datetime\n\
         1,2019-02-01 10:00:00,2019-02-01 10:10:00\n",
    )
    .unwrap();

    let output = temp_dir.path().join("out");
    let run = TripPipeline::new(input, output.clone(), test_config())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(run.stats.batches_processed, 1);
    assert_eq!(run.stats.batches_failed, 1);
    assert!(run.stats.failures[0].path.ends_with("yellow_tripdata_2019-02.csv"));
    assert!(run.stats.failures[0].reason.contains("trip_distance"));

    // the failed month is absent from QA and KPI outputs
    assert_eq!(run.qa.len(), 1);
    let report = run.kpis.unwrap();
    assert_eq!(report.table(KpiTable::Monthly).unwrap().rows.len(), 1);
    assert!(output.join("reports/qa_summary.csv").exists());
    assert!(!output.join("processed/clean_yellow_tripdata_2019-02.parquet").exists());
}

#[tokio::test]
async fn test_empty_batch_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let input = input_dir(&temp_dir);
    write_batch(
        &input,
        "yellow_tripdata_2019-01.csv",
        &valid_rows("2019-01-10 08:00:00", 3),
    );
    fs::write(
        input.join("yellow_tripdata_2019-02.csv"),
        format!("{}\n", HEADER),
    )
    .unwrap();

    let run = TripPipeline::new(input, temp_dir.path().join("out"), test_config())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(run.stats.batches_processed, 1);
    assert_eq!(run.stats.batches_skipped, 1);
    assert_eq!(run.stats.batches_failed, 0);
    assert_eq!(run.qa.len(), 1);
}

#[tokio::test]
async fn test_all_batches_failed() {
    let temp_dir = TempDir::new().unwrap();
    let input = input_dir(&temp_dir);
    fs::write(
        input.join("yellow_tripdata_2019-01.csv"),
        "VendorID,fare_amount\n1,5.0\n",
    )
    .unwrap();

    let output = temp_dir.path().join("out");
    let run = TripPipeline::new(input, output.clone(), test_config())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(!run.stats.has_output());
    assert_eq!(run.stats.batches_failed, 1);
    assert!(run.kpis.is_none());
    assert!(!output.join("reports/qa_summary.csv").exists());
}

#[tokio::test]
async fn test_no_batches_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let input = input_dir(&temp_dir);
    fs::write(input.join("notes.txt"), "not a batch").unwrap();

    let result = TripPipeline::new(input, temp_dir.path().join("out"), test_config())
        .unwrap()
        .run()
        .await;
    assert!(matches!(result, Err(TripError::NoInputBatches { .. })));
}

#[tokio::test]
async fn test_missing_input_directory() {
    let temp_dir = TempDir::new().unwrap();
    let result = TripPipeline::new(
        temp_dir.path().join("does-not-exist"),
        temp_dir.path().join("out"),
        test_config(),
    )
    .unwrap()
    .run()
    .await;
    assert!(matches!(result, Err(TripError::InputNotFound { .. })));
}

#[tokio::test]
async fn test_mixed_years_need_selection() {
    let temp_dir = TempDir::new().unwrap();
    let input = input_dir(&temp_dir);
    write_batch(
        &input,
        "yellow_tripdata_2019-12.csv",
        &valid_rows("2019-12-02 07:00:00", 1),
    );
    write_batch(
        &input,
        "yellow_tripdata_2020-01.csv",
        &valid_rows("2020-01-06 07:00:00", 1),
    );

    let result = TripPipeline::new(input, temp_dir.path().join("out"), test_config())
        .unwrap()
        .run()
        .await;
    assert!(matches!(result, Err(TripError::Configuration { .. })));
}

#[test]
fn test_invalid_config_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config().with_kpi_tables(vec![KpiTableSpec::new(KpiTable::Daily)]);
    let result = TripPipeline::new(
        temp_dir.path().to_path_buf(),
        temp_dir.path().join("out"),
        config,
    );
    assert!(matches!(result, Err(TripError::Configuration { .. })));
}
