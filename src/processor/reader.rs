//! Loading of batch files into polars frames.

use crate::error::Result;
use crate::models::{BatchSource, FileFormat};
use polars::prelude::*;
use std::fs::File;
use tracing::debug;

/// Rows scanned to infer csv column types
const CSV_SCHEMA_INFERENCE_ROWS: usize = 10_000;

/// Read a whole batch file
pub fn read_batch(source: &BatchSource) -> Result<DataFrame> {
    debug!("Reading {:?} batch {}", source.format, source.path.display());

    let df = match source.format {
        FileFormat::Parquet => {
            let file = File::open(&source.path)?;
            ParquetReader::new(file).finish()?
        }
        FileFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(CSV_SCHEMA_INFERENCE_ROWS))
            .map_parse_options(|options| options.with_try_parse_dates(true))
            .try_into_reader_with_file_path(Some(source.path.clone()))?
            .finish()?,
    };

    debug!(
        "Read {} rows x {} columns from {}",
        df.height(),
        df.width(),
        source.path.display()
    );
    Ok(df)
}
