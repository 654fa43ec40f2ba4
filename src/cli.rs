//! Command-line interface components.

use crate::config::{CompressionAlgorithm, PipelineConfig};
use crate::constants::{APP_DATA_DIR_NAME, DEFAULT_FILE_PREFIX};
use crate::models::FileFormat;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "trip-kpi")]
#[command(about = "Clean monthly taxi trip batches and aggregate yearly KPI tables")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Directory holding `<prefix>_<YYYY>-<MM>.<parquet|csv>` batches
    /// (defaults to the trip-kpi data directory)
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: Option<PathBuf>,

    /// Output directory for cleaned batches, KPI tables and reports
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Year to process (required when batches span several years)
    #[arg(long)]
    pub year: Option<i32>,

    /// File prefix of the input batches
    #[arg(long, default_value = DEFAULT_FILE_PREFIX)]
    pub prefix: String,

    /// Batches processed concurrently (0 = auto from CPU and memory)
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Format of cleaned batch files
    #[arg(long, value_enum, default_value = "parquet")]
    pub clean_format: FileFormat,

    /// Format of KPI tables and the QA summary
    #[arg(long, value_enum, default_value = "csv")]
    pub table_format: FileFormat,

    /// Parquet compression algorithm
    #[arg(long, value_enum, default_value = "snappy")]
    pub compression: CompressionAlgorithm,

    /// Discovery mode: list the batches that would be processed, then exit
    #[arg(long)]
    pub discovery_only: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Increase logging verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }

    /// Resolve the input directory, falling back to the user data directory
    pub fn resolve_input_dir(&self) -> Result<PathBuf> {
        match &self.input_dir {
            Some(path) => Ok(path.clone()),
            None => default_input_dir(),
        }
    }

    /// Get the output directory, defaulting to a sibling of the input
    pub fn resolve_output_dir(&self, input_dir: &Path) -> PathBuf {
        match &self.output_dir {
            Some(path) => path.clone(),
            None => input_dir
                .parent()
                .unwrap_or(input_dir)
                .join("output"),
        }
    }

    /// Build the pipeline configuration from the arguments
    pub fn to_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default()
            .with_file_prefix(self.prefix.clone())
            .with_max_concurrent_batches(self.jobs)
            .with_clean_format(self.clean_format)
            .with_table_format(self.table_format)
            .with_compression(self.compression);
        if let Some(year) = self.year {
            config = config.with_year(year);
        }
        if self.no_progress || self.quiet {
            config = config.without_progress();
        }
        if self.discovery_only {
            config = config.with_discovery_only();
        }
        config
    }
}

/// `<data dir>/trip-kpi/raw`
pub fn default_input_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("Could not determine user data directory")?;
    let input_dir = data_dir.join(APP_DATA_DIR_NAME).join("raw");

    if !input_dir.exists() {
        anyhow::bail!(
            "No input directory given and {} does not exist. Pass INPUT_DIR explicitly.",
            input_dir.display()
        );
    }

    Ok(input_dir)
}

/// Set up structured logging based on CLI arguments
pub fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("trip_kpi_processor={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("Failed to initialize logging")?;
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}
