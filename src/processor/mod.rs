//! Main processing engine for monthly trip batches.
//!
//! Orchestrates the complete run: batch discovery, per-batch cleaning and
//! aggregation on the streaming pipeline, the cross-batch KPI merge, and
//! writing the KPI tables and QA summary.

pub mod discovery;
pub mod reader;
pub mod streaming;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::discovery::{BatchDiscovery, select_year};
use self::streaming::{BatchOutcome, BatchProcessor, BatchStream};
use self::writer::OutputWriter;

use crate::aggregation::engine::BatchAggregates;
use crate::aggregation::rollup::{KpiMerger, KpiReport};
use crate::cleaning::stats::QaBatchSummary;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::models::{BatchSource, ProcessingStats};

use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Everything a finished run produced
#[derive(Debug)]
pub struct PipelineRun {
    pub stats: ProcessingStats,
    /// Batches selected for processing, in month order
    pub batches: Vec<BatchSource>,
    /// One row per processed batch, in month order
    pub qa: Vec<QaBatchSummary>,
    /// `None` in discovery mode or when no batch succeeded
    pub kpis: Option<KpiReport>,
    /// Files written by the run
    pub outputs: Vec<PathBuf>,
}

/// Main processor for one input directory and year
#[derive(Debug)]
pub struct TripPipeline {
    input_dir: PathBuf,
    output_dir: PathBuf,
    config: PipelineConfig,
}

impl TripPipeline {
    /// Create a pipeline; the configuration is validated up front
    pub fn new(input_dir: PathBuf, output_dir: PathBuf, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            input_dir,
            output_dir,
            config,
        })
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Main processing entry point
    pub async fn run(&self) -> Result<PipelineRun> {
        let start_time = Instant::now();
        println!("{}", "Starting trip batch processing".bright_green().bold());
        println!("  {} {}", "Input:".bright_cyan(), self.input_dir.display());
        println!("  {} {}", "Output:".bright_cyan(), self.output_dir.display());

        // Step 1: Discover batches and pick the year
        println!("\n{}", "Discovering batches...".bright_yellow());
        let discovery = BatchDiscovery::new(self.input_dir.clone(), &self.config.file_prefix)?;
        let discovered = discovery.discover()?;
        let batches_discovered = discovered.len();
        let (year, batches) = select_year(discovered, self.config.year, &self.input_dir)?;
        println!(
            "  {} {} batches for {}",
            "Found".bright_green(),
            batches.len().to_string().bright_white().bold(),
            year.to_string().bright_white().bold()
        );

        let mut stats = ProcessingStats {
            batches_discovered,
            output_dir: self.output_dir.clone(),
            ..Default::default()
        };

        // Step 2: Handle discovery-only mode
        if self.config.discovery_only {
            println!("\n{}", "Discovery mode - batches to process:".bright_green());
            for batch in &batches {
                println!(
                    "  {} {}",
                    batch.month.to_string().bright_cyan(),
                    batch.path.display()
                );
            }
            stats.processing_time_ms = start_time.elapsed().as_millis();
            return Ok(PipelineRun {
                stats,
                batches,
                qa: Vec::new(),
                kpis: None,
                outputs: Vec::new(),
            });
        }

        // Step 3: Process batches
        let writer = OutputWriter::new(self.output_dir.clone(), &self.config);
        writer.prepare()?;

        println!("\n{}", "Processing batches...".bright_yellow());
        let stream = BatchStream::new(BatchProcessor::new(&self.config, writer.clone()), &self.config);
        let outcomes = stream.process_all(&batches).await;

        let mut qa = Vec::new();
        let mut aggregates: Vec<BatchAggregates> = Vec::new();
        let mut outputs = Vec::new();
        for outcome in outcomes {
            match outcome {
                BatchOutcome::Processed(report) => {
                    stats.batches_processed += 1;
                    stats.total_rows += report.summary.total_rows;
                    stats.clean_rows += report.clean_rows;
                    outputs.push(report.clean_path);
                    qa.push(report.summary);
                    aggregates.push(report.aggregates);
                }
                BatchOutcome::Skipped(_) => stats.batches_skipped += 1,
                BatchOutcome::Failed(failure) => {
                    stats.batches_failed += 1;
                    stats.failures.push(failure);
                }
            }
        }

        // Step 4: Merge and write year-level outputs
        let kpis = if stats.has_output() {
            let report = KpiMerger::new(self.config.kpi_tables.clone()).merge(year, &aggregates)?;
            outputs.extend(writer.write_kpi_report(&report)?);
            outputs.push(writer.write_qa_summary(&qa)?);
            info!("Wrote {} KPI tables and the QA summary", report.tables.len());
            Some(report)
        } else {
            warn!("No batch was processed successfully; no KPI tables written");
            None
        };

        stats.processing_time_ms = start_time.elapsed().as_millis();
        print_summary(&stats, &qa);

        Ok(PipelineRun {
            stats,
            batches,
            qa,
            kpis,
            outputs,
        })
    }
}

fn print_summary(stats: &ProcessingStats, qa: &[QaBatchSummary]) {
    if !qa.is_empty() {
        println!("\n{}", "Rows dropped per month".bright_green().bold());
        for summary in qa {
            println!(
                "  {} {}%",
                summary.month.to_string().bright_cyan(),
                format!("{:.2}", summary.total_dropped_pct).bright_white()
            );
        }
    }

    println!("\n{}", "Processing Summary".bright_green().bold());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        stats.processing_time_ms.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Batches processed:".bright_cyan(),
        stats.batches_processed.to_string().bright_white()
    );
    if stats.batches_skipped > 0 {
        println!(
            "  {} {}",
            "Batches skipped (empty):".bright_yellow(),
            stats.batches_skipped.to_string().bright_yellow()
        );
    }
    if stats.batches_failed > 0 {
        println!(
            "  {} {}",
            "Batches failed:".bright_red(),
            stats.batches_failed.to_string().bright_red().bold()
        );
        for failure in &stats.failures {
            println!("    {} {}", failure.path.display(), failure.reason.bright_black());
        }
    }
    println!(
        "  {} {} of {} ({:.2}%)",
        "Rows kept:".bright_cyan(),
        stats.clean_rows.to_string().bright_white().bold(),
        stats.total_rows.to_string().bright_white(),
        stats.retention_rate()
    );
}
