//! Streaming batch processing
//!
//! Each batch is read, normalized, cleaned, written and aggregated on a
//! blocking worker. Batches run with bounded concurrency, results come
//! back in input order, and concurrency is reduced under memory pressure.

use super::reader::read_batch;
use super::writer::OutputWriter;
use crate::aggregation::engine::{AggregationEngine, BatchAggregates};
use crate::cleaning::normalizer::RecordNormalizer;
use crate::cleaning::processor::BatchCleaner;
use crate::cleaning::quality_rules::QualityRuleEngine;
use crate::cleaning::stats::QaBatchSummary;
use crate::config::PipelineConfig;
use crate::error::{Result, TripError};
use crate::models::{BatchFailure, BatchSource};

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use sysinfo::System;
use tokio::sync::Mutex;
use tokio::task;
use tracing::{debug, error, info, warn};

/// Everything one processed batch hands back to the orchestrator
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub source: BatchSource,
    pub summary: QaBatchSummary,
    pub aggregates: BatchAggregates,
    pub clean_path: PathBuf,
    pub clean_rows: usize,
}

/// Outcome of one batch
#[derive(Debug)]
pub enum BatchOutcome {
    Processed(BatchReport),
    /// The batch had no rows
    Skipped(BatchSource),
    Failed(BatchFailure),
}

/// Per-batch work: read, normalize, clean, write, aggregate
#[derive(Debug)]
pub struct BatchProcessor {
    normalizer: RecordNormalizer,
    cleaner: BatchCleaner,
    engine: AggregationEngine,
    writer: OutputWriter,
}

impl BatchProcessor {
    pub fn new(config: &PipelineConfig, writer: OutputWriter) -> Self {
        Self {
            normalizer: RecordNormalizer::new(config.imputation.clone()),
            cleaner: BatchCleaner::new(QualityRuleEngine::new(config.quality.clone())),
            engine: AggregationEngine::new(config.kpi_tables.clone()),
            writer,
        }
    }

    /// Process one batch; `Ok(None)` when it has no rows
    pub fn process_batch(&self, source: &BatchSource) -> Result<Option<BatchReport>> {
        let df = read_batch(source)?;
        if df.height() == 0 {
            warn!("Skipped batch (no rows): {}", source.path.display());
            return Ok(None);
        }

        let records = self.normalizer.normalize_frame(&df, source)?;
        drop(df);

        let Some(cleaned) = self.cleaner.clean(records, source.month) else {
            return Ok(None);
        };

        let clean_path = self.writer.write_clean_batch(source, &cleaned.trips)?;
        let aggregates = self.engine.aggregate(source.month, &cleaned.trips);

        Ok(Some(BatchReport {
            source: source.clone(),
            summary: cleaned.summary,
            aggregates,
            clean_path,
            clean_rows: cleaned.trips.len(),
        }))
    }
}

/// Runs `BatchProcessor` over many batches with bounded concurrency
#[derive(Debug)]
pub struct BatchStream {
    processor: Arc<BatchProcessor>,
    max_concurrent_batches: usize,
    memory_threshold: f64,
    show_progress: bool,
    system_monitor: Arc<Mutex<System>>,
}

impl BatchStream {
    pub fn new(processor: BatchProcessor, config: &PipelineConfig) -> Self {
        Self {
            processor: Arc::new(processor),
            max_concurrent_batches: config.max_concurrent_batches.max(1),
            memory_threshold: config.memory_threshold,
            show_progress: config.show_progress,
            system_monitor: Arc::new(Mutex::new(System::new())),
        }
    }

    /// Check if system is under memory pressure
    pub async fn check_memory_pressure(&self) -> bool {
        let mut system = self.system_monitor.lock().await;
        system.refresh_memory();

        let used_memory = system.used_memory() as f64;
        let total_memory = system.total_memory() as f64;

        if total_memory == 0.0 {
            return false;
        }

        let memory_usage = used_memory / total_memory;
        let is_pressure = memory_usage > self.memory_threshold;

        if is_pressure {
            debug!(
                "Memory pressure detected: {:.1}% usage (threshold: {:.1}%)",
                memory_usage * 100.0,
                self.memory_threshold * 100.0
            );
        }

        is_pressure
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_message("Processing batches");
        pb
    }

    /// Process all batches, returning outcomes in input order
    pub async fn process_all(&self, batches: &[BatchSource]) -> Vec<BatchOutcome> {
        let mut concurrent_limit = self.max_concurrent_batches.min(batches.len()).max(1);
        if concurrent_limit > 1 && self.check_memory_pressure().await {
            concurrent_limit = (concurrent_limit / 2).max(1);
            debug!(
                "Memory pressure detected, reducing concurrency to {}",
                concurrent_limit
            );
        }
        info!(
            "Processing {} batches ({} at a time)",
            batches.len(),
            concurrent_limit
        );

        let pb = self.progress_bar(batches.len());

        let outcomes = stream::iter(batches.iter().cloned())
            .map(|source| {
                let processor = Arc::clone(&self.processor);
                let pb = pb.clone();
                async move {
                    if let Some(file_name) = source.path.file_name() {
                        pb.set_message(format!("Processing: {}", file_name.to_string_lossy()));
                    }

                    let result = task::spawn_blocking({
                        let source = source.clone();
                        move || processor.process_batch(&source)
                    })
                    .await
                    .map_err(|e| TripError::ProcessingFailed {
                        path: source.path.clone(),
                        reason: format!("batch task failed: {}", e),
                    })
                    .and_then(|result| result);
                    pb.inc(1);

                    match result {
                        Ok(Some(report)) => {
                            info!(
                                "Processed {}: {} of {} rows kept",
                                source.month, report.clean_rows, report.summary.total_rows
                            );
                            BatchOutcome::Processed(report)
                        }
                        Ok(None) => BatchOutcome::Skipped(source),
                        Err(e) => {
                            error!("Failed to process {}: {:#}", source.path.display(), e);
                            BatchOutcome::Failed(BatchFailure {
                                path: source.path.clone(),
                                reason: e.to_string(),
                            })
                        }
                    }
                }
            })
            .buffered(concurrent_limit)
            .collect::<Vec<_>>()
            .await;

        pb.finish_with_message("All batches processed");
        outcomes
    }
}
