//! Filter and dedup stage: turns normalized records into clean trips and
//! the batch QA summary.

use super::deduplication::DuplicateTracker;
use super::quality_rules::QualityRuleEngine;
use super::stats::{QaBatchSummary, RuleFailureCounts};
use crate::models::{BatchMonth, CleanTrip, TripRecord};
use tracing::{info, warn};

/// Result of cleaning one batch
#[derive(Debug, Clone)]
pub struct CleanedBatch {
    pub trips: Vec<CleanTrip>,
    pub summary: QaBatchSummary,
}

impl CleanedBatch {
    /// Clean records in input order
    pub fn records(&self) -> impl Iterator<Item = &TripRecord> {
        self.trips.iter().map(CleanTrip::record)
    }
}

/// Applies the quality rules and exact-duplicate removal to a batch
#[derive(Debug, Clone, Default)]
pub struct BatchCleaner {
    rules: QualityRuleEngine,
}

impl BatchCleaner {
    pub fn new(rules: QualityRuleEngine) -> Self {
        Self { rules }
    }

    /// Keep records that pass every rule and are the first occurrence of
    /// their duplicate group.
    ///
    /// Returns `None` for an empty batch, which has nothing to report.
    pub fn clean(&self, records: Vec<TripRecord>, month: BatchMonth) -> Option<CleanedBatch> {
        let total_rows = records.len();
        if total_rows == 0 {
            warn!("Batch {} has no rows, skipping QA report", month);
            return None;
        }

        let mut failures = RuleFailureCounts::default();
        let mut tracker = DuplicateTracker::with_capacity(total_rows);
        let mut trips = Vec::with_capacity(total_rows);
        let mut dropped = 0usize;

        for record in records {
            let verdict = self.rules.evaluate(&record, month);
            failures.record(&verdict);
            let duplicate = tracker.is_duplicate(&record);

            if !verdict.is_valid() || duplicate {
                dropped += 1;
                continue;
            }
            match CleanTrip::from_valid(record) {
                Some(trip) => trips.push(trip),
                None => dropped += 1,
            }
        }

        let summary = QaBatchSummary::from_counts(month, total_rows, &failures, dropped)?;
        info!(
            "Cleaned {}: {} -> {} rows ({} duplicates, {:.2}% dropped)",
            month,
            total_rows,
            trips.len(),
            tracker.duplicates(),
            summary.total_dropped_pct
        );

        Some(CleanedBatch { trips, summary })
    }
}
