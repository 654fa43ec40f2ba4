//! QA statistics for a cleaned batch.

use super::quality_rules::{QaRule, QualityVerdict, RULE_COUNT};
use crate::constants::QA_PERCENT_DECIMALS;
use crate::models::BatchMonth;

/// Round to the QA report precision
pub fn round_pct(value: f64) -> f64 {
    let scale = 10f64.powi(QA_PERCENT_DECIMALS);
    (value * scale).round() / scale
}

/// Failure tallies per rule; a record failing several rules counts once
/// for each of them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleFailureCounts {
    counts: [usize; RULE_COUNT],
}

impl RuleFailureCounts {
    pub fn record(&mut self, verdict: &QualityVerdict) {
        for rule in verdict.failed_rules() {
            self.counts[rule.index()] += 1;
        }
    }

    pub fn get(&self, rule: QaRule) -> usize {
        self.counts[rule.index()]
    }
}

/// One row of the QA summary report
#[derive(Debug, Clone, PartialEq)]
pub struct QaBatchSummary {
    pub month: BatchMonth,
    pub total_rows: usize,
    /// Failure percentage per rule, in `QaRule::ALL` order
    pub rule_fail_pct: [f64; RULE_COUNT],
    /// Rows that were invalid or duplicates
    pub total_dropped_count: usize,
    pub total_dropped_pct: f64,
}

impl QaBatchSummary {
    /// Build the summary; `None` for an empty batch, which has no
    /// meaningful percentages
    pub fn from_counts(
        month: BatchMonth,
        total_rows: usize,
        failures: &RuleFailureCounts,
        dropped: usize,
    ) -> Option<Self> {
        if total_rows == 0 {
            return None;
        }
        let pct = |count: usize| round_pct(100.0 * count as f64 / total_rows as f64);

        let mut rule_fail_pct = [0.0; RULE_COUNT];
        for rule in QaRule::ALL {
            rule_fail_pct[rule.index()] = pct(failures.get(rule));
        }

        Some(Self {
            month,
            total_rows,
            rule_fail_pct,
            total_dropped_count: dropped,
            total_dropped_pct: pct(dropped),
        })
    }

    pub fn fail_pct(&self, rule: QaRule) -> f64 {
        self.rule_fail_pct[rule.index()]
    }

    pub fn kept_rows(&self) -> usize {
        self.total_rows.saturating_sub(self.total_dropped_count)
    }
}
