//! Tests for QA statistics

use super::*;
use crate::cleaning::quality_rules::{QaRule, QualityRuleEngine};
use crate::cleaning::stats::{round_pct, QaBatchSummary, RuleFailureCounts};

#[test]
fn test_round_pct() {
    assert_eq!(round_pct(100.0 / 3.0), 33.33);
    assert_eq!(round_pct(200.0 / 3.0), 66.67);
    assert_eq!(round_pct(0.0), 0.0);
}

#[test]
fn test_failures_tallied_once_per_rule() {
    let engine = QualityRuleEngine::default();
    let mut record = valid_record();
    record.vendor_id = 3.0;
    record.passenger_count = 12.0;

    let mut counts = RuleFailureCounts::default();
    counts.record(&engine.evaluate(&record, january()));
    counts.record(&engine.evaluate(&valid_record(), january()));

    assert_eq!(counts.get(QaRule::VendorId), 1);
    assert_eq!(counts.get(QaRule::PassengerCount), 1);
    assert_eq!(counts.get(QaRule::Speed), 0);
}

#[test]
fn test_summary_percentages() {
    let engine = QualityRuleEngine::default();
    let mut bad = valid_record();
    bad.ratecode_id = 0.0;

    let mut counts = RuleFailureCounts::default();
    counts.record(&engine.evaluate(&bad, january()));

    let summary = QaBatchSummary::from_counts(january(), 3, &counts, 1).unwrap();
    assert_eq!(summary.total_rows, 3);
    assert_eq!(summary.fail_pct(QaRule::RatecodeId), 33.33);
    assert_eq!(summary.fail_pct(QaRule::VendorId), 0.0);
    assert_eq!(summary.total_dropped_count, 1);
    assert_eq!(summary.total_dropped_pct, 33.33);
    assert_eq!(summary.kept_rows(), 2);
}

#[test]
fn test_empty_batch_has_no_summary() {
    let counts = RuleFailureCounts::default();
    assert!(QaBatchSummary::from_counts(january(), 0, &counts, 0).is_none());
}
