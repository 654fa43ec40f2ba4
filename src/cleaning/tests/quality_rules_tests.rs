//! Tests for the quality rules

use super::*;
use crate::cleaning::quality_rules::{QaRule, QualityRuleEngine};
use crate::config::QualityThresholds;

fn engine() -> QualityRuleEngine {
    QualityRuleEngine::default()
}

fn failed(record: &TripRecord) -> Vec<QaRule> {
    engine().evaluate(record, january()).failed_rules().collect()
}

#[test]
fn test_valid_record_passes_every_rule() {
    let verdict = engine().evaluate(&valid_record(), january());
    assert!(verdict.is_valid());
    for rule in QaRule::ALL {
        assert!(verdict.passed(rule), "{} failed", rule.column_name());
    }
}

#[test]
fn test_pickup_after_dropoff() {
    let mut record = valid_record();
    std::mem::swap(&mut record.pickup, &mut record.dropoff);
    record.recompute_derived(0.0);

    let failures = failed(&record);
    assert!(failures.contains(&QaRule::DropoffAfterPickup));
    assert!(failures.contains(&QaRule::Duration));
}

#[test]
fn test_pickup_outside_batch_month() {
    let mut record = valid_record();
    record.pickup = Some(timestamp("2018-12-31 23:50:00"));
    record.dropoff = Some(timestamp("2019-01-01 00:05:00"));
    record.recompute_derived(0.0);

    assert_eq!(failed(&record), vec![QaRule::WithinMonth]);
}

#[test]
fn test_month_start_is_inclusive() {
    let mut record = valid_record();
    record.pickup = Some(timestamp("2019-01-01 00:00:00"));
    record.dropoff = Some(timestamp("2019-01-01 00:10:00"));
    record.recompute_derived(0.0);

    assert!(engine().evaluate(&record, january()).is_valid());
}

#[test]
fn test_duration_upper_bound_is_exclusive() {
    let mut record = valid_record();
    record.dropoff = record.pickup.map(|p| p + chrono::Duration::minutes(600));
    record.trip_distance = 100.0;
    record.recompute_derived(0.0);

    assert_eq!(failed(&record), vec![QaRule::Duration]);
}

#[test]
fn test_zero_distance_needs_positive_total() {
    let mut record = valid_record();
    record.trip_distance = 0.0;
    record.total_amount = 0.0;
    record.tip_amount = 0.0;
    record.recompute_derived(0.0);
    assert!(failed(&record).contains(&QaRule::Distance));

    record.total_amount = 5.0;
    assert!(!failed(&record).contains(&QaRule::Distance));
}

#[test]
fn test_speed_bound() {
    let mut record = valid_record();
    // 20 miles in 15 minutes = 80 mph
    record.trip_distance = 20.0;
    record.recompute_derived(0.0);
    assert_eq!(failed(&record), vec![QaRule::Speed]);

    // exactly 70 mph passes
    record.trip_distance = 17.5;
    record.recompute_derived(0.0);
    assert!(failed(&record).is_empty());
}

#[test]
fn test_amount_rules() {
    let mut record = valid_record();
    record.tip_amount = 20.0;
    assert_eq!(failed(&record), vec![QaRule::TipAmount]);

    let mut record = valid_record();
    record.total_amount = 1000.0;
    assert_eq!(failed(&record), vec![QaRule::TotalAmount]);

    let mut record = valid_record();
    record.extra = -0.5;
    assert_eq!(failed(&record), vec![QaRule::NonNegativeCharges]);
}

#[test]
fn test_code_ranges() {
    let mut record = valid_record();
    record.pu_location_id = 264.0;
    assert_eq!(failed(&record), vec![QaRule::LocationId]);
    record.pu_location_id = 263.0;
    record.do_location_id = 265.0;
    assert!(failed(&record).is_empty());

    let mut record = valid_record();
    record.ratecode_id = 99.0;
    assert_eq!(failed(&record), vec![QaRule::RatecodeId]);

    let mut record = valid_record();
    record.payment_type = 0.0;
    assert!(failed(&record).is_empty());
    record.payment_type = 7.0;
    assert_eq!(failed(&record), vec![QaRule::PaymentType]);

    let mut record = valid_record();
    record.vendor_id = 4.0;
    assert_eq!(failed(&record), vec![QaRule::VendorId]);

    let mut record = valid_record();
    record.passenger_count = 10.0;
    assert_eq!(failed(&record), vec![QaRule::PassengerCount]);
}

#[test]
fn test_missing_values_fail_comparisons() {
    let mut record = valid_record();
    record.payment_type = f64::NAN;
    record.vendor_id = f64::NAN;
    let failures = failed(&record);
    assert!(failures.contains(&QaRule::PaymentType));
    assert!(failures.contains(&QaRule::VendorId));
}

#[test]
fn test_custom_thresholds() {
    let thresholds = QualityThresholds {
        max_avg_speed_mph: 10.0,
        ..QualityThresholds::default()
    };
    let engine = QualityRuleEngine::new(thresholds);
    let verdict = engine.evaluate(&valid_record(), january());
    assert!(!verdict.passed(QaRule::Speed));
}

#[test]
fn test_report_column_names() {
    assert_eq!(QaRule::WithinMonth.column_name(), "qa_timedate");
    assert_eq!(
        QaRule::NonNegativeCharges.fail_pct_column(),
        "qa_non_neg_amount_fail_pct"
    );
    assert_eq!(QaRule::ALL.len(), 13);
}
