//! Row-level quality rules for normalized trip records.
//!
//! Every rule is an independent predicate; a record is valid only when all
//! of them hold. Missing values are NaN and fail every comparison.

use crate::config::QualityThresholds;
use crate::models::{BatchMonth, TripRecord};

/// The thirteen quality rules, in report column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QaRule {
    DropoffAfterPickup,
    WithinMonth,
    Duration,
    Distance,
    Speed,
    PaymentType,
    TotalAmount,
    TipAmount,
    NonNegativeCharges,
    LocationId,
    RatecodeId,
    VendorId,
    PassengerCount,
}

pub const RULE_COUNT: usize = 13;

impl QaRule {
    pub const ALL: [QaRule; RULE_COUNT] = [
        QaRule::DropoffAfterPickup,
        QaRule::WithinMonth,
        QaRule::Duration,
        QaRule::Distance,
        QaRule::Speed,
        QaRule::PaymentType,
        QaRule::TotalAmount,
        QaRule::TipAmount,
        QaRule::NonNegativeCharges,
        QaRule::LocationId,
        QaRule::RatecodeId,
        QaRule::VendorId,
        QaRule::PassengerCount,
    ];

    /// Position in `ALL`
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn column_name(&self) -> &'static str {
        match self {
            QaRule::DropoffAfterPickup => "qa_dropoff_after_pickup",
            QaRule::WithinMonth => "qa_timedate",
            QaRule::Duration => "qa_duration",
            QaRule::Distance => "qa_distance",
            QaRule::Speed => "qa_speed",
            QaRule::PaymentType => "qa_payment_type",
            QaRule::TotalAmount => "qa_total_amount",
            QaRule::TipAmount => "qa_tip_amount",
            QaRule::NonNegativeCharges => "qa_non_neg_amount",
            QaRule::LocationId => "qa_location_id",
            QaRule::RatecodeId => "qa_ratecode_id",
            QaRule::VendorId => "qa_vendor_id",
            QaRule::PassengerCount => "qa_passenger_count",
        }
    }

    /// Column of the QA summary holding this rule's failure percentage
    pub fn fail_pct_column(&self) -> String {
        format!("{}_fail_pct", self.column_name())
    }
}

/// Outcome of every rule for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityVerdict {
    results: [bool; RULE_COUNT],
}

impl QualityVerdict {
    pub fn passed(&self, rule: QaRule) -> bool {
        self.results[rule.index()]
    }

    pub fn is_valid(&self) -> bool {
        self.results.iter().all(|&ok| ok)
    }

    pub fn failed_rules(&self) -> impl Iterator<Item = QaRule> + '_ {
        QaRule::ALL.into_iter().filter(|rule| !self.passed(*rule))
    }
}

/// Evaluates the quality rules against configured thresholds
#[derive(Debug, Clone)]
pub struct QualityRuleEngine {
    thresholds: QualityThresholds,
}

impl Default for QualityRuleEngine {
    fn default() -> Self {
        Self::new(QualityThresholds::default())
    }
}

impl QualityRuleEngine {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    /// Evaluate all rules for a record of the batch tagged `month`
    pub fn evaluate(&self, record: &TripRecord, month: BatchMonth) -> QualityVerdict {
        let mut results = [false; RULE_COUNT];
        for rule in QaRule::ALL {
            results[rule.index()] = self.check(rule, record, month);
        }
        QualityVerdict { results }
    }

    pub fn check(&self, rule: QaRule, r: &TripRecord, month: BatchMonth) -> bool {
        let t = &self.thresholds;
        match rule {
            QaRule::DropoffAfterPickup => r.trip_duration > 0.0,
            QaRule::WithinMonth => r.pickup.as_ref().is_some_and(|ts| month.contains(ts)),
            QaRule::Duration => {
                r.trip_duration > 0.0 && r.trip_duration < t.max_trip_duration_minutes
            }
            QaRule::Distance => {
                r.trip_distance > 0.0 || (r.trip_distance == 0.0 && r.total_amount > 0.0)
            }
            QaRule::Speed => r.avg_speed >= 0.0 && r.avg_speed <= t.max_avg_speed_mph,
            QaRule::PaymentType => within(r.payment_type, t.payment_type_range),
            QaRule::TotalAmount => r.total_amount > 0.0 && r.total_amount < t.max_total_amount,
            QaRule::TipAmount => r.tip_amount >= 0.0 && r.tip_amount <= r.total_amount,
            QaRule::NonNegativeCharges => r.charges().iter().all(|&c| c >= 0.0),
            QaRule::LocationId => {
                r.pu_location_id > 0.0
                    && r.pu_location_id <= t.max_pickup_location_id
                    && r.do_location_id > 0.0
                    && r.do_location_id <= t.max_dropoff_location_id
            }
            QaRule::RatecodeId => r.ratecode_id > 0.0 && r.ratecode_id <= t.max_ratecode_id,
            QaRule::VendorId => t.vendor_allow_list.contains(&r.vendor_id),
            QaRule::PassengerCount => within(r.passenger_count, t.passenger_count_range),
        }
    }
}

/// Inclusive range check; false for NaN
fn within(value: f64, (low, high): (f64, f64)) -> bool {
    value >= low && value <= high
}
