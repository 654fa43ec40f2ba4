//! Tests for the cleaning stage

pub mod quality_rules_tests;
pub mod stats_tests;

use crate::models::{BatchMonth, TripRecord};
use chrono::{Duration, NaiveDateTime};

pub fn january() -> BatchMonth {
    BatchMonth::new(2019, 1).unwrap()
}

pub fn timestamp(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// A January 2019 record that passes every quality rule
pub fn valid_record() -> TripRecord {
    let pickup = timestamp("2019-01-15 08:00:00");
    let mut record = TripRecord {
        vendor_id: 1.0,
        pickup: Some(pickup),
        dropoff: Some(pickup + Duration::minutes(15)),
        passenger_count: 1.0,
        trip_distance: 3.0,
        ratecode_id: 1.0,
        store_and_fwd_flag: "N".to_string(),
        pu_location_id: 161.0,
        do_location_id: 236.0,
        payment_type: 1.0,
        fare_amount: 12.5,
        extra: 0.5,
        mta_tax: 0.5,
        tip_amount: 2.0,
        tolls_amount: 0.0,
        improvement_surcharge: 0.3,
        total_amount: 15.8,
        congestion_surcharge: 0.0,
        airport_fee: 0.0,
        ..TripRecord::empty()
    };
    record.recompute_derived(0.0);
    record
}

/// Valid record with the pickup shifted by `minutes`
pub fn valid_record_at(minutes: i64) -> TripRecord {
    let mut record = valid_record();
    record.pickup = record.pickup.map(|p| p + Duration::minutes(minutes));
    record.dropoff = record.dropoff.map(|d| d + Duration::minutes(minutes));
    record.recompute_derived(0.0);
    record
}
