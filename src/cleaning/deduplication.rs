//! Exact-duplicate detection within a batch.
//!
//! Two records are duplicates when every source field is equal. Floats are
//! compared by value with all NaNs equal to each other and `-0.0 == 0.0`,
//! matching dataframe duplicate marking.

use crate::models::TripRecord;
use chrono::NaiveDateTime;
use std::collections::HashSet;

/// Hashable identity of a full record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RowKey {
    numbers: [u64; 16],
    pickup: Option<NaiveDateTime>,
    dropoff: Option<NaiveDateTime>,
    store_and_fwd_flag: String,
}

impl RowKey {
    fn of(r: &TripRecord) -> Self {
        let numbers = [
            r.vendor_id,
            r.passenger_count,
            r.trip_distance,
            r.ratecode_id,
            r.pu_location_id,
            r.do_location_id,
            r.payment_type,
            r.fare_amount,
            r.extra,
            r.mta_tax,
            r.tip_amount,
            r.tolls_amount,
            r.improvement_surcharge,
            r.total_amount,
            r.congestion_surcharge,
            r.airport_fee,
        ]
        .map(canonical_bits);

        Self {
            numbers,
            pickup: r.pickup,
            dropoff: r.dropoff,
            store_and_fwd_flag: r.store_and_fwd_flag.clone(),
        }
    }
}

fn canonical_bits(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

/// Remembers records seen so far in one batch; the first occurrence wins
#[derive(Debug, Default)]
pub struct DuplicateTracker {
    seen: HashSet<RowKey>,
    duplicates: usize,
}

impl DuplicateTracker {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
            duplicates: 0,
        }
    }

    /// Register `record`; true when an identical record was seen before
    pub fn is_duplicate(&mut self, record: &TripRecord) -> bool {
        let duplicate = !self.seen.insert(RowKey::of(record));
        if duplicate {
            self.duplicates += 1;
        }
        duplicate
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}
