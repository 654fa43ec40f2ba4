//! KPI table definitions: calendar buckets, cross-tab dimensions and the
//! stat columns each table emits.

use super::rollup::RollupStrategy;
use crate::constants::columns;
use crate::models::{BatchMonth, CalendarFields, TripRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Calendar bucketing of clean trips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
    /// Calendar date × hour-of-day
    Hourly,
}

impl Granularity {
    pub fn bucket_of(&self, calendar: &CalendarFields) -> BucketKey {
        match self {
            Granularity::Daily => BucketKey::Date(calendar.date),
            Granularity::Weekly => BucketKey::Week {
                iso_year: calendar.iso_year,
                week: calendar.iso_week,
                week_start: calendar.week_start,
            },
            Granularity::Monthly => BucketKey::Month(calendar.batch_month()),
            Granularity::Hourly => BucketKey::Hour {
                date: calendar.date,
                hour: calendar.hour,
            },
        }
    }

    /// How per-batch rows of this granularity are merged.
    ///
    /// Only weeks straddle month boundaries.
    pub fn rollup_strategy(&self) -> RollupStrategy {
        match self {
            Granularity::Daily | Granularity::Monthly | Granularity::Hourly => {
                RollupStrategy::Concatenate
            }
            Granularity::Weekly => RollupStrategy::Recombine,
        }
    }

    /// Output columns holding the bucket key
    pub fn key_columns(&self) -> &'static [&'static str] {
        match self {
            Granularity::Daily => &["date"],
            Granularity::Weekly => &["iso_year", "week", "week_start"],
            Granularity::Monthly => &["month"],
            Granularity::Hourly => &["date", "day_of_week", "hour"],
        }
    }
}

/// Identity of a calendar bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    Date(NaiveDate),
    /// ISO year and week; `week_start` is the Monday of that week
    Week {
        iso_year: i32,
        week: u32,
        week_start: NaiveDate,
    },
    Month(BatchMonth),
    /// One clock hour of one date
    Hour { date: NaiveDate, hour: u32 },
}

/// Cross-tab dimension for the monthly breakdown tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    PickupZone,
    DropoffZone,
    PaymentType,
}

impl Dimension {
    pub fn column_name(&self) -> &'static str {
        match self {
            Dimension::PickupZone => columns::PU_LOCATION_ID,
            Dimension::DropoffZone => columns::DO_LOCATION_ID,
            Dimension::PaymentType => columns::PAYMENT_TYPE,
        }
    }

    /// Dimension value of `record`; `-0.0` is folded into `0.0`
    pub fn value_of(&self, record: &TripRecord) -> f64 {
        let value = match self {
            Dimension::PickupZone => record.pu_location_id,
            Dimension::DropoffZone => record.do_location_id,
            Dimension::PaymentType => record.payment_type,
        };
        if value == 0.0 { 0.0 } else { value }
    }
}

/// Row identity in a KPI table: bucket plus optional dimension value.
///
/// Dimension values are compared with `f64::total_cmp`, so equal ids from
/// different batches always land in the same group.
#[derive(Debug, Clone, Copy)]
pub struct KpiKey {
    pub bucket: BucketKey,
    pub dimension: Option<f64>,
}

impl KpiKey {
    pub fn new(bucket: BucketKey, dimension: Option<f64>) -> Self {
        Self { bucket, dimension }
    }
}

impl PartialEq for KpiKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KpiKey {}

impl PartialOrd for KpiKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KpiKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bucket.cmp(&other.bucket).then_with(|| {
            match (self.dimension, other.dimension) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a.total_cmp(&b),
            }
        })
    }
}

/// The seven KPI output tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiTable {
    Daily,
    Weekly,
    Monthly,
    Hourly,
    MonthlyPickup,
    MonthlyDropoff,
    MonthlyPaymentType,
}

impl KpiTable {
    pub const ALL: [KpiTable; 7] = [
        KpiTable::Daily,
        KpiTable::Weekly,
        KpiTable::Monthly,
        KpiTable::Hourly,
        KpiTable::MonthlyPickup,
        KpiTable::MonthlyDropoff,
        KpiTable::MonthlyPaymentType,
    ];

    /// Name used in output file names (`kpi_<name>_<year>`)
    pub fn name(&self) -> &'static str {
        match self {
            KpiTable::Daily => "daily",
            KpiTable::Weekly => "weekly",
            KpiTable::Monthly => "monthly",
            KpiTable::Hourly => "hourly",
            KpiTable::MonthlyPickup => "monthly_pickup",
            KpiTable::MonthlyDropoff => "monthly_dropoff",
            KpiTable::MonthlyPaymentType => "monthly_payment_type",
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            KpiTable::Daily => Granularity::Daily,
            KpiTable::Weekly => Granularity::Weekly,
            KpiTable::Hourly => Granularity::Hourly,
            KpiTable::Monthly
            | KpiTable::MonthlyPickup
            | KpiTable::MonthlyDropoff
            | KpiTable::MonthlyPaymentType => Granularity::Monthly,
        }
    }

    pub fn dimension(&self) -> Option<Dimension> {
        match self {
            KpiTable::MonthlyPickup => Some(Dimension::PickupZone),
            KpiTable::MonthlyDropoff => Some(Dimension::DropoffZone),
            KpiTable::MonthlyPaymentType => Some(Dimension::PaymentType),
            _ => None,
        }
    }

    pub fn key_of(&self, trip: &TripRecord, calendar: &CalendarFields) -> KpiKey {
        KpiKey::new(
            self.granularity().bucket_of(calendar),
            self.dimension().map(|d| d.value_of(trip)),
        )
    }

    pub fn rollup_strategy(&self) -> RollupStrategy {
        self.granularity().rollup_strategy()
    }
}

/// Per-bucket statistic emitted in a KPI table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatColumn {
    Trips,
    DurationP50,
    DurationP95,
    DurationMean,
    SpeedP50,
    SpeedMean,
    TotalMoney,
    PassengerP50,
    PassengerMean,
    PassengerSum,
    DistanceSum,
    DistanceP50,
    DistanceMean,
}

impl StatColumn {
    pub const ALL: [StatColumn; 13] = [
        StatColumn::Trips,
        StatColumn::DurationP50,
        StatColumn::DurationP95,
        StatColumn::DurationMean,
        StatColumn::SpeedP50,
        StatColumn::SpeedMean,
        StatColumn::TotalMoney,
        StatColumn::PassengerP50,
        StatColumn::PassengerMean,
        StatColumn::PassengerSum,
        StatColumn::DistanceSum,
        StatColumn::DistanceP50,
        StatColumn::DistanceMean,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StatColumn::Trips => "trips",
            StatColumn::DurationP50 => "duration_p50",
            StatColumn::DurationP95 => "duration_p95",
            StatColumn::DurationMean => "duration_mean",
            StatColumn::SpeedP50 => "speed_p50",
            StatColumn::SpeedMean => "speed_mean",
            StatColumn::TotalMoney => "total_money",
            StatColumn::PassengerP50 => "passenger_p50",
            StatColumn::PassengerMean => "passenger_mean",
            StatColumn::PassengerSum => "passenger_sum",
            StatColumn::DistanceSum => "distance_sum",
            StatColumn::DistanceP50 => "distance_p50",
            StatColumn::DistanceMean => "distance_mean",
        }
    }
}

/// One configured KPI table and the stats it emits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiTableSpec {
    pub table: KpiTable,
    pub stats: Vec<StatColumn>,
}

impl KpiTableSpec {
    /// Table emitting every stat column
    pub fn new(table: KpiTable) -> Self {
        Self {
            table,
            stats: StatColumn::ALL.to_vec(),
        }
    }

    pub fn with_stats(mut self, stats: Vec<StatColumn>) -> Self {
        self.stats = stats;
        self
    }

    /// All seven tables with the full stat set
    pub fn defaults() -> Vec<Self> {
        KpiTable::ALL.iter().copied().map(Self::new).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn calendar(ts: &str) -> CalendarFields {
        let ts = NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").unwrap();
        CalendarFields::from_timestamp(&ts)
    }

    #[test]
    fn test_week_key_separates_iso_years() {
        // 2019-12-30 is ISO week 1 of 2020; 2019-01-02 is ISO week 1 of 2019
        let late = Granularity::Weekly.bucket_of(&calendar("2019-12-30 10:00:00"));
        let early = Granularity::Weekly.bucket_of(&calendar("2019-01-02 10:00:00"));
        assert_ne!(late, early);
        assert_eq!(
            late,
            BucketKey::Week {
                iso_year: 2020,
                week: 1,
                week_start: NaiveDate::from_ymd_opt(2019, 12, 30).unwrap(),
            }
        );
    }

    #[test]
    fn test_hourly_bucket_keeps_date() {
        let key = Granularity::Hourly.bucket_of(&calendar("2019-03-10 23:15:00"));
        assert_eq!(
            key,
            BucketKey::Hour {
                date: NaiveDate::from_ymd_opt(2019, 3, 10).unwrap(),
                hour: 23
            }
        );

        // consecutive Mondays share day-of-week and hour but not the bucket
        let first = Granularity::Hourly.bucket_of(&calendar("2019-01-07 08:05:00"));
        let second = Granularity::Hourly.bucket_of(&calendar("2019-01-14 08:10:00"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_negative_zero_dimension_groups_with_zero() {
        let month = BatchMonth::new(2019, 1).unwrap();
        let calendar = calendar("2019-01-07 08:05:00");
        let mut zero = TripRecord::empty();
        zero.payment_type = 0.0;
        let mut negative = TripRecord::empty();
        negative.payment_type = -0.0;

        let table = KpiTable::MonthlyPaymentType;
        let a = table.key_of(&zero, &calendar);
        let b = table.key_of(&negative, &calendar);
        assert_eq!(a, b);
        assert_eq!(a.bucket, BucketKey::Month(month));
        assert!(b.dimension.unwrap().is_sign_positive());
    }

    #[test]
    fn test_rollup_strategies() {
        assert_eq!(KpiTable::Daily.rollup_strategy(), RollupStrategy::Concatenate);
        assert_eq!(KpiTable::Monthly.rollup_strategy(), RollupStrategy::Concatenate);
        assert_eq!(
            KpiTable::MonthlyPickup.rollup_strategy(),
            RollupStrategy::Concatenate
        );
        assert_eq!(KpiTable::Weekly.rollup_strategy(), RollupStrategy::Recombine);
        assert_eq!(KpiTable::Hourly.rollup_strategy(), RollupStrategy::Concatenate);
    }

    #[test]
    fn test_kpi_key_ordering_by_dimension() {
        let month = BucketKey::Month(BatchMonth::new(2019, 1).unwrap());
        let a = KpiKey::new(month, Some(4.0));
        let b = KpiKey::new(month, Some(161.0));
        assert!(a < b);
        assert_eq!(a, KpiKey::new(month, Some(4.0)));
    }

    #[test]
    fn test_default_specs_cover_every_table() {
        let specs = KpiTableSpec::defaults();
        assert_eq!(specs.len(), 7);
        assert!(specs.iter().all(|s| s.stats.len() == StatColumn::ALL.len()));
        assert_eq!(specs[6].table.name(), "monthly_payment_type");
    }
}
