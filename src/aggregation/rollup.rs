//! Cross-batch merge of per-batch KPI rows into year-level tables.
//!
//! Rows from all batches are grouped by `KpiKey`. A key seen in a single
//! batch passes through unchanged; a key seen in several batches (weeks
//! straddling a month boundary) is recombined.

use super::engine::{BatchAggregates, BucketRow};
use super::granularity::{KpiKey, KpiTable, KpiTableSpec};
use super::statistics::{mean, BucketStats};
use crate::error::{Result, TripError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// How rows of one granularity are merged across batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollupStrategy {
    /// Buckets never span batches
    Concatenate,
    /// Buckets may span batches and duplicate keys are recombined
    Recombine,
}

/// Year-level denominators for share-of-total columns
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct YearTotals {
    pub trips: u64,
    pub total_money: f64,
}

impl YearTotals {
    /// Totals over the merged monthly table
    pub fn from_monthly(rows: &[BucketRow]) -> Self {
        rows.iter().fold(Self::default(), |acc, row| Self {
            trips: acc.trips + row.stats.trips,
            total_money: acc.total_money + row.stats.total_money,
        })
    }

    pub fn trip_pct(&self, trips: u64) -> f64 {
        if self.trips == 0 {
            0.0
        } else {
            100.0 * trips as f64 / self.trips as f64
        }
    }

    pub fn money_pct(&self, money: f64) -> f64 {
        if self.total_money == 0.0 {
            0.0
        } else {
            100.0 * money / self.total_money
        }
    }
}

/// Final KPI table row with share-of-year columns
#[derive(Debug, Clone, PartialEq)]
pub struct KpiRow {
    pub key: KpiKey,
    pub stats: BucketStats,
    pub trip_pct: f64,
    pub money_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KpiTableOutput {
    pub spec: KpiTableSpec,
    pub rows: Vec<KpiRow>,
}

/// Year-level KPI tables in configured order
#[derive(Debug, Clone, PartialEq)]
pub struct KpiReport {
    pub year: i32,
    pub totals: YearTotals,
    pub tables: Vec<KpiTableOutput>,
}

impl KpiReport {
    pub fn table(&self, table: KpiTable) -> Option<&KpiTableOutput> {
        self.tables.iter().find(|t| t.spec.table == table)
    }
}

/// Recombine per-batch stats of one bucket.
///
/// Additive fields are summed and every other field is the mean of the
/// batch values, except `passenger_mean` and `distance_mean`, which are
/// re-derived as sum / trips.
pub fn recombine(parts: &[&BucketStats]) -> BucketStats {
    let trips: u64 = parts.iter().map(|s| s.trips).sum();
    let total = |f: fn(&BucketStats) -> f64| -> f64 { parts.iter().map(|s| f(s)).sum() };
    let averaged = |f: fn(&BucketStats) -> f64| -> f64 {
        let values: Vec<f64> = parts.iter().map(|s| f(s)).collect();
        mean(&values)
    };

    let passenger_sum = total(|s| s.passenger_sum);
    let distance_sum = total(|s| s.distance_sum);
    let per_trip = |sum: f64| {
        if trips == 0 {
            f64::NAN
        } else {
            sum / trips as f64
        }
    };

    BucketStats {
        trips,
        duration_p50: averaged(|s| s.duration_p50),
        duration_p95: averaged(|s| s.duration_p95),
        duration_mean: averaged(|s| s.duration_mean),
        speed_p50: averaged(|s| s.speed_p50),
        speed_mean: averaged(|s| s.speed_mean),
        total_money: total(|s| s.total_money),
        passenger_p50: averaged(|s| s.passenger_p50),
        passenger_mean: per_trip(passenger_sum),
        passenger_sum,
        distance_sum,
        distance_p50: averaged(|s| s.distance_p50),
        distance_mean: per_trip(distance_sum),
    }
}

/// Merge rows of one table from every batch, sorted by key
pub fn merge_table<'a>(
    table: KpiTable,
    batches: impl IntoIterator<Item = &'a BucketRow>,
) -> Vec<BucketRow> {
    let mut groups: BTreeMap<KpiKey, Vec<&BucketStats>> = BTreeMap::new();
    for row in batches {
        groups.entry(row.key).or_default().push(&row.stats);
    }

    let strategy = table.rollup_strategy();
    groups
        .into_iter()
        .map(|(key, parts)| {
            let stats = if parts.len() == 1 {
                parts[0].clone()
            } else {
                if strategy == RollupStrategy::Concatenate {
                    warn!(
                        "Table {}: bucket {:?} reported by {} batches, recombining",
                        table.name(),
                        key,
                        parts.len()
                    );
                }
                recombine(&parts)
            };
            BucketRow { key, stats }
        })
        .collect()
}

/// Builds the year-level report from per-batch aggregates
#[derive(Debug, Clone)]
pub struct KpiMerger {
    specs: Vec<KpiTableSpec>,
}

impl KpiMerger {
    pub fn new(specs: Vec<KpiTableSpec>) -> Self {
        Self { specs }
    }

    pub fn merge(&self, year: i32, batches: &[BatchAggregates]) -> Result<KpiReport> {
        let mut merged: Vec<(KpiTableSpec, Vec<BucketRow>)> = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            let rows = merge_table(
                spec.table,
                batches
                    .iter()
                    .filter_map(|b| b.table(spec.table))
                    .flatten(),
            );
            debug!("Merged table {}: {} rows", spec.table.name(), rows.len());
            merged.push((spec.clone(), rows));
        }

        let monthly = merged
            .iter()
            .find(|(spec, _)| spec.table == KpiTable::Monthly)
            .map(|(_, rows)| rows.as_slice())
            .ok_or_else(|| {
                TripError::configuration("monthly KPI table is required for year totals")
            })?;
        let totals = YearTotals::from_monthly(monthly);
        info!(
            "Year {} totals: {} trips, {:.2} total money",
            year, totals.trips, totals.total_money
        );

        let tables = merged
            .into_iter()
            .map(|(spec, rows)| KpiTableOutput {
                spec,
                rows: rows
                    .into_iter()
                    .map(|row| KpiRow {
                        trip_pct: totals.trip_pct(row.stats.trips),
                        money_pct: totals.money_pct(row.stats.total_money),
                        key: row.key,
                        stats: row.stats,
                    })
                    .collect(),
            })
            .collect();

        Ok(KpiReport {
            year,
            totals,
            tables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::engine::TableAggregate;
    use crate::aggregation::granularity::BucketKey;
    use crate::models::BatchMonth;
    use chrono::NaiveDate;

    fn stats(trips: u64, p50: f64, passenger_sum: f64, distance_sum: f64) -> BucketStats {
        BucketStats {
            trips,
            duration_p50: p50,
            duration_p95: p50 * 2.0,
            duration_mean: p50,
            speed_p50: 10.0,
            speed_mean: 10.0,
            total_money: trips as f64 * 10.0,
            passenger_p50: 1.0,
            passenger_mean: passenger_sum / trips as f64,
            passenger_sum,
            distance_sum,
            distance_p50: 2.0,
            distance_mean: distance_sum / trips as f64,
        }
    }

    fn week_key() -> KpiKey {
        KpiKey::new(
            BucketKey::Week {
                iso_year: 2019,
                week: 5,
                week_start: NaiveDate::from_ymd_opt(2019, 1, 28).unwrap(),
            },
            None,
        )
    }

    #[test]
    fn test_recombine_sums_and_means() {
        let a = stats(10, 10.0, 10.0, 20.0);
        let b = stats(30, 20.0, 60.0, 120.0);

        let combined = recombine(&[&a, &b]);
        assert_eq!(combined.trips, 40);
        assert_eq!(combined.total_money, 400.0);
        assert_eq!(combined.duration_p50, 15.0);
        assert_eq!(combined.duration_p95, 30.0);
        assert_eq!(combined.passenger_sum, 70.0);
        // re-derived, not the mean of 1.0 and 2.0
        assert_eq!(combined.passenger_mean, 70.0 / 40.0);
        assert_eq!(combined.distance_mean, 140.0 / 40.0);
    }

    #[test]
    fn test_week_spanning_two_batches_counts_once() {
        let january = BucketRow {
            key: week_key(),
            stats: stats(10, 12.0, 10.0, 20.0),
        };
        let february = BucketRow {
            key: week_key(),
            stats: stats(10, 14.0, 10.0, 20.0),
        };

        let merged = merge_table(KpiTable::Weekly, [&january, &february]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].stats.trips, 20);
    }

    #[test]
    fn test_singleton_groups_pass_through() {
        let row = BucketRow {
            key: week_key(),
            stats: stats(7, 9.0, 8.0, 11.0),
        };
        let merged = merge_table(KpiTable::Weekly, [&row]);
        assert_eq!(merged, vec![row]);
    }

    #[test]
    fn test_year_totals_zero_denominator() {
        let totals = YearTotals::default();
        assert_eq!(totals.trip_pct(5), 0.0);
        assert_eq!(totals.money_pct(5.0), 0.0);
    }

    #[test]
    fn test_merge_requires_monthly_table() {
        let merger = KpiMerger::new(vec![KpiTableSpec::new(KpiTable::Daily)]);
        assert!(matches!(
            merger.merge(2019, &[]),
            Err(TripError::Configuration { .. })
        ));
    }

    #[test]
    fn test_monthly_trip_pct_sums_to_hundred() {
        let month = |m| KpiKey::new(BucketKey::Month(BatchMonth::new(2019, m).unwrap()), None);
        let batches: Vec<BatchAggregates> = [(1, 30), (2, 50), (3, 20)]
            .into_iter()
            .map(|(m, trips)| BatchAggregates {
                month: BatchMonth::new(2019, m).unwrap(),
                tables: vec![TableAggregate {
                    table: KpiTable::Monthly,
                    rows: vec![BucketRow {
                        key: month(m),
                        stats: stats(trips, 10.0, trips as f64, trips as f64),
                    }],
                }],
            })
            .collect();

        let merger = KpiMerger::new(vec![KpiTableSpec::new(KpiTable::Monthly)]);
        let report = merger.merge(2019, &batches).unwrap();
        let monthly = report.table(KpiTable::Monthly).unwrap();

        assert_eq!(report.totals.trips, 100);
        assert_eq!(monthly.rows[1].trip_pct, 50.0);
        let pct_sum: f64 = monthly.rows.iter().map(|r| r.trip_pct).sum();
        assert!((pct_sum - 100.0).abs() < 1e-9);
        let money_sum: f64 = monthly.rows.iter().map(|r| r.money_pct).sum();
        assert!((money_sum - 100.0).abs() < 1e-9);
    }
}
