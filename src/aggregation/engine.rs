//! Per-batch KPI aggregation.
//!
//! One engine serves every KPI table: each configured `KpiTableSpec`
//! supplies the bucket key and dimension, and trips are grouped and
//! reduced the same way for all of them.

use super::granularity::{KpiKey, KpiTable, KpiTableSpec};
use super::statistics::{BucketAccumulator, BucketStats};
use crate::models::{BatchMonth, CleanTrip};
use std::collections::BTreeMap;
use tracing::debug;

/// Aggregated bucket from a single batch
#[derive(Debug, Clone, PartialEq)]
pub struct BucketRow {
    pub key: KpiKey,
    pub stats: BucketStats,
}

/// Rows of one KPI table for one batch, sorted by key
#[derive(Debug, Clone, PartialEq)]
pub struct TableAggregate {
    pub table: KpiTable,
    pub rows: Vec<BucketRow>,
}

/// All KPI tables computed for one batch, held until the merge
#[derive(Debug, Clone, PartialEq)]
pub struct BatchAggregates {
    pub month: BatchMonth,
    pub tables: Vec<TableAggregate>,
}

impl BatchAggregates {
    pub fn table(&self, table: KpiTable) -> Option<&[BucketRow]> {
        self.tables
            .iter()
            .find(|t| t.table == table)
            .map(|t| t.rows.as_slice())
    }
}

/// Groups clean trips into KPI buckets for each configured table
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    specs: Vec<KpiTableSpec>,
}

impl AggregationEngine {
    pub fn new(specs: Vec<KpiTableSpec>) -> Self {
        Self { specs }
    }

    /// Aggregate one batch of clean trips into every configured table
    pub fn aggregate(&self, month: BatchMonth, trips: &[CleanTrip]) -> BatchAggregates {
        let tables = self
            .specs
            .iter()
            .map(|spec| {
                let rows = aggregate_table(spec.table, trips);
                debug!(
                    "{}: {} buckets in table {}",
                    month,
                    rows.len(),
                    spec.table.name()
                );
                TableAggregate {
                    table: spec.table,
                    rows,
                }
            })
            .collect();

        BatchAggregates { month, tables }
    }
}

/// Group trips by the table's key and reduce each group
pub fn aggregate_table(table: KpiTable, trips: &[CleanTrip]) -> Vec<BucketRow> {
    let mut buckets: BTreeMap<KpiKey, BucketAccumulator> = BTreeMap::new();

    for trip in trips {
        let key = table.key_of(trip.record(), trip.calendar());
        buckets.entry(key).or_default().push(trip.record());
    }

    buckets
        .into_iter()
        .map(|(key, acc)| BucketRow {
            key,
            stats: acc.finish(),
        })
        .collect()
}
