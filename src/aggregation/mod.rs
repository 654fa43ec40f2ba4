//! KPI aggregation: per-batch bucketing and the cross-batch rollup.

pub mod engine;
pub mod granularity;
pub mod rollup;
pub mod statistics;

pub use engine::{AggregationEngine, BatchAggregates, BucketRow};
pub use granularity::{KpiKey, KpiTable, KpiTableSpec, StatColumn};
pub use rollup::{KpiMerger, KpiReport, KpiRow, RollupStrategy, YearTotals};
