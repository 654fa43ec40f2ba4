//! Cleaning stage for monthly trip batches.
//!
//! # Architecture
//!
//! - [`normalizer`] - Type coercion, derived fields, imputation
//! - [`quality_rules`] - The thirteen row-level quality rules
//! - [`deduplication`] - Exact-duplicate detection within a batch
//! - [`stats`] - Per-rule failure tallies and the QA batch summary
//! - [`processor`] - `BatchCleaner`, combining rules and dedup
//!
//! Records flow normalizer → quality rules → dedup. Only clean trips and
//! the QA summary leave this module; per-row verdicts never do.

pub mod deduplication;
pub mod normalizer;
pub mod processor;
pub mod quality_rules;
pub mod stats;

#[cfg(test)]
pub mod tests;

pub use normalizer::RecordNormalizer;
pub use processor::{BatchCleaner, CleanedBatch};
pub use quality_rules::{QaRule, QualityRuleEngine, QualityVerdict};
pub use stats::QaBatchSummary;
