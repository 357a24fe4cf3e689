//! # Matchline Cohort
//!
//! Offline batch job that synthesizes statistically-aggregated "average"
//! profiles from populations of real profiles. Each cohort definition
//! yields one synthetic profile (flagged `computed`), its daily usage
//! series, and a meta rollup, regenerated destructively on every run under
//! small-sample safety thresholds.

pub mod aggregator;
pub mod db;
pub mod stats;

pub use aggregator::{BatchSummary, CohortAggregator, CohortConfig, CohortOutcome};
