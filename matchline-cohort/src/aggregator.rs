//! Cohort Aggregator
//!
//! Builds one synthetic "average member" profile per cohort definition.
//! Population and per-date sample floors are privacy guards: an average of
//! one or two people is not an aggregate, it is identifying. Regeneration
//! is destructive-then-recreate; an incremental diff could retain stale
//! rows that no longer meet the sample floor.

use crate::db;
use crate::stats::{mean_count, median_rate};
use chrono::NaiveDate;
use matchline_common::config::{
    Config, DEFAULT_CHUNK_SIZE, DEFAULT_MIN_DATE_SAMPLE, DEFAULT_MIN_POPULATION,
};
use matchline_common::db::models::{CohortDefinition, DailyUsage};
use matchline_common::{metrics, Error, Result};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

/// Aggregation thresholds and batching
#[derive(Debug, Clone)]
pub struct CohortConfig {
    /// Id-batch size for chunked usage fetches
    pub chunk_size: usize,
    /// Minimum matching profiles before a cohort is generated
    pub min_population: usize,
    /// Minimum distinct profiles sharing a date before it contributes
    pub min_date_sample: usize,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            min_population: DEFAULT_MIN_POPULATION,
            min_date_sample: DEFAULT_MIN_DATE_SAMPLE,
        }
    }
}

impl From<&Config> for CohortConfig {
    fn from(config: &Config) -> Self {
        Self {
            chunk_size: config.cohort_chunk_size,
            min_population: config.cohort_min_population,
            min_date_sample: config.cohort_min_date_sample,
        }
    }
}

/// Result of generating one cohort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortOutcome {
    pub success: bool,
    pub usage_days_written: usize,
    /// Present when the cohort was skipped
    pub reason: Option<String>,
}

/// End-of-run accounting for a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Cohort aggregation service
pub struct CohortAggregator {
    db: SqlitePool,
    config: CohortConfig,
}

impl CohortAggregator {
    pub fn new(db: SqlitePool, config: CohortConfig) -> Self {
        Self { db, config }
    }

    /// Generate (or fully regenerate) one cohort's synthetic profile.
    ///
    /// A skip (insufficient population, no qualifying dates) is a
    /// successful call with `success = false`; only store failures are
    /// errors.
    pub async fn generate_cohort_profile(&self, cohort_guid: &str) -> Result<CohortOutcome> {
        let cohort = db::get_cohort(&self.db, cohort_guid)
            .await?
            .ok_or_else(|| Error::NotFound(format!("cohort definition {}", cohort_guid)))?;

        let population = db::query_population(&self.db, &cohort).await?;
        if population.len() < self.config.min_population {
            let reason = format!(
                "population {} below minimum {}",
                population.len(),
                self.config.min_population
            );
            tracing::info!(cohort = %cohort.name, %reason, "Skipping cohort");
            return Ok(CohortOutcome {
                success: false,
                usage_days_written: 0,
                reason: Some(reason),
            });
        }

        // Fetch the population's usage rows in fixed-size id batches
        let mut rows: Vec<DailyUsage> = Vec::new();
        for chunk in population.chunks(self.config.chunk_size) {
            rows.extend(db::fetch_usage_chunk(&self.db, chunk).await?);
        }

        let synthetic_rows = self.synthesize_rows(&cohort, &rows);
        if synthetic_rows.is_empty() {
            let reason = format!(
                "no date shared by at least {} profiles",
                self.config.min_date_sample
            );
            tracing::info!(cohort = %cohort.name, %reason, "Skipping cohort");
            return Ok(CohortOutcome {
                success: false,
                usage_days_written: 0,
                reason: Some(reason),
            });
        }

        // Destructive regeneration: prior synthetic rows vanish with their
        // profile, then everything is inserted fresh
        db::delete_synthetic_profile(&self.db, &cohort).await?;

        let first_day = synthetic_rows.first().map(|r| r.date);
        let last_day = synthetic_rows.last().map(|r| r.date);
        let profile_guid =
            db::insert_synthetic_profile(&self.db, &cohort, first_day, last_day).await?;

        let mut bound_rows = Vec::with_capacity(synthetic_rows.len());
        for mut row in synthetic_rows {
            row.profile_guid = profile_guid.clone();
            db::insert_synthetic_usage(&self.db, &row).await?;
            bound_rows.push(row);
        }

        // Meta rollup last, from the same rows that were just written
        let rollup = metrics::rollup(&bound_rows);
        db::insert_synthetic_meta(&self.db, &profile_guid, &rollup).await?;
        db::update_cohort_cache(&self.db, &cohort.guid, population.len() as i64).await?;

        tracing::info!(
            cohort = %cohort.name,
            population = population.len(),
            usage_days = bound_rows.len(),
            "Generated cohort profile"
        );

        Ok(CohortOutcome {
            success: true,
            usage_days_written: bound_rows.len(),
            reason: None,
        })
    }

    /// Per-date synthesis: group the population's rows by calendar date,
    /// drop dates below the sample floor, then take means for counts and
    /// medians for rates.
    fn synthesize_rows(&self, cohort: &CohortDefinition, rows: &[DailyUsage]) -> Vec<DailyUsage> {
        let mut by_date: BTreeMap<NaiveDate, Vec<&DailyUsage>> = BTreeMap::new();
        for row in rows {
            by_date.entry(row.date).or_default().push(row);
        }

        let mut synthetic = Vec::new();
        for (date, members) in by_date {
            // Rows are unique per (profile, date), so the member count is
            // the distinct-profile count
            if members.len() < self.config.min_date_sample {
                tracing::debug!(
                    cohort = %cohort.name,
                    %date,
                    sample = members.len(),
                    "Dropping sparse date"
                );
                continue;
            }

            let count =
                |f: fn(&DailyUsage) -> i64| -> i64 {
                    mean_count(&members.iter().map(|m| f(m)).collect::<Vec<_>>()).unwrap_or(0)
                };
            let rate = |f: fn(&DailyUsage) -> Option<f64>| -> Option<f64> {
                median_rate(&members.iter().map(|m| f(m)).collect::<Vec<_>>())
            };

            synthetic.push(DailyUsage {
                profile_guid: String::new(),
                date,
                app_opens: count(|m| m.app_opens),
                swipe_likes: count(|m| m.swipe_likes),
                swipe_passes: count(|m| m.swipe_passes),
                super_likes: count(|m| m.super_likes),
                matches: count(|m| m.matches),
                messages_sent: count(|m| m.messages_sent),
                messages_received: count(|m| m.messages_received),
                like_rate: rate(|m| m.like_rate),
                match_rate: rate(|m| m.match_rate),
                response_rate: rate(|m| m.response_rate),
                engagement_rate: rate(|m| m.engagement_rate),
            });
        }
        synthetic
    }

    /// Generate every cohort definition, isolating failures per cohort: one
    /// bad cohort never aborts the batch.
    pub async fn run_batch(&self) -> Result<BatchSummary> {
        let cohorts = db::list_cohorts(&self.db).await?;
        let mut summary = BatchSummary::default();

        for cohort in &cohorts {
            match self.generate_cohort_profile(&cohort.guid).await {
                Ok(outcome) if outcome.success => summary.generated += 1,
                Ok(_) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        cohort = %cohort.name,
                        error = %e,
                        "Cohort generation failed"
                    );
                }
            }
        }

        tracing::info!(
            total = cohorts.len(),
            generated = summary.generated,
            skipped = summary.skipped,
            failed = summary.failed,
            "Cohort batch complete"
        );

        Ok(summary)
    }
}
