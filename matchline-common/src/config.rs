//! Configuration loading
//!
//! Resolution priority for every setting: environment variable, then TOML
//! config file, then compiled default. When a key is present in more than
//! one source a warning is logged and the higher-priority source wins.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default id-batch size for chunked usage-row fetches
pub const DEFAULT_CHUNK_SIZE: usize = 100;
/// Default minimum population for cohort generation
pub const DEFAULT_MIN_POPULATION: usize = 3;
/// Default minimum distinct profiles per date for cohort generation
pub const DEFAULT_MIN_DATE_SAMPLE: usize = 3;
/// Default birth-date drift threshold (days) for identity-mismatch warnings.
/// Tunable heuristic, not a domain law.
pub const DEFAULT_IDENTITY_DRIFT_DAYS: i64 = 366;

/// Raw TOML file shape; every key optional
#[derive(Debug, Clone, Default, Deserialize)]
struct TomlConfig {
    database_path: Option<String>,
    cohort_chunk_size: Option<usize>,
    cohort_min_population: Option<usize>,
    cohort_min_date_sample: Option<usize>,
    identity_drift_days: Option<i64>,
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file path
    pub database_path: PathBuf,
    /// Id-batch size for chunked usage fetches during cohort aggregation
    pub cohort_chunk_size: usize,
    /// Minimum matching profiles before a cohort is generated
    pub cohort_min_population: usize,
    /// Minimum distinct profiles sharing a date before that date contributes
    pub cohort_min_date_sample: usize,
    /// Birth-date drift (days) beyond which a cross-account merge is flagged
    pub identity_drift_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("matchline.db"),
            cohort_chunk_size: DEFAULT_CHUNK_SIZE,
            cohort_min_population: DEFAULT_MIN_POPULATION,
            cohort_min_date_sample: DEFAULT_MIN_DATE_SAMPLE,
            identity_drift_days: DEFAULT_IDENTITY_DRIFT_DAYS,
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, with ENV overrides
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let toml_config = match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                toml::from_str::<TomlConfig>(&content)
                    .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))?
            }
            None => TomlConfig::default(),
        };

        let mut config = Config::default();

        config.database_path = resolve_string(
            "MATCHLINE_DATABASE_PATH",
            toml_config.database_path.clone(),
            "database_path",
        )
        .map(PathBuf::from)
        .unwrap_or(config.database_path);

        if let Some(v) = resolve_parsed("MATCHLINE_COHORT_CHUNK_SIZE", toml_config.cohort_chunk_size)? {
            if v == 0 {
                return Err(Error::Config("cohort_chunk_size must be > 0".to_string()));
            }
            config.cohort_chunk_size = v;
        }
        if let Some(v) =
            resolve_parsed("MATCHLINE_COHORT_MIN_POPULATION", toml_config.cohort_min_population)?
        {
            config.cohort_min_population = v;
        }
        if let Some(v) =
            resolve_parsed("MATCHLINE_COHORT_MIN_DATE_SAMPLE", toml_config.cohort_min_date_sample)?
        {
            config.cohort_min_date_sample = v;
        }
        if let Some(v) = resolve_parsed("MATCHLINE_IDENTITY_DRIFT_DAYS", toml_config.identity_drift_days)? {
            config.identity_drift_days = v;
        }

        Ok(config)
    }
}

/// Resolve a string setting: ENV beats TOML
fn resolve_string(env_name: &str, toml_value: Option<String>, key: &str) -> Option<String> {
    let env_value = std::env::var(env_name).ok();
    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} set in both environment and TOML config; using environment",
            key
        );
    }
    env_value.or(toml_value)
}

/// Resolve a parseable setting: ENV beats TOML
fn resolve_parsed<T: std::str::FromStr>(env_name: &str, toml_value: Option<T>) -> Result<Option<T>> {
    match std::env::var(env_name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("Invalid value for {}: {}", env_name, raw))),
        Err(_) => Ok(toml_value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_config_file() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.cohort_chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.cohort_min_population, DEFAULT_MIN_POPULATION);
        assert_eq!(config.identity_drift_days, DEFAULT_IDENTITY_DRIFT_DAYS);
    }

    #[test]
    fn toml_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "database_path = \"/tmp/test.db\"\ncohort_min_population = 5\ncohort_chunk_size = 50"
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/test.db"));
        assert_eq!(config.cohort_min_population, 5);
        assert_eq!(config.cohort_chunk_size, 50);
        // Untouched keys keep defaults
        assert_eq!(config.cohort_min_date_sample, DEFAULT_MIN_DATE_SAMPLE);
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cohort_chunk_size = 0").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }
}
