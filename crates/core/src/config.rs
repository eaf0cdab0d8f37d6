//! Configuration structures for the flowsignal system.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the reporting system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Trailing window configuration.
    pub window: WindowConfig,
    /// Fundamentals filter and signal classifier configuration.
    pub classifier: ClassifierConfig,
    /// Source store configuration.
    pub store: StoreConfig,
    /// Caller-side report cache configuration.
    pub cache: CacheConfig,
}

impl Config {
    /// Load configuration from a JSON file. Missing sections take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if self.window.lookback_days <= 0 {
            return Err(Error::config("window.lookback_days must be positive"));
        }
        if self.window.targeted_lookback_days <= 0 {
            return Err(Error::config("window.targeted_lookback_days must be positive"));
        }
        if self.window.ma_period == 0 {
            return Err(Error::config("window.ma_period must be at least 1"));
        }
        if !self.classifier.min_total_mv.is_finite() || self.classifier.min_total_mv < 0.0 {
            return Err(Error::config("classifier.min_total_mv must be a non-negative number"));
        }
        if !self.classifier.capital_flight_threshold.is_finite() {
            return Err(Error::config("classifier.capital_flight_threshold must be finite"));
        }
        Ok(())
    }
}

/// Trailing window configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Calendar days loaded before the end date for the bulk report.
    pub lookback_days: i64,
    /// Calendar days loaded for the targeted (per-code) path.
    pub targeted_lookback_days: i64,
    /// Moving average period, in observations.
    pub ma_period: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            lookback_days: 60,
            targeted_lookback_days: 60,
            ma_period: 20,
        }
    }
}

/// Fundamentals filter and classifier thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Name substring marking special-treatment instruments.
    pub special_treatment_marker: String,
    /// Minimum total market value; smaller (but positive) caps are blacklisted.
    pub min_total_mv: f64,
    /// Financing surge ratio below which capital flight is flagged.
    pub capital_flight_threshold: f64,
    /// Multiplier turning the financing surge ratio into the surge score.
    pub surge_score_scale: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            special_treatment_marker: "ST".to_string(),
            min_total_mv: 2_000_000_000.0,
            capital_flight_threshold: -0.003,
            surge_score_scale: 1000.0,
        }
    }
}

/// Embedded store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Sqlite,
    DuckDb,
}

/// Source store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Which backend to open.
    pub backend: StoreBackend,
    /// Database file path.
    pub path: PathBuf,
    /// How long a SQLite read waits on a locked database before failing.
    /// DuckDB fails at once.
    pub busy_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: PathBuf::from("stock_data.db"),
            busy_timeout_secs: 30,
        }
    }
}

impl StoreConfig {
    /// Build a store configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build a store configuration from a variable lookup.
    ///
    /// `DATABASE_URL` (or `POSTGRES_URL`) wins when set; otherwise
    /// `DUCKDB_PATH` selects DuckDB and `SQLITE_DB_PATH` SQLite.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = StoreConfig::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("DATABASE_URL").or_else(|| non_empty("POSTGRES_URL")) {
            let (backend, path) = parse_database_url(&url)?;
            config.backend = backend;
            config.path = path;
        } else if let Some(path) = non_empty("DUCKDB_PATH") {
            config.backend = StoreBackend::DuckDb;
            config.path = PathBuf::from(path);
        } else if let Some(path) = non_empty("SQLITE_DB_PATH") {
            config.path = PathBuf::from(path);
        }

        Ok(config)
    }

    /// Credential-free description of the store target.
    pub fn describe(&self) -> String {
        match self.backend {
            StoreBackend::Sqlite => format!("sqlite:///{}", self.path.display()),
            StoreBackend::DuckDb => format!("duckdb:///{}", self.path.display()),
        }
    }
}

fn parse_database_url(url: &str) -> Result<(StoreBackend, PathBuf)> {
    let url = url.trim();
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        return Err(Error::config(
            "networked postgres backend is not linked into this build; use sqlite or duckdb",
        ));
    }
    if let Some(path) = url.strip_prefix("sqlite://") {
        return Ok((StoreBackend::Sqlite, PathBuf::from(path)));
    }
    if let Some(path) = url.strip_prefix("duckdb://") {
        return Ok((StoreBackend::DuckDb, PathBuf::from(path)));
    }
    Err(Error::config(format!(
        "unrecognised database url scheme in {:?}",
        url.split("://").next().unwrap_or_default()
    )))
}

/// Caller-side report cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live of a memoized report, in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}
