use crate::cache::DEFAULT_FRESHNESS;
use crate::error::{HistoryError, Result};
use crate::stats::DEFAULT_MEMO_CAPACITY;
use crate::store::DEFAULT_COMPACT_THRESHOLD;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HISTORY_FILE: &str = "perimetros.json";

pub const ENV_HISTORY_PATH: &str = "PERIMETER_HISTORY";
pub const ENV_CACHE_TTL_SECS: &str = "PERIMETER_CACHE_TTL_SECS";
pub const ENV_MEMO_CAPACITY: &str = "PERIMETER_MEMO_CAPACITY";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryConfig {
    pub history_path: PathBuf,
    /// Maximum age of a cached history snapshot
    pub freshness: Duration,
    /// Entries kept by the statistics memo
    pub memo_capacity: usize,
    /// Batch rewrites above this many records use the compact layout
    pub compact_threshold: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            history_path: PathBuf::from(DEFAULT_HISTORY_FILE),
            freshness: DEFAULT_FRESHNESS,
            memo_capacity: DEFAULT_MEMO_CAPACITY,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
        }
    }
}

/// On-disk TOML shape; every key is optional.
#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    history_path: Option<PathBuf>,
    freshness_secs: Option<u64>,
    memo_capacity: Option<usize>,
    compact_threshold: Option<usize>,
}

impl HistoryConfig {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            history_path: path.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(raw).map_err(|err| HistoryError::Config(err.to_string()))?;
        let mut cfg = Self::default();
        if let Some(path) = file.history_path {
            cfg.history_path = path;
        }
        if let Some(secs) = file.freshness_secs {
            cfg.freshness = Duration::from_secs(secs);
        }
        if let Some(capacity) = file.memo_capacity {
            cfg.memo_capacity = capacity;
        }
        if let Some(threshold) = file.compact_threshold {
            cfg.compact_threshold = threshold;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).map_err(|e| HistoryError::io("read config", path, e))?;
        Self::from_toml_str(&raw)
    }

    /// Overlay `PERIMETER_*` environment variables.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    pub fn apply_vars<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_HISTORY_PATH).filter(|v| !v.trim().is_empty()) {
            self.history_path = PathBuf::from(path.trim());
        }
        if let Some(raw) = lookup(ENV_CACHE_TTL_SECS) {
            self.freshness = Duration::from_secs(parse_var(ENV_CACHE_TTL_SECS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_MEMO_CAPACITY) {
            self.memo_capacity = parse_var(ENV_MEMO_CAPACITY, &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.memo_capacity == 0 {
            return Err(HistoryError::Config(
                "memo_capacity must be at least 1".into(),
            ));
        }
        if self.history_path.as_os_str().is_empty() {
            return Err(HistoryError::Config("history_path must not be empty".into()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|err| HistoryError::Config(format!("{key}={raw:?}: {err}")))
}
