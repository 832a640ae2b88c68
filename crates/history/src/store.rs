use crate::cache::{CacheStats, HistoryCache};
use crate::config::HistoryConfig;
use crate::error::{json_kind, HistoryError, Result};
use crate::record::{History, Record};
use crate::writer::{append_in_place, encode_history, write_atomic, Layout};
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Batch rewrites switch to the compact layout above this many records.
pub const DEFAULT_COMPACT_THRESHOLD: usize = 100;

/// Outcome of reading the history file.
///
/// A warning means part or all of the file was unusable. For a corrupt file or
/// a non-array root `history` is empty; for individual malformed entries it
/// holds every readable record.
#[derive(Debug)]
pub struct LoadReport {
    pub history: History,
    pub warning: Option<HistoryError>,
}

impl LoadReport {
    pub fn clean(history: History) -> Self {
        Self {
            history,
            warning: None,
        }
    }
}

/// Read the history at `path`. Never fails: a missing or blank file is an empty
/// history, an unreadable or corrupt one is an empty history plus a warning.
pub fn load_history(path: &Path) -> LoadReport {
    match read_entries(path) {
        Ok(entries) => {
            let (history, warning) = History::from_entries(entries);
            if let Some(err) = &warning {
                log::warn!("Partially read history file {}: {err}", path.display());
            }
            LoadReport { history, warning }
        }
        Err(err) => {
            log::warn!("Ignoring history file {}: {err}", path.display());
            LoadReport {
                history: History::new(),
                warning: Some(err),
            }
        }
    }
}

/// Raw elements of the root array.
fn read_entries(path: &Path) -> Result<Vec<Value>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(HistoryError::io("read", path, err)),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let value: Value =
        serde_json::from_slice(&bytes).map_err(|err| HistoryError::parse(err.to_string()))?;
    match value {
        Value::Array(items) => Ok(items),
        other => Err(HistoryError::NotAnArray {
            found: json_kind(&other),
        }),
    }
}

/// Owner of one history file and its read cache.
///
/// Writers are serialized by an internal lock and every write, successful or
/// not, invalidates the cache before returning.
pub struct RecordStore {
    path: PathBuf,
    cache: HistoryCache,
    compact_threshold: usize,
    write_lock: Mutex<()>,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::open(&HistoryConfig::with_path(path))
    }

    pub fn open(config: &HistoryConfig) -> Self {
        Self {
            path: config.history_path.clone(),
            cache: HistoryCache::new(config.freshness),
            compact_threshold: config.compact_threshold,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Uncached read, see [`load_history`].
    pub fn load_report(&self) -> LoadReport {
        load_history(&self.path)
    }

    pub fn load(&self) -> History {
        self.load_report().history
    }

    /// Cached read. The returned history is an independent copy.
    pub fn read_through(&self) -> History {
        self.cache.read_through(&self.path, load_history)
    }

    /// Cached read that also reports why part of the file was not served.
    pub fn read_through_report(&self) -> LoadReport {
        self.cache.read_through_report(&self.path, load_history)
    }

    /// Append one record in place and return it as persisted (with `fecha`).
    pub fn append(&self, record: Record) -> Result<Record> {
        let record = record.stamped();
        let _guard = self.lock_writes();
        let outcome = append_in_place(&self.path, &record);
        self.cache.invalidate();
        outcome?;
        log::info!(
            "Recorded {} in {}",
            record.figure_name().unwrap_or("record"),
            self.path.display()
        );
        Ok(record)
    }

    /// Append many records with a single read and a single rewrite.
    /// Returns the number of records added. Existing entries are carried over
    /// as they are on disk, malformed ones included.
    pub fn append_batch(&self, records: Vec<Record>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let records: Vec<Record> = records.into_iter().map(Record::stamped).collect();
        let added = records.len();

        let _guard = self.lock_writes();
        let outcome = self.rewrite_with(records);
        self.cache.invalidate();
        outcome?;
        log::info!("Recorded {added} records in {}", self.path.display());
        Ok(added)
    }

    fn rewrite_with(&self, records: Vec<Record>) -> Result<()> {
        let mut entries = read_entries(&self.path)?;
        for record in records {
            entries.push(serde_json::to_value(record)?);
        }
        let layout = Layout::for_len(entries.len(), self.compact_threshold);
        let bytes = encode_history(&entries, layout)?;
        write_atomic(&self.path, &bytes)
    }

    /// Delete the history file. Returns whether a file existed.
    pub fn clear(&self) -> Result<bool> {
        let _guard = self.lock_writes();
        let outcome = match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(HistoryError::io("remove", &self.path, err)),
        };
        self.cache.invalidate();
        if let Ok(true) = outcome {
            log::info!("Cleared history {}", self.path.display());
        }
        outcome
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_cached()
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
