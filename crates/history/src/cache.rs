use crate::record::History;
use crate::store::LoadReport;
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant, UNIX_EPOCH};

pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(60);

/// Version marker of the history file on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub modified_ms: u64,
    pub len: u64,
}

impl FileStamp {
    /// `None` when the file does not exist or cannot be inspected.
    pub fn probe(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        let modified_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        Some(Self {
            modified_ms,
            len: meta.len(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Staleness {
    Fresh,
    Expired,
    FileChanged,
    /// The file went away or moved back in time behind our back.
    Diverged,
}

struct CacheEntry {
    history: History,
    captured_at: Instant,
    stamp: Option<FileStamp>,
}

impl CacheEntry {
    fn assess(&self, current: Option<FileStamp>, freshness: Duration) -> Staleness {
        match (self.stamp, current) {
            (Some(_), None) => return Staleness::Diverged,
            (Some(old), Some(new)) if new.modified_ms < old.modified_ms => {
                return Staleness::Diverged
            }
            (old, new) if old != new => return Staleness::FileChanged,
            _ => {}
        }
        if self.captured_at.elapsed() >= freshness {
            return Staleness::Expired;
        }
        Staleness::Fresh
    }
}

#[derive(Default)]
struct CacheState {
    entry: Option<CacheEntry>,
    stats: CacheStats,
}

/// Process-local snapshot of one history file.
///
/// A snapshot is served while the file stamp is unchanged and it is younger
/// than the freshness window. Check, load and replace happen under one lock.
pub struct HistoryCache {
    freshness: Duration,
    state: Mutex<CacheState>,
}

impl HistoryCache {
    pub fn new(freshness: Duration) -> Self {
        Self {
            freshness,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Serve a copy of the cached history, or load it with `load` and cache it.
    /// Loads that reported a warning are returned but not cached.
    pub fn read_through<F>(&self, path: &Path, load: F) -> History
    where
        F: FnOnce(&Path) -> LoadReport,
    {
        self.read_through_report(path, load).history
    }

    /// [`HistoryCache::read_through`] keeping the load warning. A cache hit is
    /// always clean.
    pub fn read_through_report<F>(&self, path: &Path, load: F) -> LoadReport
    where
        F: FnOnce(&Path) -> LoadReport,
    {
        let mut state = self.lock();
        let current = FileStamp::probe(path);

        let verdict = state
            .entry
            .as_ref()
            .map(|entry| entry.assess(current, self.freshness));
        match verdict {
            Some(Staleness::Fresh) => {
                state.stats.hits += 1;
                log::debug!("History cache hit for {}", path.display());
                if let Some(entry) = &state.entry {
                    return LoadReport::clean(entry.history.clone());
                }
            }
            Some(Staleness::Diverged) => {
                log::warn!(
                    "History cache diverged from {}; reloading from disk",
                    path.display()
                );
            }
            Some(reason) => {
                log::debug!("History cache {reason:?} for {}", path.display());
            }
            None => {}
        }

        state.entry = None;
        state.stats.misses += 1;

        let report = load(path);
        if report.warning.is_none() {
            state.entry = Some(CacheEntry {
                history: report.history.clone(),
                captured_at: Instant::now(),
                stamp: current,
            });
        }
        report
    }

    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.entry = None;
        state.stats.invalidations += 1;
    }

    pub fn is_cached(&self) -> bool {
        self.lock().entry.is_some()
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            log::warn!("History cache lock poisoned; dropping cached snapshot");
            let mut guard = poisoned.into_inner();
            guard.entry = None;
            self.state.clear_poison();
            guard
        })
    }
}

impl Default for HistoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_FRESHNESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn loader(calls: &Cell<u32>) -> impl Fn(&Path) -> LoadReport + '_ {
        move |_: &Path| {
            calls.set(calls.get() + 1);
            LoadReport::clean(History::from(vec![Record::new(
                "circulo",
                6.28,
                [("radio", 1.0)],
            )]))
        }
    }

    #[test]
    fn second_read_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.json");
        std::fs::write(&path, "[]").unwrap();

        let cache = HistoryCache::new(Duration::from_secs(60));
        let calls = Cell::new(0);
        let first = cache.read_through(&path, loader(&calls));
        let second = cache.read_through(&path, loader(&calls));

        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                invalidations: 0
            }
        );
    }

    #[test]
    fn returned_history_is_a_copy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.json");

        let cache = HistoryCache::default();
        let calls = Cell::new(0);
        let mut copy = cache.read_through(&path, loader(&calls));
        copy.push(Record::new("cuadrado", 4.0, [("lado", 1.0)]));

        let again = cache.read_through(&path, loader(&calls));
        assert_eq!(again.len(), 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn zero_window_always_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.json");

        let cache = HistoryCache::new(Duration::ZERO);
        let calls = Cell::new(0);
        cache.read_through(&path, loader(&calls));
        cache.read_through(&path, loader(&calls));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn file_change_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.json");
        std::fs::write(&path, "[]").unwrap();

        let cache = HistoryCache::default();
        let calls = Cell::new(0);
        cache.read_through(&path, loader(&calls));

        std::fs::write(&path, "[ ]\n").unwrap();
        cache.read_through(&path, loader(&calls));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn vanished_file_forces_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.json");
        std::fs::write(&path, "[]").unwrap();

        let cache = HistoryCache::default();
        let calls = Cell::new(0);
        cache.read_through(&path, loader(&calls));
        std::fs::remove_file(&path).unwrap();
        cache.read_through(&path, loader(&calls));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn warnings_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.json");

        let cache = HistoryCache::default();
        let report = cache.read_through_report(&path, |_: &Path| LoadReport {
            history: History::new(),
            warning: Some(crate::HistoryError::parse("bad")),
        });
        assert!(report.history.is_empty());
        assert!(report.warning.is_some());
        assert!(!cache.is_cached());

        let calls = Cell::new(0);
        cache.read_through(&path, loader(&calls));
        let hit = cache.read_through_report(&path, loader(&calls));
        assert!(hit.warning.is_none());
        assert_eq!(hit.history.len(), 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn invalidate_drops_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.json");

        let cache = HistoryCache::default();
        let calls = Cell::new(0);
        cache.read_through(&path, loader(&calls));
        assert!(cache.is_cached());

        cache.invalidate();
        assert!(!cache.is_cached());
        cache.read_through(&path, loader(&calls));
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.stats().invalidations, 1);
    }
}
