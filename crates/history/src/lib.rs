//! # Perimeter History
//!
//! Persisted history of perimeter computations.
//!
//! ## Layers
//!
//! ```text
//! perimetros.json (JSON array)
//!     │
//!     ├──> RecordStore   load / append in place / batch rewrite / clear
//!     │      └─> HistoryCache   stamp + freshness window, invalidated on write
//!     │
//!     ├──> StatsEngine   totals, min/max/avg, most frequent figure (LRU memo)
//!     │
//!     └──> query         find_by_figure / list_records -> RecordView
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use perimeter_history::{find_by_figure, Record, RecordStore, StatsEngine};
//!
//! let store = RecordStore::new("perimetros.json");
//! store.append(Record::new("circulo", 6.28, [("radio", 1.0)]))?;
//!
//! let history = store.read_through();
//! let stats = StatsEngine::default().summarize(&history);
//! println!("{} records, most frequent: {:?}", stats.total, stats.most_frequent_figure);
//! println!("{:?}", find_by_figure(&history, "Circulo"));
//! # Ok::<(), perimeter_history::HistoryError>(())
//! ```

mod cache;
mod config;
mod error;
mod query;
mod record;
mod stats;
mod store;
mod writer;

pub use cache::{CacheStats, FileStamp, HistoryCache, DEFAULT_FRESHNESS};
pub use config::{
    HistoryConfig, DEFAULT_HISTORY_FILE, ENV_CACHE_TTL_SECS, ENV_HISTORY_PATH, ENV_MEMO_CAPACITY,
};
pub use error::{HistoryError, Result};
pub use query::{
    find_by_figure, find_by_figure_in_json, list_records, RecordView, MISSING_FIELD,
    MISSING_TIMESTAMP,
};
pub use record::{format_timestamp, now_timestamp, Fingerprint, History, Record, TIMESTAMP_FORMAT};
pub use stats::{aggregate, AggregateSnapshot, FigureCount, MemoStats, StatsEngine};
pub use store::{load_history, LoadReport, RecordStore, DEFAULT_COMPACT_THRESHOLD};
pub use writer::{encode_history, Layout};
