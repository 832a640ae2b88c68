use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HistoryError>;

/// Failures at the history store boundary.
///
/// `Parse` and `NotAnArray` are recoverable on read: the store logs them and
/// serves an empty history. On write they refuse the operation so a corrupt
/// file is never extended or overwritten. `SkippedEntries` is only ever a read
/// warning: the readable records are still served and writes go ahead.
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("History file is not valid JSON: {0}")]
    Parse(String),

    #[error("History root must be a JSON array, found {found}")]
    NotAnArray { found: &'static str },

    #[error("Skipped {skipped} malformed history entries (first: {first})")]
    SkippedEntries { skipped: usize, first: String },

    #[error("Cannot {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl HistoryError {
    pub fn io(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Content-level corruption (bad JSON or wrong root shape).
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::NotAnArray { .. })
    }
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
