use crate::error::{json_kind, HistoryError, Result};
use crate::record::{History, Record};
use serde::Serialize;
use serde_json::Value;

pub const MISSING_TIMESTAMP: &str = "unknown";
pub const MISSING_FIELD: &str = "N/D";

/// Display-ready projection of a record; absent fields carry a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordView {
    #[serde(rename = "fecha")]
    pub timestamp: String,
    #[serde(rename = "figura")]
    pub figure: String,
    #[serde(rename = "perimetro")]
    pub perimeter: Value,
    #[serde(rename = "parametros")]
    pub parameters: Value,
}

impl From<&Record> for RecordView {
    fn from(record: &Record) -> Self {
        let placeholder = || Value::String(MISSING_FIELD.to_string());
        Self {
            timestamp: record
                .timestamp
                .clone()
                .unwrap_or_else(|| MISSING_TIMESTAMP.to_string()),
            figure: record
                .figure
                .clone()
                .unwrap_or_else(|| MISSING_FIELD.to_string()),
            perimeter: record.perimeter.clone().unwrap_or_else(placeholder),
            parameters: record.parameters.clone().unwrap_or_else(placeholder),
        }
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

fn matches_figure(record: &Record, needle: &str) -> bool {
    record
        .figure_name()
        .is_some_and(|figure| normalize(figure) == needle)
}

/// Records whose figure equals `name`, ignoring case and surrounding whitespace.
/// History order is preserved.
pub fn find_by_figure(history: &History, name: &str) -> Vec<RecordView> {
    let needle = normalize(name);
    if needle.is_empty() {
        return Vec::new();
    }
    history
        .iter()
        .filter(|record| matches_figure(record, &needle))
        .map(RecordView::from)
        .collect()
}

/// [`find_by_figure`] over raw JSON. A non-array root is an error, distinct from
/// an empty match; array entries that are not record objects are skipped.
pub fn find_by_figure_in_json(value: &Value, name: &str) -> Result<Vec<RecordView>> {
    let Value::Array(items) = value else {
        return Err(HistoryError::NotAnArray {
            found: json_kind(value),
        });
    };
    let needle = normalize(name);
    if needle.is_empty() {
        return Ok(Vec::new());
    }
    Ok(items
        .iter()
        .filter(|item| item.is_object())
        .filter_map(|item| serde_json::from_value::<Record>(item.clone()).ok())
        .filter(|record| matches_figure(record, &needle))
        .map(|record| RecordView::from(&record))
        .collect())
}

/// All records in chronological order, or only the last `last` of them.
pub fn list_records(history: &History, last: Option<usize>) -> Vec<RecordView> {
    let records = match last {
        Some(n) => history.last_n(n),
        None => history.records(),
    };
    records.iter().map(RecordView::from).collect()
}
