use crate::error::{json_kind, HistoryError, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::ops::Deref;
use std::sync::OnceLock;

/// `DD/MM/YYYY HH:MM:SS`
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn now_timestamp() -> String {
    format_timestamp(Local::now())
}

/// One persisted computation.
///
/// Reads are tolerant: every field may be missing and `perimetro` may hold any
/// JSON value. Unknown keys are preserved so rewrites never drop data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "fecha", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(rename = "figura", default, skip_serializing_if = "Option::is_none")]
    pub figure: Option<String>,

    #[serde(rename = "perimetro", default, skip_serializing_if = "Option::is_none")]
    pub perimeter: Option<Value>,

    #[serde(rename = "parametros", default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    /// A fresh, unstamped record. The store assigns `fecha` when it is written.
    pub fn new<I, K>(figure: impl Into<String>, perimeter: f64, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let parameters: Map<String, Value> = parameters
            .into_iter()
            .map(|(k, v)| (k.into(), Value::from(v)))
            .collect();
        Self {
            timestamp: None,
            figure: Some(figure.into()),
            perimeter: Some(Value::from(perimeter)),
            parameters: Some(Value::Object(parameters)),
            extra: Map::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// The perimeter, if it is an actual JSON number.
    pub fn perimeter_value(&self) -> Option<f64> {
        match &self.perimeter {
            Some(Value::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    pub fn figure_name(&self) -> Option<&str> {
        self.figure.as_deref()
    }

    pub(crate) fn stamped(mut self) -> Self {
        if self.timestamp.is_none() {
            self.timestamp = Some(now_timestamp());
        }
        self
    }
}

/// SHA-256 over the canonical JSON of a history
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

/// Ordered, append-only sequence of records. Insertion order is chronological.
#[derive(Debug, Clone, Default)]
pub struct History {
    records: Vec<Record>,
    fingerprint: OnceLock<Fingerprint>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse raw file content. The root must be an array of objects.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|err| HistoryError::parse(err.to_string()))?;
        Self::from_json(value)
    }

    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Array(items) = value else {
            return Err(HistoryError::NotAnArray {
                found: json_kind(&value),
            });
        };
        let records = items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                serde_json::from_value::<Record>(item)
                    .map_err(|err| HistoryError::parse(format!("entry {idx}: {err}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from(records))
    }

    /// Lenient counterpart of [`History::from_json`] for the entries of an array
    /// root. Entries that are not record objects are skipped; the warning counts
    /// them and quotes the first failure.
    pub fn from_entries(items: Vec<Value>) -> (Self, Option<HistoryError>) {
        let mut records = Vec::with_capacity(items.len());
        let mut skipped = 0usize;
        let mut first = None;
        for (idx, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<Record>(item) {
                Ok(record) => records.push(record),
                Err(err) => {
                    skipped += 1;
                    first.get_or_insert_with(|| format!("entry {idx}: {err}"));
                }
            }
        }
        let warning = first.map(|first| HistoryError::SkippedEntries { skipped, first });
        (Self::from(records), warning)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
        self.fingerprint = OnceLock::new();
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = Record>) {
        self.records.extend(records);
        self.fingerprint = OnceLock::new();
    }

    /// The last `n` records, oldest first.
    pub fn last_n(&self, n: usize) -> &[Record] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    /// Structural identity of this snapshot. Computed once, reset by mutation.
    pub fn fingerprint(&self) -> Fingerprint {
        *self.fingerprint.get_or_init(|| {
            let mut hasher = Sha256::new();
            hasher.update((self.records.len() as u64).to_be_bytes());
            for record in &self.records {
                match serde_json::to_vec(record) {
                    Ok(bytes) => {
                        hasher.update((bytes.len() as u64).to_be_bytes());
                        hasher.update(&bytes);
                    }
                    Err(_) => hasher.update(format!("{record:?}").as_bytes()),
                }
            }
            let mut digest = [0u8; 32];
            digest.copy_from_slice(&hasher.finalize());
            Fingerprint(digest)
        })
    }
}

impl From<Vec<Record>> for History {
    fn from(records: Vec<Record>) -> Self {
        Self {
            records,
            fingerprint: OnceLock::new(),
        }
    }
}

impl FromIterator<Record> for History {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl Deref for History {
    type Target = [Record];

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl PartialEq for History {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

impl Serialize for History {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.records.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for History {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Vec::<Record>::deserialize(deserializer).map(Self::from)
    }
}
