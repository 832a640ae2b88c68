use perimeter_formulas::{Calculation, Figure, FormulaError, Parameters};
use perimeter_history::{
    find_by_figure, list_records, AggregateSnapshot, History, HistoryConfig, HistoryError,
    LoadReport, Record, RecordStore, RecordView, StatsEngine,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Result of a computation. The perimeter stands even when recording failed.
#[derive(Debug, Serialize)]
pub struct CalcOutcome {
    pub figure: Figure,
    pub perimeter: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_error: Option<String>,
}

/// A query answer together with the reason part of the history was not read.
#[derive(Debug)]
pub struct Loaded<T> {
    pub value: T,
    pub warning: Option<HistoryError>,
}

/// Store and statistics engine behind every menu entry and subcommand
pub struct Session {
    store: RecordStore,
    stats: StatsEngine,
}

impl Session {
    pub fn open(config: &HistoryConfig) -> Self {
        Self {
            store: RecordStore::open(config),
            stats: StatsEngine::new(config.memo_capacity),
        }
    }

    pub fn history_path(&self) -> &Path {
        self.store.path()
    }

    pub fn calculate(
        &self,
        figure: &str,
        parameters: Parameters,
    ) -> Result<CalcOutcome, FormulaError> {
        let Calculation {
            figure,
            perimeter,
            parameters,
        } = perimeter_formulas::calculate(figure, parameters)?;

        let record = Record::new(figure.as_str(), perimeter, parameters);
        let (recorded, record_error) = match self.store.append(record) {
            Ok(record) => (Some(record), None),
            Err(err) => {
                log::error!("Could not record {figure}: {err}");
                (None, Some(err.to_string()))
            }
        };

        Ok(CalcOutcome {
            figure,
            perimeter,
            recorded,
            record_error,
        })
    }

    pub fn list(&self, last: Option<usize>) -> Loaded<Vec<RecordView>> {
        self.query(|history| list_records(history, last))
    }

    pub fn search(&self, figure: &str) -> Loaded<Vec<RecordView>> {
        self.query(|history| find_by_figure(history, figure))
    }

    pub fn stats(&self) -> Loaded<Arc<AggregateSnapshot>> {
        self.query(|history| self.stats.summarize(history))
    }

    fn query<T>(&self, f: impl FnOnce(&History) -> T) -> Loaded<T> {
        let LoadReport { history, warning } = self.store.read_through_report();
        Loaded {
            value: f(&history),
            warning,
        }
    }

    pub fn clear(&self) -> Result<bool, HistoryError> {
        self.store.clear()
    }
}
