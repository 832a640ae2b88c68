use crate::record::{Fingerprint, History};
use lru::LruCache;
use serde::Serialize;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const DEFAULT_MEMO_CAPACITY: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FigureCount {
    pub figure: String,
    pub count: usize,
}

/// Summary statistics of one exact history content
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    /// Every record, numeric perimeter or not
    pub total: usize,
    /// Records whose perimeter is a JSON number
    pub numeric_count: usize,
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub most_frequent_figure: Option<FigureCount>,
    /// Occurrences per figure, first-seen order
    pub figure_counts: Vec<FigureCount>,
}

/// Compute statistics without memoization.
///
/// Figures are grouped case-insensitively and reported with the spelling seen
/// first. On a tie for most frequent, the figure that appears first wins.
pub fn aggregate(history: &History) -> AggregateSnapshot {
    let mut sum = 0.0;
    let mut numeric_count = 0usize;
    let mut min: Option<f64> = None;
    let mut max: Option<f64> = None;

    let mut figure_counts: Vec<FigureCount> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();

    for record in history {
        if let Some(value) = record.perimeter_value() {
            numeric_count += 1;
            sum += value;
            min = Some(min.map_or(value, |m| m.min(value)));
            max = Some(max.map_or(value, |m| m.max(value)));
        }

        if let Some(figure) = record.figure_name() {
            let key = figure.trim().to_lowercase();
            match slots.get(&key) {
                Some(&slot) => figure_counts[slot].count += 1,
                None => {
                    slots.insert(key, figure_counts.len());
                    figure_counts.push(FigureCount {
                        figure: figure.to_string(),
                        count: 1,
                    });
                }
            }
        }
    }

    let mut most_frequent: Option<&FigureCount> = None;
    for candidate in &figure_counts {
        if most_frequent.map_or(true, |best| candidate.count > best.count) {
            most_frequent = Some(candidate);
        }
    }

    AggregateSnapshot {
        total: history.len(),
        numeric_count,
        average: (numeric_count > 0).then(|| sum / numeric_count as f64),
        min,
        max,
        most_frequent_figure: most_frequent.cloned(),
        figure_counts,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

struct Memo {
    entries: LruCache<Fingerprint, Arc<AggregateSnapshot>>,
    hits: u64,
    misses: u64,
}

/// Memoized [`aggregate`], keyed by history fingerprint with LRU eviction.
pub struct StatsEngine {
    memo: Mutex<Memo>,
}

impl StatsEngine {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            memo: Mutex::new(Memo {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn summarize(&self, history: &History) -> Arc<AggregateSnapshot> {
        let key = history.fingerprint();
        let mut memo = self.lock();
        if let Some(hit) = memo.entries.get(&key).cloned() {
            memo.hits += 1;
            log::debug!("Statistics memo hit for {key:?}");
            return hit;
        }

        memo.misses += 1;
        let snapshot = Arc::new(aggregate(history));
        memo.entries.put(key, Arc::clone(&snapshot));
        snapshot
    }

    pub fn memo_stats(&self) -> MemoStats {
        let memo = self.lock();
        MemoStats {
            hits: memo.hits,
            misses: memo.misses,
            entries: memo.entries.len(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Memo> {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StatsEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MEMO_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn history(value: serde_json::Value) -> History {
        History::from_json(value).unwrap()
    }

    #[test]
    fn mixed_perimeters() {
        let h = history(json!([
            {"figura": "circulo", "perimetro": 10.0, "parametros": {}},
            {"figura": "circulo", "perimetro": 20.0, "parametros": {}},
            {"figura": "cuadrado", "perimetro": "bad", "parametros": {}}
        ]));
        let snap = aggregate(&h);
        assert_eq!(snap.total, 3);
        assert_eq!(snap.numeric_count, 2);
        assert_eq!(snap.average, Some(15.0));
        assert_eq!(snap.min, Some(10.0));
        assert_eq!(snap.max, Some(20.0));
        assert_eq!(
            snap.most_frequent_figure,
            Some(FigureCount {
                figure: "circulo".into(),
                count: 2
            })
        );
    }

    #[test]
    fn empty_history_has_no_data() {
        let snap = aggregate(&History::new());
        assert_eq!(snap.total, 0);
        assert_eq!(snap.average, None);
        assert_eq!(snap.min, None);
        assert_eq!(snap.most_frequent_figure, None);
    }

    #[test]
    fn records_without_figure_or_number_still_count() {
        let h = history(json!([{"perimetro": "x"}, {"parametros": {"lado": 1}}]));
        let snap = aggregate(&h);
        assert_eq!(snap.total, 2);
        assert_eq!(snap.numeric_count, 0);
        assert_eq!(snap.average, None);
        assert_eq!(snap.most_frequent_figure, None);
    }

    #[test]
    fn ties_go_to_first_seen() {
        let h = history(json!([
            {"figura": "trapecio", "perimetro": 1},
            {"figura": "circulo", "perimetro": 2},
            {"figura": "Circulo", "perimetro": 3},
            {"figura": "trapecio", "perimetro": 4}
        ]));
        let snap = aggregate(&h);
        assert_eq!(
            snap.most_frequent_figure.map(|f| f.figure),
            Some("trapecio".to_string())
        );
        assert_eq!(
            snap.figure_counts,
            vec![
                FigureCount {
                    figure: "trapecio".into(),
                    count: 2
                },
                FigureCount {
                    figure: "circulo".into(),
                    count: 2
                },
            ]
        );
    }

    #[test]
    fn unchanged_history_is_not_recomputed() {
        let engine = StatsEngine::default();
        let mut h = history(json!([{"figura": "circulo", "perimetro": 1.5}]));

        let first = engine.summarize(&h);
        let second = engine.summarize(&h.clone());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            engine.memo_stats(),
            MemoStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );

        h.push(Record::new("circulo", 2.5, [("radio", 0.4)]));
        let third = engine.summarize(&h);
        assert_eq!(third.total, 2);
        assert_eq!(engine.memo_stats().misses, 2);
    }

    #[test]
    fn memo_evicts_least_recently_used() {
        let engine = StatsEngine::new(2);
        let a = history(json!([{"figura": "a"}]));
        let b = history(json!([{"figura": "b"}]));
        let c = history(json!([{"figura": "c"}]));

        engine.summarize(&a);
        engine.summarize(&b);
        engine.summarize(&a);
        engine.summarize(&c);
        assert_eq!(engine.memo_stats().entries, 2);

        engine.summarize(&a);
        assert_eq!(engine.memo_stats().hits, 2);
        engine.summarize(&b);
        assert_eq!(engine.memo_stats().misses, 4);
    }
}
