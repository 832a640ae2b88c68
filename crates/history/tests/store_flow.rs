use perimeter_history::{
    find_by_figure, load_history, HistoryConfig, HistoryError, Record, RecordStore, StatsEngine,
};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn store_in(dir: &TempDir) -> RecordStore {
    RecordStore::new(dir.path().join("perimetros.json"))
}

fn square(side: f64) -> Record {
    Record::new("cuadrado", 4.0 * side, [("lado", side)])
}

#[test]
fn empty_file_grows_one_record_at_a_time() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    std::fs::write(store.path(), "").unwrap();

    assert!(store.load().is_empty());

    let first = store.append(square(1.0)).unwrap();
    let on_disk: Value = serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
    assert_eq!(on_disk.as_array().map(Vec::len), Some(1));

    let second = store.append(square(2.0)).unwrap();
    let history = store.load();
    assert_eq!(history.records(), &[first, second]);
}

#[test]
fn appended_record_is_last_on_reload() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.append_batch(vec![square(1.0), square(2.0)]).unwrap();

    let record = Record::new("triangulo_escaleno", 13.0, [
        ("lado_1", 3.0),
        ("lado_2", 4.0),
        ("lado_3", 6.0),
    ])
    .with_timestamp("16/10/2026 12:00:00");
    let persisted = store.append(record.clone()).unwrap();
    assert_eq!(persisted, record);

    let history = load_history(store.path()).history;
    assert_eq!(history.last(), Some(&record));
    assert_eq!(history.len(), 3);
}

#[test]
fn malformed_file_is_recovered_as_empty() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    std::fs::write(store.path(), "not json").unwrap();

    let report = store.load_report();
    assert!(report.history.is_empty());
    assert!(matches!(report.warning, Some(HistoryError::Parse(_))));

    assert!(store.read_through().is_empty());
    assert!(!store.is_cached());

    let err = store.append(square(1.0)).unwrap_err();
    assert!(err.is_parse());
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "not json");
}

#[test]
fn bad_entry_hides_only_itself() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    std::fs::write(
        store.path(),
        r#"[
    {"fecha": "01/01/2026 10:00:00", "figura": "circulo", "perimetro": 6.28, "parametros": {"radio": 1.0}},
    {"fecha": 20260101, "figura": "circulo", "perimetro": 12.57}
]
"#,
    )
    .unwrap();

    let report = store.read_through_report();
    assert_eq!(report.history.len(), 1);
    assert!(matches!(
        report.warning,
        Some(HistoryError::SkippedEntries { skipped: 1, .. })
    ));
    assert_eq!(find_by_figure(&report.history, "circulo").len(), 1);

    let appended = store.append(square(1.0)).unwrap();
    let history = store.load();
    assert_eq!(history.len(), 2);
    assert_eq!(history.last(), Some(&appended));
    assert_eq!(StatsEngine::default().summarize(&history).total, 2);

    assert_eq!(store.append_batch(vec![square(2.0)]).unwrap(), 1);
    assert_eq!(store.load().len(), 3);
}

#[test]
fn batch_rewrite_keeps_entries_as_written() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    std::fs::write(
        store.path(),
        r#"[{"fecha": null, "figura": "circulo", "perimetro": null}, {"fecha": 20260101}, 7]"#,
    )
    .unwrap();

    store.append_batch(vec![square(1.0)]).unwrap();

    let on_disk: Value = serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
    let entries = on_disk.as_array().unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(
        entries[0],
        serde_json::json!({"fecha": null, "figura": "circulo", "perimetro": null})
    );
    assert_eq!(entries[1], serde_json::json!({"fecha": 20260101}));
    assert_eq!(entries[2], serde_json::json!(7));
    assert_eq!(entries[3]["figura"], "cuadrado");
}

#[test]
fn clear_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.append(square(1.0)).unwrap();

    assert!(store.clear().unwrap());
    assert!(store.load().is_empty());
    assert!(!store.clear().unwrap());
    assert!(store.load().is_empty());
}

#[test]
fn writes_are_visible_inside_the_freshness_window() {
    let dir = TempDir::new().unwrap();
    let cfg = HistoryConfig {
        freshness: Duration::from_secs(3600),
        ..HistoryConfig::with_path(dir.path().join("perimetros.json"))
    };
    let store = RecordStore::open(&cfg);

    assert!(store.read_through().is_empty());
    store.append(square(1.0)).unwrap();
    assert_eq!(store.read_through().len(), 1);
    assert_eq!(store.read_through().len(), 1);

    store.append_batch(vec![square(2.0), square(3.0)]).unwrap();
    assert_eq!(store.read_through().len(), 3);

    store.clear().unwrap();
    assert!(store.read_through().is_empty());

    let stats = store.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.invalidations, 3);
}

#[test]
fn failed_write_leaves_nothing_cached() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.append(square(1.0)).unwrap();
    assert_eq!(store.read_through().len(), 1);
    assert!(store.is_cached());

    std::fs::write(store.path(), "{}").unwrap();
    assert!(store.append(square(2.0)).is_err());
    assert!(!store.is_cached());
}

#[test]
fn batch_switches_to_compact_layout_above_threshold() {
    let dir = TempDir::new().unwrap();
    let cfg = HistoryConfig {
        compact_threshold: 3,
        ..HistoryConfig::with_path(dir.path().join("perimetros.json"))
    };
    let store = RecordStore::open(&cfg);

    store.append_batch((1..=3).map(|i| square(f64::from(i))).collect()).unwrap();
    let pretty = std::fs::read_to_string(store.path()).unwrap();
    assert!(pretty.contains("\n    {"), "expected indented layout: {pretty}");
    let before = store.load();

    store.append_batch(vec![square(4.0)]).unwrap();
    let compact = std::fs::read_to_string(store.path()).unwrap();
    assert_eq!(compact.lines().count(), 1, "expected compact layout: {compact}");

    let after = store.load();
    assert_eq!(after.len(), 4);
    assert_eq!(&after[..3], before.records());
}

#[test]
fn concurrent_appends_all_persist() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(store_in(&dir));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..10 {
                    store.append(square(f64::from(t * 10 + i + 1))).unwrap();
                    let _ = store.read_through();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let history = store.load();
    assert_eq!(history.len(), 80);
    assert_eq!(store.read_through().len(), 80);
}

#[test]
fn statistics_follow_the_store() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let engine = StatsEngine::default();

    store
        .append(Record::new("circulo", 10.0, [("radio", 1.59)]))
        .unwrap();
    store
        .append(Record::new("circulo", 20.0, [("radio", 3.18)]))
        .unwrap();
    store.append(square(1.0)).unwrap();

    let history = store.read_through();
    let snap = engine.summarize(&history);
    assert_eq!(snap.total, 3);
    assert_eq!(snap.min, Some(4.0));
    assert_eq!(snap.max, Some(20.0));
    assert_eq!(
        snap.most_frequent_figure.as_ref().map(|f| f.figure.as_str()),
        Some("circulo")
    );

    engine.summarize(&store.read_through());
    assert_eq!(engine.memo_stats().hits, 1);
}
