//! End-to-end tests through the `regrest` facade
//!
//! One store directory per test, driven only through public APIs:
//! record → compare → regression → update → verify → housekeeping.

use std::collections::HashSet;
use std::fs;

use regrest::{
    inspect_object, regression, verify, Call, CheckOptions, EngineError, FunctionTable, Outcome,
    Recorder, RegrestConfig,
};
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

fn weighted_sum((a, b, c): (i64, i64, i64)) -> f64 {
    a as f64 * 0.5 + b as f64 * 0.25 + c as f64 * 0.125
}

#[derive(Debug, Clone, PartialEq)]
struct Summary {
    count: usize,
    mean: f64,
    tags: HashSet<String>,
}
inspect_object!(Summary { count, mean, tags });

fn summarize((values, tags): (Vec<f64>, Vec<String>)) -> Summary {
    let count = values.len();
    let mean = if count == 0 {
        0.0
    } else {
        values.iter().sum::<f64>() / count as f64
    };
    Summary {
        count,
        mean,
        tags: tags.into_iter().collect(),
    }
}

fn open(dir: &TempDir) -> Recorder {
    Recorder::open(RegrestConfig::with_storage_dir(dir.path().join(".regrest"))).unwrap()
}

fn record_files(dir: &TempDir) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<_> = fs::read_dir(dir.path().join(".regrest"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .map(|p| {
            let name = p.file_name().unwrap().to_string_lossy().into_owned();
            (name, fs::read(&p).unwrap())
        })
        .collect();
    files.sort();
    files
}

// ============================================================================
// Record, compare, update
// ============================================================================

#[test]
fn record_compare_update_scenario() {
    let dir = TempDir::new().unwrap();
    let recorder = open(&dir);

    // First call records
    let f = regression!(weighted_sum);
    let (value, outcome) = f.run(&recorder, (1, 2, 3)).unwrap();
    assert_eq!(value, 1.375);
    assert_eq!(outcome, Outcome::Recorded);
    let after_record = record_files(&dir);
    assert_eq!(after_record.len(), 1);

    // Same arguments, same result: passes without touching the store
    let (_, outcome) = f.run(&recorder, (1, 2, 3)).unwrap();
    assert_eq!(outcome, Outcome::Passed);
    assert_eq!(record_files(&dir), after_record);

    // Changed implementation: regression, store unchanged
    let changed = regression!(|(a, b, c): (i64, i64, i64)| weighted_sum((a, b, c)) + 0.5, "weighted_sum")
        .raise_on_error(true);
    let err = changed.call(&recorder, (1, 2, 3)).unwrap_err();
    match &err {
        EngineError::Regression {
            module,
            function,
            message,
        } => {
            assert_eq!(module, module_path!());
            assert_eq!(function, "weighted_sum");
            assert!(message.contains("expected 1.375, got 1.875"), "{}", message);
        }
        other => panic!("expected a regression, got {:?}", other),
    }
    assert_eq!(record_files(&dir), after_record);

    // Update mode overwrites the single record
    let (_, outcome) = changed.clone().update(true).run(&recorder, (1, 2, 3)).unwrap();
    assert_eq!(outcome, Outcome::Updated);
    let after_update = record_files(&dir);
    assert_eq!(after_update.len(), 1);
    assert_eq!(after_update[0].0, after_record[0].0);
    assert_ne!(after_update[0].1, after_record[0].1);

    // The new implementation is now the baseline
    assert_eq!(changed.call(&recorder, (1, 2, 3)).unwrap(), 1.875);
    assert!(f
        .clone()
        .raise_on_error(true)
        .call(&recorder, (1, 2, 3))
        .unwrap_err()
        .is_regression());
}

#[test]
fn different_arguments_get_separate_records() {
    let dir = TempDir::new().unwrap();
    let recorder = open(&dir);
    let f = regression!(weighted_sum);

    for args in [(1, 2, 3), (3, 2, 1), (0, 0, 0)] {
        f.call(&recorder, args).unwrap();
    }
    assert_eq!(record_files(&dir).len(), 3);

    let stats = recorder.store().stats().unwrap();
    assert_eq!(stats.total_records, 3);
    assert_eq!(stats.total_functions, 1);
}

#[test]
fn object_results_with_sets() {
    let dir = TempDir::new().unwrap();
    let recorder = open(&dir);
    let f = regression!(summarize).raise_on_error(true);

    let args = || {
        (
            vec![1.0, 2.0, 4.5],
            vec!["b".to_string(), "a".to_string(), "c".to_string()],
        )
    };
    let first = f.call(&recorder, args()).unwrap();
    let second = f.call(&recorder, args()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.count, 3);
}

// ============================================================================
// Explicit calls with keyword arguments
// ============================================================================

#[test]
fn keyword_arguments_are_order_independent() {
    let dir = TempDir::new().unwrap();
    let recorder = open(&dir);

    let one = Call::new("text", "wrap")
        .arg("hello world")
        .unwrap()
        .kwarg("width", &5u32)
        .unwrap()
        .kwarg("indent", &2u32)
        .unwrap();
    let other = Call::new("text", "wrap")
        .arg("hello world")
        .unwrap()
        .kwarg("indent", &2u32)
        .unwrap()
        .kwarg("width", &5u32)
        .unwrap();

    let wrapped = vec!["  hello".to_string(), "  world".to_string()];
    assert_eq!(
        recorder.record(&one, &wrapped, CheckOptions::default()).unwrap(),
        Outcome::Recorded
    );
    assert_eq!(
        recorder.record(&other, &wrapped, CheckOptions::default()).unwrap(),
        Outcome::Passed
    );
}

// ============================================================================
// Verify and housekeeping
// ============================================================================

#[test]
fn verify_then_delete() {
    let dir = TempDir::new().unwrap();
    let recorder = open(&dir);
    let f = regression!(weighted_sum);
    let g = regression!(summarize);
    f.call(&recorder, (1, 1, 1)).unwrap();
    f.call(&recorder, (2, 2, 2)).unwrap();
    g.call(&recorder, (vec![1.0], vec![])).unwrap();

    let mut table = FunctionTable::new();
    table.register(&f);
    table.register(&g);
    let report = verify(recorder.store(), &table, None, &recorder.config().matcher()).unwrap();
    assert_eq!(report.passed, 3);
    assert!(report.is_success());

    let listing = recorder.store().list_matching("WEIGHTED").unwrap();
    assert_eq!(listing.len(), 2);

    let deleted = recorder.store().delete_by_pattern("weighted_sum").unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(recorder.store().list_all().unwrap().len(), 1);

    assert_eq!(recorder.store().clear_all().unwrap(), 1);
    assert!(recorder.store().list_all().unwrap().is_empty());
}
