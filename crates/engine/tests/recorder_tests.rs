//! Integration tests for the recording engine
//!
//! Covers the engine against a real store directory:
//! - Object results recorded, reloaded and compared
//! - Unregistered types under strict and lenient resolution
//! - Configuration from file feeding the recorder
//! - Several threads recording the same call
//! - Verify over a store written by wrapped functions

use std::sync::{Arc, Barrier};
use std::thread;

use regrest_core::{encode, CodecError};
use regrest_engine::{
    verify, Call, CheckOptions, EngineError, FunctionTable, Outcome, Recorder, Regression,
    RegrestConfig, VerifyStatus, CONFIG_FILE_NAME,
};
use tempfile::TempDir;

// ============================================================================
// Helper Types and Functions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Point {
    x: f64,
    y: f64,
}
regrest_core::inspect_object!(Point { x, y });

#[derive(Debug, Clone, PartialEq)]
struct Path {
    name: String,
    points: Vec<Point>,
}
regrest_core::inspect_object!(Path { name, points });

fn scale((path, factor): (Path, f64)) -> Path {
    Path {
        name: path.name,
        points: path
            .points
            .into_iter()
            .map(|p| Point {
                x: p.x * factor,
                y: p.y * factor,
            })
            .collect(),
    }
}

fn triangle() -> Path {
    Path {
        name: "tri".to_string(),
        points: vec![
            Point { x: 0.0, y: 0.0 },
            Point { x: 1.0, y: 0.0 },
            Point { x: 0.5, y: 0.75 },
        ],
    }
}

fn recorder_at(dir: &TempDir) -> Recorder {
    Recorder::open(RegrestConfig::with_storage_dir(dir.path())).unwrap()
}

// ============================================================================
// Objects
// ============================================================================

mod objects {
    use super::*;

    #[test]
    fn test_object_result_round_trip() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder_at(&dir);
        let wrapped = Regression::new("geometry", "scale", scale);

        let (_, first) = wrapped.run(&recorder, (triangle(), 2.0)).unwrap();
        assert_eq!(first, Outcome::Recorded);

        // A fresh recorder only knows the types through the wrapper
        let reopened = recorder_at(&dir);
        let (scaled, second) = wrapped.run(&reopened, (triangle(), 2.0)).unwrap();
        assert_eq!(second, Outcome::Passed);
        assert_eq!(scaled.points[2], Point { x: 1.0, y: 1.5 });
    }

    #[test]
    fn test_field_level_mismatch_message() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder_at(&dir);
        Regression::new("geometry", "scale", scale)
            .call(&recorder, (triangle(), 2.0))
            .unwrap();

        let drifted = Regression::new("geometry", "scale", |args: (Path, f64)| {
            let mut out = scale(args);
            out.points[1].y += 0.5;
            out
        })
        .raise_on_error(true);

        let err = drifted.call(&recorder, (triangle(), 2.0)).unwrap_err();
        match err {
            EngineError::Regression { message, .. } => {
                assert!(message.starts_with("root.points[1].y:"), "{}", message);
            }
            other => panic!("expected a regression, got {:?}", other),
        }
    }

    #[test]
    fn test_small_float_drift_within_tolerance() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder_at(&dir);
        Regression::new("geometry", "scale", scale)
            .call(&recorder, (triangle(), 3.0))
            .unwrap();

        let noisy = Regression::new("geometry", "scale", |args: (Path, f64)| {
            let mut out = scale(args);
            out.points[2].x += 1e-12;
            out
        });
        let (_, outcome) = noisy.run(&recorder, (triangle(), 3.0)).unwrap();
        assert_eq!(outcome, Outcome::Passed);
    }
}

// ============================================================================
// Type Resolution
// ============================================================================

mod type_resolution {
    use super::*;

    fn seed(dir: &TempDir) -> (Call, regrest_core::EncodedValue) {
        let recorder = recorder_at(dir);
        let call = Call::new("geometry", "origin");
        let result = Point { x: 0.0, y: 0.0 };
        recorder
            .record(&call, &result, CheckOptions::default())
            .unwrap();
        (call, encode(&result).unwrap())
    }

    #[test]
    fn test_strict_unregistered_type_skips() {
        let dir = TempDir::new().unwrap();
        let (call, encoded) = seed(&dir);
        let before = std::fs::read_dir(dir.path()).unwrap().count();

        let fresh = recorder_at(&dir);
        let outcome = fresh
            .check(&call, &encoded, CheckOptions::default())
            .unwrap();
        match outcome {
            Outcome::Skipped(reason) => assert!(reason.contains("Point"), "{}", reason),
            other => panic!("expected a skip, got {:?}", other),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), before);
    }

    #[test]
    fn test_strict_unregistered_type_raises() {
        let dir = TempDir::new().unwrap();
        let (call, encoded) = seed(&dir);

        let fresh = recorder_at(&dir);
        let options = CheckOptions {
            raise_on_error: Some(true),
            ..CheckOptions::default()
        };
        let err = fresh.check(&call, &encoded, options).unwrap_err();
        assert!(matches!(err, EngineError::RecordLoad { .. }));
        assert!(err
            .to_string()
            .starts_with("Failed to load existing record for geometry.origin"));
    }

    #[test]
    fn test_lenient_compares_unregistered_type() {
        let dir = TempDir::new().unwrap();
        let (call, encoded) = seed(&dir);

        let lenient = Recorder::open(RegrestConfig {
            strict_types: false,
            ..RegrestConfig::with_storage_dir(dir.path())
        })
        .unwrap();
        assert_eq!(
            lenient
                .check(&call, &encoded, CheckOptions::default())
                .unwrap(),
            Outcome::Passed
        );
    }

    #[test]
    fn test_registering_makes_record_loadable() {
        let dir = TempDir::new().unwrap();
        let (call, encoded) = seed(&dir);

        let fresh = recorder_at(&dir);
        fresh.register::<Point>();
        assert_eq!(
            fresh.check(&call, &encoded, CheckOptions::default()).unwrap(),
            Outcome::Passed
        );
    }
}

// ============================================================================
// Configuration
// ============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_recorder_from_config_file() {
        let dir = TempDir::new().unwrap();
        let store_dir = dir.path().join("records");
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &config_path,
            format!(
                "storage_dir = {:?}\ntolerance = 0.1\nraise_on_error = true\n",
                store_dir.display().to_string()
            ),
        )
        .unwrap();

        let config = RegrestConfig::from_file(&config_path).unwrap();
        let recorder = Recorder::open(config).unwrap();
        assert!(store_dir.is_dir());

        let call = Call::new("stats", "mean").arg(&vec![1.0f64, 2.0]).unwrap();
        recorder.record(&call, &1.5f64, CheckOptions::default()).unwrap();
        assert_eq!(
            recorder.record(&call, &1.55f64, CheckOptions::default()).unwrap(),
            Outcome::Passed
        );
        assert!(recorder
            .record(&call, &1.7f64, CheckOptions::default())
            .unwrap_err()
            .is_regression());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = RegrestConfig {
            tolerance: f64::NAN,
            ..RegrestConfig::with_storage_dir(dir.path())
        };
        assert!(matches!(
            Recorder::open(config),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_recorder_calls_encode_under_configured_depth() {
        let dir = TempDir::new().unwrap();
        let config = RegrestConfig {
            max_depth: 4,
            ..RegrestConfig::with_storage_dir(dir.path())
        };
        let recorder = Recorder::open(config).unwrap();
        let deep = vec![vec![vec![vec![vec![1i64]]]]];
        let shallow = vec![vec![vec![vec![1i64]]]];

        let err = recorder.call("tree", "walk").arg(&deep).unwrap_err();
        assert!(matches!(err, CodecError::DepthExceeded { max: 4 }));
        let err = recorder
            .call("tree", "walk")
            .kwarg("nodes", &deep)
            .unwrap_err();
        assert!(matches!(err, CodecError::DepthExceeded { max: 4 }));

        let call = recorder.call("tree", "walk").arg(&shallow).unwrap();
        assert_eq!(
            recorder.record(&call, &1i64, CheckOptions::default()).unwrap(),
            Outcome::Recorded
        );

        // Default-limit calls still go through the recorder's check
        let call = Call::new("tree", "walk").arg(&deep).unwrap();
        assert!(matches!(
            recorder.record(&call, &1i64, CheckOptions::default()),
            Err(EngineError::Codec(CodecError::DepthExceeded { max: 4 }))
        ));
    }
}

// ============================================================================
// Concurrency
// ============================================================================

mod concurrency {
    use super::*;

    #[test]
    fn test_racing_first_calls_record_once() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(recorder_at(&dir));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let recorder = Arc::clone(&recorder);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let call = Call::new("calc", "pow").arg(&2i64).unwrap().arg(&10u32).unwrap();
                    barrier.wait();
                    recorder
                        .record(&call, &1024i64, CheckOptions::default())
                        .unwrap()
                })
            })
            .collect();

        let outcomes: Vec<Outcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(
            outcomes.iter().filter(|o| **o == Outcome::Recorded).count(),
            1
        );
        assert!(outcomes
            .iter()
            .all(|o| *o == Outcome::Recorded || *o == Outcome::Passed));
        assert_eq!(recorder.store().list_all().unwrap().len(), 1);
    }
}

// ============================================================================
// Verify
// ============================================================================

mod replay {
    use super::*;

    #[test]
    fn test_verify_object_records() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder_at(&dir);
        let wrapped = Regression::new("geometry", "scale", scale);
        for factor in [0.5, 1.0, 2.0] {
            wrapped.call(&recorder, (triangle(), factor)).unwrap();
        }

        // Replay against a fresh store handle: types come from the table
        let fresh = recorder_at(&dir);
        let mut table = FunctionTable::new();
        table.register(&wrapped);

        let report = verify(fresh.store(), &table, None, &fresh.config().matcher()).unwrap();
        assert_eq!(report.passed, 3);
        assert!(report
            .results
            .iter()
            .all(|r| r.status == VerifyStatus::Passed && r.name == "geometry.scale"));
    }
}
