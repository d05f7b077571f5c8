//! Replay of recorded calls
//!
//! `verify` walks the record store, re-runs each recorded call through the
//! original function registered in a `FunctionTable`, and compares the
//! fresh result with the stored one. Nothing is written.

use std::collections::BTreeMap;
use std::fmt;

use regrest_core::{CodecError, Decode, Decoder, Encode, EncodedValue, Encoder, Limits, TypeRegistry};
use regrest_matcher::{MatchResult, Matcher};
use regrest_storage::{RecordId, RecordStore, TestRecord};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::args::CallArgs;
use crate::error::EngineResult;
use crate::regression::Regression;

type Replay = Box<dyn Fn(&TestRecord, Limits) -> EngineResult<EncodedValue> + Send + Sync>;

/// Original functions available for replay, keyed by (module, function)
#[derive(Default)]
pub struct FunctionTable {
    functions: BTreeMap<(String, String), Replay>,
    types: TypeRegistry,
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTable")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("types", &self.types)
            .finish()
    }
}

impl FunctionTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the original of a wrapped function
    pub fn register<F, A, R>(&mut self, regression: &Regression<F>)
    where
        F: Fn(A) -> R + Send + Sync + 'static,
        A: CallArgs + 'static,
        R: Encode + Decode + 'static,
    {
        A::register(&mut self.types);
        R::register(&mut self.types);

        let func = regression.shared();
        self.register_raw(
            regression.module(),
            regression.function(),
            move |record: &TestRecord, limits: Limits| {
                if !record.kwargs.is_empty() {
                    return Err(CodecError::Malformed(format!(
                        "{} takes no keyword arguments, record has {}",
                        record.qualified_name(),
                        record.kwargs.len()
                    ))
                    .into());
                }
                let args = A::decode_args(&record.args, &mut Decoder::new(limits))?;
                let result = (*func)(args);
                Ok(Encoder::new(limits).encode(&result)?)
            },
        );
    }

    /// Register a replay function working on raw records
    pub fn register_raw<G>(&mut self, module: &str, function: &str, replay: G)
    where
        G: Fn(&TestRecord, Limits) -> EngineResult<EncodedValue> + Send + Sync + 'static,
    {
        self.functions
            .insert((module.to_string(), function.to_string()), Box::new(replay));
    }

    /// Make the object types reachable from `T` loadable during replay
    pub fn register_type<T: Decode>(&mut self) {
        self.types.register::<T>();
    }

    /// Returns true if `module.function` can be replayed
    pub fn contains(&self, module: &str, function: &str) -> bool {
        self.functions
            .contains_key(&(module.to_string(), function.to_string()))
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns true if no function is registered
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Object types reachable from registered functions
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    fn replay(&self, record: &TestRecord, limits: Limits) -> Option<EngineResult<EncodedValue>> {
        self.functions
            .get(&(record.module.clone(), record.function.clone()))
            .map(|replay| replay(record, limits))
    }
}

// ============================================================================
// Report
// ============================================================================

/// Verdict for one record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyStatus {
    /// Replayed result matches the record
    Passed,
    /// Replayed result differs from the record
    Failed(MatchResult),
    /// The record could not be loaded or replayed
    Error {
        /// What went wrong
        reason: String,
    },
}

/// One verified record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyOutcome {
    /// `module.function`, or the file name of an unreadable record
    pub name: String,
    /// Id of the record, if it could be read
    pub record_id: Option<RecordId>,
    /// Verdict
    #[serde(flatten)]
    pub status: VerifyStatus,
}

/// Tally of a verify run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerifyReport {
    /// Records whose replay matched
    pub passed: usize,
    /// Records whose replay differed
    pub failed: usize,
    /// Records that could not be loaded or replayed
    pub errors: usize,
    /// Per-record verdicts, in store listing order
    pub results: Vec<VerifyOutcome>,
}

impl VerifyReport {
    /// Number of records examined
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.errors
    }

    /// Returns true if every record passed
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }

    fn push(&mut self, outcome: VerifyOutcome) {
        match outcome.status {
            VerifyStatus::Passed => self.passed += 1,
            VerifyStatus::Failed(_) => self.failed += 1,
            VerifyStatus::Error { .. } => self.errors += 1,
        }
        self.results.push(outcome);
    }
}

// ============================================================================
// Verify
// ============================================================================

/// Replay every record (optionally filtered by `keyword`) and compare
///
/// Records that fail to load, or whose function is not in `functions`,
/// count as errors. Store I/O failures abort the run.
pub fn verify(
    store: &RecordStore,
    functions: &FunctionTable,
    keyword: Option<&str>,
    matcher: &Matcher,
) -> EngineResult<VerifyReport> {
    store.extend_registry(functions.types());
    let listing = match keyword {
        Some(keyword) => store.list_matching(keyword)?,
        None => store.list_all()?,
    };
    let limits = store.config().limits;

    let mut report = VerifyReport::default();
    for failure in listing.failures {
        warn!(
            path = %failure.path.display(),
            error = %failure.error,
            "Unreadable record"
        );
        let name = failure
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| failure.path.display().to_string());
        report.push(VerifyOutcome {
            name,
            record_id: None,
            status: VerifyStatus::Error {
                reason: failure.error.to_string(),
            },
        });
    }

    for record in listing.records {
        let status = match functions.replay(&record, limits) {
            None => VerifyStatus::Error {
                reason: format!("function {} is not registered", record.qualified_name()),
            },
            Some(Err(e)) => VerifyStatus::Error {
                reason: e.to_string(),
            },
            Some(Ok(actual)) => {
                let verdict = matcher.compare(&record.result, &actual);
                if verdict.passed {
                    VerifyStatus::Passed
                } else {
                    VerifyStatus::Failed(verdict)
                }
            }
        };
        debug!(
            record_id = %record.record_id,
            name = %record.qualified_name(),
            status = ?status,
            "Verified record"
        );
        report.push(VerifyOutcome {
            name: record.qualified_name(),
            record_id: Some(record.record_id),
            status,
        });
    }

    info!(
        passed = report.passed,
        failed = report.failed,
        errors = report.errors,
        "Verify complete"
    );
    Ok(report)
}
