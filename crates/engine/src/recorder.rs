//! Record-or-compare orchestration
//!
//! `Recorder::check` runs the find → (save | compare) sequence for one call:
//! - no record: the result is saved (`Recorded`)
//! - record found, update mode: the record is overwritten (`Updated`)
//! - record found: the stored result is compared with the fresh one
//!   (`Passed` or a regression)
//! - record unreadable: a `RecordLoad` error, or a logged skip that leaves
//!   the unreadable file in place
//!
//! Whether a regression or load failure is returned as an error or only
//! logged is decided here, by `raise_on_error`. The store and the matcher
//! never make that decision.

use std::collections::BTreeMap;
use std::fmt;

use regrest_core::{CodecResult, Decode, Encode, EncodedValue, Encoder, Limits};
use regrest_matcher::{MatchResult, Matcher};
use regrest_storage::{RecordStore, StoreError, TestRecord};
use tracing::{debug, error, info, warn};

use crate::config::RegrestConfig;
use crate::error::{EngineError, EngineResult};

// ============================================================================
// Call
// ============================================================================

/// Identity and encoded arguments of one call
///
/// `arg` and `kwarg` encode under the call's limits: the defaults for
/// `Call::new`, the recorder's configured ones for `Recorder::call`.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Module path of the function
    pub module: String,
    /// Function name
    pub function: String,
    /// Positional arguments
    pub args: Vec<EncodedValue>,
    /// Keyword arguments
    pub kwargs: BTreeMap<String, EncodedValue>,
    limits: Limits,
}

impl Call {
    /// A call with no arguments
    pub fn new(module: impl Into<String>, function: impl Into<String>) -> Self {
        Call {
            module: module.into(),
            function: function.into(),
            args: Vec::new(),
            kwargs: BTreeMap::new(),
            limits: Limits::default(),
        }
    }

    /// Encode later arguments under `limits`
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Append a positional argument
    pub fn arg<T: Encode + ?Sized>(mut self, value: &T) -> CodecResult<Self> {
        self.args.push(Encoder::new(self.limits).encode(value)?);
        Ok(self)
    }

    /// Set a keyword argument
    pub fn kwarg<T: Encode + ?Sized>(mut self, name: impl Into<String>, value: &T) -> CodecResult<Self> {
        let encoded = Encoder::new(self.limits).encode(value)?;
        self.kwargs.insert(name.into(), encoded);
        Ok(self)
    }

    /// `module.function`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.function)
    }

    fn to_record(&self, result: &EncodedValue) -> CodecResult<TestRecord> {
        TestRecord::new(
            self.module.clone(),
            self.function.clone(),
            self.args.clone(),
            self.kwargs.clone(),
            result.clone(),
        )
    }
}

// ============================================================================
// Options and outcomes
// ============================================================================

/// Per-call overrides of the recorder configuration
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CheckOptions {
    /// Float tolerance for this call
    pub tolerance: Option<f64>,
    /// Force update mode for this call
    pub update: bool,
    /// Override `raise_on_error` for this call
    pub raise_on_error: Option<bool>,
}

/// What `Recorder::check` did with a call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No record existed; the result was saved
    Recorded,
    /// Update mode replaced the existing record
    Updated,
    /// The fresh result matches the record
    Passed,
    /// The fresh result differs from the record (only when not raising)
    Failed(MatchResult),
    /// The existing record could not be loaded; nothing was saved
    Skipped(String),
}

impl Outcome {
    /// Returns true unless a regression was found
    pub fn is_ok(&self) -> bool {
        !matches!(self, Outcome::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Recorded => f.write_str("recorded"),
            Outcome::Updated => f.write_str("updated"),
            Outcome::Passed => f.write_str("passed"),
            Outcome::Failed(result) => write!(f, "failed: {}", result.message),
            Outcome::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}

enum Lookup {
    Absent,
    Found(TestRecord),
    Unreadable(StoreError),
}

/// Effective settings of one check
#[derive(Clone, Copy)]
struct Policy {
    matcher: Matcher,
    update: bool,
    raise_on_error: bool,
}

// ============================================================================
// Recorder
// ============================================================================

/// Records results on first sight and compares them afterwards
#[derive(Debug)]
pub struct Recorder {
    config: RegrestConfig,
    store: RecordStore,
    matcher: Matcher,
}

impl Recorder {
    /// Open the store named by `config`, creating its directory
    pub fn open(config: RegrestConfig) -> EngineResult<Self> {
        config.validate()?;
        let store = RecordStore::open(config.store_config())?;
        let matcher = config.matcher();
        debug!(
            dir = %config.storage_dir.display(),
            tolerance = config.tolerance,
            update_mode = config.update_mode,
            raise_on_error = config.raise_on_error,
            "Opened recorder"
        );
        Ok(Recorder {
            config,
            store,
            matcher,
        })
    }

    /// Open with defaults and `REGREST_*` environment overrides
    pub fn from_env() -> EngineResult<Self> {
        Self::open(RegrestConfig::default().with_env_overrides()?)
    }

    /// The record store
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// The active configuration
    pub fn config(&self) -> &RegrestConfig {
        &self.config
    }

    /// A call whose arguments encode under the configured limits
    pub fn call(&self, module: impl Into<String>, function: impl Into<String>) -> Call {
        Call::new(module, function).with_limits(self.config.limits())
    }

    /// Make the object types reachable from `T` loadable
    pub fn register<T: Decode>(&self) {
        self.store.register::<T>();
    }

    /// Encode `result` and check it against the record of `call`
    pub fn record<R: Encode + Decode>(
        &self,
        call: &Call,
        result: &R,
        options: CheckOptions,
    ) -> EngineResult<Outcome> {
        self.register::<R>();
        let encoded = Encoder::new(self.config.limits()).encode(result)?;
        self.check(call, &encoded, options)
    }

    /// Check an encoded result against the record of `call`
    pub fn check(
        &self,
        call: &Call,
        result: &EncodedValue,
        options: CheckOptions,
    ) -> EngineResult<Outcome> {
        let limits = self.config.limits();
        for value in call.args.iter().chain(call.kwargs.values()) {
            limits.validate_value(value)?;
        }
        limits.validate_value(result)?;

        let policy = self.policy(options);
        match self.lookup(call)? {
            Lookup::Unreadable(source) => self.skip(call, source, policy),
            Lookup::Found(_) if policy.update => {
                let record = call.to_record(result)?;
                self.store.save(&record)?;
                info!(
                    module = %call.module,
                    function = %call.function,
                    record_id = %record.record_id,
                    "Updated"
                );
                Ok(Outcome::Updated)
            }
            Lookup::Found(existing) => self.compare(call, &existing, result, policy),
            Lookup::Absent => self.create(call, result, policy),
        }
    }

    fn policy(&self, options: CheckOptions) -> Policy {
        let matcher = match options.tolerance {
            Some(tolerance) => Matcher::new(tolerance).with_limits(self.config.limits()),
            None => self.matcher,
        };
        Policy {
            matcher,
            update: options.update || self.config.update_mode,
            raise_on_error: options.raise_on_error.unwrap_or(self.config.raise_on_error),
        }
    }

    fn lookup(&self, call: &Call) -> EngineResult<Lookup> {
        match self
            .store
            .find(&call.module, &call.function, &call.args, &call.kwargs)
        {
            Ok(Some(record)) => Ok(Lookup::Found(record)),
            Ok(None) => Ok(Lookup::Absent),
            Err(e) if e.is_load_failure() => Ok(Lookup::Unreadable(e)),
            Err(e) => Err(e.into()),
        }
    }

    fn create(&self, call: &Call, result: &EncodedValue, policy: Policy) -> EngineResult<Outcome> {
        let record = call.to_record(result)?;
        if policy.update {
            self.store.save(&record)?;
        } else if !self.store.insert(&record)? {
            // Another writer recorded this call first; compare against theirs.
            debug!(record_id = %record.record_id, "Lost record race");
            return match self.lookup(call)? {
                Lookup::Found(existing) => self.compare(call, &existing, result, policy),
                Lookup::Unreadable(source) => self.skip(call, source, policy),
                Lookup::Absent => {
                    self.store.save(&record)?;
                    self.recorded(call, &record)
                }
            };
        }
        self.recorded(call, &record)
    }

    fn recorded(&self, call: &Call, record: &TestRecord) -> EngineResult<Outcome> {
        info!(
            module = %call.module,
            function = %call.function,
            record_id = %record.record_id,
            "Recorded"
        );
        Ok(Outcome::Recorded)
    }

    fn compare(
        &self,
        call: &Call,
        existing: &TestRecord,
        result: &EncodedValue,
        policy: Policy,
    ) -> EngineResult<Outcome> {
        let verdict = policy.matcher.compare(&existing.result, result);
        if verdict.passed {
            info!(
                module = %call.module,
                function = %call.function,
                record_id = %existing.record_id,
                "Passed"
            );
            return Ok(Outcome::Passed);
        }

        if policy.raise_on_error {
            return Err(EngineError::Regression {
                module: call.module.clone(),
                function: call.function.clone(),
                message: verdict.message,
            });
        }
        error!(
            module = %call.module,
            function = %call.function,
            record_id = %existing.record_id,
            "Regression test failed for {}",
            call.qualified_name()
        );
        for line in verdict.message.lines() {
            error!("{}", line);
        }
        Ok(Outcome::Failed(verdict))
    }

    fn skip(&self, call: &Call, source: StoreError, policy: Policy) -> EngineResult<Outcome> {
        if policy.raise_on_error {
            return Err(EngineError::RecordLoad {
                module: call.module.clone(),
                function: call.function.clone(),
                source,
            });
        }
        error!(
            module = %call.module,
            function = %call.function,
            "Failed to load existing record for {}",
            call.qualified_name()
        );
        let reason = source.to_string();
        for line in reason.lines() {
            error!("{}", line);
        }
        warn!(
            module = %call.module,
            function = %call.function,
            "Skipping save to preserve the existing record"
        );
        Ok(Outcome::Skipped(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn recorder(dir: &TempDir) -> Recorder {
        Recorder::open(RegrestConfig::with_storage_dir(dir.path())).unwrap()
    }

    fn add_call(a: i64, b: i64) -> Call {
        Call::new("calc", "add").arg(&a).unwrap().arg(&b).unwrap()
    }

    #[test]
    fn test_first_call_records() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder(&dir);
        let outcome = recorder
            .record(&add_call(1, 2), &3i64, CheckOptions::default())
            .unwrap();
        assert_eq!(outcome, Outcome::Recorded);
        assert_eq!(recorder.store().list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_second_call_passes() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder(&dir);
        let call = add_call(1, 2);
        recorder.record(&call, &3i64, CheckOptions::default()).unwrap();
        let outcome = recorder.record(&call, &3i64, CheckOptions::default()).unwrap();
        assert_eq!(outcome, Outcome::Passed);
    }

    #[test]
    fn test_mismatch_without_raise_is_reported() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder(&dir);
        let call = add_call(1, 2);
        recorder.record(&call, &3i64, CheckOptions::default()).unwrap();

        let outcome = recorder.record(&call, &4i64, CheckOptions::default()).unwrap();
        match outcome {
            Outcome::Failed(result) => {
                assert_eq!(result.message, "root: expected 3, got 4");
            }
            other => panic!("expected a failure, got {:?}", other),
        }
        assert!(!Outcome::Failed(MatchResult::pass()).is_ok());
    }

    #[test]
    fn test_mismatch_with_raise_is_an_error() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder(&dir);
        let call = add_call(1, 2);
        recorder.record(&call, &3i64, CheckOptions::default()).unwrap();

        let options = CheckOptions {
            raise_on_error: Some(true),
            ..CheckOptions::default()
        };
        let err = recorder.record(&call, &4i64, options).unwrap_err();
        assert!(err.is_regression());
        assert!(err
            .to_string()
            .starts_with("Regression test failed for calc.add\n"));
    }

    #[test]
    fn test_tolerance_override() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder(&dir);
        let call = Call::new("calc", "sqrt").arg(&2.0f64).unwrap();
        recorder
            .record(&call, &1.41421f64, CheckOptions::default())
            .unwrap();

        let loose = CheckOptions {
            tolerance: Some(1e-3),
            ..CheckOptions::default()
        };
        assert_eq!(
            recorder.record(&call, &1.41421356f64, loose).unwrap(),
            Outcome::Passed
        );
        assert!(matches!(
            recorder
                .record(&call, &1.41421356f64, CheckOptions::default())
                .unwrap(),
            Outcome::Failed(_)
        ));
    }

    #[test]
    fn test_update_overwrites() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder(&dir);
        let call = add_call(1, 2);
        recorder.record(&call, &3i64, CheckOptions::default()).unwrap();

        let update = CheckOptions {
            update: true,
            ..CheckOptions::default()
        };
        assert_eq!(
            recorder.record(&call, &4i64, update).unwrap(),
            Outcome::Updated
        );
        assert_eq!(
            recorder.record(&call, &4i64, CheckOptions::default()).unwrap(),
            Outcome::Passed
        );
    }

    #[test]
    fn test_update_mode_records_new_calls() {
        let dir = TempDir::new().unwrap();
        let config = RegrestConfig {
            update_mode: true,
            ..RegrestConfig::with_storage_dir(dir.path())
        };
        let recorder = Recorder::open(config).unwrap();
        assert_eq!(
            recorder
                .record(&add_call(5, 5), &10i64, CheckOptions::default())
                .unwrap(),
            Outcome::Recorded
        );
    }

    #[test]
    fn test_kwargs_are_part_of_identity() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder(&dir);
        let plain = Call::new("fmt", "pad").arg("x").unwrap();
        let padded = plain.clone().kwarg("width", &4u32).unwrap();

        recorder.record(&plain, &"x".to_string(), CheckOptions::default()).unwrap();
        assert_eq!(
            recorder
                .record(&padded, &"x   ".to_string(), CheckOptions::default())
                .unwrap(),
            Outcome::Recorded
        );
    }

    #[test]
    fn test_corrupt_record_is_skipped() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder(&dir);
        let call = add_call(1, 2);
        recorder.record(&call, &3i64, CheckOptions::default()).unwrap();

        let record_id = recorder
            .store()
            .fingerprint(&call.module, &call.function, &call.args, &call.kwargs)
            .unwrap();
        let path = recorder
            .store()
            .path_for(&call.module, &call.function, &record_id);
        std::fs::write(&path, b"{ not json").unwrap();

        let outcome = recorder.record(&call, &3i64, CheckOptions::default()).unwrap();
        assert!(matches!(outcome, Outcome::Skipped(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"{ not json");

        let raise = CheckOptions {
            raise_on_error: Some(true),
            ..CheckOptions::default()
        };
        let err = recorder.record(&call, &3i64, raise).unwrap_err();
        assert!(matches!(err, EngineError::RecordLoad { .. }));
    }

    #[test]
    fn test_too_deep_result_is_a_codec_error() {
        let dir = TempDir::new().unwrap();
        let config = RegrestConfig {
            max_depth: 2,
            ..RegrestConfig::with_storage_dir(dir.path())
        };
        let recorder = Recorder::open(config).unwrap();
        let nested = vec![vec![vec![1i64]]];
        let err = recorder
            .record(&Call::new("m", "f"), &nested, CheckOptions::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::Codec(_)));
    }
}
