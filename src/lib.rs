//! regrest - record-and-compare regression testing
//!
//! The first call of a function with a given argument set records its
//! result; later calls with the same arguments compare the fresh result
//! against the record and report any difference as a regression.
//!
//! # Quick Start
//!
//! ```ignore
//! use regrest::{regression, Recorder, RegrestConfig};
//!
//! fn add((a, b): (i64, i64)) -> i64 {
//!     a + b
//! }
//!
//! let recorder = Recorder::open(RegrestConfig::default().with_env_overrides()?)?;
//! let add = regression!(add).tolerance(1e-6);
//!
//! // Recorded on the first run, compared on every later run
//! let sum = add.call(&recorder, (1, 2))?;
//! ```
//!
//! # Architecture
//!
//! - `regrest-core`: value codec (`EncodedValue`, `Encode`, `Decode`, `inspect_object!`)
//! - `regrest-storage`: record store (one JSON file per recorded call)
//! - `regrest-matcher`: tolerant structural comparison
//! - `regrest-engine`: recorder, function wrapper, verify, config, logging

pub use regrest_engine::{
    init_logging, regression, verify, Call, CallArgs, CheckOptions, EngineError, EngineResult,
    FunctionTable, Outcome, Recorder, Regression, RegrestConfig, VerifyOutcome, VerifyReport,
    VerifyStatus, CONFIG_FILE_NAME,
};

pub use regrest_core::{
    decode, encode, inspect_object, Bytes, CodecError, Decode, DecodeError, Encode, EncodedValue,
    Inspect, Limits, Opaque, ResolutionPolicy, TypeRegistry, TypeResolutionError,
};

pub use regrest_matcher::{compare, MatchResult, Matcher, DEFAULT_TOLERANCE};

pub use regrest_storage::{
    Listing, LoadFailure, RecordId, RecordStore, StoreConfig, StoreError, StoreStats, TestRecord,
};

/// Crates behind the facade, for APIs not re-exported here
pub mod crates {
    pub use regrest_core as core;
    pub use regrest_engine as engine;
    pub use regrest_matcher as matcher;
    pub use regrest_storage as storage;
}
