//! Recording engine for regrest
//!
//! This crate orchestrates the store and the matcher:
//! - Recorder: find → (save | compare) for one call, with raise/log policy
//! - Regression: function wrapper holding the original callable
//! - verify: replay recorded calls through registered originals
//! - RegrestConfig: `regrest.toml` and `REGREST_*` environment overrides
//! - logging: stderr subscriber driven by `REGREST_LOG_LEVEL`
//!
//! The engine is the only component that decides whether a regression is
//! an error or a log line.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod args;
pub mod config;
pub mod error;
pub mod logging;
pub mod recorder;
pub mod regression;
pub mod verify;

pub use args::CallArgs;
pub use config::{RegrestConfig, CONFIG_FILE_NAME};
pub use error::{EngineError, EngineResult};
pub use logging::init_logging;
pub use recorder::{Call, CheckOptions, Outcome, Recorder};
pub use regression::Regression;
pub use verify::{verify, FunctionTable, VerifyOutcome, VerifyReport, VerifyStatus};
