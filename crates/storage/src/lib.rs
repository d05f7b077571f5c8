//! Record store for regrest
//!
//! This crate persists recorded calls and finds them again:
//! - TestRecord: one call's identity, arguments, result and timestamp
//! - fingerprint: content-addressed record ids (SHA-256 over canonical JSON)
//! - RecordStore: find/get/save/insert/list/delete over a directory of JSON files
//! - StoreStats: record counts by module and function
//!
//! # Durability
//!
//! Record files are written through a temp file, `fsync` and `rename` (or
//! `hard_link` for create-if-absent), so a crash never leaves a torn record.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod atomic;
pub mod error;
pub mod fingerprint;
pub mod record;
pub mod stats;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use fingerprint::{fingerprint, FINGERPRINT_VERSION};
pub use record::{
    record_file_name, InvalidRecordId, RecordHeader, RecordId, TestRecord, FORMAT_VERSION,
};
pub use stats::StoreStats;
pub use store::{Listing, LoadFailure, RecordStore, StoreConfig, DEFAULT_STORE_DIR};
