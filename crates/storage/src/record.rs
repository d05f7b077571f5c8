//! Test records and their on-disk form
//!
//! One record file per recorded call, as pretty-printed JSON:
//!
//! ```text
//! {
//!   "format_version": 1,
//!   "record_id": "3f2a...",          32 lowercase hex chars
//!   "module": "billing::invoice",
//!   "function": "total",
//!   "args": [ <EncodedValue>, ... ],
//!   "kwargs": { "name": <EncodedValue>, ... },
//!   "result": <EncodedValue>,
//!   "timestamp": "2024-05-01T12:00:00Z"
//! }
//! ```
//!
//! The file is named `<module>.<function>.<record_id>.json` with characters
//! outside `[A-Za-z0-9_.-]` replaced by `_`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use regrest_core::{CodecResult, EncodedValue};
use serde::{Deserialize, Serialize};

use crate::fingerprint::fingerprint;

/// Current record file format version
pub const FORMAT_VERSION: u32 = 1;

/// Extension of record files
pub const RECORD_EXTENSION: &str = "json";

/// Length of a record id in hex characters
pub const RECORD_ID_LEN: usize = 32;

// Longer components are cut so file names stay well under path limits
const MAX_NAME_COMPONENT: usize = 80;

// ============================================================================
// RecordId
// ============================================================================

/// Fingerprint of a call: 128 bits of SHA-256, lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub(crate) fn from_digest(digest: &[u8]) -> Self {
        RecordId(
            digest
                .iter()
                .take(RECORD_ID_LEN / 2)
                .map(|b| format!("{:02x}", b))
                .collect(),
        )
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `s` has the shape of a record id
    pub fn is_valid(s: &str) -> bool {
        s.len() == RECORD_ID_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when parsing a malformed record id
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid record id '{0}': expected 32 lowercase hex characters")]
pub struct InvalidRecordId(pub String);

impl FromStr for RecordId {
    type Err = InvalidRecordId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if RecordId::is_valid(s) {
            Ok(RecordId(s.to_string()))
        } else {
            Err(InvalidRecordId(s.to_string()))
        }
    }
}

// ============================================================================
// TestRecord
// ============================================================================

/// One persisted observation: call identity, arguments and result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    /// Fingerprint of `(module, function, args, kwargs)`
    pub record_id: RecordId,
    /// Module of the recorded function
    pub module: String,
    /// Name of the recorded function
    pub function: String,
    /// Positional arguments
    pub args: Vec<EncodedValue>,
    /// Keyword arguments
    #[serde(default)]
    pub kwargs: BTreeMap<String, EncodedValue>,
    /// Return value
    pub result: EncodedValue,
    /// Creation or last update time; display and sorting only
    pub timestamp: DateTime<Utc>,
}

impl TestRecord {
    /// Create a record for a call, stamped with the current time
    pub fn new(
        module: impl Into<String>,
        function: impl Into<String>,
        args: Vec<EncodedValue>,
        kwargs: BTreeMap<String, EncodedValue>,
        result: EncodedValue,
    ) -> CodecResult<Self> {
        let module = module.into();
        let function = function.into();
        let record_id = fingerprint(&module, &function, &args, &kwargs)?;
        Ok(TestRecord {
            record_id,
            module,
            function,
            args,
            kwargs,
            result,
            timestamp: Utc::now(),
        })
    }

    /// Replace the timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// `module.function`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.function)
    }

    /// File name of this record inside the store directory
    pub fn file_name(&self) -> String {
        record_file_name(&self.module, &self.function, &self.record_id)
    }

    /// Metadata without the encoded values
    pub fn header(&self) -> RecordHeader {
        RecordHeader {
            format_version: FORMAT_VERSION,
            record_id: self.record_id.clone(),
            module: self.module.clone(),
            function: self.function.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// File name for a record: `<module>.<function>.<record_id>.json`
pub fn record_file_name(module: &str, function: &str, record_id: &RecordId) -> String {
    format!(
        "{}.{}.{}.{}",
        sanitize(module),
        sanitize(function),
        record_id,
        RECORD_EXTENSION
    )
}

fn sanitize(component: &str) -> String {
    let cleaned: String = component
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '.' => c,
            _ => '_',
        })
        .take(MAX_NAME_COMPONENT)
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

// ============================================================================
// On-disk form
// ============================================================================

/// Record metadata, read without decoding any encoded value
///
/// Used for pattern deletes and stats so records whose types no longer
/// resolve can still be listed and removed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordHeader {
    /// File format version
    pub format_version: u32,
    /// Record id
    pub record_id: RecordId,
    /// Module of the recorded function
    pub module: String,
    /// Name of the recorded function
    pub function: String,
    /// Creation or last update time
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
pub(crate) struct RecordFileRef<'a> {
    pub format_version: u32,
    #[serde(flatten)]
    pub record: &'a TestRecord,
}

#[derive(Deserialize)]
pub(crate) struct RecordFile {
    pub format_version: u32,
    pub record_id: RecordId,
    pub module: String,
    pub function: String,
    pub args: Vec<EncodedValue>,
    #[serde(default)]
    pub kwargs: BTreeMap<String, EncodedValue>,
    pub result: EncodedValue,
    pub timestamp: DateTime<Utc>,
}

impl From<RecordFile> for TestRecord {
    fn from(file: RecordFile) -> Self {
        TestRecord {
            record_id: file.record_id,
            module: file.module,
            function: file.function,
            args: file.args,
            kwargs: file.kwargs,
            result: file.result,
            timestamp: file.timestamp,
        }
    }
}
