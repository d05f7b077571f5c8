//! Call fingerprints
//!
//! A record id is SHA-256 over a canonical JSON encoding of the call:
//!
//! ```text
//! {"v":1,"module":..,"function":..,"args":[..],"kwargs":[[name,value],..]}
//! ```
//!
//! Every encoded value is put in canonical form first (map entries sorted by
//! key, set elements sorted), and kwargs are ordered by name. Two calls that
//! differ only in kwarg order or hash-container iteration order get the same
//! id; any difference in positional order or in a value changes it.
//!
//! The result and timestamp are not part of the fingerprint.

use std::collections::BTreeMap;

use regrest_core::{CodecError, CodecResult, EncodedValue};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::record::RecordId;

/// Version of the canonical encoding; bump when it changes
pub const FINGERPRINT_VERSION: u32 = 1;

#[derive(Serialize)]
struct CallIdentity<'a> {
    v: u32,
    module: &'a str,
    function: &'a str,
    args: Vec<EncodedValue>,
    kwargs: Vec<(&'a str, EncodedValue)>,
}

/// Compute the record id of a call
pub fn fingerprint(
    module: &str,
    function: &str,
    args: &[EncodedValue],
    kwargs: &BTreeMap<String, EncodedValue>,
) -> CodecResult<RecordId> {
    let identity = CallIdentity {
        v: FINGERPRINT_VERSION,
        module,
        function,
        args: args.iter().map(EncodedValue::canonical).collect(),
        kwargs: kwargs
            .iter()
            .map(|(name, value)| (name.as_str(), value.canonical()))
            .collect(),
    };

    let mut hasher = Sha256::new();
    serde_json::to_writer(&mut hasher, &identity)
        .map_err(|e| CodecError::Unencodable(format!("call identity: {}", e)))?;
    Ok(RecordId::from_digest(&hasher.finalize()))
}
