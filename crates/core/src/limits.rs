//! Nesting limits for encoded values
//!
//! The codec, the type registry and the matcher all walk value graphs
//! recursively. Each walk is bounded by the same `Limits::max_depth` so a
//! value that encodes successfully can always be resolved and compared.
//!
//! ## Contract
//!
//! `DEFAULT_MAX_DEPTH` is part of the on-disk contract: records written with
//! the default limits must load with the default limits.

use crate::error::{CodecError, CodecResult};
use crate::value::EncodedValue;

/// Default maximum nesting depth (containers and objects)
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Recursion limits shared by encoder, decoder, registry and matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum nesting depth (default: 128)
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Limits {
    /// Create limits with a custom depth bound
    pub fn with_max_depth(max_depth: usize) -> Self {
        Limits { max_depth }
    }

    /// Create limits with small values for testing
    pub fn with_small_limits() -> Self {
        Limits { max_depth: 8 }
    }

    /// Fails if entering one more level from `depth` would pass the bound
    pub fn check_depth(&self, depth: usize) -> CodecResult<()> {
        if depth >= self.max_depth {
            return Err(CodecError::DepthExceeded {
                max: self.max_depth,
            });
        }
        Ok(())
    }

    /// Validate an already-encoded value against the depth bound
    ///
    /// Values produced by `Encoder` always pass; this guards values that were
    /// assembled by hand or read from disk.
    pub fn validate_value(&self, value: &EncodedValue) -> CodecResult<()> {
        self.validate_value_impl(value, 0)
    }

    fn validate_value_impl(&self, value: &EncodedValue, depth: usize) -> CodecResult<()> {
        match value {
            EncodedValue::List(items) | EncodedValue::Set(items) => {
                self.check_depth(depth)?;
                for item in items {
                    self.validate_value_impl(item, depth + 1)?;
                }
                Ok(())
            }
            EncodedValue::Map(entries) | EncodedValue::Object { fields: entries, .. } => {
                self.check_depth(depth)?;
                for (_, v) in entries {
                    self.validate_value_impl(v, depth + 1)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
