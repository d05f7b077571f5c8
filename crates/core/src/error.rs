//! Error types for the value codec
//!
//! Three layers, kept deliberately distinct so callers can tell them apart:
//! - `CodecError`: the value could not be encoded, or an encoded value has the
//!   wrong shape for the requested type
//! - `TypeResolutionError`: a tagged object names a type that the current
//!   environment cannot reconstruct
//! - `DecodeError`: either of the above, returned by `Decode`
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use thiserror::Error;

/// Result type alias for encoding operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Result type alias for decoding operations
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Structural codec failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// Nesting went past the configured bound
    #[error("Nesting depth exceeded: maximum is {max}")]
    DepthExceeded {
        /// Configured maximum depth
        max: usize,
    },

    /// A tagged object was reached again while it was still being encoded
    #[error("Cyclic reference detected while encoding '{type_name}'")]
    Cycle {
        /// Type name of the object that closes the cycle
        type_name: String,
    },

    /// The value cannot be represented at all
    #[error("Value cannot be encoded: {0}")]
    Unencodable(String),

    /// Encoded value has a different kind than the target type expects
    #[error("Unexpected value kind: expected {expected}, found {found}")]
    UnexpectedKind {
        /// Kind the decoder wanted
        expected: &'static str,
        /// Kind that was stored
        found: &'static str,
    },

    /// Encoded value has the right kind but unusable content
    #[error("Malformed encoded value: {0}")]
    Malformed(String),
}

impl CodecError {
    /// Shorthand for a kind mismatch
    pub fn unexpected_kind(expected: &'static str, found: &'static str) -> Self {
        CodecError::UnexpectedKind { expected, found }
    }
}

/// A tagged object refers to a type that cannot be reconstructed here
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cannot resolve type '{type_name}': {reason}")]
pub struct TypeResolutionError {
    /// Fully qualified type name stored in the record
    pub type_name: String,
    /// Why resolution failed
    pub reason: String,
}

impl TypeResolutionError {
    /// The type is not registered in the current environment
    pub fn unknown(type_name: impl Into<String>) -> Self {
        TypeResolutionError {
            type_name: type_name.into(),
            reason: "type is not registered (deleted or renamed?)".to_string(),
        }
    }

    /// The stored type differs from the one being decoded into
    pub fn mismatch(found: impl Into<String>, expected: &str) -> Self {
        TypeResolutionError {
            type_name: found.into(),
            reason: format!("expected an object of type '{}'", expected),
        }
    }
}

/// Errors returned by `Decode`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// Structural failure
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Unresolvable object type
    #[error(transparent)]
    TypeResolution(#[from] TypeResolutionError),
}

impl DecodeError {
    /// Returns true if this is a type resolution failure
    pub fn is_type_resolution(&self) -> bool {
        matches!(self, DecodeError::TypeResolution(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_depth() {
        let err = CodecError::DepthExceeded { max: 128 };
        let msg = err.to_string();
        assert!(msg.contains("depth exceeded"));
        assert!(msg.contains("128"));
    }

    #[test]
    fn test_error_display_cycle() {
        let err = CodecError::Cycle {
            type_name: "app::Node".to_string(),
        };
        assert!(err.to_string().contains("app::Node"));
    }

    #[test]
    fn test_error_display_unexpected_kind() {
        let err = CodecError::unexpected_kind("int", "str");
        let msg = err.to_string();
        assert!(msg.contains("expected int"));
        assert!(msg.contains("found str"));
    }

    #[test]
    fn test_type_resolution_unknown() {
        let err = TypeResolutionError::unknown("app::Address");
        let msg = err.to_string();
        assert!(msg.contains("app::Address"));
        assert!(msg.contains("not registered"));
    }

    #[test]
    fn test_decode_error_from_codec() {
        let err: DecodeError = CodecError::Malformed("bad".to_string()).into();
        assert!(matches!(err, DecodeError::Codec(_)));
        assert!(!err.is_type_resolution());
    }

    #[test]
    fn test_decode_error_from_type_resolution() {
        let err: DecodeError = TypeResolutionError::mismatch("a::B", "a::C").into();
        assert!(err.is_type_resolution());
        assert!(err.to_string().contains("a::C"));
    }
}
