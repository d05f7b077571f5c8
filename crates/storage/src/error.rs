//! Error types for the record store
//!
//! A record that exists but cannot be loaded is never reported as absent.
//! The variants separate the three ways loading can fail so callers can pick
//! a policy per kind:
//! - `TypeResolution`: the file is intact but names a type that is gone
//! - `Corrupt`: the file is not a valid record
//! - `Storage`: the filesystem refused the operation

use std::io;
use std::path::PathBuf;

use regrest_core::{CodecError, DecodeError, TypeResolutionError};
use thiserror::Error;

/// Result type alias for record store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Record store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// A value could not be encoded or a stored value has the wrong shape
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A stored object names a type the current program cannot rebuild
    #[error(transparent)]
    TypeResolution(#[from] TypeResolutionError),

    /// The record file exists but is not a valid record
    #[error("Corrupt record file {}: {reason}", path.display())]
    Corrupt {
        /// Record file
        path: PathBuf,
        /// What is wrong with it
        reason: String,
    },

    /// Filesystem failure
    #[error("Storage error during {op} on {}: {source}", path.display())]
    Storage {
        /// Operation that failed (read, write, rename, ...)
        op: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A delete pattern could not be parsed
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Pattern as given
        pattern: String,
        /// Parser message
        reason: String,
    },
}

impl StoreError {
    /// Build a `Storage` error from an I/O failure
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Storage {
            op,
            path: path.into(),
            source,
        }
    }

    /// Build a `Corrupt` error
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StoreError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the record exists but names an unavailable type
    pub fn is_type_resolution(&self) -> bool {
        matches!(self, StoreError::TypeResolution(_))
    }

    /// Returns true if the record file is malformed
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StoreError::Corrupt { .. })
    }

    /// Returns true if this is a load failure rather than an I/O or pattern error
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            StoreError::TypeResolution(_) | StoreError::Corrupt { .. } | StoreError::Codec(_)
        )
    }
}

impl From<DecodeError> for StoreError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::Codec(e) => StoreError::Codec(e),
            DecodeError::TypeResolution(e) => StoreError::TypeResolution(e),
        }
    }
}
