//! Error types for the recorder
//!
//! `Regression` and `RecordLoad` are policy errors: they are only returned
//! when `raise_on_error` is set. Everything else is a failure of the
//! machinery and always propagates.

use regrest_core::{CodecError, DecodeError};
use regrest_storage::StoreError;
use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Record store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A value could not be encoded
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Stored arguments could not be decoded for replay
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The fresh result does not match the recorded one
    #[error("Regression test failed for {module}.{function}\n{message}")]
    Regression {
        /// Module of the function
        module: String,
        /// Function name
        function: String,
        /// Matcher message
        message: String,
    },

    /// The existing record could not be loaded
    #[error("Failed to load existing record for {module}.{function}\n{source}")]
    RecordLoad {
        /// Module of the function
        module: String,
        /// Function name
        function: String,
        /// Load failure
        #[source]
        source: StoreError,
    },
}

impl EngineError {
    /// Shorthand for a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        EngineError::Config(reason.into())
    }

    /// Returns true if this is a failed regression check
    pub fn is_regression(&self) -> bool {
        matches!(self, EngineError::Regression { .. })
    }
}
