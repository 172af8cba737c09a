//! Error types for telemetry decoding
//!
//! Decode failures drop the message before any side effect happens.

use thiserror::Error;

/// Failure to turn a raw bus payload into a `Reading`
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error("malformed reading: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("location must be non-empty")]
    EmptyLocation,
}

impl DecodeError {
    /// Short label for structured logging
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::NotUtf8(_) => "not_utf8",
            DecodeError::Malformed(_) => "malformed",
            DecodeError::EmptyLocation => "empty_location",
        }
    }
}
