//! Error types for the prefixmgr-core crate.

use crate::types::SourceType;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("unknown source type: {0}")]
    UnknownSourceType(String),

    #[error("invalid prefix key: {0}")]
    InvalidKey(String),

    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),

    #[error("entry for {prefix} has source type {actual}, expected {expected}")]
    SourceTypeMismatch {
        prefix: String,
        expected: SourceType,
        actual: SourceType,
    },

    #[error("record encode error: {0}")]
    Encode(String),

    #[error("record decode error: {0}")]
    Decode(String),
}
