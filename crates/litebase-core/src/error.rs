//! Error types for all LiteBase operations.

use std::io;
use thiserror::Error;

/// Top-level error type for LiteBase operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt database file: {0}")]
    CorruptFile(String),

    #[error("failed to encode snapshot: {0}")]
    Serialize(String),
}

/// Failures while turning a caller document into a stored row.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("field \"{0}\" can't be null")]
    RequiredFieldMissing(String),

    #[error("invalid value for field \"{field}\": expected {expected}")]
    InvalidType {
        field: String,
        expected: &'static str,
    },

    #[error("no value can be resolved for index field \"{0}\"")]
    UnresolvableIndex(String),

    #[error("row must be an object, got {0}")]
    NotAnObject(&'static str),
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown field \"{field}\" in table \"{table}\"")]
    UnknownField { table: String, field: String },

    #[error("table \"{0}\" is not attached to a storage")]
    Detached(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl EncodingError {
    pub(crate) fn invalid(field: &str, expected: &'static str) -> Self {
        EncodingError::InvalidType {
            field: field.to_string(),
            expected,
        }
    }
}
