//! Error types for oplog record handling.

use thiserror::Error;

/// Errors raised while building or inspecting an oplog record.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The payload could not be decoded as BSON.
    #[error("BSON decode error: {0}")]
    Bson(#[from] bson::de::Error),

    /// A document could not be encoded back to BSON bytes.
    #[error("BSON encode error: {0}")]
    Encode(#[from] bson::ser::Error),

    /// A required oplog field is absent.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A field is present but has the wrong type or value.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// The `op` field names an operation this crate does not know.
    #[error("Unknown operation type: {0:?}")]
    UnknownOp(String),
}

pub type Result<T> = std::result::Result<T, RecordError>;
