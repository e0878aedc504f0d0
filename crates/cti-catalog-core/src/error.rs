//! Error types for the catalog core.

use thiserror::Error;

/// Errors raised while interpreting catalog data.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("offset {got} out of order: expected {expected}")]
    OutOfOrder { expected: u64, got: u64 },

    #[error("offset {offset} outside range ({from}, {to}]")]
    OutOfRange { offset: u64, from: u64, to: u64 },

    #[error("change set ends at {last}, requested up to {to}")]
    Truncated { last: u64, to: u64 },

    #[error("invalid range: from {from} is after to {to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("offset {offset} regresses checkpoint at {current}")]
    Regression { current: u64, offset: u64 },

    #[error("offset {offset} exceeds remote offset {remote}")]
    BeyondRemote { offset: u64, remote: u64 },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("unknown operation type: {0}")]
    UnknownOperation(String),
}

/// Errors applying a JSON patch operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("invalid pointer: {0}")]
    InvalidPointer(String),

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("index out of bounds at {path}: {index}")]
    IndexOutOfBounds { path: String, index: usize },

    #[error("target at {0} is not a container")]
    NotAContainer(String),

    #[error("operation {0} requires a value")]
    MissingValue(&'static str),

    #[error("operation {0} requires a from pointer")]
    MissingFrom(&'static str),

    #[error("test failed at {0}")]
    TestFailed(String),

    #[error("cannot move {from} into its own child {path}")]
    MoveIntoChild { from: String, path: String },
}
