//! Error taxonomy for the vector engine
//!
//! Every variant is recoverable by the caller: validation runs before any
//! mutation, so a failed operation leaves catalog and table state untouched.

use thiserror::Error;

/// Engine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VectorDbError {
    /// Bad schema at creation, or a row violating the schema
    #[error("Schema validation error: {0}")]
    SchemaValidation(String),

    /// Table already exists
    #[error("Table already exists: {0}")]
    TableExists(String),

    /// Table not found (never created, or dropped)
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Vector length differs from the schema's dimensionality
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Non-positive k, malformed predicate, and similar caller mistakes
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Fieldless view of [`VectorDbError`] for matching on the taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SchemaValidation,
    TableExists,
    TableNotFound,
    DimensionMismatch,
    InvalidArgument,
}

impl VectorDbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VectorDbError::SchemaValidation(_) => ErrorKind::SchemaValidation,
            VectorDbError::TableExists(_) => ErrorKind::TableExists,
            VectorDbError::TableNotFound(_) => ErrorKind::TableNotFound,
            VectorDbError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            VectorDbError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        VectorDbError::SchemaValidation(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        VectorDbError::InvalidArgument(msg.into())
    }
}

pub type VectorDbResult<T> = Result<T, VectorDbError>;

/// Checks a vector's length against the expected dimensionality
pub(crate) fn check_dims(expected: usize, got: usize) -> VectorDbResult<()> {
    if expected != got {
        return Err(VectorDbError::DimensionMismatch { expected, got });
    }
    Ok(())
}
