//! Custom error types for the common library
//!
//! This module defines the errors raised while connecting to the database and
//! while executing operations through the document store adapter.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors surfaced by a [`crate::store::Collection`]
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique index rejected the write
    #[error("Duplicate key in collection {collection}: {index}")]
    Duplicate {
        collection: &'static str,
        index: String,
    },

    /// The filter, sort or update referenced a field the collection does not declare
    #[error("Unknown field {field} in collection {collection}")]
    UnknownField {
        collection: &'static str,
        field: String,
    },

    /// A stored document could not be read back into its declared shape
    #[error("Failed to decode field {field}: {reason}")]
    Decode { field: String, reason: String },

    /// Transport or driver failure
    #[error("Store backend error: {0}")]
    Backend(#[from] SqlxError),
}

impl StoreError {
    /// True when the error is a uniqueness violation
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;
