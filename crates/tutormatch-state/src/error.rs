//! Error types for tutormatch-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the database.
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors returned by the storage traits.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend failed (unreachable, query rejected, transaction aborted).
    #[error("storage backend failure: {0}")]
    Backend(String),

    /// A student already holds an assignment in the ledger.
    #[error("student already has an assignment: {student}")]
    DuplicateAssignment { student: String },

    /// A record failed validation before reaching the backend.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl From<StateError> for StorageError {
    fn from(err: StateError) -> Self {
        StorageError::Backend(err.to_string())
    }
}
