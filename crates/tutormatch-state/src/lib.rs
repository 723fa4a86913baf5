//! tutormatch-state: persistence layer for tutormatch
//!
//! This crate handles all I/O for the allocation engine: the collaborator
//! traits it consumes, in-memory fakes of each, and a SurrealDB backend.
//!
//! ## Key Components
//!
//! - `StudentKey`: normalized `(name, class section)` identity
//! - `storage_traits`: `PreferenceSource`, `StudentDirectory`,
//!   `TutorDirectory`, `AssignmentLedger`
//! - `SurrealHandle`: connection, import helpers, read-side traits
//! - `SurrealAssignmentLedger`: transactional ledger replacement

mod error;
pub mod fakes;
mod handle;
pub mod identity;
pub mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal_ledger;

pub use error::{StateError, StorageError};
pub use handle::{CloudConfig, SurrealHandle};
pub use identity::{normalize_text, StudentKey};
pub use storage_traits::{
    AssignmentKind, AssignmentLedger, AssignmentRecord, LedgerSwap, PreferenceRecord,
    PreferenceSource, StorageResult, StudentDirectory, StudentRecord, TutorDirectory, TutorId,
    TutorRecord,
};
pub use surreal_ledger::SurrealAssignmentLedger;

/// Result type for tutormatch-state operations
pub type Result<T> = std::result::Result<T, StateError>;
