//! Storage trait definitions for tutormatch
//!
//! These traits define the collaborators of the allocation engine:
//! - `PreferenceSource`: raw ranked-tutor submissions (read-only)
//! - `StudentDirectory`: resolves a normalized identity to a student record
//! - `TutorDirectory`: tutor records and their categories
//! - `AssignmentLedger`: the engine's own output, replaced wholesale on recompute
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::identity::StudentKey;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Opaque tutor identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TutorId(pub String);

impl TutorId {
    pub fn new(id: impl Into<String>) -> Self {
        TutorId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TutorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A durable student record as held by the student directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    /// Directory-assigned identifier
    pub student_id: String,
    /// Name as registered (display form)
    pub name: String,
    /// Class section as registered (display form)
    pub class_section: String,
}

impl StudentRecord {
    /// Create a record with a fresh identifier.
    pub fn new(name: impl Into<String>, class_section: impl Into<String>) -> Self {
        Self {
            student_id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            class_section: class_section.into(),
        }
    }

    pub fn key(&self) -> StudentKey {
        StudentKey::new(&self.name, &self.class_section)
    }
}

/// A tutor and the role category its capacity derives from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorRecord {
    pub tutor_id: TutorId,
    pub name: String,
    /// Free-text role or subject, e.g. "MATEMÁTICA" or "COORDENADORA PEDAGÓGICA"
    pub category: String,
}

impl TutorRecord {
    pub fn new(
        tutor_id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            tutor_id: TutorId::new(tutor_id),
            name: name.into(),
            category: category.into(),
        }
    }
}

/// One submission of a student's ranked tutor list.
///
/// Several submissions may exist for the same student; the latest by
/// `submitted_at` (then by `seq`) is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    /// Student name as submitted
    pub student_name: String,
    /// Class section as submitted
    pub class_section: String,
    /// Tutor ids, most preferred first (rank 1 is index 0)
    pub ranked_tutors: Vec<TutorId>,
    pub submitted_at: DateTime<Utc>,
    /// Insertion order within the source; assigned by the store
    #[serde(default)]
    pub seq: u64,
}

impl PreferenceRecord {
    pub fn new(
        student_name: impl Into<String>,
        class_section: impl Into<String>,
        ranked_tutors: Vec<TutorId>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            student_name: student_name.into(),
            class_section: class_section.into(),
            ranked_tutors,
            submitted_at,
            seq: 0,
        }
    }

    pub fn key(&self) -> StudentKey {
        StudentKey::new(&self.student_name, &self.class_section)
    }
}

/// How an assignment was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentKind {
    /// Honored one of the student's ranked choices
    Preferred,
    /// No ranked choice had room; least-loaded tutor chosen
    Fallback,
}

impl AssignmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentKind::Preferred => "preferred",
            AssignmentKind::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for AssignmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved student-to-tutor pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub student: StudentKey,
    pub student_id: String,
    pub tutor_id: TutorId,
    pub kind: AssignmentKind,
    /// 1-based rank for preferred assignments, `None` for fallback
    pub rank: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl AssignmentRecord {
    pub fn preferred(student: &StudentRecord, tutor_id: TutorId, rank: u32) -> Self {
        Self {
            student: student.key(),
            student_id: student.student_id.clone(),
            tutor_id,
            kind: AssignmentKind::Preferred,
            rank: Some(rank),
            created_at: Utc::now(),
        }
    }

    pub fn fallback(student: &StudentRecord, tutor_id: TutorId) -> Self {
        Self {
            student: student.key(),
            student_id: student.student_id.clone(),
            tutor_id,
            kind: AssignmentKind::Fallback,
            rank: None,
            created_at: Utc::now(),
        }
    }
}

/// Counts produced by an atomic ledger replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerSwap {
    pub deleted: u64,
    pub inserted: u64,
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Source of raw preference submissions.
#[async_trait]
pub trait PreferenceSource: Send + Sync {
    /// All stored submissions, including superseded ones.
    async fn list_preferences(&self) -> StorageResult<Vec<PreferenceRecord>>;
}

/// Directory of registered students.
#[async_trait]
pub trait StudentDirectory: Send + Sync {
    /// Resolve a normalized identity. `Ok(None)` when no such student exists.
    async fn resolve(&self, key: &StudentKey) -> StorageResult<Option<StudentRecord>>;

    /// Every registered student.
    async fn list_students(&self) -> StorageResult<Vec<StudentRecord>>;
}

/// Directory of tutors.
#[async_trait]
pub trait TutorDirectory: Send + Sync {
    async fn list_tutors(&self) -> StorageResult<Vec<TutorRecord>>;

    async fn get_tutor(&self, tutor_id: &TutorId) -> StorageResult<Option<TutorRecord>>;

    /// Category of a tutor, `Ok(None)` when the tutor is unknown.
    async fn category(&self, tutor_id: &TutorId) -> StorageResult<Option<String>> {
        Ok(self.get_tutor(tutor_id).await?.map(|t| t.category))
    }
}

/// Durable assignment ledger.
///
/// Guarantees:
/// - At most one assignment per student key; a second `insert` for the same
///   student fails with `StorageError::DuplicateAssignment`.
/// - `replace_all` is atomic: either the whole new set is visible afterwards
///   or the previous set is left untouched.
#[async_trait]
pub trait AssignmentLedger: Send + Sync {
    /// Delete every assignment, returning how many were removed.
    async fn delete_all(&self) -> StorageResult<u64>;

    /// Insert a single assignment.
    async fn insert(&self, assignment: AssignmentRecord) -> StorageResult<()>;

    /// Number of assignments referencing a tutor.
    async fn count_by_tutor(&self, tutor_id: &TutorId) -> StorageResult<u64>;

    /// All assignments in insertion order.
    async fn list_all(&self) -> StorageResult<Vec<AssignmentRecord>>;

    /// Atomically swap the whole ledger for `assignments`.
    async fn replace_all(&self, assignments: Vec<AssignmentRecord>) -> StorageResult<LedgerSwap>;
}

/// Reject a batch that assigns the same student twice.
pub fn check_unique_students(assignments: &[AssignmentRecord]) -> StorageResult<()> {
    let mut seen = std::collections::HashSet::new();
    for assignment in assignments {
        if !seen.insert(&assignment.student) {
            return Err(StorageError::DuplicateAssignment {
                student: assignment.student.to_string(),
            });
        }
    }
    Ok(())
}
