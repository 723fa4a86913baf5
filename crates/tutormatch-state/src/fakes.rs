//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryPreferenceSource`, `MemoryStudentDirectory`,
//! `MemoryTutorDirectory`, and `MemoryAssignmentLedger` that satisfy the
//! trait contracts without any external dependencies.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::identity::StudentKey;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryPreferenceSource
// ---------------------------------------------------------------------------

/// In-memory preference source backed by an append-only `Vec`.
#[derive(Debug, Default)]
pub struct MemoryPreferenceSource {
    records: Mutex<Vec<PreferenceRecord>>,
}

impl MemoryPreferenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a submission. The stored `seq` is the insertion position.
    pub fn submit(&self, mut record: PreferenceRecord) {
        let mut records = self.records.lock().unwrap();
        record.seq = records.len() as u64;
        records.push(record);
    }
}

#[async_trait]
impl PreferenceSource for MemoryPreferenceSource {
    async fn list_preferences(&self) -> StorageResult<Vec<PreferenceRecord>> {
        Ok(self.records.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// MemoryStudentDirectory
// ---------------------------------------------------------------------------

/// In-memory student directory keyed by normalized identity.
#[derive(Debug, Default)]
pub struct MemoryStudentDirectory {
    students: Mutex<BTreeMap<StudentKey, StudentRecord>>,
}

impl MemoryStudentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a student, replacing any record with the same identity.
    pub fn register(&self, record: StudentRecord) {
        self.students.lock().unwrap().insert(record.key(), record);
    }

    /// Remove a student; used to simulate directory drift.
    pub fn remove(&self, key: &StudentKey) -> Option<StudentRecord> {
        self.students.lock().unwrap().remove(key)
    }
}

#[async_trait]
impl StudentDirectory for MemoryStudentDirectory {
    async fn resolve(&self, key: &StudentKey) -> StorageResult<Option<StudentRecord>> {
        Ok(self.students.lock().unwrap().get(key).cloned())
    }

    async fn list_students(&self) -> StorageResult<Vec<StudentRecord>> {
        Ok(self.students.lock().unwrap().values().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryTutorDirectory
// ---------------------------------------------------------------------------

/// In-memory tutor directory keyed by tutor id.
#[derive(Debug, Default)]
pub struct MemoryTutorDirectory {
    tutors: Mutex<BTreeMap<TutorId, TutorRecord>>,
}

impl MemoryTutorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, record: TutorRecord) {
        self.tutors
            .lock()
            .unwrap()
            .insert(record.tutor_id.clone(), record);
    }
}

#[async_trait]
impl TutorDirectory for MemoryTutorDirectory {
    async fn list_tutors(&self) -> StorageResult<Vec<TutorRecord>> {
        Ok(self.tutors.lock().unwrap().values().cloned().collect())
    }

    async fn get_tutor(&self, tutor_id: &TutorId) -> StorageResult<Option<TutorRecord>> {
        Ok(self.tutors.lock().unwrap().get(tutor_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// MemoryAssignmentLedger
// ---------------------------------------------------------------------------

/// In-memory assignment ledger; insertion order is preserved.
#[derive(Debug, Default)]
pub struct MemoryAssignmentLedger {
    rows: Mutex<Vec<AssignmentRecord>>,
}

impl MemoryAssignmentLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssignmentLedger for MemoryAssignmentLedger {
    async fn delete_all(&self) -> StorageResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let removed = rows.len() as u64;
        rows.clear();
        Ok(removed)
    }

    async fn insert(&self, assignment: AssignmentRecord) -> StorageResult<()> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|r| r.student == assignment.student) {
            return Err(StorageError::DuplicateAssignment {
                student: assignment.student.to_string(),
            });
        }
        rows.push(assignment);
        Ok(())
    }

    async fn count_by_tutor(&self, tutor_id: &TutorId) -> StorageResult<u64> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().filter(|r| &r.tutor_id == tutor_id).count() as u64)
    }

    async fn list_all(&self) -> StorageResult<Vec<AssignmentRecord>> {
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn replace_all(&self, assignments: Vec<AssignmentRecord>) -> StorageResult<LedgerSwap> {
        check_unique_students(&assignments)?;
        let mut rows = self.rows.lock().unwrap();
        let deleted = rows.len() as u64;
        let inserted = assignments.len() as u64;
        *rows = assignments;
        Ok(LedgerSwap { deleted, inserted })
    }
}
