//! SurrealDB-backed AssignmentLedger implementation
//!
//! Uses `schema::AssignmentRow` for persistence, converting to/from
//! `storage_traits::AssignmentRecord` at the boundary.

use async_trait::async_trait;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::handle::SurrealHandle;
use crate::schema::{key_column, AssignmentRow, CountRow};
use crate::storage_traits::{
    check_unique_students, AssignmentLedger, AssignmentRecord, LedgerSwap, StorageResult, TutorId,
};

/// SurrealDB-backed implementation of [`AssignmentLedger`].
#[derive(Clone)]
pub struct SurrealAssignmentLedger {
    db: Surreal<Any>,
}

impl SurrealAssignmentLedger {
    /// Share the connection of an existing handle.
    pub fn new(handle: &SurrealHandle) -> Self {
        Self {
            db: handle.db().clone(),
        }
    }

    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        let handle = SurrealHandle::setup_db().await?;
        info!("SurrealAssignmentLedger connected (in-memory)");
        Ok(Self::new(&handle))
    }

    // -- private helpers -----------------------------------------------------

    async fn count(&self, sql: &'static str, tutor_id: Option<String>) -> StorageResult<u64> {
        let mut query = self.db.query(sql);
        if let Some(id) = tutor_id {
            query = query.bind(("id", id));
        }
        let mut res = query
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let rows: Vec<CountRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(rows.first().map(|r| r.n).unwrap_or(0))
    }

    async fn total(&self) -> StorageResult<u64> {
        self.count("SELECT count() AS n FROM assignments GROUP ALL", None)
            .await
    }
}

#[async_trait]
impl AssignmentLedger for SurrealAssignmentLedger {
    async fn delete_all(&self) -> StorageResult<u64> {
        let removed = self.total().await?;
        self.db
            .query("DELETE assignments")
            .await
            .and_then(|r| r.check())
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        debug!(removed, "assignments deleted");
        Ok(removed)
    }

    async fn insert(&self, assignment: AssignmentRecord) -> StorageResult<()> {
        let key = key_column(&assignment.student);
        let mut res = self
            .db
            .query("SELECT count() AS n FROM assignments WHERE student_key = $key GROUP ALL")
            .bind(("key", key))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let existing: Vec<CountRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if existing.first().map(|r| r.n).unwrap_or(0) > 0 {
            return Err(StorageError::DuplicateAssignment {
                student: assignment.student.to_string(),
            });
        }

        let position = self.total().await?;
        let row = AssignmentRow::from_record(&assignment, position);
        let _created: Option<AssignmentRow> = self
            .db
            .create("assignments")
            .content(row)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn count_by_tutor(&self, tutor_id: &TutorId) -> StorageResult<u64> {
        self.count(
            "SELECT count() AS n FROM assignments WHERE tutor_id = $id GROUP ALL",
            Some(tutor_id.0.clone()),
        )
        .await
    }

    async fn list_all(&self) -> StorageResult<Vec<AssignmentRecord>> {
        let mut res = self
            .db
            .query("SELECT * FROM assignments ORDER BY position ASC")
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let rows: Vec<AssignmentRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(AssignmentRecord::try_from).collect()
    }

    async fn replace_all(&self, assignments: Vec<AssignmentRecord>) -> StorageResult<LedgerSwap> {
        check_unique_students(&assignments)?;

        let deleted = self.total().await?;
        let rows: Vec<AssignmentRow> = assignments
            .iter()
            .enumerate()
            .map(|(i, a)| AssignmentRow::from_record(a, i as u64))
            .collect();
        let inserted = rows.len() as u64;

        let sql = if rows.is_empty() {
            "BEGIN TRANSACTION; DELETE assignments; COMMIT TRANSACTION;"
        } else {
            "BEGIN TRANSACTION; DELETE assignments; INSERT INTO assignments $rows; COMMIT TRANSACTION;"
        };

        self.db
            .query(sql)
            .bind(("rows", rows))
            .await
            .and_then(|r| r.check())
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        debug!(deleted, inserted, "assignment ledger replaced");
        Ok(LedgerSwap { deleted, inserted })
    }
}
