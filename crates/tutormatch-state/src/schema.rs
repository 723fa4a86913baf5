//! Row definitions for tutormatch SurrealDB tables
//!
//! Tables:
//! - students: registered students with normalized identity columns
//! - tutors: tutors and their role categories
//! - preferences: raw ranked-tutor submissions
//! - assignments: the current allocation ledger
//!
//! Rows are converted to and from `storage_traits` records at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::identity::StudentKey;
use crate::storage_traits::{
    AssignmentKind, AssignmentRecord, PreferenceRecord, StudentRecord, TutorId, TutorRecord,
};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// The single indexed column for a key; see [`StudentKey::joined`].
pub(crate) fn key_column(key: &StudentKey) -> String {
    key.joined()
}

/// `students` row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRow {
    pub student_id: String,
    pub name: String,
    pub class_section: String,
    /// Normalized `NAME|CLASS`, unique
    pub student_key: String,
}

impl From<&StudentRecord> for StudentRow {
    fn from(record: &StudentRecord) -> Self {
        Self {
            student_id: record.student_id.clone(),
            name: record.name.clone(),
            class_section: record.class_section.clone(),
            student_key: key_column(&record.key()),
        }
    }
}

impl From<StudentRow> for StudentRecord {
    fn from(row: StudentRow) -> Self {
        StudentRecord {
            student_id: row.student_id,
            name: row.name,
            class_section: row.class_section,
        }
    }
}

/// `tutors` row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorRow {
    pub tutor_id: String,
    pub name: String,
    pub category: String,
}

impl From<&TutorRecord> for TutorRow {
    fn from(record: &TutorRecord) -> Self {
        Self {
            tutor_id: record.tutor_id.0.clone(),
            name: record.name.clone(),
            category: record.category.clone(),
        }
    }
}

impl From<TutorRow> for TutorRecord {
    fn from(row: TutorRow) -> Self {
        TutorRecord {
            tutor_id: TutorId(row.tutor_id),
            name: row.name,
            category: row.category,
        }
    }
}

/// `preferences` row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceRow {
    pub student_name: String,
    pub class_section: String,
    pub ranked_tutors: Vec<String>,
    #[serde(with = "surreal_datetime")]
    pub submitted_at: DateTime<Utc>,
    pub seq: u64,
}

impl PreferenceRow {
    pub fn from_record(record: &PreferenceRecord, seq: u64) -> Self {
        Self {
            student_name: record.student_name.clone(),
            class_section: record.class_section.clone(),
            ranked_tutors: record.ranked_tutors.iter().map(|t| t.0.clone()).collect(),
            submitted_at: record.submitted_at,
            seq,
        }
    }
}

impl From<PreferenceRow> for PreferenceRecord {
    fn from(row: PreferenceRow) -> Self {
        PreferenceRecord {
            student_name: row.student_name,
            class_section: row.class_section,
            ranked_tutors: row.ranked_tutors.into_iter().map(TutorId).collect(),
            submitted_at: row.submitted_at,
            seq: row.seq,
        }
    }
}

/// `assignments` row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRow {
    /// Normalized `NAME|CLASS`, unique
    pub student_key: String,
    pub student_name: String,
    pub class_section: String,
    pub student_id: String,
    pub tutor_id: String,
    /// "preferred" | "fallback"
    pub kind: String,
    pub rank: Option<u32>,
    /// Position within the batch that wrote it
    pub position: u64,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl AssignmentRow {
    pub fn from_record(record: &AssignmentRecord, position: u64) -> Self {
        Self {
            student_key: key_column(&record.student),
            student_name: record.student.name().to_string(),
            class_section: record.student.class_section().to_string(),
            student_id: record.student_id.clone(),
            tutor_id: record.tutor_id.0.clone(),
            kind: record.kind.as_str().to_string(),
            rank: record.rank,
            position,
            created_at: record.created_at,
        }
    }
}

impl TryFrom<AssignmentRow> for AssignmentRecord {
    type Error = StorageError;

    fn try_from(row: AssignmentRow) -> Result<Self, Self::Error> {
        let kind = match row.kind.as_str() {
            "preferred" => AssignmentKind::Preferred,
            "fallback" => AssignmentKind::Fallback,
            other => {
                return Err(StorageError::InvalidRecord(format!(
                    "unknown assignment kind: {other}"
                )))
            }
        };
        Ok(AssignmentRecord {
            student: StudentKey::new(&row.student_name, &row.class_section),
            student_id: row.student_id,
            tutor_id: TutorId(row.tutor_id),
            kind,
            rank: row.rank,
            created_at: row.created_at,
        })
    }
}

/// Result row of a `count() ... GROUP ALL` query
#[derive(Debug, Clone, Deserialize)]
pub struct CountRow {
    pub n: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_column_uses_normalized_halves() {
        let key = StudentKey::new("Lúcia  Prado", "2º b");
        assert_eq!(key_column(&key), "LUCIA PRADO|2º B");
    }

    #[test]
    fn key_column_separates_halves_that_contain_a_pipe() {
        let first = StudentRow::from(&StudentRecord::new("A|B", "C"));
        let second = StudentRow::from(&StudentRecord::new("A", "B|C"));
        assert_ne!(first.student_key, second.student_key);
    }

    #[test]
    fn assignment_row_rejects_unknown_kind() {
        let student = StudentRecord::new("Ana", "1A");
        let record = AssignmentRecord::fallback(&student, TutorId::new("t1"));
        let mut row = AssignmentRow::from_record(&record, 0);
        row.kind = "random".to_string();
        let err = AssignmentRecord::try_from(row).unwrap_err();
        assert!(matches!(err, StorageError::InvalidRecord(_)));
    }

    #[test]
    fn assignment_row_keeps_rank_and_kind() {
        let student = StudentRecord::new("Ana", "1A");
        let record = AssignmentRecord::preferred(&student, TutorId::new("t1"), 2);
        let back = AssignmentRecord::try_from(AssignmentRow::from_record(&record, 7)).unwrap();
        assert_eq!(back.kind, AssignmentKind::Preferred);
        assert_eq!(back.rank, Some(2));
        assert_eq!(back.student, record.student);
    }
}
