//! SurrealDB schema migrations and initialization
//!
//! Defines every tutormatch table with its unique indexes. Safe to run on
//! every connection.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all tutormatch tables in SurrealDB
///
/// Idempotent: `DEFINE ... IF NOT EXISTS` leaves existing definitions alone.
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing tutormatch SurrealDB schema");

    init_students_table(db).await?;
    init_tutors_table(db).await?;
    init_preferences_table(db).await?;
    init_assignments_table(db).await?;

    info!("tutormatch schema initialization complete");
    Ok(())
}

/// Initialize `students` table
///
/// Schema:
/// ```text
/// TABLE students {
///   student_id:     STRING (unique)
///   name:           STRING
///   class_section:  STRING
///   student_key:    STRING (normalized NAME|CLASS, unique)
/// }
/// ```
async fn init_students_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing students table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS students SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_student_id ON TABLE students COLUMNS student_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_student_key ON TABLE students COLUMNS student_key UNIQUE;
    "#;

    db.query(sql).await?.check()?;
    Ok(())
}

/// Initialize `tutors` table
///
/// Schema:
/// ```text
/// TABLE tutors {
///   tutor_id:  STRING (unique)
///   name:      STRING
///   category:  STRING
/// }
/// ```
async fn init_tutors_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing tutors table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS tutors SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_tutor_id ON TABLE tutors COLUMNS tutor_id UNIQUE;
    "#;

    db.query(sql).await?.check()?;
    Ok(())
}

/// Initialize `preferences` table
///
/// Schema:
/// ```text
/// TABLE preferences {
///   student_name:   STRING
///   class_section:  STRING
///   ranked_tutors:  ARRAY<STRING>
///   submitted_at:   DATETIME
///   seq:            INT (insertion order, unique)
/// }
/// ```
///
/// Superseded submissions are kept; resolution happens in the engine.
async fn init_preferences_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing preferences table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS preferences SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_pref_seq ON TABLE preferences COLUMNS seq UNIQUE;
    "#;

    db.query(sql).await?.check()?;
    Ok(())
}

/// Initialize `assignments` table
///
/// Schema:
/// ```text
/// TABLE assignments {
///   student_key:    STRING (normalized NAME|CLASS, unique)
///   student_name:   STRING
///   class_section:  STRING
///   student_id:     STRING
///   tutor_id:       STRING (indexed)
///   kind:           STRING (preferred | fallback)
///   rank:           INT?
///   position:       INT
///   created_at:     DATETIME
/// }
/// ```
///
/// The unique `student_key` index backs the one-assignment-per-student rule
/// and aborts any transaction that would violate it.
async fn init_assignments_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing assignments table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS assignments SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_assign_student ON TABLE assignments COLUMNS student_key UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_assign_tutor ON TABLE assignments COLUMNS tutor_id;
    "#;

    db.query(sql).await?.check()?;
    Ok(())
}
