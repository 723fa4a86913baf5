//! Preference resolution: raw submissions to one canonical list per student.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use tutormatch_state::{PreferenceRecord, StudentKey, TutorId};

use crate::obs;

/// The authoritative preference of one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalPreference {
    pub student: StudentKey,
    /// Tutor ids, rank 1 first, at most `max_preferences` entries
    pub ranked_tutors: Vec<TutorId>,
    pub submitted_at: DateTime<Utc>,
}

/// Collapse raw records to the latest submission per student.
///
/// - Records with an empty ranked list or a blank identity are discarded.
/// - Within a student, the latest `submitted_at` wins; equal timestamps are
///   decided by the later `seq`.
/// - Ranked lists are truncated to `max_preferences`.
/// - Output is ordered by `(submitted_at, student)` ascending.
pub fn resolve_preferences(
    raw: Vec<PreferenceRecord>,
    max_preferences: usize,
) -> Vec<CanonicalPreference> {
    let mut latest: HashMap<StudentKey, PreferenceRecord> = HashMap::new();

    for record in raw {
        if record.ranked_tutors.is_empty() {
            debug!(student = %record.key(), "discarding empty preference submission");
            continue;
        }
        let key = record.key();
        if key.is_blank() {
            obs::emit_student_missing(&key);
            continue;
        }

        match latest.get(&key) {
            Some(current)
                if (current.submitted_at, current.seq) >= (record.submitted_at, record.seq) => {}
            _ => {
                latest.insert(key, record);
            }
        }
    }

    let mut resolved: Vec<CanonicalPreference> = latest
        .into_iter()
        .map(|(student, record)| {
            let mut ranked_tutors = record.ranked_tutors;
            if ranked_tutors.len() > max_preferences {
                debug!(
                    student = %student,
                    submitted = ranked_tutors.len(),
                    kept = max_preferences,
                    "truncating ranked list"
                );
                ranked_tutors.truncate(max_preferences);
            }
            CanonicalPreference {
                student,
                ranked_tutors,
                submitted_at: record.submitted_at,
            }
        })
        .collect();

    resolved.sort_by(|a, b| {
        a.submitted_at
            .cmp(&b.submitted_at)
            .then_with(|| a.student.cmp(&b.student))
    });
    resolved
}
