//! Preference submission statistics.
//!
//! Answers "who has not submitted yet" and "how popular is each tutor at each
//! rank" from the resolved preferences; independent of the ledger.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tutormatch_state::{StudentKey, StudentRecord, TutorId, TutorRecord};

use crate::resolution::CanonicalPreference;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCompletion {
    pub class_section: String,
    pub total: usize,
    pub submitted: usize,
    pub pending: usize,
}

/// How often a tutor was ranked at each position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorRankCounts {
    pub tutor_id: TutorId,
    pub name: String,
    /// `by_rank[0]` counts rank 1
    pub by_rank: Vec<u32>,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceStats {
    pub total_students: usize,
    pub submitted: usize,
    /// Ordered by normalized class section
    pub classes: Vec<ClassCompletion>,
    /// Ordered by tutor id
    pub tutors: Vec<TutorRankCounts>,
    /// Students without a submission, sorted by class then name
    pub pending: Vec<StudentRecord>,
}

pub fn build_stats(
    students: &[StudentRecord],
    tutors: &[TutorRecord],
    preferences: &[CanonicalPreference],
    max_preferences: usize,
) -> PreferenceStats {
    let submitted_keys: HashSet<&StudentKey> = preferences.iter().map(|p| &p.student).collect();

    let mut classes: BTreeMap<String, ClassCompletion> = BTreeMap::new();
    let mut pending: Vec<(StudentKey, StudentRecord)> = Vec::new();
    let mut submitted = 0;

    for student in students {
        let key = student.key();
        let entry = classes
            .entry(key.class_section().to_string())
            .or_insert_with(|| ClassCompletion {
                class_section: student.class_section.clone(),
                total: 0,
                submitted: 0,
                pending: 0,
            });
        entry.total += 1;
        if submitted_keys.contains(&key) {
            entry.submitted += 1;
            submitted += 1;
        } else {
            entry.pending += 1;
            pending.push((key, student.clone()));
        }
    }
    pending.sort_by(|(a, _), (b, _)| {
        a.class_section()
            .cmp(b.class_section())
            .then_with(|| a.name().cmp(b.name()))
    });

    let mut counts: BTreeMap<&TutorId, TutorRankCounts> = tutors
        .iter()
        .map(|t| {
            let row = TutorRankCounts {
                tutor_id: t.tutor_id.clone(),
                name: t.name.clone(),
                by_rank: vec![0; max_preferences],
                total: 0,
            };
            (&t.tutor_id, row)
        })
        .collect();

    for preference in preferences {
        for (index, tutor_id) in preference.ranked_tutors.iter().enumerate() {
            if index >= max_preferences {
                break;
            }
            if let Some(row) = counts.get_mut(tutor_id) {
                row.by_rank[index] += 1;
                row.total += 1;
            }
        }
    }

    PreferenceStats {
        total_students: students.len(),
        submitted,
        classes: classes.into_values().collect(),
        tutors: counts.into_values().collect(),
        pending: pending.into_iter().map(|(_, s)| s).collect(),
    }
}
