//! Distribution report derived from the assignment ledger.
//!
//! Pure aggregation over a ledger snapshot plus the student and tutor
//! directories; nothing is cached between calls.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tutormatch_state::{AssignmentRecord, StudentKey, StudentRecord, TutorId, TutorRecord};

use crate::capacity::CapacityPolicy;

/// How a rostered student got their tutor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Placement {
    Preferred { rank: u32 },
    Fallback,
}

impl Placement {
    fn of(assignment: &AssignmentRecord) -> Self {
        match assignment.rank {
            Some(rank) => Placement::Preferred { rank },
            None => Placement::Fallback,
        }
    }
}

impl std::fmt::Display for Placement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Placement::Preferred { rank } => write!(f, "#{rank}"),
            Placement::Fallback => f.write_str("fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub class_section: String,
    pub placement: Placement,
}

/// Load summary and roster of one tutor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorLoad {
    pub tutor_id: TutorId,
    /// Empty when the tutor left the directory after assignments were made
    pub name: String,
    pub category: String,
    pub capacity: u32,
    pub load: u32,
    pub remaining: u32,
    /// Sorted by class section, then name
    pub roster: Vec<RosterEntry>,
}

impl TutorLoad {
    pub fn is_full(&self) -> bool {
        self.load >= self.capacity
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Student counts over the directory: `assigned + unassigned == students`.
pub struct ReportTotals {
    pub students: usize,
    pub assigned: usize,
    pub preferred: usize,
    pub fallback: usize,
    pub unassigned: usize,
    /// Ledger rows whose student is no longer in the directory. They still
    /// hold a seat in the tutor loads.
    #[serde(default)]
    pub departed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionReport {
    pub generated_at: DateTime<Utc>,
    /// SHA-256 over the sorted `(student, tutor, kind, rank)` tuples
    pub ledger_digest: String,
    pub totals: ReportTotals,
    /// Ordered by tutor id
    pub tutors: Vec<TutorLoad>,
    pub full_tutors: Vec<TutorId>,
    pub available_tutors: Vec<TutorId>,
    /// Registered students without an assignment, sorted by class then name
    pub unassigned: Vec<StudentRecord>,
}

/// Digest of the ledger content, independent of row order and timestamps.
pub fn ledger_digest(assignments: &[AssignmentRecord]) -> String {
    let mut lines: Vec<String> = assignments
        .iter()
        .map(|a| {
            let rank = a.rank.map(|r| r.to_string()).unwrap_or_default();
            format!("{}\t{}\t{}\t{}", a.student.joined(), a.tutor_id, a.kind, rank)
        })
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

fn class_then_name(key: &StudentKey) -> (String, String) {
    (key.class_section().to_string(), key.name().to_string())
}

/// Build the report for a ledger snapshot.
pub fn build_report(
    assignments: &[AssignmentRecord],
    students: &[StudentRecord],
    tutors: &[TutorRecord],
    policy: &CapacityPolicy,
) -> DistributionReport {
    let directory: HashMap<StudentKey, &StudentRecord> =
        students.iter().map(|s| (s.key(), s)).collect();

    let mut by_tutor: BTreeMap<TutorId, Vec<&AssignmentRecord>> = tutors
        .iter()
        .map(|t| (t.tutor_id.clone(), Vec::new()))
        .collect();
    for assignment in assignments {
        by_tutor
            .entry(assignment.tutor_id.clone())
            .or_default()
            .push(assignment);
    }
    let tutor_records: HashMap<&TutorId, &TutorRecord> =
        tutors.iter().map(|t| (&t.tutor_id, t)).collect();

    let mut loads = Vec::with_capacity(by_tutor.len());
    for (tutor_id, mut rows) in by_tutor {
        let record = tutor_records.get(&tutor_id).copied();
        let capacity = policy.capacity_of(&tutor_id, record);

        rows.sort_by_key(|a| class_then_name(&a.student));
        let roster = rows
            .iter()
            .map(|a| {
                let (name, class_section) = match directory.get(&a.student) {
                    Some(s) => (s.name.clone(), s.class_section.clone()),
                    None => (
                        a.student.name().to_string(),
                        a.student.class_section().to_string(),
                    ),
                };
                RosterEntry {
                    name,
                    class_section,
                    placement: Placement::of(a),
                }
            })
            .collect::<Vec<_>>();

        let load = roster.len() as u32;
        loads.push(TutorLoad {
            name: record.map(|t| t.name.clone()).unwrap_or_default(),
            category: record.map(|t| t.category.clone()).unwrap_or_default(),
            tutor_id,
            capacity,
            load,
            remaining: capacity.saturating_sub(load),
            roster,
        });
    }

    let assigned_keys: HashSet<&StudentKey> = assignments.iter().map(|a| &a.student).collect();
    let mut unassigned: Vec<StudentRecord> = students
        .iter()
        .filter(|s| !assigned_keys.contains(&s.key()))
        .cloned()
        .collect();
    unassigned.sort_by_key(|s| class_then_name(&s.key()));

    let (present, departed): (Vec<&AssignmentRecord>, Vec<&AssignmentRecord>) = assignments
        .iter()
        .partition(|a| directory.contains_key(&a.student));
    let preferred = present.iter().filter(|a| a.rank.is_some()).count();
    let totals = ReportTotals {
        students: students.len(),
        assigned: present.len(),
        preferred,
        fallback: present.len() - preferred,
        unassigned: unassigned.len(),
        departed: departed.len(),
    };

    let (full_tutors, available_tutors): (Vec<TutorId>, Vec<TutorId>) = {
        let (full, available): (Vec<&TutorLoad>, Vec<&TutorLoad>) =
            loads.iter().partition(|t| t.is_full());
        (
            full.into_iter().map(|t| t.tutor_id.clone()).collect(),
            available.into_iter().map(|t| t.tutor_id.clone()).collect(),
        )
    };

    DistributionReport {
        generated_at: Utc::now(),
        ledger_digest: ledger_digest(assignments),
        totals,
        tutors: loads,
        full_tutors,
        available_tutors,
        unassigned,
    }
}
