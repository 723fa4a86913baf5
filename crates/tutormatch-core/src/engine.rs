//! Greedy allocation engine.
//!
//! One recompute walks the phases
//! `NotStarted -> Clearing -> PreferencePass -> FallbackPass -> Reported`.
//! Students are served in submission order; each gets the first ranked tutor
//! with room, otherwise the least-loaded tutor with room (ties to the lowest
//! tutor id). Load lives in a map owned by the engine, so nothing is read from
//! the ledger while allocating.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tutormatch_state::{
    AssignmentRecord, StudentDirectory, StudentKey, StudentRecord, TutorId, TutorRecord,
};

use crate::capacity::CapacityPolicy;
use crate::domain::error::Result;
use crate::obs;
use crate::resolution::CanonicalPreference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecomputePhase {
    NotStarted,
    Clearing,
    PreferencePass,
    FallbackPass,
    Reported,
}

impl std::fmt::Display for RecomputePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecomputePhase::NotStarted => "not_started",
            RecomputePhase::Clearing => "clearing",
            RecomputePhase::PreferencePass => "preference_pass",
            RecomputePhase::FallbackPass => "fallback_pass",
            RecomputePhase::Reported => "reported",
        };
        f.write_str(s)
    }
}

/// Capacity and running load of one tutor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorSlot {
    pub capacity: u32,
    pub load: u32,
}

impl TutorSlot {
    pub fn has_room(&self) -> bool {
        self.load < self.capacity
    }
}

/// Per-recompute load map, ordered by tutor id.
#[derive(Debug, Clone, Default)]
pub struct LoadBook {
    slots: BTreeMap<TutorId, TutorSlot>,
}

impl LoadBook {
    pub fn new(policy: &CapacityPolicy, tutors: &[TutorRecord]) -> Self {
        let slots = tutors
            .iter()
            .map(|t| {
                let slot = TutorSlot {
                    capacity: policy.capacity_for_category(&t.category),
                    load: 0,
                };
                (t.tutor_id.clone(), slot)
            })
            .collect();
        Self { slots }
    }

    pub fn slot(&self, tutor_id: &TutorId) -> Option<&TutorSlot> {
        self.slots.get(tutor_id)
    }

    fn charge(&mut self, tutor_id: &TutorId) {
        if let Some(slot) = self.slots.get_mut(tutor_id) {
            slot.load += 1;
        }
    }

    /// Tutor with room and the smallest load; the lowest id wins ties.
    pub fn least_loaded(&self) -> Option<TutorId> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.has_room())
            .min_by_key(|(_, slot)| slot.load)
            .map(|(id, _)| id.clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TutorId, &TutorSlot)> {
        self.slots.iter()
    }
}

/// Everything one allocation produced, before it is committed.
#[derive(Debug, Clone, Default)]
pub struct AllocationOutcome {
    /// In creation order: preferred assignments first, then fallback
    pub assignments: Vec<AssignmentRecord>,
    /// Resolved students no tutor had room for
    pub unassigned: Vec<StudentRecord>,
    /// Preference identities the directory could not resolve
    pub missing_students: Vec<StudentKey>,
    /// Ranked tutor ids with no directory record
    pub unknown_tutors: BTreeSet<TutorId>,
}

impl AllocationOutcome {
    pub fn preferred_count(&self) -> usize {
        self.assignments.iter().filter(|a| a.rank.is_some()).count()
    }

    pub fn fallback_count(&self) -> usize {
        self.assignments.len() - self.preferred_count()
    }
}

pub struct AllocationEngine {
    recompute_id: String,
    phase: RecomputePhase,
    book: LoadBook,
}

impl AllocationEngine {
    pub fn new(
        recompute_id: impl Into<String>,
        policy: &CapacityPolicy,
        tutors: &[TutorRecord],
    ) -> Self {
        Self {
            recompute_id: recompute_id.into(),
            phase: RecomputePhase::NotStarted,
            book: LoadBook::new(policy, tutors),
        }
    }

    pub fn phase(&self) -> RecomputePhase {
        self.phase
    }

    pub fn load_book(&self) -> &LoadBook {
        &self.book
    }

    fn enter(&mut self, phase: RecomputePhase) {
        self.phase = phase;
        obs::emit_phase(&self.recompute_id, phase);
    }

    /// Discard previous results. The ledger itself is swapped atomically on
    /// commit, so this only resets engine-local state.
    pub fn clear(&mut self) {
        self.enter(RecomputePhase::Clearing);
        for slot in self.book.slots.values_mut() {
            slot.load = 0;
        }
    }

    /// Run the preference and fallback passes.
    ///
    /// A directory failure aborts the whole allocation.
    pub async fn allocate(
        &mut self,
        preferences: &[CanonicalPreference],
        students: &dyn StudentDirectory,
    ) -> Result<AllocationOutcome> {
        if self.phase == RecomputePhase::NotStarted {
            self.clear();
        }

        let mut outcome = AllocationOutcome::default();
        let mut waiting: Vec<StudentRecord> = Vec::new();

        self.enter(RecomputePhase::PreferencePass);
        for preference in preferences {
            let Some(student) = students.resolve(&preference.student).await? else {
                obs::emit_student_missing(&preference.student);
                outcome.missing_students.push(preference.student.clone());
                continue;
            };

            match self.pick_ranked(preference, &mut outcome.unknown_tutors) {
                Some((tutor_id, rank)) => {
                    self.book.charge(&tutor_id);
                    outcome
                        .assignments
                        .push(AssignmentRecord::preferred(&student, tutor_id, rank));
                }
                None => waiting.push(student),
            }
        }

        self.enter(RecomputePhase::FallbackPass);
        for student in waiting {
            match self.book.least_loaded() {
                Some(tutor_id) => {
                    self.book.charge(&tutor_id);
                    outcome
                        .assignments
                        .push(AssignmentRecord::fallback(&student, tutor_id));
                }
                None => outcome.unassigned.push(student),
            }
        }

        Ok(outcome)
    }

    /// First ranked tutor with room, with its 1-based position in the list.
    fn pick_ranked(
        &self,
        preference: &CanonicalPreference,
        unknown: &mut BTreeSet<TutorId>,
    ) -> Option<(TutorId, u32)> {
        let mut tried: HashSet<&TutorId> = HashSet::new();
        for (index, tutor_id) in preference.ranked_tutors.iter().enumerate() {
            if !tried.insert(tutor_id) {
                continue;
            }
            match self.book.slot(tutor_id) {
                None => {
                    if unknown.insert(tutor_id.clone()) {
                        obs::emit_tutor_missing(tutor_id, "ranked preference");
                    }
                }
                Some(slot) if slot.has_room() => {
                    return Some((tutor_id.clone(), index as u32 + 1));
                }
                Some(_) => {}
            }
        }
        None
    }

    pub fn finish(&mut self) {
        self.enter(RecomputePhase::Reported);
    }
}
