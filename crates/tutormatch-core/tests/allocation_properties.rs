//! Property tests for the greedy allocator.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use tutormatch_core::{
    resolve_preferences, AllocationEngine, AllocationOutcome, AssignmentRecord,
    CanonicalPreference, CapacityConfig, CapacityPolicy, PreferenceRecord, StudentKey,
    StudentRecord, TutorId, TutorRecord,
};
use tutormatch_state::fakes::MemoryStudentDirectory;

const CATEGORIES: [&str; 3] = ["ARTE", "CASF", "DIRETORA"];

struct Case {
    policy: CapacityPolicy,
    tutors: Vec<TutorRecord>,
    preferences: Vec<CanonicalPreference>,
    outcome: AllocationOutcome,
}

impl Case {
    fn capacity(&self) -> HashMap<&TutorId, u32> {
        self.tutors
            .iter()
            .map(|t| (&t.tutor_id, self.policy.capacity_for_category(&t.category)))
            .collect()
    }

    fn loads(&self) -> HashMap<&TutorId, u32> {
        let mut loads: HashMap<&TutorId, u32> = HashMap::new();
        for a in &self.outcome.assignments {
            *loads.entry(&a.tutor_id).or_default() += 1;
        }
        loads
    }

    fn is_full(&self, tutor_id: &TutorId) -> bool {
        let cap = self.capacity();
        match cap.get(tutor_id) {
            Some(cap) => self.loads().get(tutor_id).copied().unwrap_or(0) >= *cap,
            None => true,
        }
    }
}

/// Tutor `i` gets `CATEGORIES[tutor_categories[i]]`. Ranked indices past the
/// tutor count name ids the directory does not know.
fn run_case(small_caps: bool, tutor_categories: Vec<usize>, rankings: Vec<Vec<usize>>) -> Case {
    let config = if small_caps {
        CapacityConfig {
            standard_cap: 3,
            pedagogical_cap: 1,
            ..CapacityConfig::default()
        }
    } else {
        CapacityConfig::default()
    };
    let policy = CapacityPolicy::from_config(&config).unwrap();

    let tutors: Vec<TutorRecord> = tutor_categories
        .iter()
        .enumerate()
        .map(|(i, c)| TutorRecord::new(format!("t{i}"), format!("Tutor {i}"), CATEGORIES[*c]))
        .collect();

    let directory = MemoryStudentDirectory::new();
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    let records: Vec<PreferenceRecord> = rankings
        .iter()
        .enumerate()
        .map(|(i, ranked)| {
            let name = format!("Aluno {i:03}");
            directory.register(StudentRecord::new(name.as_str(), "1A"));
            PreferenceRecord::new(
                name,
                "1A",
                ranked.iter().map(|t| TutorId::new(format!("t{t}"))).collect(),
                start + Duration::seconds(i as i64),
            )
        })
        .collect();
    let preferences = resolve_preferences(records, 5);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let outcome = runtime.block_on(async {
        let mut engine = AllocationEngine::new("prop", &policy, &tutors);
        engine.allocate(&preferences, &directory).await.unwrap()
    });

    Case {
        policy,
        tutors,
        preferences,
        outcome,
    }
}

/// Replays the run in processing order with a running load map and checks
/// every decision against the loads as they were when it was made.
fn replay(case: &Case) -> Result<(), TestCaseError> {
    let caps = case.capacity();
    let mut loads: HashMap<&TutorId, u32> = HashMap::new();
    let has_room = |loads: &HashMap<&TutorId, u32>, tutor_id: &TutorId| match caps.get(tutor_id) {
        Some(cap) => loads.get(tutor_id).copied().unwrap_or(0) < *cap,
        None => false,
    };

    let preferred: Vec<&AssignmentRecord> = case
        .outcome
        .assignments
        .iter()
        .filter(|a| a.rank.is_some())
        .collect();
    let fallback: Vec<&AssignmentRecord> = case
        .outcome
        .assignments
        .iter()
        .filter(|a| a.rank.is_none())
        .collect();
    prop_assert!(
        case.outcome.assignments[..preferred.len()]
            .iter()
            .all(|a| a.rank.is_some()),
        "fallback row created during the preference pass"
    );

    let mut next = preferred.iter().peekable();
    let mut waiting: Vec<&StudentKey> = Vec::new();
    for preference in &case.preferences {
        let ranked = &preference.ranked_tutors;
        match next.peek().copied() {
            Some(a) if a.student == preference.student => {
                let rank = a.rank.unwrap_or(0) as usize;
                prop_assert!(rank >= 1 && rank <= ranked.len());
                prop_assert_eq!(&ranked[rank - 1], &a.tutor_id);
                prop_assert!(has_room(&loads, &a.tutor_id), "{} placed on a full tutor", a.student);
                for tutor_id in &ranked[..rank - 1] {
                    prop_assert!(
                        !has_room(&loads, tutor_id),
                        "{} skipped {} while it had room",
                        a.student,
                        tutor_id
                    );
                }
                *loads.entry(&a.tutor_id).or_default() += 1;
                next.next();
            }
            _ => {
                for tutor_id in ranked {
                    prop_assert!(
                        !has_room(&loads, tutor_id),
                        "{} sent to fallback while {} had room",
                        preference.student,
                        tutor_id
                    );
                }
                waiting.push(&preference.student);
            }
        }
    }
    prop_assert!(next.next().is_none(), "preferred rows out of submission order");

    let unassigned: Vec<StudentKey> = case.outcome.unassigned.iter().map(|s| s.key()).collect();
    prop_assert_eq!(waiting.len(), fallback.len() + unassigned.len());
    for (student, a) in waiting.iter().zip(&fallback) {
        prop_assert_eq!(*student, &a.student);
        prop_assert!(has_room(&loads, &a.tutor_id));
        let chosen = loads.get(&a.tutor_id).copied().unwrap_or(0);
        for tutor in &case.tutors {
            let id = &tutor.tutor_id;
            if id == &a.tutor_id || !has_room(&loads, id) {
                continue;
            }
            let load = loads.get(id).copied().unwrap_or(0);
            prop_assert!(
                chosen < load || (chosen == load && a.tutor_id < *id),
                "{} fell back to {} (load {}) over {} (load {})",
                a.student,
                a.tutor_id,
                chosen,
                id,
                load
            );
        }
        *loads.entry(&a.tutor_id).or_default() += 1;
    }
    for (student, key) in waiting[fallback.len()..].iter().zip(&unassigned) {
        prop_assert_eq!(*student, key);
    }
    if !unassigned.is_empty() {
        for tutor in &case.tutors {
            prop_assert!(!has_room(&loads, &tutor.tutor_id));
        }
    }
    Ok(())
}

fn case_inputs() -> impl Strategy<Value = (bool, Vec<usize>, Vec<Vec<usize>>)> {
    (
        any::<bool>(),
        prop::collection::vec(0..CATEGORIES.len(), 1..6),
        prop::collection::vec(prop::collection::vec(0usize..8, 0..6), 0..60),
    )
}

proptest! {
    #[test]
    fn property_no_tutor_exceeds_capacity((small, cats, ranks) in case_inputs()) {
        let case = run_case(small, cats, ranks);
        let caps = case.capacity();
        for (tutor_id, load) in case.loads() {
            prop_assert!(caps.contains_key(tutor_id), "assigned to unknown tutor {tutor_id}");
            prop_assert!(load <= caps[tutor_id]);
        }
    }

    #[test]
    fn property_each_student_placed_at_most_once((small, cats, ranks) in case_inputs()) {
        let case = run_case(small, cats, ranks);
        let mut seen: HashSet<&StudentKey> = HashSet::new();
        for a in &case.outcome.assignments {
            prop_assert!(seen.insert(&a.student), "{} assigned twice", a.student);
        }
        prop_assert_eq!(
            case.outcome.assignments.len() + case.outcome.unassigned.len(),
            case.preferences.len()
        );
    }

    #[test]
    fn property_earlier_ranks_were_full_when_skipped((small, cats, ranks) in case_inputs()) {
        let case = run_case(small, cats, ranks);
        replay(&case)?;
    }

    #[test]
    fn property_unassigned_only_when_everyone_is_full((small, cats, ranks) in case_inputs()) {
        let case = run_case(small, cats, ranks);
        if !case.outcome.unassigned.is_empty() {
            for tutor in &case.tutors {
                prop_assert!(case.is_full(&tutor.tutor_id));
            }
        }
    }

    #[test]
    fn property_fallback_picks_least_loaded_at_that_moment(
        cats in prop::collection::vec(0..CATEGORIES.len(), 2..6),
        warmup in prop::collection::vec(0usize..6, 0..20),
        students in 0..40usize,
    ) {
        // Preferred placements load tutors unevenly first; the rest rank an
        // unknown tutor and fall back onto tutors with mixed caps.
        let mut ranks: Vec<Vec<usize>> = warmup.into_iter().map(|t| vec![t]).collect();
        ranks.extend(std::iter::repeat(vec![99]).take(students));
        let case = run_case(true, cats, ranks);
        replay(&case)?;
    }
}
