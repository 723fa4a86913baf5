//! `AssignmentService`: the engine surface.
//!
//! Wires the collaborator traits, the configuration, and the allocation
//! engine together. One gate serializes `recompute` and `clear`; a second
//! caller gets `MatchError::Busy` instead of waiting. `report` takes no lock
//! because the ledger is only ever swapped atomically.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::Instrument;
use tutormatch_state::{
    AssignmentLedger, LedgerSwap, PreferenceSource, StudentDirectory, StudentKey, TutorDirectory,
    TutorId,
};

use crate::capacity::CapacityPolicy;
use crate::config::AllocationConfig;
use crate::domain::error::{MatchError, Result};
use crate::engine::AllocationEngine;
use crate::obs::{self, RecomputeSpan};
use crate::report::{build_report, DistributionReport};
use crate::resolution::resolve_preferences;
use crate::stats::{build_stats, PreferenceStats};

/// Result of a committed recompute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecomputeSummary {
    pub recompute_id: String,
    pub duration_ms: u64,
    pub swap: LedgerSwap,
    /// Preference identities the student directory could not resolve
    pub missing_students: Vec<StudentKey>,
    /// Ranked tutor ids absent from the tutor directory
    pub unknown_tutors: Vec<TutorId>,
    pub report: DistributionReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearOutcome {
    pub deleted_count: u64,
}

/// Storage collaborators consumed by the service.
#[derive(Clone)]
pub struct Collaborators {
    pub preferences: Arc<dyn PreferenceSource>,
    pub students: Arc<dyn StudentDirectory>,
    pub tutors: Arc<dyn TutorDirectory>,
    pub ledger: Arc<dyn AssignmentLedger>,
}

pub struct AssignmentService {
    stores: Collaborators,
    config: AllocationConfig,
    policy: CapacityPolicy,
    gate: Mutex<()>,
}

impl AssignmentService {
    /// Validates `config` before accepting it.
    pub fn new(stores: Collaborators, config: AllocationConfig) -> Result<Self> {
        config.validate()?;
        let policy = CapacityPolicy::from_config(&config.capacity)?;
        Ok(Self {
            stores,
            config,
            policy,
            gate: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &AllocationConfig {
        &self.config
    }

    pub fn policy(&self) -> &CapacityPolicy {
        &self.policy
    }

    /// Rebuild the whole ledger from the current preferences.
    ///
    /// On any storage failure the previous ledger stays in place.
    pub async fn recompute(&self) -> Result<RecomputeSummary> {
        let _guard = self
            .gate
            .try_lock()
            .map_err(|_| MatchError::Busy("recompute"))?;

        let recompute_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        let result = self
            .run_recompute(&recompute_id, started)
            .instrument(obs::recompute_span(&recompute_id))
            .await;

        if let Err(err) = &result {
            obs::emit_recompute_failed(&recompute_id, err);
        }
        result
    }

    async fn run_recompute(
        &self,
        recompute_id: &str,
        started: Instant,
    ) -> Result<RecomputeSummary> {
        let raw = self.stores.preferences.list_preferences().await?;
        let tutors = self.stores.tutors.list_tutors().await?;
        obs::emit_recompute_started(recompute_id, raw.len(), tutors.len());

        let canonical = resolve_preferences(raw, self.config.preferences.max_preferences);

        let mut engine = AllocationEngine::new(recompute_id, &self.policy, &tutors);
        engine.clear();
        let outcome = engine
            .allocate(&canonical, self.stores.students.as_ref())
            .await?;

        // Every read happens before the swap; the commit is the last step
        // that can fail.
        let students = self.stores.students.list_students().await?;

        let swap = self
            .stores
            .ledger
            .replace_all(outcome.assignments.clone())
            .await?;

        let report = {
            let _span = RecomputeSpan::enter(recompute_id);
            engine.finish();
            build_report(&outcome.assignments, &students, &tutors, &self.policy)
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        obs::emit_recompute_finished(
            recompute_id,
            duration_ms,
            outcome.preferred_count(),
            outcome.fallback_count(),
            outcome.unassigned.len(),
        );

        Ok(RecomputeSummary {
            recompute_id: recompute_id.to_string(),
            duration_ms,
            swap,
            missing_students: outcome.missing_students,
            unknown_tutors: outcome.unknown_tutors.into_iter().collect(),
            report,
        })
    }

    /// Delete every assignment without recomputing.
    pub async fn clear(&self) -> Result<ClearOutcome> {
        let _guard = self.gate.try_lock().map_err(|_| MatchError::Busy("clear"))?;

        let deleted_count = self.stores.ledger.delete_all().await?;
        obs::emit_ledger_cleared(deleted_count);
        Ok(ClearOutcome { deleted_count })
    }

    /// Distribution snapshot of the current ledger.
    pub async fn report(&self) -> Result<DistributionReport> {
        let assignments = self.stores.ledger.list_all().await?;
        let students = self.stores.students.list_students().await?;
        let tutors = self.stores.tutors.list_tutors().await?;
        Ok(build_report(&assignments, &students, &tutors, &self.policy))
    }

    /// Cap of a tutor; unknown tutors get the standard cap.
    pub async fn capacity_of(&self, tutor_id: &TutorId) -> Result<u32> {
        match self.stores.tutors.category(tutor_id).await? {
            Some(category) => Ok(self.policy.capacity_for_category(&category)),
            None => Ok(self.policy.capacity_of(tutor_id, None)),
        }
    }

    /// Current ledger load of a tutor.
    pub async fn load_of(&self, tutor_id: &TutorId) -> Result<u64> {
        Ok(self.stores.ledger.count_by_tutor(tutor_id).await?)
    }

    pub async fn stats(&self) -> Result<PreferenceStats> {
        let raw = self.stores.preferences.list_preferences().await?;
        let canonical = resolve_preferences(raw, self.config.preferences.max_preferences);
        let students = self.stores.students.list_students().await?;
        let tutors = self.stores.tutors.list_tutors().await?;
        Ok(build_stats(
            &students,
            &tutors,
            &canonical,
            self.config.preferences.max_preferences,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tutormatch_state::fakes::{
        MemoryAssignmentLedger, MemoryPreferenceSource, MemoryStudentDirectory,
        MemoryTutorDirectory,
    };
    use tutormatch_state::{PreferenceRecord, StudentRecord, TutorRecord};

    fn service() -> (AssignmentService, Arc<MemoryPreferenceSource>) {
        let preferences = Arc::new(MemoryPreferenceSource::new());
        let students = Arc::new(MemoryStudentDirectory::new());
        let tutors = Arc::new(MemoryTutorDirectory::new());
        students.register(StudentRecord::new("Ana", "1A"));
        tutors.register(TutorRecord::new("t1", "Paula", "PEDAGOGA"));

        let stores = Collaborators {
            preferences: preferences.clone(),
            students,
            tutors,
            ledger: Arc::new(MemoryAssignmentLedger::new()),
        };
        let service = AssignmentService::new(stores, AllocationConfig::default()).unwrap();
        (service, preferences)
    }

    #[tokio::test]
    async fn test_recompute_then_report_agree() {
        let (service, prefs) = service();
        prefs.submit(PreferenceRecord::new(
            "Ana",
            "1A",
            vec![TutorId::new("t1")],
            Utc::now(),
        ));

        let summary = service.recompute().await.unwrap();
        let report = service.report().await.unwrap();

        assert_eq!(summary.report.ledger_digest, report.ledger_digest);
        assert_eq!(report.totals.preferred, 1);
        assert_eq!(service.load_of(&TutorId::new("t1")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_capacity_of_known_and_unknown_tutor() {
        let (service, _) = service();
        assert_eq!(service.capacity_of(&TutorId::new("t1")).await.unwrap(), 6);
        assert_eq!(service.capacity_of(&TutorId::new("t9")).await.unwrap(), 18);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let stores = Collaborators {
            preferences: Arc::new(MemoryPreferenceSource::new()),
            students: Arc::new(MemoryStudentDirectory::new()),
            tutors: Arc::new(MemoryTutorDirectory::new()),
            ledger: Arc::new(MemoryAssignmentLedger::new()),
        };
        let mut config = AllocationConfig::default();
        config.capacity.pedagogical_cap = 30;

        let err = AssignmentService::new(stores, config).err().unwrap();
        assert!(matches!(err, MatchError::InvalidConfig(_)));
    }
}
