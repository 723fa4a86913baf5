//! Structured observability hooks for the recompute lifecycle.
//!
//! This module provides:
//! - Recompute-scoped tracing spans via the `RecomputeSpan` RAII guard
//! - Emission functions for lifecycle and data-integrity events
//!
//! Lifecycle events are emitted at `info!`, integrity problems at `warn!`.
//! Filtering follows `TUTORMATCH_LOG` / `RUST_LOG` (see `telemetry`).

use tracing::{info, warn};
use tutormatch_state::{StudentKey, TutorId};

use crate::engine::RecomputePhase;

/// Span tagging every event of one recompute with its `recompute_id`.
///
/// Attach it to the recompute future with `tracing::Instrument`:
///
/// ```ignore
/// run().instrument(recompute_span(&id)).await
/// ```
pub fn recompute_span(recompute_id: &str) -> tracing::Span {
    tracing::info_span!("tutormatch.recompute", recompute_id = %recompute_id)
}

/// RAII guard that enters [`recompute_span`] on the current thread.
///
/// Only for synchronous sections; the entered span must not cross an await.
pub struct RecomputeSpan {
    _span: tracing::span::EnteredSpan,
}

impl RecomputeSpan {
    pub fn enter(recompute_id: &str) -> Self {
        Self {
            _span: recompute_span(recompute_id).entered(),
        }
    }
}

pub fn emit_recompute_started(recompute_id: &str, submissions: usize, tutors: usize) {
    info!(
        event = "recompute.started",
        recompute_id = %recompute_id,
        submissions = submissions,
        tutors = tutors,
    );
}

pub fn emit_phase(recompute_id: &str, phase: RecomputePhase) {
    info!(event = "recompute.phase", recompute_id = %recompute_id, phase = %phase);
}

/// Emit event: recompute committed.
pub fn emit_recompute_finished(
    recompute_id: &str,
    duration_ms: u64,
    preferred: usize,
    fallback: usize,
    unassigned: usize,
) {
    info!(
        event = "recompute.finished",
        recompute_id = %recompute_id,
        duration_ms = duration_ms,
        preferred = preferred,
        fallback = fallback,
        unassigned = unassigned,
    );
}

/// Emit event: recompute aborted; the previous ledger is untouched.
pub fn emit_recompute_failed(recompute_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "recompute.failed", recompute_id = %recompute_id, error = %error);
}

pub fn emit_ledger_cleared(deleted: u64) {
    info!(event = "ledger.cleared", deleted = deleted);
}

/// Emit event: a preference names a student the directory cannot resolve.
pub fn emit_student_missing(student: &StudentKey) {
    warn!(
        event = "integrity.student_missing",
        student = %student,
        "preference references an unknown student, skipping"
    );
}

/// Emit event: a tutor id has no directory record.
pub fn emit_tutor_missing(tutor_id: &TutorId, context: &str) {
    warn!(
        event = "integrity.tutor_missing",
        tutor_id = %tutor_id,
        context = context,
        "tutor not found in directory"
    );
}
