//! tutormatch Core Library
//!
//! Assigns students to tutors from ranked preferences under per-tutor
//! capacity limits, and reports the resulting distribution.

pub mod capacity;
pub mod config;
pub mod domain;
pub mod engine;
pub mod obs;
pub mod report;
pub mod resolution;
pub mod service;
pub mod stats;
pub mod telemetry;

pub use capacity::CapacityPolicy;

pub use config::{AllocationConfig, CapacityConfig, PreferenceConfig};

pub use domain::{MatchError, Result};

pub use engine::{AllocationEngine, AllocationOutcome, LoadBook, RecomputePhase, TutorSlot};

pub use report::{
    build_report, ledger_digest, DistributionReport, Placement, ReportTotals, RosterEntry,
    TutorLoad,
};

pub use resolution::{resolve_preferences, CanonicalPreference};

pub use service::{AssignmentService, ClearOutcome, Collaborators, RecomputeSummary};

pub use stats::{build_stats, ClassCompletion, PreferenceStats, TutorRankCounts};

pub use tutormatch_state::{
    AssignmentKind, AssignmentLedger, AssignmentRecord, LedgerSwap, PreferenceRecord,
    PreferenceSource, StudentDirectory, StudentKey, StudentRecord, TutorDirectory, TutorId,
    TutorRecord,
};
