//! Failure and concurrency behavior of recompute and clear.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use tutormatch_core::{
    AllocationConfig, AssignmentLedger, AssignmentRecord, AssignmentService, Collaborators,
    LedgerSwap, MatchError, PreferenceRecord, StudentDirectory, StudentKey, StudentRecord,
    TutorId, TutorRecord,
};
use tutormatch_state::fakes::{
    MemoryAssignmentLedger, MemoryPreferenceSource, MemoryStudentDirectory, MemoryTutorDirectory,
};
use tutormatch_state::{StorageError, StorageResult};

/// Delegates to a memory ledger; `replace_all` fails while `broken` is set.
struct FlakyLedger {
    inner: MemoryAssignmentLedger,
    broken: AtomicBool,
}

#[async_trait]
impl AssignmentLedger for FlakyLedger {
    async fn delete_all(&self) -> StorageResult<u64> {
        self.inner.delete_all().await
    }

    async fn insert(&self, assignment: AssignmentRecord) -> StorageResult<()> {
        self.inner.insert(assignment).await
    }

    async fn count_by_tutor(&self, tutor_id: &TutorId) -> StorageResult<u64> {
        self.inner.count_by_tutor(tutor_id).await
    }

    async fn list_all(&self) -> StorageResult<Vec<AssignmentRecord>> {
        self.inner.list_all().await
    }

    async fn replace_all(&self, assignments: Vec<AssignmentRecord>) -> StorageResult<LedgerSwap> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("connection reset".to_string()));
        }
        self.inner.replace_all(assignments).await
    }
}

/// Resolves normally; `list_students` fails while `broken` is set.
struct FlakyRoster {
    inner: MemoryStudentDirectory,
    broken: AtomicBool,
}

#[async_trait]
impl StudentDirectory for FlakyRoster {
    async fn resolve(&self, key: &StudentKey) -> StorageResult<Option<StudentRecord>> {
        self.inner.resolve(key).await
    }

    async fn list_students(&self) -> StorageResult<Vec<StudentRecord>> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("read timeout".to_string()));
        }
        self.inner.list_students().await
    }
}

/// Parks inside `replace_all` until released.
struct GatedLedger {
    inner: MemoryAssignmentLedger,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl AssignmentLedger for GatedLedger {
    async fn delete_all(&self) -> StorageResult<u64> {
        self.inner.delete_all().await
    }

    async fn insert(&self, assignment: AssignmentRecord) -> StorageResult<()> {
        self.inner.insert(assignment).await
    }

    async fn count_by_tutor(&self, tutor_id: &TutorId) -> StorageResult<u64> {
        self.inner.count_by_tutor(tutor_id).await
    }

    async fn list_all(&self) -> StorageResult<Vec<AssignmentRecord>> {
        self.inner.list_all().await
    }

    async fn replace_all(&self, assignments: Vec<AssignmentRecord>) -> StorageResult<LedgerSwap> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.replace_all(assignments).await
    }
}

fn stores(ledger: Arc<dyn AssignmentLedger>) -> (Collaborators, Arc<MemoryPreferenceSource>) {
    let preferences = Arc::new(MemoryPreferenceSource::new());
    let students = Arc::new(MemoryStudentDirectory::new());
    let tutors = Arc::new(MemoryTutorDirectory::new());

    tutors.register(TutorRecord::new("t1", "Paula", "ARTE"));
    tutors.register(TutorRecord::new("t2", "Rui", "MÚSICA"));
    for name in ["Ana", "Bia", "Caio"] {
        students.register(StudentRecord::new(name, "1A"));
        preferences.submit(PreferenceRecord::new(
            name,
            "1A",
            vec![TutorId::new("t1")],
            Utc::now(),
        ));
    }

    let stores = Collaborators {
        preferences: preferences.clone(),
        students,
        tutors,
        ledger,
    };
    (stores, preferences)
}

#[tokio::test]
async fn test_failed_commit_keeps_previous_ledger() {
    let ledger = Arc::new(FlakyLedger {
        inner: MemoryAssignmentLedger::new(),
        broken: AtomicBool::new(false),
    });
    let (stores, preferences) = stores(ledger.clone());
    let service = AssignmentService::new(stores, AllocationConfig::default()).unwrap();

    let committed = service.recompute().await.unwrap();

    // A newer ranking that would move Ana to t2, then a storage failure.
    preferences.submit(PreferenceRecord::new(
        "Ana",
        "1A",
        vec![TutorId::new("t2")],
        Utc::now(),
    ));
    ledger.broken.store(true, Ordering::SeqCst);

    let err = service.recompute().await.unwrap_err();
    assert!(matches!(err, MatchError::Storage(_)));
    assert!(err.is_retryable());

    let report = service.report().await.unwrap();
    assert_eq!(report.ledger_digest, committed.report.ledger_digest);
    assert_eq!(service.load_of(&TutorId::new("t1")).await.unwrap(), 3);

    ledger.broken.store(false, Ordering::SeqCst);
    service.recompute().await.unwrap();
    assert_eq!(service.load_of(&TutorId::new("t2")).await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_roster_read_does_not_swap_ledger() {
    let preferences = Arc::new(MemoryPreferenceSource::new());
    let tutors = Arc::new(MemoryTutorDirectory::new());
    let roster = Arc::new(FlakyRoster {
        inner: MemoryStudentDirectory::new(),
        broken: AtomicBool::new(false),
    });
    let ledger = Arc::new(MemoryAssignmentLedger::new());

    tutors.register(TutorRecord::new("t1", "Paula", "ARTE"));
    tutors.register(TutorRecord::new("t2", "Rui", "MÚSICA"));
    roster.inner.register(StudentRecord::new("Ana", "1A"));
    preferences.submit(PreferenceRecord::new(
        "Ana",
        "1A",
        vec![TutorId::new("t1")],
        Utc::now(),
    ));

    let stores = Collaborators {
        preferences: preferences.clone(),
        students: roster.clone(),
        tutors,
        ledger: ledger.clone(),
    };
    let service = AssignmentService::new(stores, AllocationConfig::default()).unwrap();
    service.recompute().await.unwrap();

    preferences.submit(PreferenceRecord::new(
        "Ana",
        "1A",
        vec![TutorId::new("t2")],
        Utc::now(),
    ));
    roster.broken.store(true, Ordering::SeqCst);

    let err = service.recompute().await.unwrap_err();
    assert!(matches!(err, MatchError::Storage(_)));

    let rows = ledger.list_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].tutor_id, TutorId::new("t1"));
}

#[tokio::test]
async fn test_second_recompute_and_clear_are_rejected_while_busy() {
    let ledger = Arc::new(GatedLedger {
        inner: MemoryAssignmentLedger::new(),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let (stores, _) = stores(ledger.clone());
    let service = Arc::new(AssignmentService::new(stores, AllocationConfig::default()).unwrap());

    let running = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.recompute().await })
    };
    ledger.entered.notified().await;

    let second = service.recompute().await.unwrap_err();
    assert!(matches!(second, MatchError::Busy("recompute")));
    let clear = service.clear().await.unwrap_err();
    assert!(matches!(clear, MatchError::Busy("clear")));

    // Reads are never blocked by the gate.
    let report = service.report().await.unwrap();
    assert_eq!(report.totals.assigned, 0);

    ledger.release.notify_one();
    let summary = running.await.unwrap().unwrap();
    assert_eq!(summary.report.totals.assigned, 3);

    assert_eq!(service.clear().await.unwrap().deleted_count, 3);
}
