//! Recovery behavior: the sweeper's grace period, replay idempotence under
//! duplicate delivery, and the retention purge.

mod common;

use chrono::Duration;
use common::*;
use grad_collection_core::config::CollectionConfig;
use grad_collection_core::persistence::{CollectionStore, SagaStore};
use grad_collection_core::state_machine::{FilesetStatus, StudentStatus};

#[tokio::test]
async fn sweep_ignores_sagas_inside_the_grace_period() {
    let harness = TestHarness::new();
    let fileset = seed_fileset(&harness.store).await;
    seed_demographic(&harness.store, fileset.fileset_id, "123456789").await;

    harness.system.tick().await.unwrap();
    harness.backdate_active_sagas(Duration::minutes(1)).await;

    // 1 minute idle against a 2 minute grace period: not stalled yet
    let summary = harness.system.sweep().await.unwrap();
    assert_eq!(summary.examined, 0);
    assert_eq!(summary.replayed, 0);
}

#[tokio::test]
async fn stalled_saga_is_swept_exactly_once_per_pass() {
    let harness = TestHarness::new();
    let fileset = seed_fileset(&harness.store).await;
    seed_demographic(&harness.store, fileset.fileset_id, "123456789").await;

    harness.system.tick().await.unwrap();
    harness.backdate_active_sagas(Duration::minutes(5)).await;

    let summary = harness.system.sweep().await.unwrap();
    assert_eq!(summary.examined, 1);
    assert_eq!(summary.replayed, 1);
    assert_eq!(summary.failed, 0);

    // The replay touched the saga, resetting its grace clock
    let summary = harness.system.sweep().await.unwrap();
    assert_eq!(summary.examined, 0);
}

#[tokio::test]
async fn replayed_saga_completes_without_duplicate_downstream_writes() {
    let mut harness = TestHarness::new();
    let fileset = seed_fileset(&harness.store).await;
    let record = seed_demographic(&harness.store, fileset.fileset_id, "123456789").await;

    // Start, stall, sweep: both the original event and the replayed copy are
    // now queued for the same saga state
    harness.system.tick().await.unwrap();
    harness.backdate_active_sagas(Duration::minutes(5)).await;
    harness.system.sweep().await.unwrap();
    harness.system.process_pending().await;

    let record = harness
        .store
        .find_demographic(record.demographic_student_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.student_status, StudentStatus::Verified);
    assert_eq!(harness.downstream.write_count(), 1);
    assert_eq!(harness.active_sagas().await, 0);
}

#[tokio::test]
async fn double_sweep_of_the_same_state_is_idempotent() {
    let mut harness = TestHarness::new();
    let fileset = seed_fileset(&harness.store).await;
    let record = seed_demographic(&harness.store, fileset.fileset_id, "123456789").await;

    harness.system.tick().await.unwrap();
    // Two sweeps from the same persisted state queue two replayed copies
    harness.backdate_active_sagas(Duration::minutes(5)).await;
    harness.system.sweep().await.unwrap();
    harness.backdate_active_sagas(Duration::minutes(5)).await;
    harness.system.sweep().await.unwrap();
    harness.system.process_pending().await;

    let record = harness
        .store
        .find_demographic(record.demographic_student_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.student_status, StudentStatus::Verified);
    assert_eq!(harness.downstream.write_count(), 1);
}

#[tokio::test]
async fn sweep_restarts_a_saga_with_no_committed_steps() {
    let harness = TestHarness::new();
    let fileset = seed_fileset(&harness.store).await;
    seed_course(
        &harness.store,
        fileset.fileset_id,
        "123456789",
        StudentStatus::Verified,
    )
    .await;

    // A saga created but never started has an empty event log; replay falls
    // back to running the entry step
    let orchestrator = harness.system.orchestrator();
    let payload = serde_json::json!({ "pen": "123456789", "fileset_id": fileset.fileset_id });
    orchestrator
        .create_saga(
            grad_collection_core::sagas::COURSE_DOWNSTREAM_UPDATE,
            payload,
            Some(grad_collection_core::SagaEntityKey::Pen("123456789".to_string())),
            TEST_USER,
        )
        .await
        .unwrap();

    harness.backdate_active_sagas(Duration::minutes(5)).await;
    let summary = harness.system.sweep().await.unwrap();
    assert_eq!(summary.replayed, 1);
}

#[tokio::test]
async fn purge_removes_stale_filesets_and_old_sagas() {
    let mut harness = TestHarness::with_config(CollectionConfig {
        fileset_stale_window: std::time::Duration::from_secs(30 * 24 * 3600),
        saga_retention_window: std::time::Duration::ZERO,
        ..test_config()
    });

    // Complete one full flow so a COMPLETED saga exists
    let active = seed_fileset(&harness.store).await;
    seed_demographic(&harness.store, active.fileset_id, "123456789").await;
    harness.tick_and_settle().await;

    // A second fileset that went quiet months ago with files still missing
    let mut stale = grad_collection_core::models::IncomingFileset::new(TEST_SCHOOL, TEST_USER);
    stale.demographic_file_status = grad_collection_core::state_machine::FileStatus::Loaded;
    stale.update_date = chrono::Utc::now() - Duration::days(45);
    let stale = harness.store.insert_fileset(stale).await.unwrap();

    // A COMPLETED fileset from four collection cycles ago, past the age window
    let mut aged = grad_collection_core::models::IncomingFileset::new(TEST_SCHOOL, TEST_USER);
    aged.demographic_file_status = grad_collection_core::state_machine::FileStatus::Loaded;
    aged.course_file_status = grad_collection_core::state_machine::FileStatus::Loaded;
    aged.assessment_file_status = grad_collection_core::state_machine::FileStatus::Loaded;
    aged.fileset_status = FilesetStatus::Completed;
    aged.create_date = chrono::Utc::now() - Duration::days(4 * 365);
    aged.update_date = aged.create_date;
    let aged = harness.store.insert_fileset(aged).await.unwrap();

    let summary = harness.system.purge().await.unwrap();
    assert_eq!(summary.stale_filesets, 1);
    assert_eq!(summary.aged_filesets, 1);
    assert!(summary.purged_sagas >= 1);

    assert!(harness
        .store
        .find_fileset(stale.fileset_id)
        .await
        .unwrap()
        .is_none());
    assert!(harness
        .store
        .find_fileset(aged.fileset_id)
        .await
        .unwrap()
        .is_none());
    // The active fileset survives
    let active = harness.store.find_fileset(active.fileset_id).await.unwrap().unwrap();
    assert_eq!(active.fileset_status, FilesetStatus::Loaded);
}

/// Delegates to the in-memory store but refuses saga row writes for one
/// designated saga, standing in for a transient persistence fault.
struct FlakySagaStore {
    inner: std::sync::Arc<grad_collection_core::persistence::InMemoryStore>,
    refused: parking_lot::Mutex<Option<uuid::Uuid>>,
}

impl FlakySagaStore {
    fn refuse(&self, saga_id: uuid::Uuid) {
        *self.refused.lock() = Some(saga_id);
    }
}

#[async_trait::async_trait]
impl grad_collection_core::persistence::SagaStore for FlakySagaStore {
    async fn insert_saga(
        &self,
        saga: grad_collection_core::models::CollectionSaga,
    ) -> grad_collection_core::error::Result<grad_collection_core::models::CollectionSaga> {
        self.inner.insert_saga(saga).await
    }

    async fn save_saga(
        &self,
        saga: &grad_collection_core::models::CollectionSaga,
    ) -> grad_collection_core::error::Result<()> {
        if *self.refused.lock() == Some(saga.saga_id) {
            return Err(grad_collection_core::error::CollectionError::store(
                "save_saga",
                "saga row write refused",
            ));
        }
        self.inner.save_saga(saga).await
    }

    async fn find_saga(
        &self,
        saga_id: uuid::Uuid,
    ) -> grad_collection_core::error::Result<Option<grad_collection_core::models::CollectionSaga>>
    {
        self.inner.find_saga(saga_id).await
    }

    async fn append_event(
        &self,
        event: grad_collection_core::models::SagaEventState,
    ) -> grad_collection_core::error::Result<()> {
        self.inner.append_event(event).await
    }

    async fn events_for_saga(
        &self,
        saga_id: uuid::Uuid,
    ) -> grad_collection_core::error::Result<Vec<grad_collection_core::models::SagaEventState>>
    {
        self.inner.events_for_saga(saga_id).await
    }

    async fn active_saga_count(&self) -> grad_collection_core::error::Result<u64> {
        self.inner.active_saga_count().await
    }

    async fn active_saga_exists(
        &self,
        entity: &grad_collection_core::SagaEntityKey,
        saga_name: &str,
    ) -> grad_collection_core::error::Result<bool> {
        self.inner.active_saga_exists(entity, saga_name).await
    }

    async fn stalled_sagas(
        &self,
        limit: usize,
    ) -> grad_collection_core::error::Result<Vec<grad_collection_core::models::CollectionSaga>>
    {
        self.inner.stalled_sagas(limit).await
    }

    async fn purge_completed_before(
        &self,
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> grad_collection_core::error::Result<u64> {
        self.inner.purge_completed_before(cutoff).await
    }
}

#[tokio::test]
async fn one_failed_retry_persist_does_not_abort_the_sweep() {
    use grad_collection_core::messaging::InMemoryEventBus;
    use grad_collection_core::orchestration::{recipes, SagaOrchestrator, SagaSweeper};
    use std::sync::Arc;

    let inner = Arc::new(grad_collection_core::persistence::InMemoryStore::new());
    let saga_store = Arc::new(FlakySagaStore {
        inner: inner.clone(),
        refused: parking_lot::Mutex::new(None),
    });
    let bus = Arc::new(InMemoryEventBus::new());

    let mut orchestrator = SagaOrchestrator::new(saga_store.clone(), bus);
    orchestrator
        .register(recipes::fileset::recipe(inner.clone()).expect("fileset recipe"));
    let orchestrator = Arc::new(orchestrator);
    let sweeper = SagaSweeper::new(orchestrator.clone(), saga_store.clone(), &test_config());

    let mut saga_ids = Vec::new();
    for _ in 0..2 {
        let fileset = seed_fileset(&inner).await;
        let payload = serde_json::json!({
            "fileset_id": fileset.fileset_id,
            "school_id": TEST_SCHOOL,
        });
        let saga = orchestrator
            .create_saga(
                grad_collection_core::sagas::FILESET_COMPLETION,
                payload,
                Some(grad_collection_core::SagaEntityKey::Fileset(fileset.fileset_id)),
                TEST_USER,
            )
            .await
            .unwrap();
        saga_ids.push(saga.saga_id);
    }

    // Stall both, then poison the second one's saga row writes
    for saga_id in &saga_ids {
        let mut saga = inner.find_saga(*saga_id).await.unwrap().unwrap();
        saga.update_date = chrono::Utc::now() - Duration::minutes(5);
        inner.save_saga(&saga).await.unwrap();
    }
    saga_store.refuse(saga_ids[1]);

    let summary = sweeper.sweep().await.unwrap();
    assert_eq!(summary.examined, 2);
    assert_eq!(summary.replayed, 1);
    assert_eq!(summary.failed, 1);
}
