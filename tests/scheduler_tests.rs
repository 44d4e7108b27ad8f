//! Work-selection behavior: the global cap, the strict category priority, the
//! batch clamp, and the per-entity exclusivity guard.

mod common;

use common::*;
use grad_collection_core::config::CollectionConfig;
use grad_collection_core::persistence::CollectionStore;
use grad_collection_core::state_machine::{FilesetStatus, StudentStatus};
use grad_collection_core::{TickOutcome, WorkCategory};

#[tokio::test]
async fn tick_is_idle_with_nothing_to_do() {
    let harness = TestHarness::new();
    assert_eq!(harness.system.tick().await.unwrap(), TickOutcome::Idle);
}

#[tokio::test]
async fn tick_respects_the_concurrency_cap() {
    let harness = TestHarness::with_config(CollectionConfig {
        saga_concurrency_cap: 0,
        ..test_config()
    });
    let fileset = seed_fileset(&harness.store).await;
    seed_demographic(&harness.store, fileset.fileset_id, "123456789").await;

    assert_eq!(harness.system.tick().await.unwrap(), TickOutcome::AtCapacity);
    assert_eq!(harness.active_sagas().await, 0);
}

#[tokio::test]
async fn batch_size_clamps_how_much_one_tick_starts() {
    let mut harness = TestHarness::with_config(CollectionConfig {
        tick_batch_size: 2,
        ..test_config()
    });
    let fileset = seed_fileset(&harness.store).await;
    for i in 0..5 {
        seed_demographic(&harness.store, fileset.fileset_id, &format!("12345678{i}")).await;
    }

    let outcome = harness.tick_and_settle().await;
    assert_eq!(
        outcome,
        TickOutcome::Started {
            category: WorkCategory::DemographicProcessing,
            count: 2
        }
    );
    assert_eq!(harness.downstream.write_count(), 2);
}

#[tokio::test]
async fn headroom_under_the_cap_clamps_the_batch() {
    let harness = TestHarness::with_config(CollectionConfig {
        saga_concurrency_cap: 3,
        tick_batch_size: 20,
        ..test_config()
    });
    let fileset = seed_fileset(&harness.store).await;
    for i in 0..5 {
        seed_demographic(&harness.store, fileset.fileset_id, &format!("12345678{i}")).await;
    }

    // No draining: the three started sagas stay active
    let outcome = harness.system.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Started {
            category: WorkCategory::DemographicProcessing,
            count: 3
        }
    );
    assert_eq!(harness.active_sagas().await, 3);
    assert_eq!(harness.system.tick().await.unwrap(), TickOutcome::AtCapacity);
}

#[tokio::test]
async fn completable_filesets_outrank_loaded_records() {
    let mut harness = TestHarness::new();
    // One fileset ready to complete, another with a LOADED record
    let done = seed_fileset(&harness.store).await;
    let busy = seed_fileset(&harness.store).await;
    let record = seed_demographic(&harness.store, busy.fileset_id, "123456789").await;

    let outcome = harness.tick_and_settle().await;
    assert_eq!(
        outcome,
        TickOutcome::Started {
            category: WorkCategory::FilesetCompletion,
            count: 1
        }
    );

    let done = harness.store.find_fileset(done.fileset_id).await.unwrap().unwrap();
    assert_eq!(done.fileset_status, FilesetStatus::Completed);
    let record = harness
        .store
        .find_demographic(record.demographic_student_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.student_status, StudentStatus::Loaded);
}

#[tokio::test]
async fn demographics_outrank_other_record_kinds() {
    let mut harness = TestHarness::new();
    let fileset = seed_fileset(&harness.store).await;
    seed_demographic(&harness.store, fileset.fileset_id, "123456789").await;
    seed_course(
        &harness.store,
        fileset.fileset_id,
        "123456789",
        StudentStatus::Loaded,
    )
    .await;
    seed_assessment(&harness.store, fileset.fileset_id, "123456789").await;

    let outcome = harness.tick_and_settle().await;
    assert_eq!(
        outcome,
        TickOutcome::Started {
            category: WorkCategory::DemographicProcessing,
            count: 1
        }
    );
}

#[tokio::test]
async fn update_crs_waits_for_loaded_courses_in_the_fileset() {
    let mut harness = TestHarness::new();
    let fileset = seed_fileset(&harness.store).await;
    seed_course(
        &harness.store,
        fileset.fileset_id,
        "111111111",
        StudentStatus::UpdateCrs,
    )
    .await;
    seed_course(
        &harness.store,
        fileset.fileset_id,
        "222222222",
        StudentStatus::Loaded,
    )
    .await;

    // The LOADED course wins the tick; the UPDATE_CRS PEN is not selectable
    // while its fileset still has LOADED course records
    let outcome = harness.tick_and_settle().await;
    assert_eq!(
        outcome,
        TickOutcome::Started {
            category: WorkCategory::CourseProcessing,
            count: 1
        }
    );

    // With the LOADED course settled, the resync is next
    let outcome = harness.tick_and_settle().await;
    assert_eq!(
        outcome,
        TickOutcome::Started {
            category: WorkCategory::CourseDownstreamUpdate,
            count: 1
        }
    );
}

#[tokio::test]
async fn active_saga_per_entity_is_exclusive() {
    let harness = TestHarness::new();
    let fileset = seed_fileset(&harness.store).await;
    seed_demographic(&harness.store, fileset.fileset_id, "123456789").await;

    // Start without draining, then tick again: the record is still LOADED
    // but owned by an active saga, so it is no longer a candidate
    harness.system.tick().await.unwrap();
    assert_eq!(harness.active_sagas().await, 1);

    assert_eq!(harness.system.tick().await.unwrap(), TickOutcome::Idle);
    assert_eq!(harness.active_sagas().await, 1);
}

#[tokio::test]
async fn in_flight_records_do_not_shadow_lower_priority_work() {
    let harness = TestHarness::new();
    let busy = seed_fileset(&harness.store).await;
    seed_demographic(&harness.store, busy.fileset_id, "123456789").await;
    let other = seed_fileset(&harness.store).await;
    seed_assessment(&harness.store, other.fileset_id, "987654321").await;

    let outcome = harness.system.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Started {
            category: WorkCategory::DemographicProcessing,
            count: 1
        }
    );

    // The demographic saga is still in flight; its record must not keep
    // claiming ticks while eligible assessment work waits
    let outcome = harness.system.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Started {
            category: WorkCategory::AssessmentProcessing,
            count: 1
        }
    );
    assert_eq!(harness.active_sagas().await, 2);
}

#[tokio::test]
async fn one_resync_saga_per_pen_regardless_of_row_count() {
    let harness = TestHarness::new();
    let fileset = seed_fileset(&harness.store).await;
    for _ in 0..5 {
        seed_course(
            &harness.store,
            fileset.fileset_id,
            "123456789",
            StudentStatus::UpdateCrs,
        )
        .await;
    }

    let outcome = harness.system.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Started {
            category: WorkCategory::CourseDownstreamUpdate,
            count: 1
        }
    );
    assert_eq!(harness.active_sagas().await, 1);
}
