//! End-to-end saga flows over the in-memory store and bus: one scheduler tick
//! starts the work, draining the event queues runs every started saga to its
//! terminal state.

mod common;

use common::*;
use grad_collection_core::models::ValidationIssue;
use grad_collection_core::persistence::CollectionStore;
use grad_collection_core::state_machine::{FilesetStatus, StudentStatus};
use grad_collection_core::{TickOutcome, WorkCategory};

#[tokio::test]
async fn clean_demographic_record_settles_verified() {
    let mut harness = TestHarness::new();
    let fileset = seed_fileset(&harness.store).await;
    let record = seed_demographic(&harness.store, fileset.fileset_id, "123456789").await;

    let outcome = harness.tick_and_settle().await;
    assert_eq!(
        outcome,
        TickOutcome::Started {
            category: WorkCategory::DemographicProcessing,
            count: 1
        }
    );

    let record = harness
        .store
        .find_demographic(record.demographic_student_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.student_status, StudentStatus::Verified);
    assert!(record.validation_issues.is_empty());
    assert_eq!(
        harness.downstream.writes(),
        vec![DownstreamWrite::Demographic(record.demographic_student_id)]
    );
    assert_eq!(harness.active_sagas().await, 0);
}

#[tokio::test]
async fn error_issue_flags_record_without_downstream_write() {
    let mut harness = TestHarness::new();
    let fileset = seed_fileset(&harness.store).await;
    let record = seed_demographic(&harness.store, fileset.fileset_id, "999999999").await;
    harness.rules.script(
        "999999999",
        vec![ValidationIssue::error("PEN_INVALID", "PEN")],
    );

    harness.tick_and_settle().await;

    let record = harness
        .store
        .find_demographic(record.demographic_student_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.student_status, StudentStatus::Error);
    assert_eq!(record.validation_issues.len(), 1);
    assert_eq!(harness.downstream.write_count(), 0);
    assert_eq!(harness.active_sagas().await, 0);
}

#[tokio::test]
async fn warning_issue_still_writes_downstream() {
    let mut harness = TestHarness::new();
    let fileset = seed_fileset(&harness.store).await;
    let record = seed_demographic(&harness.store, fileset.fileset_id, "123456789").await;
    harness.rules.script(
        "123456789",
        vec![ValidationIssue::warning("LOCAL_ID_BLANK", "LOCAL_ID")],
    );

    harness.tick_and_settle().await;

    let record = harness
        .store
        .find_demographic(record.demographic_student_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.student_status, StudentStatus::Warning);
    assert_eq!(harness.downstream.write_count(), 1);
}

#[tokio::test]
async fn course_and_assessment_records_settle_like_demographics() {
    let mut harness = TestHarness::new();
    let fileset = seed_fileset(&harness.store).await;
    let course = seed_course(
        &harness.store,
        fileset.fileset_id,
        "123456789",
        StudentStatus::Loaded,
    )
    .await;
    let assessment = seed_assessment(&harness.store, fileset.fileset_id, "123456789").await;

    // Assessments outrank courses; two ticks settle both kinds
    let first = harness.tick_and_settle().await;
    assert_eq!(
        first,
        TickOutcome::Started {
            category: WorkCategory::AssessmentProcessing,
            count: 1
        }
    );
    let second = harness.tick_and_settle().await;
    assert_eq!(
        second,
        TickOutcome::Started {
            category: WorkCategory::CourseProcessing,
            count: 1
        }
    );

    let course = harness
        .store
        .find_course(course.course_student_id)
        .await
        .unwrap()
        .unwrap();
    let assessment = harness
        .store
        .find_assessment(assessment.assessment_student_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(course.student_status, StudentStatus::Verified);
    assert_eq!(assessment.student_status, StudentStatus::Verified);
    assert_eq!(harness.downstream.write_count(), 2);
}

#[tokio::test]
async fn fileset_completes_once_every_record_settles() {
    let mut harness = TestHarness::new();
    let fileset = seed_fileset(&harness.store).await;
    seed_demographic(&harness.store, fileset.fileset_id, "123456789").await;

    // First tick settles the record, second completes the fileset
    harness.tick_and_settle().await;
    let outcome = harness.tick_and_settle().await;
    assert_eq!(
        outcome,
        TickOutcome::Started {
            category: WorkCategory::FilesetCompletion,
            count: 1
        }
    );

    let fileset = harness
        .store
        .find_fileset(fileset.fileset_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fileset.fileset_status, FilesetStatus::Completed);
    assert_eq!(harness.active_sagas().await, 0);
}

#[tokio::test]
async fn update_crs_pen_resyncs_as_one_batch() {
    let mut harness = TestHarness::new();
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

    let outcome = harness.tick_and_settle().await;
    assert_eq!(
        outcome,
        TickOutcome::Started {
            category: WorkCategory::CourseDownstreamUpdate,
            count: 1
        }
    );
    assert_eq!(
        harness.downstream.writes(),
        vec![DownstreamWrite::CourseBatch {
            pen: "123456789".to_string(),
            count: 5
        }]
    );

    let remaining = harness.store.update_crs_pens(10).await.unwrap();
    assert!(remaining.is_empty());
    assert_eq!(harness.active_sagas().await, 0);
}

#[tokio::test]
async fn empty_update_crs_batch_is_a_successful_noop() {
    let mut harness = TestHarness::new();
    let fileset = seed_fileset(&harness.store).await;
    // Row settled before the saga runs: the batch step finds nothing to do
    seed_course(
        &harness.store,
        fileset.fileset_id,
        "123456789",
        StudentStatus::Verified,
    )
    .await;

    let orchestrator = harness.system.orchestrator();
    let payload = serde_json::json!({ "pen": "123456789", "fileset_id": fileset.fileset_id });
    let saga = orchestrator
        .create_saga(
            grad_collection_core::sagas::COURSE_DOWNSTREAM_UPDATE,
            payload,
            Some(grad_collection_core::SagaEntityKey::Pen("123456789".to_string())),
            TEST_USER,
        )
        .await
        .unwrap();
    orchestrator.start_saga(&saga).await.unwrap();
    harness.system.process_pending().await;

    assert_eq!(harness.downstream.write_count(), 0);
    assert_eq!(harness.active_sagas().await, 0);
}
