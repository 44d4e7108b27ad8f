//! Course (CRS) record processing recipe.
//!
//! Mirrors the demographic recipe: validate, then either write downstream and
//! settle VERIFIED/WARNING, or flag ERROR. Course records are the only kind
//! that can later re-enter the pipeline as UPDATE_CRS, but that path belongs
//! to the downstream-update recipe, not this one.

use crate::constants::{events, sagas, topics};
use crate::error::{CollectionError, Result};
use crate::models::CollectionSaga;
use crate::orchestration::recipe::{Recipe, StepHandler};
use crate::orchestration::types::{EventOutcome, StudentSagaData};
use crate::persistence::CollectionStore;
use crate::services::{DownstreamClient, RecordView, SchoolCache, ValidationContext, ValidationRules};
use crate::state_machine::{RecordKind, StudentStateMachine, StudentStatus};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

pub fn recipe(
    store: Arc<dyn CollectionStore>,
    rules: Arc<dyn ValidationRules>,
    schools: Arc<SchoolCache>,
    downstream: Arc<dyn DownstreamClient>,
) -> Result<Recipe> {
    Recipe::builder(sagas::COURSE_STUDENT_PROCESSING, topics::COURSE_STUDENT_PROCESSING)
        .begin(
            events::VALIDATE_COURSE_STUDENT,
            Arc::new(ValidateCourseStudent {
                store: store.clone(),
                rules,
                schools,
            }),
        )
        .step(
            events::VALIDATE_COURSE_STUDENT,
            EventOutcome::Success,
            events::WRITE_COURSE_DOWNSTREAM,
            Arc::new(WriteCourseDownstream {
                store: store.clone(),
                downstream,
            }),
        )
        .or()
        .step(
            events::VALIDATE_COURSE_STUDENT,
            EventOutcome::ValidationIssues,
            events::FLAG_COURSE_ERRORS,
            Arc::new(FlagCourseErrors { store }),
        )
        .end(events::WRITE_COURSE_DOWNSTREAM, EventOutcome::Success)
        .end(events::FLAG_COURSE_ERRORS, EventOutcome::Success)
        .build()
}

struct ValidateCourseStudent {
    store: Arc<dyn CollectionStore>,
    rules: Arc<dyn ValidationRules>,
    schools: Arc<SchoolCache>,
}

#[async_trait]
impl StepHandler for ValidateCourseStudent {
    async fn handle(&self, saga: &CollectionSaga) -> Result<EventOutcome> {
        let data: StudentSagaData = serde_json::from_value(saga.payload.clone())?;
        let mut record = self
            .store
            .find_course(data.student_id)
            .await?
            .ok_or_else(|| {
                CollectionError::orchestration(format!("course record {} not found", data.student_id))
            })?;

        let context = ValidationContext {
            school: self.schools.get(&data.school_id).await?,
        };
        record.validation_issues = self.rules.validate(RecordView::Course(&record), &context);
        record.update_date = Utc::now();
        self.store.save_course(&record).await?;

        if record.has_error_issues() {
            Ok(EventOutcome::ValidationIssues)
        } else {
            Ok(EventOutcome::Success)
        }
    }
}

struct WriteCourseDownstream {
    store: Arc<dyn CollectionStore>,
    downstream: Arc<dyn DownstreamClient>,
}

#[async_trait]
impl StepHandler for WriteCourseDownstream {
    async fn handle(&self, saga: &CollectionSaga) -> Result<EventOutcome> {
        let data: StudentSagaData = serde_json::from_value(saga.payload.clone())?;
        let mut record = self
            .store
            .find_course(data.student_id)
            .await?
            .ok_or_else(|| {
                CollectionError::orchestration(format!("course record {} not found", data.student_id))
            })?;

        if record.student_status.is_settled() {
            debug!(student_id = %data.student_id, "Course record already settled, skipping write");
            return Ok(EventOutcome::Success);
        }

        self.downstream.write_course(&record).await?;

        let target = if record.has_warning_issues() {
            StudentStatus::Warning
        } else {
            StudentStatus::Verified
        };
        record.student_status =
            StudentStateMachine::transition(RecordKind::Course, record.student_status, target)?;
        record.update_date = Utc::now();
        self.store.save_course(&record).await?;
        Ok(EventOutcome::Success)
    }
}

struct FlagCourseErrors {
    store: Arc<dyn CollectionStore>,
}

#[async_trait]
impl StepHandler for FlagCourseErrors {
    async fn handle(&self, saga: &CollectionSaga) -> Result<EventOutcome> {
        let data: StudentSagaData = serde_json::from_value(saga.payload.clone())?;
        let mut record = self
            .store
            .find_course(data.student_id)
            .await?
            .ok_or_else(|| {
                CollectionError::orchestration(format!("course record {} not found", data.student_id))
            })?;

        if record.student_status == StudentStatus::Error {
            return Ok(EventOutcome::Success);
        }

        record.student_status = StudentStateMachine::transition(
            RecordKind::Course,
            record.student_status,
            StudentStatus::Error,
        )?;
        record.update_date = Utc::now();
        self.store.save_course(&record).await?;
        Ok(EventOutcome::Success)
    }
}
