//! Assessment (XAM) record processing recipe.

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
    Recipe::builder(
        sagas::ASSESSMENT_STUDENT_PROCESSING,
        topics::ASSESSMENT_STUDENT_PROCESSING,
    )
    .begin(
        events::VALIDATE_ASSESSMENT_STUDENT,
        Arc::new(ValidateAssessmentStudent {
            store: store.clone(),
            rules,
            schools,
        }),
    )
    .step(
        events::VALIDATE_ASSESSMENT_STUDENT,
        EventOutcome::Success,
        events::WRITE_ASSESSMENT_DOWNSTREAM,
        Arc::new(WriteAssessmentDownstream {
            store: store.clone(),
            downstream,
        }),
    )
    .or()
    .step(
        events::VALIDATE_ASSESSMENT_STUDENT,
        EventOutcome::ValidationIssues,
        events::FLAG_ASSESSMENT_ERRORS,
        Arc::new(FlagAssessmentErrors { store }),
    )
    .end(events::WRITE_ASSESSMENT_DOWNSTREAM, EventOutcome::Success)
    .end(events::FLAG_ASSESSMENT_ERRORS, EventOutcome::Success)
    .build()
}

struct ValidateAssessmentStudent {
    store: Arc<dyn CollectionStore>,
    rules: Arc<dyn ValidationRules>,
    schools: Arc<SchoolCache>,
}

#[async_trait]
impl StepHandler for ValidateAssessmentStudent {
    async fn handle(&self, saga: &CollectionSaga) -> Result<EventOutcome> {
        let data: StudentSagaData = serde_json::from_value(saga.payload.clone())?;
        let mut record = self
            .store
            .find_assessment(data.student_id)
            .await?
            .ok_or_else(|| {
                CollectionError::orchestration(format!(
                    "assessment record {} not found",
                    data.student_id
                ))
            })?;

        let context = ValidationContext {
            school: self.schools.get(&data.school_id).await?,
        };
        record.validation_issues = self.rules.validate(RecordView::Assessment(&record), &context);
        record.update_date = Utc::now();
        self.store.save_assessment(&record).await?;

        if record.has_error_issues() {
            Ok(EventOutcome::ValidationIssues)
        } else {
            Ok(EventOutcome::Success)
        }
    }
}

struct WriteAssessmentDownstream {
    store: Arc<dyn CollectionStore>,
    downstream: Arc<dyn DownstreamClient>,
}

#[async_trait]
impl StepHandler for WriteAssessmentDownstream {
    async fn handle(&self, saga: &CollectionSaga) -> Result<EventOutcome> {
        let data: StudentSagaData = serde_json::from_value(saga.payload.clone())?;
        let mut record = self
            .store
            .find_assessment(data.student_id)
            .await?
            .ok_or_else(|| {
                CollectionError::orchestration(format!(
                    "assessment record {} not found",
                    data.student_id
                ))
            })?;

        if record.student_status.is_settled() {
            debug!(student_id = %data.student_id, "Assessment record already settled, skipping write");
            return Ok(EventOutcome::Success);
        }

        self.downstream.write_assessment(&record).await?;

        let target = if record.has_warning_issues() {
            StudentStatus::Warning
        } else {
            StudentStatus::Verified
        };
        record.student_status =
            StudentStateMachine::transition(RecordKind::Assessment, record.student_status, target)?;
        record.update_date = Utc::now();
        self.store.save_assessment(&record).await?;
        Ok(EventOutcome::Success)
    }
}

struct FlagAssessmentErrors {
    store: Arc<dyn CollectionStore>,
}

#[async_trait]
impl StepHandler for FlagAssessmentErrors {
    async fn handle(&self, saga: &CollectionSaga) -> Result<EventOutcome> {
        let data: StudentSagaData = serde_json::from_value(saga.payload.clone())?;
        let mut record = self
            .store
            .find_assessment(data.student_id)
            .await?
            .ok_or_else(|| {
                CollectionError::orchestration(format!(
                    "assessment record {} not found",
                    data.student_id
                ))
            })?;

        if record.student_status == StudentStatus::Error {
            return Ok(EventOutcome::Success);
        }

        record.student_status = StudentStateMachine::transition(
            RecordKind::Assessment,
            record.student_status,
            StudentStatus::Error,
        )?;
        record.update_date = Utc::now();
        self.store.save_assessment(&record).await?;
        Ok(EventOutcome::Success)
    }
}
