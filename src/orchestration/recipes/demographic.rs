//! Demographic (DEM) record processing recipe.
//!
//! validate -> clean: write downstream, settle VERIFIED/WARNING
//!          -> ERROR-severity issues: flag the record ERROR, no downstream write
//!
//! Either branch completes the saga normally; a validation failure is an
//! outcome, not an error.

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
    Recipe::builder(sagas::DEMOGRAPHIC_STUDENT_PROCESSING, topics::DEMOGRAPHIC_STUDENT_PROCESSING)
        .begin(
            events::VALIDATE_DEMOGRAPHIC_STUDENT,
            Arc::new(ValidateDemographicStudent {
                store: store.clone(),
                rules,
                schools,
            }),
        )
        .step(
            events::VALIDATE_DEMOGRAPHIC_STUDENT,
            EventOutcome::Success,
            events::WRITE_DEMOGRAPHIC_DOWNSTREAM,
            Arc::new(WriteDemographicDownstream {
                store: store.clone(),
                downstream,
            }),
        )
        .or()
        .step(
            events::VALIDATE_DEMOGRAPHIC_STUDENT,
            EventOutcome::ValidationIssues,
            events::FLAG_DEMOGRAPHIC_ERRORS,
            Arc::new(FlagDemographicErrors { store }),
        )
        .end(events::WRITE_DEMOGRAPHIC_DOWNSTREAM, EventOutcome::Success)
        .end(events::FLAG_DEMOGRAPHIC_ERRORS, EventOutcome::Success)
        .build()
}

struct ValidateDemographicStudent {
    store: Arc<dyn CollectionStore>,
    rules: Arc<dyn ValidationRules>,
    schools: Arc<SchoolCache>,
}

#[async_trait]
impl StepHandler for ValidateDemographicStudent {
    async fn handle(&self, saga: &CollectionSaga) -> Result<EventOutcome> {
        let data: StudentSagaData = serde_json::from_value(saga.payload.clone())?;
        let mut record = self
            .store
            .find_demographic(data.student_id)
            .await?
            .ok_or_else(|| {
                CollectionError::orchestration(format!(
                    "demographic record {} not found",
                    data.student_id
                ))
            })?;

        let context = ValidationContext {
            school: self.schools.get(&data.school_id).await?,
        };
        record.validation_issues = self
            .rules
            .validate(RecordView::Demographic(&record), &context);
        record.update_date = Utc::now();
        self.store.save_demographic(&record).await?;

        if record.has_error_issues() {
            Ok(EventOutcome::ValidationIssues)
        } else {
            Ok(EventOutcome::Success)
        }
    }
}

struct WriteDemographicDownstream {
    store: Arc<dyn CollectionStore>,
    downstream: Arc<dyn DownstreamClient>,
}

#[async_trait]
impl StepHandler for WriteDemographicDownstream {
    async fn handle(&self, saga: &CollectionSaga) -> Result<EventOutcome> {
        let data: StudentSagaData = serde_json::from_value(saga.payload.clone())?;
        let mut record = self
            .store
            .find_demographic(data.student_id)
            .await?
            .ok_or_else(|| {
                CollectionError::orchestration(format!(
                    "demographic record {} not found",
                    data.student_id
                ))
            })?;

        // Replay guard: the record already settled, the write already landed
        if record.student_status.is_settled() {
            debug!(student_id = %data.student_id, "Demographic record already settled, skipping write");
            return Ok(EventOutcome::Success);
        }

        self.downstream.write_demographic(&record).await?;

        let target = if record.has_warning_issues() {
            StudentStatus::Warning
        } else {
            StudentStatus::Verified
        };
        record.student_status =
            StudentStateMachine::transition(RecordKind::Demographic, record.student_status, target)?;
        record.update_date = Utc::now();
        self.store.save_demographic(&record).await?;
        Ok(EventOutcome::Success)
    }
}

struct FlagDemographicErrors {
    store: Arc<dyn CollectionStore>,
}

#[async_trait]
impl StepHandler for FlagDemographicErrors {
    async fn handle(&self, saga: &CollectionSaga) -> Result<EventOutcome> {
        let data: StudentSagaData = serde_json::from_value(saga.payload.clone())?;
        let mut record = self
            .store
            .find_demographic(data.student_id)
            .await?
            .ok_or_else(|| {
                CollectionError::orchestration(format!(
                    "demographic record {} not found",
                    data.student_id
                ))
            })?;

        if record.student_status == StudentStatus::Error {
            return Ok(EventOutcome::Success);
        }

        record.student_status = StudentStateMachine::transition(
            RecordKind::Demographic,
            record.student_status,
            StudentStatus::Error,
        )?;
        record.update_date = Utc::now();
        self.store.save_demographic(&record).await?;
        Ok(EventOutcome::Success)
    }
}
