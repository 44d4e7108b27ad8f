//! Fileset completion recipe.
//!
//! A single-step saga: re-check the completion guard against live state and
//! flip the fileset COMPLETED. The guard can legitimately fail here even
//! though the scheduler saw a completable fileset, because a record may have
//! reverted to UPDATE_CRS between selection and execution. That is not an
//! error: the saga finishes and the scheduler picks the fileset up again once
//! the guard holds.

use crate::constants::{events, sagas, topics};
use crate::error::{CollectionError, Result};
use crate::models::CollectionSaga;
use crate::orchestration::recipe::{Recipe, StepHandler};
use crate::orchestration::types::{EventOutcome, FilesetSagaData};
use crate::persistence::CollectionStore;
use crate::state_machine::{FilesetStateMachine, FilesetStatus};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub fn recipe(store: Arc<dyn CollectionStore>) -> Result<Recipe> {
    Recipe::builder(sagas::FILESET_COMPLETION, topics::FILESET_COMPLETION)
        .begin(events::COMPLETE_FILESET, Arc::new(CompleteFileset { store }))
        .end(events::COMPLETE_FILESET, EventOutcome::Success)
        .build()
}

struct CompleteFileset {
    store: Arc<dyn CollectionStore>,
}

#[async_trait]
impl StepHandler for CompleteFileset {
    async fn handle(&self, saga: &CollectionSaga) -> Result<EventOutcome> {
        let data: FilesetSagaData = serde_json::from_value(saga.payload.clone())?;
        let mut fileset = self
            .store
            .find_fileset(data.fileset_id)
            .await?
            .ok_or_else(|| {
                CollectionError::orchestration(format!("fileset {} not found", data.fileset_id))
            })?;

        if fileset.fileset_status == FilesetStatus::Completed {
            debug!(fileset_id = %data.fileset_id, "Fileset already completed, skipping");
            return Ok(EventOutcome::Success);
        }

        let unsettled = self.store.unsettled_record_count(data.fileset_id).await?;
        if let Err(guard) = FilesetStateMachine::can_complete(
            fileset.demographic_file_status,
            fileset.course_file_status,
            fileset.assessment_file_status,
            unsettled,
        ) {
            warn!(
                fileset_id = %data.fileset_id,
                reason = %guard,
                "Completion guard no longer holds, leaving fileset LOADED"
            );
            return Ok(EventOutcome::Success);
        }

        fileset.fileset_status =
            FilesetStateMachine::transition(fileset.fileset_status, FilesetStatus::Completed)?;
        fileset.touch(saga.create_user.as_str());
        self.store.save_fileset(&fileset).await?;
        Ok(EventOutcome::Success)
    }
}
