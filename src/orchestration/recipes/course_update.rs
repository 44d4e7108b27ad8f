//! Downstream course resync recipe.
//!
//! One saga per PEN, not per row: all UPDATE_CRS course records sharing a PEN
//! are resynced downstream in a single batch write, then returned to VERIFIED.
//! The handler re-reads the UPDATE_CRS rows at execution time, so rows flipped
//! into or out of UPDATE_CRS since scheduling are picked up or skipped
//! naturally. An empty batch is a successful no-op.

use crate::constants::{events, sagas, topics};
use crate::error::Result;
use crate::models::CollectionSaga;
use crate::orchestration::recipe::{Recipe, StepHandler};
use crate::orchestration::types::{CourseUpdateSagaData, EventOutcome};
use crate::persistence::CollectionStore;
use crate::services::DownstreamClient;
use crate::state_machine::{RecordKind, StudentStateMachine, StudentStatus};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

pub fn recipe(
    store: Arc<dyn CollectionStore>,
    downstream: Arc<dyn DownstreamClient>,
) -> Result<Recipe> {
    Recipe::builder(sagas::COURSE_DOWNSTREAM_UPDATE, topics::COURSE_DOWNSTREAM_UPDATE)
        .begin(
            events::WRITE_COURSE_UPDATE_BATCH,
            Arc::new(WriteCourseUpdateBatch { store, downstream }),
        )
        .end(events::WRITE_COURSE_UPDATE_BATCH, EventOutcome::Success)
        .build()
}

struct WriteCourseUpdateBatch {
    store: Arc<dyn CollectionStore>,
    downstream: Arc<dyn DownstreamClient>,
}

#[async_trait]
impl StepHandler for WriteCourseUpdateBatch {
    async fn handle(&self, saga: &CollectionSaga) -> Result<EventOutcome> {
        let data: CourseUpdateSagaData = serde_json::from_value(saga.payload.clone())?;
        let batch = self.store.update_crs_courses_for_pen(&data.pen).await?;

        if batch.is_empty() {
            debug!(pen = %data.pen, "No UPDATE_CRS course records remain for PEN, nothing to resync");
            return Ok(EventOutcome::Success);
        }

        self.downstream.write_course_batch(&data.pen, &batch).await?;

        for mut record in batch {
            record.student_status = StudentStateMachine::transition(
                RecordKind::Course,
                record.student_status,
                StudentStatus::Verified,
            )?;
            record.update_date = Utc::now();
            self.store.save_course(&record).await?;
        }

        info!(pen = %data.pen, "Resynced UPDATE_CRS course records downstream");
        Ok(EventOutcome::Success)
    }
}
