//! # Work-Selection Scheduler
//!
//! Periodic tick that decides what work the system starts next. Each tick
//! walks a strict priority ladder and short-circuits on the first category
//! with candidates:
//!
//! 1. Global cap check: at `saga_concurrency_cap` active sagas, do nothing.
//! 2. Completable filesets (all files present, no unsettled records).
//! 3. LOADED demographic records.
//! 4. LOADED assessment records (filesets without LOADED demographics).
//! 5. LOADED course records (filesets without LOADED demographics).
//! 6. Distinct UPDATE_CRS PENs (filesets without LOADED courses).
//!
//! Candidate queries order by (create_date, id) so selection is stable, and
//! each tick starts at most `tick_batch_size` sagas, further clamped to the
//! headroom under the cap. The cap is soft: the count is read before work is
//! started, so concurrent event completion can briefly overshoot it.
//!
//! Per-entity exclusivity lives in the candidate queries: a record bound to a
//! non-COMPLETED saga is not a candidate, so a category whose records are all
//! in flight yields nothing and the tick falls through to the next category.
//! `start_saga` rechecks the guard before creating, since candidate selection
//! is read-then-act.

use crate::config::CollectionConfig;
use crate::constants::{sagas, system};
use crate::error::Result;
use crate::models::{IncomingFileset, SagaEntityKey};
use crate::orchestration::types::{
    CourseUpdateSagaData, FilesetSagaData, StudentSagaData, TickOutcome, WorkCategory,
};
use crate::orchestration::SagaOrchestrator;
use crate::persistence::{CollectionStore, SagaStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub struct WorkScheduler {
    orchestrator: Arc<SagaOrchestrator>,
    saga_store: Arc<dyn SagaStore>,
    store: Arc<dyn CollectionStore>,
    concurrency_cap: u64,
    tick_batch_size: usize,
    interval: Duration,
}

impl WorkScheduler {
    pub fn new(
        orchestrator: Arc<SagaOrchestrator>,
        saga_store: Arc<dyn SagaStore>,
        store: Arc<dyn CollectionStore>,
        config: &CollectionConfig,
    ) -> Self {
        Self {
            orchestrator,
            saga_store,
            store,
            concurrency_cap: config.saga_concurrency_cap,
            tick_batch_size: config.tick_batch_size,
            interval: config.scheduler_interval,
        }
    }

    /// Run ticks forever at the configured interval. Tick errors are logged
    /// and do not stop the loop.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(interval_ms = self.interval.as_millis() as u64, "Work scheduler running");
        loop {
            ticker.tick().await;
            match self.tick().await {
                Ok(TickOutcome::Started { category, count }) => {
                    debug!(?category, count, "Scheduler tick started work");
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Scheduler tick failed"),
            }
        }
    }

    /// One pass down the priority ladder.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<TickOutcome> {
        let active = self.saga_store.active_saga_count().await?;
        if active >= self.concurrency_cap {
            debug!(active, cap = self.concurrency_cap, "At saga concurrency cap");
            return Ok(TickOutcome::AtCapacity);
        }
        let headroom = (self.concurrency_cap - active) as usize;
        let batch = self.tick_batch_size.min(headroom);

        let filesets = self.store.completable_filesets(batch).await?;
        if !filesets.is_empty() {
            let count = self.start_fileset_completions(filesets).await?;
            return Ok(TickOutcome::Started {
                category: WorkCategory::FilesetCompletion,
                count,
            });
        }

        let demographics = self.store.loaded_demographics(batch).await?;
        if !demographics.is_empty() {
            let mut count = 0;
            let mut schools = SchoolLookup::new(self.store.clone());
            for record in demographics {
                let data = StudentSagaData {
                    student_id: record.demographic_student_id,
                    fileset_id: record.fileset_id,
                    school_id: schools.school_id(record.fileset_id).await?,
                    pen: record.pen,
                };
                let entity = data.entity_key_demographic();
                count += self
                    .start_saga(sagas::DEMOGRAPHIC_STUDENT_PROCESSING, &data, entity)
                    .await? as usize;
            }
            return Ok(TickOutcome::Started {
                category: WorkCategory::DemographicProcessing,
                count,
            });
        }

        let assessments = self.store.loaded_assessments(batch).await?;
        if !assessments.is_empty() {
            let mut count = 0;
            let mut schools = SchoolLookup::new(self.store.clone());
            for record in assessments {
                let data = StudentSagaData {
                    student_id: record.assessment_student_id,
                    fileset_id: record.fileset_id,
                    school_id: schools.school_id(record.fileset_id).await?,
                    pen: record.pen,
                };
                let entity = data.entity_key_assessment();
                count += self
                    .start_saga(sagas::ASSESSMENT_STUDENT_PROCESSING, &data, entity)
                    .await? as usize;
            }
            return Ok(TickOutcome::Started {
                category: WorkCategory::AssessmentProcessing,
                count,
            });
        }

        let courses = self.store.loaded_courses(batch).await?;
        if !courses.is_empty() {
            let mut count = 0;
            let mut schools = SchoolLookup::new(self.store.clone());
            for record in courses {
                let data = StudentSagaData {
                    student_id: record.course_student_id,
                    fileset_id: record.fileset_id,
                    school_id: schools.school_id(record.fileset_id).await?,
                    pen: record.pen,
                };
                let entity = data.entity_key_course();
                count += self
                    .start_saga(sagas::COURSE_STUDENT_PROCESSING, &data, entity)
                    .await? as usize;
            }
            return Ok(TickOutcome::Started {
                category: WorkCategory::CourseProcessing,
                count,
            });
        }

        let pens = self.store.update_crs_pens(batch).await?;
        if !pens.is_empty() {
            let mut count = 0;
            for candidate in pens {
                let data = CourseUpdateSagaData {
                    pen: candidate.pen.clone(),
                    fileset_id: candidate.fileset_id,
                };
                let entity = SagaEntityKey::Pen(candidate.pen);
                count += self
                    .start_saga(sagas::COURSE_DOWNSTREAM_UPDATE, &data, entity)
                    .await? as usize;
            }
            return Ok(TickOutcome::Started {
                category: WorkCategory::CourseDownstreamUpdate,
                count,
            });
        }

        Ok(TickOutcome::Idle)
    }

    async fn start_fileset_completions(&self, filesets: Vec<IncomingFileset>) -> Result<usize> {
        let mut count = 0;
        for fileset in filesets {
            let data = FilesetSagaData {
                fileset_id: fileset.fileset_id,
                school_id: fileset.school_id,
            };
            let entity = SagaEntityKey::Fileset(data.fileset_id);
            count += self
                .start_saga(sagas::FILESET_COMPLETION, &data, entity)
                .await? as usize;
        }
        Ok(count)
    }

    /// Create and start one saga unless one is already active for the entity.
    /// Returns whether a saga was actually started.
    async fn start_saga<T: serde::Serialize>(
        &self,
        recipe_name: &str,
        data: &T,
        entity: SagaEntityKey,
    ) -> Result<bool> {
        if self.saga_store.active_saga_exists(&entity, recipe_name).await? {
            debug!(recipe_name, ?entity, "Active saga already exists for entity, skipping");
            return Ok(false);
        }
        let payload = serde_json::to_value(data)?;
        let saga = self
            .orchestrator
            .create_saga(recipe_name, payload, Some(entity), system::SCHEDULER_USER)
            .await?;
        self.orchestrator.start_saga(&saga).await?;
        Ok(true)
    }
}

/// Per-tick cache of fileset school ids, so a batch of records from the same
/// fileset costs one lookup.
struct SchoolLookup {
    store: Arc<dyn CollectionStore>,
    cache: HashMap<Uuid, String>,
}

impl SchoolLookup {
    fn new(store: Arc<dyn CollectionStore>) -> Self {
        Self {
            store,
            cache: HashMap::new(),
        }
    }

    async fn school_id(&mut self, fileset_id: Uuid) -> Result<String> {
        if let Some(school_id) = self.cache.get(&fileset_id) {
            return Ok(school_id.clone());
        }
        let school_id = match self.store.find_fileset(fileset_id).await? {
            Some(fileset) => fileset.school_id,
            None => {
                warn!(%fileset_id, "Record references a missing fileset");
                String::new()
            }
        };
        self.cache.insert(fileset_id, school_id.clone());
        Ok(school_id)
    }
}
