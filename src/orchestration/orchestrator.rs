//! # Saga Orchestrator
//!
//! Drives registered recipes over the event bus. Each inbound event advances
//! exactly one saga by one step: the step's business action runs against
//! freshly read persisted state, the event log row and saga row are saved,
//! and only then is the outcome event published. A crash between save and
//! publish is recovered by the sweeper re-deriving the lost event from the
//! persisted last completed step.

use crate::constants::events;
use crate::error::{CollectionError, Result};
use crate::messaging::{EventBus, SagaEvent};
use crate::models::{CollectionSaga, SagaEntityKey, SagaEventState};
use crate::orchestration::recipe::{Recipe, Resolution, StepHandler};
use crate::orchestration::types::EventOutcome;
use crate::persistence::SagaStore;
use crate::state_machine::SagaStatus;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub struct SagaOrchestrator {
    recipes: HashMap<&'static str, Recipe>,
    saga_store: Arc<dyn SagaStore>,
    bus: Arc<dyn EventBus>,
}

impl SagaOrchestrator {
    pub fn new(saga_store: Arc<dyn SagaStore>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            recipes: HashMap::new(),
            saga_store,
            bus,
        }
    }

    /// Topics of every registered recipe, one consumer subscription each
    pub fn topics(&self) -> Vec<&'static str> {
        self.recipes.values().map(|r| r.topic()).collect()
    }

    pub fn register(&mut self, recipe: Recipe) {
        self.recipes.insert(recipe.name(), recipe);
    }

    pub fn recipe(&self, name: &str) -> Result<&Recipe> {
        self.recipes
            .get(name)
            .ok_or_else(|| CollectionError::orchestration(format!("unknown recipe: {name}")))
    }

    /// Persist a new saga with status STARTED
    #[instrument(skip(self, payload))]
    pub async fn create_saga(
        &self,
        recipe_name: &str,
        payload: serde_json::Value,
        entity: Option<SagaEntityKey>,
        user: &str,
    ) -> Result<CollectionSaga> {
        let recipe = self.recipe(recipe_name)?;
        let saga = CollectionSaga::new(recipe.name(), payload, entity, user);
        let saga = self.saga_store.insert_saga(saga).await?;
        info!(
            saga_id = %saga.saga_id,
            saga_name = %saga.saga_name,
            "Saga created"
        );
        Ok(saga)
    }

    /// Run the entry step and publish its outcome on the recipe topic
    pub async fn start_saga(&self, saga: &CollectionSaga) -> Result<()> {
        let recipe = self.recipe(&saga.saga_name)?;
        let (entry_event, entry_handler) = recipe.entry();
        let entry_event = entry_event.to_string();
        self.execute_step(recipe, saga.clone(), &entry_event, entry_handler)
            .await
    }

    /// Advance the saga named by the inbound event by one step.
    ///
    /// Idempotent under at-least-once delivery: an event whose type does not
    /// match the saga's persisted last completed step is a duplicate or a
    /// stale redelivery and is skipped.
    #[instrument(skip(self, event), fields(saga_id = %event.saga_id, event_type = %event.event_type))]
    pub async fn handle_event(&self, event: SagaEvent) -> Result<()> {
        let saga = self
            .saga_store
            .find_saga(event.saga_id)
            .await?
            .ok_or_else(|| {
                CollectionError::event(format!("event for unknown saga {}", event.saga_id))
            })?;

        if saga.status == SagaStatus::Completed {
            debug!("Event for completed saga skipped");
            return Ok(());
        }
        if saga.saga_state != event.event_type {
            debug!(
                saga_state = %saga.saga_state,
                "Duplicate or stale event skipped"
            );
            return Ok(());
        }

        let recipe = self.recipe(&saga.saga_name)?;
        match recipe.resolve(&event.event_type, event.event_outcome) {
            Some(Resolution::Terminal) => self.complete_saga(saga, event.event_outcome).await,
            Some(Resolution::Next(transition)) => {
                let next_event = transition.next_event.clone();
                let handler = transition.handler.clone();
                self.execute_step(recipe, saga, &next_event, handler).await
            }
            None => Err(CollectionError::event(format!(
                "recipe {} has no transition for ({}, {})",
                saga.saga_name, event.event_type, event.event_outcome
            ))),
        }
    }

    /// Re-derive and republish the event a stalled saga is waiting on.
    ///
    /// The persisted `saga_state` names the last completed step; its log row
    /// carries the outcome. The payload is recomputed from the current saga
    /// row rather than replayed byte-for-byte, so step handlers re-check
    /// record state before repeating side effects.
    #[instrument(skip(self, saga), fields(saga_id = %saga.saga_id))]
    pub async fn replay_saga(&self, saga: &CollectionSaga) -> Result<()> {
        // Work from freshly read state; the caller's copy may be stale
        let saga = self
            .saga_store
            .find_saga(saga.saga_id)
            .await?
            .ok_or_else(|| {
                CollectionError::orchestration(format!("replay of unknown saga {}", saga.saga_id))
            })?;

        if saga.status == SagaStatus::Completed {
            debug!("Replay of completed saga skipped");
            return Ok(());
        }

        let recipe = self.recipe(&saga.saga_name)?;
        let log = self.saga_store.events_for_saga(saga.saga_id).await?;
        match log.last() {
            None => {
                // Entry step never committed: start over from the beginning
                info!(saga_name = %saga.saga_name, "Replaying saga from entry step");
                self.start_saga(&saga).await
            }
            Some(last) => {
                info!(
                    saga_name = %saga.saga_name,
                    last_step = %last.event_type,
                    "Republishing last committed step event"
                );
                let event = SagaEvent::new(
                    saga.saga_id,
                    last.event_type.clone(),
                    last.event_outcome,
                    saga.payload.clone(),
                );
                self.bus.publish(recipe.topic(), event).await
            }
        }
    }

    /// Execute one step: business action, event log row, saga row, publish.
    /// A handler error propagates before anything is persisted, leaving the
    /// saga at its last good state for the sweeper.
    async fn execute_step(
        &self,
        recipe: &Recipe,
        mut saga: CollectionSaga,
        event_type: &str,
        handler: Arc<dyn StepHandler>,
    ) -> Result<()> {
        let outcome = handler.handle(&saga).await?;

        let step_number = self.saga_store.events_for_saga(saga.saga_id).await?.len() as i32 + 1;
        self.saga_store
            .append_event(SagaEventState::new(
                saga.saga_id,
                event_type,
                outcome,
                saga.payload.clone(),
                step_number,
            ))
            .await?;

        saga.saga_state = event_type.to_string();
        saga.status = SagaStatus::InProgress;
        saga.touch();
        self.saga_store.save_saga(&saga).await?;

        debug!(
            saga_id = %saga.saga_id,
            step = %event_type,
            outcome = %outcome,
            "Step committed, publishing outcome"
        );
        let event = SagaEvent::new(saga.saga_id, event_type, outcome, saga.payload.clone());
        self.bus.publish(recipe.topic(), event).await
    }

    async fn complete_saga(&self, mut saga: CollectionSaga, outcome: EventOutcome) -> Result<()> {
        saga.status = SagaStatus::Completed;
        saga.touch();
        self.saga_store.save_saga(&saga).await?;

        // Bookkeeping row after the status flip: a crash in between leaves a
        // COMPLETED saga with a short log, which replay already ignores
        let step_number = self.saga_store.events_for_saga(saga.saga_id).await?.len() as i32 + 1;
        self.saga_store
            .append_event(SagaEventState::new(
                saga.saga_id,
                events::SAGA_COMPLETED,
                outcome,
                saga.payload.clone(),
                step_number,
            ))
            .await?;

        info!(saga_id = %saga.saga_id, saga_name = %saga.saga_name, "Saga completed");
        Ok(())
    }
}
