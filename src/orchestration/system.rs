//! # System Wiring
//!
//! Assembles the whole collection core from its seams: registers the five
//! recipes on one orchestrator, subscribes a consumer per recipe topic, and
//! builds the scheduler, sweeper and purger around the shared stores.
//!
//! Two modes of operation:
//! - `spawn()` starts everything as background tokio tasks (production).
//! - `tick()` + `process_pending()` drive the system step by step, which is
//!   what deterministic tests and embedded callers use.

use crate::config::CollectionConfig;
use crate::error::Result;
use crate::messaging::{EventBus, EventConsumer};
use crate::orchestration::purge::RetentionPurger;
use crate::orchestration::recipes;
use crate::orchestration::scheduler::WorkScheduler;
use crate::orchestration::sweeper::SagaSweeper;
use crate::orchestration::types::TickOutcome;
use crate::orchestration::SagaOrchestrator;
use crate::persistence::{CollectionStore, SagaStore};
use crate::services::{DownstreamClient, SchoolCache, ValidationRules};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

pub struct CollectionSystem {
    orchestrator: Arc<SagaOrchestrator>,
    scheduler: WorkScheduler,
    sweeper: SagaSweeper,
    purger: RetentionPurger,
    consumers: Vec<EventConsumer>,
}

impl CollectionSystem {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        saga_store: Arc<dyn SagaStore>,
        store: Arc<dyn CollectionStore>,
        bus: Arc<dyn EventBus>,
        rules: Arc<dyn ValidationRules>,
        schools: Arc<SchoolCache>,
        downstream: Arc<dyn DownstreamClient>,
        config: &CollectionConfig,
    ) -> Result<Self> {
        let mut orchestrator = SagaOrchestrator::new(saga_store.clone(), bus.clone());
        orchestrator.register(recipes::demographic::recipe(
            store.clone(),
            rules.clone(),
            schools.clone(),
            downstream.clone(),
        )?);
        orchestrator.register(recipes::course::recipe(
            store.clone(),
            rules.clone(),
            schools.clone(),
            downstream.clone(),
        )?);
        orchestrator.register(recipes::assessment::recipe(
            store.clone(),
            rules,
            schools,
            downstream.clone(),
        )?);
        orchestrator.register(recipes::fileset::recipe(store.clone())?);
        orchestrator.register(recipes::course_update::recipe(store.clone(), downstream)?);
        let orchestrator = Arc::new(orchestrator);

        let consumers = orchestrator
            .topics()
            .into_iter()
            .map(|topic| {
                let stream = bus.subscribe(topic)?;
                Ok(EventConsumer::new(topic, stream, orchestrator.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let scheduler = WorkScheduler::new(
            orchestrator.clone(),
            saga_store.clone(),
            store.clone(),
            config,
        );
        let sweeper = SagaSweeper::new(orchestrator.clone(), saga_store.clone(), config);
        let purger = RetentionPurger::new(store, saga_store, config);

        Ok(Self {
            orchestrator,
            scheduler,
            sweeper,
            purger,
            consumers,
        })
    }

    pub fn orchestrator(&self) -> Arc<SagaOrchestrator> {
        self.orchestrator.clone()
    }

    /// One scheduler pass (embedded/step-by-step mode)
    pub async fn tick(&self) -> Result<TickOutcome> {
        self.scheduler.tick().await
    }

    /// One sweeper pass (embedded/step-by-step mode)
    pub async fn sweep(&self) -> Result<crate::orchestration::sweeper::SweepSummary> {
        self.sweeper.sweep().await
    }

    /// One purge pass (embedded/step-by-step mode)
    pub async fn purge(&self) -> Result<crate::orchestration::purge::PurgeSummary> {
        self.purger.purge().await
    }

    /// Drain every topic queue until all are momentarily empty.
    ///
    /// A dispatched step publishes the saga's next event onto the same topic,
    /// and each consumer drains its own queue to empty, so one pass over the
    /// consumers settles every in-flight saga.
    pub async fn process_pending(&mut self) {
        for consumer in &mut self.consumers {
            consumer.run_until_idle().await;
        }
    }

    /// Start everything as background tasks and return their handles.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        for consumer in self.consumers {
            handles.push(tokio::spawn(consumer.run()));
        }
        handles.push(tokio::spawn(self.scheduler.run()));
        handles.push(tokio::spawn(self.sweeper.run()));
        handles.push(tokio::spawn(self.purger.run(PURGE_INTERVAL)));
        handles
    }
}
