//! # Event Consumer
//!
//! The bus-consumption boundary for one recipe topic. Infrastructure and
//! contract failures are caught and logged here so one poison event cannot
//! kill the loop; the saga stays at its last good state and the sweeper
//! retries it.

use crate::messaging::bus::EventStream;
use crate::orchestration::SagaOrchestrator;
use std::sync::Arc;
use tracing::{debug, error};

pub struct EventConsumer {
    topic: &'static str,
    stream: EventStream,
    orchestrator: Arc<SagaOrchestrator>,
}

impl EventConsumer {
    pub fn new(
        topic: &'static str,
        stream: EventStream,
        orchestrator: Arc<SagaOrchestrator>,
    ) -> Self {
        Self {
            topic,
            stream,
            orchestrator,
        }
    }

    /// Consume events until the topic's publisher side is dropped
    pub async fn run(mut self) {
        while let Some(event) = self.stream.recv().await {
            self.dispatch(event).await;
        }
        debug!(topic = self.topic, "Event consumer shutting down");
    }

    /// Consume queued events until the topic is momentarily empty.
    ///
    /// Deterministic draining for embedded use and tests: each dispatched
    /// event may publish the saga's next event back onto the same queue, so
    /// this loops until a try_recv comes up dry.
    pub async fn run_until_idle(&mut self) {
        while let Ok(event) = self.stream.try_recv() {
            self.dispatch(event).await;
        }
    }

    async fn dispatch(&self, event: crate::messaging::SagaEvent) {
        let saga_id = event.saga_id;
        let event_type = event.event_type.clone();
        if let Err(e) = self.orchestrator.handle_event(event).await {
            error!(
                topic = self.topic,
                saga_id = %saga_id,
                event_type = %event_type,
                error = %e,
                "Saga event handling failed; saga remains at last good state"
            );
        }
    }
}
