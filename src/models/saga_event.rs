//! # Saga Event Log
//!
//! Append-only per-step log rows. Each row records one completed step and its
//! outcome, written in the same unit of work as the saga row update. The log
//! is what makes event application idempotent and replay deterministic: the
//! latest row is exactly the event a crashed consumer failed to publish.

use crate::orchestration::types::EventOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaEventState {
    pub saga_event_id: Uuid,
    pub saga_id: Uuid,
    pub event_type: String,
    pub event_outcome: EventOutcome,
    pub event_payload: serde_json::Value,
    /// 1-based position within the saga's log
    pub step_number: i32,
    pub create_date: DateTime<Utc>,
}

impl SagaEventState {
    pub fn new(
        saga_id: Uuid,
        event_type: impl Into<String>,
        event_outcome: EventOutcome,
        event_payload: serde_json::Value,
        step_number: i32,
    ) -> Self {
        Self {
            saga_event_id: Uuid::new_v4(),
            saga_id,
            event_type: event_type.into(),
            event_outcome,
            event_payload,
            step_number,
            create_date: Utc::now(),
        }
    }
}
