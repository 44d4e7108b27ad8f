//! # Saga Event Wire Format
//!
//! The single message shape carried on every recipe topic. `event_type` names
//! the step that just completed and `event_outcome` its result; together they
//! key the recipe's transition table on the consuming side.

use crate::orchestration::types::EventOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaEvent {
    pub saga_id: Uuid,
    pub event_type: String,
    pub event_outcome: EventOutcome,
    /// Recomputed saga payload as of publish time, never a cached copy
    pub payload: serde_json::Value,
    /// Topic for synchronous-style responders; unused by the core recipes
    pub reply_to: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl SagaEvent {
    pub fn new(
        saga_id: Uuid,
        event_type: impl Into<String>,
        event_outcome: EventOutcome,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            saga_id,
            event_type: event_type.into(),
            event_outcome,
            payload,
            reply_to: None,
            published_at: Utc::now(),
        }
    }
}
