//! # Saga Model
//!
//! One row per execution of a named workflow recipe. `saga_state` names the
//! last completed step; on crash recovery the sweeper re-derives the next bus
//! event from that name alone, so it must only ever be advanced together with
//! the step's persisted outcome (see the saga event log).
//!
//! Invariant: for a given (entity key, recipe) pair at most one non-COMPLETED
//! saga exists. The work-selection scheduler enforces this with a
//! not-exists-style guard before starting new work.

use crate::state_machine::SagaStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The logical entity a saga is bound to, if any.
///
/// Exclusivity is keyed on this plus the recipe name. PEN-keyed sagas cover
/// the batch downstream resync, where the unit of work is a student, not a
/// single row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaEntityKey {
    Fileset(Uuid),
    DemographicStudent(Uuid),
    CourseStudent(Uuid),
    AssessmentStudent(Uuid),
    Pen(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSaga {
    pub saga_id: Uuid,
    /// Recipe name, e.g. `DEMOGRAPHIC_STUDENT_PROCESSING_SAGA`
    pub saga_name: String,
    /// Last completed step's event type; empty until the entry step commits
    pub saga_state: String,
    pub status: SagaStatus,
    /// Serialized context payload handed to every step handler
    pub payload: serde_json::Value,
    pub entity: Option<SagaEntityKey>,
    pub retry_count: i32,
    pub create_user: String,
    pub create_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
}

impl CollectionSaga {
    pub fn new(
        saga_name: impl Into<String>,
        payload: serde_json::Value,
        entity: Option<SagaEntityKey>,
        user: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            saga_id: Uuid::new_v4(),
            saga_name: saga_name.into(),
            saga_state: String::new(),
            status: SagaStatus::Started,
            payload,
            entity,
            retry_count: 0,
            create_user: user.into(),
            create_date: now,
            update_date: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn touch(&mut self) {
        self.update_date = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_saga_starts_started() {
        let saga = CollectionSaga::new(
            "DEMOGRAPHIC_STUDENT_PROCESSING_SAGA",
            json!({"pen": "123456789"}),
            Some(SagaEntityKey::DemographicStudent(Uuid::new_v4())),
            "COLLECTION_SCHEDULER",
        );
        assert_eq!(saga.status, SagaStatus::Started);
        assert!(saga.saga_state.is_empty());
        assert_eq!(saga.retry_count, 0);
        assert!(saga.is_active());
    }

    #[test]
    fn test_entity_key_equality() {
        let id = Uuid::new_v4();
        assert_eq!(
            SagaEntityKey::CourseStudent(id),
            SagaEntityKey::CourseStudent(id)
        );
        assert_ne!(
            SagaEntityKey::CourseStudent(id),
            SagaEntityKey::AssessmentStudent(id)
        );
        assert_eq!(
            SagaEntityKey::Pen("123456789".into()),
            SagaEntityKey::Pen("123456789".into())
        );
    }
}
