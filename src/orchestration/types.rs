//! # Orchestration Types
//!
//! Shared types for recipe definition and saga payloads.

use crate::models::SagaEntityKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Outcome of one executed step.
///
/// `ValidationIssues` is a first-class outcome, not an error: validation
/// failures route to the flag-and-complete branch of a recipe while the saga
/// itself finishes normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventOutcome {
    Success,
    ValidationIssues,
}

impl fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::ValidationIssues => write!(f, "VALIDATION_ISSUES"),
        }
    }
}

impl std::str::FromStr for EventOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(Self::Success),
            "VALIDATION_ISSUES" => Ok(Self::ValidationIssues),
            _ => Err(format!("Invalid event outcome: {s}")),
        }
    }
}

/// Category of work a scheduler tick acted on, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkCategory {
    FilesetCompletion,
    DemographicProcessing,
    AssessmentProcessing,
    CourseProcessing,
    CourseDownstreamUpdate,
}

/// Result of one scheduler tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// In-flight saga count met or exceeded the global cap
    AtCapacity,
    /// No eligible work in any category
    Idle,
    /// Work was started in exactly one category
    Started { category: WorkCategory, count: usize },
}

/// Payload for the per-record processing sagas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentSagaData {
    pub student_id: Uuid,
    pub fileset_id: Uuid,
    pub school_id: String,
    pub pen: String,
}

/// Payload for the fileset-completion saga
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesetSagaData {
    pub fileset_id: Uuid,
    pub school_id: String,
}

/// Payload for the per-PEN course downstream update saga
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseUpdateSagaData {
    pub pen: String,
    pub fileset_id: Uuid,
}

impl StudentSagaData {
    pub fn entity_key_demographic(&self) -> SagaEntityKey {
        SagaEntityKey::DemographicStudent(self.student_id)
    }

    pub fn entity_key_course(&self) -> SagaEntityKey {
        SagaEntityKey::CourseStudent(self.student_id)
    }

    pub fn entity_key_assessment(&self) -> SagaEntityKey {
        SagaEntityKey::AssessmentStudent(self.student_id)
    }
}
