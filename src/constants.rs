//! # System Constants
//!
//! Core constants that define the operational boundaries of the collection
//! orchestration system: saga recipe names, step event types, bus topics, and
//! status groupings used by the scheduler's selection queries.

// Re-export state types for convenience
pub use crate::state_machine::{FileStatus, FilesetStatus, SagaStatus, StudentStatus};

/// Saga recipe names (one per workflow recipe)
pub mod sagas {
    pub const DEMOGRAPHIC_STUDENT_PROCESSING: &str = "DEMOGRAPHIC_STUDENT_PROCESSING_SAGA";
    pub const COURSE_STUDENT_PROCESSING: &str = "COURSE_STUDENT_PROCESSING_SAGA";
    pub const ASSESSMENT_STUDENT_PROCESSING: &str = "ASSESSMENT_STUDENT_PROCESSING_SAGA";
    pub const FILESET_COMPLETION: &str = "FILESET_COMPLETION_SAGA";
    pub const COURSE_DOWNSTREAM_UPDATE: &str = "COURSE_DOWNSTREAM_UPDATE_SAGA";
}

/// Bus topics, one per recipe (events for one saga stay on one topic)
pub mod topics {
    pub const DEMOGRAPHIC_STUDENT_PROCESSING: &str = "DEMOGRAPHIC_STUDENT_PROCESSING_TOPIC";
    pub const COURSE_STUDENT_PROCESSING: &str = "COURSE_STUDENT_PROCESSING_TOPIC";
    pub const ASSESSMENT_STUDENT_PROCESSING: &str = "ASSESSMENT_STUDENT_PROCESSING_TOPIC";
    pub const FILESET_COMPLETION: &str = "FILESET_COMPLETION_TOPIC";
    pub const COURSE_DOWNSTREAM_UPDATE: &str = "COURSE_DOWNSTREAM_UPDATE_TOPIC";
}

/// Step event types that key the recipe transition tables
pub mod events {
    // Demographic processing steps
    pub const VALIDATE_DEMOGRAPHIC_STUDENT: &str = "VALIDATE_DEMOGRAPHIC_STUDENT";
    pub const WRITE_DEMOGRAPHIC_DOWNSTREAM: &str = "WRITE_DEMOGRAPHIC_DOWNSTREAM";
    pub const FLAG_DEMOGRAPHIC_ERRORS: &str = "FLAG_DEMOGRAPHIC_ERRORS";

    // Course processing steps
    pub const VALIDATE_COURSE_STUDENT: &str = "VALIDATE_COURSE_STUDENT";
    pub const WRITE_COURSE_DOWNSTREAM: &str = "WRITE_COURSE_DOWNSTREAM";
    pub const FLAG_COURSE_ERRORS: &str = "FLAG_COURSE_ERRORS";

    // Assessment processing steps
    pub const VALIDATE_ASSESSMENT_STUDENT: &str = "VALIDATE_ASSESSMENT_STUDENT";
    pub const WRITE_ASSESSMENT_DOWNSTREAM: &str = "WRITE_ASSESSMENT_DOWNSTREAM";
    pub const FLAG_ASSESSMENT_ERRORS: &str = "FLAG_ASSESSMENT_ERRORS";

    // Fileset completion step
    pub const COMPLETE_FILESET: &str = "COMPLETE_FILESET";

    // Downstream course resync step
    pub const WRITE_COURSE_UPDATE_BATCH: &str = "WRITE_COURSE_UPDATE_BATCH";

    // Terminal bookkeeping row appended when a saga is marked COMPLETED
    pub const SAGA_COMPLETED: &str = "SAGA_COMPLETED";
}

/// System-wide constants
pub mod system {
    /// User recorded on saga rows created by scheduled tasks
    pub const SCHEDULER_USER: &str = "COLLECTION_SCHEDULER";
}

/// Status groupings for the scheduler's selection logic
pub mod status_groups {
    use super::{SagaStatus, StudentStatus};

    /// Saga statuses that count against the global concurrency cap
    pub const ACTIVE_SAGA_STATES: &[SagaStatus] = &[SagaStatus::Started, SagaStatus::InProgress];

    /// Record statuses that keep a fileset from completing
    pub const UNSETTLED_STUDENT_STATES: &[StudentStatus] =
        &[StudentStatus::Loaded, StudentStatus::UpdateCrs];

    /// Record statuses that have left the pipeline
    pub const SETTLED_STUDENT_STATES: &[StudentStatus] = &[
        StudentStatus::Error,
        StudentStatus::Warning,
        StudentStatus::Verified,
    ];
}
