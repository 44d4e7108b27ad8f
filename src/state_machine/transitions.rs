//! Explicit transition tables for the fileset and record lifecycles.
//!
//! The tables are the single source of truth: orchestrator step handlers go
//! through [`FilesetStateMachine`] and [`StudentStateMachine`] rather than
//! assigning status fields directly, so an invalid transition is a typed error
//! instead of silent data corruption.

use super::states::{FileStatus, FilesetStatus, RecordKind, StudentStatus};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateMachineError {
    #[error("Invalid transition: {entity} cannot move {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Completion guard failed: {reason}")]
    GuardFailed { reason: String },
}

/// Allowed aggregate fileset transitions.
///
/// COMPLETED -> LOADED covers a file reload arriving after the fileset
/// previously settled; DELETED is reachable from any live status via the
/// purge and is terminal.
pub fn fileset_transition_allowed(from: FilesetStatus, to: FilesetStatus) -> bool {
    matches!(
        (from, to),
        (FilesetStatus::Loaded, FilesetStatus::Completed)
            | (FilesetStatus::Completed, FilesetStatus::Loaded)
            | (FilesetStatus::Loaded, FilesetStatus::Deleted)
            | (FilesetStatus::Completed, FilesetStatus::Deleted)
    )
}

/// Allowed record transitions per kind.
///
/// Only course records re-enter the pipeline: VERIFIED -> UPDATE_CRS when a
/// later file reload invalidates the row, then UPDATE_CRS -> VERIFIED once the
/// downstream resync lands.
pub fn student_transition_allowed(kind: RecordKind, from: StudentStatus, to: StudentStatus) -> bool {
    match (from, to) {
        (StudentStatus::Loaded, StudentStatus::Error)
        | (StudentStatus::Loaded, StudentStatus::Warning)
        | (StudentStatus::Loaded, StudentStatus::Verified) => true,
        (StudentStatus::Verified, StudentStatus::UpdateCrs)
        | (StudentStatus::UpdateCrs, StudentStatus::Verified) => kind == RecordKind::Course,
        _ => false,
    }
}

/// Guarded transitions for the aggregate fileset status
pub struct FilesetStateMachine;

impl FilesetStateMachine {
    /// Check the completion guard without transitioning.
    ///
    /// A fileset may complete only once all three files are present and no
    /// beneath-record remains LOADED/UPDATE_CRS.
    pub fn can_complete(
        demographic_file: FileStatus,
        course_file: FileStatus,
        assessment_file: FileStatus,
        unsettled_record_count: u64,
    ) -> Result<(), StateMachineError> {
        if demographic_file != FileStatus::Loaded
            || course_file != FileStatus::Loaded
            || assessment_file != FileStatus::Loaded
        {
            return Err(StateMachineError::GuardFailed {
                reason: format!(
                    "files not all present (DEM={demographic_file}, CRS={course_file}, XAM={assessment_file})"
                ),
            });
        }
        if unsettled_record_count > 0 {
            return Err(StateMachineError::GuardFailed {
                reason: format!("{unsettled_record_count} records still LOADED/UPDATE_CRS"),
            });
        }
        Ok(())
    }

    pub fn transition(
        from: FilesetStatus,
        to: FilesetStatus,
    ) -> Result<FilesetStatus, StateMachineError> {
        if fileset_transition_allowed(from, to) {
            Ok(to)
        } else {
            Err(StateMachineError::InvalidTransition {
                entity: "fileset",
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }
}

/// Guarded transitions for record statuses
pub struct StudentStateMachine;

impl StudentStateMachine {
    pub fn transition(
        kind: RecordKind,
        from: StudentStatus,
        to: StudentStatus,
    ) -> Result<StudentStatus, StateMachineError> {
        if student_transition_allowed(kind, from, to) {
            Ok(to)
        } else {
            Err(StateMachineError::InvalidTransition {
                entity: "student record",
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }
}
