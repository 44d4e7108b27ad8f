// State machine module for the fileset and record lifecycles
//
// Explicit transition tables rather than chained method calls, so the
// lifecycle graphs can be inspected and tested as data.

pub mod states;
pub mod transitions;

pub use states::{FileStatus, FilesetStatus, RecordKind, SagaStatus, StudentStatus};
pub use transitions::{
    fileset_transition_allowed, student_transition_allowed, FilesetStateMachine, StateMachineError,
    StudentStateMachine,
};
