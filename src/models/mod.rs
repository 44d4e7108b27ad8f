//! # Data Model
//!
//! Entity types for the collection pipeline: filesets, the three source
//! record kinds, sagas, and the append-only saga event log. Persistence is
//! behind the [`crate::persistence`] trait seams; these structs carry no
//! query logic of their own.

pub mod fileset;
pub mod saga;
pub mod saga_event;
pub mod student;

pub use fileset::IncomingFileset;
pub use saga::{CollectionSaga, SagaEntityKey};
pub use saga_event::SagaEventState;
pub use student::{
    AssessmentStudent, CourseStudent, DemographicStudent, IssueSeverity, ValidationIssue,
};
