//! # Downstream System Client Seam
//!
//! Write access to the downstream system of record. Delivery from the bus is
//! at-least-once, so every write must tolerate a retry: implementations are
//! expected to be idempotent or to check current downstream state before
//! writing.

use crate::error::Result;
use crate::models::{AssessmentStudent, CourseStudent, DemographicStudent};
use async_trait::async_trait;

/// Result of a downstream write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownstreamOutcome {
    /// Record created or refreshed downstream
    Written,
    /// Downstream already held this state; nothing changed
    Unchanged,
}

#[async_trait]
pub trait DownstreamClient: Send + Sync {
    async fn write_demographic(&self, record: &DemographicStudent) -> Result<DownstreamOutcome>;

    async fn write_assessment(&self, record: &AssessmentStudent) -> Result<DownstreamOutcome>;

    async fn write_course(&self, record: &CourseStudent) -> Result<DownstreamOutcome>;

    /// One call per PEN for the downstream resync; all of the student's
    /// pending course rows travel together
    async fn write_course_batch(
        &self,
        pen: &str,
        records: &[CourseStudent],
    ) -> Result<DownstreamOutcome>;
}
