//! # Persistence
//!
//! Trait seams over the relational store. The store is the sole arbiter of the
//! scheduler's invariants: the global in-flight count and the per-(entity,
//! recipe) exclusivity guard are both answered here, read-then-act, with no
//! explicit locking, which makes the cap soft. Candidate queries carry a
//! not-exists guard against active sagas, so a record already bound to one
//! is never offered as work.
//!
//! Two implementations ship with the crate: [`memory::InMemoryStore`] for
//! tests and single-process embedding, and [`postgres::PgStore`] for the real
//! relational store.

pub mod memory;
pub mod postgres;

use crate::error::Result;
use crate::models::{
    AssessmentStudent, CollectionSaga, CourseStudent, DemographicStudent, IncomingFileset,
    SagaEntityKey, SagaEventState,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// A (PEN, fileset) pair eligible for the downstream course resync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PenCandidate {
    pub pen: String,
    pub fileset_id: Uuid,
}

/// Saga rows plus the append-only event log
#[async_trait]
pub trait SagaStore: Send + Sync {
    async fn insert_saga(&self, saga: CollectionSaga) -> Result<CollectionSaga>;
    async fn save_saga(&self, saga: &CollectionSaga) -> Result<()>;
    async fn find_saga(&self, saga_id: Uuid) -> Result<Option<CollectionSaga>>;

    async fn append_event(&self, event: SagaEventState) -> Result<()>;
    /// Log rows for one saga, ordered by step number
    async fn events_for_saga(&self, saga_id: Uuid) -> Result<Vec<SagaEventState>>;

    /// Count of STARTED/IN_PROGRESS sagas (the global concurrency gauge)
    async fn active_saga_count(&self) -> Result<u64>;
    /// Not-exists-style exclusivity guard for one candidate
    async fn active_saga_exists(&self, entity: &SagaEntityKey, saga_name: &str) -> Result<bool>;
    /// Active sagas ordered by creation time, for the sweeper
    async fn stalled_sagas(&self, limit: usize) -> Result<Vec<CollectionSaga>>;
    /// Delete COMPLETED sagas (and their event rows) updated before the cutoff
    async fn purge_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Filesets and the three record kinds, plus the scheduler's candidate queries
#[async_trait]
pub trait CollectionStore: Send + Sync {
    // Filesets
    async fn insert_fileset(&self, fileset: IncomingFileset) -> Result<IncomingFileset>;
    async fn save_fileset(&self, fileset: &IncomingFileset) -> Result<()>;
    async fn find_fileset(&self, fileset_id: Uuid) -> Result<Option<IncomingFileset>>;
    /// Filesets with all three files LOADED, not yet COMPLETED, zero
    /// beneath-records still LOADED/UPDATE_CRS, and no active saga bound;
    /// ordered by creation time
    async fn completable_filesets(&self, limit: usize) -> Result<Vec<IncomingFileset>>;
    /// Incomplete filesets not touched since the cutoff (missing files)
    async fn stale_filesets(&self, cutoff: DateTime<Utc>) -> Result<Vec<IncomingFileset>>;
    /// Filesets created before the cutoff regardless of status
    async fn aged_filesets(&self, cutoff: DateTime<Utc>) -> Result<Vec<IncomingFileset>>;
    /// Remove a fileset and every record beneath it
    async fn delete_fileset(&self, fileset_id: Uuid) -> Result<()>;

    /// Records beneath the fileset still LOADED or UPDATE_CRS
    async fn unsettled_record_count(&self, fileset_id: Uuid) -> Result<u64>;
    async fn has_loaded_demographics(&self, fileset_id: Uuid) -> Result<bool>;
    async fn has_loaded_courses(&self, fileset_id: Uuid) -> Result<bool>;

    // Demographic records
    async fn insert_demographic(&self, record: DemographicStudent) -> Result<DemographicStudent>;
    async fn save_demographic(&self, record: &DemographicStudent) -> Result<()>;
    async fn find_demographic(&self, id: Uuid) -> Result<Option<DemographicStudent>>;
    /// LOADED demographic records with no active saga bound, oldest first
    async fn loaded_demographics(&self, limit: usize) -> Result<Vec<DemographicStudent>>;

    // Assessment records
    async fn insert_assessment(&self, record: AssessmentStudent) -> Result<AssessmentStudent>;
    async fn save_assessment(&self, record: &AssessmentStudent) -> Result<()>;
    async fn find_assessment(&self, id: Uuid) -> Result<Option<AssessmentStudent>>;
    /// LOADED assessment records with no active saga bound, in filesets with
    /// no LOADED demographic rows
    async fn loaded_assessments(&self, limit: usize) -> Result<Vec<AssessmentStudent>>;

    // Course records
    async fn insert_course(&self, record: CourseStudent) -> Result<CourseStudent>;
    async fn save_course(&self, record: &CourseStudent) -> Result<()>;
    async fn find_course(&self, id: Uuid) -> Result<Option<CourseStudent>>;
    /// LOADED course records with no active saga bound, in filesets with no
    /// LOADED demographic rows
    async fn loaded_courses(&self, limit: usize) -> Result<Vec<CourseStudent>>;
    /// Distinct PENs holding UPDATE_CRS course rows, with no active saga
    /// bound to the PEN and no remaining LOADED course rows in the fileset
    async fn update_crs_pens(&self, limit: usize) -> Result<Vec<PenCandidate>>;
    /// All UPDATE_CRS course rows for one PEN
    async fn update_crs_courses_for_pen(&self, pen: &str) -> Result<Vec<CourseStudent>>;
}
