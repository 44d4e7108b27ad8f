#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Grad Collection Core
//!
//! Saga-based orchestration core for a graduation data collection pipeline:
//! schools submit filesets of three files (demographic, course, assessment),
//! and every record is validated, written to a downstream system of record,
//! and settled through small persisted workflows.
//!
//! ## Overview
//!
//! Everything the system does happens as a **saga**: a persisted, resumable
//! workflow advanced one step at a time by events on a bus. A periodic
//! scheduler selects what to work on next under a strict category priority
//! and a global concurrency cap, and a sweeper replays any saga that stops
//! making progress. No step is ever lost: each completed step is committed to
//! an append-only event log before its outcome is published.
//!
//! ## Module Organization
//!
//! - [`models`] - Filesets, the three record kinds, sagas, and the event log
//! - [`state_machine`] - Fileset and record lifecycle transition tables
//! - [`orchestration`] - Recipes, orchestrator, scheduler, sweeper, purge
//! - [`messaging`] - Event bus seam and per-topic consumers
//! - [`persistence`] - Saga and collection store traits (in-memory + Postgres)
//! - [`services`] - Validation rules, downstream client, school cache seams
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use grad_collection_core::config::CollectionConfig;
//! use grad_collection_core::messaging::InMemoryEventBus;
//! use grad_collection_core::orchestration::CollectionSystem;
//! use grad_collection_core::persistence::InMemoryStore;
//! use grad_collection_core::services::{BaselineValidationRules, SchoolCache};
//! use std::sync::Arc;
//!
//! # struct NoopDownstream;
//! # #[async_trait::async_trait]
//! # impl grad_collection_core::services::DownstreamClient for NoopDownstream {
//! #     async fn write_demographic(&self, _: &grad_collection_core::models::DemographicStudent) -> grad_collection_core::error::Result<grad_collection_core::services::DownstreamOutcome> { Ok(grad_collection_core::services::DownstreamOutcome::Written) }
//! #     async fn write_course(&self, _: &grad_collection_core::models::CourseStudent) -> grad_collection_core::error::Result<grad_collection_core::services::DownstreamOutcome> { Ok(grad_collection_core::services::DownstreamOutcome::Written) }
//! #     async fn write_assessment(&self, _: &grad_collection_core::models::AssessmentStudent) -> grad_collection_core::error::Result<grad_collection_core::services::DownstreamOutcome> { Ok(grad_collection_core::services::DownstreamOutcome::Written) }
//! #     async fn write_course_batch(&self, _: &str, _: &[grad_collection_core::models::CourseStudent]) -> grad_collection_core::error::Result<grad_collection_core::services::DownstreamOutcome> { Ok(grad_collection_core::services::DownstreamOutcome::Written) }
//! # }
//! # struct NoSchools;
//! # #[async_trait::async_trait]
//! # impl grad_collection_core::services::SchoolProvider for NoSchools {
//! #     async fn load_school(&self, _: &str) -> grad_collection_core::error::Result<Option<grad_collection_core::services::School>> { Ok(None) }
//! #     async fn load_all(&self) -> grad_collection_core::error::Result<Vec<grad_collection_core::services::School>> { Ok(vec![]) }
//! # }
//! # async fn example() -> grad_collection_core::error::Result<()> {
//! let store = Arc::new(InMemoryStore::new());
//! let system = CollectionSystem::new(
//!     store.clone(),
//!     store,
//!     Arc::new(InMemoryEventBus::new()),
//!     Arc::new(BaselineValidationRules::new()),
//!     Arc::new(SchoolCache::new(Arc::new(NoSchools))),
//!     Arc::new(NoopDownstream),
//!     &CollectionConfig::default(),
//! )?;
//! let handles = system.spawn();
//! # drop(handles);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod persistence;
pub mod services;
pub mod state_machine;

pub use config::CollectionConfig;
pub use constants::{events as system_events, sagas, status_groups, system, topics};
pub use error::{CollectionError, Result};
pub use models::{
    AssessmentStudent, CollectionSaga, CourseStudent, DemographicStudent, IncomingFileset,
    IssueSeverity, SagaEntityKey, SagaEventState, ValidationIssue,
};
pub use orchestration::{
    CollectionSystem, EventOutcome, SagaOrchestrator, SagaSweeper, TickOutcome, WorkCategory,
    WorkScheduler,
};
pub use state_machine::{FileStatus, FilesetStatus, RecordKind, SagaStatus, StudentStatus};
