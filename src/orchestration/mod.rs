//! # Saga Orchestration
//!
//! The heart of the collection core: persisted, resumable, step-at-a-time
//! workflows driven over the event bus.
//!
//! ## Architecture
//!
//! - **recipe** — the declarative step graph per workflow, materialized as an
//!   explicit transition table and validated for dead ends at build time.
//! - **orchestrator** — executes steps against the recipes: business action,
//!   event log row, saga row, then publish, strictly in that order.
//! - **recipes** — the five concrete workflows of the collection pipeline.
//! - **scheduler** — the work-selection tick that starts sagas by strict
//!   category priority under a global concurrency cap.
//! - **sweeper** — replay of sagas that stopped making progress.
//! - **purge** — retention cleanup of old filesets and finished sagas.
//! - **system** — wiring of all of the above into one runnable unit.
//!
//! ## Recovery model
//!
//! A saga's event log records each *completed* step and its outcome, and the
//! saga row mirrors the latest entry. Nothing about the next step is
//! persisted anywhere: replay recomputes the lost event from the log, and
//! handlers re-read record state so a re-run step is a no-op. Together these
//! make at-least-once delivery and crash-between-save-and-publish safe.

pub mod orchestrator;
pub mod purge;
pub mod recipe;
pub mod recipes;
pub mod scheduler;
pub mod sweeper;
pub mod system;
pub mod types;

pub use orchestrator::SagaOrchestrator;
pub use purge::{PurgeSummary, RetentionPurger};
pub use recipe::{Recipe, RecipeBuilder, StepHandler};
pub use scheduler::WorkScheduler;
pub use sweeper::{SagaSweeper, SweepSummary};
pub use system::CollectionSystem;
pub use types::{
    CourseUpdateSagaData, EventOutcome, FilesetSagaData, StudentSagaData, TickOutcome,
    WorkCategory,
};
