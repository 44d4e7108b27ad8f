//! # External Collaborator Seams
//!
//! Traits for the systems the orchestration core drives but does not own:
//! the validation rule engine, the downstream system of record, and the
//! reference-data lookups consumed by validation.

pub mod downstream;
pub mod rules;
pub mod school_cache;

pub use downstream::{DownstreamClient, DownstreamOutcome};
pub use rules::{BaselineValidationRules, RecordView, ValidationContext, ValidationRules};
pub use school_cache::{School, SchoolCache, SchoolProvider};
