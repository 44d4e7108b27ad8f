//! # Structured Error Handling
//!
//! Crate-wide error taxonomy using thiserror for structured error types
//! instead of `Box<dyn Error>` patterns.
//!
//! Validation issues are deliberately absent here: a failed business rule is a
//! first-class saga outcome, never an error. Only infrastructure and contract
//! failures surface through [`CollectionError`].

use thiserror::Error;

/// Errors raised by the orchestration core and its collaborator seams
#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("Store error: {operation}: {message}")]
    Store { operation: String, message: String },

    #[error("State transition error: {message}")]
    StateTransition { message: String },

    #[error("Orchestration error: {message}")]
    Orchestration { message: String },

    #[error("Event error: {message}")]
    Event { message: String },

    #[error("Downstream system error: {message}")]
    Downstream { message: String },

    #[error("Reference data error: {message}")]
    ReferenceData { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<crate::state_machine::StateMachineError> for CollectionError {
    fn from(err: crate::state_machine::StateMachineError) -> Self {
        Self::StateTransition {
            message: err.to_string(),
        }
    }
}

impl CollectionError {
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn orchestration(message: impl Into<String>) -> Self {
        Self::Orchestration {
            message: message.into(),
        }
    }

    pub fn event(message: impl Into<String>) -> Self {
        Self::Event {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CollectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_formats() {
        let err = CollectionError::store("insert_saga", "connection refused");
        assert_eq!(
            err.to_string(),
            "Store error: insert_saga: connection refused"
        );

        let err = CollectionError::orchestration("no transition for event");
        assert_eq!(
            err.to_string(),
            "Orchestration error: no transition for event"
        );
    }
}
