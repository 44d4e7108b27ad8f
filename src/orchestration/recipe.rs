//! # Recipe Definition
//!
//! A recipe is the fixed step graph for one saga type, declared through a
//! builder (`begin`/`step`/`or`/`end`) and materialized as an explicit
//! transition table keyed by (current event, outcome). Keeping the graph as
//! data means it can be validated for dead ends when the recipe is built,
//! long before any saga runs it.

use crate::error::{CollectionError, Result};
use crate::models::CollectionSaga;
use crate::orchestration::types::EventOutcome;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One step's business action.
///
/// The orchestrator owns the bookkeeping around a step (event log row, saga
/// state update, outcome publication); the handler performs only the domain
/// action against freshly read persisted state and reports how it went.
/// Handlers must be idempotent or check current record state before acting:
/// delivery is at-least-once and replay re-runs the step.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn handle(&self, saga: &CollectionSaga) -> Result<EventOutcome>;
}

pub(crate) struct Transition {
    pub next_event: String,
    pub handler: Arc<dyn StepHandler>,
}

/// How an inbound (event, outcome) pair resolves against a recipe
pub(crate) enum Resolution<'a> {
    /// Terminal edge: mark the saga COMPLETED, publish nothing further
    Terminal,
    Next(&'a Transition),
}

pub struct Recipe {
    name: &'static str,
    topic: &'static str,
    entry_event: String,
    entry_handler: Arc<dyn StepHandler>,
    transitions: HashMap<(String, EventOutcome), Transition>,
    terminal: HashSet<(String, EventOutcome)>,
}

impl Recipe {
    pub fn builder(name: &'static str, topic: &'static str) -> RecipeBuilder {
        RecipeBuilder {
            name,
            topic,
            entry: None,
            transitions: HashMap::new(),
            terminal: HashSet::new(),
            duplicate: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn topic(&self) -> &'static str {
        self.topic
    }

    pub(crate) fn entry(&self) -> (&str, Arc<dyn StepHandler>) {
        (&self.entry_event, self.entry_handler.clone())
    }

    pub(crate) fn resolve(&self, event_type: &str, outcome: EventOutcome) -> Option<Resolution<'_>> {
        let key = (event_type.to_string(), outcome);
        if self.terminal.contains(&key) {
            return Some(Resolution::Terminal);
        }
        self.transitions.get(&key).map(Resolution::Next)
    }
}

pub struct RecipeBuilder {
    name: &'static str,
    topic: &'static str,
    entry: Option<(String, Arc<dyn StepHandler>)>,
    transitions: HashMap<(String, EventOutcome), Transition>,
    terminal: HashSet<(String, EventOutcome)>,
    duplicate: Option<(String, EventOutcome)>,
}

impl RecipeBuilder {
    /// Declare the entry step executed by `startSaga`
    pub fn begin(mut self, event_type: impl Into<String>, handler: Arc<dyn StepHandler>) -> Self {
        self.entry = Some((event_type.into(), handler));
        self
    }

    /// Declare a transition edge: on (from, outcome), run `handler` as step
    /// `to_event` and publish its outcome
    pub fn step(
        mut self,
        from_event: impl Into<String>,
        outcome: EventOutcome,
        to_event: impl Into<String>,
        handler: Arc<dyn StepHandler>,
    ) -> Self {
        let key = (from_event.into(), outcome);
        if self.transitions.contains_key(&key) || self.terminal.contains(&key) {
            self.duplicate = Some(key.clone());
        }
        self.transitions.insert(
            key,
            Transition {
                next_event: to_event.into(),
                handler,
            },
        );
        self
    }

    /// Readability marker for an alternative branch from the same source
    /// event (e.g. validation-clean vs validation-with-issues). The table is
    /// keyed on (event, outcome), so this adds nothing structurally.
    pub fn or(self) -> Self {
        self
    }

    /// Declare a terminal edge: on (from, outcome) the saga is COMPLETED
    pub fn end(mut self, from_event: impl Into<String>, outcome: EventOutcome) -> Self {
        let key = (from_event.into(), outcome);
        if self.transitions.contains_key(&key) || self.terminal.contains(&key) {
            self.duplicate = Some(key.clone());
        }
        self.terminal.insert(key);
        self
    }

    /// Validate the graph and produce the recipe.
    ///
    /// Rejects: a missing entry step, duplicate (event, outcome) keys, and
    /// dead ends (a step some edge leads to that no edge leaves).
    pub fn build(self) -> Result<Recipe> {
        let name = self.name;
        let (entry_event, entry_handler) = self.entry.ok_or_else(|| {
            CollectionError::orchestration(format!("recipe {name} has no begin step"))
        })?;

        if let Some((event, outcome)) = self.duplicate {
            return Err(CollectionError::orchestration(format!(
                "recipe {name} declares ({event}, {outcome}) twice"
            )));
        }

        // Every step the graph can reach must have at least one outgoing
        // edge, otherwise a saga would park there forever
        let sources: HashSet<&str> = self
            .transitions
            .keys()
            .chain(self.terminal.iter())
            .map(|(event, _)| event.as_str())
            .collect();

        if !sources.contains(entry_event.as_str()) {
            return Err(CollectionError::orchestration(format!(
                "recipe {name}: entry step {entry_event} has no outgoing edge"
            )));
        }
        for transition in self.transitions.values() {
            if !sources.contains(transition.next_event.as_str()) {
                return Err(CollectionError::orchestration(format!(
                    "recipe {name}: step {} is a dead end",
                    transition.next_event
                )));
            }
        }

        Ok(Recipe {
            name: self.name,
            topic: self.topic,
            entry_event,
            entry_handler,
            transitions: self.transitions,
            terminal: self.terminal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandler;

    #[async_trait]
    impl StepHandler for NoopHandler {
        async fn handle(&self, _saga: &CollectionSaga) -> Result<EventOutcome> {
            Ok(EventOutcome::Success)
        }
    }

    fn noop() -> Arc<dyn StepHandler> {
        Arc::new(NoopHandler)
    }

    #[test]
    fn test_branching_recipe_builds() {
        let recipe = Recipe::builder("TEST_SAGA", "TEST_TOPIC")
            .begin("VALIDATE", noop())
            .step("VALIDATE", EventOutcome::Success, "WRITE", noop())
            .or()
            .step("VALIDATE", EventOutcome::ValidationIssues, "FLAG", noop())
            .end("WRITE", EventOutcome::Success)
            .end("FLAG", EventOutcome::Success)
            .build()
            .unwrap();

        assert!(matches!(
            recipe.resolve("VALIDATE", EventOutcome::Success),
            Some(Resolution::Next(t)) if t.next_event == "WRITE"
        ));
        assert!(matches!(
            recipe.resolve("VALIDATE", EventOutcome::ValidationIssues),
            Some(Resolution::Next(t)) if t.next_event == "FLAG"
        ));
        assert!(matches!(
            recipe.resolve("WRITE", EventOutcome::Success),
            Some(Resolution::Terminal)
        ));
        assert!(recipe.resolve("WRITE", EventOutcome::ValidationIssues).is_none());
    }

    #[test]
    fn test_dead_end_is_rejected() {
        let result = Recipe::builder("TEST_SAGA", "TEST_TOPIC")
            .begin("VALIDATE", noop())
            .step("VALIDATE", EventOutcome::Success, "WRITE", noop())
            .build();
        let err = result.err().unwrap().to_string();
        assert!(err.contains("dead end"), "unexpected error: {err}");
    }

    #[test]
    fn test_missing_entry_is_rejected() {
        let result = Recipe::builder("TEST_SAGA", "TEST_TOPIC")
            .end("VALIDATE", EventOutcome::Success)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_edge_is_rejected() {
        let result = Recipe::builder("TEST_SAGA", "TEST_TOPIC")
            .begin("VALIDATE", noop())
            .step("VALIDATE", EventOutcome::Success, "WRITE", noop())
            .step("VALIDATE", EventOutcome::Success, "FLAG", noop())
            .end("WRITE", EventOutcome::Success)
            .end("FLAG", EventOutcome::Success)
            .build();
        assert!(result.is_err());
    }
}
