//! Evaluator and suggester ports for the adaptive task loop.
//!
//! Both are pure from the engine's point of view: they see an outcome or a
//! retry context and return a value. Whether they reason with a language
//! model or with rules is up to the adapter.

use async_trait::async_trait;
use relay_domain::{RetryContext, ToolCallOutcome, Verdict};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Judges the outcome of one attempt
#[async_trait]
pub trait TaskEvaluator: Send + Sync {
    async fn judge(&self, outcome: &ToolCallOutcome) -> Verdict;
}

/// Suggester could not produce arguments
#[derive(Debug, Clone, Error)]
#[error("Suggester failed: {0}")]
pub struct SuggestionError(pub String);

/// Proposes revised arguments after a `Retry` verdict
#[async_trait]
pub trait ArgumentSuggester: Send + Sync {
    /// Propose arguments for the next attempt given every attempt so far.
    ///
    /// Returning the current arguments unchanged counts as a repetition.
    async fn suggest(
        &self,
        context: &RetryContext,
    ) -> Result<HashMap<String, Value>, SuggestionError>;
}
