//! Suggester that walks a fixed list of argument candidates.

use async_trait::async_trait;
use relay_application::{ArgumentSuggester, SuggestionError};
use relay_domain::RetryContext;
use serde_json::Value;
use std::collections::HashMap;

/// After attempt `n`, proposes candidate `n` (0-based) overlaid on the
/// current arguments. Once the list runs out the last candidate repeats,
/// which the loop reports as no progress.
#[derive(Debug, Clone, Default)]
pub struct CandidateSuggester {
    candidates: Vec<HashMap<String, Value>>,
}

impl CandidateSuggester {
    pub fn new(candidates: Vec<HashMap<String, Value>>) -> Self {
        Self { candidates }
    }

    /// Build from JSON objects; non-object values are ignored.
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        Self::new(
            values
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(map) => Some(map.into_iter().collect()),
                    _ => None,
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[async_trait]
impl ArgumentSuggester for CandidateSuggester {
    async fn suggest(
        &self,
        context: &RetryContext,
    ) -> Result<HashMap<String, Value>, SuggestionError> {
        let Some(last) = self.candidates.len().checked_sub(1) else {
            return Err(SuggestionError("no candidates configured".to_string()));
        };
        let index = (context.attempts().saturating_sub(1) as usize).min(last);

        let mut arguments = context.current_arguments().clone();
        arguments.extend(self.candidates[index].clone());
        Ok(arguments)
    }
}
