//! Evaluator that judges outcomes with fixed rules.

use async_trait::async_trait;
use relay_application::TaskEvaluator;
use relay_domain::{FailureKind, ToolCallOutcome, Verdict};
use std::collections::HashSet;

/// Judges an outcome without a model.
///
/// - Completed call → `Success`, unless a required payload field is missing
///   (then `Retry`)
/// - Failure whose kind is retryable (and, for tool errors, whose code is
///   retryable when codes are configured) → `Retry`
/// - Anything else → `Fail`
#[derive(Debug, Clone)]
pub struct RuleBasedEvaluator {
    retry_kinds: HashSet<FailureKind>,
    retry_codes: HashSet<String>,
    required_fields: Vec<String>,
}

impl Default for RuleBasedEvaluator {
    fn default() -> Self {
        Self {
            retry_kinds: [FailureKind::ExecutionTimeout, FailureKind::ToolError]
                .into_iter()
                .collect(),
            retry_codes: HashSet::new(),
            required_fields: Vec::new(),
        }
    }
}

impl RuleBasedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry_kinds(mut self, kinds: impl IntoIterator<Item = FailureKind>) -> Self {
        self.retry_kinds = kinds.into_iter().collect();
        self
    }

    /// Restrict tool-error retries to these codes
    pub fn with_retry_codes<S: Into<String>>(mut self, codes: impl IntoIterator<Item = S>) -> Self {
        self.retry_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// A successful payload must be an object carrying this field
    pub fn require_field(mut self, field: impl Into<String>) -> Self {
        self.required_fields.push(field.into());
        self
    }

    fn judge_outcome(&self, outcome: &ToolCallOutcome) -> Verdict {
        let failure = match &outcome.result {
            Ok(payload) => {
                return match self
                    .required_fields
                    .iter()
                    .find(|f| payload.get(f.as_str()).is_none())
                {
                    Some(missing) => Verdict::Retry(format!("payload lacks '{missing}'")),
                    None => Verdict::Success,
                };
            }
            Err(failure) => failure,
        };

        if !self.retry_kinds.contains(&failure.kind) {
            return Verdict::Fail(failure.to_string());
        }
        if failure.kind == FailureKind::ToolError
            && !self.retry_codes.is_empty()
            && !failure
                .tool_code()
                .is_some_and(|code| self.retry_codes.contains(code))
        {
            return Verdict::Fail(failure.to_string());
        }
        Verdict::Retry(failure.to_string())
    }
}

#[async_trait]
impl TaskEvaluator for RuleBasedEvaluator {
    async fn judge(&self, outcome: &ToolCallOutcome) -> Verdict {
        self.judge_outcome(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_domain::{CallFailure, ToolCallState, ToolError};
    use serde_json::{Value, json};
    use std::collections::HashMap;

    fn outcome(result: Result<Value, CallFailure>) -> ToolCallOutcome {
        let state = match &result {
            Ok(_) => ToolCallState::Completed,
            Err(f) => f.kind.terminal_state(),
        };
        ToolCallOutcome {
            call_id: "task-1-attempt-1-call-1".into(),
            tool_name: "dns_lookup".into(),
            arguments: HashMap::new(),
            state,
            result,
            duration_ms: 3,
        }
    }

    fn tool_error(code: &str) -> Result<Value, CallFailure> {
        Err(CallFailure::from_tool_error(ToolError::new(code, "lookup failed")))
    }

    #[tokio::test]
    async fn test_success_and_required_fields() {
        let evaluator = RuleBasedEvaluator::new();
        assert_eq!(evaluator.judge(&outcome(Ok(json!({})))).await, Verdict::Success);

        let strict = RuleBasedEvaluator::new().require_field("address");
        assert_eq!(
            strict.judge(&outcome(Ok(json!({"address": "10.0.0.1"})))).await,
            Verdict::Success
        );
        assert_eq!(
            strict.judge(&outcome(Ok(json!({"status": "pending"})))).await,
            Verdict::Retry("payload lacks 'address'".into())
        );
    }

    #[tokio::test]
    async fn test_default_retry_kinds() {
        let evaluator = RuleBasedEvaluator::new();
        let timeout = outcome(Err(CallFailure::execution_timeout(500)));
        assert!(matches!(evaluator.judge(&timeout).await, Verdict::Retry(_)));
        assert!(matches!(
            evaluator.judge(&outcome(tool_error("NXDOMAIN"))).await,
            Verdict::Retry(_)
        ));

        let panicked = outcome(Err(CallFailure::panicked("boom")));
        assert_eq!(
            evaluator.judge(&panicked).await,
            Verdict::Fail("panicked: boom".into())
        );
    }

    #[tokio::test]
    async fn test_retry_codes_restrict_tool_errors() {
        let evaluator = RuleBasedEvaluator::new().with_retry_codes(["TIMEOUT", "UNAVAILABLE"]);
        assert!(matches!(
            evaluator.judge(&outcome(tool_error("UNAVAILABLE"))).await,
            Verdict::Retry(_)
        ));
        assert!(matches!(
            evaluator.judge(&outcome(tool_error("PERMISSION_DENIED"))).await,
            Verdict::Fail(_)
        ));
        // Codes only narrow tool errors; timeouts still retry
        assert!(matches!(
            evaluator
                .judge(&outcome(Err(CallFailure::execution_timeout(10))))
                .await,
            Verdict::Retry(_)
        ));
    }

    #[tokio::test]
    async fn test_custom_retry_kinds() {
        let evaluator = RuleBasedEvaluator::new().with_retry_kinds([FailureKind::Panicked]);
        assert!(matches!(
            evaluator.judge(&outcome(Err(CallFailure::panicked("x")))).await,
            Verdict::Retry(_)
        ));
        assert!(matches!(
            evaluator.judge(&outcome(tool_error("X"))).await,
            Verdict::Fail(_)
        ));
    }
}
