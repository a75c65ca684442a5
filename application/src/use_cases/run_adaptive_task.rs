//! Run Adaptive Task use case (the Adaptive Orchestration Loop).
//!
//! Runs one tool toward a goal as a bounded search over its arguments:
//!
//! ```text
//! ┌─▶ attempt(arguments) ─▶ outcome ─▶ evaluator.judge ─▶ Success ─▶ Ok
//! │                            │                    ├──▶ Fail ────▶ Failed
//! │                  structural failure ─▶ Failed   └──▶ Retry
//! │                                                        │
//! │            bound reached ─▶ RetriesExhausted ◀─────────┤
//! │            escalation Abort ─▶ Failed ◀────────────────┤
//! │            second identical proposal ─▶ NoProgress ◀───┤
//! └──────────── suggester.suggest(context) ◀───────────────┘
//! ```
//!
//! The loop never edits arguments itself; it only applies what the
//! suggester proposes. Every attempt runs in its own [`TurnScope`](crate::execution::TurnScope)
//! so duplicate suppression never blocks a deliberate retry.

use crate::config::SessionConfig;
use crate::execution::ToolExecutionScheduler;
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::escalation::{EscalationDecision, EscalationPort};
use crate::ports::evaluator::{ArgumentSuggester, TaskEvaluator};
use crate::ports::execution_progress::ExecutionProgressNotifier;
use crate::use_cases::shared::{args_preview, is_cancelled, log_tool_result, scope_for};
use relay_domain::{
    AttemptRecord, FailureKind, ProposalEffect, RetryContext, ToolCall, ToolCallOutcome, Verdict,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Loop-level terminal conditions.
#[derive(Error, Debug)]
pub enum AdaptiveTaskError {
    #[error("Task failed: {reason}")]
    Failed {
        reason: String,
        history: Vec<AttemptRecord>,
    },

    #[error("Retries exhausted after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        history: Vec<AttemptRecord>,
    },

    #[error("No progress: suggester repeated the same arguments after {attempts} attempts")]
    NoProgress {
        attempts: u32,
        history: Vec<AttemptRecord>,
    },

    #[error("Invalid task configuration: {0}")]
    InvalidConfig(String),

    #[error("Task cancelled")]
    Cancelled,
}

impl AdaptiveTaskError {
    /// Attempt history carried for diagnostics
    pub fn history(&self) -> &[AttemptRecord] {
        match self {
            AdaptiveTaskError::Failed { history, .. }
            | AdaptiveTaskError::RetriesExhausted { history, .. }
            | AdaptiveTaskError::NoProgress { history, .. } => history,
            AdaptiveTaskError::InvalidConfig(_) | AdaptiveTaskError::Cancelled => &[],
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AdaptiveTaskError::Cancelled)
    }
}

/// Input for the [`RunAdaptiveTaskUseCase`].
#[derive(Debug, Clone)]
pub struct AdaptiveTaskInput {
    pub tool_name: String,
    pub arguments: HashMap<String, Value>,
    /// Maximum attempts (at least 1)
    pub bound: u32,
    /// Overrides the use case's escalation threshold
    pub escalate_after: Option<u32>,
}

impl AdaptiveTaskInput {
    pub fn new(tool_name: impl Into<String>, arguments: HashMap<String, Value>, bound: u32) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            bound,
            escalate_after: None,
        }
    }

    pub fn with_escalate_after(mut self, retries: u32) -> Self {
        self.escalate_after = Some(retries);
        self
    }
}

/// Successful task result
#[derive(Debug, Clone)]
pub struct TaskOutput {
    pub outcome: ToolCallOutcome,
    pub attempts: u32,
    pub history: Vec<AttemptRecord>,
}

/// Use case for running a goal-directed single-tool task.
pub struct RunAdaptiveTaskUseCase {
    scheduler: ToolExecutionScheduler,
    evaluator: Arc<dyn TaskEvaluator>,
    suggester: Arc<dyn ArgumentSuggester>,
    escalation: Option<Arc<dyn EscalationPort>>,
    escalate_after: Option<u32>,
    conversation_logger: Arc<dyn ConversationLogger>,
    tasks: AtomicU64,
}

impl RunAdaptiveTaskUseCase {
    pub fn new(
        scheduler: ToolExecutionScheduler,
        evaluator: Arc<dyn TaskEvaluator>,
        suggester: Arc<dyn ArgumentSuggester>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            scheduler,
            evaluator,
            suggester,
            escalation: None,
            escalate_after: config.adaptive.escalate_after,
            conversation_logger: Arc::new(NoConversationLogger),
            tasks: AtomicU64::new(0),
        }
    }

    /// Consult `port` once the retry streak reaches the threshold.
    pub fn with_escalation(mut self, port: Arc<dyn EscalationPort>) -> Self {
        self.escalation = Some(port);
        self
    }

    /// Create with a conversation logger.
    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.conversation_logger = logger;
        self
    }

    fn progress(&self) -> &dyn ExecutionProgressNotifier {
        self.scheduler.progress().as_ref()
    }

    pub async fn execute(
        &self,
        input: AdaptiveTaskInput,
        cancellation: Option<CancellationToken>,
    ) -> Result<TaskOutput, AdaptiveTaskError> {
        let escalate_after = input.escalate_after.or(self.escalate_after);
        if escalate_after == Some(0) {
            return Err(AdaptiveTaskError::InvalidConfig(
                "escalate_after must be at least 1".to_string(),
            ));
        }
        let mut context = RetryContext::new(&input.tool_name, input.arguments, input.bound)
            .map_err(|e| AdaptiveTaskError::InvalidConfig(e.to_string()))?;

        let task_id = format!("task-{}", self.tasks.fetch_add(1, Ordering::SeqCst) + 1);
        info!(task_id = %task_id, tool = %input.tool_name, bound = input.bound, "Starting adaptive task");

        loop {
            if is_cancelled(&cancellation) {
                return Err(AdaptiveTaskError::Cancelled);
            }
            let Some(attempt) = context.begin_attempt() else {
                return Err(AdaptiveTaskError::RetriesExhausted {
                    attempts: context.attempts(),
                    history: context.into_history(),
                });
            };

            let outcome = self.attempt(&task_id, &context, attempt, &cancellation).await;

            // Structural failures never reach the evaluator
            if let Some(failure) = outcome.failure()
                && failure.kind.is_structural()
            {
                if failure.kind == FailureKind::Cancelled && is_cancelled(&cancellation) {
                    return Err(AdaptiveTaskError::Cancelled);
                }
                let reason = failure.to_string();
                let verdict = Verdict::Fail(reason.clone());
                self.report_verdict(&task_id, attempt, &verdict);
                context.record(outcome, verdict);
                return Err(AdaptiveTaskError::Failed {
                    reason,
                    history: context.into_history(),
                });
            }

            let verdict = self.evaluator.judge(&outcome).await;
            self.report_verdict(&task_id, attempt, &verdict);

            match verdict.clone() {
                Verdict::Success => {
                    context.record(outcome.clone(), verdict);
                    info!(task_id = %task_id, attempt, "Adaptive task succeeded");
                    return Ok(TaskOutput {
                        outcome,
                        attempts: context.attempts(),
                        history: context.into_history(),
                    });
                }
                Verdict::Fail(reason) => {
                    context.record(outcome, verdict);
                    return Err(AdaptiveTaskError::Failed {
                        reason,
                        history: context.into_history(),
                    });
                }
                Verdict::Retry(reason) => {
                    context.record(outcome, verdict);
                    debug!(task_id = %task_id, attempt, %reason, "Retry requested");
                    if context.is_exhausted() {
                        warn!(task_id = %task_id, attempts = context.attempts(), "Retries exhausted");
                        return Err(AdaptiveTaskError::RetriesExhausted {
                            attempts: context.attempts(),
                            history: context.into_history(),
                        });
                    }
                }
            }

            if let Some(threshold) = escalate_after
                && let Some(port) = &self.escalation
                && context.consecutive_retries() >= threshold
            {
                info!(task_id = %task_id, streak = context.consecutive_retries(), "Escalating");
                match port.escalate(&context).await {
                    EscalationDecision::Continue => context.reset_retry_streak(),
                    EscalationDecision::Abort(reason) => {
                        return Err(AdaptiveTaskError::Failed {
                            reason,
                            history: context.into_history(),
                        });
                    }
                }
            }

            let proposal = match self.suggester.suggest(&context).await {
                Ok(proposal) => proposal,
                Err(e) => {
                    return Err(AdaptiveTaskError::Failed {
                        reason: e.to_string(),
                        history: context.into_history(),
                    });
                }
            };
            match context.apply_proposal(proposal) {
                ProposalEffect::Changed => {
                    debug!(task_id = %task_id, args = %args_preview(context.current_arguments()), "Arguments revised");
                }
                ProposalEffect::Repeated => {
                    debug!(task_id = %task_id, "Suggester repeated the previous arguments");
                }
                ProposalEffect::NoProgress => {
                    warn!(task_id = %task_id, attempts = context.attempts(), "No progress between attempts");
                    return Err(AdaptiveTaskError::NoProgress {
                        attempts: context.attempts(),
                        history: context.into_history(),
                    });
                }
            }
        }
    }

    /// Run one attempt through the scheduler in a fresh scope.
    async fn attempt(
        &self,
        task_id: &str,
        context: &RetryContext,
        attempt: u32,
        cancellation: &Option<CancellationToken>,
    ) -> ToolCallOutcome {
        let scope = scope_for(format!("{task_id}-attempt-{attempt}"), cancellation);
        self.progress()
            .on_attempt(&context.tool_name, attempt, context.bound());
        self.conversation_logger.log(ConversationEvent::new(
            "adaptive_attempt",
            json!({
                "task_id": task_id,
                "attempt": attempt,
                "bound": context.bound(),
                "tool": context.tool_name,
                "arguments": context.current_arguments(),
            }),
        ));

        let call = ToolCall::new(scope.next_call_id(), context.tool_name.clone())
            .with_arguments(context.current_arguments().clone())
            .in_turn(scope.turn_id());
        let outcome = self.scheduler.submit(call, &scope).outcome().await;
        log_tool_result(self.conversation_logger.as_ref(), scope.turn_id(), &outcome);
        outcome
    }

    fn report_verdict(&self, task_id: &str, attempt: u32, verdict: &Verdict) {
        self.progress().on_verdict(attempt, verdict);
        self.conversation_logger.log(ConversationEvent::new(
            "adaptive_verdict",
            json!({
                "task_id": task_id,
                "attempt": attempt,
                "verdict": verdict.as_str(),
                "reason": verdict.reason(),
            }),
        ));
        debug!(task_id = %task_id, attempt, verdict = %verdict, "Attempt judged");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::escalation::AbortOnEscalation;
    use crate::ports::evaluator::SuggestionError;
    use crate::testing::{FnTool, descriptor, echo_tool, scheduler};
    use async_trait::async_trait;
    use relay_domain::{ApprovalMode, RiskLevel, ToolCategory, ToolError};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Returns scripted verdicts, then `fallback` forever.
    struct ScriptedEvaluator {
        verdicts: Mutex<VecDeque<Verdict>>,
        fallback: Verdict,
        judged: AtomicUsize,
    }

    impl ScriptedEvaluator {
        fn always(verdict: Verdict) -> Arc<Self> {
            Self::script(vec![], verdict)
        }

        fn script(verdicts: Vec<Verdict>, fallback: Verdict) -> Arc<Self> {
            Arc::new(Self {
                verdicts: Mutex::new(verdicts.into()),
                fallback,
                judged: AtomicUsize::new(0),
            })
        }

        fn judged(&self) -> usize {
            self.judged.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaskEvaluator for ScriptedEvaluator {
        async fn judge(&self, _outcome: &ToolCallOutcome) -> Verdict {
            self.judged.fetch_add(1, Ordering::SeqCst);
            self.verdicts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    /// Proposes the current arguments unchanged.
    struct SameArguments;

    #[async_trait]
    impl ArgumentSuggester for SameArguments {
        async fn suggest(
            &self,
            context: &RetryContext,
        ) -> Result<HashMap<String, Value>, SuggestionError> {
            Ok(context.current_arguments().clone())
        }
    }

    /// Proposes `{"value": attempts}`, a new value every time.
    struct Counting;

    #[async_trait]
    impl ArgumentSuggester for Counting {
        async fn suggest(
            &self,
            context: &RetryContext,
        ) -> Result<HashMap<String, Value>, SuggestionError> {
            Ok(HashMap::from([("value".to_string(), json!(context.attempts()))]))
        }
    }

    struct Broken;

    #[async_trait]
    impl ArgumentSuggester for Broken {
        async fn suggest(
            &self,
            _context: &RetryContext,
        ) -> Result<HashMap<String, Value>, SuggestionError> {
            Err(SuggestionError("model unavailable".into()))
        }
    }

    struct KeepGoing(AtomicUsize);

    #[async_trait]
    impl EscalationPort for KeepGoing {
        async fn escalate(&self, _context: &RetryContext) -> EscalationDecision {
            self.0.fetch_add(1, Ordering::SeqCst);
            EscalationDecision::Continue
        }
    }

    fn config() -> SessionConfig {
        SessionConfig::default().with_approval_mode(ApprovalMode::Unrestricted)
    }

    fn use_case(
        tool: Arc<FnTool>,
        evaluator: Arc<ScriptedEvaluator>,
        suggester: Arc<dyn ArgumentSuggester>,
    ) -> RunAdaptiveTaskUseCase {
        let config = config();
        let tools = vec![descriptor("probe", RiskLevel::Low, ToolCategory::Read, tool)];
        RunAdaptiveTaskUseCase::new(scheduler(&config, tools), evaluator, suggester, &config)
    }

    fn input(bound: u32) -> AdaptiveTaskInput {
        AdaptiveTaskInput::new(
            "probe",
            HashMap::from([("domain".to_string(), json!("example.org"))]),
            bound,
        )
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let tool = echo_tool();
        let uc = use_case(tool.clone(), ScriptedEvaluator::always(Verdict::Success), Arc::new(SameArguments));

        let output = uc.execute(input(3), None).await.unwrap();
        assert_eq!(output.attempts, 1);
        assert_eq!(output.history.len(), 1);
        assert_eq!(output.outcome.payload().unwrap()["domain"], "example.org");
        assert_eq!(tool.invocations(), 1);
    }

    #[tokio::test]
    async fn test_identical_proposals_end_with_no_progress() {
        let tool = echo_tool();
        let evaluator = ScriptedEvaluator::always(Verdict::Retry("not yet".into()));
        let uc = use_case(tool.clone(), evaluator.clone(), Arc::new(SameArguments));

        let err = uc.execute(input(3), None).await.unwrap_err();
        match &err {
            AdaptiveTaskError::NoProgress { attempts, history } => {
                assert_eq!(*attempts, 2);
                assert_eq!(history.len(), 2);
            }
            other => panic!("expected NoProgress, got {other:?}"),
        }
        assert_eq!(tool.invocations(), 2);
        assert_eq!(evaluator.judged(), 2);
    }

    #[tokio::test]
    async fn test_changing_proposals_exhaust_bound() {
        let tool = echo_tool();
        let evaluator = ScriptedEvaluator::always(Verdict::Retry("not yet".into()));
        let uc = use_case(tool.clone(), evaluator, Arc::new(Counting));

        let err = uc.execute(input(3), None).await.unwrap_err();
        assert!(matches!(err, AdaptiveTaskError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(err.history().len(), 3);
        assert_eq!(tool.invocations(), 3);
        assert!(err.history().iter().all(|r| r.attempt <= 3));
    }

    #[tokio::test]
    async fn test_retry_applies_suggested_arguments() {
        let evaluator = ScriptedEvaluator::script(vec![Verdict::Retry("wrong".into())], Verdict::Success);
        let uc = use_case(echo_tool(), evaluator, Arc::new(Counting));

        let output = uc.execute(input(3), None).await.unwrap();
        assert_eq!(output.attempts, 2);
        assert_eq!(output.outcome.arguments.get("value"), Some(&json!(1)));
        assert_eq!(output.history[0].arguments.get("domain"), Some(&json!("example.org")));
    }

    #[tokio::test]
    async fn test_evaluator_fail_stops_loop() {
        let evaluator = ScriptedEvaluator::always(Verdict::Fail("host is gone".into()));
        let uc = use_case(echo_tool(), evaluator, Arc::new(Counting));

        let err = uc.execute(input(3), None).await.unwrap_err();
        assert!(matches!(err, AdaptiveTaskError::Failed { ref reason, .. } if reason == "host is gone"));
        assert_eq!(err.history().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_errors_are_routed_to_evaluator() {
        let tool = FnTool::new(|_, _| async { Err(ToolError::execution_failed("SERVFAIL")) });
        let evaluator = ScriptedEvaluator::script(vec![Verdict::Retry("transient".into())], Verdict::Fail("gave up".into()));
        let uc = use_case(tool.clone(), evaluator.clone(), Arc::new(Counting));

        let err = uc.execute(input(3), None).await.unwrap_err();
        assert!(matches!(err, AdaptiveTaskError::Failed { .. }));
        assert_eq!(evaluator.judged(), 2);
        assert_eq!(tool.invocations(), 2);
    }

    #[tokio::test]
    async fn test_structural_failure_skips_evaluator() {
        let evaluator = ScriptedEvaluator::always(Verdict::Success);
        let uc = use_case(echo_tool(), evaluator.clone(), Arc::new(Counting));
        let bad = AdaptiveTaskInput::new("probe", HashMap::from([("domain".to_string(), json!(123))]), 3);

        let err = uc.execute(bad, None).await.unwrap_err();
        match &err {
            AdaptiveTaskError::Failed { reason, history } => {
                assert!(reason.starts_with("invalid_arguments"));
                assert_eq!(history.len(), 1);
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(evaluator.judged(), 0);
    }

    #[tokio::test]
    async fn test_escalation_abort_after_threshold() {
        let evaluator = ScriptedEvaluator::always(Verdict::Retry("again".into()));
        let uc = use_case(echo_tool(), evaluator, Arc::new(Counting))
            .with_escalation(Arc::new(AbortOnEscalation));

        let err = uc
            .execute(input(5).with_escalate_after(2), None)
            .await
            .unwrap_err();
        match err {
            AdaptiveTaskError::Failed { reason, history } => {
                assert_eq!(reason, "escalated after 2 consecutive retries");
                assert_eq!(history.len(), 2);
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_escalation_continue_resets_streak() {
        let evaluator = ScriptedEvaluator::always(Verdict::Retry("again".into()));
        let port = Arc::new(KeepGoing(AtomicUsize::new(0)));
        let uc = use_case(echo_tool(), evaluator, Arc::new(Counting)).with_escalation(port.clone());

        let err = uc
            .execute(input(5).with_escalate_after(2), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AdaptiveTaskError::RetriesExhausted { attempts: 5, .. }));
        // Streak reaches 2 after attempts 2 and 4
        assert_eq!(port.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_suggester_error_fails_task() {
        let evaluator = ScriptedEvaluator::always(Verdict::Retry("again".into()));
        let uc = use_case(echo_tool(), evaluator, Arc::new(Broken));
        let err = uc.execute(input(3), None).await.unwrap_err();
        assert!(matches!(err, AdaptiveTaskError::Failed { ref reason, .. } if reason.contains("model unavailable")));
    }

    #[tokio::test]
    async fn test_invalid_configuration() {
        let uc = use_case(echo_tool(), ScriptedEvaluator::always(Verdict::Success), Arc::new(Counting));
        assert!(matches!(
            uc.execute(input(0), None).await,
            Err(AdaptiveTaskError::InvalidConfig(_))
        ));
        assert!(matches!(
            uc.execute(input(3).with_escalate_after(0), None).await,
            Err(AdaptiveTaskError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let tool = echo_tool();
        let uc = use_case(tool.clone(), ScriptedEvaluator::always(Verdict::Success), Arc::new(Counting));
        let token = CancellationToken::new();
        token.cancel();
        let err = uc.execute(input(3), Some(token)).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(tool.invocations(), 0);
    }
}
