//! Approval Gate
//!
//! Applies the session's [`ApprovalMode`] to a pending call and, when the
//! policy asks for confirmation, waits on the [`ConfirmationPort`] for at
//! most the confirmation timeout. Every wait resolves: a timeout, a closed
//! channel, or an explicit "no" all become a denial.

use std::sync::Arc;
use std::time::Duration;

use relay_domain::{ApprovalDecision, ApprovalMode, ToolCall, ToolDefinition};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ports::confirmation::{ConfirmationPort, ConfirmationRequest};

/// Final answer of the gate for one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    Approved,
    Denied(String),
    /// The call was cancelled while the gate was waiting
    Cancelled,
}

pub struct ApprovalGate {
    mode: ApprovalMode,
    confirmation: Arc<dyn ConfirmationPort>,
    timeout: Duration,
}

impl ApprovalGate {
    pub fn new(mode: ApprovalMode, confirmation: Arc<dyn ConfirmationPort>, timeout: Duration) -> Self {
        Self {
            mode,
            confirmation,
            timeout,
        }
    }

    pub fn mode(&self) -> ApprovalMode {
        self.mode
    }

    /// Policy decision only, without waiting for confirmation
    pub fn decide(&self, tool: &ToolDefinition, call: &ToolCall) -> ApprovalDecision {
        self.mode.decide(tool, &call.arguments)
    }

    /// Decide, and resolve `RequireConfirmation` to approve or deny.
    pub async fn review(
        &self,
        tool: &ToolDefinition,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> GateVerdict {
        match self.decide(tool, call) {
            ApprovalDecision::Approve => {
                debug!(call_id = %call.id, tool = %tool.name, mode = %self.mode, "Approved by policy");
                GateVerdict::Approved
            }
            ApprovalDecision::Deny(reason) => {
                info!(call_id = %call.id, tool = %tool.name, mode = %self.mode, %reason, "Denied by policy");
                GateVerdict::Denied(reason)
            }
            ApprovalDecision::RequireConfirmation => self.await_confirmation(tool, call, cancel).await,
        }
    }

    async fn await_confirmation(
        &self,
        tool: &ToolDefinition,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> GateVerdict {
        let request = ConfirmationRequest {
            turn_id: call.turn_id.clone(),
            call_id: call.id.clone(),
            tool_name: tool.name.clone(),
            arguments: call.arguments.clone(),
            risk_level: tool.risk_level,
            category: tool.category,
        };
        debug!(call_id = %call.id, tool = %tool.name, timeout = ?self.timeout, "Awaiting confirmation");

        let answer = tokio::select! {
            _ = cancel.cancelled() => return GateVerdict::Cancelled,
            answer = tokio::time::timeout(self.timeout, self.confirmation.confirm(&request)) => answer,
        };

        match answer {
            Ok(Ok(true)) => {
                info!(call_id = %call.id, tool = %tool.name, "Confirmed");
                GateVerdict::Approved
            }
            Ok(Ok(false)) => {
                info!(call_id = %call.id, tool = %tool.name, "Confirmation refused");
                GateVerdict::Denied("confirmation refused".to_string())
            }
            Ok(Err(e)) => {
                warn!(call_id = %call.id, tool = %tool.name, error = %e, "Confirmation failed");
                GateVerdict::Denied(format!("confirmation failed: {e}"))
            }
            Err(_) => {
                info!(call_id = %call.id, tool = %tool.name, timeout = ?self.timeout, "Confirmation timed out");
                GateVerdict::Denied(format!(
                    "confirmation timed out after {}s",
                    self.timeout.as_secs()
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::confirmation::{
        AutoApproveConfirmation, AutoDenyConfirmation, ConfirmationBroker, ConfirmationError,
    };
    use async_trait::async_trait;
    use relay_domain::{RiskLevel, ToolCategory};

    struct NeverAnswers;

    #[async_trait]
    impl ConfirmationPort for NeverAnswers {
        async fn confirm(&self, _request: &ConfirmationRequest) -> Result<bool, ConfirmationError> {
            std::future::pending().await
        }
    }

    fn risky() -> ToolDefinition {
        ToolDefinition::new("restart_service", "Restart", RiskLevel::High)
            .with_category(ToolCategory::Execute)
    }

    fn gate(mode: ApprovalMode, port: Arc<dyn ConfirmationPort>) -> ApprovalGate {
        ApprovalGate::new(mode, port, Duration::from_secs(30))
    }

    fn call() -> ToolCall {
        ToolCall::new("call-1", "restart_service")
    }

    #[tokio::test]
    async fn test_policy_approve_skips_port() {
        let g = gate(ApprovalMode::Unrestricted, Arc::new(NeverAnswers));
        let verdict = g.review(&risky(), &call(), &CancellationToken::new()).await;
        assert_eq!(verdict, GateVerdict::Approved);
    }

    #[tokio::test]
    async fn test_policy_deny() {
        let g = gate(ApprovalMode::PlanOnly, Arc::new(AutoApproveConfirmation));
        let verdict = g.review(&risky(), &call(), &CancellationToken::new()).await;
        assert!(matches!(verdict, GateVerdict::Denied(r) if r.contains("plan-only")));
    }

    #[tokio::test]
    async fn test_confirmation_answers() {
        let token = CancellationToken::new();
        let yes = gate(ApprovalMode::Default, Arc::new(AutoApproveConfirmation));
        assert_eq!(yes.review(&risky(), &call(), &token).await, GateVerdict::Approved);

        let no = gate(ApprovalMode::Default, Arc::new(AutoDenyConfirmation));
        assert_eq!(
            no.review(&risky(), &call(), &token).await,
            GateVerdict::Denied("confirmation refused".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_timeout_denies() {
        let g = gate(ApprovalMode::Default, Arc::new(NeverAnswers));
        let started = tokio::time::Instant::now();
        let verdict = g.review(&risky(), &call(), &CancellationToken::new()).await;
        assert_eq!(
            verdict,
            GateVerdict::Denied("confirmation timed out after 30s".into())
        );
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_broker_answer_reaches_matching_turn() {
        let broker = Arc::new(ConfirmationBroker::new());
        let mut announcements = broker.subscribe();
        let g = Arc::new(gate(ApprovalMode::Default, broker.clone()));
        let review = {
            let g = Arc::clone(&g);
            tokio::spawn(async move {
                g.review(&risky(), &call().in_turn("t1"), &CancellationToken::new())
                    .await
            })
        };

        let announced = announcements.recv().await.unwrap();
        assert_eq!(announced.turn_id, "t1");
        assert!(!broker.resolve("t2", "call-1", true));
        assert!(broker.resolve("t1", "call-1", true));
        assert_eq!(review.await.unwrap(), GateVerdict::Approved);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting() {
        let broker = Arc::new(ConfirmationBroker::new());
        let g = gate(ApprovalMode::Default, broker.clone());
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            canceller.cancel();
        });
        assert_eq!(g.review(&risky(), &call(), &token).await, GateVerdict::Cancelled);
        assert!(broker.pending().is_empty());
    }
}
