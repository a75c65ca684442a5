//! Escalation port.
//!
//! Optional hook consulted by the adaptive loop after a configured number
//! of consecutive `Retry` verdicts. The threshold and the authority to keep
//! going are both supplied from outside; the loop never infers them.

use async_trait::async_trait;
use relay_domain::RetryContext;

/// Answer from the escalation authority
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationDecision {
    /// Keep retrying; the retry streak starts over
    Continue,
    /// Stop the task with this reason
    Abort(String),
}

#[async_trait]
pub trait EscalationPort: Send + Sync {
    async fn escalate(&self, context: &RetryContext) -> EscalationDecision;
}

/// Escalation that always aborts.
pub struct AbortOnEscalation;

#[async_trait]
impl EscalationPort for AbortOnEscalation {
    async fn escalate(&self, context: &RetryContext) -> EscalationDecision {
        EscalationDecision::Abort(format!(
            "escalated after {} consecutive retries",
            context.consecutive_retries()
        ))
    }
}
