//! Tool Execution Scheduler
//!
//! Owns the lifecycle of every [`ToolCall`]:
//!
//! ```text
//! submit ─▶ Validating ─▶ Scheduled ─▶ AwaitingApproval ─▶ Executing ─▶ Completed
//!              │ lookup      │ FIFO wait      │ gate            │ timeout /
//!              │ schema      │ for capacity   │ (+ confirm)     │ tool error ─▶ Failed
//!              │ duplicate   │                │                 │
//!              └─────────────┴────────────────┴─────────────────┴──▶ Cancelled
//! ```
//!
//! Validation, duplicate detection and queue registration run synchronously
//! inside [`ToolExecutionScheduler::submit`], so calls are admitted in
//! submission order. Everything after that runs on a spawned task.
//!
//! Each call gets a child of its turn's cancellation token: cancelling the
//! turn reaches every call, cancelling one call never reaches its siblings.
//! A call holds one `ConcurrentExecutions` reservation from the end of
//! `Scheduled` until it turns terminal; the reservation is released on
//! every path, including a panicking tool (via `Drop`).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use relay_domain::{
    CallFailure, CallFingerprint, DefaultToolValidator, FailureKind, ResourceKind, ToolCall,
    ToolCallOutcome, ToolCallState, ToolExecution, ToolValidator,
};
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::approval_gate::{ApprovalGate, GateVerdict};
use super::registry::ToolRegistry;
use super::resource_manager::{PendingReservation, Reservation, ResourceError, ResourceManager};
use crate::config::{AdmissionPolicy, SessionConfig};
use crate::ports::confirmation::ConfirmationPort;
use crate::ports::execution_progress::{ExecutionProgressNotifier, NoExecutionProgress};
use crate::ports::tool_handle::ToolDescriptor;

/// Per-turn bookkeeping shared by every call of the turn.
pub struct TurnScope {
    turn_id: String,
    token: CancellationToken,
    seen: Mutex<HashMap<CallFingerprint, String>>,
    call_ids: Mutex<HashSet<String>>,
    next_call: AtomicU64,
}

impl TurnScope {
    pub fn new(turn_id: impl Into<String>) -> Self {
        Self::with_token(turn_id, CancellationToken::new())
    }

    /// Scope whose token is a child of `parent`
    pub fn child_of(turn_id: impl Into<String>, parent: &CancellationToken) -> Self {
        Self::with_token(turn_id, parent.child_token())
    }

    fn with_token(turn_id: impl Into<String>, token: CancellationToken) -> Self {
        Self {
            turn_id: turn_id.into(),
            token,
            seen: Mutex::new(HashMap::new()),
            call_ids: Mutex::new(HashSet::new()),
            next_call: AtomicU64::new(0),
        }
    }

    pub fn turn_id(&self) -> &str {
        &self.turn_id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel the turn and, through child tokens, all of its calls.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fresh call id, unique within this turn
    pub fn next_call_id(&self) -> String {
        loop {
            let n = self.next_call.fetch_add(1, Ordering::SeqCst) + 1;
            let id = format!("{}-call-{}", self.turn_id, n);
            if self.take_call_id(&id) {
                return id;
            }
        }
    }

    /// Claim `requested` as a call id of this turn. A missing id, or one
    /// already used in this turn, is replaced by a fresh one.
    pub fn assign_call_id(&self, requested: Option<String>) -> String {
        match requested {
            Some(id) if self.take_call_id(&id) => id,
            Some(id) => {
                let fresh = self.next_call_id();
                debug!(turn_id = %self.turn_id, requested = %id, assigned = %fresh, "Repeated call id replaced");
                fresh
            }
            None => self.next_call_id(),
        }
    }

    fn take_call_id(&self, id: &str) -> bool {
        self.call_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string())
    }

    /// Record a fingerprint. Returns the id of the call that already holds
    /// it, if any.
    fn claim(&self, fingerprint: CallFingerprint, call_id: &str) -> Option<String> {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        match seen.get(&fingerprint) {
            Some(original) => Some(original.clone()),
            None => {
                seen.insert(fingerprint, call_id.to_string());
                None
            }
        }
    }

    /// Distinct (tool, arguments) pairs seen in this turn
    pub fn fingerprint_count(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Observer of one submitted call.
pub struct CallHandle {
    call_id: String,
    tool_name: String,
    state: watch::Receiver<ToolCallState>,
    record: Arc<Mutex<ToolExecution>>,
    token: CancellationToken,
    outcome: oneshot::Receiver<ToolCallOutcome>,
    started: Instant,
}

impl CallHandle {
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Current state
    pub fn state(&self) -> ToolCallState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change
    pub fn watch(&self) -> watch::Receiver<ToolCallState> {
        self.state.clone()
    }

    /// Every state entered so far, oldest first
    pub fn path(&self) -> Vec<ToolCallState> {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .path()
    }

    /// Cancel this call only.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for the terminal outcome.
    pub async fn outcome(self) -> ToolCallOutcome {
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(_) => {
                // Execution task vanished (runtime shutting down)
                let mut exec = self.record.lock().unwrap_or_else(PoisonError::into_inner);
                if !exec.is_terminal() {
                    let _ = exec.transition(ToolCallState::Cancelled);
                }
                ToolCallOutcome {
                    call_id: self.call_id,
                    tool_name: self.tool_name,
                    arguments: exec.call.arguments.clone(),
                    state: exec.state(),
                    result: Err(CallFailure::cancelled("execution task lost")),
                    duration_ms: self.started.elapsed().as_millis() as u64,
                }
            }
        }
    }
}

impl std::fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallHandle")
            .field("call_id", &self.call_id)
            .field("tool_name", &self.tool_name)
            .field("state", &self.state())
            .finish()
    }
}

/// Shared writer side of a call's lifecycle record.
#[derive(Clone)]
struct CallTracker {
    call_id: String,
    tool_name: String,
    record: Arc<Mutex<ToolExecution>>,
    state_tx: Arc<watch::Sender<ToolCallState>>,
    progress: Arc<dyn ExecutionProgressNotifier>,
    started: Instant,
}

impl CallTracker {
    fn transition(&self, next: ToolCallState) -> bool {
        let result = {
            let mut exec = self.record.lock().unwrap_or_else(PoisonError::into_inner);
            let result = exec.transition(next);
            if result.is_ok() {
                self.state_tx.send_replace(next);
            }
            result
        };
        match result {
            Ok(()) => {
                debug!(call_id = %self.call_id, tool = %self.tool_name, state = %next, "Call state changed");
                self.progress.on_state_change(&self.call_id, &self.tool_name, next);
                true
            }
            Err(e) => {
                warn!(call_id = %self.call_id, error = %e, "Rejected state transition");
                false
            }
        }
    }

    /// Move to the terminal state matching `result` and build the outcome.
    fn finish(&self, result: Result<Value, CallFailure>) -> ToolCallOutcome {
        let target = match &result {
            Ok(_) => ToolCallState::Completed,
            Err(failure) => failure.kind.terminal_state(),
        };

        let (state, arguments) = {
            let mut exec = self.record.lock().unwrap_or_else(PoisonError::into_inner);
            if !exec.is_terminal() {
                if exec.transition(target).is_err() {
                    // Every non-terminal state may be cancelled
                    let _ = exec.transition(ToolCallState::Cancelled);
                }
                self.state_tx.send_replace(exec.state());
            }
            (exec.state(), exec.call.arguments.clone())
        };

        let outcome = ToolCallOutcome {
            call_id: self.call_id.clone(),
            tool_name: self.tool_name.clone(),
            arguments,
            state,
            result,
            duration_ms: self.started.elapsed().as_millis() as u64,
        };

        match outcome.failure() {
            None => info!(call_id = %self.call_id, tool = %self.tool_name, duration_ms = outcome.duration_ms, "Call completed"),
            Some(f) => info!(call_id = %self.call_id, tool = %self.tool_name, state = %state, kind = %f.kind, message = %f.message, "Call ended without result"),
        }
        self.progress.on_state_change(&self.call_id, &self.tool_name, state);
        self.progress.on_tool_result(&outcome);
        outcome
    }
}

/// Runs tool calls through validation, admission, approval and execution.
#[derive(Clone)]
pub struct ToolExecutionScheduler {
    registry: Arc<ToolRegistry>,
    resources: Arc<ResourceManager>,
    gate: Arc<ApprovalGate>,
    validator: Arc<dyn ToolValidator>,
    execution_timeout: Duration,
    admission: AdmissionPolicy,
    progress: Arc<dyn ExecutionProgressNotifier>,
}

impl ToolExecutionScheduler {
    pub fn new(
        registry: Arc<ToolRegistry>,
        resources: Arc<ResourceManager>,
        confirmation: Arc<dyn ConfirmationPort>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            registry,
            resources,
            gate: Arc::new(ApprovalGate::new(
                config.approval_mode,
                confirmation,
                config.confirmation_timeout,
            )),
            validator: Arc::new(DefaultToolValidator),
            execution_timeout: config.execution_timeout,
            admission: config.admission,
            progress: Arc::new(NoExecutionProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ExecutionProgressNotifier>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn ToolValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn resources(&self) -> &Arc<ResourceManager> {
        &self.resources
    }

    pub fn progress(&self) -> &Arc<dyn ExecutionProgressNotifier> {
        &self.progress
    }

    /// Admit a call and start driving it. Never blocks.
    pub fn submit(&self, call: ToolCall, scope: &TurnScope) -> CallHandle {
        let token = scope.token().child_token();
        let record = Arc::new(Mutex::new(ToolExecution::new(call.clone())));
        let (state_tx, state_rx) = watch::channel(ToolCallState::Validating);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let started = Instant::now();

        let tracker = CallTracker {
            call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            record: Arc::clone(&record),
            state_tx: Arc::new(state_tx),
            progress: Arc::clone(&self.progress),
            started,
        };
        debug!(call_id = %call.id, tool = %call.tool_name, turn_id = %scope.turn_id(), "Call submitted");
        self.progress
            .on_state_change(&call.id, &call.tool_name, ToolCallState::Validating);

        let handle = CallHandle {
            call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            state: state_rx,
            record,
            token: token.clone(),
            outcome: outcome_rx,
            started,
        };

        match self.admit(&call, scope, &token, &tracker) {
            Err(failure) => {
                let _ = outcome_tx.send(tracker.finish(Err(failure)));
            }
            Ok((descriptor, pending)) => {
                let scheduler = self.clone();
                tokio::spawn(async move {
                    let inner = tokio::spawn({
                        let tracker = tracker.clone();
                        async move {
                            scheduler
                                .drive(call, descriptor, pending, tracker, token)
                                .await
                        }
                    });
                    let outcome = match inner.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            let message = if e.is_panic() {
                                panic_message(e.into_panic())
                            } else {
                                "execution task aborted".to_string()
                            };
                            error!(call_id = %tracker.call_id, tool = %tracker.tool_name, %message, "Tool task panicked");
                            tracker.finish(Err(CallFailure::panicked(message)))
                        }
                    };
                    let _ = outcome_tx.send(outcome);
                });
            }
        }
        handle
    }

    /// Synchronous part: lookup, schema check, duplicate check, queue entry.
    fn admit(
        &self,
        call: &ToolCall,
        scope: &TurnScope,
        token: &CancellationToken,
        tracker: &CallTracker,
    ) -> Result<(ToolDescriptor, PendingReservation), CallFailure> {
        if token.is_cancelled() {
            return Err(CallFailure::cancelled("turn cancelled before validation"));
        }

        let descriptor = self
            .registry
            .lookup(&call.tool_name)
            .map_err(|_| CallFailure::tool_not_found(&call.tool_name))?;

        self.validator
            .validate(call, &descriptor.definition)
            .map_err(CallFailure::invalid_arguments)?;

        if let Some(original) = scope.claim(call.fingerprint(), &call.id) {
            debug!(call_id = %call.id, original = %original, "Duplicate call suppressed");
            return Err(CallFailure::duplicate_of(original));
        }

        tracker.transition(ToolCallState::Scheduled);
        let pending = self
            .resources
            .enqueue(ResourceKind::ConcurrentExecutions, 1, call.id.clone())
            .map_err(resource_failure)?;
        Ok((descriptor, pending))
    }

    /// Asynchronous part: capacity, approval, execution.
    async fn drive(
        self,
        call: ToolCall,
        descriptor: ToolDescriptor,
        pending: PendingReservation,
        tracker: CallTracker,
        token: CancellationToken,
    ) -> ToolCallOutcome {
        let reservation = match self.wait_for_capacity(&call, pending, &token).await {
            Ok(reservation) => reservation,
            Err(failure) => return tracker.finish(Err(failure)),
        };

        tracker.transition(ToolCallState::AwaitingApproval);
        if matches!(
            self.gate.decide(&descriptor.definition, &call),
            relay_domain::ApprovalDecision::RequireConfirmation
        ) {
            self.progress
                .on_confirmation_pending(&call.id, &call.tool_name);
        }
        let denial = match self.gate.review(&descriptor.definition, &call, &token).await {
            GateVerdict::Approved if token.is_cancelled() => {
                Some(CallFailure::cancelled("cancelled before execution"))
            }
            GateVerdict::Approved => None,
            GateVerdict::Denied(reason) => Some(CallFailure::approval_denied(reason)),
            GateVerdict::Cancelled => Some(CallFailure::cancelled("cancelled while awaiting approval")),
        };
        if let Some(failure) = denial {
            reservation.release();
            return tracker.finish(Err(failure));
        }

        tracker.transition(ToolCallState::Executing);
        let timeout = descriptor
            .definition
            .timeout()
            .unwrap_or(self.execution_timeout);
        let result = self.invoke(&descriptor, &call, &token, timeout).await;

        reservation.release();
        tracker.finish(result)
    }

    /// Wait for the call's turn in the queue. A timed-out attempt keeps the
    /// queue position; the retry window is the backoff plus `wait_timeout`.
    async fn wait_for_capacity(
        &self,
        call: &ToolCall,
        mut pending: PendingReservation,
        token: &CancellationToken,
    ) -> Result<Reservation, CallFailure> {
        let mut retry = 0;
        let mut window = self.admission.wait_timeout;
        loop {
            let waited = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    return Err(CallFailure::cancelled("cancelled while waiting for capacity"));
                }
                waited = pending.wait(window) => waited,
            };

            match waited {
                Ok(reservation) => return Ok(reservation),
                Err(ResourceError::Timeout { .. }) if retry < self.admission.max_retries => {
                    retry += 1;
                    let delay = self.admission.backoff_for(retry);
                    debug!(call_id = %call.id, retry, delay = ?delay, "Capacity wait timed out, still queued");
                    window = delay + self.admission.wait_timeout;
                }
                Err(e) => return Err(resource_failure(e)),
            }
        }
    }

    /// Invoke the handle under a deadline. Cancellation is cooperative: the
    /// tool gets until the deadline to observe its token.
    async fn invoke(
        &self,
        descriptor: &ToolDescriptor,
        call: &ToolCall,
        token: &CancellationToken,
        timeout: Duration,
    ) -> Result<Value, CallFailure> {
        let deadline = Instant::now() + timeout;
        let invocation = descriptor.handle.invoke(call, token.clone());
        tokio::pin!(invocation);

        tokio::select! {
            biased;
            result = &mut invocation => result.map_err(|e| {
                if token.is_cancelled() && e.is_cancelled() {
                    CallFailure::cancelled("cancelled while executing")
                } else {
                    CallFailure::from_tool_error(e)
                }
            }),
            _ = token.cancelled() => {
                if tokio::time::timeout_at(deadline, &mut invocation).await.is_err() {
                    warn!(call_id = %call.id, tool = %call.tool_name, "Tool ignored cancellation until its deadline");
                }
                Err(CallFailure::cancelled("cancelled while executing"))
            }
            _ = tokio::time::sleep_until(deadline) => {
                // Tell the tool to stop; its future is dropped here
                token.cancel();
                Err(CallFailure::execution_timeout(timeout.as_millis() as u64))
            }
        }
    }
}

fn resource_failure(error: ResourceError) -> CallFailure {
    let kind = match &error {
        ResourceError::QuotaExceeded { .. } => FailureKind::QuotaExceeded,
        ResourceError::Timeout { .. } => FailureKind::ResourceTimeout,
        ResourceError::Closed => FailureKind::Cancelled,
    };
    CallFailure::new(kind, error.to_string())
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}
