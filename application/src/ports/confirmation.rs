//! Approval confirmation port.
//!
//! When the approval policy returns `RequireConfirmation`, the scheduler
//! suspends the call and asks a [`ConfirmationPort`] for an out-of-band
//! decision. The approval gate bounds the wait with the session's
//! confirmation timeout; a timeout resolves to a denial.
//!
//! # Built-in Implementations
//!
//! - [`AutoApproveConfirmation`] - always approves
//! - [`AutoDenyConfirmation`] - always denies
//! - [`ConfirmationBroker`] - parks each request until someone calls
//!   [`ConfirmationBroker::resolve`] with its turn and call id

use async_trait::async_trait;
use relay_domain::{RiskLevel, ToolCategory};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};

/// What the confirmer is asked to decide on
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationRequest {
    pub turn_id: String,
    pub call_id: String,
    pub tool_name: String,
    pub arguments: HashMap<String, Value>,
    pub risk_level: RiskLevel,
    pub category: ToolCategory,
}

/// Failure to obtain a decision (not a denial)
#[derive(Debug, Clone, Error)]
pub enum ConfirmationError {
    #[error("Confirmation channel closed")]
    Closed,

    #[error("Confirmation I/O error: {0}")]
    IoError(String),

    #[error("Confirmation already pending for {call_id} in turn {turn_id}")]
    AlreadyPending { turn_id: String, call_id: String },
}

/// Port for out-of-band approval of a pending call.
#[async_trait]
pub trait ConfirmationPort: Send + Sync {
    /// Returns `Ok(true)` to approve, `Ok(false)` to deny.
    async fn confirm(&self, request: &ConfirmationRequest) -> Result<bool, ConfirmationError>;
}

/// Auto-approve implementation.
pub struct AutoApproveConfirmation;

#[async_trait]
impl ConfirmationPort for AutoApproveConfirmation {
    async fn confirm(&self, _request: &ConfirmationRequest) -> Result<bool, ConfirmationError> {
        Ok(true)
    }
}

/// Auto-deny implementation.
pub struct AutoDenyConfirmation;

#[async_trait]
impl ConfirmationPort for AutoDenyConfirmation {
    async fn confirm(&self, _request: &ConfirmationRequest) -> Result<bool, ConfirmationError> {
        Ok(false)
    }
}

/// Identifies a parked request: call ids are unique only within a turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingKey {
    pub turn_id: String,
    pub call_id: String,
}

impl PendingKey {
    pub fn new(turn_id: impl Into<String>, call_id: impl Into<String>) -> Self {
        Self {
            turn_id: turn_id.into(),
            call_id: call_id.into(),
        }
    }

    fn of(request: &ConfirmationRequest) -> Self {
        Self::new(request.turn_id.clone(), request.call_id.clone())
    }
}

/// Parked sender tagged with the ticket of the `confirm` call that owns it
struct Parked {
    ticket: u64,
    sender: oneshot::Sender<bool>,
}

type PendingMap = Arc<Mutex<HashMap<PendingKey, Parked>>>;

/// Out-of-band confirmation channel keyed by turn and call id.
///
/// Each `confirm` parks until [`resolve`](Self::resolve) is called for the
/// same key. New requests are announced on a broadcast channel so a front
/// end can prompt for them. A second request for a key that is already
/// parked fails with [`ConfirmationError::AlreadyPending`] and leaves the
/// first one untouched.
pub struct ConfirmationBroker {
    pending: PendingMap,
    next_ticket: AtomicU64,
    announcements: broadcast::Sender<ConfirmationRequest>,
}

impl ConfirmationBroker {
    pub fn new() -> Self {
        let (announcements, _) = broadcast::channel(64);
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: AtomicU64::new(0),
            announcements,
        }
    }

    /// Receive every request parked from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConfirmationRequest> {
        self.announcements.subscribe()
    }

    /// Resolve a parked request. Returns `false` if nothing is waiting on
    /// that key (already resolved, timed out, or never asked).
    pub fn resolve(&self, turn_id: &str, call_id: &str, approved: bool) -> bool {
        let sender = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&PendingKey::new(turn_id, call_id));
        match sender {
            Some(parked) => parked.sender.send(approved).is_ok(),
            None => false,
        }
    }

    /// Keys currently waiting for a decision, sorted
    pub fn pending(&self) -> Vec<PendingKey> {
        let mut keys: Vec<PendingKey> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl Default for ConfirmationBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes a parked entry when the waiting future goes away (timeout or
/// cancellation), so stale senders never accumulate. Only the entry this
/// guard parked is removed.
struct PendingGuard {
    pending: PendingMap,
    key: PendingKey,
    ticket: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.get(&self.key).is_some_and(|p| p.ticket == self.ticket) {
            pending.remove(&self.key);
        }
    }
}

#[async_trait]
impl ConfirmationPort for ConfirmationBroker {
    async fn confirm(&self, request: &ConfirmationRequest) -> Result<bool, ConfirmationError> {
        let key = PendingKey::of(request);
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if pending.contains_key(&key) {
                return Err(ConfirmationError::AlreadyPending {
                    turn_id: key.turn_id,
                    call_id: key.call_id,
                });
            }
            pending.insert(key.clone(), Parked { ticket, sender });
        }
        let _guard = PendingGuard {
            pending: Arc::clone(&self.pending),
            key,
            ticket,
        };

        // No subscribers is fine; resolve() can still be called directly
        let _ = self.announcements.send(request.clone());

        receiver.await.map_err(|_| ConfirmationError::Closed)
    }
}
