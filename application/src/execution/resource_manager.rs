//! Resource Manager
//!
//! Enforces externally configured quotas. Each [`ResourceKind`] has a pool
//! with a limit, an in-use counter and a FIFO queue of waiters; all
//! accounting happens under the pool's lock.
//!
//! A granted [`Reservation`] is a scoped acquisition: it is returned to the
//! pool by [`Reservation::release`] or, failing that, by `Drop`. Releasing
//! twice is a no-op, so cleanup paths never need to know whether another
//! path already released.
//!
//! Waiters register when [`ResourceManager::enqueue`] is called, not when
//! the returned [`PendingReservation`] is first polled, so admission order
//! equals call order.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use relay_domain::{QuotaConfig, ResourceKind, ResourceUsage};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, trace};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("Quota exceeded for {kind}: requested {requested}, limit {limit:?}, in use {in_use}")]
    QuotaExceeded {
        kind: ResourceKind,
        requested: u64,
        limit: Option<u64>,
        in_use: u64,
    },

    #[error("Timed out after {waited:?} waiting for {kind}")]
    Timeout { kind: ResourceKind, waited: Duration },

    #[error("Resource manager closed")]
    Closed,
}

struct Waiter {
    id: u64,
    amount: u64,
    holder: String,
    sender: oneshot::Sender<Reservation>,
}

struct PoolState {
    limit: Option<u64>,
    in_use: u64,
    holders: BTreeMap<u64, String>,
    waiters: VecDeque<Waiter>,
    next_id: u64,
    grants: u64,
    releases: u64,
    closed: bool,
}

impl PoolState {
    fn fits(&self, amount: u64) -> bool {
        match self.limit {
            Some(limit) => self.in_use.saturating_add(amount) <= limit,
            None => true,
        }
    }

    fn never_fits(&self, amount: u64) -> bool {
        matches!(self.limit, Some(limit) if amount > limit)
    }

    fn quota_exceeded(&self, kind: ResourceKind, requested: u64) -> ResourceError {
        ResourceError::QuotaExceeded {
            kind,
            requested,
            limit: self.limit,
            in_use: self.in_use,
        }
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

struct Pool {
    kind: ResourceKind,
    state: Mutex<PoolState>,
}

impl Pool {
    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Grant queued waiters, front first, while capacity allows.
    ///
    /// A waiter whose receiver is gone gets its accounting undone here,
    /// inside the lock; the returned reservation is disarmed so its `Drop`
    /// does not try to take the lock again.
    fn grant_waiters(self: &Arc<Self>, state: &mut PoolState) {
        while let Some(front) = state.waiters.front() {
            if !state.fits(front.amount) {
                break;
            }
            let Some(waiter) = state.waiters.pop_front() else {
                break;
            };
            state.in_use += waiter.amount;
            state.holders.insert(waiter.id, waiter.holder.clone());
            state.grants += 1;

            let reservation = Reservation {
                id: waiter.id,
                kind: self.kind,
                amount: waiter.amount,
                holder: waiter.holder,
                released: AtomicBool::new(false),
                pool: Arc::clone(self),
            };
            if let Err(orphan) = waiter.sender.send(reservation) {
                orphan.disarm();
                state.in_use -= orphan.amount;
                state.holders.remove(&orphan.id);
                state.grants -= 1;
                continue;
            }
            trace!(kind = %self.kind, holder = %state.holders[&waiter.id], in_use = state.in_use, "Reservation granted");
        }
    }

    fn give_back(self: &Arc<Self>, id: u64, amount: u64) {
        let mut state = self.lock();
        if state.holders.remove(&id).is_some() {
            state.in_use -= amount;
            state.releases += 1;
            trace!(kind = %self.kind, in_use = state.in_use, "Reservation released");
        }
        self.grant_waiters(&mut state);
    }

    fn forget_waiter(self: &Arc<Self>, id: u64) {
        let mut state = self.lock();
        let before = state.waiters.len();
        state.waiters.retain(|w| w.id != id);
        if state.waiters.len() != before {
            // A removed head may unblock smaller requests behind it
            self.grant_waiters(&mut state);
        }
    }
}

/// Capacity held by one call. Released exactly once, explicitly or on drop.
pub struct Reservation {
    id: u64,
    kind: ResourceKind,
    amount: u64,
    holder: String,
    released: AtomicBool,
    pool: Arc<Pool>,
}

impl Reservation {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Return the capacity. Returns `true` only for the call that actually
    /// released; later calls are no-ops.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.pool.give_back(self.id, self.amount);
        true
    }

    fn disarm(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.release() {
            debug!(kind = %self.kind, holder = %self.holder, "Reservation released on drop");
        }
    }
}

impl std::fmt::Debug for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservation")
            .field("kind", &self.kind)
            .field("amount", &self.amount)
            .field("holder", &self.holder)
            .field("released", &self.is_released())
            .finish()
    }
}

/// A queued request. Dropping it leaves the queue.
pub struct PendingReservation {
    id: u64,
    kind: ResourceKind,
    pool: Arc<Pool>,
    receiver: Option<oneshot::Receiver<Reservation>>,
}

impl PendingReservation {
    /// Wait up to `timeout` for the grant.
    ///
    /// A timeout keeps the request at its place in the queue; waiting again
    /// resumes from there. Only dropping the request gives the place up.
    pub async fn wait(&mut self, timeout: Duration) -> Result<Reservation, ResourceError> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Err(ResourceError::Closed);
        };
        match tokio::time::timeout(timeout, receiver).await {
            Ok(granted) => {
                self.receiver = None;
                granted.map_err(|_| ResourceError::Closed)
            }
            Err(_) => Err(ResourceError::Timeout {
                kind: self.kind,
                waited: timeout,
            }),
        }
    }
}

impl Drop for PendingReservation {
    fn drop(&mut self) {
        self.pool.forget_waiter(self.id);
    }
}

/// Quota enforcement for the whole process.
pub struct ResourceManager {
    pools: HashMap<ResourceKind, Arc<Pool>>,
}

impl ResourceManager {
    pub fn new(quotas: &QuotaConfig) -> Self {
        let pools = ResourceKind::all()
            .iter()
            .map(|&kind| {
                let pool = Pool {
                    kind,
                    state: Mutex::new(PoolState {
                        limit: quotas.limit(kind),
                        in_use: 0,
                        holders: BTreeMap::new(),
                        waiters: VecDeque::new(),
                        next_id: 0,
                        grants: 0,
                        releases: 0,
                        closed: false,
                    }),
                };
                (kind, Arc::new(pool))
            })
            .collect();
        Self { pools }
    }

    fn pool(&self, kind: ResourceKind) -> &Arc<Pool> {
        // Every kind gets a pool in `new`
        &self.pools[&kind]
    }

    /// Non-blocking attempt. Fails if the quota is full or anyone is queued.
    pub fn reserve(
        &self,
        kind: ResourceKind,
        amount: u64,
        holder: impl Into<String>,
    ) -> Result<Reservation, ResourceError> {
        let pool = self.pool(kind);
        let mut state = pool.lock();
        if state.closed {
            return Err(ResourceError::Closed);
        }
        if !state.waiters.is_empty() || !state.fits(amount) {
            return Err(state.quota_exceeded(kind, amount));
        }
        let id = state.allocate_id();
        let holder = holder.into();
        state.in_use += amount;
        state.holders.insert(id, holder.clone());
        state.grants += 1;
        Ok(Reservation {
            id,
            kind,
            amount,
            holder,
            released: AtomicBool::new(false),
            pool: Arc::clone(pool),
        })
    }

    /// Join the FIFO queue for `amount` of `kind`.
    ///
    /// Requests larger than the limit can never be satisfied and fail
    /// immediately with `QuotaExceeded`.
    pub fn enqueue(
        &self,
        kind: ResourceKind,
        amount: u64,
        holder: impl Into<String>,
    ) -> Result<PendingReservation, ResourceError> {
        let pool = self.pool(kind);
        let (sender, receiver) = oneshot::channel();
        let mut state = pool.lock();
        if state.closed {
            return Err(ResourceError::Closed);
        }
        if state.never_fits(amount) {
            return Err(state.quota_exceeded(kind, amount));
        }
        let id = state.allocate_id();
        state.waiters.push_back(Waiter {
            id,
            amount,
            holder: holder.into(),
            sender,
        });
        pool.grant_waiters(&mut state);
        Ok(PendingReservation {
            id,
            kind,
            pool: Arc::clone(pool),
            receiver: Some(receiver),
        })
    }

    /// Blocking attempt bounded by `timeout`.
    pub async fn reserve_blocking(
        &self,
        kind: ResourceKind,
        amount: u64,
        holder: impl Into<String>,
        timeout: Duration,
    ) -> Result<Reservation, ResourceError> {
        let mut pending = self.enqueue(kind, amount, holder)?;
        pending.wait(timeout).await
    }

    /// Idempotent release; see [`Reservation::release`].
    pub fn release(&self, reservation: &Reservation) -> bool {
        reservation.release()
    }

    pub fn usage(&self, kind: ResourceKind) -> ResourceUsage {
        let state = self.pool(kind).lock();
        ResourceUsage {
            kind,
            limit: state.limit,
            in_use: state.in_use,
            waiting: state.waiters.len(),
            holders: state.holders.values().cloned().collect(),
            grants: state.grants,
            releases: state.releases,
        }
    }

    /// Reject queued and future requests. Live reservations stay valid.
    pub fn close(&self) {
        for pool in self.pools.values() {
            let mut state = pool.lock();
            state.closed = true;
            // Dropping the senders wakes waiters with `Closed`
            state.waiters.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONC: ResourceKind = ResourceKind::ConcurrentExecutions;

    fn manager(limit: u64) -> ResourceManager {
        ResourceManager::new(&QuotaConfig::unlimited().with_max_concurrent(limit))
    }

    #[test]
    fn test_reserve_until_quota() {
        let rm = manager(2);
        let a = rm.reserve(CONC, 1, "a").unwrap();
        let _b = rm.reserve(CONC, 1, "b").unwrap();
        assert!(matches!(
            rm.reserve(CONC, 1, "c"),
            Err(ResourceError::QuotaExceeded { in_use: 2, .. })
        ));

        assert!(rm.release(&a));
        assert!(rm.reserve(CONC, 1, "c").is_ok());
    }

    #[test]
    fn test_release_is_idempotent() {
        let rm = manager(1);
        let r = rm.reserve(CONC, 1, "a").unwrap();
        assert!(r.release());
        assert!(!r.release());
        assert!(!rm.release(&r));
        drop(r);

        let usage = rm.usage(CONC);
        assert_eq!(usage.in_use, 0);
        assert_eq!(usage.grants, 1);
        assert_eq!(usage.releases, 1);
    }

    #[test]
    fn test_drop_releases() {
        let rm = manager(1);
        {
            let _r = rm.reserve(CONC, 1, "a").unwrap();
            assert_eq!(rm.usage(CONC).holders, vec!["a".to_string()]);
        }
        let usage = rm.usage(CONC);
        assert_eq!(usage.in_use, 0);
        assert_eq!(usage.releases, 1);
    }

    #[test]
    fn test_unlimited_kind() {
        let rm = ResourceManager::new(&QuotaConfig::unlimited());
        let held: Vec<_> = (0..100)
            .map(|i| rm.reserve(ResourceKind::MemoryBytes, 1 << 20, format!("m{i}")).unwrap())
            .collect();
        assert_eq!(rm.usage(ResourceKind::MemoryBytes).in_use, 100 << 20);
        drop(held);
        assert_eq!(rm.usage(ResourceKind::MemoryBytes).in_use, 0);
    }

    #[test]
    fn test_oversized_request_fails_fast() {
        let rm = manager(2);
        assert!(matches!(
            rm.enqueue(CONC, 3, "big"),
            Err(ResourceError::QuotaExceeded { requested: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_waiters_granted_fifo() {
        let rm = manager(1);
        let first = rm.reserve(CONC, 1, "first").unwrap();
        let mut second = rm.enqueue(CONC, 1, "second").unwrap();
        let mut third = rm.enqueue(CONC, 1, "third").unwrap();
        assert_eq!(rm.usage(CONC).waiting, 2);

        // A non-blocking attempt may not jump the queue
        assert!(rm.reserve(CONC, 1, "sneaky").is_err());

        drop(first);
        let second = second.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(second.holder(), "second");
        assert_eq!(rm.usage(CONC).waiting, 1);

        second.release();
        let third = third.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(third.holder(), "third");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reserve_blocking_times_out_and_leaves_queue() {
        let rm = manager(1);
        let _held = rm.reserve(CONC, 1, "holder").unwrap();
        let err = rm
            .reserve_blocking(CONC, 1, "late", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::Timeout { .. }));
        assert_eq!(rm.usage(CONC).waiting, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_waiter_keeps_its_place() {
        let rm = manager(1);
        let held = rm.reserve(CONC, 1, "holder").unwrap();
        let mut early = rm.enqueue(CONC, 1, "early").unwrap();
        assert!(matches!(
            early.wait(Duration::from_millis(50)).await,
            Err(ResourceError::Timeout { .. })
        ));
        assert_eq!(rm.usage(CONC).waiting, 1);

        let mut late = rm.enqueue(CONC, 1, "late").unwrap();
        drop(held);

        let granted = early.wait(Duration::from_millis(50)).await.unwrap();
        assert_eq!(granted.holder(), "early");
        assert!(matches!(
            late.wait(Duration::from_millis(10)).await,
            Err(ResourceError::Timeout { .. })
        ));
        granted.release();
        assert_eq!(late.wait(Duration::from_millis(10)).await.unwrap().holder(), "late");
    }

    #[tokio::test]
    async fn test_abandoned_waiter_does_not_leak_capacity() {
        let rm = manager(1);
        let held = rm.reserve(CONC, 1, "holder").unwrap();
        let abandoned = rm.enqueue(CONC, 1, "abandoned").unwrap();
        let mut next = rm.enqueue(CONC, 1, "next").unwrap();
        drop(abandoned);
        drop(held);

        let next = next.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(next.holder(), "next");
        assert_eq!(rm.usage(CONC).in_use, 1);
    }

    #[tokio::test]
    async fn test_close_wakes_waiters() {
        let rm = manager(1);
        let _held = rm.reserve(CONC, 1, "holder").unwrap();
        let mut pending = rm.enqueue(CONC, 1, "waiter").unwrap();
        rm.close();
        assert_eq!(
            pending.wait(Duration::from_secs(1)).await.unwrap_err(),
            ResourceError::Closed
        );
        assert_eq!(rm.reserve(CONC, 1, "x").unwrap_err(), ResourceError::Closed);
    }

    #[tokio::test]
    async fn test_concurrent_reserve_release_accounting() {
        let rm = Arc::new(manager(3));
        let mut tasks = Vec::new();
        for i in 0..32 {
            let rm = Arc::clone(&rm);
            tasks.push(tokio::spawn(async move {
                let r = rm
                    .reserve_blocking(CONC, 1, format!("t{i}"), Duration::from_secs(10))
                    .await
                    .unwrap();
                assert!(rm.usage(CONC).in_use <= 3);
                tokio::task::yield_now().await;
                r.release();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        let usage = rm.usage(CONC);
        assert_eq!(usage.in_use, 0);
        assert_eq!(usage.grants, 32);
        assert_eq!(usage.releases, 32);
    }
}
