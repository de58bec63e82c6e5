//! Bounded pool of router sessions.
//!
//! RTX routers accept only one command session per SSH connection and only a
//! handful of connections overall. The pool owns up to `max_connections`
//! sessions and lends each one to a single caller at a time. A connection
//! remembers whether its session has already entered administrator mode, so
//! the password exchange happens once per connection rather than once per
//! operation.
//!
//! State lives behind one mutex that is never held across an `.await`;
//! dialing happens with the lock released while a pending slot is reserved.
//! Callers waiting for a free slot park on a [`Notify`] that release, discard
//! and close signal.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::PoolConfig;
use crate::error::ConnectError;
use crate::session::{CommandSession, SessionFactory};

/// Snapshot of pool counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PoolStats {
    pub available: usize,
    pub in_use: usize,
    pub pending: usize,
    pub max_connections: usize,
    pub total_created: u64,
    pub total_acquisitions: u64,
    pub total_discarded: u64,
    /// Acquisitions that had to wait for a free slot.
    pub wait_count: u64,
    pub closed: bool,
}

/// A session parked in the pool or lent out through [`PooledConnection`].
struct ConnectionEntry<S> {
    id: u64,
    session: S,
    privileged: bool,
    created_at: Instant,
    last_used: Instant,
    use_count: u64,
}

struct PoolState<S> {
    /// Idle connections, most recently used last.
    available: Vec<ConnectionEntry<S>>,
    in_use: HashSet<u64>,
    /// Connections being dialed; they count against the limit.
    pending: usize,
    closed: bool,
    total_created: u64,
    total_acquisitions: u64,
    total_discarded: u64,
    wait_count: u64,
}

impl<S> PoolState<S> {
    fn occupied(&self) -> usize {
        self.available.len() + self.in_use.len() + self.pending
    }
}

/// The part of the pool that lent connections point back to.
struct PoolCore<S> {
    config: PoolConfig,
    state: Mutex<PoolState<S>>,
    notify: Notify,
    next_id: AtomicU64,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<S: CommandSession> PoolCore<S> {
    fn lock(&self) -> MutexGuard<'_, PoolState<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops the bookkeeping of a lent connection that will not come back.
    fn forget(&self, id: u64) {
        {
            let mut state = self.lock();
            if state.in_use.remove(&id) {
                state.total_discarded += 1;
            }
        }
        self.notify.notify_one();
    }

    /// Removes every available connection idle longer than the timeout.
    fn take_expired(&self, now: Instant) -> Vec<ConnectionEntry<S>> {
        let idle_timeout = self.config.idle_timeout();
        let mut state = self.lock();
        let (expired, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut state.available)
            .into_iter()
            .partition(|entry| now.saturating_duration_since(entry.last_used) > idle_timeout);
        state.available = keep;
        state.total_discarded += expired.len() as u64;
        expired
    }

    async fn evict_idle(&self) -> usize {
        let expired = self.take_expired(Instant::now());
        let count = expired.len();
        if count > 0 {
            debug!("Pool: evicting {} idle connection(s)", count);
            self.notify.notify_waiters();
        }
        for entry in expired {
            close_entry(entry).await;
        }
        count
    }
}

async fn close_entry<S: CommandSession>(mut entry: ConnectionEntry<S>) {
    if let Err(err) = entry.session.close().await {
        debug!("Pool: error closing ssh-conn-{}: {}", entry.id, err);
    } else {
        debug!("Pool: closed ssh-conn-{}", entry.id);
    }
}

/// A connection lent out by [`ConnectionPool::acquire`].
///
/// Hand it back with [`ConnectionPool::release`] or
/// [`ConnectionPool::discard`]. A connection dropped without either is
/// treated as discarded.
pub struct PooledConnection<S: CommandSession> {
    entry: Option<ConnectionEntry<S>>,
    core: Weak<PoolCore<S>>,
}

impl<S: CommandSession> PooledConnection<S> {
    fn entry(&self) -> &ConnectionEntry<S> {
        match &self.entry {
            Some(entry) => entry,
            None => unreachable!("pooled connection used after it was returned"),
        }
    }

    fn entry_mut(&mut self) -> &mut ConnectionEntry<S> {
        match &mut self.entry {
            Some(entry) => entry,
            None => unreachable!("pooled connection used after it was returned"),
        }
    }

    fn into_entry(mut self) -> Option<ConnectionEntry<S>> {
        self.entry.take()
    }

    pub fn id(&self) -> u64 {
        self.entry().id
    }

    /// Pool-assigned name, e.g. `ssh-conn-3`.
    pub fn pool_id(&self) -> String {
        format!("ssh-conn-{}", self.entry().id)
    }

    /// Whether this connection's session already entered administrator mode.
    pub fn is_privileged(&self) -> bool {
        self.entry().privileged
    }

    /// Records a successful escalation; it survives release and reacquire.
    pub fn mark_privileged(&mut self) {
        self.entry_mut().privileged = true;
    }

    pub fn use_count(&self) -> u64 {
        self.entry().use_count
    }

    pub fn created_at(&self) -> Instant {
        self.entry().created_at
    }

    pub fn last_used(&self) -> Instant {
        self.entry().last_used
    }

    pub fn session(&self) -> &S {
        &self.entry().session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.entry_mut().session
    }
}

impl<S: CommandSession> fmt::Debug for PooledConnection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entry {
            Some(entry) => f
                .debug_struct("PooledConnection")
                .field("id", &entry.id)
                .field("privileged", &entry.privileged)
                .field("use_count", &entry.use_count)
                .finish(),
            None => f.write_str("PooledConnection(returned)"),
        }
    }
}

impl<S: CommandSession> Drop for PooledConnection<S> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            debug!(
                "Pool: ssh-conn-{} dropped without release, discarding",
                entry.id
            );
            if let Some(core) = self.core.upgrade() {
                core.forget(entry.id);
            }
        }
    }
}

/// Returns a reserved dial slot if the acquiring future is dropped or the
/// dial fails. Created right after the reservation, before any `.await`.
struct PendingSlot<'a, S: CommandSession> {
    core: &'a PoolCore<S>,
    armed: bool,
}

impl<S: CommandSession> Drop for PendingSlot<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            self.core.lock().pending -= 1;
            self.core.notify.notify_one();
        }
    }
}

enum AcquireStep<S> {
    Ready(ConnectionEntry<S>),
    Dial,
    Wait,
}

/// Bounded pool of sessions produced by a [`SessionFactory`].
pub struct ConnectionPool<F: SessionFactory> {
    factory: Arc<F>,
    core: Arc<PoolCore<F::Session>>,
}

impl<F: SessionFactory> Clone for ConnectionPool<F> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            core: self.core.clone(),
        }
    }
}

impl<F: SessionFactory> ConnectionPool<F> {
    /// Creates a pool and, when a Tokio runtime is running and the cleanup
    /// interval is non-zero, starts the idle sweep.
    pub fn new(factory: F, config: PoolConfig) -> Result<Self, ConnectError> {
        config.validate()?;
        let cleanup_interval = config.cleanup_interval();
        let core = Arc::new(PoolCore {
            config,
            state: Mutex::new(PoolState {
                available: Vec::new(),
                in_use: HashSet::new(),
                pending: 0,
                closed: false,
                total_created: 0,
                total_acquisitions: 0,
                total_discarded: 0,
                wait_count: 0,
            }),
            notify: Notify::new(),
            next_id: AtomicU64::new(1),
            sweeper: Mutex::new(None),
        });

        if let Some(interval) = cleanup_interval {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let task = handle.spawn(sweep_idle(Arc::downgrade(&core), interval));
                    *core.sweeper.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
                }
                Err(_) => debug!("Pool: no runtime, idle sweep disabled"),
            }
        }

        Ok(Self {
            factory: Arc::new(factory),
            core,
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.core.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Acquires a connection, waiting at most the configured acquire timeout.
    pub async fn acquire(&self) -> Result<PooledConnection<F::Session>, ConnectError> {
        self.acquire_timeout(self.core.config.acquire_timeout())
            .await
    }

    /// Acquires a connection, waiting at most `timeout` for a free slot.
    ///
    /// Dropping the returned future at any point leaves the pool consistent.
    pub async fn acquire_timeout(
        &self,
        timeout: Duration,
    ) -> Result<PooledConnection<F::Session>, ConnectError> {
        let core = &*self.core;
        let deadline = Instant::now() + timeout;
        let mut counted_wait = false;

        loop {
            let notified = core.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let now = Instant::now();
            let idle_timeout = core.config.idle_timeout();
            let mut expired = Vec::new();
            let step = {
                let mut state = core.lock();
                if state.closed {
                    return Err(ConnectError::PoolClosed);
                }

                let mut ready = None;
                while let Some(mut entry) = state.available.pop() {
                    if now.saturating_duration_since(entry.last_used) > idle_timeout {
                        expired.push(entry);
                        continue;
                    }
                    entry.last_used = now;
                    entry.use_count += 1;
                    ready = Some(entry);
                    break;
                }
                state.total_discarded += expired.len() as u64;

                match ready {
                    Some(entry) => {
                        state.in_use.insert(entry.id);
                        state.total_acquisitions += 1;
                        AcquireStep::Ready(entry)
                    }
                    None if state.occupied() < core.config.max_connections => {
                        state.pending += 1;
                        AcquireStep::Dial
                    }
                    None => {
                        if !counted_wait {
                            state.wait_count += 1;
                            counted_wait = true;
                        }
                        AcquireStep::Wait
                    }
                }
            };

            match step {
                AcquireStep::Ready(entry) => {
                    debug!(
                        "Pool: reusing ssh-conn-{} (uses: {})",
                        entry.id, entry.use_count
                    );
                    let conn = PooledConnection {
                        entry: Some(entry),
                        core: Arc::downgrade(&self.core),
                    };
                    for entry in expired {
                        close_entry(entry).await;
                    }
                    return Ok(conn);
                }
                AcquireStep::Dial => {
                    let slot = PendingSlot { core, armed: true };
                    for entry in expired {
                        close_entry(entry).await;
                    }
                    return self.dial(slot).await;
                }
                AcquireStep::Wait => {
                    for entry in expired {
                        close_entry(entry).await;
                    }
                    debug!("Pool: all connections busy, waiting");
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        debug!("Pool: acquire timed out after {:?}", timeout);
                        return Err(ConnectError::PoolTimeout(timeout));
                    }
                }
            }
        }
    }

    /// Dials a new session into the pending slot reserved by `slot`.
    async fn dial(
        &self,
        mut slot: PendingSlot<'_, F::Session>,
    ) -> Result<PooledConnection<F::Session>, ConnectError> {
        let core = &*self.core;
        let session = self.factory.connect().await?;

        let id = core.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let entry = ConnectionEntry {
            id,
            session,
            privileged: false,
            created_at: now,
            last_used: now,
            use_count: 1,
        };

        let closed = {
            let mut state = core.lock();
            state.pending -= 1;
            slot.armed = false;
            if state.closed {
                true
            } else {
                state.in_use.insert(id);
                state.total_created += 1;
                state.total_acquisitions += 1;
                debug!(
                    "Pool: created ssh-conn-{} ({}/{} occupied)",
                    id,
                    state.occupied(),
                    core.config.max_connections
                );
                false
            }
        };

        if closed {
            core.notify.notify_one();
            close_entry(entry).await;
            return Err(ConnectError::PoolClosed);
        }

        Ok(PooledConnection {
            entry: Some(entry),
            core: Arc::downgrade(&self.core),
        })
    }

    /// Returns a healthy connection to the pool, privileged flag included.
    ///
    /// The session is closed instead when the pool has been closed or the
    /// transport reports it is gone.
    pub async fn release(&self, conn: PooledConnection<F::Session>) {
        let Some(mut entry) = conn.into_entry() else {
            return;
        };
        let healthy = entry.session.is_connected();

        let to_close = {
            let mut state = self.core.lock();
            state.in_use.remove(&entry.id);
            if state.closed || !healthy {
                state.total_discarded += 1;
                Some(entry)
            } else {
                entry.last_used = Instant::now();
                debug!("Pool: released ssh-conn-{}", entry.id);
                state.available.push(entry);
                None
            }
        };
        self.core.notify.notify_one();

        if let Some(entry) = to_close {
            debug!("Pool: ssh-conn-{} not reusable, closing", entry.id);
            close_entry(entry).await;
        }
    }

    /// Removes a connection from the pool for good and closes its session.
    pub async fn discard(&self, conn: PooledConnection<F::Session>) {
        let Some(entry) = conn.into_entry() else {
            return;
        };
        {
            let mut state = self.core.lock();
            state.in_use.remove(&entry.id);
            state.total_discarded += 1;
        }
        self.core.notify.notify_one();
        debug!("Pool: discarding ssh-conn-{}", entry.id);
        close_entry(entry).await;
    }

    /// Runs one idle sweep immediately and returns how many connections it closed.
    pub async fn evict_idle(&self) -> usize {
        self.core.evict_idle().await
    }

    /// Closes the pool. Idle sessions are closed now, lent ones when they
    /// come back. Waiting and future acquires fail with [`ConnectError::PoolClosed`].
    pub async fn close(&self) {
        let drained = {
            let mut state = self.core.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.available)
        };
        if let Some(task) = self
            .core
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        self.core.notify.notify_waiters();

        debug!("Pool: closing, {} idle connection(s)", drained.len());
        for entry in drained {
            close_entry(entry).await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.core.lock().closed
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.core.lock();
        PoolStats {
            available: state.available.len(),
            in_use: state.in_use.len(),
            pending: state.pending,
            max_connections: self.core.config.max_connections,
            total_created: state.total_created,
            total_acquisitions: state.total_acquisitions,
            total_discarded: state.total_discarded,
            wait_count: state.wait_count,
            closed: state.closed,
        }
    }
}

async fn sweep_idle<S: CommandSession>(core: Weak<PoolCore<S>>, interval: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    loop {
        ticker.tick().await;
        let Some(core) = core.upgrade() else {
            break;
        };
        if core.lock().closed {
            break;
        }
        core.evict_idle().await;
    }
}
