//! Signal Queue
//!
//! Per-session interruption signals, used to abort a blocked wait for the
//! device lock.
//!
//! # 1) Waiting for a signal
//!
//! A session about to block does the following:
//!
//! 10. Session: check whether a signal is pending
//! 20. Session: register itself as a waiter
//! 30. Session: wait for either the device lock or the signal
//!
//! 40. Interrupter: call `raise`
//! 50. Queue: mark the signal pending, take the waiters out of the list
//! 60. Queue: wake the waiters
//!
//! The interrupter runs in another task or thread, so step 50 can happen
//! between steps 10 and 20. The signal would then be missed and the session
//! would sleep until the lock is free. To avoid this, steps 10-20 are done
//! under the queue lock:
//!
//! ```ignore
//! let lock = queue.get_lock();
//! let wakeup = queue.wait_async(handle, debug_hint, lock);
//! // lock is consumed by wait_async and released before awaiting
//! ```
//!
//! `wait_async` resolves at once when a signal is already pending.
//!
//! # 2) Consuming a signal
//!
//! A signal stays pending in the queue until someone calls `take_pending`.
//! The device lock consumes it when it interrupts a wait, and discards it
//! when the lock was obtained anyway, so a signal raised while the session
//! is idle never aborts a later operation.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::ids::Handle;

/// Signal number, as in POSIX
pub type Signo = i32;

pub const SIGINT: Signo = 2;

/// A session waiting for a signal
struct WaitingClient {
    sender: tokio::sync::oneshot::Sender<Signo>,
    debug_hint: String,
}

impl std::fmt::Debug for WaitingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitingClient")
            .field("debug_hint", &self.debug_hint)
            .finish_non_exhaustive()
    }
}

pub struct InnerState {
    registered: HashMap<Handle, String>,
    pending: HashMap<Handle, Signo>,
    waiting_clients: HashMap<Handle, Vec<WaitingClient>>,
}

impl InnerState {
    fn new() -> Self {
        Self {
            registered: HashMap::new(),
            pending: HashMap::new(),
            waiting_clients: HashMap::new(),
        }
    }

    /// Drop the pending signal of a session while holding the queue lock
    pub fn discard_pending(&mut self, handle: Handle) -> Option<Signo> {
        self.pending.remove(&handle)
    }
}

/// Thread-safe registry of pending signals, keyed by session handle
#[derive(Clone)]
pub struct SignalQueue {
    inner: Arc<Mutex<InnerState>>,
}

impl SignalQueue {
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(InnerState::new())),
        }
    }

    /// Get the lock for atomic check + register operations
    pub fn get_lock(&self) -> parking_lot::MutexGuard<'_, InnerState> {
        self.inner.lock()
    }

    /// Start accepting signals for a session
    pub fn register(&self, handle: Handle, debug_hint: &str) {
        let mut state = self.inner.lock();
        if let Some(old_hint) = state.registered.insert(handle, debug_hint.to_string()) {
            log::warn!("signals.register: handle {handle:?} already registered (was: '{old_hint}')");
        }
    }

    /// Stop accepting signals for a session
    ///
    /// Drops any pending signal. Waiters are released without a signal.
    pub fn unregister(&self, handle: Handle) {
        let mut state = self.inner.lock();
        if state.registered.remove(&handle).is_none() {
            log::warn!("signals.unregister: handle {handle:?} not registered");
        }
        state.pending.remove(&handle);
        let waiters = state.waiting_clients.remove(&handle).unwrap_or_default();
        drop(state);

        log::debug!(
            "signals.unregister: handle {handle:?}, released waiters: {}",
            waiters.len()
        );
    }

    #[must_use]
    pub fn is_registered(&self, handle: Handle) -> bool {
        self.inner.lock().registered.contains_key(&handle)
    }

    /// Raise a signal for a session and wake its waiters
    ///
    /// Returns `false` if the session is not registered; the signal is dropped.
    pub fn raise(&self, handle: Handle, signo: Signo) -> bool {
        let mut state = self.inner.lock();

        if !state.registered.contains_key(&handle) {
            log::warn!("signals.raise: handle {handle:?} not registered, signal {signo} dropped");
            return false;
        }

        state.pending.insert(handle, signo);
        let waiters = state.waiting_clients.remove(&handle).unwrap_or_default();

        log::debug!(
            "signals.raise: handle {handle:?}, signo={signo}, waiters: {}",
            waiters.len()
        );

        for waiter in waiters {
            if waiter.sender.send(signo).is_err() {
                log::debug!(
                    "signals.raise: receiver dropped for handle {:?} (hint: {})",
                    handle,
                    waiter.debug_hint
                );
            }
        }

        drop(state);
        true
    }

    #[must_use]
    pub fn is_pending(&self, handle: Handle) -> bool {
        self.inner.lock().pending.contains_key(&handle)
    }

    /// Consume the pending signal of a session, if any
    pub fn take_pending(&self, handle: Handle) -> Option<Signo> {
        self.inner.lock().pending.remove(&handle)
    }

    /// Wait for a signal on the handle
    ///
    /// Precondition: The caller should acquire the lock before calling this method.
    /// Post-condition: The lock is released after the method returns.
    ///
    /// The future resolves to:
    /// - `Some(signo)` at once if a signal is already pending, or when one is raised
    /// - `None` at once if the handle is not registered, or when it gets unregistered
    ///
    /// The signal is not consumed; see `take_pending`.
    pub fn wait_async(
        &self,
        handle: Handle,
        debug_hint: &str,
        mut lock: parking_lot::MutexGuard<'_, InnerState>,
    ) -> impl std::future::Future<Output = Option<Signo>> + Send {
        let (tx, rx) = tokio::sync::oneshot::channel();

        let registered = lock.registered.contains_key(&handle);
        let pending = lock.pending.get(&handle).copied();

        if !registered {
            // Dropping the sender resolves the receiver with an error
            drop(lock);
            drop(tx);
        } else if let Some(signo) = pending {
            drop(lock);
            let _ = tx.send(signo);
        } else {
            let clients = lock.waiting_clients.entry(handle).or_default();
            // Waits that ended by getting the device lock leave closed senders behind
            clients.retain(|client| !client.sender.is_closed());
            clients.push(WaitingClient {
                sender: tx,
                debug_hint: debug_hint.to_string(),
            });

            // Release lock before awaiting
            drop(lock);
        }

        async move { rx.await.ok() }
    }
}

/// Capability to interrupt one session from another task or thread
#[derive(Clone)]
pub struct Interrupter {
    queue: SignalQueue,
    handle: Handle,
}

impl Interrupter {
    pub(crate) fn new(queue: SignalQueue, handle: Handle) -> Self {
        Self { queue, handle }
    }

    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Raise `SIGINT` for the session
    ///
    /// Returns `false` if the session is already closed.
    pub fn interrupt(&self) -> bool {
        self.raise(SIGINT)
    }

    pub fn raise(&self, signo: Signo) -> bool {
        self.queue.raise(self.handle, signo)
    }
}

impl std::fmt::Debug for Interrupter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interrupter(handle={:?})", self.handle)
    }
}
