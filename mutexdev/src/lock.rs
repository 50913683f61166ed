//! The device lock
//!
//! One mutual-exclusion primitive, three ways to take it:
//!
//! | mode                     | blocks | can be interrupted | used by      |
//! |--------------------------|--------|--------------------|--------------|
//! | `try_acquire`            | no     | -                  | open         |
//! | `acquire`                | yes    | no                 | close        |
//! | `acquire_interruptible`  | yes    | yes                | read, write  |
//!
//! The lock is not reentrant: a task must not take it again while holding
//! its guard.

use tokio::sync::{Mutex, MutexGuard};

use crate::error::DeviceError;
use crate::ids::Handle;
use crate::signal::SignalQueue;

pub struct DeviceLock<T> {
    inner: Mutex<T>,
}

impl<T> DeviceLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Take the lock only if nobody holds it
    pub fn try_acquire(&self) -> Option<MutexGuard<'_, T>> {
        self.inner.try_lock().ok()
    }

    /// Wait for the lock for as long as it takes
    pub async fn acquire(&self) -> MutexGuard<'_, T> {
        self.inner.lock().await
    }

    /// Wait for the lock unless a signal arrives for `handle`
    ///
    /// A free lock is taken at once, without looking at signals. Only a
    /// signal raised while the wait is in progress aborts it; one left
    /// pending from before the wait is discarded. On return no signal is
    /// pending for `handle`. If `handle` is not registered with `signals`,
    /// the wait cannot be interrupted.
    ///
    /// Waiters are served in FIFO order; an aborted waiter leaves the queue
    /// without taking the lock.
    ///
    /// # Errors
    /// `DeviceError::Interrupted` if a signal aborted the wait.
    pub async fn acquire_interruptible(
        &self,
        signals: &SignalQueue,
        handle: Handle,
    ) -> Result<MutexGuard<'_, T>, DeviceError> {
        if let Ok(guard) = self.inner.try_lock() {
            discard_stale(signals, handle);
            return Ok(guard);
        }

        let wakeup = {
            let mut queue_lock = signals.get_lock();
            if let Some(signo) = queue_lock.discard_pending(handle) {
                log::debug!("stale signal {signo} of {handle:?} discarded");
            }
            signals.wait_async(handle, "device lock", queue_lock)
        };

        let guard = tokio::select! {
            biased;
            signo = wakeup => match signo {
                Some(signo) => {
                    signals.take_pending(handle);
                    log::debug!("lock wait of {handle:?} interrupted by signal {signo}");
                    return Err(DeviceError::Interrupted);
                }
                None => self.inner.lock().await,
            },
            guard = self.inner.lock() => guard,
        };
        // A signal that lost the race against the lock
        discard_stale(signals, handle);
        Ok(guard)
    }
}

fn discard_stale(signals: &SignalQueue, handle: Handle) {
    if let Some(signo) = signals.take_pending(handle) {
        log::debug!("signal {signo} of {handle:?} arrived without a wait, discarded");
    }
}

impl<T> std::fmt::Debug for DeviceLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = if self.inner.try_lock().is_ok() {
            "free"
        } else {
            "held"
        };
        write!(f, "DeviceLock({state})")
    }
}
