//! Guarded byte buffer device
//!
//! A fixed-capacity buffer behind one lock, usable by one session at a time:
//! - `open` never blocks: it fails with `Busy` if the lock is held or a
//!   session is already open
//! - `read` and `write` wait for the lock, and the wait can be interrupted
//! - `close` waits for the lock and always succeeds
//!
//! Each write replaces the whole payload (last write wins). Each session
//! reads from its own cursor. The payload survives close and reopen.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::DeviceConfig;
use crate::error::DeviceError;
use crate::ids::{DeviceNumber, Handle, IdGen};
use crate::io::{FixedBuffer, UserSink, UserSource};
use crate::lock::DeviceLock;
use crate::signal::{Interrupter, SignalQueue};

/// Everything the device lock guards
struct DeviceState {
    buffer: FixedBuffer,
    open_count: usize,
    registered: bool,
}

/// Point-in-time view of the guarded state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub open_count: usize,
    pub valid_len: usize,
    pub capacity: usize,
    pub registered: bool,
    pub payload: Vec<u8>,
}

/// The device: buffer, valid length and open count under one lock
///
/// Constructed explicitly and shared through `Arc`; there is no global
/// instance. Usually created by `DeviceRegistry::register`.
pub struct Device {
    name: String,
    number: DeviceNumber,
    lock: DeviceLock<DeviceState>,
    signals: SignalQueue,
    ids: IdGen,
}

impl Device {
    /// Create a registered device. The config is expected to be valid.
    #[must_use]
    pub fn new(config: &DeviceConfig, number: DeviceNumber) -> Arc<Self> {
        Arc::new(Self {
            name: config.name.clone(),
            number,
            lock: DeviceLock::new(DeviceState {
                buffer: FixedBuffer::new(config.capacity, config.terminator),
                open_count: 0,
                registered: true,
            }),
            signals: SignalQueue::new(),
            ids: IdGen::new(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn number(&self) -> DeviceNumber {
        self.number
    }

    /// Open a session
    ///
    /// Takes the lock without waiting, so it never queues behind a read or
    /// a write in progress.
    ///
    /// # Errors
    /// - `Busy` if the lock is held or a session is already open
    /// - `NoDevice` if the device was deregistered
    pub fn open(self: &Arc<Self>) -> Result<Session, DeviceError> {
        let Some(mut state) = self.lock.try_acquire() else {
            log::warn!("{}: device is busy, cannot open", self.name);
            return Err(DeviceError::Busy);
        };

        if !state.registered {
            log::warn!("{}: device is gone, cannot open", self.name);
            return Err(DeviceError::NoDevice);
        }

        if state.open_count > 0 {
            log::warn!("{}: device already opened by another session", self.name);
            return Err(DeviceError::Busy);
        }

        state.open_count += 1;
        let handle = self.ids.next_handle();
        self.signals.register(handle, &self.name);
        drop(state);

        log::info!("{}: device opened by session {handle}", self.name);
        Ok(Session {
            device: Arc::clone(self),
            handle,
            pos: AtomicUsize::new(0),
            closed: false,
        })
    }

    async fn release(&self, handle: Handle) {
        let mut state = self.lock.acquire().await;
        self.release_locked(&mut state, handle);
    }

    /// Close bookkeeping; the caller holds the device lock
    fn release_locked(&self, state: &mut DeviceState, handle: Handle) {
        if state.open_count == 0 {
            log::warn!("{}: close of {handle} without a matching open", self.name);
        }
        state.open_count = state.open_count.saturating_sub(1);
        self.signals.unregister(handle);

        log::info!("{}: device closed by session {handle}", self.name);
    }

    async fn read_at<S: UserSink + ?Sized>(
        &self,
        handle: Handle,
        cursor: &AtomicUsize,
        max_len: usize,
        sink: &mut S,
    ) -> Result<usize, DeviceError> {
        let state = self
            .lock
            .acquire_interruptible(&self.signals, handle)
            .await
            .inspect_err(|_| log::warn!("{}: read by {handle} interrupted", self.name))?;

        // The cursor only moves under the device lock
        let pos = cursor.load(Ordering::Acquire);
        if pos >= state.buffer.valid_len() {
            log::debug!("{}: read by {handle} at {pos}: end of data", self.name);
            return Ok(0);
        }

        let data = state.buffer.slice_from(pos, max_len);

        if let Err(fault) = sink.copy_to_user(data) {
            log::warn!("{}: read by {handle} failed: {fault}", self.name);
            return Err(DeviceError::FaultyDestination);
        }

        let n = data.len();
        cursor.store(pos + n, Ordering::Release);
        drop(state);

        log::debug!("{}: read {n} bytes", self.name);
        Ok(n)
    }

    async fn write_from<S: UserSource + ?Sized>(
        &self,
        handle: Handle,
        src: &mut S,
    ) -> Result<usize, DeviceError> {
        let mut state = self
            .lock
            .acquire_interruptible(&self.signals, handle)
            .await
            .inspect_err(|_| log::warn!("{}: write by {handle} interrupted", self.name))?;

        let requested = src.len();
        let n = match state
            .buffer
            .replace_with(requested, |dst| src.copy_from_user(dst))
        {
            Ok(n) => n,
            Err(fault) => {
                log::warn!("{}: write by {handle} failed: {fault}", self.name);
                return Err(DeviceError::FaultySource);
            }
        };

        if n < requested {
            log::debug!(
                "{}: write of {requested} bytes truncated to {n}",
                self.name
            );
        }
        log::debug!("{}: written {n} bytes", self.name);
        log::trace!(
            "{}: payload: {}",
            self.name,
            String::from_utf8_lossy(state.buffer.payload())
        );
        drop(state);

        Ok(n)
    }

    /// Number of open sessions, 0 or 1
    pub async fn open_count(&self) -> usize {
        self.lock.acquire().await.open_count
    }

    /// Number of readable payload bytes
    pub async fn valid_len(&self) -> usize {
        self.lock.acquire().await.buffer.valid_len()
    }

    /// Total buffer size, terminator slot included
    pub async fn capacity(&self) -> usize {
        self.lock.acquire().await.buffer.capacity()
    }

    pub async fn is_registered(&self) -> bool {
        self.lock.acquire().await.registered
    }

    pub async fn snapshot(&self) -> Snapshot {
        let state = self.lock.acquire().await;
        Snapshot {
            open_count: state.open_count,
            valid_len: state.buffer.valid_len(),
            capacity: state.buffer.capacity(),
            registered: state.registered,
            payload: state.buffer.payload().to_vec(),
        }
    }

    /// Mark the device as gone unless a session is open
    ///
    /// Returns `false` if a session is open; the device stays registered.
    pub(crate) async fn deregister(&self) -> bool {
        let mut state = self.lock.acquire().await;
        if state.open_count > 0 {
            return false;
        }
        state.registered = false;
        true
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device(name={}, number={}, lock={:?})",
            self.name, self.number, self.lock
        )
    }
}

/// One open session: the capability to use the device
///
/// Created by `Device::open`, ended by `close`. Holds the read cursor.
/// A session dropped without `close` is closed on its behalf.
///
/// Like a file descriptor shared by threads, a session can be used from
/// several tasks at once (e.g. through `Arc<Session>`); the device lock
/// serializes their reads and writes.
pub struct Session {
    device: Arc<Device>,
    handle: Handle,
    pos: AtomicUsize,
    closed: bool,
}

impl Session {
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[must_use]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Current read cursor
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos.load(Ordering::Acquire)
    }

    /// Move the read cursor; positions past the payload read as end of data
    pub fn seek(&self, pos: usize) {
        self.pos.store(pos, Ordering::Release);
    }

    /// Capability to interrupt this session's lock waits from elsewhere
    #[must_use]
    pub fn interrupter(&self) -> Interrupter {
        Interrupter::new(self.device.signals.clone(), self.handle)
    }

    /// Read up to `buf.len()` bytes at the cursor and advance it
    ///
    /// Returns 0 at end of data.
    ///
    /// # Errors
    /// - `Interrupted` if a signal aborted the wait for the lock
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        let max_len = buf.len();
        self.device
            .read_at(self.handle, &self.pos, max_len, buf)
            .await
    }

    /// Read up to `max_len` bytes at the cursor into `sink` and advance it
    ///
    /// The cursor does not move if the copy fails.
    ///
    /// # Errors
    /// - `Interrupted` if a signal aborted the wait for the lock
    /// - `FaultyDestination` if `sink` rejected the bytes
    pub async fn read_to<S: UserSink + ?Sized>(
        &self,
        max_len: usize,
        sink: &mut S,
    ) -> Result<usize, DeviceError> {
        self.device
            .read_at(self.handle, &self.pos, max_len, sink)
            .await
    }

    /// Read up to `max_len` bytes at the cursor; empty at end of data
    ///
    /// # Errors
    /// - `Interrupted` if a signal aborted the wait for the lock
    pub async fn read_vec(&self, max_len: usize) -> Result<Vec<u8>, DeviceError> {
        let mut out = Vec::new();
        self.read_to(max_len, &mut out).await?;
        Ok(out)
    }

    /// Replace the payload with `data`, truncated to the usable capacity
    ///
    /// Returns the number of bytes stored.
    ///
    /// # Errors
    /// - `Interrupted` if a signal aborted the wait for the lock
    pub async fn write(&self, data: &[u8]) -> Result<usize, DeviceError> {
        let mut src = data;
        self.device.write_from(self.handle, &mut src).await
    }

    /// Replace the payload with bytes from `src`, truncated to the usable capacity
    ///
    /// # Errors
    /// - `Interrupted` if a signal aborted the wait for the lock
    /// - `FaultySource` if `src` could not provide the bytes; the payload is unchanged
    pub async fn write_from<S: UserSource + ?Sized>(&self, src: &mut S) -> Result<usize, DeviceError> {
        self.device.write_from(self.handle, src).await
    }

    /// End the session. Waits for the lock; cannot fail.
    pub async fn close(mut self) {
        self.closed = true;
        self.device.release(self.handle).await;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Session(handle={:?}, pos={}, closed={}, device={})",
            self.handle,
            self.position(),
            self.closed,
            self.device.name
        )
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        log::warn!("Session dropped without close: {self:?}");

        let device = Arc::clone(&self.device);
        let handle = self.handle;
        if let Some(mut state) = device.lock.try_acquire() {
            device.release_locked(&mut state, handle);
            return;
        }

        // Lock is contended: wait for it off the dropping thread if possible.
        // A runtime that shuts down before the task runs loses the release.
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { device.release(handle).await });
            }
            Err(_) => futures::executor::block_on(device.release(handle)),
        }
    }
}

impl embedded_io_async::ErrorType for Session {
    type Error = DeviceError;
}

impl embedded_io_async::Read for Session {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Session::read(self, buf).await
    }
}

/// Each call replaces the payload, so `write_all` of more than the usable
/// capacity ends with the tail of the data in the buffer.
impl embedded_io_async::Write for Session {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Session::write(self, buf).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
