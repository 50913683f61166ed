//! Caller memory
//!
//! A read copies device bytes into a `UserSink`; a write copies bytes out of
//! a `UserSource`. Either copy may fail, like `copy_to_user` and
//! `copy_from_user` do for a bad user address. Plain slices and vectors
//! never fail; the `std::io` adapters fail when the underlying stream does.

use std::io;

use crate::error::TransferFault;

/// Destination of a read
pub trait UserSink {
    /// Copy all of `data` into the destination
    ///
    /// # Errors
    /// The destination cannot take `data`.
    fn copy_to_user(&mut self, data: &[u8]) -> Result<(), TransferFault>;
}

/// Source of a write
pub trait UserSource {
    /// Number of bytes the caller offers
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `dst` completely from the source; `dst.len() <= self.len()`
    ///
    /// # Errors
    /// The source cannot provide the bytes.
    fn copy_from_user(&mut self, dst: &mut [u8]) -> Result<(), TransferFault>;
}

impl UserSink for [u8] {
    fn copy_to_user(&mut self, data: &[u8]) -> Result<(), TransferFault> {
        let dst = self
            .get_mut(..data.len())
            .ok_or_else(|| TransferFault::new("destination slice too short"))?;
        dst.copy_from_slice(data);
        Ok(())
    }
}

impl UserSink for Vec<u8> {
    fn copy_to_user(&mut self, data: &[u8]) -> Result<(), TransferFault> {
        self.extend_from_slice(data);
        Ok(())
    }
}

/// Reads from the front of the slice without consuming it
impl UserSource for &[u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_from_user(&mut self, dst: &mut [u8]) -> Result<(), TransferFault> {
        let src = self
            .get(..dst.len())
            .ok_or_else(|| TransferFault::new("source slice too short"))?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

/// Read destination backed by a `std::io::Write`
///
/// The write runs while the device lock is held and blocks the calling
/// thread. Slow writers belong on a blocking thread, e.g. inside
/// `tokio::task::spawn_blocking` with `futures::executor::block_on`.
pub struct IoSink<W: io::Write> {
    inner: W,
}

impl<W: io::Write> IoSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> UserSink for IoSink<W> {
    fn copy_to_user(&mut self, data: &[u8]) -> Result<(), TransferFault> {
        self.inner
            .write_all(data)
            .map_err(|e| TransferFault::new(e.to_string()))
    }
}

/// Write source backed by a `std::io::Read` that promises `len` bytes
///
/// Like `IoSink`, the read blocks the calling thread while the device lock
/// is held; drive slow readers from `spawn_blocking`.
pub struct IoSource<R: io::Read> {
    inner: R,
    len: usize,
}

impl<R: io::Read> IoSource<R> {
    pub fn new(inner: R, len: usize) -> Self {
        Self { inner, len }
    }
}

impl<R: io::Read> UserSource for IoSource<R> {
    fn len(&self) -> usize {
        self.len
    }

    fn copy_from_user(&mut self, dst: &mut [u8]) -> Result<(), TransferFault> {
        self.inner
            .read_exact(dst)
            .map_err(|e| TransferFault::new(e.to_string()))
    }
}
