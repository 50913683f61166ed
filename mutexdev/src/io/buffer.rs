//! Fixed-capacity payload buffer
//!
//! Holds the bytes of the last successful write followed by a terminator.
//! The buffer does no locking of its own: the device keeps it inside its
//! critical section.

use std::fmt;

/// Fixed-capacity buffer with a valid-length counter
///
/// Invariants:
/// - `valid_len <= capacity - 1` (one slot is kept for the terminator)
/// - `bytes[valid_len] == terminator` once anything has been written
///
/// # Example
///
/// ```
/// use mutexdev::io::FixedBuffer;
///
/// let mut buffer = FixedBuffer::new(8, 0);
/// let n = buffer
///     .replace_with(5, |dst| {
///         dst.copy_from_slice(b"hello");
///         Ok::<(), ()>(())
///     })
///     .unwrap();
/// assert_eq!(n, 5);
/// assert_eq!(buffer.slice_from(0, 10), b"hello");
/// ```
pub struct FixedBuffer {
    bytes: Box<[u8]>,
    valid_len: usize,
    terminator: u8,
}

impl FixedBuffer {
    /// Create a zero-filled buffer. A capacity of 0 is raised to 1.
    #[must_use]
    pub fn new(capacity: usize, terminator: u8) -> Self {
        Self {
            bytes: vec![0u8; capacity.max(1)].into_boxed_slice(),
            valid_len: 0,
            terminator,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Largest payload that fits next to the terminator
    #[must_use]
    pub fn usable_capacity(&self) -> usize {
        self.bytes.len() - 1
    }

    #[must_use]
    pub fn valid_len(&self) -> usize {
        self.valid_len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.valid_len == 0
    }

    #[must_use]
    pub fn terminator(&self) -> u8 {
        self.terminator
    }

    /// The whole backing storage, terminator and stale bytes included
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The readable payload
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        #[allow(clippy::indexing_slicing)]
        &self.bytes[..self.valid_len]
    }

    /// Up to `max` payload bytes starting at `cursor`
    ///
    /// Empty when `cursor` is at or past the end of the payload.
    #[must_use]
    pub fn slice_from(&self, cursor: usize, max: usize) -> &[u8] {
        if cursor >= self.valid_len {
            return &[];
        }
        let len = max.min(self.valid_len - cursor);
        // cursor < valid_len and len <= valid_len - cursor, so the range is in bounds
        #[allow(clippy::indexing_slicing)]
        &self.bytes[cursor..cursor + len]
    }

    /// Replace the payload with `min(len, usable_capacity)` bytes produced by `fill`
    ///
    /// `fill` writes into a staging area of exactly that size. The payload
    /// and valid length change only if `fill` succeeds, so a failed fill
    /// leaves the previous contents intact.
    ///
    /// Returns the number of bytes stored.
    ///
    /// # Errors
    /// Whatever `fill` returns.
    pub fn replace_with<E, F>(&mut self, len: usize, fill: F) -> Result<usize, E>
    where
        F: FnOnce(&mut [u8]) -> Result<(), E>,
    {
        let len = len.min(self.usable_capacity());
        let mut staging = vec![0u8; len];
        fill(&mut staging)?;

        #[allow(clippy::indexing_slicing)]
        {
            self.bytes[..len].copy_from_slice(&staging);
            self.bytes[len] = self.terminator;
        }
        self.valid_len = len;
        Ok(len)
    }
}

impl fmt::Debug for FixedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FixedBuffer(capacity={}, valid_len={}, terminator={:#04x})",
            self.bytes.len(),
            self.valid_len,
            self.terminator
        )
    }
}
