//! Identifiers handed out by the device layer
//!
//! - `Handle` names one open session (what a file descriptor would be)
//! - `DeviceNumber` names one registered device (major/minor pair)

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Identity of one open session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    id: u64,
}

impl Handle {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.id)
    }
}

/// Major/minor pair identifying a registered device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceNumber {
    major: u32,
    minor: u32,
}

impl DeviceNumber {
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    #[must_use]
    pub fn major(&self) -> u32 {
        self.major
    }

    #[must_use]
    pub fn minor(&self) -> u32 {
        self.minor
    }
}

impl fmt::Display for DeviceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// Thread-safe session handle generator
#[derive(Debug)]
pub struct IdGen {
    next_id: AtomicU64,
}

impl IdGen {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Get the next unique session handle
    pub fn next_handle(&self) -> Handle {
        Handle::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGen {
    fn default() -> Self {
        Self::new()
    }
}

/// Allocator for major numbers, one per registered device
///
/// Starts in the dynamic range, like `alloc_chrdev_region` does on Linux.
#[derive(Debug)]
pub struct MajorAlloc {
    next_major: AtomicU32,
}

pub const FIRST_DYNAMIC_MAJOR: u32 = 240;

impl MajorAlloc {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_major: AtomicU32::new(FIRST_DYNAMIC_MAJOR),
        }
    }

    /// Allocate a fresh device number with minor 0
    pub fn allocate(&self) -> DeviceNumber {
        DeviceNumber::new(self.next_major.fetch_add(1, Ordering::Relaxed), 0)
    }
}

impl Default for MajorAlloc {
    fn default() -> Self {
        Self::new()
    }
}
