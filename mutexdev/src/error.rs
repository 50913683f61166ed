//! Error types for device, registry and configuration operations

use std::io;

/// Failure of a single device operation
///
/// End of data is not an error: `read` returns `Ok(0)` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// Device already open, or its lock was held when `open` was attempted
    #[error("device is busy")]
    Busy,

    /// Lock wait aborted by a signal; the operation had no effect
    #[error("interrupted while waiting for the device")]
    Interrupted,

    /// Copying into the caller's destination failed
    #[error("bad destination address")]
    FaultyDestination,

    /// Copying from the caller's source failed
    #[error("bad source address")]
    FaultySource,

    /// The device was deregistered
    #[error("no such device")]
    NoDevice,
}

impl DeviceError {
    pub const EINTR: i32 = 4;
    pub const EFAULT: i32 = 14;
    pub const EBUSY: i32 = 16;
    pub const ENODEV: i32 = 19;

    /// POSIX errno for this error
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::Busy => Self::EBUSY,
            Self::Interrupted => Self::EINTR,
            Self::FaultyDestination | Self::FaultySource => Self::EFAULT,
            Self::NoDevice => Self::ENODEV,
        }
    }
}

impl embedded_io::Error for DeviceError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Self::Busy => embedded_io::ErrorKind::Other,
            Self::Interrupted => embedded_io::ErrorKind::Interrupted,
            Self::FaultyDestination | Self::FaultySource => embedded_io::ErrorKind::InvalidInput,
            Self::NoDevice => embedded_io::ErrorKind::NotFound,
        }
    }
}

impl From<DeviceError> for io::Error {
    fn from(e: DeviceError) -> Self {
        let kind = match e {
            DeviceError::Busy => io::ErrorKind::ResourceBusy,
            DeviceError::Interrupted => io::ErrorKind::Interrupted,
            DeviceError::FaultyDestination | DeviceError::FaultySource => {
                io::ErrorKind::InvalidInput
            }
            DeviceError::NoDevice => io::ErrorKind::NotFound,
        };
        io::Error::new(kind, e)
    }
}

/// The caller-provided memory could not be copied
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transfer fault: {reason}")]
pub struct TransferFault {
    reason: String,
}

impl TransferFault {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Invalid device configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("capacity must be at least 1 byte")]
    InvalidCapacity,

    #[error("invalid device name: {0:?}")]
    InvalidName(String),

    #[error("failed to parse device config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure of a registry operation
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("device {0} is already registered")]
    AlreadyRegistered(String),

    #[error("device {0} is not registered")]
    NotRegistered(String),

    #[error("device {0} still has an open session")]
    InUse(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::Error as _;

    #[test]
    fn test_errno_values() {
        assert_eq!(DeviceError::Busy.errno(), 16);
        assert_eq!(DeviceError::Interrupted.errno(), 4);
        assert_eq!(DeviceError::FaultyDestination.errno(), 14);
        assert_eq!(DeviceError::FaultySource.errno(), 14);
        assert_eq!(DeviceError::NoDevice.errno(), 19);
    }

    #[test]
    fn test_embedded_io_kind() {
        assert_eq!(
            DeviceError::Interrupted.kind(),
            embedded_io::ErrorKind::Interrupted
        );
        assert_eq!(
            DeviceError::FaultySource.kind(),
            embedded_io::ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_into_io_error() {
        let e: io::Error = DeviceError::Interrupted.into();
        assert_eq!(e.kind(), io::ErrorKind::Interrupted);
        let e: io::Error = DeviceError::Busy.into();
        assert_eq!(e.kind(), io::ErrorKind::ResourceBusy);
    }

    #[test]
    fn test_transfer_fault_display() {
        let fault = TransferFault::new("bad address");
        assert_eq!(fault.reason(), "bad address");
        assert_eq!(fault.to_string(), "transfer fault: bad address");
        let _: &dyn std::error::Error = &fault;
    }
}
