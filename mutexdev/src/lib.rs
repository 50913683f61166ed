pub mod config;
pub mod device;
pub mod error;
pub mod ids;
pub mod io;
pub mod lock;
pub mod registry;
pub mod signal;

// Re-export device types for convenience
pub use device::{Device, Session, Snapshot};

// Re-export error types for convenience
pub use error::{ConfigError, DeviceError, RegistryError, TransferFault};

pub use config::DeviceConfig;
pub use ids::{DeviceNumber, Handle, IdGen};
pub use io::{FixedBuffer, IoSink, IoSource, UserSink, UserSource};
pub use lock::DeviceLock;
pub use registry::DeviceRegistry;
pub use signal::{Interrupter, SignalQueue, Signo, SIGINT};
