//! Device configuration
//!
//! Can be built in code or read from a JSON object such as
//! `{"name": "mymutexdev", "capacity": 256, "terminator": 0}`.
//! Missing keys take the defaults.

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_NAME: &str = "mymutexdev";
pub const DEFAULT_CAPACITY: usize = 256;
pub const DEFAULT_TERMINATOR: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Name of the endpoint, as in `/dev/<name>`
    pub name: String,
    /// Total buffer size, including the terminator slot
    pub capacity: usize,
    /// Byte stored right after the payload
    pub terminator: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            capacity: DEFAULT_CAPACITY,
            terminator: DEFAULT_TERMINATOR,
        }
    }
}

impl DeviceConfig {
    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_terminator(mut self, terminator: u8) -> Self {
        self.terminator = terminator;
        self
    }

    /// Largest payload a single write can store
    #[must_use]
    pub fn usable_capacity(&self) -> usize {
        self.capacity.saturating_sub(1)
    }

    /// Parse a JSON object. The result is not validated.
    ///
    /// # Errors
    /// Malformed JSON or unknown keys.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// # Errors
    /// - `InvalidCapacity` if capacity is 0
    /// - `InvalidName` if the name is empty or contains `/`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        if self.name.is_empty() || self.name.contains('/') {
            return Err(ConfigError::InvalidName(self.name.clone()));
        }
        Ok(())
    }
}
