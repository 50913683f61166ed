//! DeviceRegistry - named devices and their numbers
//!
//! Registering a device is what loading a driver module does: allocate a
//! device number, create the named endpoint. Unregistering tears it down,
//! but only once no session is open.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::DeviceConfig;
use crate::device::Device;
use crate::error::RegistryError;
use crate::ids::MajorAlloc;

/// Table of registered devices, looked up by name
///
/// Uses interior mutability via `Mutex` to allow shared access through `Arc<DeviceRegistry>`.
pub struct DeviceRegistry {
    devices: Mutex<Vec<Arc<Device>>>,
    majors: MajorAlloc,
}

impl DeviceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
            majors: MajorAlloc::new(),
        }
    }

    /// Create and register a device
    ///
    /// # Errors
    /// - `Config` if the configuration is invalid
    /// - `AlreadyRegistered` if a device with the same name exists
    pub fn register(&self, config: &DeviceConfig) -> Result<Arc<Device>, RegistryError> {
        config.validate().inspect_err(|e| {
            log::error!("{}: failed to register device: {e}", config.name);
        })?;

        let mut devices = self.devices.lock();
        if devices.iter().any(|d| d.name() == config.name) {
            log::error!("{}: device name already in use", config.name);
            return Err(RegistryError::AlreadyRegistered(config.name.clone()));
        }

        let number = self.majors.allocate();
        let device = Device::new(config, number);
        devices.push(Arc::clone(&device));
        drop(devices);

        log::info!("{}: driver loaded successfully", config.name);
        log::info!(
            "device created: /dev/{} (major {} minor {})",
            config.name,
            number.major(),
            number.minor()
        );
        Ok(device)
    }

    /// Deregister a device
    ///
    /// Waits for the device lock to check that no session is open. Anyone
    /// still holding the `Arc<Device>` gets `NoDevice` from later opens.
    ///
    /// # Errors
    /// - `NotRegistered` if no device has this name
    /// - `InUse` if a session is open
    pub async fn unregister(&self, name: &str) -> Result<(), RegistryError> {
        let device = self
            .get(name)
            .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))?;

        if !device.deregister().await {
            log::warn!("{name}: cannot unload, device is open");
            return Err(RegistryError::InUse(name.to_string()));
        }

        let mut devices = self.devices.lock();
        devices.retain(|d| !Arc::ptr_eq(d, &device));
        drop(devices);

        log::info!("{name}: driver unloaded");
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Device>> {
        let devices = self.devices.lock();
        devices.iter().find(|d| d.name() == name).cloned()
    }

    /// Names of the registered devices, in registration order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let devices = self.devices.lock();
        devices.iter().map(|d| d.name().to_string()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.lock().is_empty()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
