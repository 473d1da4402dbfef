//! Registry: the in-memory database of discovered devices and services.
//!
//! Devices are kept in discovery order.  A rescan appends again; the registry
//! never deduplicates by address, so the same device can appear more than
//! once if it was found by more than one scan.
//!
//! # Lifecycle
//!
//! ```text
//! load snapshot ──► Registry ──► scan appends devices ──► service scan
//!                                                          appends services
//!                                                               │
//!                                        save snapshot ◄────────┘
//! ```

use thiserror::Error;
use tracing::debug;

use super::device::{Device, DeviceInfo, Service};

/// Error type for registry mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A service was reported for a device index the registry does not hold.
    #[error("no device at index {index} (registry holds {len})")]
    NoSuchDevice { index: usize, len: usize },
}

/// One row of the flattened (device, service) selection list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Index of the device this row belongs to.
    pub device_index: usize,
    /// `None` for the device header row, `Some(j)` for the device's j-th service.
    pub service_index: Option<usize>,
    /// Display label for the row.
    pub label: String,
}

/// Ordered collection of discovered devices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    devices: Vec<Device>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from already-populated device records.
    pub fn from_devices(devices: Vec<Device>) -> Self {
        Self { devices }
    }

    /// Appends a newly discovered device and returns its index.
    pub fn add_device(&mut self, info: DeviceInfo) -> usize {
        self.devices.push(Device::from_info(info));
        self.devices.len() - 1
    }

    /// Appends a service to the device at `device_index`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NoSuchDevice`] if the index is out of range.
    pub fn add_service(
        &mut self,
        device_index: usize,
        service: Service,
    ) -> Result<(), RegistryError> {
        let len = self.devices.len();
        let device = self
            .devices
            .get_mut(device_index)
            .ok_or(RegistryError::NoSuchDevice { index: device_index, len })?;
        device.services.push(service);
        Ok(())
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device(&self, index: usize) -> Option<&Device> {
        self.devices.get(index)
    }

    /// Resolves a (device, service) index pair.
    pub fn service(
        &self,
        device_index: usize,
        service_index: usize,
    ) -> Option<(&Device, &Service)> {
        let device = self.devices.get(device_index)?;
        let service = device.services.get(service_index)?;
        Some((device, service))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Sum of the service counts of all devices.
    pub fn total_service_count(&self) -> usize {
        self.devices.iter().map(|d| d.services.len()).sum()
    }

    /// Removes every device.
    pub fn clear(&mut self) {
        self.devices.clear();
    }

    /// Drops every device at index `len` or above.
    ///
    /// Used to roll back the devices appended by an aborted scan cycle.
    pub fn truncate(&mut self, len: usize) {
        if len < self.devices.len() {
            debug!(dropped = self.devices.len() - len, "registry truncated");
        }
        self.devices.truncate(len);
    }

    /// Flattens the registry into selection rows: each device header followed
    /// by its services, in registry order.
    pub fn entries(&self) -> Vec<ListEntry> {
        let mut rows = Vec::with_capacity(self.devices.len() + self.total_service_count());
        for (i, device) in self.devices.iter().enumerate() {
            rows.push(ListEntry {
                device_index: i,
                service_index: None,
                label: device.label(),
            });
            for (j, service) in device.services.iter().enumerate() {
                rows.push(ListEntry {
                    device_index: i,
                    service_index: Some(j),
                    label: service.label(),
                });
            }
        }
        rows
    }
}
