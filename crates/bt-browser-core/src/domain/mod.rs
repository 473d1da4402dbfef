//! Domain entities for the Bluetooth browser.
//!
//! This module contains pure data types with no infrastructure dependencies.
//!
//! # Ownership model (for beginners)
//!
//! A [`registry::Registry`] owns every [`device::Device`] it knows about, and
//! each `Device` owns the [`device::Service`]s discovered on it.  Nothing else
//! holds references into the registry; other components address entries by
//! index (device index, service index) and ask the registry to resolve them.
//! This keeps the borrow checker happy and makes the persisted form a plain
//! tree that can be written out in one pass.

/// Device, service, and address value types.
pub mod device;

/// The in-memory collection of discovered devices.
pub mod registry;
