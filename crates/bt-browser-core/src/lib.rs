//! # bt-browser-core
//!
//! Shared library for the Bluetooth browser containing the domain entities,
//! the well-known service-class identifiers, and the snapshot codec used to
//! persist discovery results between runs.
//!
//! It has zero dependencies on OS APIs, radio stacks, or storage back-ends.
//!
//! # Architecture overview (for beginners)
//!
//! The browser finds nearby Bluetooth devices, asks each of them which
//! services it exposes, remembers the results, and lets the user open a
//! stream connection to one of those services.  This crate holds the parts of
//! that workflow that are pure data:
//!
//! - **`domain`** – The `Registry` of discovered devices and their services,
//!   plus the `BtAddress`, `Device`, and `Service` value types.
//!
//! - **`service_class`** – 128-bit identifiers for common Bluetooth protocols
//!   and service classes, all derived from the Bluetooth base UUID.
//!
//! - **`snapshot`** – How a `Registry` is turned into bytes for the record
//!   store and parsed back, with strict detection of corrupted records.

pub mod domain;
pub mod service_class;
pub mod snapshot;

pub use domain::device::{AddressParseError, BtAddress, Device, DeviceInfo, Service};
pub use domain::registry::{ListEntry, Registry, RegistryError};
pub use snapshot::codec::{decode_snapshot, encode_snapshot, SnapshotError};
