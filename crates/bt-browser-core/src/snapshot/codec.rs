//! Binary codec for the persisted registry snapshot.
//!
//! Layout:
//! ```text
//! [device_count:4]
//!   repeated device_count times:
//!   [name_len:2][name:N][address:6][service_count:4]
//!     repeated service_count times:
//!     [port:4][name_len:2][name:N][uuid:16]
//! ```
//! All multi-byte integers are big-endian; names are UTF-8.
//!
//! Decoding is strict: the reader must consume the buffer exactly.  A short
//! read, a count that runs past the end of the data, invalid UTF-8, or bytes
//! left over after the last device all make the whole snapshot invalid, so a
//! partially parsed registry is never handed back to the caller.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::device::{BtAddress, Device, Service, ADDRESS_LEN};
use crate::domain::registry::Registry;

/// Smallest possible encoded device: name_len + address + service_count.
const MIN_DEVICE_LEN: usize = 2 + ADDRESS_LEN + 4;
/// Smallest possible encoded service: port + name_len + uuid.
const MIN_SERVICE_LEN: usize = 4 + 2 + 16;

/// Errors that can occur while encoding or decoding a snapshot.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    /// The data ended before a field could be read.
    #[error(
        "truncated snapshot: {context} needs {needed} bytes at offset {offset}, \
         {available} available"
    )]
    Truncated {
        context: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A name field did not contain valid UTF-8.
    #[error("invalid UTF-8 in {context} at offset {offset}")]
    InvalidUtf8 { context: &'static str, offset: usize },

    /// Bytes remained after the declared devices were read.
    #[error("{0} trailing bytes after the last device")]
    TrailingBytes(usize),

    /// A name is too long for its 2-byte length prefix.
    #[error("{context} is {len} bytes long; the limit is 65535")]
    NameTooLong { context: &'static str, len: usize },

    /// A collection has more elements than its 4-byte count can express.
    #[error("{context} count {count} does not fit in 32 bits")]
    CountOverflow { context: &'static str, count: usize },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes the whole registry into snapshot bytes.
///
/// # Errors
///
/// Returns [`SnapshotError::NameTooLong`] if a device or service name exceeds
/// 65 535 bytes, or [`SnapshotError::CountOverflow`] for absurdly large
/// collections.
pub fn encode_snapshot(registry: &Registry) -> Result<Vec<u8>, SnapshotError> {
    let mut buf = Vec::new();
    write_count(&mut buf, registry.len(), "device")?;
    for device in registry.devices() {
        write_length_prefixed_string(&mut buf, &device.name, "device name")?;
        buf.extend_from_slice(device.address.as_bytes());
        write_count(&mut buf, device.services.len(), "service")?;
        for service in &device.services {
            buf.extend_from_slice(&service.port.to_be_bytes());
            write_length_prefixed_string(&mut buf, &service.name, "service name")?;
            buf.extend_from_slice(service.uuid.as_bytes());
        }
    }
    Ok(buf)
}

/// Decodes snapshot bytes into a registry.
///
/// # Errors
///
/// Returns a [`SnapshotError`] describing the first structural problem found.
///
/// # Examples
///
/// ```rust
/// use bt_browser_core::{decode_snapshot, encode_snapshot, Registry};
///
/// let bytes = encode_snapshot(&Registry::new()).unwrap();
/// assert_eq!(bytes, [0, 0, 0, 0]);
/// assert!(decode_snapshot(&bytes).unwrap().is_empty());
/// ```
pub fn decode_snapshot(bytes: &[u8]) -> Result<Registry, SnapshotError> {
    let mut reader = Reader::new(bytes);

    let device_count = reader.read_u32("device count")? as usize;
    let mut devices = Vec::with_capacity(device_count.min(reader.remaining() / MIN_DEVICE_LEN));
    for _ in 0..device_count {
        let name = reader.read_string("device name")?;
        let address = reader.read_address()?;
        let service_count = reader.read_u32("service count")? as usize;

        let mut services =
            Vec::with_capacity(service_count.min(reader.remaining() / MIN_SERVICE_LEN));
        for _ in 0..service_count {
            let port = reader.read_u32("service port")?;
            let name = reader.read_string("service name")?;
            let uuid = reader.read_uuid()?;
            services.push(Service { port, name, uuid });
        }

        devices.push(Device {
            address,
            name,
            services,
        });
    }

    if reader.remaining() > 0 {
        return Err(SnapshotError::TrailingBytes(reader.remaining()));
    }
    Ok(Registry::from_devices(devices))
}

// ── Writing helpers ───────────────────────────────────────────────────────────

fn write_count(
    buf: &mut Vec<u8>,
    count: usize,
    context: &'static str,
) -> Result<(), SnapshotError> {
    let count32 =
        u32::try_from(count).map_err(|_| SnapshotError::CountOverflow { context, count })?;
    buf.extend_from_slice(&count32.to_be_bytes());
    Ok(())
}

/// Writes a 2-byte length prefix followed by the UTF-8 string bytes.
fn write_length_prefixed_string(
    buf: &mut Vec<u8>,
    s: &str,
    context: &'static str,
) -> Result<(), SnapshotError> {
    let bytes = s.as_bytes();
    let len = u16::try_from(bytes.len()).map_err(|_| SnapshotError::NameTooLong {
        context,
        len: bytes.len(),
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

// ── Reading helpers ───────────────────────────────────────────────────────────

/// Sequential reader over the snapshot bytes.
struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    fn take(&mut self, needed: usize, context: &'static str) -> Result<&'a [u8], SnapshotError> {
        if self.remaining() < needed {
            return Err(SnapshotError::Truncated {
                context,
                offset: self.offset,
                needed,
                available: self.remaining(),
            });
        }
        let start = self.offset;
        self.offset += needed;
        Ok(&self.buf[start..self.offset])
    }

    fn read_u16(&mut self, context: &'static str) -> Result<u16, SnapshotError> {
        let b = self.take(2, context)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self, context: &'static str) -> Result<u32, SnapshotError> {
        let b = self.take(4, context)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a 2-byte length prefix and then that many UTF-8 bytes.
    fn read_string(&mut self, context: &'static str) -> Result<String, SnapshotError> {
        let len = self.read_u16(context)? as usize;
        let start = self.offset;
        let bytes = self.take(len, context)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| SnapshotError::InvalidUtf8 {
                context,
                offset: start,
            })
    }

    fn read_address(&mut self) -> Result<BtAddress, SnapshotError> {
        let b = self.take(ADDRESS_LEN, "device address")?;
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(b);
        Ok(BtAddress::new(bytes))
    }

    fn read_uuid(&mut self) -> Result<Uuid, SnapshotError> {
        let b = self.take(16, "service uuid")?;
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(b);
        Ok(Uuid::from_bytes(bytes))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
