//! Device, service, and hardware-address value types.
//!
//! A [`DeviceInfo`] is what device discovery reports; a [`Device`] is the
//! registry's record of it, which additionally accumulates the [`Service`]s
//! found on the device during service discovery.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Length of a Bluetooth hardware address in bytes.
pub const ADDRESS_LEN: usize = 6;

/// Error returned when a textual Bluetooth address cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    /// The input did not contain exactly 12 hex digits.
    #[error("expected 12 hex digits, got {0}")]
    WrongLength(usize),
    /// A character other than a hex digit or separator was found.
    #[error("invalid character {0:?} in address")]
    InvalidChar(char),
}

/// A 6-byte Bluetooth hardware address.
///
/// Displayed as 12 uppercase hex digits without separators (`0050C000321B`),
/// which is the form used inside `btspp://` stream URLs.  Parsing also accepts
/// `:` or `-` separated groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BtAddress(pub [u8; ADDRESS_LEN]);

impl BtAddress {
    /// Wraps raw address bytes.
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for BtAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

impl FromStr for BtAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut digits = Vec::with_capacity(ADDRESS_LEN * 2);
        for c in s.trim().chars() {
            match c {
                ':' | '-' => continue,
                c if c.is_ascii_hexdigit() => digits.push(c as u8),
                other => return Err(AddressParseError::InvalidChar(other)),
            }
        }
        if digits.len() != ADDRESS_LEN * 2 {
            return Err(AddressParseError::WrongLength(digits.len()));
        }

        let mut bytes = [0u8; ADDRESS_LEN];
        for (i, pair) in digits.chunks(2).enumerate() {
            bytes[i] = (hex_value(pair[0]) << 4) | hex_value(pair[1]);
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for BtAddress {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BtAddress> for String {
    fn from(addr: BtAddress) -> Self {
        addr.to_string()
    }
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

/// A device descriptor as reported by device discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Hardware address of the remote device.
    pub address: BtAddress,
    /// Friendly name; empty when names were not requested or not available.
    #[serde(default)]
    pub name: String,
}

/// A service exposed by a remote device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Transport endpoint (RFCOMM channel, L2CAP PSM, ...).
    pub port: u32,
    /// Human-readable service name from the service record.
    #[serde(default)]
    pub name: String,
    /// Protocol or service-class identifier.
    pub uuid: Uuid,
}

/// A discovered device together with the services found on it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Device {
    pub address: BtAddress,
    pub name: String,
    pub services: Vec<Service>,
}

impl Device {
    /// Creates a device record with no services yet.
    pub fn from_info(info: DeviceInfo) -> Self {
        Self {
            address: info.address,
            name: info.name,
            services: Vec::new(),
        }
    }

    /// Returns the label shown for this device in selection lists:
    /// `name (ADDRESS)`, or just the address when the name is empty.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.address.to_string()
        } else {
            format!("{} ({})", self.name, self.address)
        }
    }
}

impl Service {
    /// Returns the label shown for this service in selection lists.
    pub fn label(&self) -> String {
        format!(" {}: {}", self.port, self.name)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_displays_as_uppercase_hex_without_separators() {
        let addr = BtAddress::new([0x00, 0x50, 0xC0, 0x00, 0x32, 0x1B]);
        assert_eq!(addr.to_string(), "0050C000321B");
    }

    #[test]
    fn test_address_parses_plain_and_separated_forms() {
        let expected = BtAddress::new([0x00, 0x11, 0x22, 0xAA, 0xBB, 0xCC]);
        assert_eq!("001122AABBCC".parse::<BtAddress>(), Ok(expected));
        assert_eq!("00:11:22:aa:bb:cc".parse::<BtAddress>(), Ok(expected));
        assert_eq!("00-11-22-AA-BB-CC".parse::<BtAddress>(), Ok(expected));
    }

    #[test]
    fn test_address_parse_rejects_short_input() {
        assert_eq!(
            "0011".parse::<BtAddress>(),
            Err(AddressParseError::WrongLength(4))
        );
    }

    #[test]
    fn test_address_parse_rejects_non_hex_characters() {
        assert_eq!(
            "00112233445G".parse::<BtAddress>(),
            Err(AddressParseError::InvalidChar('G'))
        );
    }

    #[test]
    fn test_device_label_uses_address_when_name_is_empty() {
        let device = Device::from_info(DeviceInfo {
            address: BtAddress::new([1, 2, 3, 4, 5, 6]),
            name: String::new(),
        });
        assert_eq!(device.label(), "010203040506");
    }

    #[test]
    fn test_device_label_combines_name_and_address() {
        let device = Device::from_info(DeviceInfo {
            address: BtAddress::new([1, 2, 3, 4, 5, 6]),
            name: "headset".to_string(),
        });
        assert_eq!(device.label(), "headset (010203040506)");
    }

    #[test]
    fn test_service_label_shows_port_and_name() {
        let service = Service {
            port: 5,
            name: "Serial Port".to_string(),
            uuid: Uuid::nil(),
        };
        assert_eq!(service.label(), " 5: Serial Port");
    }
}
