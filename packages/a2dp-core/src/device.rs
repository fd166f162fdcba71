//! Remote device identity and advertised capabilities.
//!
//! The coordinator never owns device identity. It receives a [`Device`] from
//! the caller (address plus the service UUIDs the remote advertised during
//! discovery) and derives per-device state from it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoordinatorError;
use crate::protocol_constants::{
    AUDIO_SINK_UUID16, AUDIO_SOURCE_UUID16, AV_REMOTE_CONTROL_UUID16, BLUETOOTH_BASE_UUID,
};

/// Expands a 16-bit service class identifier onto the Bluetooth Base UUID.
#[must_use]
pub const fn uuid_from_u16(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// A2DP Audio Source service UUID.
pub const AUDIO_SOURCE: Uuid = uuid_from_u16(AUDIO_SOURCE_UUID16);

/// A2DP Audio Sink service UUID.
pub const AUDIO_SINK: Uuid = uuid_from_u16(AUDIO_SINK_UUID16);

/// AVRCP remote control service UUID.
pub const AV_REMOTE_CONTROL: Uuid = uuid_from_u16(AV_REMOTE_CONTROL_UUID16);

/// A Bluetooth device address (`BD_ADDR`).
///
/// Formats as colon-separated upper-case hex (`00:1A:7D:DA:71:13`) and parses
/// the same form case-insensitively. Serialized as that string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceAddress([u8; 6]);

impl DeviceAddress {
    /// Creates an address from raw bytes (most significant first).
    #[must_use]
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Returns the raw address bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for DeviceAddress {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoordinatorError::InvalidAddress(s.to_string());

        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in &mut bytes {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for DeviceAddress {
    type Error = CoordinatorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceAddress> for String {
    fn from(address: DeviceAddress) -> Self {
        address.to_string()
    }
}

/// A remote device as presented by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Stable device address.
    pub address: DeviceAddress,
    /// Service UUIDs advertised by the remote.
    #[serde(default)]
    pub uuids: Vec<Uuid>,
}

impl Device {
    /// Creates a device with the given advertised UUIDs.
    pub fn new(address: DeviceAddress, uuids: Vec<Uuid>) -> Self {
        Self { address, uuids }
    }

    /// Creates a device that advertised no service UUIDs.
    ///
    /// Used when the caller only knows the address (e.g. a device that has
    /// not been through service discovery yet).
    pub fn bare(address: DeviceAddress) -> Self {
        Self::new(address, Vec::new())
    }

    /// Returns whether the remote advertises the given service.
    pub fn advertises(&self, uuid: &Uuid) -> bool {
        self.uuids.contains(uuid)
    }

    /// Returns `true` if the remote claims the audio source role without
    /// also offering the audio sink role.
    ///
    /// Such a remote cannot accept a stream from us.
    pub fn has_incompatible_audio_roles(&self) -> bool {
        self.advertises(&AUDIO_SOURCE) && !self.advertises(&AUDIO_SINK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> DeviceAddress {
        DeviceAddress::new([0x00, 0x1A, 0x7D, 0xDA, 0x71, 0x13])
    }

    #[test]
    fn address_formats_upper_case_hex() {
        assert_eq!(addr().to_string(), "00:1A:7D:DA:71:13");
    }

    #[test]
    fn address_parses_case_insensitively() {
        assert_eq!("00:1a:7d:da:71:13".parse::<DeviceAddress>().unwrap(), addr());
    }

    #[test]
    fn address_rejects_malformed_input() {
        assert!("00:1A:7D:DA:71".parse::<DeviceAddress>().is_err());
        assert!("00:1A:7D:DA:71:13:FF".parse::<DeviceAddress>().is_err());
        assert!("001A7DDA7113".parse::<DeviceAddress>().is_err());
        assert!("00:1A:7D:DA:71:G3".parse::<DeviceAddress>().is_err());
        assert!("0:1A:7D:DA:71:13".parse::<DeviceAddress>().is_err());
        assert!("+0:1A:7D:DA:71:13".parse::<DeviceAddress>().is_err());
        assert!("00:1A:7D:DA:71:+3".parse::<DeviceAddress>().is_err());
    }

    #[test]
    fn address_serializes_as_string() {
        let json = serde_json::to_string(&addr()).unwrap();
        assert_eq!(json, "\"00:1A:7D:DA:71:13\"");
        let back: DeviceAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr());
    }

    #[test]
    fn short_uuids_expand_onto_base_uuid() {
        assert_eq!(
            AUDIO_SOURCE.to_string(),
            "0000110a-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            AUDIO_SINK.to_string(),
            "0000110b-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn source_only_remote_is_incompatible() {
        let device = Device::new(addr(), vec![AUDIO_SOURCE]);
        assert!(device.has_incompatible_audio_roles());
    }

    #[test]
    fn source_and_sink_remote_is_compatible() {
        let device = Device::new(addr(), vec![AUDIO_SOURCE, AUDIO_SINK]);
        assert!(!device.has_incompatible_audio_roles());
    }

    #[test]
    fn sink_only_and_bare_remotes_are_compatible() {
        assert!(!Device::new(addr(), vec![AUDIO_SINK, AV_REMOTE_CONTROL])
            .has_incompatible_audio_roles());
        assert!(!Device::bare(addr()).has_incompatible_audio_roles());
    }
}
