//! Shared domain types for A2DP session coordination.

use serde::{Deserialize, Serialize};

use crate::device::DeviceAddress;
use crate::protocol_constants::{
    OPTIONAL_CODECS_NOT_SUPPORTED, OPTIONAL_CODECS_PREF_DISABLED, OPTIONAL_CODECS_PREF_ENABLED,
    OPTIONAL_CODECS_PREF_UNKNOWN, OPTIONAL_CODECS_SUPPORTED, OPTIONAL_CODECS_SUPPORT_UNKNOWN,
    PRIORITY_OFF, PRIORITY_ON, PRIORITY_UNDEFINED,
};

// ─────────────────────────────────────────────────────────────────────────────
// Connection / Audio State
// ─────────────────────────────────────────────────────────────────────────────

/// Connection state of a sink. Exactly one holds per device at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    /// Returns `true` for Connected and Connecting.
    pub fn is_connected_or_connecting(self) -> bool {
        matches!(self, Self::Connected | Self::Connecting)
    }
}

/// Streaming state reported for a connected sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioState {
    Playing,
    #[default]
    NotPlaying,
}

// ─────────────────────────────────────────────────────────────────────────────
// Persisted Device Facts
// ─────────────────────────────────────────────────────────────────────────────

/// Whether a device is known to support non-mandatory codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionalCodecSupport {
    #[default]
    Unknown,
    Unsupported,
    Supported,
}

impl OptionalCodecSupport {
    /// Interprets a stored value. Anything unrecognised reads as Unknown.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            OPTIONAL_CODECS_SUPPORTED => Self::Supported,
            OPTIONAL_CODECS_NOT_SUPPORTED => Self::Unsupported,
            _ => Self::Unknown,
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            Self::Unknown => OPTIONAL_CODECS_SUPPORT_UNKNOWN,
            Self::Unsupported => OPTIONAL_CODECS_NOT_SUPPORTED,
            Self::Supported => OPTIONAL_CODECS_SUPPORTED,
        }
    }
}

impl From<bool> for OptionalCodecSupport {
    fn from(supported: bool) -> Self {
        if supported {
            Self::Supported
        } else {
            Self::Unsupported
        }
    }
}

/// The user's preference for using optional codecs with a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionalCodecPreference {
    #[default]
    Unknown,
    Disabled,
    Enabled,
}

impl OptionalCodecPreference {
    /// Strict conversion used by setters: out-of-range values are `None`.
    pub fn try_from_raw(raw: i32) -> Option<Self> {
        match raw {
            OPTIONAL_CODECS_PREF_UNKNOWN => Some(Self::Unknown),
            OPTIONAL_CODECS_PREF_DISABLED => Some(Self::Disabled),
            OPTIONAL_CODECS_PREF_ENABLED => Some(Self::Enabled),
            _ => None,
        }
    }

    /// Lenient conversion used when reading storage.
    pub fn from_raw(raw: i32) -> Self {
        Self::try_from_raw(raw).unwrap_or_default()
    }

    pub fn to_raw(self) -> i32 {
        match self {
            Self::Unknown => OPTIONAL_CODECS_PREF_UNKNOWN,
            Self::Disabled => OPTIONAL_CODECS_PREF_DISABLED,
            Self::Enabled => OPTIONAL_CODECS_PREF_ENABLED,
        }
    }
}

/// Connection priority of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Undefined,
    Off,
    On,
}

impl Priority {
    /// Interprets a stored value. Any positive value (including the
    /// auto-connect level) reads as On.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            PRIORITY_OFF => Self::Off,
            r if r > 0 => Self::On,
            _ => Self::Undefined,
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            Self::Undefined => PRIORITY_UNDEFINED,
            Self::Off => PRIORITY_OFF,
            Self::On => PRIORITY_ON,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Codecs
// ─────────────────────────────────────────────────────────────────────────────

/// A2DP source codec families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecType {
    /// SBC - the only codec every A2DP sink must implement.
    Sbc,
    Aac,
    AptX,
    AptXHd,
    Ldac,
}

impl CodecType {
    pub fn is_mandatory(self) -> bool {
        self == Self::Sbc
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    Mono,
    #[default]
    Stereo,
}

/// One codec configuration a device can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodecDescriptor {
    pub codec_type: CodecType,
    pub sample_rate_hz: u32,
    pub bits_per_sample: u8,
    #[serde(default)]
    pub channel_mode: ChannelMode,
}

impl CodecDescriptor {
    /// 44.1 kHz / 16-bit stereo configuration of the given codec.
    pub const fn cd_quality(codec_type: CodecType) -> Self {
        Self {
            codec_type,
            sample_rate_hz: 44_100,
            bits_per_sample: 16,
            channel_mode: ChannelMode::Stereo,
        }
    }

    /// Returns `false` for any descriptor beyond the baseline codec.
    pub fn is_mandatory(&self) -> bool {
        self.codec_type.is_mandatory()
    }
}

/// Negotiated codec state for a connected device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodecStatus {
    /// Codec currently in use, if streaming has been configured.
    pub current: Option<CodecDescriptor>,
    /// Codecs the local stack can produce.
    pub local_capabilities: Vec<CodecDescriptor>,
    /// Codecs both sides can use.
    pub selectable_capabilities: Vec<CodecDescriptor>,
}

impl CodecStatus {
    /// Returns `true` if any selectable codec is non-mandatory.
    pub fn supports_optional(&self) -> bool {
        self.selectable_capabilities
            .iter()
            .any(|codec| !codec.is_mandatory())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Directives
// ─────────────────────────────────────────────────────────────────────────────

/// A fire-and-forget instruction for the session machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Directive {
    Connect(DeviceAddress),
    Disconnect(DeviceAddress),
    EnableOptionalCodecs(DeviceAddress),
    DisableOptionalCodecs(DeviceAddress),
    SetCodecPreference {
        device: DeviceAddress,
        codec: CodecDescriptor,
    },
    /// Make this connected device the active stream target.
    SelectStream(DeviceAddress),
}

impl Directive {
    /// Device the directive applies to.
    pub fn device(&self) -> &DeviceAddress {
        match self {
            Self::Connect(d)
            | Self::Disconnect(d)
            | Self::EnableOptionalCodecs(d)
            | Self::DisableOptionalCodecs(d)
            | Self::SelectStream(d) => d,
            Self::SetCodecPreference { device, .. } => device,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_rejects_out_of_range_raw_values() {
        assert_eq!(
            OptionalCodecPreference::try_from_raw(1),
            Some(OptionalCodecPreference::Enabled)
        );
        assert_eq!(OptionalCodecPreference::try_from_raw(2), None);
        assert_eq!(OptionalCodecPreference::try_from_raw(-2), None);
    }

    #[test]
    fn priority_reads_positive_values_as_on() {
        assert_eq!(Priority::from_raw(100), Priority::On);
        assert_eq!(Priority::from_raw(1000), Priority::On);
        assert_eq!(Priority::from_raw(0), Priority::Off);
        assert_eq!(Priority::from_raw(-1), Priority::Undefined);
        assert_eq!(Priority::from_raw(-7), Priority::Undefined);
    }

    #[test]
    fn raw_values_round_trip_for_every_variant() {
        for support in [
            OptionalCodecSupport::Unknown,
            OptionalCodecSupport::Unsupported,
            OptionalCodecSupport::Supported,
        ] {
            assert_eq!(OptionalCodecSupport::from_raw(support.to_raw()), support);
        }
        for priority in [Priority::Undefined, Priority::Off, Priority::On] {
            assert_eq!(Priority::from_raw(priority.to_raw()), priority);
        }
    }

    #[test]
    fn only_sbc_is_mandatory() {
        assert!(CodecType::Sbc.is_mandatory());
        assert!(!CodecType::Aac.is_mandatory());
        assert!(!CodecType::Ldac.is_mandatory());
    }

    #[test]
    fn codec_status_detects_optional_capability() {
        let mut status = CodecStatus {
            selectable_capabilities: vec![CodecDescriptor::cd_quality(CodecType::Sbc)],
            ..Default::default()
        };
        assert!(!status.supports_optional());

        status
            .selectable_capabilities
            .push(CodecDescriptor::cd_quality(CodecType::Aac));
        assert!(status.supports_optional());
    }

    #[test]
    fn connection_state_serializes_to_snake_case() {
        assert_eq!(
            serde_json::to_string(&ConnectionState::Disconnecting).unwrap(),
            "\"disconnecting\""
        );
    }
}
