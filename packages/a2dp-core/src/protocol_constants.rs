//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by the Bluetooth Assigned Numbers, the AVRCP
//! specification, or the platform settings schema that persisted device
//! facts are stored under. Changing them breaks compatibility with existing
//! stored data or with remote devices.

// ─────────────────────────────────────────────────────────────────────────────
// Service Class UUIDs (Bluetooth Assigned Numbers)
// ─────────────────────────────────────────────────────────────────────────────

/// The Bluetooth Base UUID (`00000000-0000-1000-8000-00805F9B34FB`).
///
/// 16-bit service class identifiers are expanded into full UUIDs by placing
/// them in bits 96..112 of this value.
pub const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

/// A2DP Audio Source service class.
pub const AUDIO_SOURCE_UUID16: u16 = 0x110A;

/// A2DP Audio Sink service class.
pub const AUDIO_SINK_UUID16: u16 = 0x110B;

/// AV Remote Control service class (AVRCP).
pub const AV_REMOTE_CONTROL_UUID16: u16 = 0x110E;

// ─────────────────────────────────────────────────────────────────────────────
// Persisted Settings Keys
// ─────────────────────────────────────────────────────────────────────────────

/// Key prefix for a sink's connection priority.
pub const PRIORITY_KEY_PREFIX: &str = "bluetooth_a2dp_sink_priority_";

/// Key prefix for a sink's observed optional-codec support.
pub const SUPPORTS_OPTIONAL_CODECS_KEY_PREFIX: &str = "bluetooth_a2dp_supports_optional_codecs_";

/// Key prefix for the user's optional-codec preference for a sink.
pub const OPTIONAL_CODECS_ENABLED_KEY_PREFIX: &str = "bluetooth_a2dp_optional_codecs_enabled_";

/// File name of the JSON-backed settings store inside the data directory.
pub const SETTINGS_FILE: &str = "a2dp_settings.json";

// ─────────────────────────────────────────────────────────────────────────────
// Raw Stored Values
// ─────────────────────────────────────────────────────────────────────────────

pub const OPTIONAL_CODECS_SUPPORT_UNKNOWN: i32 = -1;
pub const OPTIONAL_CODECS_NOT_SUPPORTED: i32 = 0;
pub const OPTIONAL_CODECS_SUPPORTED: i32 = 1;

pub const OPTIONAL_CODECS_PREF_UNKNOWN: i32 = -1;
pub const OPTIONAL_CODECS_PREF_DISABLED: i32 = 0;
pub const OPTIONAL_CODECS_PREF_ENABLED: i32 = 1;

pub const PRIORITY_UNDEFINED: i32 = -1;
pub const PRIORITY_OFF: i32 = 0;
pub const PRIORITY_ON: i32 = 100;

// ─────────────────────────────────────────────────────────────────────────────
// AVRCP Absolute Volume
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum AVRCP absolute volume (7-bit field).
pub const AVRCP_MAX_VOLUME: u8 = 127;

/// Number of user-visible volume steps mapped onto the absolute range.
pub const AVRCP_VOLUME_STEPS: u8 = 15;

// ─────────────────────────────────────────────────────────────────────────────
// Multicast
// ─────────────────────────────────────────────────────────────────────────────

/// Number of simultaneously playing sinks that constitutes a multicast session.
pub const MULTICAST_PLAYING_THRESHOLD: usize = 2;

/// Upper bound on concurrent A2DP connections this coordinator supports.
pub const MAX_SUPPORTED_CONNECTIONS: u8 = 2;
