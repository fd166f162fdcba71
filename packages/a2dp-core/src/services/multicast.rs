//! Multicast policy.
//!
//! - [`MulticastPolicy`]: the immutable connection limits derived from
//!   configuration at startup.
//! - [`MulticastEvaluator`]: answers "is multicast currently ongoing?" from
//!   the playing set and the system audio activity signal.

use std::sync::Arc;

use serde::Serialize;

use super::SessionTable;
use crate::device::DeviceAddress;
use crate::protocol_constants::{MAX_SUPPORTED_CONNECTIONS, MULTICAST_PLAYING_THRESHOLD};
use crate::stack::AudioActivity;
use crate::state::Config;

// ─────────────────────────────────────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────────────────────────────────────

/// Connection limits fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MulticastPolicy {
    /// Maximum simultaneously connected sinks (1 or 2).
    pub max_connections: u8,
    /// Whether the multicast feature is provisioned.
    pub multicast_feature_enabled: bool,
    /// Whether split (offloaded) streaming is enabled.
    pub split_streaming_enabled: bool,
}

impl Default for MulticastPolicy {
    fn default() -> Self {
        Self {
            max_connections: 1,
            multicast_feature_enabled: false,
            split_streaming_enabled: true,
        }
    }
}

impl MulticastPolicy {
    /// Derives the policy from raw configuration.
    ///
    /// Only a raw connection count of exactly 2 selects two connections.
    /// Provisioning multicast forces two regardless.
    pub fn from_config(config: &Config) -> Self {
        let mut max_connections = if config.max_a2dp_connections == i32::from(MAX_SUPPORTED_CONNECTIONS)
        {
            MAX_SUPPORTED_CONNECTIONS
        } else {
            1
        };
        if config.multicast {
            max_connections = MAX_SUPPORTED_CONNECTIONS;
        }

        let split_streaming_enabled = match config.split_a2dp.as_deref() {
            None => true,
            Some(raw) => raw.is_empty() || raw == "true",
        };

        let policy = Self {
            max_connections,
            multicast_feature_enabled: config.multicast,
            split_streaming_enabled,
        };
        log::info!(
            "[Multicast] Policy: max_connections={}, multicast={}, split_a2dp={}",
            policy.max_connections,
            policy.multicast_feature_enabled,
            policy.split_streaming_enabled
        );
        policy
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ongoing Evaluation
// ─────────────────────────────────────────────────────────────────────────────

/// Core multicast rule over a snapshot of the playing set.
///
/// Ongoing iff at least two sinks are playing, system audio is active, and
/// the queried device (if any) is not one of the playing sinks.
pub fn multicast_ongoing(
    playing: &[DeviceAddress],
    audio_active: bool,
    device: Option<&DeviceAddress>,
) -> bool {
    if playing.len() < MULTICAST_PLAYING_THRESHOLD || !audio_active {
        return false;
    }
    match device {
        Some(device) => !playing.contains(device),
        None => true,
    }
}

/// Evaluates multicast state against the live session machine.
pub struct MulticastEvaluator {
    sessions: Arc<SessionTable>,
    audio: Arc<dyn AudioActivity>,
}

impl MulticastEvaluator {
    pub fn new(sessions: Arc<SessionTable>, audio: Arc<dyn AudioActivity>) -> Self {
        Self { sessions, audio }
    }

    /// Whether multicast is ongoing, optionally from the point of view of a
    /// device asking to connect or disconnect.
    ///
    /// The playing set is read under the session lock; the audio signal is
    /// read after the lock is released.
    pub fn is_multicast_ongoing(&self, device: Option<&DeviceAddress>) -> bool {
        let playing = self.sessions.playing_devices();
        if playing.len() < MULTICAST_PLAYING_THRESHOLD {
            return false;
        }
        let ongoing = multicast_ongoing(&playing, self.audio.is_audio_active(), device);
        if ongoing {
            log::debug!(
                "[Multicast] Ongoing with {} playing device(s)",
                playing.len()
            );
        }
        ongoing
    }

    /// Whether multicast is currently usable.
    pub fn is_multicast_enabled(&self) -> bool {
        self.sessions.is_multicast_enabled()
    }

    /// Whether multicast was provisioned.
    pub fn is_multicast_feature_enabled(&self) -> bool {
        self.sessions.is_multicast_feature_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> DeviceAddress {
        DeviceAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, last])
    }

    fn config(max: i32, multicast: bool, split: Option<&str>) -> Config {
        Config {
            max_a2dp_connections: max,
            multicast,
            split_a2dp: split.map(str::to_string),
            ..Config::default()
        }
    }

    #[test]
    fn only_raw_two_selects_two_connections() {
        assert_eq!(MulticastPolicy::from_config(&config(2, false, None)).max_connections, 2);
        assert_eq!(MulticastPolicy::from_config(&config(1, false, None)).max_connections, 1);
        assert_eq!(MulticastPolicy::from_config(&config(3, false, None)).max_connections, 1);
        assert_eq!(MulticastPolicy::from_config(&config(0, false, None)).max_connections, 1);
        assert_eq!(MulticastPolicy::from_config(&config(-1, false, None)).max_connections, 1);
    }

    #[test]
    fn multicast_forces_two_connections() {
        let policy = MulticastPolicy::from_config(&config(1, true, None));
        assert_eq!(policy.max_connections, 2);
        assert!(policy.multicast_feature_enabled);
    }

    #[test]
    fn split_streaming_flag_parsing() {
        assert!(MulticastPolicy::from_config(&config(1, false, None)).split_streaming_enabled);
        assert!(MulticastPolicy::from_config(&config(1, false, Some(""))).split_streaming_enabled);
        assert!(
            MulticastPolicy::from_config(&config(1, false, Some("true"))).split_streaming_enabled
        );
        assert!(
            !MulticastPolicy::from_config(&config(1, false, Some("false"))).split_streaming_enabled
        );
        assert!(!MulticastPolicy::from_config(&config(1, false, Some("1"))).split_streaming_enabled);
    }

    #[test]
    fn needs_two_playing_devices() {
        assert!(!multicast_ongoing(&[], true, None));
        assert!(!multicast_ongoing(&[addr(1)], true, None));
        assert!(multicast_ongoing(&[addr(1), addr(2)], true, None));
    }

    #[test]
    fn needs_active_audio() {
        assert!(!multicast_ongoing(&[addr(1), addr(2)], false, None));
        assert!(!multicast_ongoing(&[addr(1), addr(2)], false, Some(&addr(3))));
    }

    #[test]
    fn playing_device_is_not_blocked() {
        let playing = [addr(1), addr(2)];
        assert!(!multicast_ongoing(&playing, true, Some(&addr(1))));
        assert!(!multicast_ongoing(&playing, true, Some(&addr(2))));
        assert!(multicast_ongoing(&playing, true, Some(&addr(3))));
    }

    #[test]
    fn more_than_two_playing_counts_as_ongoing() {
        let playing = [addr(1), addr(2), addr(3)];
        assert!(multicast_ongoing(&playing, true, None));
        assert!(multicast_ongoing(&playing, true, Some(&addr(4))));
    }
}
