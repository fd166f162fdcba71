//! In-process implementations of the stack collaborators.
//!
//! The daemon has no radio of its own, so it runs against these. They keep
//! the same observable behaviour a real stack would: directives return
//! immediately, transitions arrive later on the session event feed, codec
//! status only exists for connected devices, and the connection limit is
//! enforced by the machine itself.
//!
//! The `pub` hooks that are not part of the collaborator traits
//! (`register_remote_codecs`, `set_playing`, `remote_disconnect`, ...)
//! drive the simulated remote side, from tests or from the HTTP surface.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::json;

use super::traits::{AudioActivity, AvrcpController, SessionMachine};
use super::{SessionEvent, SessionEventSender};
use crate::device::DeviceAddress;
use crate::error::SessionError;
use crate::protocol_constants::{AVRCP_MAX_VOLUME, AVRCP_VOLUME_STEPS};
use crate::services::MulticastPolicy;
use crate::types::{
    AudioState, CodecDescriptor, CodecStatus, CodecType, ConnectionState, Directive,
};
use crate::utils::now_millis;

/// Codecs the local encoder can produce, lowest preference first.
const LOCAL_CODECS: [CodecType; 5] = [
    CodecType::Sbc,
    CodecType::Aac,
    CodecType::AptX,
    CodecType::AptXHd,
    CodecType::Ldac,
];

// ─────────────────────────────────────────────────────────────────────────────
// Session Machine
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct DeviceSession {
    state: ConnectionState,
    playing: bool,
    /// Completion order among connected devices; lower connected earlier.
    connected_seq: u64,
    optional_codecs_enabled: bool,
    codec_preference: Option<CodecDescriptor>,
}

impl DeviceSession {
    fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            playing: false,
            connected_seq: 0,
            optional_codecs_enabled: false,
            codec_preference: None,
        }
    }
}

/// Number of directives retained by [`LoopbackSessionMachine::directive_log`].
pub const DIRECTIVE_LOG_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct MachineState {
    sessions: HashMap<DeviceAddress, DeviceSession>,
    remote_codecs: HashMap<DeviceAddress, Vec<CodecType>>,
    codec_pending: HashSet<DeviceAddress>,
    latest: Option<DeviceAddress>,
    active: Option<DeviceAddress>,
    next_seq: u64,
    directives: VecDeque<Directive>,
}

/// Loopback A2DP session machine.
pub struct LoopbackSessionMachine {
    policy: MulticastPolicy,
    events: SessionEventSender,
    state: Mutex<MachineState>,
    auto_complete: AtomicBool,
    soc_multicast: AtomicBool,
    running: AtomicBool,
}

impl LoopbackSessionMachine {
    /// Creates a machine enforcing `policy` and publishing on `events`.
    ///
    /// Connections complete immediately by default; see
    /// [`set_auto_complete`](Self::set_auto_complete).
    pub fn new(policy: MulticastPolicy, events: SessionEventSender) -> Self {
        Self {
            policy,
            events,
            state: Mutex::new(MachineState::default()),
            auto_complete: AtomicBool::new(true),
            soc_multicast: AtomicBool::new(true),
            running: AtomicBool::new(true),
        }
    }

    /// The policy this machine enforces.
    pub fn policy(&self) -> MulticastPolicy {
        self.policy
    }

    /// Declares which codecs the remote device can decode.
    ///
    /// Devices without a registration decode SBC only.
    pub fn register_remote_codecs(&self, device: DeviceAddress, codecs: Vec<CodecType>) {
        self.state.lock().remote_codecs.insert(device, codecs);
    }

    /// When `false`, connect directives stop at Connecting until
    /// [`complete_connection`](Self::complete_connection) is called.
    pub fn set_auto_complete(&self, enabled: bool) {
        self.auto_complete.store(enabled, Ordering::SeqCst);
    }

    /// Withholds codec status for a connected device, as if the codec
    /// exchange had not finished yet.
    pub fn set_codec_status_pending(&self, device: DeviceAddress, pending: bool) {
        let mut state = self.state.lock();
        if pending {
            state.codec_pending.insert(device);
        } else {
            state.codec_pending.remove(&device);
        }
    }

    /// Whether the SoC can drive two streams at once.
    pub fn set_soc_multicast(&self, supported: bool) {
        self.soc_multicast.store(supported, Ordering::SeqCst);
    }

    /// Finishes a pending connection. Returns `false` if the device was not
    /// Connecting.
    pub fn complete_connection(&self, device: &DeviceAddress) -> bool {
        let mut state = self.state.lock();
        self.complete_locked(&mut state, device)
    }

    /// Starts or stops streaming to a connected device. Returns `false` if
    /// the device is not connected.
    pub fn set_playing(&self, device: &DeviceAddress, playing: bool) -> bool {
        let mut state = self.state.lock();
        let Some(session) = state.sessions.get_mut(device) else {
            return false;
        };
        if session.state != ConnectionState::Connected {
            return false;
        }
        if session.playing != playing {
            session.playing = playing;
            self.publish_audio(device, playing);
        }
        if playing {
            state.active = Some(*device);
        }
        true
    }

    /// Simulates the remote dropping the link.
    pub fn remote_disconnect(&self, device: &DeviceAddress) -> bool {
        let mut state = self.state.lock();
        self.disconnect_locked(&mut state, device)
    }

    /// The most recent directives received, oldest first. At most
    /// [`DIRECTIVE_LOG_CAPACITY`] are kept.
    pub fn directive_log(&self) -> Vec<Directive> {
        self.state.lock().directives.iter().cloned().collect()
    }

    /// Device currently selected as the stream target.
    pub fn active_device(&self) -> Option<DeviceAddress> {
        self.state.lock().active
    }

    /// Whether optional codecs are switched on for a device.
    pub fn optional_codecs_enabled(&self, device: &DeviceAddress) -> bool {
        self.state
            .lock()
            .sessions
            .get(device)
            .is_some_and(|s| s.optional_codecs_enabled)
    }

    fn apply(&self, state: &mut MachineState, directive: &Directive) {
        match directive {
            Directive::Connect(device) => {
                let session = state
                    .sessions
                    .entry(*device)
                    .or_insert_with(DeviceSession::new);
                if session.state.is_connected_or_connecting() {
                    log::debug!("[Loopback] {} already {:?}", device, session.state);
                    return;
                }
                self.transition(session, device, ConnectionState::Connecting);
                if self.auto_complete.load(Ordering::SeqCst) {
                    self.complete_locked(state, device);
                }
            }
            Directive::Disconnect(device) => {
                self.disconnect_locked(state, device);
            }
            Directive::EnableOptionalCodecs(device) | Directive::DisableOptionalCodecs(device) => {
                let enable = matches!(directive, Directive::EnableOptionalCodecs(_));
                if let Some(session) = state.sessions.get_mut(device) {
                    session.optional_codecs_enabled = enable;
                }
            }
            Directive::SetCodecPreference { device, codec } => {
                if let Some(session) = state.sessions.get_mut(device) {
                    session.codec_preference = Some(*codec);
                }
            }
            Directive::SelectStream(device) => {
                let connected = state
                    .sessions
                    .get(device)
                    .is_some_and(|s| s.state == ConnectionState::Connected);
                if connected {
                    state.active = Some(*device);
                }
            }
        }
    }

    fn complete_locked(&self, state: &mut MachineState, device: &DeviceAddress) -> bool {
        let pending = state
            .sessions
            .get(device)
            .is_some_and(|s| s.state == ConnectionState::Connecting);
        if !pending {
            return false;
        }

        // Displace the earliest-connected sinks until there is room.
        loop {
            let connected: Vec<(DeviceAddress, u64)> = state
                .sessions
                .iter()
                .filter(|(_, s)| s.state == ConnectionState::Connected)
                .map(|(addr, s)| (*addr, s.connected_seq))
                .collect();
            if connected.len() < usize::from(self.policy.max_connections) {
                break;
            }
            let Some((oldest, _)) = connected.into_iter().min_by_key(|(_, seq)| *seq) else {
                break;
            };
            log::info!(
                "[Loopback] At capacity ({}), displacing {}",
                self.policy.max_connections,
                oldest
            );
            self.disconnect_locked(state, &oldest);
        }

        state.next_seq += 1;
        let seq = state.next_seq;
        if let Some(session) = state.sessions.get_mut(device) {
            session.connected_seq = seq;
            self.transition(session, device, ConnectionState::Connected);
        }
        state.latest = Some(*device);
        if state.active.is_none() {
            state.active = Some(*device);
        }
        true
    }

    fn disconnect_locked(&self, state: &mut MachineState, device: &DeviceAddress) -> bool {
        let Some(session) = state.sessions.get_mut(device) else {
            return false;
        };
        if !session.state.is_connected_or_connecting() {
            return false;
        }
        if session.playing {
            session.playing = false;
            self.publish_audio(device, false);
        }
        self.transition(session, device, ConnectionState::Disconnecting);
        self.transition(session, device, ConnectionState::Disconnected);
        session.optional_codecs_enabled = false;
        session.codec_preference = None;
        if state.active == Some(*device) {
            state.active = None;
        }
        true
    }

    fn transition(&self, session: &mut DeviceSession, device: &DeviceAddress, next: ConnectionState) {
        let previous = session.state;
        session.state = next;
        self.publish(SessionEvent::ConnectionStateChanged {
            device: *device,
            previous,
            state: next,
            timestamp: now_millis(),
        });
    }

    fn publish_audio(&self, device: &DeviceAddress, playing: bool) {
        let state = if playing {
            AudioState::Playing
        } else {
            AudioState::NotPlaying
        };
        self.publish(SessionEvent::AudioStateChanged {
            device: *device,
            state,
            timestamp: now_millis(),
        });
    }

    fn publish(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            log::debug!("[Loopback] Session event feed closed");
        }
    }

    fn selectable(state: &MachineState, device: &DeviceAddress) -> Vec<CodecDescriptor> {
        let remote = state
            .remote_codecs
            .get(device)
            .map(Vec::as_slice)
            .unwrap_or(&[CodecType::Sbc]);
        LOCAL_CODECS
            .iter()
            .filter(|&&codec| remote.contains(&codec))
            .map(|&codec| CodecDescriptor::cd_quality(codec))
            .collect()
    }
}

impl SessionMachine for LoopbackSessionMachine {
    fn connection_state(&self, device: &DeviceAddress) -> ConnectionState {
        self.state
            .lock()
            .sessions
            .get(device)
            .map(|s| s.state)
            .unwrap_or_default()
    }

    fn devices_matching_states(&self, states: &[ConnectionState]) -> Vec<DeviceAddress> {
        let state = self.state.lock();
        let mut devices: Vec<DeviceAddress> = state
            .sessions
            .iter()
            .filter(|(_, s)| states.contains(&s.state))
            .map(|(addr, _)| *addr)
            .collect();
        devices.sort();
        devices
    }

    fn playing_devices(&self) -> Vec<DeviceAddress> {
        let state = self.state.lock();
        let mut devices: Vec<DeviceAddress> = state
            .sessions
            .iter()
            .filter(|(_, s)| s.playing)
            .map(|(addr, _)| *addr)
            .collect();
        devices.sort();
        devices
    }

    fn codec_status(&self, device: &DeviceAddress) -> Result<CodecStatus, SessionError> {
        let state = self.state.lock();
        let session = state
            .sessions
            .get(device)
            .filter(|s| s.state == ConnectionState::Connected)
            .ok_or_else(|| SessionError::NotAvailable(device.to_string()))?;
        if state.codec_pending.contains(device) {
            return Err(SessionError::NotAvailable(device.to_string()));
        }

        let selectable = Self::selectable(&state, device);
        let preferred = session
            .codec_preference
            .filter(|pref| selectable.iter().any(|c| c.codec_type == pref.codec_type));
        let current = preferred.or_else(|| {
            if session.optional_codecs_enabled {
                selectable.last().copied()
            } else {
                selectable.iter().find(|c| c.is_mandatory()).copied()
            }
        });

        Ok(CodecStatus {
            current,
            local_capabilities: LOCAL_CODECS
                .iter()
                .map(|codec| CodecDescriptor::cd_quality(*codec))
                .collect(),
            selectable_capabilities: selectable,
        })
    }

    fn send_directive(&self, directive: Directive) {
        if !self.running.load(Ordering::SeqCst) {
            log::debug!("[Loopback] Dropping {:?}: machine stopped", directive);
            return;
        }
        let mut state = self.state.lock();
        if state.directives.len() == DIRECTIVE_LOG_CAPACITY {
            state.directives.pop_front();
        }
        state.directives.push_back(directive.clone());
        self.apply(&mut state, &directive);
    }

    fn is_multicast_enabled(&self) -> bool {
        self.policy.multicast_feature_enabled && self.soc_multicast.load(Ordering::SeqCst)
    }

    fn is_multicast_feature_enabled(&self) -> bool {
        self.policy.multicast_feature_enabled
    }

    fn latest_device(&self) -> Option<DeviceAddress> {
        self.state.lock().latest
    }

    fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut state = self.state.lock();
        let connected: Vec<DeviceAddress> = state.sessions.keys().copied().collect();
        for device in connected {
            self.disconnect_locked(&mut state, &device);
        }
        log::info!("[Loopback] Session machine stopped");
    }

    fn dump(&self) -> serde_json::Value {
        let state = self.state.lock();
        let mut devices: Vec<_> = state.sessions.iter().collect();
        devices.sort_by_key(|(addr, _)| **addr);
        json!({
            "running": self.running.load(Ordering::SeqCst),
            "policy": self.policy,
            "latestDevice": state.latest,
            "activeDevice": state.active,
            "devices": devices
                .into_iter()
                .map(|(addr, s)| json!({
                    "address": addr,
                    "state": s.state,
                    "playing": s.playing,
                    "optionalCodecsEnabled": s.optional_codecs_enabled,
                    "codecPreference": s.codec_preference,
                }))
                .collect::<Vec<_>>(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AVRCP
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct AvrcpState {
    volume: u8,
    absolute_volume_capable: bool,
    active: Option<DeviceAddress>,
    audio_states: HashMap<DeviceAddress, AudioState>,
    blacklist: HashSet<DeviceAddress>,
}

/// Loopback AVRCP engine with absolute volume on a 0..=127 scale.
pub struct LoopbackAvrcp {
    state: Mutex<AvrcpState>,
    running: AtomicBool,
}

impl Default for LoopbackAvrcp {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackAvrcp {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AvrcpState {
                volume: AVRCP_MAX_VOLUME / 2,
                absolute_volume_capable: true,
                active: None,
                audio_states: HashMap::new(),
                blacklist: HashSet::new(),
            }),
            running: AtomicBool::new(true),
        }
    }

    /// Current absolute volume.
    pub fn volume(&self) -> u8 {
        self.state.lock().volume
    }

    /// Sink the engine is currently controlling.
    pub fn active_device(&self) -> Option<DeviceAddress> {
        self.state.lock().active
    }

    /// Last audio state reported for a device.
    pub fn audio_state(&self, device: &DeviceAddress) -> AudioState {
        self.state
            .lock()
            .audio_states
            .get(device)
            .copied()
            .unwrap_or_default()
    }

    /// Whether the remote supports absolute volume at all.
    pub fn set_absolute_volume_capable(&self, capable: bool) {
        self.state.lock().absolute_volume_capable = capable;
    }

    /// Marks a device as mishandling absolute volume.
    pub fn blacklist(&self, device: DeviceAddress) {
        self.state.lock().blacklist.insert(device);
    }

    pub fn is_blacklisted(&self, device: &DeviceAddress) -> bool {
        self.state.lock().blacklist.contains(device)
    }

    fn step() -> i32 {
        i32::from(AVRCP_MAX_VOLUME) / i32::from(AVRCP_VOLUME_STEPS)
    }
}

impl AvrcpController for LoopbackAvrcp {
    fn is_absolute_volume_supported(&self) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        let state = self.state.lock();
        state.absolute_volume_capable
            && state
                .active
                .map_or(true, |device| !state.blacklist.contains(&device))
    }

    fn adjust_volume(&self, direction: i32) {
        let mut state = self.state.lock();
        let next = i32::from(state.volume)
            .saturating_add(direction.saturating_mul(Self::step()))
            .clamp(0, i32::from(AVRCP_MAX_VOLUME));
        state.volume = u8::try_from(next).unwrap_or(AVRCP_MAX_VOLUME);
        log::debug!("[Loopback] Volume adjusted by {} to {}", direction, state.volume);
    }

    fn set_absolute_volume(&self, level: u8) {
        self.state.lock().volume = level.min(AVRCP_MAX_VOLUME);
    }

    fn notify_audio_state(&self, audio_state: AudioState, device: &DeviceAddress) {
        let mut state = self.state.lock();
        state.audio_states.insert(*device, audio_state);
        if audio_state == AudioState::Playing {
            state.active = Some(*device);
        }
    }

    fn reset_blacklist(&self, device: &DeviceAddress) {
        if self.state.lock().blacklist.remove(device) {
            log::info!("[Loopback] Cleared absolute volume blacklist for {}", device);
        }
    }

    fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn dump(&self) -> serde_json::Value {
        let state = self.state.lock();
        let mut blacklist: Vec<_> = state.blacklist.iter().copied().collect();
        blacklist.sort();
        json!({
            "running": self.running.load(Ordering::SeqCst),
            "volume": state.volume,
            "absoluteVolumeCapable": state.absolute_volume_capable,
            "activeDevice": state.active,
            "blacklist": blacklist,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Audio Activity
// ─────────────────────────────────────────────────────────────────────────────

/// Settable system audio activity signal.
#[derive(Debug, Default)]
pub struct AudioActivityFlag {
    active: AtomicBool,
}

impl AudioActivityFlag {
    pub fn new(active: bool) -> Self {
        Self {
            active: AtomicBool::new(active),
        }
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl AudioActivity for AudioActivityFlag {
    fn is_audio_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
