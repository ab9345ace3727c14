//! Shared event contracts for audio session observability.
//!
//! This crate defines the formal contracts (DTOs) for notifications that the
//! session coordinator publishes. Using shared types keeps producers and
//! consumers (media engine, UI bridge, logging sinks) in agreement on field
//! names.
//!
//! Also provides the `EventBus` sinks notifications are published through.

mod bus;

pub use bus::{EventBus, EventBusRef, JsonEventBus, NullEventBus, RecordingEventBus};

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Activation state of the shared audio session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    #[default]
    Inactive,
    Activating,
    Active,
    Deactivating,
}

impl ActivationState {
    pub fn label(&self) -> &'static str {
        match self {
            ActivationState::Inactive => "inactive",
            ActivationState::Activating => "activating",
            ActivationState::Active => "active",
            ActivationState::Deactivating => "deactivating",
        }
    }

    /// True for states with no platform call in flight.
    pub fn is_settled(&self) -> bool {
        matches!(self, ActivationState::Inactive | ActivationState::Active)
    }
}

impl std::fmt::Display for ActivationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Why the platform changed the audio route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RouteChangeReason {
    /// A device became available (e.g. headphones plugged in).
    NewDeviceAvailable,
    /// The previous device went away.
    OldDeviceUnavailable,
    /// The session category or mode changed.
    CategoryChange,
    /// The route was overridden by the app.
    Override,
    #[default]
    Unknown,
}

/// Output device the session can route audio to.
///
/// Serialized in the host bridge's spelling (`"BLUETOOTH"`, `"SPEAKER"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioDevice {
    Bluetooth,
    Earpiece,
    Headphones,
    Speaker,
}

impl AudioDevice {
    pub fn label(&self) -> &'static str {
        match self {
            AudioDevice::Bluetooth => "BLUETOOTH",
            AudioDevice::Earpiece => "EARPIECE",
            AudioDevice::Headphones => "HEADPHONES",
            AudioDevice::Speaker => "SPEAKER",
        }
    }
}

impl std::fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Unrecognized output port name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown audio device: {0}")]
pub struct UnknownAudioDevice(pub String);

impl FromStr for AudioDevice {
    type Err = UnknownAudioDevice;

    /// Accepts bridge labels and common platform port names
    /// (`"Receiver"`, `"BluetoothHFP"`, `"HeadsetMicrophone"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let device = match name.as_str() {
            "earpiece" | "receiver" | "builtinreceiver" => AudioDevice::Earpiece,
            "speaker" | "builtinspeaker" => AudioDevice::Speaker,
            "headphones" | "headset" | "headsetmicrophone" | "wired_headset" => {
                AudioDevice::Headphones
            }
            n if n.starts_with("bluetooth") => AudioDevice::Bluetooth,
            _ => return Err(UnknownAudioDevice(s.to_string())),
        };
        Ok(device)
    }
}

/// Event emitted whenever the activation state changes.
///
/// Producers: activation coordinator, notification relay
/// Consumers: media engine, UI bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangedEvent {
    /// State before the change.
    pub from: ActivationState,
    /// State after the change.
    pub to: ActivationState,
    /// Outstanding activation requests after the change.
    pub request_count: u32,
    /// Caller that triggered the change. `None` for platform-forced changes.
    #[serde(default)]
    pub requester: Option<String>,
    /// Timestamp in milliseconds since epoch.
    #[serde(default)]
    pub timestamp_ms: i64,
}

/// Event emitted when the OS interrupts the session.
///
/// The session has already been torn down by the platform; the coordinator
/// resets to inactive and does not restore the previous request count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptionBeganEvent {
    /// Request count that was discarded by the interruption.
    pub previous_request_count: u32,
    #[serde(default)]
    pub timestamp_ms: i64,
}

/// Event emitted when an interruption ends.
///
/// No state changes; callers that still want audio must activate again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptionEndedEvent {
    /// Platform hint that resuming is appropriate.
    #[serde(default)]
    pub should_resume: bool,
    #[serde(default)]
    pub timestamp_ms: i64,
}

/// Event emitted when the audio route changes. Observability only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteChangedEvent {
    pub reason: RouteChangeReason,
    #[serde(default)]
    pub previous_output: Option<String>,
    #[serde(default)]
    pub current_output: Option<String>,
    #[serde(default)]
    pub timestamp_ms: i64,
}

/// Event emitted when the platform media services were reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaServicesResetEvent {
    /// Request count that was discarded by the reset.
    pub previous_request_count: u32,
    #[serde(default)]
    pub timestamp_ms: i64,
}

/// One entry of the device list reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(rename = "type")]
    pub device: AudioDevice,
    pub selected: bool,
}

/// Event emitted when the available devices or the selected route change.
///
/// The earpiece is left out of `devices` while headphones are connected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicesUpdatedEvent {
    pub devices: Vec<DeviceInfo>,
    #[serde(default)]
    pub selected: Option<AudioDevice>,
    #[serde(default)]
    pub timestamp_ms: i64,
}

/// Typed notification delivered to in-process subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotification {
    StateChanged(StateChangedEvent),
    InterruptionBegan(InterruptionBeganEvent),
    InterruptionEnded(InterruptionEndedEvent),
    RouteChanged(RouteChangedEvent),
    MediaServicesReset(MediaServicesResetEvent),
    DevicesUpdated(DevicesUpdatedEvent),
}

impl SessionNotification {
    /// Event bus topic for this notification.
    pub fn topic(&self) -> &'static str {
        match self {
            SessionNotification::StateChanged(_) => event_names::STATE_CHANGED,
            SessionNotification::InterruptionBegan(_) => event_names::INTERRUPTION_BEGAN,
            SessionNotification::InterruptionEnded(_) => event_names::INTERRUPTION_ENDED,
            SessionNotification::RouteChanged(_) => event_names::ROUTE_CHANGED,
            SessionNotification::MediaServicesReset(_) => event_names::MEDIA_SERVICES_RESET,
            SessionNotification::DevicesUpdated(_) => event_names::DEVICES_UPDATED,
        }
    }

    /// JSON payload for the event bus.
    pub fn payload(&self) -> serde_json::Value {
        let value = match self {
            SessionNotification::StateChanged(e) => serde_json::to_value(e),
            SessionNotification::InterruptionBegan(e) => serde_json::to_value(e),
            SessionNotification::InterruptionEnded(e) => serde_json::to_value(e),
            SessionNotification::RouteChanged(e) => serde_json::to_value(e),
            SessionNotification::MediaServicesReset(e) => serde_json::to_value(e),
            SessionNotification::DevicesUpdated(e) => serde_json::to_value(e),
        };
        value.unwrap_or(serde_json::Value::Null)
    }
}

/// Current wall clock in milliseconds, used to stamp notifications.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Event names as constants to prevent typos.
pub mod event_names {
    /// Activation state changed.
    pub const STATE_CHANGED: &str = "audio_session:state_changed";
    /// OS interruption began.
    pub const INTERRUPTION_BEGAN: &str = "audio_session:interruption_began";
    /// OS interruption ended.
    pub const INTERRUPTION_ENDED: &str = "audio_session:interruption_ended";
    /// Audio route changed.
    pub const ROUTE_CHANGED: &str = "audio_session:route_changed";
    /// Media services were reset.
    pub const MEDIA_SERVICES_RESET: &str = "audio_session:media_services_reset";
    /// Available devices or selected output route changed.
    pub const DEVICES_UPDATED: &str = "audio_session:devices_updated";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_changed_deserialize() {
        let json = r#"{"from": "inactive", "to": "activating", "request_count": 1, "requester": "engine"}"#;
        let event: StateChangedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.from, ActivationState::Inactive);
        assert_eq!(event.to, ActivationState::Activating);
        assert_eq!(event.request_count, 1);
        assert_eq!(event.requester.as_deref(), Some("engine"));
        assert_eq!(event.timestamp_ms, 0);
    }

    #[test]
    fn test_route_changed_deserialize_minimal() {
        let json = r#"{"reason": "old_device_unavailable"}"#;
        let event: RouteChangedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.reason, RouteChangeReason::OldDeviceUnavailable);
        assert_eq!(event.previous_output, None);
        assert_eq!(event.current_output, None);
    }

    #[test]
    fn test_notification_topic_and_payload() {
        let notification = SessionNotification::InterruptionBegan(InterruptionBeganEvent {
            previous_request_count: 3,
            timestamp_ms: 42,
        });
        assert_eq!(notification.topic(), event_names::INTERRUPTION_BEGAN);
        let payload = notification.payload();
        assert_eq!(payload["previous_request_count"], 3);
        assert_eq!(payload["timestamp_ms"], 42);
    }

    #[test]
    fn test_devices_updated_payload_uses_bridge_names() {
        let notification = SessionNotification::DevicesUpdated(DevicesUpdatedEvent {
            devices: vec![
                DeviceInfo {
                    device: AudioDevice::Headphones,
                    selected: true,
                },
                DeviceInfo {
                    device: AudioDevice::Speaker,
                    selected: false,
                },
            ],
            selected: Some(AudioDevice::Headphones),
            timestamp_ms: 7,
        });

        assert_eq!(notification.topic(), event_names::DEVICES_UPDATED);
        let payload = notification.payload();
        assert_eq!(payload["devices"][0]["type"], "HEADPHONES");
        assert_eq!(payload["devices"][0]["selected"], true);
        assert_eq!(payload["devices"][1]["type"], "SPEAKER");
        assert_eq!(payload["selected"], "HEADPHONES");
    }

    #[test]
    fn test_audio_device_from_port_names() {
        assert_eq!("SPEAKER".parse::<AudioDevice>(), Ok(AudioDevice::Speaker));
        assert_eq!("Receiver".parse::<AudioDevice>(), Ok(AudioDevice::Earpiece));
        assert_eq!("BluetoothHFP".parse::<AudioDevice>(), Ok(AudioDevice::Bluetooth));
        assert_eq!("Headphones".parse::<AudioDevice>(), Ok(AudioDevice::Headphones));
        assert_eq!(
            "CarAudio".parse::<AudioDevice>(),
            Err(UnknownAudioDevice("CarAudio".into()))
        );
        assert_eq!(AudioDevice::Bluetooth.to_string(), "BLUETOOTH");
    }

    #[test]
    fn test_settled_states() {
        assert!(ActivationState::Inactive.is_settled());
        assert!(ActivationState::Active.is_settled());
        assert!(!ActivationState::Activating.is_settled());
        assert!(!ActivationState::Deactivating.is_settled());
        assert_eq!(ActivationState::Deactivating.to_string(), "deactivating");
    }
}
