//! Audio session coordination for real-time communication.
//!
//! The device audio session is a single, process-wide, exclusive resource.
//! Lifecycle hooks, the media engine and background/foreground transitions
//! all want it active at different times, and the OS can tear it down at any
//! moment. This crate serializes those requests behind one coordinator.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Domain Layer                             │
//! │  mode.rs     - AudioMode enum (pure)                        │
//! │  state.rs    - Session state store (serialization point)    │
//! │  routing.rs  - Output device set and selection policy       │
//! │  platform.rs - PlatformAudio capability trait               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Application Layer                          │
//! │  coordinator.rs - activate/deactivate/set_mode/routing      │
//! │  relay.rs       - platform events in, notifications out     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use rtcaudio_session::{AudioSession, SessionConfig};
//! use std::sync::Arc;
//!
//! let session = AudioSession::new(Arc::new(platform), SessionConfig::default());
//! let coordinator = session.coordinator().clone();
//!
//! coordinator.activate("media-engine")?;
//! coordinator.activate("call-ui")?;      // already active, no platform call
//! coordinator.deactivate("call-ui")?;
//! coordinator.deactivate("media-engine")?; // last request releases the session
//! ```

mod config;
mod coordinator;
mod error;
mod mode;
mod platform;
mod relay;
mod routing;
mod state;

pub mod testing;

pub use config::{SessionConfig, DEFAULT_NOTIFICATION_CAPACITY};
pub use coordinator::AudioSessionCoordinator;
pub use error::{AudioSessionError, PlatformError, Result};
pub use mode::AudioMode;
pub use platform::{
    new_event_handler, NullPlatform, PlatformAudio, PlatformEvent, PlatformEventHandler,
};
pub use relay::NotificationRelay;
pub use state::{SessionSnapshot, TransitionKind};

// Re-export the notification contracts callers match on
pub use rtcaudio_events::{
    event_names, ActivationState, AudioDevice, DeviceInfo, EventBus, EventBusRef, NullEventBus,
    RouteChangeReason, SessionNotification,
};

use crossbeam_channel::Receiver;
use std::sync::Arc;

/// One audio session: a coordinator plus the relay wired to its platform.
///
/// Construct once for the process and hand the coordinator to every call
/// site that needs audio.
pub struct AudioSession {
    coordinator: Arc<AudioSessionCoordinator>,
    relay: Arc<NotificationRelay>,
}

impl AudioSession {
    pub fn new(platform: Arc<dyn PlatformAudio>, config: SessionConfig) -> Self {
        Self::with_event_bus(platform, config, Arc::new(NullEventBus))
    }

    /// Like [`new`](Self::new), also publishing every notification on `bus`.
    pub fn with_event_bus(
        platform: Arc<dyn PlatformAudio>,
        config: SessionConfig,
        bus: EventBusRef,
    ) -> Self {
        let publisher = Arc::new(relay::Publisher::new(bus, config.channel_capacity()));
        let coordinator = Arc::new(AudioSessionCoordinator::new(
            platform,
            config.mode,
            publisher,
        ));
        let relay = NotificationRelay::attach(&coordinator);

        tracing::info!(mode = %config.mode, "audio session created");
        Self { coordinator, relay }
    }

    pub fn coordinator(&self) -> &Arc<AudioSessionCoordinator> {
        &self.coordinator
    }

    pub fn relay(&self) -> &Arc<NotificationRelay> {
        &self.relay
    }

    /// Receive every session notification: state, interruption, route,
    /// reset and device-list changes.
    pub fn subscribe(&self) -> Receiver<SessionNotification> {
        self.relay.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.coordinator.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPlatform;

    #[test]
    fn test_session_registers_event_handler() {
        let platform = Arc::new(ScriptedPlatform::new());
        assert!(!platform.has_event_handler());

        let session = AudioSession::new(platform.clone(), SessionConfig::default());
        assert!(platform.has_event_handler());
        assert_eq!(session.snapshot().state, ActivationState::Inactive);
    }

    #[test]
    fn test_null_platform_session() {
        let session = AudioSession::new(Arc::new(NullPlatform), SessionConfig::default());
        session.coordinator().activate("engine").unwrap();
        assert_eq!(session.snapshot().state, ActivationState::Active);
        session.coordinator().deactivate("engine").unwrap();
        assert_eq!(session.snapshot().state, ActivationState::Inactive);
    }

    #[test]
    fn test_events_after_session_dropped_are_ignored() {
        let platform = Arc::new(ScriptedPlatform::new());
        let session = AudioSession::new(platform.clone(), SessionConfig::default());
        let relay = Arc::clone(session.relay());
        drop(session);

        assert!(platform.emit(PlatformEvent::InterruptionBegan));
        assert_eq!(relay.delivered_events(), 0);
    }
}
