//! Platform audio capability.
//!
//! The operating system's audio session is a process-wide singleton whose
//! calls must not be issued concurrently. This trait abstracts it so the
//! coordinator can run against the real platform binding or a fake.

use crate::error::PlatformError;
use crate::mode::AudioMode;
use rtcaudio_events::{AudioDevice, RouteChangeReason};
use std::sync::Arc;

/// Notification delivered by the platform, on whatever thread it chooses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// Something outside the process deactivated the session (phone call, alarm).
    InterruptionBegan,
    /// The interruption is over. `should_resume` is the platform's hint only.
    InterruptionEnded { should_resume: bool },
    RouteChanged {
        reason: RouteChangeReason,
        previous_output: Option<String>,
        current_output: Option<String>,
    },
    /// The media server restarted; all session state and configuration is gone.
    MediaServicesWereReset,
    DeviceAdded(AudioDevice),
    DeviceRemoved(AudioDevice),
    /// Full device list after a platform rescan. Replaces the known set.
    DevicesChanged(Vec<AudioDevice>),
}

pub type PlatformEventHandler = Arc<dyn Fn(PlatformEvent) + Send + Sync + 'static>;

pub fn new_event_handler<F>(f: F) -> PlatformEventHandler
where
    F: Fn(PlatformEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Synchronous, non-reentrant access to the platform audio session.
///
/// Implementations must not call back into the coordinator from inside
/// `configure`, `activate` or `deactivate`. Events may be delivered from any
/// thread through the registered handler.
pub trait PlatformAudio: Send + Sync {
    /// Apply category/mode configuration.
    fn configure(&self, mode: AudioMode) -> Result<(), PlatformError>;

    fn activate(&self) -> Result<(), PlatformError>;

    fn deactivate(&self) -> Result<(), PlatformError>;

    /// Send output audio to `device`.
    fn set_output_route(&self, _device: AudioDevice) -> Result<(), PlatformError> {
        Ok(())
    }

    /// Register the handler for platform events. Replaces any previous handler.
    fn set_event_handler(&self, handler: PlatformEventHandler);
}

/// Platform that accepts every call and never emits events.
///
/// Used on targets without a native audio session.
#[derive(Debug, Default)]
pub struct NullPlatform;

impl PlatformAudio for NullPlatform {
    fn configure(&self, _mode: AudioMode) -> Result<(), PlatformError> {
        Ok(())
    }

    fn activate(&self) -> Result<(), PlatformError> {
        Ok(())
    }

    fn deactivate(&self) -> Result<(), PlatformError> {
        Ok(())
    }

    fn set_event_handler(&self, _handler: PlatformEventHandler) {}
}
