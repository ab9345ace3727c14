//! Session configuration.

use crate::mode::AudioMode;
use serde::{Deserialize, Serialize};

/// Default capacity of each notification subscriber channel.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

/// Configuration for an [`AudioSession`](crate::AudioSession).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Mode applied to the platform before the first activation.
    pub mode: AudioMode,

    /// Bounded capacity of each `subscribe()` channel. Notifications are
    /// dropped for a subscriber that falls this far behind.
    pub notification_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: AudioMode::Default,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub(crate) fn channel_capacity(&self) -> usize {
        self.notification_capacity.max(1)
    }
}
