//! Audio mode definitions.
//!
//! Pure domain logic - no I/O, no platform dependencies.

use serde::{Deserialize, Serialize};

/// Call-oriented configuration pushed to the platform session before it is
/// activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    /// Used before and after every call. No output route is selected.
    #[default]
    Default,

    /// Audio-only call, voice-chat configuration.
    AudioCall,

    /// Video call, video-chat configuration.
    VideoCall,
}

impl AudioMode {
    /// Returns a human-readable label for the mode.
    pub fn label(&self) -> &'static str {
        match self {
            AudioMode::Default => "Default",
            AudioMode::AudioCall => "AudioCall",
            AudioMode::VideoCall => "VideoCall",
        }
    }

    /// Pick the mode for the current call situation.
    pub fn for_call(in_call: bool, is_video: bool) -> Self {
        match (in_call, is_video) {
            (false, _) => AudioMode::Default,
            (true, false) => AudioMode::AudioCall,
            (true, true) => AudioMode::VideoCall,
        }
    }

    pub fn is_call(&self) -> bool {
        !matches!(self, AudioMode::Default)
    }
}

impl std::fmt::Display for AudioMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
