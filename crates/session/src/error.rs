//! Error types for the audio session coordinator.

/// Failure reported by the platform audio collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}{}", .code.map(|code| format!(" (code {code})")).unwrap_or_default())]
pub struct PlatformError {
    /// Platform status code (e.g. an `OSStatus`), when one exists.
    pub code: Option<i32>,
    pub message: String,
}

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AudioSessionError {
    /// The platform refused activation, e.g. another app holds priority.
    #[error("platform activation failed: {0}")]
    PlatformActivationFailed(PlatformError),
    #[error("platform deactivation failed: {0}")]
    PlatformDeactivationFailed(PlatformError),
    #[error("platform configuration failed: {0}")]
    PlatformConfigurationFailed(PlatformError),
    #[error("platform output routing failed: {0}")]
    PlatformRoutingFailed(PlatformError),
    /// A session operation was issued from inside a platform call on the
    /// thread that owns the in-flight transition. Programming fault.
    #[error("reentrant session transition requested by {requester}")]
    ReentrantTransition { requester: String },
    #[error("blocking session task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

impl AudioSessionError {
    /// The underlying platform failure, if this error came from the platform.
    pub fn platform_error(&self) -> Option<&PlatformError> {
        match self {
            AudioSessionError::PlatformActivationFailed(e)
            | AudioSessionError::PlatformDeactivationFailed(e)
            | AudioSessionError::PlatformConfigurationFailed(e)
            | AudioSessionError::PlatformRoutingFailed(e) => Some(e),
            _ => None,
        }
    }

    /// True for internal invariant violations that a caller cannot recover
    /// from by retrying.
    pub fn is_programming_fault(&self) -> bool {
        matches!(self, AudioSessionError::ReentrantTransition { .. })
    }
}

pub type Result<T> = std::result::Result<T, AudioSessionError>;
