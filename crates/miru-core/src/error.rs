//! Error types for Miru Core

use thiserror::Error;

/// Result type alias for playback-manager operations
pub type Result<T> = std::result::Result<T, Error>;

/// Playback-manager error types
#[derive(Error, Debug)]
pub enum Error {
    // Resolution errors
    #[error("Media data not found for file: {filename}")]
    MediaDataNotFound { filename: String },

    // Preference errors
    #[error("Failed to read preference: {0}")]
    Preference(String),

    // Progress push errors
    #[error("Failed to update progress on tracker platform: {0}")]
    ProgressUpdateFailed(String),

    // Invalid-state errors
    #[error("No video is being watched")]
    NoActiveSession,

    #[error("Unknown playback type")]
    UnknownPlaybackKind,

    #[error("Media ID not found")]
    MediaIdNotFound,

    // Lifecycle errors
    #[error("Player session is closed")]
    SessionClosed,

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a platform-update error
    pub fn platform(msg: impl Into<String>) -> Self {
        Error::ProgressUpdateFailed(msg.into())
    }

    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ProgressUpdateFailed(_) | Error::Preference(_)
        )
    }

    /// Returns the error code for client notifications
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::MediaDataNotFound { .. } => "MEDIA_DATA_NOT_FOUND",
            Error::Preference(_) => "PREFERENCE_READ",
            Error::ProgressUpdateFailed(_) => "PROGRESS_UPDATE",
            Error::NoActiveSession => "NO_ACTIVE_SESSION",
            Error::UnknownPlaybackKind => "UNKNOWN_PLAYBACK_TYPE",
            Error::MediaIdNotFound => "MEDIA_ID_NOT_FOUND",
            Error::SessionClosed => "SESSION_CLOSED",
            Error::Internal(_) => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::ProgressUpdateFailed("timeout".into()).is_recoverable());
        assert!(Error::Preference("db closed".into()).is_recoverable());
        assert!(!Error::NoActiveSession.is_recoverable());
        assert!(!Error::MediaDataNotFound { filename: "ep1.mkv".into() }.is_recoverable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::NoActiveSession.error_code(), "NO_ACTIVE_SESSION");
        assert_eq!(Error::MediaIdNotFound.error_code(), "MEDIA_ID_NOT_FOUND");
    }
}
