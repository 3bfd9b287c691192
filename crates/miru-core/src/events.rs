//! Event types flowing through the playback manager
//!
//! Three event surfaces:
//! - [`PlayerEvent`]: raw events received from the media player
//! - [`PlaybackEvent`]: typed events delivered to subscribers, wrapped in an
//!   [`EventEnvelope`] carrying the session epoch
//! - [`ClientEventKind`]: outward notification kinds sent to clients

use crate::types::{PlaybackState, PlaybackStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A raw event from the media player, tagged by playback source
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Event for a local library file
    Local(TrackingEvent),
    /// Event for a remote stream
    Stream(TrackingEvent),
}

/// The lifecycle events a media player reports for one tracking session
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingEvent {
    /// A new video has started playing and tracking has begun
    TrackingStarted(PlaybackStatus),
    /// Periodic playback status tick
    StatusUpdate(PlaybackStatus),
    /// The video has been watched completely (tracking continues)
    VideoCompleted(PlaybackStatus),
    /// Tracking has stopped completely
    TrackingStopped { reason: String },
    /// An error occurred while starting tracking
    TrackingRetry { reason: String },
}

/// Typed event delivered to playback subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// Playback status changed (accompanies every status-bearing event)
    StatusChanged {
        status: PlaybackStatus,
        state: PlaybackState,
    },

    /// A local video started playing
    VideoStarted { filename: String, filepath: String },

    /// A local video was watched completely
    VideoCompleted { filename: String },

    /// Local tracking stopped
    VideoStopped { reason: String },

    /// A stream started playing
    StreamStarted { filename: String, filepath: String },

    /// A stream episode was watched completely
    StreamCompleted { filename: String },

    /// Stream tracking stopped
    StreamStopped { reason: String },
}

/// Subscriber event with delivery metadata
///
/// The epoch identifies the player session that produced the event; it is
/// bumped every time a new player session is started, so subscribers can
/// discard stale deliveries from a replaced session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID (shared across subscribers for one delivery)
    pub id: Uuid,
    /// Session epoch the event belongs to
    pub epoch: u64,
    /// Time the event was generated
    pub timestamp: DateTime<Utc>,
    /// The event
    #[serde(flatten)]
    pub event: PlaybackEvent,
}

/// Outward notification kinds sent to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientEventKind {
    ProgressTrackingStarted,
    ProgressTrackingStopped,
    ProgressPlaybackState,
    ProgressVideoCompleted,
    ProgressUpdated,
    ErrorToast,
}

impl std::fmt::Display for ClientEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientEventKind::ProgressTrackingStarted => write!(f, "progress-tracking-started"),
            ClientEventKind::ProgressTrackingStopped => write!(f, "progress-tracking-stopped"),
            ClientEventKind::ProgressPlaybackState => write!(f, "progress-playback-state"),
            ClientEventKind::ProgressVideoCompleted => write!(f, "progress-video-completed"),
            ClientEventKind::ProgressUpdated => write!(f, "progress-updated"),
            ClientEventKind::ErrorToast => write!(f, "error-toast"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_event_serialization() {
        let event = PlaybackEvent::VideoStarted {
            filename: "ep1.mkv".into(),
            filepath: "/library/show/ep1.mkv".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"video_started\""));
        assert!(json.contains("ep1.mkv"));
    }

    #[test]
    fn test_envelope_flattens_event() {
        let envelope = EventEnvelope {
            id: Uuid::new_v4(),
            epoch: 3,
            timestamp: Utc::now(),
            event: PlaybackEvent::StreamStopped { reason: "closed".into() },
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"epoch\":3"));
        assert!(json.contains("\"event\":\"stream_stopped\""));
    }

    #[test]
    fn test_client_event_kind_display() {
        assert_eq!(ClientEventKind::ProgressUpdated.to_string(), "progress-updated");
        assert_eq!(ClientEventKind::ErrorToast.to_string(), "error-toast");
    }
}
