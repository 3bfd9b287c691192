//! Collaborator seams for external services
//!
//! The playback manager never talks to the outside world directly; every
//! external service is injected behind one of these traits:
//! - library lookups ([`LibraryResolver`])
//! - the tracker platform ([`TrackerPlatform`], [`CollectionRefresher`])
//! - rich presence ([`PresenceClient`])
//! - resumable watch history ([`ContinuityStore`])
//! - the episode queue advancer ([`EpisodeQueue`])
//! - outward client notifications ([`ClientNotifier`])
//! - preferences ([`PreferenceStore`])
//! - the player itself ([`PlayerController`])

use crate::error::Result;
use crate::events::ClientEventKind;
use crate::types::{
    EpisodeDetails, FileCollection, LibraryEntry, LocalFile, MediaActivity, PlaybackState,
};
use async_trait::async_trait;

/// The resolved library data for one local file
#[derive(Debug, Clone)]
pub struct LocalPlayback {
    /// The user's library record for the owning media
    pub list_entry: LibraryEntry,
    /// The file being played
    pub file: LocalFile,
    /// The collection the file belongs to
    pub collection: FileCollection,
}

/// Resolves library data for playback
#[async_trait]
pub trait LibraryResolver: Send + Sync {
    /// Resolve the library data for a local file by filename
    ///
    /// Fails with [`crate::Error::MediaDataNotFound`] when the file is not
    /// part of the library.
    async fn resolve_local_file(&self, filename: &str) -> Result<LocalPlayback>;

    /// Find the user's library record for a media, if one exists
    ///
    /// Used for streams, which may play media that is not in the library.
    async fn find_list_entry(&self, media_id: i64) -> Option<LibraryEntry>;
}

/// The external progress-tracking platform
#[async_trait]
pub trait TrackerPlatform: Send + Sync {
    /// Record that the user has watched up to `episode_number`
    async fn update_entry_progress(
        &self,
        media_id: i64,
        episode_number: i32,
        total_episodes: Option<i32>,
    ) -> Result<()>;
}

/// Fire-and-forget refresh of the cached tracker-platform collection
#[async_trait]
pub trait CollectionRefresher: Send + Sync {
    async fn refresh(&self);
}

/// Rich-presence reporting
#[async_trait]
pub trait PresenceClient: Send + Sync {
    /// Show an activity for the media being watched
    async fn set_activity(&self, activity: MediaActivity);

    /// Update the elapsed/paused state of the current activity
    async fn update_activity(&self, elapsed: i32, duration: i32, paused: bool);

    /// Clear the current activity
    async fn close(&self);
}

/// The resumable watch-position/history store
#[async_trait]
pub trait ContinuityStore: Send + Sync {
    /// Record which episode an external player is playing
    async fn set_external_episode_details(&self, details: EpisodeDetails);

    /// Record the final elapsed/duration for the current episode
    async fn update_watch_history(&self, elapsed_seconds: f64, duration_seconds: f64);
}

/// The ordered episode-queue advancer
#[async_trait]
pub trait EpisodeQueue: Send + Sync {
    async fn on_video_start(&self, entry: LibraryEntry, file: LocalFile, state: PlaybackState);
    async fn on_video_completed(&self, entry: LibraryEntry, file: LocalFile, state: PlaybackState);
    async fn on_playback_status(&self, entry: LibraryEntry, file: LocalFile, state: PlaybackState);
    async fn on_tracking_stopped(&self);
    /// Tracking failed to start; the queue may advance on the assumption
    /// that the user closed the player
    async fn on_tracking_error(&self);
}

/// Outward client-notification transport
#[async_trait]
pub trait ClientNotifier: Send + Sync {
    /// Send a typed event to connected clients
    ///
    /// Implementations must not block; delivery to slow clients has to be
    /// buffered or dropped by the transport.
    async fn send_event(&self, kind: ClientEventKind, payload: serde_json::Value);
}

/// User preference reads
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Whether progress should be pushed automatically on video completion
    async fn auto_update_progress_enabled(&self) -> Result<bool>;
}

/// Handle over the underlying player session
#[async_trait]
pub trait PlayerController: Send + Sync {
    /// Cancel the current player session
    async fn cancel(&self);
}
