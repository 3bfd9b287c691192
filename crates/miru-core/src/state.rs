//! Session state and playback-state projection
//!
//! The current session is a single tagged variant rather than independent
//! per-mode pointers, so switching playback modes replaces the whole variant
//! and stale pointers from a previous mode cannot be read.

use crate::types::{
    FileCollection, LibraryEntry, LocalFile, ManualTrackingState, Media, PlaybackKind,
    PlaybackState, PlaybackStatus, StreamEpisode,
};
use std::collections::HashMap;

/// Deferred cleanup invoked after a successful manual-tracking push
pub type ManualTrackingCancel = Box<dyn FnOnce() + Send + Sync>;

/// The mutually exclusive current tracking session
pub enum CurrentSession {
    /// No session is active
    None,

    /// A local library file is playing
    LocalFile {
        list_entry: LibraryEntry,
        file: LocalFile,
        collection: FileCollection,
    },

    /// A remote stream is playing
    Stream {
        media: Media,
        episode: StreamEpisode,
        catalog_episode: String,
        /// The library record, when the streamed media is in the library
        list_entry: Option<LibraryEntry>,
    },

    /// Progress is tracked manually, no player attached
    ManualTracking { state: ManualTrackingState },
}

impl CurrentSession {
    /// The playback kind of this session, if one is active
    pub fn kind(&self) -> Option<PlaybackKind> {
        match self {
            CurrentSession::None => None,
            CurrentSession::LocalFile { .. } => Some(PlaybackKind::LocalFile),
            CurrentSession::Stream { .. } => Some(PlaybackKind::Stream),
            CurrentSession::ManualTracking { .. } => Some(PlaybackKind::ManualTracking),
        }
    }
}

/// All mutable state for one tracking session
///
/// Owned by the event dispatcher's write lock; the projector and other
/// readers only ever take the matching read lock.
pub struct SessionState {
    /// The current session variant
    pub current: CurrentSession,
    /// Most recent raw status from the player
    pub status: Option<PlaybackStatus>,
    /// Last emitted state per filename, scoped to one tracking session
    pub history: HashMap<String, PlaybackState>,
    /// Next playable episode, cached on tracking-stopped for queue advancement
    pub next_episode: Option<LocalFile>,
    /// Deferred manual-tracking cleanup, invoked after a successful push
    pub manual_cancel: Option<ManualTrackingCancel>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            current: CurrentSession::None,
            status: None,
            history: HashMap::new(),
            next_episode: None,
            manual_cancel: None,
        }
    }

    /// Derive the canonical playback state from the current session and a
    /// raw player status
    ///
    /// Pure with respect to the session: returns the zero-value state when
    /// the active mode's pointers are absent, never a partial snapshot.
    pub fn project(&self, status: &PlaybackStatus) -> PlaybackState {
        match &self.current {
            CurrentSession::LocalFile {
                list_entry,
                file,
                collection,
            } => {
                let can_play_next = collection.find_next_episode(file).is_some();
                PlaybackState {
                    episode_number: collection.progress_number(file),
                    catalog_episode: file.catalog_episode.clone(),
                    media_title: list_entry.media.title.clone(),
                    media_total_episodes: list_entry.media.current_episode_count,
                    media_cover_image: list_entry.media.cover_image.clone(),
                    media_id: list_entry.media.id,
                    filename: status.filename.clone(),
                    completion_percentage: status.completion_percentage,
                    can_play_next,
                    progress_updated: false,
                }
            }
            CurrentSession::Stream {
                media,
                episode,
                catalog_episode,
                ..
            } => PlaybackState {
                episode_number: episode.progress_number,
                catalog_episode: catalog_episode.clone(),
                media_title: media.title.clone(),
                media_total_episodes: media.current_episode_count,
                media_cover_image: media.cover_image.clone(),
                media_id: media.id,
                filename: if status.filename.is_empty() {
                    "Stream".to_string()
                } else {
                    status.filename.clone()
                },
                completion_percentage: status.completion_percentage,
                // Queue advancement is not defined for streams
                can_play_next: false,
                progress_updated: false,
            },
            // Manual tracking has no player status to project from
            CurrentSession::ManualTracking { .. } | CurrentSession::None => {
                PlaybackState::default()
            }
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_session() -> SessionState {
        let media = Media {
            id: 101,
            title: "Cosmic Voyage".into(),
            cover_image: None,
            current_episode_count: 12,
            total_episodes: Some(12),
            is_movie: false,
        };
        let files: Vec<LocalFile> = (1..=3)
            .map(|n| LocalFile {
                path: format!("/library/cosmic-voyage/ep{n}.mkv"),
                episode_number: n,
                catalog_episode: n.to_string(),
            })
            .collect();
        let mut state = SessionState::new();
        state.current = CurrentSession::LocalFile {
            list_entry: LibraryEntry {
                media,
                progress: 1,
            },
            file: files[1].clone(),
            collection: FileCollection {
                media_id: 101,
                files,
                episode_offset: 0,
            },
        };
        state
    }

    fn status(filename: &str) -> PlaybackStatus {
        PlaybackStatus {
            filename: filename.into(),
            filepath: format!("/library/{filename}"),
            current_time_seconds: 600.0,
            duration_seconds: 1440.0,
            completion_percentage: 0.42,
            playing: true,
        }
    }

    #[test]
    fn test_project_without_session_is_zero_value() {
        let state = SessionState::new();
        assert_eq!(state.project(&status("ep2.mkv")), PlaybackState::default());
    }

    #[test]
    fn test_project_manual_tracking_is_zero_value() {
        let mut state = SessionState::new();
        state.current = CurrentSession::ManualTracking {
            state: ManualTrackingState {
                media_id: 5,
                episode_number: 3,
                total_episodes: Some(24),
            },
        };
        assert_eq!(state.project(&status("ep2.mkv")), PlaybackState::default());
    }

    #[test]
    fn test_project_local_file() {
        let state = local_session();
        let ps = state.project(&status("ep2.mkv"));

        assert_eq!(ps.episode_number, 2);
        assert_eq!(ps.media_id, 101);
        assert_eq!(ps.media_title, "Cosmic Voyage");
        assert_eq!(ps.filename, "ep2.mkv");
        assert!(ps.can_play_next);
        assert!(!ps.progress_updated);
    }

    #[test]
    fn test_project_local_last_episode_cannot_play_next() {
        let mut state = local_session();
        if let CurrentSession::LocalFile {
            file, collection, ..
        } = &mut state.current
        {
            *file = collection.files[2].clone();
        }
        let ps = state.project(&status("ep3.mkv"));
        assert_eq!(ps.episode_number, 3);
        assert!(!ps.can_play_next);
    }

    #[test]
    fn test_project_stream_substitutes_sentinel_filename() {
        let mut state = SessionState::new();
        state.current = CurrentSession::Stream {
            media: Media {
                id: 202,
                title: "Night Sky".into(),
                cover_image: None,
                current_episode_count: 24,
                total_episodes: None,
                is_movie: false,
            },
            episode: StreamEpisode {
                progress_number: 7,
                title: "Episode 7".into(),
            },
            catalog_episode: "7".into(),
            list_entry: None,
        };

        let ps = state.project(&status(""));
        assert_eq!(ps.filename, "Stream");
        assert_eq!(ps.episode_number, 7);
        assert!(!ps.can_play_next);

        let ps = state.project(&status("night-sky-7"));
        assert_eq!(ps.filename, "night-sky-7");
    }
}
