//! Core types for Miru

use serde::{Deserialize, Serialize};
use url::Url;

/// Playback mode for the current tracking session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackKind {
    /// Playing a file from the local library
    LocalFile,
    /// Playing a remote stream
    Stream,
    /// Progress tracked manually, no player attached
    ManualTracking,
}

impl std::fmt::Display for PlaybackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackKind::LocalFile => write!(f, "local file"),
            PlaybackKind::Stream => write!(f, "stream"),
            PlaybackKind::ManualTracking => write!(f, "manual tracking"),
        }
    }
}

/// Raw playback status reported by the media player
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatus {
    /// Name of the file being played (may be empty for streams)
    pub filename: String,
    /// Full path of the file being played
    pub filepath: String,
    /// Elapsed playback time in seconds
    pub current_time_seconds: f64,
    /// Total duration in seconds
    pub duration_seconds: f64,
    /// Completion percentage (0.0 - 1.0)
    pub completion_percentage: f64,
    /// Whether playback is currently running (false = paused)
    pub playing: bool,
}

/// Canonical, provider-agnostic playback state snapshot
///
/// One snapshot is derived per player event and serialized to clients.
/// The default value is the "no active session" state: whenever a required
/// session pointer is absent the projector returns `PlaybackState::default()`,
/// never a partially populated value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    /// User-facing episode number used for progress reporting
    pub episode_number: i32,
    /// Source-catalog episode identifier
    pub catalog_episode: String,
    /// Preferred title of the media
    pub media_title: String,
    /// Current episode count of the media (-1 if unknown)
    pub media_total_episodes: i32,
    /// Cover image reference
    pub media_cover_image: Option<Url>,
    /// Media identifier on the tracker platform (0 = unset)
    pub media_id: i64,
    /// Filename, or the literal "Stream" for streams
    pub filename: String,
    /// Completion percentage (0.0 - 1.0)
    pub completion_percentage: f64,
    /// Whether a following episode exists in the local collection
    pub can_play_next: bool,
    /// Whether progress was pushed to the tracker platform for this episode
    pub progress_updated: bool,
}

/// A media title as known by the tracker platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    /// Tracker platform identifier
    pub id: i64,
    /// Preferred title
    pub title: String,
    /// Cover image reference
    pub cover_image: Option<Url>,
    /// Number of episodes released so far (-1 if unknown)
    pub current_episode_count: i32,
    /// Total number of episodes, if known
    pub total_episodes: Option<i32>,
    /// Whether this media is a movie
    pub is_movie: bool,
}

impl Media {
    /// Total episode count, or -1 when unknown
    pub fn total_episode_count(&self) -> i32 {
        self.total_episodes.unwrap_or(-1)
    }
}

/// A user's library record for a media title
///
/// Holds the progress already recorded against the tracker platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub media: Media,
    /// Episode progress already recorded on the tracker platform
    pub progress: i32,
}

/// A local media file belonging to a library title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalFile {
    /// Full path on disk
    pub path: String,
    /// Episode number parsed from the file
    pub episode_number: i32,
    /// Source-catalog episode identifier
    pub catalog_episode: String,
}

/// The aggregate of local files belonging to one media title
///
/// Used to resolve the user-facing progress number and the next playable
/// episode. Files are expected to be sorted by episode number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileCollection {
    /// Tracker platform identifier of the owning media
    pub media_id: i64,
    /// Files sorted by episode number
    pub files: Vec<LocalFile>,
    /// Offset between raw episode numbering and the user-facing
    /// progress number (non-zero for split-cour releases)
    pub episode_offset: i32,
}

impl FileCollection {
    /// The user-facing progress number for a file
    pub fn progress_number(&self, file: &LocalFile) -> i32 {
        file.episode_number + self.episode_offset
    }

    /// Find the episode following `file`, if one exists
    pub fn find_next_episode(&self, file: &LocalFile) -> Option<&LocalFile> {
        let idx = self.files.iter().position(|f| f.path == file.path)?;
        self.files.get(idx + 1)
    }
}

/// An episode of a remote stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEpisode {
    /// User-facing progress number
    pub progress_number: i32,
    /// Display title of the episode
    pub title: String,
}

/// State for a manually tracked session (no player attached)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManualTrackingState {
    pub media_id: i64,
    pub episode_number: i32,
    pub total_episodes: Option<i32>,
}

/// Rich-presence activity descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaActivity {
    pub media_id: i64,
    pub title: String,
    pub cover_image: Option<Url>,
    pub is_movie: bool,
    pub episode_number: i32,
    /// Elapsed playback time in seconds
    pub progress: i32,
    /// Total duration in seconds
    pub duration: i32,
}

/// Resume-point metadata pushed to the continuity store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeDetails {
    pub episode_number: i32,
    pub media_id: i64,
    /// Empty for streams
    pub filepath: String,
}

/// Playback manager configuration
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Whether rich-presence reporting is enabled
    pub presence_enabled: bool,
    /// Whether the app starts offline (presence is skipped while offline)
    pub offline: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            presence_enabled: true,
            offline: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection() -> FileCollection {
        FileCollection {
            media_id: 101,
            files: vec![
                LocalFile {
                    path: "/library/show/ep1.mkv".into(),
                    episode_number: 1,
                    catalog_episode: "1".into(),
                },
                LocalFile {
                    path: "/library/show/ep2.mkv".into(),
                    episode_number: 2,
                    catalog_episode: "2".into(),
                },
            ],
            episode_offset: 0,
        }
    }

    #[test]
    fn test_find_next_episode() {
        let c = collection();
        let next = c.find_next_episode(&c.files[0]).unwrap();
        assert_eq!(next.episode_number, 2);
        assert!(c.find_next_episode(&c.files[1]).is_none());
    }

    #[test]
    fn test_progress_number_offset() {
        let mut c = collection();
        assert_eq!(c.progress_number(&c.files[0].clone()), 1);
        c.episode_offset = 12;
        assert_eq!(c.progress_number(&c.files[0].clone()), 13);
    }

    #[test]
    fn test_zero_value_playback_state() {
        let state = PlaybackState::default();
        assert_eq!(state.episode_number, 0);
        assert_eq!(state.media_id, 0);
        assert!(state.filename.is_empty());
        assert!(!state.can_play_next);
        assert!(!state.progress_updated);
    }

    #[test]
    fn test_total_episode_count_sentinel() {
        let media = Media {
            id: 1,
            title: "Show".into(),
            cover_image: None,
            current_episode_count: 12,
            total_episodes: None,
            is_movie: false,
        };
        assert_eq!(media.total_episode_count(), -1);
    }
}
