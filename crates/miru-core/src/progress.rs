//! Progress sync policy
//!
//! Two entry points push watch progress to the tracker platform:
//! - [`PlaybackManager::auto_sync`] runs once per video-completed event and
//!   is gated on the auto-update preference and a monotonic-progress check
//! - [`PlaybackManager::sync_current_progress`] is the user-requested path;
//!   it pushes unconditionally and is the only one that returns failures
//!
//! Both funnel into the same push, which resolves the target from the
//! active session variant and never partially applies.

use crate::{
    error::{Error, Result},
    events::ClientEventKind,
    manager::{to_payload, PlaybackManager},
    state::{CurrentSession, SessionState},
    types::PlaybackState,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

impl PlaybackManager {
    /// Sync progress after a video-completed event
    ///
    /// No-op when the auto-update preference is disabled (or unreadable),
    /// and when the tracker platform already records progress at or beyond
    /// the current episode. Failures are surfaced as an error toast; this
    /// path never returns an error to the dispatcher.
    pub(crate) async fn auto_sync(&self, session: &mut SessionState, state: &mut PlaybackState) {
        let enabled = match self.preferences.auto_update_progress_enabled().await {
            Ok(enabled) => enabled,
            Err(e) => {
                error!(error = %e, "Failed to check if auto update progress is enabled");
                return;
            }
        };
        if !enabled {
            return;
        }

        match &session.current {
            CurrentSession::LocalFile {
                list_entry,
                file,
                collection,
            } => {
                // Never regress recorded progress or push a duplicate
                let progress_number = collection.progress_number(file);
                if list_entry.progress >= progress_number {
                    return;
                }
            }
            CurrentSession::Stream {
                episode,
                list_entry,
                ..
            } => {
                // Only skippable when the media is in the library; without a
                // list entry there is no recorded progress to compare against
                if let Some(entry) = list_entry {
                    if entry.progress >= episode.progress_number {
                        return;
                    }
                }
            }
            // Automatic sync only applies to player-driven sessions
            CurrentSession::ManualTracking { .. } | CurrentSession::None => return,
        }

        debug!("Updating progress on tracker platform");
        match self.update_progress(session).await {
            Ok(()) => {
                state.progress_updated = true;
                self.notify_client(ClientEventKind::ProgressUpdated, to_payload(state))
                    .await;
            }
            Err(e) => {
                error!(error = %e, "Automatic progress update failed");
                state.progress_updated = false;
                self.notify_client(
                    ClientEventKind::ErrorToast,
                    serde_json::Value::String(
                        "Failed to update progress on tracker platform".to_string(),
                    ),
                )
                .await;
            }
        }
    }

    /// Sync the current playback progress on explicit user request
    ///
    /// Pushes unconditionally, skipping the checks the automatic path
    /// applies, and returns any push failure to the caller. Only on success
    /// is the current file's history entry stamped with the projected
    /// snapshot flagged `progress_updated`.
    #[instrument(skip(self))]
    pub async fn sync_current_progress(&self) -> Result<()> {
        // Same exclusive lock as the dispatcher: this path mutates history
        let mut session = self.session.write().await;

        self.update_progress(&mut session).await?;

        if let Some(status) = session.status.clone() {
            let mut ps = session.project(&status);
            ps.progress_updated = true;
            session.history.insert(status.filename.clone(), ps.clone());
            self.notify_client(ClientEventKind::ProgressUpdated, to_payload(&ps))
                .await;
        }

        Ok(())
    }

    /// Push the active session's progress to the tracker platform
    ///
    /// Resolves `(media_id, episode_number, total_episodes)` from the
    /// current session variant; nothing is pushed when the session is
    /// absent or the media id is unset. On success the cached platform
    /// collection is refreshed and, for manual tracking, the deferred
    /// cancellation is invoked.
    pub(crate) async fn update_progress(&self, session: &mut SessionState) -> Result<()> {
        let (media_id, episode_number, total_episodes) = match &session.current {
            CurrentSession::LocalFile {
                list_entry,
                file,
                collection,
            } => (
                list_entry.media.id,
                collection.progress_number(file),
                list_entry.media.total_episodes,
            ),
            CurrentSession::Stream { media, episode, .. } => (
                media.id,
                episode.progress_number,
                media.total_episodes,
            ),
            CurrentSession::ManualTracking { state } => (
                state.media_id,
                state.episode_number,
                state.total_episodes,
            ),
            CurrentSession::None => return Err(Error::NoActiveSession),
        };

        if media_id == 0 {
            return Err(Error::MediaIdNotFound);
        }

        // The push runs on its own task so a panic inside the platform
        // client is contained and classified instead of killing the
        // consumer loop
        let platform = Arc::clone(&self.platform);
        let push = tokio::spawn(async move {
            platform
                .update_entry_progress(media_id, episode_number, total_episodes)
                .await
        });
        match push.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "Error occurred while updating progress on tracker platform");
                return Err(Error::platform(e.to_string()));
            }
            Err(join_error) => {
                error!(error = %join_error, "Progress push panicked");
                return Err(Error::platform("progress push panicked"));
            }
        }

        let refresher = Arc::clone(&self.refresher);
        tokio::spawn(async move { refresher.refresh().await });

        if matches!(session.current, CurrentSession::ManualTracking { .. }) {
            // Deferred cleanup of the manual-tracking context
            if let Some(cancel) = session.manual_cancel.take() {
                cancel();
            }
        }

        info!(media_id, episode = episode_number, "Updated progress on tracker platform");
        Ok(())
    }
}
