//! Playback Manager - Main orchestrator for playback-state synchronization
//!
//! Coordinates:
//! - Consuming media-player events for one player session at a time
//! - Session-state mutation under a single exclusive lock
//! - Playback-state projection and subscriber fan-out
//! - Watch-progress synchronization with the tracker platform
//! - Presence, continuity, and episode-queue notifications

use crate::{
    collaborators::{
        ClientNotifier, CollectionRefresher, ContinuityStore, EpisodeQueue, LibraryResolver,
        PlayerController, PreferenceStore, PresenceClient, TrackerPlatform,
    },
    events::{ClientEventKind, PlaybackEvent, PlayerEvent, TrackingEvent},
    state::{CurrentSession, ManualTrackingCancel, SessionState},
    subscribers::{PlaybackSubscription, SubscriberId, SubscriberRegistry},
    types::{
        EpisodeDetails, LocalFile, ManagerConfig, ManualTrackingState, Media, MediaActivity,
        PlaybackKind, PlaybackState, PlaybackStatus, StreamEpisode,
    },
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, error, info, instrument};

/// External services injected into the playback manager
pub struct Collaborators {
    pub library: Arc<dyn LibraryResolver>,
    pub platform: Arc<dyn TrackerPlatform>,
    pub refresher: Arc<dyn CollectionRefresher>,
    pub presence: Option<Arc<dyn PresenceClient>>,
    pub continuity: Arc<dyn ContinuityStore>,
    pub queue: Arc<dyn EpisodeQueue>,
    pub notifier: Arc<dyn ClientNotifier>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub player: Arc<dyn PlayerController>,
}


/// Playback manager for one application instance
///
/// Constructed once with its collaborators injected; [`start`](Self::start)
/// attaches it to a player session's event stream, replacing any previous
/// session. All session-state mutation happens inside event handlers
/// serialized by an exclusive write lock.
pub struct PlaybackManager {
    /// Session state; write lock = the dispatcher's critical section
    pub(crate) session: Arc<RwLock<SessionState>>,
    /// Subscriber registry
    pub(crate) subscribers: SubscriberRegistry,
    /// Bumped on every `start()`, carried on every subscriber envelope
    pub(crate) epoch: AtomicU64,
    /// Whether the app is currently offline
    pub(crate) offline: AtomicBool,
    pub(crate) config: ManagerConfig,
    pub(crate) library: Arc<dyn LibraryResolver>,
    pub(crate) platform: Arc<dyn TrackerPlatform>,
    pub(crate) refresher: Arc<dyn CollectionRefresher>,
    pub(crate) presence: Option<Arc<dyn PresenceClient>>,
    pub(crate) continuity: Arc<dyn ContinuityStore>,
    pub(crate) queue: Arc<dyn EpisodeQueue>,
    pub(crate) notifier: Arc<dyn ClientNotifier>,
    pub(crate) preferences: Arc<dyn PreferenceStore>,
    pub(crate) player: Arc<dyn PlayerController>,
    /// Shutdown signal for the active consumer task
    consumer: Mutex<Option<watch::Sender<bool>>>,
}

impl PlaybackManager {
    /// Create a new playback manager
    pub fn new(collaborators: Collaborators, config: ManagerConfig) -> Self {
        Self {
            session: Arc::new(RwLock::new(SessionState::new())),
            subscribers: SubscriberRegistry::new(),
            epoch: AtomicU64::new(0),
            offline: AtomicBool::new(config.offline),
            config,
            library: collaborators.library,
            platform: collaborators.platform,
            refresher: collaborators.refresher,
            presence: collaborators.presence,
            continuity: collaborators.continuity,
            queue: collaborators.queue,
            notifier: collaborators.notifier,
            preferences: collaborators.preferences,
            player: collaborators.player,
            consumer: Mutex::new(None),
        }
    }

    /// Attach to a player session's event stream
    ///
    /// Spawns the single consumer task for this session. Any previous
    /// consumer is signaled to terminate and the session epoch is bumped, so
    /// subscribers can discard deliveries that originated from the replaced
    /// session.
    pub fn start(self: Arc<Self>, mut events: mpsc::Receiver<PlayerEvent>) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let manager = Arc::clone(&self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    event = events.recv() => {
                        match event {
                            Some(event) => manager.dispatch(event).await,
                            None => break,
                        }
                    }
                }
            }
            debug!(epoch, "Player event consumer terminated");
        });

        let mut consumer = self.consumer.lock().expect("consumer lock poisoned");
        if let Some(previous) = consumer.take() {
            let _ = previous.send(true);
        }
        *consumer = Some(shutdown_tx);

        info!(epoch, "Playback manager attached to player session");
    }

    /// Detach from the current player session, if any
    ///
    /// Signals the consumer to terminate; an in-flight event handler runs
    /// to completion before the consumer loop exits.
    pub fn stop(&self) {
        let mut consumer = self.consumer.lock().expect("consumer lock poisoned");
        if let Some(shutdown_tx) = consumer.take() {
            let _ = shutdown_tx.send(true);
            debug!("Playback manager detached from player session");
        }
    }

    /// Register a subscriber for playback events
    pub async fn subscribe(&self) -> PlaybackSubscription {
        self.subscribers.subscribe().await
    }

    /// Cancel a subscriber
    pub async fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.unsubscribe(id).await
    }

    /// The current session epoch
    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Toggle offline mode (presence reporting is skipped while offline)
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// The playback kind of the active session, if any
    pub async fn playback_kind(&self) -> Option<PlaybackKind> {
        self.session.read().await.current.kind()
    }

    /// Project the current playback state
    ///
    /// Takes only a read lock, so concurrent event handling is not blocked.
    /// Returns the zero-value state when no session or status is present.
    pub async fn playback_state(&self) -> PlaybackState {
        let session = self.session.read().await;
        match &session.status {
            Some(status) => session.project(status),
            None => PlaybackState::default(),
        }
    }

    /// The next playable episode cached on tracking-stopped, if any
    pub async fn next_episode(&self) -> Option<LocalFile> {
        self.session.read().await.next_episode.clone()
    }

    /// Begin a manual tracking session
    ///
    /// `cancel` is invoked as deferred cleanup after a successful manual
    /// progress push.
    pub async fn start_manual_tracking(
        &self,
        state: ManualTrackingState,
        cancel: Option<ManualTrackingCancel>,
    ) {
        let mut session = self.session.write().await;
        session.current = CurrentSession::ManualTracking { state };
        session.history.clear();
        session.manual_cancel = cancel;
        debug!(media_id = state.media_id, episode = state.episode_number, "Manual tracking started");
    }

    /// End the manual tracking session, if one is active
    pub async fn stop_manual_tracking(&self) {
        let mut session = self.session.write().await;
        if matches!(session.current, CurrentSession::ManualTracking { .. }) {
            session.current = CurrentSession::None;
            session.manual_cancel = None;
            debug!("Manual tracking stopped");
        }
    }

    /// Install the stream session before stream playback begins
    ///
    /// Streaming player events are ignored until this has been called; the
    /// streamed media may or may not be part of the library.
    #[instrument(skip_all, fields(media_id = media.id))]
    pub async fn set_stream_session(
        &self,
        media: Media,
        episode: StreamEpisode,
        catalog_episode: String,
    ) {
        let list_entry = self.library.find_list_entry(media.id).await;
        let mut session = self.session.write().await;
        session.current = CurrentSession::Stream {
            media,
            episode,
            catalog_episode,
            list_entry,
        };
    }

    /// Route one player event to its handler
    async fn dispatch(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::Local(TrackingEvent::TrackingStarted(status)) => {
                self.handle_tracking_started(status).await
            }
            PlayerEvent::Local(TrackingEvent::StatusUpdate(status)) => {
                self.handle_playback_status(status).await
            }
            PlayerEvent::Local(TrackingEvent::VideoCompleted(status)) => {
                self.handle_video_completed(status).await
            }
            PlayerEvent::Local(TrackingEvent::TrackingStopped { reason }) => {
                self.handle_tracking_stopped(reason).await
            }
            PlayerEvent::Local(TrackingEvent::TrackingRetry { .. }) => {
                self.handle_tracking_retry().await
            }
            PlayerEvent::Stream(TrackingEvent::TrackingStarted(status)) => {
                self.handle_stream_tracking_started(status).await
            }
            PlayerEvent::Stream(TrackingEvent::StatusUpdate(status)) => {
                self.handle_stream_playback_status(status).await
            }
            PlayerEvent::Stream(TrackingEvent::VideoCompleted(status)) => {
                self.handle_stream_video_completed(status).await
            }
            PlayerEvent::Stream(TrackingEvent::TrackingStopped { reason }) => {
                self.handle_stream_tracking_stopped(reason).await
            }
            // The stream layer retries on its own; nothing to do here
            PlayerEvent::Stream(TrackingEvent::TrackingRetry { .. }) => {}
        }
    }

    // ------------------------------------------------------------------
    // Local file handlers
    // ------------------------------------------------------------------

    async fn handle_tracking_started(&self, status: PlaybackStatus) {
        let mut session = self.session.write().await;

        debug!(filename = %status.filename, "Tracking started, resolving media data");

        // A new tracking session invalidates whatever mode was active before
        session.current = CurrentSession::None;
        session.history.clear();
        session.status = Some(status.clone());

        let resolved = match self.library.resolve_local_file(&status.filename).await {
            Ok(resolved) => resolved,
            Err(e) => {
                error!(error = %e, filename = %status.filename, "Failed to get media data");
                self.notify_client(
                    ClientEventKind::ErrorToast,
                    serde_json::Value::String(e.to_string()),
                )
                .await;
                let player = Arc::clone(&self.player);
                tokio::spawn(async move { player.cancel().await });
                return;
            }
        };

        info!(
            media = %resolved.list_entry.media.title,
            episode = resolved.file.episode_number,
            "Playback started"
        );

        let details = EpisodeDetails {
            episode_number: resolved.file.episode_number,
            media_id: resolved.list_entry.media.id,
            filepath: resolved.file.path.clone(),
        };
        let activity_episode = resolved.collection.progress_number(&resolved.file);
        let media = resolved.list_entry.media.clone();
        let entry = resolved.list_entry.clone();
        let file = resolved.file.clone();

        session.current = CurrentSession::LocalFile {
            list_entry: resolved.list_entry,
            file: resolved.file,
            collection: resolved.collection,
        };
        let ps = session.project(&status);

        self.notify_client(ClientEventKind::ProgressTrackingStarted, to_payload(&ps))
            .await;
        self.broadcast(vec![
            PlaybackEvent::StatusChanged {
                status: status.clone(),
                state: ps.clone(),
            },
            PlaybackEvent::VideoStarted {
                filename: status.filename.clone(),
                filepath: status.filepath.clone(),
            },
        ])
        .await;

        let continuity = Arc::clone(&self.continuity);
        tokio::spawn(async move { continuity.set_external_episode_details(details).await });

        let queue = Arc::clone(&self.queue);
        let queue_state = ps.clone();
        tokio::spawn(async move { queue.on_video_start(entry, file, queue_state).await });

        self.spawn_presence_activity(&media, activity_episode, &status);
    }

    async fn handle_video_completed(&self, status: PlaybackStatus) {
        let mut session = self.session.write().await;

        session.status = Some(status.clone());
        let mut ps = session.project(&status);
        debug!("Received video completed event");

        self.broadcast(vec![
            PlaybackEvent::StatusChanged {
                status: status.clone(),
                state: ps.clone(),
            },
            PlaybackEvent::VideoCompleted {
                filename: status.filename.clone(),
            },
        ])
        .await;

        // Push progress to the tracker platform if auto update is enabled
        self.auto_sync(&mut session, &mut ps).await;

        // The client uses the `progress_updated` flag to notify the user
        self.notify_client(ClientEventKind::ProgressVideoCompleted, to_payload(&ps))
            .await;
        session.history.insert(status.filename.clone(), ps.clone());

        if let CurrentSession::LocalFile {
            list_entry, file, ..
        } = &session.current
        {
            let queue = Arc::clone(&self.queue);
            let entry = list_entry.clone();
            let file = file.clone();
            tokio::spawn(async move { queue.on_video_completed(entry, file, ps).await });
        }
    }

    async fn handle_tracking_stopped(&self, reason: String) {
        let mut session = self.session.write().await;
        let session = &mut *session;

        debug!(%reason, "Received tracking stopped event");
        self.notify_client(
            ClientEventKind::ProgressTrackingStopped,
            serde_json::Value::String(reason.clone()),
        )
        .await;

        // Cache the next playable episode for later queue advancement
        if let CurrentSession::LocalFile {
            file, collection, ..
        } = &session.current
        {
            session.next_episode = collection.find_next_episode(file).cloned();
        }

        self.broadcast(vec![PlaybackEvent::VideoStopped {
            reason: reason.clone(),
        }])
        .await;

        if let Some(status) = &session.status {
            let continuity = Arc::clone(&self.continuity);
            let elapsed = status.current_time_seconds;
            let duration = status.duration_seconds;
            tokio::spawn(async move { continuity.update_watch_history(elapsed, duration).await });
        }

        let queue = Arc::clone(&self.queue);
        tokio::spawn(async move { queue.on_tracking_stopped().await });

        self.spawn_presence_close();
    }

    async fn handle_playback_status(&self, status: PlaybackStatus) {
        let mut session = self.session.write().await;

        session.status = Some(status.clone());
        let mut ps = session.project(&status);
        // A bare status tick never itself updates progress; carry the flag
        // forward from the completion that recorded it
        if let Some(previous) = session.history.get(&status.filename) {
            ps.progress_updated = previous.progress_updated;
        }

        self.broadcast(vec![PlaybackEvent::StatusChanged {
            status: status.clone(),
            state: ps.clone(),
        }])
        .await;
        self.notify_client(ClientEventKind::ProgressPlaybackState, to_payload(&ps))
            .await;

        if let CurrentSession::LocalFile {
            list_entry, file, ..
        } = &session.current
        {
            let queue = Arc::clone(&self.queue);
            let entry = list_entry.clone();
            let file = file.clone();
            tokio::spawn(async move { queue.on_playback_status(entry, file, ps).await });
        }

        self.spawn_presence_update(&status);
    }

    async fn handle_tracking_retry(&self) {
        // Not surfaced to the client. The queue is told tracking failed on
        // the assumption that the user closed the player, so it may advance.
        let queue = Arc::clone(&self.queue);
        tokio::spawn(async move { queue.on_tracking_error().await });
    }

    // ------------------------------------------------------------------
    // Stream handlers
    // ------------------------------------------------------------------

    async fn handle_stream_tracking_started(&self, status: PlaybackStatus) {
        let mut session = self.session.write().await;

        // A missing stream session means there is no active stream
        let (media, episode) = match &session.current {
            CurrentSession::Stream { media, episode, .. } => (media.clone(), episode.clone()),
            _ => return,
        };

        // The streamed media might not be in the user's library
        let resolved_entry = self.library.find_list_entry(media.id).await;
        if let CurrentSession::Stream { list_entry, .. } = &mut session.current {
            *list_entry = resolved_entry;
        }

        session.history.clear();
        session.status = Some(status.clone());
        let ps = session.project(&status);

        self.broadcast(vec![
            PlaybackEvent::StatusChanged {
                status: status.clone(),
                state: ps.clone(),
            },
            PlaybackEvent::StreamStarted {
                filename: status.filename.clone(),
                filepath: status.filepath.clone(),
            },
        ])
        .await;

        debug!(media = %media.title, "Tracking started for stream");
        self.notify_client(ClientEventKind::ProgressTrackingStarted, to_payload(&ps))
            .await;

        let continuity = Arc::clone(&self.continuity);
        let details = EpisodeDetails {
            episode_number: episode.progress_number,
            media_id: media.id,
            filepath: String::new(),
        };
        tokio::spawn(async move { continuity.set_external_episode_details(details).await });

        self.spawn_presence_activity(&media, episode.progress_number, &status);
    }

    async fn handle_stream_playback_status(&self, status: PlaybackStatus) {
        let mut session = self.session.write().await;

        if !matches!(session.current, CurrentSession::Stream { .. }) {
            return;
        }

        session.status = Some(status.clone());
        let mut ps = session.project(&status);
        if let Some(previous) = session.history.get(&status.filename) {
            ps.progress_updated = previous.progress_updated;
        }

        self.broadcast(vec![PlaybackEvent::StatusChanged {
            status: status.clone(),
            state: ps.clone(),
        }])
        .await;
        self.notify_client(ClientEventKind::ProgressPlaybackState, to_payload(&ps))
            .await;

        self.spawn_presence_update(&status);
    }

    async fn handle_stream_video_completed(&self, status: PlaybackStatus) {
        let mut session = self.session.write().await;

        if !matches!(session.current, CurrentSession::Stream { .. }) {
            return;
        }

        session.status = Some(status.clone());
        let mut ps = session.project(&status);
        debug!("Received video completed event for stream");

        self.broadcast(vec![
            PlaybackEvent::StatusChanged {
                status: status.clone(),
                state: ps.clone(),
            },
            PlaybackEvent::StreamCompleted {
                filename: status.filename.clone(),
            },
        ])
        .await;

        self.auto_sync(&mut session, &mut ps).await;

        self.notify_client(ClientEventKind::ProgressVideoCompleted, to_payload(&ps))
            .await;
        session.history.insert(status.filename.clone(), ps);
    }

    async fn handle_stream_tracking_stopped(&self, reason: String) {
        let session = self.session.write().await;

        if !matches!(session.current, CurrentSession::Stream { .. }) {
            return;
        }

        if let Some(status) = &session.status {
            let continuity = Arc::clone(&self.continuity);
            let elapsed = status.current_time_seconds;
            let duration = status.duration_seconds;
            tokio::spawn(async move { continuity.update_watch_history(elapsed, duration).await });
        }

        self.broadcast(vec![PlaybackEvent::StreamStopped {
            reason: reason.clone(),
        }])
        .await;

        debug!(%reason, "Received tracking stopped event for stream");
        self.notify_client(
            ClientEventKind::ProgressTrackingStopped,
            serde_json::Value::String(reason),
        )
        .await;

        self.spawn_presence_close();
    }

    // ------------------------------------------------------------------
    // Fan-out helpers
    // ------------------------------------------------------------------

    pub(crate) async fn broadcast(&self, events: Vec<PlaybackEvent>) {
        self.subscribers.broadcast(self.current_epoch(), events).await;
    }

    pub(crate) async fn notify_client(&self, kind: ClientEventKind, payload: serde_json::Value) {
        self.notifier.send_event(kind, payload).await;
    }

    /// The presence client, when reporting is enabled and the app is online
    fn active_presence(&self) -> Option<Arc<dyn PresenceClient>> {
        if !self.config.presence_enabled || self.offline.load(Ordering::SeqCst) {
            return None;
        }
        self.presence.clone()
    }

    fn spawn_presence_activity(&self, media: &Media, episode_number: i32, status: &PlaybackStatus) {
        let Some(presence) = self.active_presence() else {
            return;
        };
        let activity = MediaActivity {
            media_id: media.id,
            title: media.title.clone(),
            cover_image: media.cover_image.clone(),
            is_movie: media.is_movie,
            episode_number,
            progress: status.current_time_seconds as i32,
            duration: status.duration_seconds as i32,
        };
        tokio::spawn(async move { presence.set_activity(activity).await });
    }

    fn spawn_presence_update(&self, status: &PlaybackStatus) {
        let Some(presence) = self.active_presence() else {
            return;
        };
        let elapsed = status.current_time_seconds as i32;
        let duration = status.duration_seconds as i32;
        let paused = !status.playing;
        tokio::spawn(async move { presence.update_activity(elapsed, duration, paused).await });
    }

    fn spawn_presence_close(&self) {
        let Some(presence) = self.active_presence() else {
            return;
        };
        tokio::spawn(async move { presence.close().await });
    }
}

impl Drop for PlaybackManager {
    fn drop(&mut self) {
        self.stop();
    }
}

pub(crate) fn to_payload<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
