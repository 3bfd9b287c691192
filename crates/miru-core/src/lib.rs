//! Miru Core - Playback-State Synchronization Engine
//!
//! This crate derives a canonical, provider-agnostic playback state from raw
//! media-player events and keeps external watch progress in sync:
//! - Event dispatch for local-file and stream playback sessions
//! - Playback-state projection from session pointers
//! - Subscriber fan-out with per-subscriber ordered mailboxes
//! - Policy-gated, idempotent progress pushes to a tracker platform
//! - Presence, continuity, and episode-queue notifications
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                       Playback Manager                         │
//! ├────────────────────────────────────────────────────────────────┤
//! │                                                                │
//! │  player events ──► Event Dispatcher ──► Session State          │
//! │                          │                   │                 │
//! │                          │              Projector              │
//! │                          │                   │                 │
//! │                          ▼                   ▼                 │
//! │                 Progress Sync Policy   Subscriber Registry     │
//! │                          │                   │                 │
//! │                          ▼                   ▼                 │
//! │                 tracker platform       event mailboxes         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All external services (library, tracker platform, presence, continuity,
//! episode queue, client notifications, preferences, the player itself) are
//! injected behind the traits in [`collaborators`].

pub mod collaborators;
pub mod error;
pub mod events;
pub mod manager;
pub mod progress;
pub mod state;
pub mod subscribers;
pub mod types;

pub use collaborators::{
    ClientNotifier, CollectionRefresher, ContinuityStore, EpisodeQueue, LibraryResolver,
    LocalPlayback, PlayerController, PreferenceStore, PresenceClient, TrackerPlatform,
};
pub use error::{Error, Result};
pub use events::{ClientEventKind, EventEnvelope, PlaybackEvent, PlayerEvent, TrackingEvent};
pub use manager::{Collaborators, PlaybackManager};
pub use state::{CurrentSession, ManualTrackingCancel, SessionState};
pub use subscribers::{PlaybackSubscription, SubscriberId, SubscriberRegistry};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the engine library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Miru Core initialized");
}
