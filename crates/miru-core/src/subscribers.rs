//! Subscriber registry for playback events
//!
//! Subscribers get an ordered mailbox of [`EventEnvelope`]s. Delivery is
//! synchronous with the dispatcher: envelopes are pushed into the mailboxes
//! before `broadcast` returns, so each subscriber observes events in
//! dispatch order. Unsubscribing sets a cancellation flag; canceled
//! subscribers are skipped during broadcast and compacted opportunistically
//! rather than evicted immediately, keeping broadcast contention low.

use crate::events::{EventEnvelope, PlaybackEvent};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Unique identifier for a playback subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::UnboundedSender<EventEnvelope>,
    canceled: AtomicBool,
}

/// A handle to a playback-event subscription
///
/// Dropping the subscription closes the mailbox; the registry treats a
/// closed mailbox like a canceled subscriber.
pub struct PlaybackSubscription {
    id: SubscriberId,
    rx: mpsc::UnboundedReceiver<EventEnvelope>,
}

impl PlaybackSubscription {
    /// Subscriber identity, used for [`SubscriberRegistry::unsubscribe`]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Receive the next event, or `None` once the registry is gone
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.rx.recv().await
    }

    /// Non-blocking receive
    pub fn try_recv(&mut self) -> Option<EventEnvelope> {
        self.rx.try_recv().ok()
    }
}

/// Thread-safe registry of playback-event subscribers
#[derive(Clone)]
pub struct SubscriberRegistry {
    inner: Arc<RwLock<Vec<Arc<Subscriber>>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a new subscriber
    pub async fn subscribe(&self) -> PlaybackSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriberId::new();
        let subscriber = Arc::new(Subscriber {
            id,
            tx,
            canceled: AtomicBool::new(false),
        });
        self.inner.write().await.push(subscriber);
        debug!(subscriber = %id, "Subscriber registered");
        PlaybackSubscription { id, rx }
    }

    /// Flag a subscriber as canceled
    ///
    /// Safe to call from any context; the subscriber stops receiving events
    /// immediately and is evicted during a later compaction.
    pub async fn unsubscribe(&self, id: SubscriberId) {
        let subscribers = self.inner.read().await;
        if let Some(subscriber) = subscribers.iter().find(|s| s.id == id) {
            subscriber.canceled.store(true, Ordering::SeqCst);
            debug!(subscriber = %id, "Subscriber canceled");
        }
    }

    /// Number of live (non-canceled) subscribers
    pub async fn len(&self) -> usize {
        self.inner
            .read()
            .await
            .iter()
            .filter(|s| !s.canceled.load(Ordering::SeqCst))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Deliver `events` to every live subscriber
    ///
    /// Mailbox sends are non-blocking, so delivery happens inline before
    /// this returns: each subscriber receives the events of successive
    /// broadcasts in the order the broadcasts were made. No ordering is
    /// guaranteed across subscribers.
    pub async fn broadcast(&self, epoch: u64, events: Vec<PlaybackEvent>) {
        if events.is_empty() {
            return;
        }

        let envelopes: Vec<EventEnvelope> = events
            .into_iter()
            .map(|event| EventEnvelope {
                id: Uuid::new_v4(),
                epoch,
                timestamp: Utc::now(),
                event,
            })
            .collect();

        let mut saw_dead = false;
        {
            let subscribers = self.inner.read().await;
            for subscriber in subscribers.iter() {
                if subscriber.canceled.load(Ordering::SeqCst) {
                    saw_dead = true;
                    continue;
                }
                for envelope in &envelopes {
                    if subscriber.tx.send(envelope.clone()).is_err() {
                        // Mailbox dropped; treat like a cancellation
                        subscriber.canceled.store(true, Ordering::SeqCst);
                        saw_dead = true;
                        break;
                    }
                }
            }
        }
        if saw_dead {
            let mut subscribers = self.inner.write().await;
            subscribers.retain(|s| !s.canceled.load(Ordering::SeqCst));
        }
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PlaybackEvent;

    fn events() -> Vec<PlaybackEvent> {
        vec![
            PlaybackEvent::StatusChanged {
                status: Default::default(),
                state: Default::default(),
            },
            PlaybackEvent::VideoStarted {
                filename: "ep1.mkv".into(),
                filepath: "/library/ep1.mkv".into(),
            },
        ]
    }

    #[tokio::test]
    async fn test_broadcast_preserves_order() {
        let registry = SubscriberRegistry::new();
        let mut sub = registry.subscribe().await;

        registry.broadcast(1, events()).await;

        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        assert!(matches!(first.event, PlaybackEvent::StatusChanged { .. }));
        assert!(matches!(second.event, PlaybackEvent::VideoStarted { .. }));
        assert_eq!(first.epoch, 1);
    }

    #[tokio::test]
    async fn test_successive_broadcasts_preserve_order() {
        let registry = SubscriberRegistry::new();
        let mut sub = registry.subscribe().await;

        registry
            .broadcast(1, vec![PlaybackEvent::VideoStarted {
                filename: "ep1.mkv".into(),
                filepath: "/library/ep1.mkv".into(),
            }])
            .await;
        registry
            .broadcast(1, vec![PlaybackEvent::VideoCompleted {
                filename: "ep1.mkv".into(),
            }])
            .await;
        registry
            .broadcast(1, vec![PlaybackEvent::VideoStopped {
                reason: "closed".into(),
            }])
            .await;

        // Delivery is inline; the mailbox already holds everything in order
        assert!(matches!(
            sub.try_recv().unwrap().event,
            PlaybackEvent::VideoStarted { .. }
        ));
        assert!(matches!(
            sub.try_recv().unwrap().event,
            PlaybackEvent::VideoCompleted { .. }
        ));
        assert!(matches!(
            sub.try_recv().unwrap().event,
            PlaybackEvent::VideoStopped { .. }
        ));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_canceled_subscriber_receives_nothing() {
        let registry = SubscriberRegistry::new();
        let mut sub = registry.subscribe().await;
        registry.unsubscribe(sub.id()).await;

        registry.broadcast(1, events()).await;

        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_compaction_evicts_canceled() {
        let registry = SubscriberRegistry::new();
        let sub_a = registry.subscribe().await;
        let _sub_b = registry.subscribe().await;
        registry.unsubscribe(sub_a.id()).await;
        assert_eq!(registry.len().await, 1);

        registry.broadcast(1, events()).await;

        assert_eq!(registry.inner.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_mailbox_is_evicted() {
        let registry = SubscriberRegistry::new();
        let sub = registry.subscribe().await;
        drop(sub);

        registry.broadcast(1, events()).await;

        assert_eq!(registry.inner.read().await.len(), 0);
    }
}
