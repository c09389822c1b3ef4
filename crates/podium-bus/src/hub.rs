//! EventHub - bounded history plus live fan-out.
//!
//! The hub owns both halves of runtime visibility:
//! - a fixed-capacity FIFO history ring shared by all consumers
//! - a subscriber registry fanned out to on every emit
//!
//! Subscribers carry per-subscriber channels rather than one broadcast
//! channel so that a failed delivery identifies exactly the dead subscriber,
//! which is then removed immediately (self-healing; no retry, no
//! backpressure buffering beyond the shared history).

use std::collections::{HashMap, VecDeque};

use serde_json::Value;
use tokio::sync::{mpsc, RwLock};

use crate::event::{EventFilter, LiveEvent};

/// Default capacity of the shared history ring
pub const DEFAULT_HISTORY_CAPACITY: usize = 1_000;

/// Default number of recent matching events replayed to a new subscriber
pub const DEFAULT_REPLAY_LIMIT: usize = 50;

struct Subscriber {
    filter: EventFilter,
    tx: mpsc::UnboundedSender<LiveEvent>,
}

struct HubState {
    history: VecDeque<LiveEvent>,
    subscribers: HashMap<String, Subscriber>,
}

/// A registered subscription: the identifier plus the live receiver.
///
/// The receiver yields the bootstrap replay first, then live events, with no
/// event skipped or delivered twice across that boundary.
pub struct SubscriberHandle {
    pub id: String,
    pub rx: mpsc::UnboundedReceiver<LiveEvent>,
}

/// EventHub - append-only bounded history with filtered fan-out
pub struct EventHub {
    state: RwLock<HubState>,
    capacity: usize,
    replay_limit: usize,
}

impl EventHub {
    /// Create a hub with default capacity and replay limit
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY, DEFAULT_REPLAY_LIMIT)
    }

    /// Create a hub with explicit history capacity and bootstrap replay limit
    pub fn with_capacity(capacity: usize, replay_limit: usize) -> Self {
        Self {
            state: RwLock::new(HubState {
                history: VecDeque::new(),
                subscribers: HashMap::new(),
            }),
            capacity: capacity.max(1),
            replay_limit,
        }
    }

    /// Emit an event: stamp it, append to history (oldest dropped on
    /// overflow), fan out to every matching subscriber.
    pub async fn emit(&self, event_type: impl Into<String>, payload: Value) -> LiveEvent {
        let event = LiveEvent::new(event_type, payload);
        let mut state = self.state.write().await;
        if state.history.len() >= self.capacity {
            state.history.pop_front();
        }
        state.history.push_back(event.clone());
        state.subscribers.retain(|id, sub| {
            if !sub.filter.matches(&event) {
                return true;
            }
            if sub.tx.send(event.clone()).is_ok() {
                true
            } else {
                tracing::debug!(subscriber_id = %id, "removing subscriber after failed delivery");
                false
            }
        });
        event
    }

    /// Register a subscriber and bootstrap it with the most recent matching
    /// events from history.
    ///
    /// Replay and registration happen under the same lock, so the stream is a
    /// consistent bootstrap-then-live sequence.
    pub async fn subscribe(&self, filter: EventFilter) -> SubscriberHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.write().await;
        let matching: Vec<&LiveEvent> = state
            .history
            .iter()
            .filter(|event| filter.matches(event))
            .collect();
        let start = matching.len().saturating_sub(self.replay_limit);
        for event in &matching[start..] {
            let _ = tx.send((*event).clone());
        }
        let id = uuid::Uuid::new_v4().to_string();
        state
            .subscribers
            .insert(id.clone(), Subscriber { filter, tx });
        SubscriberHandle { id, rx }
    }

    /// Remove a subscriber; missing identifiers are a no-op
    pub async fn unsubscribe(&self, id: &str) {
        self.state.write().await.subscribers.remove(id);
    }

    /// Return the most recent matching events, oldest first
    pub async fn snapshot(&self, filter: &EventFilter, limit: usize) -> Vec<LiveEvent> {
        let state = self.state.read().await;
        let matching: Vec<&LiveEvent> = state
            .history
            .iter()
            .filter(|event| filter.matches(event))
            .collect();
        let start = matching.len().saturating_sub(limit);
        matching[start..].iter().map(|e| (*e).clone()).collect()
    }

    /// Number of events currently retained
    pub async fn history_len(&self) -> usize {
        self.state.read().await.history.len()
    }

    /// Number of live subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.state.read().await.subscribers.len()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
