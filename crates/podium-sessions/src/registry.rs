//! Session registry - long-lived handles with listener fan-out.
//!
//! Reuses the same registry + listener-set + bounded-buffer discipline as
//! the event hub: a handle is created with a generated identifier, holds a
//! capped rolling chunk buffer, and notifies a set of per-handle listeners
//! on every chunk and on close. Closure is idempotent and always announces
//! a terminal event through the bus.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};

use podium_bus::EventHub;

/// Default number of chunks kept in a handle's rolling buffer
pub const DEFAULT_BUFFER_CHUNKS: usize = 500;

/// Session registry errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("session closed: {0}")]
    Closed(String),
}

/// One chunk of session output
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionChunk {
    pub session_id: String,
    /// Monotonic per-session sequence number
    pub seq: u64,
    pub data: String,
    pub timestamp: DateTime<Utc>,
}

/// What a listener receives: live chunks, then a terminal close marker
#[derive(Debug, Clone)]
pub enum SessionSignal {
    Chunk(SessionChunk),
    Closed,
}

/// Public view of a handle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    /// Handle kind, e.g. "terminal" or "watch"
    pub kind: String,
    /// External source this handle belongs to
    pub source_id: String,
    pub created_at: DateTime<Utc>,
    pub closed: bool,
    pub chunk_count: u64,
}

/// An attached listener: its identifier plus the signal receiver
pub struct SessionListener {
    pub id: String,
    pub rx: mpsc::UnboundedReceiver<SessionSignal>,
}

struct SessionHandle {
    info: SessionInfo,
    buffer: VecDeque<SessionChunk>,
    listeners: HashMap<String, mpsc::UnboundedSender<SessionSignal>>,
    next_seq: u64,
}

/// Registry of long-lived session handles
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    hub: Arc<EventHub>,
    buffer_chunks: usize,
}

impl SessionRegistry {
    /// Create a registry with the default buffer cap
    pub fn new(hub: Arc<EventHub>) -> Self {
        Self::with_buffer(hub, DEFAULT_BUFFER_CHUNKS)
    }

    /// Create a registry with an explicit per-handle buffer cap
    pub fn with_buffer(hub: Arc<EventHub>, buffer_chunks: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            hub,
            buffer_chunks: buffer_chunks.max(1),
        }
    }

    /// Open a new handle and announce it
    pub async fn open(
        &self,
        kind: impl Into<String>,
        source_id: impl Into<String>,
    ) -> SessionInfo {
        let info = SessionInfo {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.into(),
            source_id: source_id.into(),
            created_at: Utc::now(),
            closed: false,
            chunk_count: 0,
        };
        let handle = SessionHandle {
            info: info.clone(),
            buffer: VecDeque::new(),
            listeners: HashMap::new(),
            next_seq: 0,
        };
        self.sessions
            .write()
            .await
            .insert(info.id.clone(), handle);
        self.hub
            .emit(
                "session_opened",
                json!({
                    "sessionId": info.id,
                    "sourceId": info.source_id,
                    "kind": info.kind,
                }),
            )
            .await;
        info
    }

    /// Append a chunk to a handle's buffer and notify its listeners.
    /// Listeners whose channel is gone are dropped on the spot.
    pub async fn push(&self, session_id: &str, data: impl Into<String>) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let handle = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        if handle.info.closed {
            return Err(SessionError::Closed(session_id.to_string()));
        }
        let chunk = SessionChunk {
            session_id: session_id.to_string(),
            seq: handle.next_seq,
            data: data.into(),
            timestamp: Utc::now(),
        };
        handle.next_seq += 1;
        handle.info.chunk_count += 1;
        if handle.buffer.len() >= self.buffer_chunks {
            handle.buffer.pop_front();
        }
        handle.buffer.push_back(chunk.clone());
        handle
            .listeners
            .retain(|_, tx| tx.send(SessionSignal::Chunk(chunk.clone())).is_ok());
        Ok(())
    }

    /// Attach a listener: the buffered chunks are replayed first, then live
    /// chunks follow.
    pub async fn attach(&self, session_id: &str) -> Result<SessionListener, SessionError> {
        let mut sessions = self.sessions.write().await;
        let handle = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        for chunk in &handle.buffer {
            let _ = tx.send(SessionSignal::Chunk(chunk.clone()));
        }
        let id = uuid::Uuid::new_v4().to_string();
        if handle.info.closed {
            let _ = tx.send(SessionSignal::Closed);
        } else {
            handle.listeners.insert(id.clone(), tx);
        }
        Ok(SessionListener { id, rx })
    }

    /// Detach a listener; missing identifiers are a no-op
    pub async fn detach(&self, session_id: &str, listener_id: &str) {
        if let Some(handle) = self.sessions.write().await.get_mut(session_id) {
            handle.listeners.remove(listener_id);
        }
    }

    /// Close a handle: notify and unsubscribe every listener, announce the
    /// terminal event. Idempotent - closing twice does nothing the second
    /// time.
    pub async fn close(&self, session_id: &str) -> Result<(), SessionError> {
        let announce = {
            let mut sessions = self.sessions.write().await;
            let handle = sessions
                .get_mut(session_id)
                .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
            if handle.info.closed {
                false
            } else {
                handle.info.closed = true;
                for (_, tx) in handle.listeners.drain() {
                    let _ = tx.send(SessionSignal::Closed);
                }
                true
            }
        };
        if announce {
            tracing::info!(session_id = %session_id, "session closed");
            self.hub
                .emit("session_closed", json!({"sessionId": session_id}))
                .await;
        }
        Ok(())
    }

    /// Get a handle's public view
    pub async fn get(&self, session_id: &str) -> Option<SessionInfo> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|h| h.info.clone())
    }

    /// List all handles
    pub async fn list(&self) -> Vec<SessionInfo> {
        self.sessions
            .read()
            .await
            .values()
            .map(|h| h.info.clone())
            .collect()
    }

    /// Return a handle's buffered chunks, oldest first
    pub async fn buffer(&self, session_id: &str) -> Result<Vec<SessionChunk>, SessionError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|h| h.buffer.iter().cloned().collect())
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }
}
