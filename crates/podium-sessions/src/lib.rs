//! Podium session registries
//!
//! A generalized registry for long-lived external handles (interactive
//! shell sessions, periodic watch/frame streams): each handle keeps a
//! capped rolling buffer of chunks and a per-handle listener set, and its
//! lifecycle transitions are announced through the event bus.

mod registry;

pub use registry::{
    SessionChunk, SessionError, SessionInfo, SessionListener, SessionRegistry, SessionSignal,
    DEFAULT_BUFFER_CHUNKS,
};
