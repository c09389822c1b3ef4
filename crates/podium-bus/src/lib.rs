//! Podium event bus
//!
//! The hub is the single distribution point for runtime visibility:
//! - LiveEvent: immutable typed records in a bounded FIFO history
//! - EventHub: fan-out to filtered subscribers over any transport
//! - frame / handshake: the wire pieces of the raw socket transport

pub mod event;
pub mod frame;
pub mod handshake;
pub mod hub;

pub use event::{EventFilter, LiveEvent};
pub use frame::{decode_frame, encode_close_frame, encode_text_frame, Frame, FrameError};
pub use handshake::accept_key;
pub use hub::{EventHub, SubscriberHandle, DEFAULT_HISTORY_CAPACITY, DEFAULT_REPLAY_LIMIT};
