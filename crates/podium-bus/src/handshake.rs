//! Upgrade handshake helpers.
//!
//! The raw socket transport is established with a manual HTTP upgrade; the
//! only cryptographic piece is deriving the accept key from the client key.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha1::{Digest, Sha1};

/// Fixed GUID every handshake concatenates onto the client key
const ACCEPT_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Derive the `Sec-WebSocket-Accept` value for a client key:
/// base64 of the SHA-1 of the key concatenated with the protocol GUID.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.trim().as_bytes());
    hasher.update(ACCEPT_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}
