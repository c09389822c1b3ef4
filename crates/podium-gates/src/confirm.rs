//! Confirm tokens - single-use, hash-bound dry-run/execute credentials.
//!
//! A "plan" call computes a canonical hash over the action identity, its
//! parameters, and the plan trace, then mints a token bound to that hash.
//! The matching "execute" call recomputes the hash and consumes the token;
//! any mismatch, reuse, or expiry rejects the call before the side effect
//! runs. Expiry is evaluated lazily on access.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::error::GateError;

/// Default token lifetime
pub const DEFAULT_CONFIRM_TTL_SECONDS: i64 = 300;

/// A minted token and the hash it is bound to
#[derive(Debug, Clone)]
pub struct ConfirmToken {
    pub token: String,
    pub payload_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

/// Why a token was not accepted.
///
/// Every variant surfaces to callers as the same `confirm_required` error;
/// the distinction exists for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmRejection {
    Missing,
    Expired,
    Consumed,
    HashMismatch,
}

impl ConfirmRejection {
    /// Stable string form used in error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmRejection::Missing => "token missing or unknown",
            ConfirmRejection::Expired => "token expired",
            ConfirmRejection::Consumed => "token already consumed",
            ConfirmRejection::HashMismatch => "payload does not match the planned action",
        }
    }
}

/// In-memory store of outstanding confirm tokens
pub struct ConfirmTokenStore {
    tokens: RwLock<HashMap<String, ConfirmToken>>,
    ttl: Duration,
}

impl ConfirmTokenStore {
    /// Create a store with the default token lifetime
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_CONFIRM_TTL_SECONDS))
    }

    /// Create a store with an explicit token lifetime
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Mint a token bound to a payload hash. No side effect occurs at plan
    /// time; the token is the only artifact.
    pub async fn mint(&self, payload_hash: impl Into<String>) -> ConfirmToken {
        let now = Utc::now();
        let token = ConfirmToken {
            token: uuid::Uuid::new_v4().to_string(),
            payload_hash: payload_hash.into(),
            issued_at: now,
            expires_at: now + self.ttl,
            consumed: false,
        };
        let mut tokens = self.tokens.write().await;
        tokens.retain(|_, t| now <= t.expires_at);
        tokens.insert(token.token.clone(), token.clone());
        token
    }

    /// Consume a token: it must exist, be unexpired, unconsumed, and bound
    /// to exactly the presented hash. Consumption is irreversible.
    pub async fn consume(&self, token: &str, payload_hash: &str) -> Result<(), GateError> {
        let now = Utc::now();
        let mut tokens = self.tokens.write().await;
        let Some(entry) = tokens.get_mut(token) else {
            return Err(reject(ConfirmRejection::Missing));
        };
        if now > entry.expires_at {
            tokens.remove(token);
            return Err(reject(ConfirmRejection::Expired));
        }
        if entry.consumed {
            return Err(reject(ConfirmRejection::Consumed));
        }
        if entry.payload_hash != payload_hash {
            return Err(reject(ConfirmRejection::HashMismatch));
        }
        entry.consumed = true;
        Ok(())
    }

    /// Number of tokens currently stored
    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    /// Whether the store holds no tokens
    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

impl Default for ConfirmTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

fn reject(reason: ConfirmRejection) -> GateError {
    GateError::ConfirmRequired { reason }
}

/// Canonical hash binding a plan to its execute call: the action identity,
/// the canonically serialized parameter object, and the plan trace when one
/// exists. Hex-encoded SHA-256.
pub fn canonical_hash(action: &str, params: &Value, trace: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(action.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical_json(params).as_bytes());
    if let Some(trace) = trace {
        hasher.update([0u8]);
        hasher.update(trace.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Serialize a value with object keys sorted at every level, independent of
/// map-ordering features
fn canonical_json(value: &Value) -> String {
    fn write(value: &Value, out: &mut String) {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                out.push('{');
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&serde_json::to_string(key).unwrap_or_default());
                    out.push(':');
                    write(&map[*key], out);
                }
                out.push('}');
            }
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write(item, out);
                }
                out.push(']');
            }
            other => out.push_str(&other.to_string()),
        }
    }
    let mut out = String::new();
    write(value, &mut out);
    out
}
