//! Approval queues - asynchronous human gates with lazy TTL expiry.
//!
//! An executor that decides a write action needs manual sign-off enqueues a
//! pending item here and parks its task. Expiry is pull-based: a pure
//! function over "now" applied before every read or mutation, never a
//! background timer. Resolved and expired items stay in bounded history for
//! audit; pending items are always kept when the cap overflows.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use podium_bus::EventHub;

use crate::error::GateError;

/// Default maximum number of stored approval items
pub const DEFAULT_APPROVAL_CAP: usize = 200;

/// Approval item status; decided at most once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl ApprovalStatus {
    /// Stable string form used in error messages and event payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Expired => "expired",
        }
    }
}

/// The opaque action a gate protects: enough to re-invoke it once approved
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatedAction {
    pub executor_id: String,
    pub args: Value,
}

/// A pending human decision gating a specific side-effecting call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalItem {
    pub id: String,
    /// Action category, one logical queue per category
    pub category: String,
    pub action: GatedAction,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ApprovalStatus,
    /// Task parked on this item, if the call was scheduler-driven
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

struct QueueState {
    items: HashMap<String, ApprovalItem>,
    order: VecDeque<String>,
}

/// Approval queue shared by all action categories
pub struct ApprovalQueue {
    state: RwLock<QueueState>,
    hub: Arc<EventHub>,
    cap: usize,
}

impl ApprovalQueue {
    /// Create a queue with the default retention cap
    pub fn new(hub: Arc<EventHub>) -> Self {
        Self::with_cap(hub, DEFAULT_APPROVAL_CAP)
    }

    /// Create a queue with an explicit retention cap
    pub fn with_cap(hub: Arc<EventHub>, cap: usize) -> Self {
        Self {
            state: RwLock::new(QueueState {
                items: HashMap::new(),
                order: VecDeque::new(),
            }),
            hub,
            cap: cap.max(1),
        }
    }

    /// Create a pending item and announce it
    pub async fn enqueue(
        &self,
        category: impl Into<String>,
        action: GatedAction,
        reason: impl Into<String>,
        ttl: Duration,
        task_id: Option<String>,
    ) -> ApprovalItem {
        let now = Utc::now();
        let item = ApprovalItem {
            id: uuid::Uuid::new_v4().to_string(),
            category: category.into(),
            action,
            reason: reason.into(),
            created_at: now,
            expires_at: now + ttl,
            status: ApprovalStatus::Pending,
            task_id,
        };

        let expired = {
            let mut state = self.state.write().await;
            let expired = prune_expired(&mut state, now);
            state.items.insert(item.id.clone(), item.clone());
            state.order.push_back(item.id.clone());
            trim_overflow(&mut state, self.cap);
            expired
        };
        self.announce_expired(expired).await;
        self.hub
            .emit("approval_pending", approval_payload(&item))
            .await;
        item
    }

    /// List items, newest last, optionally restricted to one category
    pub async fn list(&self, category: Option<&str>) -> Vec<ApprovalItem> {
        let now = Utc::now();
        let (expired, items) = {
            let mut state = self.state.write().await;
            let expired = prune_expired(&mut state, now);
            let items = state
                .order
                .iter()
                .filter_map(|id| state.items.get(id))
                .filter(|item| category.is_none_or(|c| item.category == c))
                .cloned()
                .collect();
            (expired, items)
        };
        self.announce_expired(expired).await;
        items
    }

    /// List only pending items
    pub async fn pending(&self, category: Option<&str>) -> Vec<ApprovalItem> {
        self.list(category)
            .await
            .into_iter()
            .filter(|item| item.status == ApprovalStatus::Pending)
            .collect()
    }

    /// Get one item by identifier
    pub async fn get(&self, id: &str) -> Option<ApprovalItem> {
        let now = Utc::now();
        let (expired, item) = {
            let mut state = self.state.write().await;
            let expired = prune_expired(&mut state, now);
            (expired, state.items.get(id).cloned())
        };
        self.announce_expired(expired).await;
        item
    }

    /// Approve a pending item.
    ///
    /// Re-invocation of the gated action and propagation into the waiting
    /// task belong to the runtime layer; the queue only decides the status.
    pub async fn approve(&self, id: &str) -> Result<ApprovalItem, GateError> {
        self.resolve(id, ApprovalStatus::Approved, "approval_approved")
            .await
    }

    /// Reject a pending item
    pub async fn reject(&self, id: &str) -> Result<ApprovalItem, GateError> {
        self.resolve(id, ApprovalStatus::Rejected, "approval_rejected")
            .await
    }

    async fn resolve(
        &self,
        id: &str,
        status: ApprovalStatus,
        event_type: &str,
    ) -> Result<ApprovalItem, GateError> {
        let now = Utc::now();
        let (expired, resolved) = {
            let mut state = self.state.write().await;
            let expired = prune_expired(&mut state, now);
            let item = state
                .items
                .get_mut(id)
                .ok_or_else(|| GateError::ApprovalNotFound(id.to_string()))?;
            if item.status != ApprovalStatus::Pending {
                return Err(GateError::ApprovalAlreadyResolved {
                    status: item.status,
                });
            }
            item.status = status;
            (expired, item.clone())
        };
        self.announce_expired(expired).await;
        tracing::info!(
            approval_id = %resolved.id,
            category = %resolved.category,
            status = resolved.status.as_str(),
            "approval resolved"
        );
        self.hub.emit(event_type, approval_payload(&resolved)).await;
        Ok(resolved)
    }

    async fn announce_expired(&self, expired: Vec<ApprovalItem>) {
        for item in expired {
            self.hub
                .emit("approval_expired", approval_payload(&item))
                .await;
        }
    }
}

/// Flip pending items past their deadline to `expired`
fn prune_expired(state: &mut QueueState, now: DateTime<Utc>) -> Vec<ApprovalItem> {
    let mut expired = Vec::new();
    for item in state.items.values_mut() {
        if item.status == ApprovalStatus::Pending && now > item.expires_at {
            item.status = ApprovalStatus::Expired;
            expired.push(item.clone());
        }
    }
    expired
}

/// Drop the oldest non-pending items until the cap holds; pending items are
/// always kept, even past the cap
fn trim_overflow(state: &mut QueueState, cap: usize) {
    while state.items.len() > cap {
        let victim = state
            .order
            .iter()
            .find(|id| {
                state
                    .items
                    .get(*id)
                    .map(|item| item.status != ApprovalStatus::Pending)
                    .unwrap_or(true)
            })
            .cloned();
        match victim {
            Some(id) => {
                state.items.remove(&id);
                state.order.retain(|other| *other != id);
            }
            None => break,
        }
    }
}

fn approval_payload(item: &ApprovalItem) -> Value {
    let mut payload = json!({
        "approvalId": item.id,
        "category": item.category,
        "reason": item.reason,
        "status": item.status.as_str(),
        "expiresAt": item.expires_at,
    });
    if let Some(task_id) = &item.task_id {
        payload["taskId"] = json!(task_id);
    }
    payload
}
