//! Live event types and subscriber filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An immutable record broadcast to matching subscribers and retained in
/// bounded history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveEvent {
    /// Unique identifier for this event
    pub id: String,
    /// Event type tag, e.g. "task_created"
    #[serde(rename = "type")]
    pub event_type: String,
    /// Emission timestamp
    pub timestamp: DateTime<Utc>,
    /// Event payload
    pub payload: Value,
}

impl LiveEvent {
    /// Create a new event stamped with an identifier and the current time
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Optional subscriber filter; all fields AND-combined.
///
/// An unset field is a wildcard. A set field must equal the corresponding
/// payload field, and a payload missing that field fails the match.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    pub session_id: Option<String>,
    pub source_id: Option<String>,
    pub task_id: Option<String>,
}

impl EventFilter {
    /// Check whether an event passes this filter
    pub fn matches(&self, event: &LiveEvent) -> bool {
        field_matches(&self.session_id, &event.payload, "sessionId")
            && field_matches(&self.source_id, &event.payload, "sourceId")
            && field_matches(&self.task_id, &event.payload, "taskId")
    }
}

fn field_matches(expected: &Option<String>, payload: &Value, key: &str) -> bool {
    match expected {
        None => true,
        Some(want) => payload
            .get(key)
            .and_then(|v| v.as_str())
            .map(|got| got == want)
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = EventFilter::default();
        let event = LiveEvent::new("task_created", json!({"taskId": "t1"}));
        assert!(filter.matches(&event));
        let bare = LiveEvent::new("ping", json!({}));
        assert!(filter.matches(&bare));
    }

    #[test]
    fn test_set_field_must_equal_payload_field() {
        let filter = EventFilter {
            task_id: Some("t1".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&LiveEvent::new("x", json!({"taskId": "t1"}))));
        assert!(!filter.matches(&LiveEvent::new("x", json!({"taskId": "t2"}))));
    }

    #[test]
    fn test_missing_payload_field_fails_the_match() {
        let filter = EventFilter {
            task_id: Some("t1".to_string()),
            ..Default::default()
        };
        assert!(!filter.matches(&LiveEvent::new("x", json!({"sessionId": "s1"}))));
    }

    #[test]
    fn test_filter_fields_are_and_combined() {
        let filter = EventFilter {
            session_id: Some("s1".to_string()),
            task_id: Some("t1".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&LiveEvent::new(
            "x",
            json!({"sessionId": "s1", "taskId": "t1"})
        )));
        assert!(!filter.matches(&LiveEvent::new("x", json!({"sessionId": "s1"}))));
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = LiveEvent::new("task_created", json!({"taskId": "t1"}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "task_created");
        assert_eq!(value["payload"]["taskId"], "t1");
    }
}
