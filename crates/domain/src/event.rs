//! Event — an immutable record of something that happened to a rule.
//!
//! Events are published when rules are created, edited or change status,
//! when an execution is recorded, when the trust gate holds a rule, and when
//! actions are queued for approval.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{EventId, RuleId};
use crate::time::{Timestamp, now};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RuleCreated,
    RuleUpdated,
    RuleStatusChanged,
    ExecutionRecorded,
    /// The trust gate held a triggered rule; this is the degraded-signal alert.
    TrustGateHold,
    /// Actions were queued for manual approval.
    ApprovalRequested,
}

impl EventType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RuleCreated => "rule_created",
            Self::RuleUpdated => "rule_updated",
            Self::RuleStatusChanged => "rule_status_changed",
            Self::ExecutionRecorded => "execution_recorded",
            Self::TrustGateHold => "trust_gate_hold",
            Self::ApprovalRequested => "approval_requested",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    pub rule_id: Option<RuleId>,
    pub timestamp: Timestamp,
    pub data: serde_json::Value,
}

impl Event {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(event_type: EventType, rule_id: Option<RuleId>, data: serde_json::Value) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            rule_id,
            timestamp: now(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_stamp_new_event_with_fresh_id() {
        let rule_id = RuleId::new();
        let a = Event::new(EventType::RuleCreated, Some(rule_id), serde_json::json!({}));
        let b = Event::new(EventType::RuleCreated, Some(rule_id), serde_json::json!({}));
        assert_ne!(a.id, b.id);
        assert_eq!(a.rule_id, Some(rule_id));
    }

    #[test]
    fn should_serialize_event_type_in_snake_case() {
        let event = Event::new(EventType::TrustGateHold, None, serde_json::json!({"score": 55}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "trust_gate_hold");
        assert_eq!(json["data"]["score"], 55);
    }
}
