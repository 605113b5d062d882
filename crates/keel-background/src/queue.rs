//! Bounded FIFO of messages that could not be delivered.
//!
//! Capacity is [`MAX_QUEUE_SIZE`]; pushing past it evicts the oldest entry.
//! Eviction is strictly by age with no importance weighting. The queue is
//! mirrored to durable storage under [`QUEUE_KEY`] by its owner, and
//! [`MessageQueue::restore`] only trusts a snapshot whose entries all carry a
//! string `type` and a numeric `timestamp`.

use std::collections::VecDeque;

use keel_core::{Envelope, EventKind, EventMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Maximum queued messages.
pub const MAX_QUEUE_SIZE: usize = 100;

/// Storage key of the queue snapshot.
pub const QUEUE_KEY: &str = "bg_msg_queue";

/// Storage key of the latest snapshot for one message type.
pub fn snapshot_key(kind: &str) -> String {
    format!("bg_msg_{kind}")
}

/// A message awaiting delivery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueuedMessage {
    /// Message type, e.g. `SESSION_LOGIN`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Payload.
    #[serde(default)]
    pub data: Value,
    /// Enqueue time, Unix milliseconds.
    pub timestamp: i64,
}

impl QueuedMessage {
    /// Build a message stamped at `timestamp`.
    pub fn new(kind: impl Into<String>, data: Value, timestamp: i64) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp,
        }
    }

    /// Wrap as a provider `message` event for delivery over a channel.
    pub fn to_envelope(&self) -> Envelope {
        Envelope::Event(EventMessage::new(
            EventKind::Message,
            serde_json::json!({
                "type": self.kind,
                "data": self.data,
                "timestamp": self.timestamp,
            }),
        ))
    }

    fn is_well_formed(value: &Value) -> bool {
        value.get("type").is_some_and(Value::is_string)
            && value.get("timestamp").is_some_and(Value::is_number)
    }
}

/// Bounded, oldest-evicted-first message queue.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageQueue {
    entries: VecDeque<QueuedMessage>,
}

impl MessageQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted snapshot. Anything but an array of well-formed
    /// entries yields an empty queue.
    pub fn restore(snapshot: Option<&Value>) -> Self {
        let Some(snapshot) = snapshot else {
            return Self::new();
        };
        let Some(items) = snapshot.as_array() else {
            warn!("persisted queue is not an array, resetting");
            return Self::new();
        };
        if !items.iter().all(QueuedMessage::is_well_formed) {
            warn!(entries = items.len(), "persisted queue has malformed entries, resetting");
            return Self::new();
        }
        match serde_json::from_value::<Vec<QueuedMessage>>(snapshot.clone()) {
            Ok(messages) => {
                let mut queue = Self::new();
                for message in messages {
                    let _ = queue.push(message);
                }
                queue
            }
            Err(e) => {
                warn!(error = %e, "persisted queue unreadable, resetting");
                Self::new()
            }
        }
    }

    /// Append, evicting and returning the oldest entry when full.
    pub fn push(&mut self, message: QueuedMessage) -> Option<QueuedMessage> {
        let evicted = if self.entries.len() >= MAX_QUEUE_SIZE {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(message);
        evicted
    }

    /// Remove and return everything in original order.
    pub fn drain(&mut self) -> Vec<QueuedMessage> {
        self.entries.drain(..).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.entries.iter()
    }

    /// JSON array snapshot for persistence.
    pub fn to_value(&self) -> Value {
        Value::Array(
            self.entries
                .iter()
                .filter_map(|m| serde_json::to_value(m).ok())
                .collect(),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn msg(i: usize) -> QueuedMessage {
        QueuedMessage::new("PRICE", json!({ "n": i }), i64::try_from(i).unwrap())
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut queue = MessageQueue::new();
        for i in 1..=150 {
            let evicted = queue.push(msg(i));
            if i <= MAX_QUEUE_SIZE {
                assert!(evicted.is_none());
            } else {
                assert_eq!(evicted.unwrap().data["n"], i - MAX_QUEUE_SIZE);
            }
        }
        assert_eq!(queue.len(), 100);
        assert_eq!(queue.iter().next().unwrap().data["n"], 51);
    }

    #[test]
    fn drain_preserves_order_and_empties() {
        let mut queue = MessageQueue::new();
        for i in 0..3 {
            let _ = queue.push(msg(i));
        }
        let drained: Vec<_> = queue.drain().into_iter().map(|m| m.timestamp).collect();
        assert_eq!(drained, vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn snapshot_round_trips() {
        let mut queue = MessageQueue::new();
        let _ = queue.push(msg(7));
        let value = queue.to_value();
        assert_eq!(value[0]["type"], "PRICE");
        assert_eq!(MessageQueue::restore(Some(&value)), queue);
    }

    #[test]
    fn restore_rejects_malformed_snapshots() {
        assert!(MessageQueue::restore(None).is_empty());
        assert!(MessageQueue::restore(Some(&json!({"type": "X"}))).is_empty());
        assert!(MessageQueue::restore(Some(&json!([{"type": 1, "timestamp": 0}]))).is_empty());
        assert!(MessageQueue::restore(Some(&json!([{"type": "X", "timestamp": "now"}]))).is_empty());
        assert!(
            MessageQueue::restore(Some(&json!([
                {"type": "A", "timestamp": 1},
                {"type": "B"}
            ])))
            .is_empty()
        );
    }

    #[test]
    fn restore_accepts_missing_data() {
        let queue = MessageQueue::restore(Some(&json!([{"type": "A", "timestamp": 5}])));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.iter().next().unwrap().data, Value::Null);
    }

    #[test]
    fn envelope_wraps_as_message_event() {
        let env = msg(3).to_envelope();
        let value = env.to_value();
        assert_eq!(value["type"], "EVENT");
        assert_eq!(value["event"], "message");
        assert_eq!(value["data"]["type"], "PRICE");
    }

    proptest! {
        #[test]
        fn keeps_most_recent_min_n_100(n in 0usize..400) {
            let mut queue = MessageQueue::new();
            for i in 0..n {
                let _ = queue.push(msg(i));
            }
            let kept = n.min(MAX_QUEUE_SIZE);
            prop_assert_eq!(queue.len(), kept);
            let expected: Vec<i64> = (n - kept..n).map(|i| i64::try_from(i).unwrap()).collect();
            let actual: Vec<i64> = queue.iter().map(|m| m.timestamp).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
