//! Wake-up signals carried by the transport.

use serde::{Deserialize, Serialize};

use super::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Insert,
    Modify,
    Remove,
}

/// One entry of the store's change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub task_id: TaskId,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, task_id: TaskId) -> Self {
        Self { kind, task_id }
    }
}

/// A message on the transport.
///
/// Wire shape (JSON):
/// - `{"type": "store_change", "events": [{"kind": "INSERT", "taskId": "..."}]}`
/// - `{"type": "hand_off"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerSignal {
    /// A small batch of store change records.
    StoreChange { events: Vec<ChangeEvent> },

    /// An activation ran out of time with work remaining.
    HandOff,
}

impl TriggerSignal {
    pub fn insert(task_id: TaskId) -> Self {
        TriggerSignal::StoreChange {
            events: vec![ChangeEvent::new(ChangeKind::Insert, task_id)],
        }
    }

    /// Decode a raw transport message.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Does this change batch contain at least one insert?
    pub fn has_insert(&self) -> bool {
        match self {
            TriggerSignal::StoreChange { events } => {
                events.iter().any(|e| e.kind == ChangeKind::Insert)
            }
            TriggerSignal::HandOff => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape() {
        let raw = TriggerSignal::insert(TaskId::new("t1")).encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(value["type"], "store_change");
        assert_eq!(value["events"][0]["kind"], "INSERT");
        assert_eq!(value["events"][0]["taskId"], "t1");

        assert_eq!(
            TriggerSignal::decode(r#"{"type":"hand_off"}"#).unwrap(),
            TriggerSignal::HandOff
        );
    }

    #[test]
    fn unknown_shapes_do_not_decode() {
        assert!(TriggerSignal::decode(r#"{"type":"ping"}"#).is_err());
        assert!(TriggerSignal::decode("not json").is_err());
    }
}
