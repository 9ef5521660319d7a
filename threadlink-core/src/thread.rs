use serde_json::{Map, Value};

use crate::record::ThreadItem;

/// A thread's full history: ordered turns of ordered items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadSnapshot {
    pub id: String,
    pub turns: Vec<TurnSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnSnapshot {
    pub id: Option<String>,
    pub items: Vec<ThreadItem>,
}

impl ThreadSnapshot {
    /// Parses a thread object; shapes that do not fit become empty.
    pub fn from_value(value: &Value) -> Self {
        let Some(thread) = value.as_object() else {
            return Self::default();
        };

        let turns = thread
            .get("turns")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .map(TurnSnapshot::from_value)
            .collect();

        Self {
            id: thread_id_field(thread).unwrap_or_default(),
            turns,
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &ThreadItem> {
        self.turns.iter().flat_map(|turn| turn.items.iter())
    }

    pub fn item_count(&self) -> usize {
        self.turns.iter().map(|turn| turn.items.len()).sum()
    }
}

impl TurnSnapshot {
    pub fn from_value(value: &Value) -> Self {
        let Some(turn) = value.as_object() else {
            return Self::default();
        };

        Self {
            id: turn
                .get("id")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            items: turn
                .get("items")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .map(ThreadItem::from_value)
                .collect(),
        }
    }
}

fn thread_id_field(object: &Map<String, Value>) -> Option<String> {
    ["id", "threadId", "thread_id"]
        .iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|id| !id.is_empty())
        .map(ToString::to_string)
}
