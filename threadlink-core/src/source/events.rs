//! App-server notification streams, one JSON message per line.

use serde_json::{Map, Value};

use crate::record::ThreadItem;
use crate::source::LinkEvent;
use crate::thread::ThreadSnapshot;

/// Link events carried by one notification.
///
/// Accepts `{ "method", "params": { … } }` as well as a bare params object.
/// Messages without a thread id or anything linkable yield nothing.
pub fn parse_event(value: &Value) -> Vec<LinkEvent> {
    let Some(message) = value.as_object() else {
        return Vec::new();
    };
    let body = message
        .get("params")
        .and_then(Value::as_object)
        .unwrap_or(message);

    if let Some(thread) = body.get("thread").filter(|thread| thread.is_object()) {
        let snapshot = ThreadSnapshot::from_value(thread);
        if !snapshot.id.is_empty() {
            return vec![LinkEvent::Thread(snapshot)];
        }
    }

    let Some(thread_id) = body_thread_id(body) else {
        return Vec::new();
    };

    if let Some(item) = body.get("item").filter(|item| item.is_object()) {
        return vec![LinkEvent::Item {
            thread_id,
            item: ThreadItem::from_value(item),
        }];
    }

    body.get("turn")
        .and_then(|turn| turn.get("items"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|item| LinkEvent::Item {
            thread_id: thread_id.clone(),
            item: ThreadItem::from_value(item),
        })
        .collect()
}

fn body_thread_id(body: &Map<String, Value>) -> Option<String> {
    first_id(body, &["threadId", "thread_id", "conversationId"])
        .or_else(|| {
            ["item", "turn"]
                .iter()
                .filter_map(|key| body.get(*key).and_then(Value::as_object))
                .find_map(|nested| first_id(nested, &["threadId", "thread_id"]))
        })
}

fn first_id(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|id| !id.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::source::LinkEvent;
    use crate::source::events::parse_event;

    #[test]
    fn item_notification_yields_item_event() {
        let events = parse_event(&json!({
            "method": "item/completed",
            "params": {
                "threadId": "root",
                "turnId": "turn-1",
                "item": {"type": "collabAgentToolCall", "receiverThreadIds": ["c1"]}
            }
        }));

        assert_eq!(events.len(), 1);
        let LinkEvent::Item { thread_id, item } = &events[0] else {
            panic!("expected item event");
        };
        assert_eq!(thread_id, "root");
        assert_eq!(item.fields().child_ids(), vec!["c1"]);
    }

    #[test]
    fn bare_params_with_snake_case_thread_id() {
        let events = parse_event(&json!({
            "thread_id": "root",
            "item": {"type": "collabToolCall", "new_thread_id": "c2"}
        }));
        assert!(matches!(&events[..], [LinkEvent::Item { thread_id, .. }] if thread_id == "root"));
    }

    #[test]
    fn turn_notification_yields_every_item() {
        let events = parse_event(&json!({
            "method": "turn/completed",
            "params": {
                "threadId": "root",
                "turn": {"id": "turn-2", "items": [{"type": "userMessage"}, {"newThreadId": "c3"}]}
            }
        }));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn thread_notification_yields_snapshot() {
        let events = parse_event(&json!({
            "method": "thread/started",
            "params": {"thread": {"id": "root", "turns": []}}
        }));
        assert!(matches!(&events[..], [LinkEvent::Thread(snapshot)] if snapshot.id == "root"));
    }

    #[test]
    fn messages_without_thread_are_ignored() {
        let unaddressed = json!({"method": "item/completed", "params": {"item": {}}});
        assert!(parse_event(&unaddressed).is_empty());
        assert!(parse_event(&json!({"method": "account/updated", "params": {}})).is_empty());
        assert!(parse_event(&json!("text")).is_empty());
    }
}
