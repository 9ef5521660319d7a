//! Codex rollout transcripts (`rollout-<timestamp>-<id>.jsonl`).
//!
//! Rollouts do not carry app-server items, so the lines that imply a
//! parent/child relation are rewritten into collaboration items.

use std::collections::HashMap;
use std::path::Path;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};

use crate::record::{COLLAB_AGENT_TOOL_CALL, ThreadItem};
use crate::thread::{ThreadSnapshot, TurnSnapshot};

pub const ROLLOUT_LINE_TYPES: &[&str] = &[
    "session_meta",
    "response_item",
    "event_msg",
    "turn_context",
    "compacted",
];

static ROLLOUT_FILE_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})\.jsonl$")
        .expect("valid regex")
});

pub fn is_rollout_line(value: &Value) -> bool {
    value
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|line_type| ROLLOUT_LINE_TYPES.contains(&line_type))
}

pub fn session_id_from_file_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    ROLLOUT_FILE_ID_RE
        .captures(name)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_ascii_lowercase())
}

/// Builds a snapshot from parsed rollout lines.
///
/// Turns are split at `turn_context` lines. The thread id comes from
/// `session_meta`, else from the file name.
pub fn rollout_snapshot(
    path: &Path,
    lines: &[Value],
    warnings: &mut Vec<String>,
) -> ThreadSnapshot {
    let thread_id = lines
        .iter()
        .filter(|line| line.get("type").and_then(Value::as_str) == Some("session_meta"))
        .find_map(|line| line.pointer("/payload/id").and_then(Value::as_str))
        .map(ToString::to_string)
        .or_else(|| session_id_from_file_name(path))
        .unwrap_or_default();

    let mut turns = Vec::new();
    let mut current = TurnSnapshot::default();
    let mut spawn_calls: HashMap<String, (String, Value)> = HashMap::new();

    for line in lines {
        let Some(payload) = line.get("payload") else {
            continue;
        };

        match line.get("type").and_then(Value::as_str) {
            Some("session_meta") => {
                if let Some(item) = spawned_from(payload, &thread_id) {
                    current.items.push(item);
                }
            }
            Some("turn_context") => {
                if !current.items.is_empty() {
                    turns.push(std::mem::take(&mut current));
                }
                current.id = payload
                    .get("turn_id")
                    .and_then(Value::as_str)
                    .map(ToString::to_string);
            }
            Some("response_item") => {
                if let Some(item) = collab_call_item(payload, &mut spawn_calls, warnings) {
                    current.items.push(item);
                }
            }
            Some("event_msg") => current.items.push(ThreadItem::from_value(payload)),
            _ => {}
        }
    }

    if !current.items.is_empty() || current.id.is_some() {
        turns.push(current);
    }

    ThreadSnapshot {
        id: thread_id,
        turns,
    }
}

/// A child rollout names its parent in `source.subagent.thread_spawn`.
fn spawned_from(payload: &Value, thread_id: &str) -> Option<ThreadItem> {
    let parent_id = payload
        .pointer("/source/subagent/thread_spawn/parent_thread_id")
        .and_then(Value::as_str)?;
    if thread_id.is_empty() {
        return None;
    }

    Some(ThreadItem::from_value(&json!({
        "type": COLLAB_AGENT_TOOL_CALL,
        "senderThreadId": parent_id,
        "newThreadId": thread_id,
    })))
}

fn collab_call_item(
    payload: &Value,
    calls: &mut HashMap<String, (String, Value)>,
    warnings: &mut Vec<String>,
) -> Option<ThreadItem> {
    let call_id = payload.get("call_id").and_then(Value::as_str)?;

    match payload.get("type").and_then(Value::as_str)? {
        "function_call" => {
            let name = payload.get("name").and_then(Value::as_str)?;
            if !matches!(
                name,
                "spawn_agent" | "send_input" | "resume_agent" | "wait" | "close_agent"
            ) {
                return None;
            }
            let args = payload
                .get("arguments")
                .and_then(Value::as_str)
                .and_then(|arguments| serde_json::from_str::<Value>(arguments).ok())
                .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
            calls.insert(call_id.to_string(), (name.to_string(), args));
            None
        }
        "function_call_output" => {
            let (name, args) = calls.remove(call_id)?;
            let output_raw = payload
                .get("output")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let output: Value = serde_json::from_str(output_raw).unwrap_or_default();

            let item = match name.as_str() {
                "spawn_agent" => {
                    let Some(agent_id) = output.get("agent_id").and_then(Value::as_str) else {
                        warnings.push(
                            "spawn_agent output did not include agent_id; skipping subagent mapping"
                                .to_string(),
                        );
                        return None;
                    };
                    json!({
                        "type": COLLAB_AGENT_TOOL_CALL,
                        "tool": name,
                        "newThreadId": agent_id,
                    })
                }
                "wait" => json!({
                    "type": COLLAB_AGENT_TOOL_CALL,
                    "tool": name,
                    "receiverThreadIds": args.get("ids").cloned().unwrap_or(Value::Null),
                    "statuses": output.get("status").cloned().unwrap_or(Value::Null),
                }),
                _ => json!({
                    "type": COLLAB_AGENT_TOOL_CALL,
                    "tool": name,
                    "receiverThreadId": args.get("id").cloned().unwrap_or(Value::Null),
                }),
            };
            debug!("rollout call {call_id} ({name}) mapped to collaboration item");
            Some(ThreadItem::from_value(&item))
        }
        _ => None,
    }
}
