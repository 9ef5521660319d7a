//! Thread items as they arrive from the app server or a rollout, normalized
//! once at ingestion.
//!
//! Upstream payloads spell every linkage field in two dialects
//! (`receiverThreadIds` / `receiver_thread_ids`). [`LinkFields::from_object`]
//! resolves both spellings up front so extraction only deals with typed
//! fields.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

pub const COLLAB_TOOL_CALL: &str = "collabToolCall";
pub const COLLAB_AGENT_TOOL_CALL: &str = "collabAgentToolCall";

const AGENT_REF_KEYS: &[&str] = &["threadId", "thread_id", "id"];
const NESTED_THREAD_KEYS: &[&str] = &["id", "threadId", "thread_id"];

/// Keys whose truthy presence makes an untyped item eligible for linking.
const LINK_HINT_KEYS: &[&str] = &[
    "senderThreadId",
    "sender_thread_id",
    "receiverThreadId",
    "receiver_thread_id",
    "receiverThreadIds",
    "receiver_thread_ids",
    "newThreadId",
    "new_thread_id",
    "receiverAgents",
    "receiver_agents",
    "receiverAgent",
    "receiver_agent",
    "agentStatuses",
    "agent_statuses",
    "agentStatus",
    "agentsStates",
    "agents_states",
    "statuses",
];

/// Linkage data carried by one item, both dialects already merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkFields {
    pub sender_thread_id: Option<String>,
    pub receiver_thread_id: Vec<String>,
    pub receiver_thread_ids: Vec<String>,
    pub new_thread_id: Vec<String>,
    pub receiver_agents: Vec<String>,
    pub agent_statuses: Vec<String>,
    pub status_keys: Vec<String>,
    pub has_link_hints: bool,
}

impl LinkFields {
    pub fn from_object(item: &Map<String, Value>) -> Self {
        let sender_thread_id =
            dialect_field(item, "senderThreadId", "sender_thread_id").and_then(thread_id_of);

        // A single `receiverAgent` is an agent reference, not a list.
        let mut receiver_agents = Vec::new();
        if let Some(agent) = dialect_field(item, "receiverAgent", "receiver_agent")
            && let Some(id) = agent_ref_id(agent)
        {
            receiver_agents.push(id);
        }
        receiver_agents.extend(agent_ref_ids(dialect_field(
            item,
            "receiverAgents",
            "receiver_agents",
        )));

        let mut status_keys = object_keys(present(item.get("statuses")));
        status_keys.extend(object_keys(
            present(item.get("agentStatus"))
                .or_else(|| present(item.get("agentsStates")))
                .or_else(|| present(item.get("agents_states"))),
        ));

        Self {
            sender_thread_id,
            receiver_thread_id: string_list(dialect_field(
                item,
                "receiverThreadId",
                "receiver_thread_id",
            )),
            receiver_thread_ids: string_list(dialect_field(
                item,
                "receiverThreadIds",
                "receiver_thread_ids",
            )),
            new_thread_id: string_list(dialect_field(item, "newThreadId", "new_thread_id")),
            receiver_agents,
            agent_statuses: agent_ref_ids(dialect_field(item, "agentStatuses", "agent_statuses")),
            status_keys,
            has_link_hints: LINK_HINT_KEYS
                .iter()
                .any(|key| item.get(*key).is_some_and(is_truthy)),
        }
    }

    /// Every child id named by the item, deduplicated in first-seen order.
    pub fn child_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.receiver_thread_id
            .iter()
            .chain(&self.receiver_thread_ids)
            .chain(&self.new_thread_id)
            .chain(&self.receiver_agents)
            .chain(&self.agent_statuses)
            .chain(&self.status_keys)
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }
}

/// One item of a thread turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadItem {
    CollabToolCall(LinkFields),
    CollabAgentToolCall(LinkFields),
    Other {
        item_type: Option<String>,
        fields: LinkFields,
    },
}

impl ThreadItem {
    pub fn from_value(value: &Value) -> Self {
        match value.as_object() {
            Some(item) => Self::from_object(item),
            None => Self::Other {
                item_type: None,
                fields: LinkFields::default(),
            },
        }
    }

    pub fn from_object(item: &Map<String, Value>) -> Self {
        let fields = LinkFields::from_object(item);
        let item_type = item
            .get("type")
            .and_then(Value::as_str)
            .map(ToString::to_string);

        match item_type.as_deref() {
            Some(COLLAB_TOOL_CALL) => Self::CollabToolCall(fields),
            Some(COLLAB_AGENT_TOOL_CALL) => Self::CollabAgentToolCall(fields),
            _ => Self::Other { item_type, fields },
        }
    }

    pub fn fields(&self) -> &LinkFields {
        match self {
            Self::CollabToolCall(fields) | Self::CollabAgentToolCall(fields) => fields,
            Self::Other { fields, .. } => fields,
        }
    }

    pub fn item_type(&self) -> Option<&str> {
        match self {
            Self::CollabToolCall(_) => Some(COLLAB_TOOL_CALL),
            Self::CollabAgentToolCall(_) => Some(COLLAB_AGENT_TOOL_CALL),
            Self::Other { item_type, .. } => item_type.as_deref(),
        }
    }

    /// Collaboration calls always qualify; anything else needs a link hint.
    pub fn is_link_candidate(&self) -> bool {
        match self {
            Self::CollabToolCall(_) | Self::CollabAgentToolCall(_) => true,
            Self::Other { fields, .. } => fields.has_link_hints,
        }
    }
}

impl From<&Value> for ThreadItem {
    fn from(value: &Value) -> Self {
        Self::from_value(value)
    }
}

impl<'de> Deserialize<'de> for ThreadItem {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(|value| Self::from_value(&value))
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_null())
}

/// Compact spelling wins; `null` counts as absent.
fn dialect_field<'a>(
    item: &'a Map<String, Value>,
    compact: &str,
    underscored: &str,
) -> Option<&'a Value> {
    present(item.get(compact)).or_else(|| present(item.get(underscored)))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|number| number != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn thread_id_of(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(entries)) => entries.iter().filter_map(thread_id_of).collect(),
        Some(value) => thread_id_of(value).into_iter().collect(),
        None => Vec::new(),
    }
}

fn agent_ref_id(value: &Value) -> Option<String> {
    let record = value.as_object()?;
    let nested = record.get("thread").and_then(Value::as_object);

    let direct = AGENT_REF_KEYS
        .iter()
        .find_map(|key| present(record.get(*key)));
    let candidate = direct.or_else(|| {
        nested.and_then(|thread| {
            NESTED_THREAD_KEYS
                .iter()
                .find_map(|key| present(thread.get(*key)))
        })
    })?;

    thread_id_of(candidate)
}

fn agent_ref_ids(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(agent_ref_id)
        .collect()
}

fn object_keys(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(Map::keys)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .collect()
}
