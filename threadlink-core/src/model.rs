use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// A proposed `parent -> child` link produced by extraction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CandidateEdge {
    pub parent_id: String,
    pub child_id: String,
}

/// Mutations understood by the thread store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ThreadAction {
    SetThreadParent {
        workspace_id: String,
        thread_id: String,
        parent_id: String,
    },
    RemoveThread {
        workspace_id: String,
        thread_id: String,
    },
    ClearWorkspace {
        workspace_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    ThreadDocument,
    EventStream,
    CodexRollout,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThreadDocument => write!(f, "thread_document"),
            Self::EventStream => write!(f, "event_stream"),
            Self::CodexRollout => write!(f, "codex_rollout"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRollout {
    pub session_id: String,
    pub path: PathBuf,
    pub source: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub input: String,
    pub kind: InputKind,
    pub thread_id: Option<String>,
    pub items: usize,
    pub linked: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeView {
    pub thread_id: String,
    pub parent_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadNodeView {
    pub thread_id: String,
    pub children: Vec<ThreadNodeView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedThread {
    pub workspace_id: String,
    pub thread_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForestReport {
    pub workspace_id: String,
    pub sources: Vec<SourceSummary>,
    pub edges: Vec<EdgeView>,
    pub trees: Vec<ThreadNodeView>,
    pub detected: Vec<DetectedThread>,
    #[serde(skip_serializing)]
    pub warnings: Vec<String>,
}
