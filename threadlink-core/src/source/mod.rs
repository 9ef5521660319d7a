use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dirs::home_dir;
use serde_json::Value;

use crate::error::{Result, ThreadLinkError};
use crate::model::InputKind;
use crate::record::ThreadItem;
use crate::thread::ThreadSnapshot;

pub mod codex;
pub mod events;
pub mod jsonl;
pub mod rollout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRoots {
    pub codex_root: PathBuf,
}

impl SourceRoots {
    pub fn new(codex_root: impl Into<PathBuf>) -> Self {
        Self {
            codex_root: codex_root.into(),
        }
    }

    pub fn from_env_or_home() -> Result<Self> {
        // Precedence:
        // 1) CODEX_HOME (official Codex home env)
        // 2) ~/.codex (Codex default)
        let codex_root = match env::var_os("CODEX_HOME").filter(|path| !path.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => home_dir()
                .ok_or(ThreadLinkError::HomeDirectoryNotFound)?
                .join(".codex"),
        };

        Ok(Self { codex_root })
    }
}

/// Something to feed through thread linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A full history, walked with its own id as the fallback parent.
    Thread(ThreadSnapshot),
    /// One live item of `thread_id`.
    Item { thread_id: String, item: ThreadItem },
}

impl LinkEvent {
    pub fn item_count(&self) -> usize {
        match self {
            Self::Thread(snapshot) => snapshot.item_count(),
            Self::Item { .. } => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedInput {
    pub path: PathBuf,
    pub kind: InputKind,
    pub events: Vec<LinkEvent>,
    pub warnings: Vec<String>,
}

impl LoadedInput {
    /// The thread a document or rollout describes; streams have none.
    pub fn thread_id(&self) -> Option<&str> {
        match (self.kind, self.events.as_slice()) {
            (InputKind::EventStream, _) => None,
            (_, [LinkEvent::Thread(snapshot)]) if !snapshot.id.is_empty() => {
                Some(snapshot.id.as_str())
            }
            _ => None,
        }
    }

    pub fn item_count(&self) -> usize {
        self.events.iter().map(LinkEvent::item_count).sum()
    }
}

pub fn read_thread_raw(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| ThreadLinkError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if bytes.is_empty() {
        return Err(ThreadLinkError::EmptyThreadFile {
            path: path.to_path_buf(),
        });
    }

    String::from_utf8(bytes).map_err(|_| ThreadLinkError::NonUtf8ThreadFile {
        path: path.to_path_buf(),
    })
}

pub fn load_thread_input(path: &Path) -> Result<LoadedInput> {
    let raw = read_thread_raw(path)?;
    parse_thread_input(path, &raw)
}

/// Detects the format of `raw` and turns it into link events.
pub fn parse_thread_input(path: &Path, raw: &str) -> Result<LoadedInput> {
    let mut warnings = Vec::new();

    if let Ok(document) = serde_json::from_str::<Value>(raw) {
        if is_notification(&document) {
            let events = events::parse_event(&document);
            return Ok(loaded(path, InputKind::EventStream, events, warnings));
        }
        if rollout::is_rollout_line(&document) {
            let snapshot = rollout::rollout_snapshot(path, &[document], &mut warnings);
            return Ok(loaded(
                path,
                InputKind::CodexRollout,
                vec![LinkEvent::Thread(snapshot)],
                warnings,
            ));
        }

        let snapshot = ThreadSnapshot::from_value(unwrap_thread_envelope(&document));
        return Ok(loaded(
            path,
            InputKind::ThreadDocument,
            vec![LinkEvent::Thread(snapshot)],
            warnings,
        ));
    }

    let lines = jsonl::parse_json_lines(path, raw, &mut warnings)?;
    if lines.first().is_some_and(rollout::is_rollout_line) {
        let snapshot = rollout::rollout_snapshot(path, &lines, &mut warnings);
        return Ok(loaded(
            path,
            InputKind::CodexRollout,
            vec![LinkEvent::Thread(snapshot)],
            warnings,
        ));
    }

    let events = lines.iter().flat_map(events::parse_event).collect();
    Ok(loaded(path, InputKind::EventStream, events, warnings))
}

fn is_notification(document: &Value) -> bool {
    document.get("method").is_some_and(Value::is_string)
}

/// `{ "thread": … }` and `{ "result": { "thread": … } }` wrap the thread.
fn unwrap_thread_envelope(document: &Value) -> &Value {
    let inner = document.get("result").unwrap_or(document);
    inner
        .get("thread")
        .filter(|thread| thread.is_object())
        .unwrap_or(inner)
}

fn loaded(
    path: &Path,
    kind: InputKind,
    events: Vec<LinkEvent>,
    warnings: Vec<String>,
) -> LoadedInput {
    LoadedInput {
        path: path.to_path_buf(),
        kind,
        events,
        warnings,
    }
}
