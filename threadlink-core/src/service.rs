use std::collections::{HashSet, VecDeque};

use log::{debug, warn};

use crate::error::Result;
use crate::linking::{SubagentObserver, ThreadLinking};
use crate::model::{DetectedThread, EdgeView, ForestReport, SourceSummary};
use crate::render;
use crate::source::codex::CodexHome;
use crate::source::{LinkEvent, LoadedInput, SourceRoots, load_thread_input};
use crate::store::ThreadStore;
use crate::uri::{ThreadInput, is_session_id};

pub const DEFAULT_WORKSPACE_ID: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOptions {
    pub workspace_id: String,
    /// Load every newly detected sub-agent thread from Codex home as well.
    pub follow_subagents: bool,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            workspace_id: DEFAULT_WORKSPACE_ID.to_string(),
            follow_subagents: false,
        }
    }
}

/// Records detections and queues them for fetching.
#[derive(Debug, Default)]
struct DetectionQueue {
    detected: Vec<DetectedThread>,
    pending: VecDeque<String>,
}

impl SubagentObserver for DetectionQueue {
    fn on_subagent_thread_detected(&mut self, workspace_id: &str, thread_id: &str) {
        self.detected.push(DetectedThread {
            workspace_id: workspace_id.to_string(),
            thread_id: thread_id.to_string(),
        });
        self.pending.push_back(thread_id.to_string());
    }
}

struct LinkSession<'a> {
    options: &'a LinkOptions,
    codex: CodexHome,
    store: ThreadStore,
    linking: ThreadLinking<DetectionQueue>,
    loaded_threads: HashSet<String>,
    sources: Vec<SourceSummary>,
    warnings: Vec<String>,
}

impl<'a> LinkSession<'a> {
    fn new(roots: &SourceRoots, options: &'a LinkOptions) -> Self {
        Self {
            options,
            codex: CodexHome::new(&roots.codex_root),
            store: ThreadStore::new(),
            linking: ThreadLinking::with_observer(DetectionQueue::default()),
            loaded_threads: HashSet::new(),
            sources: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn load(&mut self, input: &ThreadInput) -> Result<LoadedInput> {
        match input {
            ThreadInput::File(path) => load_thread_input(path),
            ThreadInput::Codex { session_id } => {
                let resolved = self.codex.resolve(session_id)?;
                self.warnings.extend(resolved.warnings);
                load_thread_input(&resolved.path)
            }
        }
    }

    fn apply(&mut self, label: String, loaded: LoadedInput) {
        let options = self.options;
        let workspace_id = options.workspace_id.as_str();
        let mut linked = 0;

        for event in &loaded.events {
            let newly_linked = match event {
                LinkEvent::Thread(snapshot) => {
                    self.loaded_threads.insert(snapshot.id.clone());
                    let store = &mut self.store;
                    self.linking
                        .apply_collab_thread_links_from_thread(store, workspace_id, snapshot)
                }
                LinkEvent::Item { thread_id, item } => {
                    let store = &mut self.store;
                    self.linking
                        .apply_collab_thread_links(store, workspace_id, thread_id, item)
                }
            };
            linked += newly_linked.len();
        }

        debug!(
            "{label}: {} items, {linked} new links ({})",
            loaded.item_count(),
            loaded.kind
        );
        self.sources.push(SourceSummary {
            input: label,
            kind: loaded.kind,
            thread_id: loaded.thread_id().map(ToString::to_string),
            items: loaded.item_count(),
            linked,
        });
        self.warnings.extend(loaded.warnings);
    }

    /// Loads queued sub-agent threads until no new ones turn up.
    fn follow_detected(&mut self) {
        while let Some(thread_id) = self.linking.observer_mut().pending.pop_front() {
            if !self.loaded_threads.insert(thread_id.clone()) {
                continue;
            }

            if !is_session_id(&thread_id) {
                self.skip_detected(&thread_id, "not a Codex session id");
                continue;
            }

            let input = ThreadInput::codex(thread_id.clone());
            let loaded = match self.load(&input) {
                Ok(loaded) => loaded,
                Err(err) => {
                    self.skip_detected(&thread_id, &err.to_string());
                    continue;
                }
            };
            if loaded
                .thread_id()
                .is_none_or(|loaded_id| !loaded_id.eq_ignore_ascii_case(&thread_id))
            {
                let reason = format!("{} belongs to another thread", loaded.path.display());
                self.skip_detected(&thread_id, &reason);
                continue;
            }

            self.apply(input.to_string(), loaded);
        }
    }

    fn skip_detected(&mut self, thread_id: &str, reason: &str) {
        warn!("could not load subagent thread {thread_id}: {reason}");
        let warning = format!("subagent thread {thread_id} was not loaded: {reason}");
        self.warnings.push(warning);
    }

    fn finish(self) -> ForestReport {
        let workspace_id = self.options.workspace_id.clone();
        let forest = self.store.forest(&workspace_id);

        ForestReport {
            edges: forest
                .iter()
                .map(|(thread_id, parent_id)| EdgeView {
                    thread_id: thread_id.to_string(),
                    parent_id: parent_id.to_string(),
                })
                .collect(),
            trees: forest.trees(),
            detected: self.linking.into_observer().detected,
            sources: self.sources,
            warnings: self.warnings,
            workspace_id,
        }
    }
}

/// Links every input into one forest.
///
/// A Codex reference that cannot be resolved, or an unreadable file, fails
/// the whole call; problems with followed sub-agent threads only warn.
pub fn link_thread_inputs(
    inputs: &[ThreadInput],
    roots: &SourceRoots,
    options: &LinkOptions,
) -> Result<ForestReport> {
    let mut session = LinkSession::new(roots, options);

    for input in inputs {
        let loaded = session.load(input)?;
        session.apply(input.to_string(), loaded);
    }

    if options.follow_subagents {
        session.follow_detected();
    }

    Ok(session.finish())
}

pub fn render_forest_markdown(report: &ForestReport) -> String {
    render::render_forest_markdown(report)
}

pub fn forest_report_to_raw_json(report: &ForestReport) -> Result<String> {
    render::forest_report_to_raw_json(report)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use serde_json::{Value, json};
    use tempfile::tempdir;

    use crate::model::ForestReport;
    use crate::service::{LinkOptions, link_thread_inputs};
    use crate::source::SourceRoots;
    use crate::uri::ThreadInput;

    const MAIN: &str = "019c871c-b1f9-7f60-9c4f-87ed09f13592";
    const CHILD: &str = "019c87fb-38b9-7843-92b1-832f02598495";
    const GRANDCHILD: &str = "019c8800-0000-7000-8000-000000000001";

    fn write(root: &Path, relative: &str, contents: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, contents).expect("write");
        path
    }

    fn jsonl(lines: &[Value]) -> String {
        lines.iter().map(|line| format!("{line}\n")).collect()
    }

    fn spawn_rollout(id: &str, parent: Option<&str>, spawned: Option<&str>) -> String {
        let mut meta = json!({"type": "session_meta", "payload": {"id": id, "source": "cli"}});
        if let Some(parent) = parent {
            meta["payload"]["source"] = json!({
                "subagent": {"thread_spawn": {"parent_thread_id": parent, "depth": 1}}
            });
        }

        let mut lines = vec![meta];
        if let Some(child) = spawned {
            let output = json!({"agent_id": child}).to_string();
            lines.push(json!({
                "type": "response_item",
                "payload": {
                    "type": "function_call",
                    "name": "spawn_agent",
                    "arguments": "{}",
                    "call_id": "call_spawn"
                }
            }));
            lines.push(json!({
                "type": "response_item",
                "payload": {
                    "type": "function_call_output",
                    "call_id": "call_spawn",
                    "output": output
                }
            }));
        }
        jsonl(&lines)
    }

    fn link(inputs: &[ThreadInput], roots: &SourceRoots, follow: bool) -> ForestReport {
        let options = LinkOptions {
            follow_subagents: follow,
            ..LinkOptions::default()
        };
        link_thread_inputs(inputs, roots, &options).expect("link")
    }

    #[test]
    fn links_document_and_stream_inputs() {
        let temp = tempdir().expect("tempdir");
        let thread = json!({
            "thread": {
                "id": "root",
                "turns": [{"items": [{"type": "collabToolCall", "receiverThreadId": "child1"}]}]
            }
        });
        let events = jsonl(&[
            json!({
                "method": "item/completed",
                "params": {
                    "threadId": "child1",
                    "item": {"type": "collabAgentToolCall", "receiver_thread_ids": ["leaf"]}
                }
            }),
            json!({
                "method": "item/completed",
                "params": {
                    "threadId": "child1",
                    "item": {"type": "collabAgentToolCall", "receiverThreadIds": ["leaf"]}
                }
            }),
        ]);
        let document = write(temp.path(), "thread.json", &thread.to_string());
        let stream = write(temp.path(), "events.jsonl", &events);

        let report = link_thread_inputs(
            &[ThreadInput::File(document), ThreadInput::File(stream)],
            &SourceRoots::new(temp.path().join("codex")),
            &LinkOptions {
                workspace_id: "ws".to_string(),
                follow_subagents: false,
            },
        )
        .expect("link");

        assert_eq!(report.edges.len(), 2);
        assert_eq!(report.trees.len(), 1);
        assert_eq!(report.trees[0].thread_id, "root");
        assert_eq!(report.trees[0].children[0].children[0].thread_id, "leaf");
        let detected = report
            .detected
            .iter()
            .map(|detected| detected.thread_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(detected, vec!["child1", "leaf"]);
        assert_eq!(report.sources[1].linked, 1);
        assert_eq!(report.sources[1].items, 2);
    }

    #[test]
    fn follows_subagents_through_codex_home() {
        let temp = tempdir().expect("tempdir");
        write(
            temp.path(),
            &format!("sessions/2026/02/23/rollout-2026-02-23T04-48-50-{MAIN}.jsonl"),
            &spawn_rollout(MAIN, None, Some(CHILD)),
        );
        write(
            temp.path(),
            &format!("sessions/2026/02/23/rollout-2026-02-23T04-49-10-{CHILD}.jsonl"),
            &spawn_rollout(CHILD, Some(MAIN), Some(GRANDCHILD)),
        );
        let roots = SourceRoots::new(temp.path());

        let shallow = link(&[ThreadInput::codex(MAIN)], &roots, false);
        assert_eq!(shallow.edges.len(), 1);
        assert_eq!(shallow.sources.len(), 1);

        let report = link(&[ThreadInput::codex(MAIN)], &roots, true);

        assert_eq!(report.sources.len(), 2);
        assert_eq!(report.edges.len(), 2);
        assert_eq!(report.trees[0].thread_id, MAIN);
        assert_eq!(report.trees[0].children[0].thread_id, CHILD);
        let child = &report.trees[0].children[0];
        assert_eq!(child.children[0].thread_id, GRANDCHILD);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains(GRANDCHILD));
    }

    #[test]
    fn follow_only_loads_the_requested_thread() {
        const LOOKALIKE: &str = "019c8800-0000-7000-8000-00000000000a";
        let temp = tempdir().expect("tempdir");
        let spawn = json!({"type": "collabToolCall", "receiverThreadIds": ["a", CHILD]});
        let thread = json!({"thread": {"id": "root", "turns": [{"items": [spawn]}]}});
        let document = write(temp.path(), "thread.json", &thread.to_string());
        write(
            temp.path(),
            &format!("sessions/2026/02/23/rollout-2026-02-23T04-48-50-{LOOKALIKE}.jsonl"),
            &spawn_rollout(LOOKALIKE, None, Some(GRANDCHILD)),
        );
        // The file name claims CHILD but the session inside is MAIN.
        write(
            temp.path(),
            &format!("sessions/2026/02/23/rollout-2026-02-23T04-49-10-{CHILD}.jsonl"),
            &spawn_rollout(MAIN, None, Some(GRANDCHILD)),
        );

        let roots = SourceRoots::new(temp.path());
        let report = link(&[ThreadInput::File(document)], &roots, true);

        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.edges.len(), 2);
        assert!(report.edges.iter().all(|edge| edge.parent_id == "root"));
        assert_eq!(report.warnings.len(), 2);

        let warning_for = |id: &str| {
            let prefix = format!("subagent thread {id} was not loaded: ");
            report
                .warnings
                .iter()
                .find(|warning| warning.starts_with(&prefix))
                .cloned()
                .unwrap_or_default()
        };
        assert!(warning_for("a").contains("not a Codex session id"));
        assert!(warning_for(CHILD).contains("belongs to another thread"));
    }

    #[test]
    fn unresolvable_input_fails() {
        let temp = tempdir().expect("tempdir");
        let err = link_thread_inputs(
            &[ThreadInput::codex(MAIN)],
            &SourceRoots::new(temp.path()),
            &LinkOptions::default(),
        )
        .expect_err("must fail");
        assert!(format!("{err}").contains("thread not found"));
    }
}
