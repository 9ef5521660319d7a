use std::collections::BTreeMap;

use log::debug;

use crate::forest::ThreadForest;
use crate::model::ThreadAction;

static EMPTY_FOREST: ThreadForest = ThreadForest::new();

/// Read access to the parent map plus the single write path into it.
pub trait ThreadDispatch {
    fn thread_parents(&self, workspace_id: &str) -> &ThreadForest;

    /// Applies `action`, returning `false` when the store rejected it.
    fn dispatch(&mut self, action: ThreadAction) -> bool;
}

impl<T: ThreadDispatch + ?Sized> ThreadDispatch for &mut T {
    fn thread_parents(&self, workspace_id: &str) -> &ThreadForest {
        (**self).thread_parents(workspace_id)
    }

    fn dispatch(&mut self, action: ThreadAction) -> bool {
        (**self).dispatch(action)
    }
}

/// Reducer-backed owner of every workspace's forest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadStore {
    workspaces: BTreeMap<String, ThreadForest>,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forest(&self, workspace_id: &str) -> &ThreadForest {
        self.workspaces.get(workspace_id).unwrap_or(&EMPTY_FOREST)
    }

    pub fn workspace_ids(&self) -> impl Iterator<Item = &str> {
        self.workspaces.keys().map(String::as_str)
    }

    /// Applies one action, returning whether the state changed.
    ///
    /// Links are re-validated here so the forest stays acyclic no matter
    /// who dispatched them.
    pub fn reduce(&mut self, action: &ThreadAction) -> bool {
        match action {
            ThreadAction::SetThreadParent {
                workspace_id,
                thread_id,
                parent_id,
            } => {
                let linked = self
                    .workspaces
                    .entry(workspace_id.clone())
                    .or_default()
                    .link(thread_id, parent_id);
                if !linked {
                    debug!(
                        "store rejected parent {parent_id} for thread {thread_id} in workspace {workspace_id}"
                    );
                }
                linked
            }
            ThreadAction::RemoveThread {
                workspace_id,
                thread_id,
            } => self
                .workspaces
                .get_mut(workspace_id)
                .is_some_and(|forest| forest.remove_thread(thread_id)),
            ThreadAction::ClearWorkspace { workspace_id } => {
                self.workspaces.remove(workspace_id).is_some()
            }
        }
    }
}

impl ThreadDispatch for ThreadStore {
    fn thread_parents(&self, workspace_id: &str) -> &ThreadForest {
        self.forest(workspace_id)
    }

    fn dispatch(&mut self, action: ThreadAction) -> bool {
        self.reduce(&action)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::ThreadAction;
    use crate::store::{ThreadDispatch, ThreadStore};

    fn set_parent(workspace: &str, thread: &str, parent: &str) -> ThreadAction {
        ThreadAction::SetThreadParent {
            workspace_id: workspace.to_string(),
            thread_id: thread.to_string(),
            parent_id: parent.to_string(),
        }
    }

    #[test]
    fn keeps_workspaces_apart() {
        let mut store = ThreadStore::new();
        store.dispatch(set_parent("ws1", "child", "root"));
        store.dispatch(set_parent("ws2", "child", "other"));

        assert_eq!(store.forest("ws1").parent_of("child"), Some("root"));
        assert_eq!(store.forest("ws2").parent_of("child"), Some("other"));
        assert!(store.thread_parents("missing").is_empty());
        let workspaces = store.workspace_ids().collect::<Vec<_>>();
        assert_eq!(workspaces, vec!["ws1", "ws2"]);
    }

    #[test]
    fn reducer_rejects_invalid_links() {
        let mut store = ThreadStore::new();
        assert!(store.reduce(&set_parent("ws", "b", "a")));
        assert!(!store.reduce(&set_parent("ws", "b", "c")));
        assert!(!store.reduce(&set_parent("ws", "a", "b")));
        assert!(!store.reduce(&set_parent("ws", "x", "x")));
        assert_eq!(store.forest("ws").len(), 1);
    }

    #[test]
    fn remove_and_clear() {
        let mut store = ThreadStore::new();
        store.dispatch(set_parent("ws", "b", "a"));
        store.dispatch(set_parent("ws", "c", "b"));

        assert!(store.reduce(&ThreadAction::RemoveThread {
            workspace_id: "ws".to_string(),
            thread_id: "c".to_string(),
        }));
        assert_eq!(store.forest("ws").len(), 1);

        assert!(store.reduce(&ThreadAction::ClearWorkspace {
            workspace_id: "ws".to_string(),
        }));
        assert!(store.forest("ws").is_empty());
        assert!(!store.reduce(&ThreadAction::ClearWorkspace {
            workspace_id: "ws".to_string(),
        }));
    }

    #[test]
    fn actions_serialize_with_type_tag() {
        let json = serde_json::to_value(set_parent("ws", "child", "root")).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "type": "setThreadParent",
                "workspaceId": "ws",
                "threadId": "child",
                "parentId": "root"
            })
        );
    }
}
