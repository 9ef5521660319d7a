//! Turning collaboration items into parent links.
//!
//! Deciding which links to make is a pure function of the current forest
//! ([`plan_thread_parent`]); the only writes go through
//! [`ThreadDispatch::dispatch`].

use std::collections::HashSet;

use log::debug;

use crate::extract::extract_links;
use crate::forest::ThreadForest;
use crate::model::ThreadAction;
use crate::record::ThreadItem;
use crate::store::ThreadDispatch;
use crate::thread::ThreadSnapshot;

/// Told about every thread that just gained a parent.
pub trait SubagentObserver {
    fn on_subagent_thread_detected(&mut self, _workspace_id: &str, _thread_id: &str) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoopObserver;

impl SubagentObserver for NoopObserver {}

impl<T: SubagentObserver + ?Sized> SubagentObserver for &mut T {
    fn on_subagent_thread_detected(&mut self, workspace_id: &str, thread_id: &str) {
        (**self).on_subagent_thread_detected(workspace_id, thread_id);
    }
}

/// The `setThreadParent` actions needed to hang `child_ids` under
/// `parent_id`, given the forest as it stands.
pub fn plan_thread_parent<S: AsRef<str>>(
    forest: &ThreadForest,
    workspace_id: &str,
    parent_id: &str,
    child_ids: &[S],
) -> Vec<ThreadAction> {
    let mut actions = Vec::new();
    if parent_id.is_empty() {
        return actions;
    }

    // Every link in one batch shares `parent_id`, so a staged link can never
    // sit on the ancestor chain of another; only repeats need tracking.
    let mut staged = HashSet::new();

    for child_id in child_ids {
        let child_id: &str = child_id.as_ref();
        if child_id.is_empty() || child_id == parent_id {
            continue;
        }
        if let Some(existing) = forest.parent_of(child_id) {
            if existing != parent_id {
                debug!("thread {child_id} already parented by {existing}; ignoring {parent_id}");
            }
            continue;
        }
        if staged.contains(child_id) {
            continue;
        }
        if forest.would_create_cycle(parent_id, child_id) {
            debug!("linking {child_id} under {parent_id} would create a cycle");
            continue;
        }

        staged.insert(child_id);
        actions.push(ThreadAction::SetThreadParent {
            workspace_id: workspace_id.to_string(),
            thread_id: child_id.to_string(),
            parent_id: parent_id.to_string(),
        });
    }

    actions
}

#[derive(Debug, Default)]
pub struct ThreadLinking<O = NoopObserver> {
    observer: O,
}

impl ThreadLinking<NoopObserver> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<O: SubagentObserver> ThreadLinking<O> {
    pub fn with_observer(observer: O) -> Self {
        Self { observer }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    /// Links each child under `parent_id` and returns the ids that were
    /// newly linked.
    pub fn update_thread_parent<D, S>(
        &mut self,
        store: &mut D,
        workspace_id: &str,
        parent_id: &str,
        child_ids: &[S],
    ) -> Vec<String>
    where
        D: ThreadDispatch + ?Sized,
        S: AsRef<str>,
    {
        let actions = plan_thread_parent(
            store.thread_parents(workspace_id),
            workspace_id,
            parent_id,
            child_ids,
        );

        let mut linked = Vec::with_capacity(actions.len());
        for action in actions {
            let thread_id = match &action {
                ThreadAction::SetThreadParent { thread_id, .. } => Some(thread_id.clone()),
                _ => None,
            };
            if store.dispatch(action)
                && let Some(thread_id) = thread_id
            {
                linked.push(thread_id);
            }
        }

        for thread_id in &linked {
            self.observer
                .on_subagent_thread_detected(workspace_id, thread_id);
        }

        linked
    }

    /// Applies the links of a single item, `fallback_thread_id` standing in
    /// for a missing sender.
    pub fn apply_collab_thread_links<D>(
        &mut self,
        store: &mut D,
        workspace_id: &str,
        fallback_thread_id: &str,
        item: &ThreadItem,
    ) -> Vec<String>
    where
        D: ThreadDispatch + ?Sized,
    {
        let Some(links) = extract_links(item, fallback_thread_id) else {
            return Vec::new();
        };

        self.update_thread_parent(store, workspace_id, &links.parent_id, &links.child_ids)
    }

    /// Backfills links from a thread's whole history, in turn and item
    /// order, with the thread itself as the fallback parent.
    pub fn apply_collab_thread_links_from_thread<D>(
        &mut self,
        store: &mut D,
        workspace_id: &str,
        thread: &ThreadSnapshot,
    ) -> Vec<String>
    where
        D: ThreadDispatch + ?Sized,
    {
        let mut linked = Vec::new();
        for item in thread.items() {
            linked.extend(self.apply_collab_thread_links(store, workspace_id, &thread.id, item));
        }
        linked
    }
}
