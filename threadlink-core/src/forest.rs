//! The child -> parent map of one workspace.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;

use crate::model::ThreadNodeView;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ThreadForest {
    parents: BTreeMap<String, String>,
}

impl ThreadForest {
    pub const fn new() -> Self {
        Self {
            parents: BTreeMap::new(),
        }
    }

    /// Adopts an existing snapshot as-is, without validating it.
    pub fn from_parent_map(parents: BTreeMap<String, String>) -> Self {
        Self { parents }
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn parent_of(&self, thread_id: &str) -> Option<&str> {
        self.parents.get(thread_id).map(String::as_str)
    }

    pub fn has_parent(&self, thread_id: &str) -> bool {
        self.parents.contains_key(thread_id)
    }

    /// `(child, parent)` pairs ordered by child id.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parents
            .iter()
            .map(|(child, parent)| (child.as_str(), parent.as_str()))
    }

    /// Whether linking `child_id` under `parent_id` would close a loop.
    ///
    /// Walks up from `parent_id`; reaching `child_id` or any node twice is a
    /// cycle. The visited set also bounds the walk on a map that is already
    /// corrupted.
    pub fn would_create_cycle(&self, parent_id: &str, child_id: &str) -> bool {
        let mut visited = HashSet::from([child_id]);
        let mut current = Some(parent_id);

        while let Some(node) = current.filter(|node| !node.is_empty()) {
            if !visited.insert(node) {
                return true;
            }
            current = self.parent_of(node);
        }

        false
    }

    /// Records `child_id -> parent_id` unless the child is already linked,
    /// the ids are empty or equal, or the link would form a cycle.
    pub fn link(&mut self, child_id: &str, parent_id: &str) -> bool {
        if child_id.is_empty() || parent_id.is_empty() || child_id == parent_id {
            return false;
        }
        if self.has_parent(child_id) || self.would_create_cycle(parent_id, child_id) {
            return false;
        }

        self.parents.insert(child_id.into(), parent_id.into());
        true
    }

    /// Drops the thread's own link and detaches its children.
    pub fn remove_thread(&mut self, thread_id: &str) -> bool {
        let had_parent = self.parents.remove(thread_id).is_some();
        let before = self.parents.len();
        self.parents.retain(|_, parent| *parent != thread_id);
        had_parent || self.parents.len() != before
    }

    /// Ancestors of `thread_id`, nearest first.
    pub fn ancestors(&self, thread_id: &str) -> Vec<String> {
        let mut visited = HashSet::from([thread_id]);
        let mut ancestors = Vec::new();
        let mut current = self.parent_of(thread_id);

        while let Some(node) = current {
            if !visited.insert(node) {
                break;
            }
            ancestors.push(node.to_string());
            current = self.parent_of(node);
        }

        ancestors
    }

    pub fn root_of(&self, thread_id: &str) -> String {
        self.ancestors(thread_id)
            .pop()
            .unwrap_or_else(|| thread_id.to_string())
    }

    pub fn depth(&self, thread_id: &str) -> usize {
        self.ancestors(thread_id).len()
    }

    pub fn children_of(&self, thread_id: &str) -> Vec<&str> {
        self.iter()
            .filter(|(_, parent)| *parent == thread_id)
            .map(|(child, _)| child)
            .collect()
    }

    /// Threads that parent something but have no parent themselves.
    pub fn roots(&self) -> Vec<&str> {
        self.parents
            .values()
            .map(String::as_str)
            .filter(|parent| !self.has_parent(parent))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn trees(&self) -> Vec<ThreadNodeView> {
        let mut children = BTreeMap::<&str, Vec<&str>>::new();
        for (child, parent) in self.iter() {
            children.entry(parent).or_default().push(child);
        }

        self.roots()
            .into_iter()
            .map(|root| build_node(root, &children))
            .collect()
    }
}

fn build_node(thread_id: &str, children: &BTreeMap<&str, Vec<&str>>) -> ThreadNodeView {
    ThreadNodeView {
        thread_id: thread_id.to_string(),
        children: children
            .get(thread_id)
            .into_iter()
            .flatten()
            .map(|child| build_node(child, children))
            .collect(),
    }
}
