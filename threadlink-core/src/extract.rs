use crate::model::CandidateEdge;
use crate::record::ThreadItem;

/// The parent an item links from and every child it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLinks {
    pub parent_id: String,
    pub child_ids: Vec<String>,
}

impl ExtractedLinks {
    pub fn edges(&self) -> Vec<CandidateEdge> {
        self.child_ids
            .iter()
            .map(|child_id| CandidateEdge {
                parent_id: self.parent_id.clone(),
                child_id: child_id.clone(),
            })
            .collect()
    }
}

/// Resolves the links an item carries.
///
/// The item's own sender wins over `fallback_parent_id`. Returns `None` when
/// the item is not a link candidate or no parent can be resolved.
pub fn extract_links(item: &ThreadItem, fallback_parent_id: &str) -> Option<ExtractedLinks> {
    if !item.is_link_candidate() {
        return None;
    }

    let fields = item.fields();
    let parent_id = fields
        .sender_thread_id
        .clone()
        .unwrap_or_else(|| fallback_parent_id.trim().to_string());
    if parent_id.is_empty() {
        return None;
    }

    Some(ExtractedLinks {
        parent_id,
        child_ids: fields.child_ids(),
    })
}

pub fn extract_candidate_edges(item: &ThreadItem, fallback_parent_id: &str) -> Vec<CandidateEdge> {
    extract_links(item, fallback_parent_id)
        .map(|links| links.edges())
        .unwrap_or_default()
}
