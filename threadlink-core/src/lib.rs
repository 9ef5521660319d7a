pub mod error;
pub mod extract;
pub mod forest;
pub mod linking;
pub mod model;
pub mod record;
pub mod render;
pub mod service;
pub mod source;
pub mod store;
pub mod thread;
pub mod uri;

pub use error::{Result, ThreadLinkError};
pub use extract::{ExtractedLinks, extract_candidate_edges, extract_links};
pub use forest::ThreadForest;
pub use linking::{NoopObserver, SubagentObserver, ThreadLinking, plan_thread_parent};
pub use model::{
    CandidateEdge, DetectedThread, EdgeView, ForestReport, InputKind, SourceSummary, ThreadAction,
    ThreadNodeView,
};
pub use record::{LinkFields, ThreadItem};
pub use service::{
    DEFAULT_WORKSPACE_ID, LinkOptions, forest_report_to_raw_json, link_thread_inputs,
    render_forest_markdown,
};
pub use source::SourceRoots;
pub use store::{ThreadDispatch, ThreadStore};
pub use thread::{ThreadSnapshot, TurnSnapshot};
pub use uri::ThreadInput;
