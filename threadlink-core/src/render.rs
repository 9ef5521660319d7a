use std::collections::BTreeSet;

use crate::error::{Result, ThreadLinkError};
use crate::model::{ForestReport, ThreadNodeView};

pub fn render_forest_markdown(report: &ForestReport) -> String {
    let mut output = String::new();
    output.push_str("# Thread Forest\n\n");
    output.push_str(&format!("- Workspace: `{}`\n", report.workspace_id));
    output.push_str(&format!("- Sources: `{}`\n", report.sources.len()));
    output.push_str(&format!("- Links: `{}`\n\n", report.edges.len()));

    output.push_str("## Sources\n\n");
    for (index, source) in report.sources.iter().enumerate() {
        output.push_str(&format!("{}. `{}` (`{}`)", index + 1, source.input, source.kind));
        if let Some(thread_id) = &source.thread_id {
            output.push_str(&format!(" thread `{thread_id}`"));
        }
        output.push_str(&format!(": {} items, {} new links\n", source.items, source.linked));
    }
    output.push('\n');

    output.push_str("## Threads\n\n");
    if report.trees.is_empty() {
        output.push_str("_No thread links found._\n\n");
    } else {
        for tree in &report.trees {
            render_node(&mut output, tree, 0);
        }
        output.push('\n');
    }

    if !report.detected.is_empty() {
        output.push_str("## Detected Subagents\n\n");
        for detected in &report.detected {
            output.push_str(&format!("- `{}`\n", detected.thread_id));
        }
        output.push('\n');
    }

    render_warnings(&mut output, &report.warnings);
    output
}

fn render_node(output: &mut String, node: &ThreadNodeView, depth: usize) {
    output.push_str(&format!("{}- `{}`\n", "  ".repeat(depth), node.thread_id));
    for child in &node.children {
        render_node(output, child, depth + 1);
    }
}

fn render_warnings(output: &mut String, warnings: &[String]) {
    let unique = warnings.iter().collect::<BTreeSet<_>>();
    if unique.is_empty() {
        return;
    }

    output.push_str("## Warnings\n\n");
    for warning in unique {
        output.push_str(&format!("- {warning}\n"));
    }
    output.push('\n');
}

pub fn forest_report_to_raw_json(report: &ForestReport) -> Result<String> {
    let mut json = serde_json::to_string_pretty(report)
        .map_err(|err| ThreadLinkError::Serialization(err.to_string()))?;
    json.push('\n');
    Ok(json)
}
