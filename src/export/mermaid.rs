use std::collections::HashMap;
use std::fmt::Write;

use crate::graph::edge::EdgeKind;
use crate::graph::node::NodeKind;
use crate::query::QueryResult;

/// Escape a string for safe use in Mermaid node labels (quotes inside labels break the syntax).
fn escape_mermaid_label(s: &str) -> String {
    s.replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('{', "&#123;")
        .replace('}', "&#125;")
}

/// Render a query result as a Mermaid flowchart.
///
/// Nodes are numbered in result order. Containment is drawn as a plain link,
/// inheritance dotted, overrides and calls as labeled arrows.
pub fn render_mermaid(result: &QueryResult) -> String {
    let mut out = String::from("flowchart LR\n");
    let mut ids: HashMap<&str, usize> = HashMap::new();

    for (i, node) in result.nodes.iter().enumerate() {
        ids.insert(node.id.as_str(), i);
        let mut label = format!("{} {}", node.kind.as_str(), node.qualified_name);
        if let Some(http) = &node.extras.http {
            label.push_str(&format!(" ({} {})", http.method, http.path));
        }
        let label = escape_mermaid_label(&label);
        // Node shape by kind.
        let _ = match node.kind {
            NodeKind::Class | NodeKind::Enum => writeln!(out, "    n{i}([\"{label}\"])"),
            NodeKind::Interface => writeln!(out, "    n{i}{{{{\"{label}\"}}}}"),
            NodeKind::Module => writeln!(out, "    n{i}[/\"{label}\"/]"),
            _ => writeln!(out, "    n{i}[\"{label}\"]"),
        };
    }

    for edge in &result.edges {
        let (Some(src), Some(tgt)) = (ids.get(edge.source.as_str()), ids.get(edge.target.as_str()))
        else {
            continue;
        };
        let arrow = match edge.kind {
            EdgeKind::Contains => "---".to_string(),
            EdgeKind::Inherits | EdgeKind::Implements => format!("-.->|{}|", edge.kind.as_str()),
            _ => format!("-->|{}|", edge.kind.as_str()),
        };
        let _ = writeln!(out, "    n{src} {arrow} n{tgt}");
    }

    out
}
