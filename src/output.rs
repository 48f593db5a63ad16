use std::fmt::Write;

use serde::Serialize;

use codeprop::builder::BuildStats;
use codeprop::diagnostics::{Diagnostic, DiagnosticKind, count_kind};
use codeprop::export::{render_graphml, render_mermaid};
use codeprop::query::QueryResult;
use codeprop::query::endpoints::{Endpoint, ParamUsage};

use crate::cli::{ListFormat, OutputFormat};

#[derive(Serialize)]
struct IndexReport<'a> {
    #[serde(flatten)]
    stats: &'a BuildStats,
    diagnostics: &'a [Diagnostic],
}

/// Print a summary of the build.
///
/// - `json = true`: emit a pretty-printed JSON object (stats plus diagnostics) to stdout.
/// - `json = false`: emit a cargo-style human-readable summary to stdout.
///
/// Diagnostic counts go to **stderr** so that stdout stays clean for
/// downstream consumers.
pub fn print_summary(stats: &BuildStats, diagnostics: &[Diagnostic], json: bool) {
    if json {
        let report = IndexReport { stats, diagnostics };
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("error serialising stats: {}", e),
        }
        return;
    }

    println!(
        "Indexed {} files in {:.2}s ({} seen)",
        stats.files_parsed, stats.elapsed_secs, stats.files_seen
    );
    println!("  {} nodes: {}", stats.nodes, breakdown(&stats.nodes_by_kind));
    println!("  {} edges: {}", stats.edges, breakdown(&stats.edges_by_kind));

    let parse_errors = count_kind(diagnostics, DiagnosticKind::ParseError);
    let unresolved_types = count_kind(diagnostics, DiagnosticKind::UnresolvedType);
    if stats.files_failed > 0 || parse_errors > 0 {
        eprintln!(
            "  {} files failed, {} parse diagnostics",
            stats.files_failed, parse_errors
        );
    }
    if stats.unresolved_calls > 0 || unresolved_types > 0 {
        eprintln!(
            "  {} unresolved calls, {} unresolved supertypes",
            stats.unresolved_calls, unresolved_types
        );
    }
    if count_kind(diagnostics, DiagnosticKind::NoFilesProcessed) > 0 {
        eprintln!("  no Java or Python files found");
    }
}

fn breakdown(counts: &std::collections::BTreeMap<String, usize>) -> String {
    if counts.is_empty() {
        return "none".to_string();
    }
    counts
        .iter()
        .map(|(k, n)| format!("{n} {k}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render a query result in the requested format.
pub fn format_query(result: &QueryResult, format: &OutputFormat) -> std::io::Result<String> {
    Ok(match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&result.to_json()).unwrap_or_else(|e| format!("error: {e}"))
        }
        OutputFormat::Mermaid => render_mermaid(result),
        OutputFormat::Graphml => render_graphml(result)?,
        OutputFormat::Compact => {
            let mut out = String::new();
            for node in &result.nodes {
                // Nodes pulled in by `neighbors` are marked with `~`.
                let marker = if result.is_match(&node.id) { ' ' } else { '~' };
                let _ = write!(
                    out,
                    "{marker}{} {} {}:{}",
                    node.kind.as_str(),
                    node.qualified_name,
                    node.file,
                    node.span.start_line
                );
                if let Some(http) = &node.extras.http {
                    let _ = write!(out, " [{} {}]", http.method, http.path);
                }
                out.push('\n');
            }
            for edge in &result.edges {
                let _ = writeln!(out, "  {} {} -> {}", edge.kind.as_str(), edge.source, edge.target);
            }
            let _ = write!(
                out,
                "{} nodes ({} matched), {} edges",
                result.nodes.len(),
                result.matched.len(),
                result.edges.len()
            );
            out
        }
    })
}

/// Render an endpoint listing in the requested format.
pub fn format_endpoints(endpoints: &[Endpoint], format: &ListFormat) -> String {
    match format {
        ListFormat::Json => {
            serde_json::to_string_pretty(endpoints).unwrap_or_else(|e| format!("error: {e}"))
        }
        ListFormat::Compact => {
            let mut out = String::new();
            for e in endpoints {
                let _ = write!(out, "{:<7} {} -> {}", e.method, e.path, e.handler);
                if !e.produces.is_empty() {
                    let _ = write!(out, " produces={}", e.produces.join(","));
                }
                if !e.consumes.is_empty() {
                    let _ = write!(out, " consumes={}", e.consumes.join(","));
                }
                out.push('\n');
                for extra in &e.additional_routes {
                    let _ = writeln!(out, "{:<7} {} -> {}", extra.method, extra.path, e.handler);
                }
            }
            let _ = write!(out, "{} endpoints", endpoints.len());
            out
        }
    }
}

/// Render endpoints filtered by parameter source in the requested format.
pub fn format_param_usages(usages: &[ParamUsage], format: &ListFormat) -> String {
    match format {
        ListFormat::Json => {
            serde_json::to_string_pretty(usages).unwrap_or_else(|e| format!("error: {e}"))
        }
        ListFormat::Compact => {
            let mut out = String::new();
            for u in usages {
                let e = &u.endpoint;
                let _ = writeln!(
                    out,
                    "{:<7} {} -> {} {}={}",
                    e.method,
                    e.path,
                    e.handler,
                    u.source.as_str(),
                    u.params.join(",")
                );
            }
            let _ = write!(out, "{} endpoints", usages.len());
            out
        }
    }
}
