use std::collections::HashSet;

use petgraph::stable_graph::NodeIndex;
use tracing::debug;

use super::ancestor_levels;
use crate::diagnostics::Diagnostic;
use crate::frontend::CallSite;
use crate::graph::CodeGraph;
use crate::graph::edge::{Edge, EdgeKind, EdgeMetadata, Resolution};
use crate::graph::node::NodeKind;
use crate::language::LanguageKind;

/// What a call site's receiver denotes, as far as a language resolver can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receiver {
    /// Unqualified call or `this`/`self`: the caller's own type.
    SelfType,
    /// Unqualified call outside any type: the caller's module.
    Module,
    /// Candidate qualified names of the receiver's type (or module), most specific first.
    Type(Vec<String>),
    /// Candidate qualified names of the callee itself (an imported function).
    Qualified(Vec<String>),
    /// `super`: the supertypes of the caller's type.
    Supertypes,
    /// Nothing is known; only the global fallback applies.
    Unknown,
}

/// Edges and diagnostics produced by one call-resolution pass.
#[derive(Debug, Default)]
pub struct CallResolution {
    pub edges: Vec<Edge>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A language-specific call resolver.
///
/// Implementations only classify receivers; the lookup order (same-file scope,
/// type hierarchy, unique global match) is shared.
pub trait CallResolver: Send + Sync {
    fn language(&self) -> LanguageKind;

    fn receiver(&self, graph: &CodeGraph, site: &CallSite) -> Receiver;

    fn resolve_calls(&self, graph: &CodeGraph) -> CallResolution {
        resolve_sites(graph, self.language(), |site| self.receiver(graph, site))
    }
}

/// Resolve every call site of `language` recorded in `graph`.
pub fn resolve_sites(
    graph: &CodeGraph,
    language: LanguageKind,
    classify: impl Fn(&CallSite) -> Receiver,
) -> CallResolution {
    let mut resolution = CallResolution::default();
    let mut resolved = 0usize;
    for site in graph.call_sites().iter().filter(|s| s.language == language) {
        if graph.index_of(&site.caller).is_none() {
            continue;
        }
        let receiver = classify(site);
        match resolve_site(graph, site, &receiver) {
            Some((targets, how)) => {
                resolved += 1;
                for target in targets {
                    resolution.edges.push(
                        Edge::new(EdgeKind::Calls, &site.caller, &graph.node_at(target).id)
                            .with_metadata(EdgeMetadata {
                                line: Some(site.line),
                                resolution: Some(how),
                            }),
                    );
                }
            }
            None => resolution.diagnostics.push(Diagnostic::unresolved_call(
                &site.file,
                site.line,
                describe(site),
            )),
        }
    }
    debug!(
        language = language.as_str(),
        resolved,
        unresolved = resolution.diagnostics.len(),
        "resolved call sites"
    );
    resolution
}

fn describe(site: &CallSite) -> String {
    match &site.receiver {
        Some(receiver) => format!(
            "no target for call {receiver}.{}() with {} argument(s)",
            site.callee, site.arg_count
        ),
        None => format!(
            "no target for call {}() with {} argument(s)",
            site.callee, site.arg_count
        ),
    }
}

/// Targets for one call site plus the rule that found them.
pub fn resolve_site(
    graph: &CodeGraph,
    site: &CallSite,
    receiver: &Receiver,
) -> Option<(Vec<NodeIndex>, Resolution)> {
    let enclosing = site.enclosing_type.as_deref().and_then(|id| graph.index_of(id));
    let module = graph.index_of(&site.scope.module);

    let (start, skip_start): (Vec<NodeIndex>, bool) = match receiver {
        Receiver::SelfType => (enclosing.or(module).into_iter().collect(), false),
        Receiver::Module => (module.into_iter().collect(), false),
        Receiver::Supertypes => (enclosing.into_iter().collect(), true),
        Receiver::Type(candidates) => (containers_named(graph, candidates, site.language), false),
        Receiver::Qualified(candidates) => {
            let hits = callables_named(graph, candidates, site);
            if !hits.is_empty() {
                let same_file = hits.iter().all(|&h| graph.node_at(h).file == site.file);
                let how = if same_file {
                    Resolution::Scope
                } else {
                    Resolution::Hierarchy
                };
                return Some((hits, how));
            }
            (Vec::new(), false)
        }
        Receiver::Unknown => (Vec::new(), false),
    };

    // (a) declared directly on a start container in the caller's own file.
    if !skip_start {
        let local: Vec<NodeIndex> = start
            .iter()
            .filter(|&&s| graph.node_at(s).file == site.file)
            .flat_map(|&s| matching_members(graph, s, site))
            .collect();
        if !local.is_empty() {
            return Some((local, Resolution::Scope));
        }
    }

    // (b) nearest level of the hierarchy that declares a match.
    if !start.is_empty() {
        let mut levels = ancestor_levels(graph, &start);
        if !skip_start {
            levels.insert(0, start.clone());
        }
        for level in levels {
            let hits: Vec<NodeIndex> = level
                .iter()
                .flat_map(|&ty| matching_members(graph, ty, site))
                .collect();
            if !hits.is_empty() {
                return Some((most_derived(graph, hits), Resolution::Hierarchy));
            }
        }
    }

    // (c) the only callable with this name and arity anywhere in the language.
    let global: Vec<NodeIndex> = graph
        .by_name(&site.callee)
        .iter()
        .copied()
        .filter(|&idx| {
            let node = graph.node_at(idx);
            node.language == site.language && node.kind.is_callable() && node.accepts(site.arg_count)
        })
        .collect();
    (global.len() == 1).then_some((global, Resolution::Global))
}

/// Type (or Python module) nodes for the first candidate name that exists.
fn containers_named(graph: &CodeGraph, candidates: &[String], language: LanguageKind) -> Vec<NodeIndex> {
    for qn in candidates {
        let hits: Vec<NodeIndex> = graph
            .by_qualified_name(qn)
            .iter()
            .copied()
            .filter(|&idx| {
                let node = graph.node_at(idx);
                node.language == language && (node.kind.is_type() || node.kind == NodeKind::Module)
            })
            .collect();
        if !hits.is_empty() {
            return hits;
        }
    }
    Vec::new()
}

/// Callables (or constructors of a class) for the first candidate name that exists.
fn callables_named(graph: &CodeGraph, candidates: &[String], site: &CallSite) -> Vec<NodeIndex> {
    for qn in candidates {
        let hits: Vec<NodeIndex> = graph
            .by_qualified_name(qn)
            .iter()
            .copied()
            .filter(|&idx| graph.node_at(idx).language == site.language)
            .flat_map(|idx| target_for(graph, idx, site))
            .collect();
        if !hits.is_empty() {
            return hits;
        }
    }
    Vec::new()
}

/// Members of `owner` a call named `site.callee` can bind to.
fn matching_members(graph: &CodeGraph, owner: NodeIndex, site: &CallSite) -> Vec<NodeIndex> {
    graph
        .outgoing(owner, EdgeKind::Contains)
        .into_iter()
        .filter(|&m| graph.node_at(m).name == site.callee)
        .flat_map(|m| target_for(graph, m, site))
        .collect()
}

/// A callable accepting the call's arguments is its own target; calling a class
/// (Python instantiation) targets its constructor.
fn target_for(graph: &CodeGraph, idx: NodeIndex, site: &CallSite) -> Vec<NodeIndex> {
    let node = graph.node_at(idx);
    if node.kind.is_callable() {
        return if node.accepts(site.arg_count) {
            vec![idx]
        } else {
            Vec::new()
        };
    }
    if node.kind.is_type() {
        return graph
            .outgoing(idx, EdgeKind::Contains)
            .into_iter()
            .filter(|&m| {
                let member = graph.node_at(m);
                member
                    .extras
                    .signature
                    .as_ref()
                    .is_some_and(|s| s.constructor)
                    && member.accepts(site.arg_count)
            })
            .collect();
    }
    Vec::new()
}

/// Drop candidates that another candidate overrides.
fn most_derived(graph: &CodeGraph, hits: Vec<NodeIndex>) -> Vec<NodeIndex> {
    let overridden: HashSet<NodeIndex> = hits
        .iter()
        .flat_map(|&h| graph.outgoing(h, EdgeKind::Overrides))
        .collect();
    let kept: Vec<NodeIndex> = hits
        .iter()
        .copied()
        .filter(|h| !overridden.contains(h))
        .collect();
    if kept.is_empty() { hits } else { kept }
}
