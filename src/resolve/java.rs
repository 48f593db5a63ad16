use super::calls::{CallResolver, Receiver};
use crate::frontend::CallSite;
use crate::frontend::java::type_candidates;
use crate::graph::CodeGraph;
use crate::language::LanguageKind;

/// Resolves Java method invocations.
pub struct JavaCallResolver;

impl CallResolver for JavaCallResolver {
    fn language(&self) -> LanguageKind {
        LanguageKind::Java
    }

    fn receiver(&self, graph: &CodeGraph, site: &CallSite) -> Receiver {
        let type_hint = match site.receiver.as_deref() {
            None | Some("this") => return Receiver::SelfType,
            Some("super") => return Receiver::Supertypes,
            Some(receiver) => match &site.receiver_type {
                Some(declared) => declared.as_str(),
                // `Util.compute()`: a capitalized bare receiver names a type.
                None if is_type_like(receiver) => receiver,
                None => return Receiver::Unknown,
            },
        };
        let enclosing = enclosing_types(graph, site);
        Receiver::Type(type_candidates(
            type_hint,
            site.scope.package.as_deref(),
            &site.scope.imports,
            &enclosing,
        ))
    }
}

fn is_type_like(receiver: &str) -> bool {
    let last = receiver.rsplit('.').next().unwrap_or(receiver);
    last.starts_with(|c: char| c.is_ascii_uppercase())
        && receiver.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

/// Qualified names of the caller's type and every type lexically enclosing it, innermost first.
fn enclosing_types(graph: &CodeGraph, site: &CallSite) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = site
        .enclosing_type
        .as_deref()
        .and_then(|id| graph.index_of(id));
    while let Some(idx) = current {
        let node = graph.node_at(idx);
        if !node.kind.is_type() {
            break;
        }
        chain.push(node.qualified_name.clone());
        current = graph.owner_of(idx);
    }
    chain
}
