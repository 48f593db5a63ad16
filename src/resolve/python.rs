use super::calls::{CallResolver, Receiver};
use crate::frontend::CallSite;
use crate::frontend::python::name_candidates;
use crate::graph::CodeGraph;
use crate::language::LanguageKind;

/// Resolves Python calls.
pub struct PythonCallResolver;

impl CallResolver for PythonCallResolver {
    fn language(&self) -> LanguageKind {
        LanguageKind::Python
    }

    fn receiver(&self, _graph: &CodeGraph, site: &CallSite) -> Receiver {
        let scope = &site.scope;
        let module_qn = scope.package.as_deref().unwrap_or("");
        match site.receiver.as_deref() {
            // A bare name is a module-level function, a class, or something imported.
            None => match scope.aliases.get(&site.callee) {
                Some(target) => Receiver::Qualified(vec![target.clone()]),
                None => Receiver::Module,
            },
            Some("self") | Some("cls") => Receiver::SelfType,
            Some("super") => Receiver::Supertypes,
            Some(receiver) => {
                let head = receiver.split('.').next().unwrap_or(receiver);
                let hint = match site.receiver_type.as_deref() {
                    Some(declared) => declared,
                    None if scope.aliases.contains_key(head) || is_class_like(receiver) => receiver,
                    None => return Receiver::Unknown,
                };
                Receiver::Type(name_candidates(hint, module_qn, &scope.aliases, None))
            }
        }
    }
}

fn is_class_like(receiver: &str) -> bool {
    receiver
        .rsplit('.')
        .next()
        .is_some_and(|last| last.starts_with(|c: char| c.is_ascii_uppercase()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use crate::frontend::FileScope;

    fn site(callee: &str, receiver: Option<&str>, receiver_type: Option<&str>) -> CallSite {
        let mut aliases = BTreeMap::new();
        aliases.insert("helper".to_string(), "shop.util.helper".to_string());
        aliases.insert("models".to_string(), "shop.models".to_string());
        CallSite {
            caller: "caller".into(),
            enclosing_type: None,
            callee: callee.into(),
            receiver: receiver.map(Into::into),
            receiver_type: receiver_type.map(Into::into),
            arg_count: 0,
            file: "shop/views.py".into(),
            line: 1,
            language: LanguageKind::Python,
            scope: Arc::new(FileScope {
                module: "python:module:shop/views.py#shop.views".into(),
                package: Some("shop.views".into()),
                imports: Vec::new(),
                aliases,
            }),
        }
    }

    #[test]
    fn test_receiver_classification() {
        let graph = CodeGraph::new();
        let r = PythonCallResolver;
        assert_eq!(r.receiver(&graph, &site("run", None, None)), Receiver::Module);
        assert_eq!(
            r.receiver(&graph, &site("helper", None, None)),
            Receiver::Qualified(vec!["shop.util.helper".into()])
        );
        assert_eq!(r.receiver(&graph, &site("save", Some("self"), None)), Receiver::SelfType);
        assert_eq!(r.receiver(&graph, &site("save", Some("super"), None)), Receiver::Supertypes);
        assert_eq!(r.receiver(&graph, &site("save", Some("item"), None)), Receiver::Unknown);

        let Receiver::Type(candidates) = r.receiver(&graph, &site("load", Some("models"), None)) else {
            panic!("expected module receiver");
        };
        assert_eq!(candidates[0], "shop.models");

        let Receiver::Type(candidates) =
            r.receiver(&graph, &site("get", Some("self.db"), Some("Connection")))
        else {
            panic!("expected typed receiver");
        };
        assert_eq!(candidates, vec!["shop.views.Connection", "Connection"]);
    }
}
