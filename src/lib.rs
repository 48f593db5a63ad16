//! Multi-language code-property graph.
//!
//! [`build_graph`] walks a repository, hands every Java and Python file to its
//! front end, merges the results into one [`CodeGraph`], then derives
//! `overrides` edges and resolves call sites. [`dynamic_query`] evaluates a
//! declarative [`FilterSpec`] against the finished graph.

pub mod builder;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod frontend;
pub mod graph;
pub mod language;
pub mod query;
pub mod resolve;
pub mod walker;

pub use builder::{BuildOutput, BuildStats, GraphBuilder, build_graph};
pub use config::BuildConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::{BuildError, ConfigError};
pub use frontend::{FrontEnd, LanguageRegistry, ParseOutput};
pub use graph::CodeGraph;
pub use language::LanguageKind;
pub use query::{FilterSpec, QueryResult, dynamic_query, dynamic_query_json};
pub use resolve::derive_overrides;
