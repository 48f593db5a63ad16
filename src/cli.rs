use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use codeprop::query::endpoints::ParamSource;

/// A code-property graph for Java and Python codebases.
///
/// codeprop indexes a source tree into declarations and their relationships
/// (containment, inheritance, overrides, calls, HTTP routes) and answers
/// structured queries over the result.
#[derive(Parser, Debug)]
#[command(
    name = "codeprop",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log build progress to stderr (overrides CODEPROP_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Output format for query results.
#[derive(Clone, Debug, ValueEnum, Default)]
pub enum OutputFormat {
    /// One line per node, then one line per edge (default).
    #[default]
    Compact,
    /// The structured `{"nodes": [...], "edges": [...]}` document.
    Json,
    /// Mermaid flowchart of the result.
    Mermaid,
    /// GraphML document for graph tools.
    Graphml,
}

/// Canned subgraphs.
#[derive(Clone, Debug, ValueEnum)]
pub enum SliceKind {
    /// Controller types and request handlers.
    Controllers,
    /// Event and message listeners.
    Listeners,
}

/// Output format for endpoint listings.
#[derive(Clone, Debug, ValueEnum, Default)]
pub enum ListFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the graph for a repository and print a summary.
    Index {
        /// Path to the repository root.
        path: PathBuf,

        /// Output the summary and diagnostics as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Evaluate a filter specification against the graph.
    ///
    /// The filter is a JSON object, e.g. '{"kind":"method","http_method_any":["GET"]}',
    /// or `@path` to read it from a file.
    Query {
        /// Path to the repository root.
        path: PathBuf,

        /// Filter as inline JSON or @file.
        #[arg(long)]
        filter: String,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,

        /// Keep at most this many nodes, types and well-connected callables first.
        #[arg(long)]
        max_nodes: Option<usize>,
    },

    /// Extract the controller or listener layer with its neighborhood.
    Slice {
        /// Path to the repository root.
        path: PathBuf,

        /// Which slice to extract.
        #[arg(value_enum)]
        kind: SliceKind,

        /// Expand the seeds by this many hops.
        #[arg(long, default_value_t = 1)]
        neighbors: usize,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,

        /// Keep at most this many nodes, types and well-connected callables first.
        #[arg(long)]
        max_nodes: Option<usize>,
    },

    /// List HTTP endpoints (Spring, Flask, FastAPI handlers).
    Endpoints {
        /// Path to the repository root.
        path: PathBuf,

        /// Only handlers declared on this type or module (qualified or simple name).
        #[arg(long, conflicts_with = "param_source")]
        owner: Option<String>,

        /// Only handlers binding parameters from this source
        /// (path, query, header, body, cookie).
        #[arg(long)]
        param_source: Option<ParamSource>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = ListFormat::Compact)]
        format: ListFormat,
    },

    /// Show the full route detail of one handler as JSON.
    Endpoint {
        /// Path to the repository root.
        path: PathBuf,

        /// Handler id or qualified name, e.g. `shop.ProductController.find(long)`.
        handler: String,
    },
}
