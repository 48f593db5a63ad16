mod cli;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, SliceKind};
use codeprop::export::compact;
use codeprop::query::endpoints::{endpoint_detail, endpoints_with_param_source, list_endpoints};
use codeprop::query::slices::{slice_controllers, slice_listeners};
use codeprop::query::{FilterSpec, QueryResult, dynamic_query};
use codeprop::{BuildOutput, build_graph};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Index { path, json } => {
            let out = build(&path)?;
            output::print_summary(&out.stats, &out.diagnostics, json);
        }
        Commands::Query {
            path,
            filter,
            format,
            max_nodes,
        } => {
            let spec = load_filter(&filter)?;
            let out = build(&path)?;
            let result = dynamic_query(&out.graph, &spec).context("invalid filter")?;
            let result = shrink(result, max_nodes);
            println!("{}", output::format_query(&result, &format)?);
        }
        Commands::Slice {
            path,
            kind,
            neighbors,
            format,
            max_nodes,
        } => {
            let out = build(&path)?;
            let result = match kind {
                SliceKind::Controllers => slice_controllers(&out.graph, neighbors),
                SliceKind::Listeners => slice_listeners(&out.graph, neighbors),
            };
            let result = shrink(result, max_nodes);
            println!("{}", output::format_query(&result, &format)?);
        }
        Commands::Endpoints {
            path,
            owner,
            param_source,
            format,
        } => {
            let out = build(&path)?;
            match param_source {
                Some(source) => {
                    let usages = endpoints_with_param_source(&out.graph, source);
                    println!("{}", output::format_param_usages(&usages, &format));
                }
                None => {
                    let endpoints = list_endpoints(&out.graph, owner.as_deref());
                    println!("{}", output::format_endpoints(&endpoints, &format));
                }
            }
        }
        Commands::Endpoint { path, handler } => {
            let out = build(&path)?;
            let detail = endpoint_detail(&out.graph, &handler)
                .with_context(|| format!("no endpoint handler named {handler}"))?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
        }
    }

    Ok(())
}

fn shrink(result: QueryResult, max_nodes: Option<usize>) -> QueryResult {
    match max_nodes {
        Some(max) => compact(&result, max),
        None => result,
    }
}

fn build(path: &std::path::Path) -> Result<BuildOutput> {
    build_graph(path).with_context(|| format!("failed to build graph for {}", path.display()))
}

/// Inline JSON, or `@file` to read the filter from disk.
fn load_filter(arg: &str) -> Result<FilterSpec> {
    let text = match arg.strip_prefix('@') {
        Some(file) => std::fs::read_to_string(file)
            .with_context(|| format!("failed to read filter file {file}"))?,
        None => arg.to_string(),
    };
    FilterSpec::parse(&text).context("invalid filter")
}

/// Logs go to stderr; `CODEPROP_LOG` takes an `EnvFilter` directive, `--verbose` forces debug.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("codeprop=debug")
    } else {
        EnvFilter::try_from_env("CODEPROP_LOG").unwrap_or_else(|_| EnvFilter::new("codeprop=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
