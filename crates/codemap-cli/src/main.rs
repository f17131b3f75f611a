//! CLI entry point for the Codemap graph store.

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use codemap_core::{GraphDocument, Partition};
use codemap_graph::{GraphClient, GraphConfig, NeighborResult, NodeResult, WriteReport};

/// Rendered when a lookup or search resolves nothing.
const NO_RESULT: &str = "No code found for the given query";

#[derive(Parser)]
#[command(name = "codemap")]
#[command(about = "Persist and query a code-property graph in Neo4j")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: codemap, reads codemap.toml).
    #[arg(short, long, default_value = "codemap")]
    config: String,

    /// Override the configured repo partition key.
    #[arg(long)]
    repo_id: Option<String>,

    /// Override the configured entity partition key.
    #[arg(long)]
    entity_id: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Bulk-ingest a graph document ({"nodes": [...], "edges": [...]}).
    Ingest {
        /// Path to the JSON graph document.
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Look up a node by exact id and print it with its neighbors.
    Get {
        #[arg(long)]
        id: String,
    },
    /// Fuzzy full-text search for a node, printed with its neighbors.
    Search {
        #[arg(short, long)]
        query: String,
    },
    /// Detach-delete every node with the given path attribute.
    DeletePath {
        #[arg(long)]
        path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let (graph_config, partition) = load_config(&cli);
    let client = GraphClient::connect(&graph_config, partition).await?;

    match &cli.command {
        Command::Ingest { file } => {
            let raw = std::fs::read_to_string(file)?;
            let doc: GraphDocument = serde_json::from_str(&raw)?;
            let report = client.write_graph(&doc.nodes, &doc.edges).await?;
            print!("{}", render_report(&report));
        }
        Command::Get { id } => {
            let result = client.get_node_by_id(id).await?;
            println!("{}", render_lookup(result.as_ref()));
        }
        Command::Search { query } => {
            let result = client.search_nodes_by_text(query).await?;
            println!("{}", render_lookup(result.as_ref()));
        }
        Command::DeletePath { path } => {
            let removed = client.delete_by_path(path).await?;
            println!("removed {removed} nodes with path {path}");
        }
    }

    client.close();
    Ok(())
}

/// Load connection settings and the partition from `<prefix>.toml` layered
/// with `CODEMAP__` environment variables; CLI flags win over both.
fn load_config(cli: &Cli) -> (GraphConfig, Partition) {
    let defaults = GraphConfig::default();
    let mut partition = Partition::default();

    let cfg = config::Config::builder()
        .add_source(config::File::with_name(&cli.config).required(false))
        .add_source(
            config::Environment::with_prefix("CODEMAP")
                .separator("__")
                .try_parsing(true),
        )
        .build();

    let graph_config = match &cfg {
        Ok(c) => {
            if let Ok(v) = c.get_string("graph.repo_id") {
                partition.repo_id = v;
            }
            if let Ok(v) = c.get_string("graph.entity_id") {
                partition.entity_id = v;
            }
            GraphConfig {
                uri: c.get_string("neo4j.uri").unwrap_or(defaults.uri),
                user: c.get_string("neo4j.user").unwrap_or(defaults.user),
                password: c.get_string("neo4j.password").unwrap_or(defaults.password),
                max_connections: c
                    .get_int("neo4j.max_connections")
                    .map(|v| v as usize)
                    .unwrap_or(defaults.max_connections),
                fetch_size: defaults.fetch_size,
            }
        }
        Err(_) => defaults,
    };

    if let Some(v) = &cli.repo_id {
        partition.repo_id = v.clone();
    }
    if let Some(v) = &cli.entity_id {
        partition.entity_id = v.clone();
    }

    (graph_config, partition)
}

fn render_lookup(result: Option<&(NodeResult, Vec<NeighborResult>)>) -> String {
    let Some((node, neighbors)) = result else {
        return NO_RESULT.to_string();
    };

    let mut out = String::new();
    let _ = writeln!(out, "current node code:");
    match &node.text {
        Some(text) => {
            let _ = writeln!(out, "{text}");
        }
        None => {
            let _ = writeln!(out, "<no source text for {}>", node.node_path);
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "current node neighbours:");
    if neighbors.is_empty() {
        let _ = write!(out, "(none)");
    } else {
        for (i, neighbor) in neighbors.iter().enumerate() {
            if i > 0 {
                let _ = writeln!(out);
            }
            let _ = write!(
                out,
                "- {} ({}) [{}] via {}",
                neighbor.name,
                neighbor.node_id,
                neighbor.node_type.join("|"),
                neighbor.relationship_type,
            );
        }
    }
    out
}

fn render_report(report: &WriteReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "nodes: {} merged in {} batches, {} failed",
        report.nodes.total,
        report.nodes.batches,
        report.nodes.errors.len(),
    );
    let _ = writeln!(
        out,
        "edges: {} merged in {} batches, {} skipped, {} failed",
        report.edges.total,
        report.edges.batches,
        report.edges.skipped,
        report.edges.errors.len(),
    );
    for error in report.nodes.errors.iter().chain(&report.edges.errors) {
        let _ = writeln!(out, "error: {error}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> (NodeResult, Vec<NeighborResult>) {
        (
            NodeResult {
                node_id: "fn-1".to_string(),
                name: "parse_header".to_string(),
                node_path: "src/parser.rs.parse_header".to_string(),
                start_line: Some(10),
                end_line: Some(42),
                text: Some("fn parse_header() {}".to_string()),
            },
            vec![NeighborResult {
                node_id: "fn-2".to_string(),
                name: "read_bytes".to_string(),
                node_type: vec!["FUNCTION".to_string(), "NODE".to_string()],
                relationship_type: "CALLS".to_string(),
            }],
        )
    }

    #[test]
    fn test_render_miss_is_fixed_message() {
        assert_eq!(render_lookup(None), NO_RESULT);
    }

    #[test]
    fn test_render_hit_contains_code_and_neighbors() {
        let result = sample_result();
        let rendered = render_lookup(Some(&result));
        assert!(rendered.starts_with("current node code:"));
        assert!(rendered.contains("fn parse_header() {}"));
        assert!(rendered.contains("current node neighbours:"));
        assert!(rendered.contains("- read_bytes (fn-2) [FUNCTION|NODE] via CALLS"));
    }

    #[test]
    fn test_render_report_summarizes_phases() {
        let mut report = WriteReport::default();
        report.nodes.batches = 2;
        report.nodes.total = 150;
        report.edges.batches = 1;
        report.edges.total = 7;
        report.edges.skipped = 3;
        report.edges.errors.push("edge batch 1: boom".to_string());

        let rendered = render_report(&report);
        assert!(rendered.contains("nodes: 150 merged in 2 batches, 0 failed"));
        assert!(rendered.contains("edges: 7 merged in 1 batches, 3 skipped, 1 failed"));
        assert!(rendered.contains("error: edge batch 1: boom"));
    }
}
