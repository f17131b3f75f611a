//! Batched merge-upsert of nodes and edges.
//!
//! Writes are idempotent: nodes merge on label set + identity key, edges on
//! endpoints + type + scope. Work is chunked client-side and every chunk
//! runs in its own write transaction, so one failing chunk never aborts its
//! siblings; failures are accumulated in the returned report instead.

use std::collections::HashMap;

use neo4rs::{query, BoltType};
use serde_json::Value;

use codemap_core::{CodeEdge, CodeNode};

use crate::client::{GraphClient, GraphError};

/// Records per chunk. Matches the store's periodic-iterate default.
const BATCH_SIZE: usize = 100;

/// Aggregate statistics for one write phase (nodes or edges).
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Chunks executed, including failed ones.
    pub batches: usize,
    /// Records merged into the store.
    pub total: u64,
    /// Edge rows dropped because an endpoint was missing.
    pub skipped: u64,
    /// One message per failed chunk.
    pub errors: Vec<String>,
}

/// Statistics for a whole `write_graph` call.
#[derive(Debug, Clone, Default)]
pub struct WriteReport {
    pub nodes: BatchReport,
    pub edges: BatchReport,
}

impl GraphClient {
    /// Bulk-upsert `nodes` and then `edges` into this client's partition.
    ///
    /// Nodes are written strictly before edges, since edges resolve their
    /// endpoints by `node_id`. An edge whose endpoint is still absent is
    /// skipped and counted, not treated as a hard error: callers may ingest
    /// across several calls in any order.
    pub async fn write_graph(
        &self,
        nodes: &[CodeNode],
        edges: &[CodeEdge],
    ) -> Result<WriteReport, GraphError> {
        self.ensure_open()?;
        let report = WriteReport {
            nodes: self.write_nodes(nodes).await,
            edges: self.write_edges(edges).await,
        };
        Ok(report)
    }

    async fn write_nodes(&self, nodes: &[CodeNode]) -> BatchReport {
        let mut report = BatchReport::default();

        // Labels cannot be parameterized in Cypher, so nodes are grouped by
        // their full label set and each group gets its own merge statement.
        for (labels, group) in group_nodes_by_labels(nodes) {
            let cypher = node_merge_cypher(&labels);
            for chunk in group.chunks(BATCH_SIZE) {
                report.batches += 1;
                let rows: Vec<HashMap<String, BoltType>> =
                    chunk.iter().map(|node| node_row(node)).collect();
                let q = query(&cypher)
                    .param("rows", rows)
                    .param("repoId", self.partition().repo_id.clone())
                    .param("entityId", self.partition().entity_id.clone());

                match self.query_one(q).await {
                    Ok(row) => {
                        let merged = merged_count(row);
                        report.total += merged;
                    }
                    Err(e) => {
                        tracing::warn!(batch = report.batches, error = %e, "node batch failed");
                        report.errors.push(format!("node batch {}: {e}", report.batches));
                    }
                }
            }
        }

        tracing::info!(
            batches = report.batches,
            total = report.total,
            failed_batches = report.errors.len(),
            "Merged nodes"
        );
        report
    }

    async fn write_edges(&self, edges: &[CodeEdge]) -> BatchReport {
        let mut report = BatchReport::default();

        for (rel_type, group) in group_edges_by_type(edges) {
            let cypher = edge_merge_cypher(&rel_type);
            for chunk in group.chunks(BATCH_SIZE) {
                report.batches += 1;
                let submitted = chunk.len() as u64;
                let rows: Vec<HashMap<String, BoltType>> =
                    chunk.iter().map(|edge| edge_row(edge)).collect();
                let q = query(&cypher)
                    .param("rows", rows)
                    .param("repoId", self.partition().repo_id.clone())
                    .param("entityId", self.partition().entity_id.clone());

                match self.query_one(q).await {
                    Ok(row) => {
                        let merged = merged_count(row);
                        report.total += merged;
                        report.skipped += submitted.saturating_sub(merged);
                    }
                    Err(e) => {
                        tracing::warn!(batch = report.batches, error = %e, "edge batch failed");
                        report.errors.push(format!("edge batch {}: {e}", report.batches));
                    }
                }
            }
        }

        tracing::info!(
            batches = report.batches,
            total = report.total,
            skipped = report.skipped,
            failed_batches = report.errors.len(),
            "Merged edges"
        );
        report
    }

    /// Detach-delete every node in this partition whose `path` attribute
    /// equals `path`, cascading removal of all incident edges. Returns the
    /// number of removed nodes.
    pub async fn delete_by_path(&self, path: &str) -> Result<u64, GraphError> {
        let q = query(
            "MATCH (n {path: $path, repoId: $repoId, entityId: $entityId})
             DETACH DELETE n
             RETURN count(n) AS removed",
        )
        .param("path", path.to_string())
        .param("repoId", self.partition().repo_id.clone())
        .param("entityId", self.partition().entity_id.clone());

        let removed = match self.query_one(q).await? {
            Some(row) => row.get::<i64>("removed").unwrap_or(0).max(0) as u64,
            None => 0,
        };
        tracing::info!(path, removed, "Detach-deleted nodes by path");
        Ok(removed)
    }
}

// ── Cypher assembly ──────────────────────────────────────────────

fn node_merge_cypher(labels: &[String]) -> String {
    format!(
        "UNWIND $rows AS row
         MERGE (n{labels} {{node_id: row.node_id, repoId: $repoId, entityId: $entityId}})
         SET n += row.props
         RETURN count(n) AS merged",
        labels = label_fragment(labels),
    )
}

fn edge_merge_cypher(rel_type: &str) -> String {
    format!(
        "UNWIND $rows AS row
         MATCH (a:NODE {{node_id: row.source_id, repoId: $repoId, entityId: $entityId}})
         MATCH (b:NODE {{node_id: row.target_id, repoId: $repoId, entityId: $entityId}})
         MERGE (a)-[r:{rel_type} {{scopeText: row.scope_text}}]->(b)
         RETURN count(r) AS merged",
        rel_type = cypher_ident(rel_type),
    )
}

fn label_fragment(labels: &[String]) -> String {
    labels
        .iter()
        .map(|label| format!(":{}", cypher_ident(label)))
        .collect()
}

/// Quote a label or relationship type for interpolation into Cypher.
/// Backticks are stripped first so the quoting cannot be broken out of.
fn cypher_ident(raw: &str) -> String {
    format!("`{}`", raw.replace('`', ""))
}

// ── Row construction ─────────────────────────────────────────────

fn node_row(node: &CodeNode) -> HashMap<String, BoltType> {
    let mut props: HashMap<String, BoltType> = HashMap::new();
    props.insert("node_id".to_string(), node.node_id.clone().into());
    props.insert("name".to_string(), node.name.clone().into());
    props.insert("path".to_string(), node.path.clone().into());
    props.insert("node_path".to_string(), node.node_path.clone().into());
    if let Some(line) = node.start_line {
        props.insert("start_line".to_string(), line.into());
    }
    if let Some(line) = node.end_line {
        props.insert("end_line".to_string(), line.into());
    }
    if let Some(text) = &node.text {
        props.insert("text".to_string(), text.clone().into());
    }
    for (key, value) in &node.properties {
        if let Some(bolt) = json_to_bolt(value) {
            props.insert(key.clone(), bolt);
        }
    }

    let mut row: HashMap<String, BoltType> = HashMap::new();
    row.insert("node_id".to_string(), node.node_id.clone().into());
    row.insert("props".to_string(), props.into());
    row
}

fn edge_row(edge: &CodeEdge) -> HashMap<String, BoltType> {
    let mut row: HashMap<String, BoltType> = HashMap::new();
    row.insert("source_id".to_string(), edge.source_id.clone().into());
    row.insert("target_id".to_string(), edge.target_id.clone().into());
    // The scope participates in the merge key, and a null inside a MERGE key
    // map is an error in Neo4j: absent normalizes to the empty string.
    row.insert(
        "scope_text".to_string(),
        edge.scope_text.clone().unwrap_or_default().into(),
    );
    row
}

/// Convert a JSON attribute value to its Bolt representation. Nulls are
/// dropped entirely: Neo4j stores no null properties, and `SET n += map`
/// with a null value would remove the property instead.
fn json_to_bolt(value: &Value) -> Option<BoltType> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some((*b).into()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.into())
            } else {
                n.as_f64().map(Into::into)
            }
        }
        Value::String(s) => Some(s.clone().into()),
        Value::Array(items) => {
            let list: Vec<BoltType> = items.iter().filter_map(json_to_bolt).collect();
            Some(list.into())
        }
        Value::Object(map) => {
            let mut bolt: HashMap<String, BoltType> = HashMap::new();
            for (key, item) in map {
                if let Some(converted) = json_to_bolt(item) {
                    bolt.insert(key.clone(), converted);
                }
            }
            Some(bolt.into())
        }
    }
}

// ── Grouping ─────────────────────────────────────────────────────

/// Group nodes by their full label set, preserving first-seen group order
/// and the input order within each group.
fn group_nodes_by_labels(nodes: &[CodeNode]) -> Vec<(Vec<String>, Vec<&CodeNode>)> {
    let mut groups: Vec<(Vec<String>, Vec<&CodeNode>)> = Vec::new();
    for node in nodes {
        let labels = node.labels();
        match groups.iter_mut().find(|(key, _)| *key == labels) {
            Some((_, members)) => members.push(node),
            None => groups.push((labels, vec![node])),
        }
    }
    groups
}

/// Group edges by relationship type, preserving order as above.
fn group_edges_by_type(edges: &[CodeEdge]) -> Vec<(String, Vec<&CodeEdge>)> {
    let mut groups: Vec<(String, Vec<&CodeEdge>)> = Vec::new();
    for edge in edges {
        match groups.iter_mut().find(|(key, _)| *key == edge.rel_type) {
            Some((_, members)) => members.push(edge),
            None => groups.push((edge.rel_type.clone(), vec![edge])),
        }
    }
    groups
}

fn merged_count(row: Option<neo4rs::Row>) -> u64 {
    row.and_then(|r| r.get::<i64>("merged").ok())
        .unwrap_or(0)
        .max(0) as u64
}
