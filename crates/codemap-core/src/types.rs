//! Core domain types for the Codemap code-property graph.
//!
//! Nodes represent source entities (files, classes, functions), edges the
//! relationships between them. Both are plain data: the graph crate decides
//! how they are persisted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Partition ─────────────────────────────────────────────────────

/// Tenant scope for every node and edge.
///
/// A manager instance is bound to one partition for its whole lifetime;
/// `node_id` values are only unique within a partition, and identical ids in
/// different partitions must never merge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Partition {
    pub repo_id: String,
    pub entity_id: String,
}

impl Partition {
    pub fn new(repo_id: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl Default for Partition {
    fn default() -> Self {
        Self {
            repo_id: "default_repo".to_string(),
            entity_id: "default_user".to_string(),
        }
    }
}

// ── Node Types ────────────────────────────────────────────────────

/// The primary kind of a graph node, mapped to a store label.
///
/// The taxonomy is open: anything beyond the three core kinds round-trips
/// through `Other` with its label uppercased.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    File,
    Class,
    Function,
    Other(String),
}

impl NodeKind {
    /// The store label for this kind.
    pub fn label(&self) -> &str {
        match self {
            Self::File => "FILE",
            Self::Class => "CLASS",
            Self::Function => "FUNCTION",
            Self::Other(label) => label,
        }
    }
}

impl From<String> for NodeKind {
    fn from(raw: String) -> Self {
        match raw.to_uppercase().as_str() {
            "FILE" => Self::File,
            "CLASS" => Self::Class,
            "FUNCTION" => Self::Function,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.label().to_string()
    }
}

/// A node in the code-property graph.
///
/// `path` is the source file path (full-text indexed, and the key for
/// delete-by-path); `node_path` is the qualified path of the entity within
/// the code hierarchy (e.g. `app/db.py.Session.commit`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeNode {
    pub node_id: String,
    pub name: String,
    pub path: String,
    pub node_path: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub extra_labels: Vec<String>,
    #[serde(default)]
    pub start_line: Option<i64>,
    #[serde(default)]
    pub end_line: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
    /// Arbitrary extra attributes merged onto the stored node.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl CodeNode {
    /// The full label set this node is stored under: extra labels, then the
    /// primary kind, then the generic `NODE` tag, deduplicated in order.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::with_capacity(self.extra_labels.len() + 2);
        for label in self
            .extra_labels
            .iter()
            .cloned()
            .chain([self.kind.label().to_string(), "NODE".to_string()])
        {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }
}

// ── Edge Types ────────────────────────────────────────────────────

/// A directed, typed relationship between two nodes.
///
/// `scope_text` participates in the merge key: two edges between the same
/// endpoints with the same type but different scopes are distinct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeEdge {
    pub source_id: String,
    pub target_id: String,
    pub rel_type: String,
    #[serde(default)]
    pub scope_text: Option<String>,
}

// ── Ingest Payload ────────────────────────────────────────────────

/// A bulk-ingest payload: all nodes and edges of one write call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<CodeNode>,
    #[serde(default)]
    pub edges: Vec<CodeEdge>,
}
