//! Read path: exact-id and fuzzy full-text retrieval with one-hop expansion.

use neo4rs::query;

use crate::client::{GraphClient, GraphError, FULLTEXT_INDEX};
use crate::escape::escape_fulltext;

/// Immutable snapshot of a node at read time.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NodeResult {
    pub node_id: String,
    pub name: String,
    pub node_path: String,
    pub start_line: Option<i64>,
    pub end_line: Option<i64>,
    pub text: Option<String>,
}

/// One outgoing edge from a queried node.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NeighborResult {
    pub node_id: String,
    pub name: String,
    /// Full label set of the target node.
    pub node_type: Vec<String>,
    pub relationship_type: String,
}

impl GraphClient {
    // ── Lookups ──────────────────────────────────────────────────

    /// Resolve a node by exact `node_id`, across any label, and expand its
    /// one-hop neighborhood. A miss is an expected outcome and returns
    /// `Ok(None)`, never an error.
    pub async fn get_node_by_id(
        &self,
        node_id: &str,
    ) -> Result<Option<(NodeResult, Vec<NeighborResult>)>, GraphError> {
        let q = query(
            "MATCH (n)
             WHERE n.node_id = $node_id
             RETURN n",
        )
        .param("node_id", node_id.to_string());

        let Some(row) = self.query_one(q).await? else {
            return Ok(None);
        };
        let node: neo4rs::Node = row
            .get("n")
            .map_err(|e| GraphError::Serialization(format!("Failed to deserialize node: {e}")))?;

        let result = node_result_from(&node)?;
        let neighbors = self.neighbors(&result.node_id).await?;
        Ok(Some((result, neighbors)))
    }

    /// Resolve a node by fuzzy text and expand its one-hop neighborhood.
    ///
    /// The escaped query runs against the full-text index twice at most:
    /// first wrapped in wildcards (forgiving for partial identifiers), then,
    /// only if that yields nothing, as the bare escaped token — wildcard
    /// search can miss short precise queries due to tokenization. Both
    /// attempts are scoped to this client's `repo_id` and take the
    /// highest-scoring hit.
    pub async fn search_nodes_by_text(
        &self,
        text: &str,
    ) -> Result<Option<(NodeResult, Vec<NeighborResult>)>, GraphError> {
        let escaped = escape_fulltext(text);

        let hit = match self.fulltext_top_hit(&format!("*{escaped}*")).await? {
            Some(node) => Some(node),
            None => self.fulltext_top_hit(&escaped).await?,
        };
        let Some(node) = hit else {
            return Ok(None);
        };

        let result = node_result_from(&node)?;
        let neighbors = self.neighbors(&result.node_id).await?;
        Ok(Some((result, neighbors)))
    }

    /// One tier of the search fallback: the top-scored full-text hit for
    /// `term` within this client's repo, if any.
    async fn fulltext_top_hit(&self, term: &str) -> Result<Option<neo4rs::Node>, GraphError> {
        let q = query(
            "CALL db.index.fulltext.queryNodes($index, $term) YIELD node, score
             WHERE node.repoId = $repoId
             RETURN node, score
             ORDER BY score DESC
             LIMIT 1",
        )
        .param("index", FULLTEXT_INDEX)
        .param("term", term.to_string())
        .param("repoId", self.partition().repo_id.clone());

        match self.query_one(q).await? {
            Some(row) => {
                let node: neo4rs::Node = row.get("node").map_err(|e| {
                    GraphError::Serialization(format!("Failed to deserialize search hit: {e}"))
                })?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    // ── Neighbor Expansion ───────────────────────────────────────

    /// All outgoing one-hop relationships of a node, in store order.
    /// Multiple relationship types between the same pair yield one entry
    /// each; no deduplication.
    pub async fn neighbors(&self, node_id: &str) -> Result<Vec<NeighborResult>, GraphError> {
        let q = query(
            "MATCH (n {node_id: $node_id})-[r]->(m)
             RETURN type(r) AS relationship_type,
                    m.node_id AS node_id,
                    m.name AS name,
                    labels(m) AS node_type",
        )
        .param("node_id", node_id.to_string());

        let rows = self.query_rows(q).await?;
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            results.push(NeighborResult {
                node_id: row.get("node_id").unwrap_or_default(),
                name: row.get("name").unwrap_or_default(),
                node_type: row.get("node_type").unwrap_or_default(),
                relationship_type: row.get("relationship_type").unwrap_or_default(),
            });
        }
        Ok(results)
    }
}

/// Project a raw store node into the stable read shape shared by both
/// lookup paths.
fn node_result_from(node: &neo4rs::Node) -> Result<NodeResult, GraphError> {
    Ok(NodeResult {
        node_id: node
            .get::<String>("node_id")
            .map_err(|e| GraphError::Serialization(format!("node without node_id: {e}")))?,
        name: node.get::<String>("name").unwrap_or_default(),
        node_path: node.get::<String>("node_path").unwrap_or_default(),
        start_line: node.get::<i64>("start_line").ok(),
        end_line: node.get::<i64>("end_line").ok(),
        text: node.get::<String>("text").ok(),
    })
}
