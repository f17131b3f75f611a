//! Neo4j connection management and the shared graph client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use neo4rs::{query, ConfigBuilder, Graph, Query};

use codemap_core::Partition;

/// Connection attempts before giving up on an unreachable store.
const CONNECT_ATTEMPTS: u32 = 3;

/// Base backoff delay, doubled after each failed attempt.
const CONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Name of the full-text index over code entity names, paths and ids.
pub(crate) const FULLTEXT_INDEX: &str = "codeNames";

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("graph client is closed")]
    Closed,

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_connections: usize,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "codemap-dev".to_string(),
            max_connections: 50,
            fetch_size: 256,
        }
    }
}

/// Lifecycle of a [`GraphClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Ready,
    Closed,
}

/// Thread-safe Neo4j graph client with connection pooling, bound to one
/// `(repo_id, entity_id)` partition for its whole lifetime.
///
/// Clone is cheap (inner Arc); all clones share the pool and the lifecycle
/// flag, so closing one clone closes them all.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
    partition: Partition,
    closed: Arc<AtomicBool>,
}

impl GraphClient {
    /// Connect to Neo4j and provision indexes.
    ///
    /// Transient unavailability is retried up to [`CONNECT_ATTEMPTS`] times
    /// with exponential backoff; exhausting the retries surfaces a
    /// [`GraphError::Connection`] to the caller.
    pub async fn connect(config: &GraphConfig, partition: Partition) -> Result<Self, GraphError> {
        let mut attempt = 0u32;
        let graph = loop {
            attempt += 1;
            match Self::open_pool(config).await {
                Ok(graph) => break graph,
                Err(e) if attempt < CONNECT_ATTEMPTS => {
                    let delay = CONNECT_BACKOFF * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Neo4j unavailable, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(GraphError::Connection(format!(
                        "giving up after {attempt} attempts: {e}"
                    )));
                }
            }
        };

        let client = Self {
            graph,
            partition,
            closed: Arc::new(AtomicBool::new(false)),
        };
        client.provision_indexes().await?;

        tracing::info!(
            uri = %config.uri,
            repo_id = %client.partition.repo_id,
            entity_id = %client.partition.entity_id,
            "Connected to Neo4j"
        );
        Ok(client)
    }

    /// One connection attempt: build the pool and verify it with a
    /// round-trip, since pool construction alone does not touch the network.
    async fn open_pool(config: &GraphConfig) -> Result<Graph, GraphError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        Ok(graph)
    }

    /// Declarative, idempotent index provisioning. Re-opening against an
    /// already-provisioned store is a no-op.
    async fn provision_indexes(&self) -> Result<(), GraphError> {
        let fulltext = format!(
            "CREATE FULLTEXT INDEX {FULLTEXT_INDEX} IF NOT EXISTS \
             FOR (n:CLASS|FUNCTION|FILE) ON EACH [n.name, n.path, n.node_id]"
        );
        self.run(query(&fulltext)).await?;

        self.run(query(
            "CREATE INDEX node_id_NODE IF NOT EXISTS FOR (n:NODE) ON (n.node_id)",
        ))
        .await?;

        self.run(query(
            "CREATE INDEX entityId_NODE IF NOT EXISTS FOR (n:NODE) ON (n.entityId)",
        ))
        .await?;

        Ok(())
    }

    /// The partition this client writes into and reads from.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn state(&self) -> ConnectionState {
        if self.closed.load(Ordering::Acquire) {
            ConnectionState::Closed
        } else {
            ConnectionState::Ready
        }
    }

    /// Release the client. Idempotent and never fails; subsequent operations
    /// on any clone return [`GraphError::Closed`]. The pooled connections
    /// themselves are released when the last clone drops.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::info!("Graph client closed");
        }
    }

    pub(crate) fn ensure_open(&self) -> Result<(), GraphError> {
        match self.state() {
            ConnectionState::Ready => Ok(()),
            ConnectionState::Closed => Err(GraphError::Closed),
        }
    }

    /// Execute a write-only query (CREATE, MERGE, DELETE, SET).
    pub async fn run(&self, query: Query) -> Result<(), GraphError> {
        self.ensure_open()?;
        self.graph.run(query).await?;
        Ok(())
    }

    /// Execute a read query and collect all rows.
    pub async fn query_rows(&self, query: Query) -> Result<Vec<neo4rs::Row>, GraphError> {
        self.ensure_open()?;
        let mut stream = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a read query and return the first row, if any.
    pub async fn query_one(&self, query: Query) -> Result<Option<neo4rs::Row>, GraphError> {
        self.ensure_open()?;
        let mut stream = self.graph.execute(query).await?;
        Ok(stream.next().await?)
    }
}
