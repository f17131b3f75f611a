//! Codemap Graph — Neo4j persistence and retrieval for the code-property graph.
//!
//! This crate is the single access point to the stored graph. All reads and
//! writes flow through [`GraphClient`] to ensure consistent partition
//! isolation, idempotent merge semantics, and index usage.

pub mod bulk;
pub mod client;
pub mod escape;
pub mod queries;

pub use bulk::{BatchReport, WriteReport};
pub use client::{ConnectionState, GraphClient, GraphConfig, GraphError};
pub use escape::escape_fulltext;
pub use queries::{NeighborResult, NodeResult};
