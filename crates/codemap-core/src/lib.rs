//! codemap-core: Shared types for the Codemap code-property graph.
//!
//! This crate provides the foundational types used across all Codemap
//! components:
//! - Node and edge types for the code-property graph
//! - The tenant partition identifying whose graph a manager operates on
//! - The serde shape of a bulk-ingest payload

pub mod types;

pub use types::{CodeEdge, CodeNode, GraphDocument, NodeKind, Partition};
