//! graphlens-graph: Neo4j schema introspection for Graphlens.
//!
//! Everything that talks to the database lives here. A [`Neo4jGraph`] runs
//! introspection and statistics queries through a [`QueryExecutor`],
//! renders the result with `graphlens-core`, and publishes it as an
//! immutable snapshot. The same executor runs ad-hoc queries and bulk
//! imports of extracted graph documents.

pub mod client;
pub mod collector;
pub mod executor;
pub mod import;
pub mod sampler;
pub mod store;

#[cfg(test)]
mod test_support;

pub use client::{GraphClient, GraphConfig, GraphError};
pub use executor::{ExecutorError, QueryExecutor};
pub use import::{import_graph_documents, node_import_query, rel_import_query, ImportSummary};
pub use store::{GraphStore, Neo4jGraph};
