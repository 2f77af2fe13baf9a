//! The graph store facade: schema snapshots, query passthrough, import.

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use async_trait::async_trait;

use graphlens_core::{
    format_schema, sanitize_record, GraphDocument, Params, Record, SchemaConfig, SchemaSnapshot,
    StructuredSchema,
};

use crate::client::{GraphClient, GraphConfig, GraphError};
use crate::collector::collect_schema;
use crate::executor::QueryExecutor;
use crate::import::{import_graph_documents, ImportSummary};
use crate::sampler::enhance_schema;

/// A graph database whose schema can be introspected and queried.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Formatted schema text from the last completed refresh.
    fn schema(&self) -> String;

    /// Structured schema from the last completed refresh.
    fn structured_schema(&self) -> Arc<StructuredSchema>;

    /// Run a query and return its records.
    async fn query(&self, query: &str, params: Params) -> Result<Vec<Record>, GraphError>;

    /// Rebuild the schema and publish it atomically.
    async fn refresh_schema(&self) -> Result<(), GraphError>;
}

/// Neo4j-backed [`GraphStore`].
///
/// Readers always see a complete snapshot: a refresh builds its replacement
/// off to the side and swaps it in only once collection, enhancement, and
/// formatting have all succeeded. A failed refresh leaves the previous
/// snapshot in place.
pub struct Neo4jGraph<E = GraphClient> {
    executor: E,
    config: SchemaConfig,
    snapshot: ArcSwap<SchemaSnapshot>,
}

impl Neo4jGraph<GraphClient> {
    /// Connect and, unless disabled, run the first refresh.
    pub async fn connect(
        graph_config: &GraphConfig,
        config: SchemaConfig,
    ) -> Result<Self, GraphError> {
        let client = GraphClient::connect(graph_config).await?;
        let store = Self::new(client, config);
        if store.config.refresh_on_connect {
            store.refresh_schema().await?;
        }
        Ok(store)
    }
}

impl<E: QueryExecutor> Neo4jGraph<E> {
    /// Wrap an executor. The schema stays empty until the first refresh.
    pub fn new(executor: E, config: SchemaConfig) -> Self {
        Self {
            executor,
            config,
            snapshot: ArcSwap::from_pointee(SchemaSnapshot::default()),
        }
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// The current snapshot. Holding it pins that version across refreshes.
    pub fn snapshot(&self) -> Arc<SchemaSnapshot> {
        self.snapshot.load_full()
    }

    /// Import extracted graph documents. See [`import_graph_documents`].
    pub async fn add_graph_documents(
        &self,
        documents: &[GraphDocument],
        use_common_label: bool,
        include_source: bool,
    ) -> Result<ImportSummary, GraphError> {
        import_graph_documents(&self.executor, documents, use_common_label, include_source).await
    }

    /// Release the store and its executor. In-flight snapshots held by
    /// readers remain valid.
    pub fn close(self) {
        tracing::debug!("Closing graph store");
    }
}

#[async_trait]
impl<E: QueryExecutor> GraphStore for Neo4jGraph<E> {
    fn schema(&self) -> String {
        self.snapshot.load().formatted.clone()
    }

    fn structured_schema(&self) -> Arc<StructuredSchema> {
        Arc::clone(&self.snapshot.load().structured)
    }

    async fn query(&self, query: &str, params: Params) -> Result<Vec<Record>, GraphError> {
        let records = self.executor.execute(query, params).await?;
        if !self.config.sanitize {
            return Ok(records);
        }
        Ok(records
            .iter()
            .map(|r| sanitize_record(r, self.config.list_limit))
            .collect())
    }

    async fn refresh_schema(&self) -> Result<(), GraphError> {
        let started = Instant::now();
        let mut structured = collect_schema(&self.executor, &self.config).await?;

        if self.config.enhanced_schema {
            let summary = enhance_schema(&self.executor, &mut structured, &self.config).await?;
            tracing::debug!(
                enhanced = summary.enhanced,
                skipped = summary.skipped,
                "Collected property statistics"
            );
        }

        let formatted = format_schema(&structured, self.config.enhanced_schema, &self.config);
        let labels = structured.node_props.len();
        let rel_types = structured.rel_props.len();
        self.snapshot
            .store(Arc::new(SchemaSnapshot::new(structured, formatted)));

        tracing::info!(
            labels,
            rel_types,
            enhanced = self.config.enhanced_schema,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Schema refreshed"
        );
        Ok(())
    }
}
