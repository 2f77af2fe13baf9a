//! Bulk import of extracted graph documents.
//!
//! Every query is an UNWIND over a `$data` batch with MERGE semantics, so
//! re-importing identical rows never duplicates nodes or relationships.
//! Labels and relationship types cannot be parameters in Cypher; they are
//! applied through `apoc.create.addLabels`, `apoc.merge.node`, and
//! `apoc.merge.relationship` instead of being interpolated.

use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use graphlens_core::config::{DOCUMENT_LABEL, MENTIONS_REL};
use graphlens_core::{GraphDocument, Params, BASE_ENTITY_LABEL};

use crate::client::GraphError;
use crate::executor::{params, ExecutorError, QueryExecutor};
use crate::sampler::quote_identifier;

/// Namespace for document ids derived from page content.
const DOCUMENT_NS: Uuid = Uuid::from_bytes([
    0x3f, 0x1c, 0x92, 0x5e, 0x4b, 0x07, 0x4d, 0x2a, 0x9c, 0x61, 0x5e, 0x8d, 0x2b, 0x70, 0xa4, 0x13,
]);

/// Counts of submitted rows. Rows that matched existing elements are
/// included.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub documents: usize,
    pub nodes: usize,
    pub relationships: usize,
}

/// Uniqueness constraint backing id lookups on the base entity label.
pub fn entity_constraint_query() -> String {
    format!(
        "CREATE CONSTRAINT IF NOT EXISTS FOR (b:{}) REQUIRE b.id IS UNIQUE",
        quote_identifier(BASE_ENTITY_LABEL)
    )
}

/// Node upsert query for a batch of `{id, type, properties}` rows.
///
/// With `use_common_label` every node is merged on the base entity label and
/// its declared type is added as a second label. Otherwise it is merged on
/// its declared type alone. With `include_source` a `$document` node is
/// upserted and linked to each imported node.
pub fn node_import_query(use_common_label: bool, include_source: bool) -> String {
    let document = if include_source {
        format!(
            "MERGE (d:{DOCUMENT_LABEL} {{id: $document.metadata.id}}) \
             SET d.text = $document.page_content \
             SET d += $document.metadata \
             WITH d "
        )
    } else {
        String::new()
    };

    if use_common_label {
        let mention = if include_source {
            format!("MERGE (d)-[:{MENTIONS_REL}]->(source) ")
        } else {
            String::new()
        };
        format!(
            "{document}UNWIND $data AS row \
             MERGE (source:{} {{id: row.id}}) \
             SET source += row.properties \
             {mention}\
             WITH source, row \
             CALL apoc.create.addLabels(source, [row.type]) YIELD node \
             RETURN distinct 'done' AS result",
            quote_identifier(BASE_ENTITY_LABEL)
        )
    } else {
        let mention = if include_source {
            format!("MERGE (d)-[:{MENTIONS_REL}]->(node) ")
        } else {
            String::new()
        };
        format!(
            "{document}UNWIND $data AS row \
             CALL apoc.merge.node([row.type], {{id: row.id}}, row.properties, row.properties) \
             YIELD node \
             {mention}\
             RETURN distinct 'done' AS result"
        )
    }
}

/// Relationship upsert query for a batch of
/// `{source, source_label, target, target_label, type, properties}` rows.
///
/// Missing endpoints are created. Relationship properties are merged with
/// overwrite-on-conflict semantics.
pub fn rel_import_query(use_common_label: bool) -> String {
    let endpoints = if use_common_label {
        let base = quote_identifier(BASE_ENTITY_LABEL);
        format!(
            "MERGE (source:{base} {{id: row.source}}) \
             MERGE (target:{base} {{id: row.target}}) \
             WITH source, target, row "
        )
    } else {
        "CALL apoc.merge.node([row.source_label], {id: row.source}, {}, {}) \
         YIELD node AS source \
         CALL apoc.merge.node([row.target_label], {id: row.target}, {}, {}) \
         YIELD node AS target "
            .to_string()
    };
    format!(
        "UNWIND $data AS row \
         {endpoints}\
         CALL apoc.merge.relationship(source, row.type, {{}}, row.properties, target, row.properties) \
         YIELD rel \
         RETURN distinct 'done' AS result"
    )
}

/// Import every document: nodes first, then relationships.
///
/// With `use_common_label` the entity uniqueness constraint is ensured
/// first; lacking the privilege to create it only costs lookup speed.
pub async fn import_graph_documents<E>(
    executor: &E,
    documents: &[GraphDocument],
    use_common_label: bool,
    include_source: bool,
) -> Result<ImportSummary, GraphError>
where
    E: QueryExecutor + ?Sized,
{
    if use_common_label {
        match executor
            .execute(&entity_constraint_query(), Params::new())
            .await
        {
            Ok(_) => {}
            Err(ExecutorError::PermissionDenied(reason)) => {
                tracing::warn!(%reason, "Could not create entity id constraint");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let node_query = node_import_query(use_common_label, include_source);
    let rel_query = rel_import_query(use_common_label);
    let mut summary = ImportSummary::default();

    for document in documents {
        let mut node_params = params([("data", Value::Array(node_rows(document)))]);
        if include_source {
            node_params.insert("document".to_string(), document_param(document));
        }
        executor.execute(&node_query, node_params).await?;

        let rels = rel_rows(document);
        let rel_count = rels.len();
        if rel_count > 0 {
            executor
                .execute(&rel_query, params([("data", Value::Array(rels))]))
                .await?;
        }

        summary.documents += 1;
        summary.nodes += document.nodes.len();
        summary.relationships += rel_count;
    }

    tracing::info!(
        documents = summary.documents,
        nodes = summary.nodes,
        relationships = summary.relationships,
        "Imported graph documents"
    );
    Ok(summary)
}

/// `$data` rows for the node import query.
pub fn node_rows(document: &GraphDocument) -> Vec<Value> {
    document
        .nodes
        .iter()
        .map(|node| {
            json!({
                "id": node.id,
                "type": remove_backticks(&node.node_type),
                "properties": node.properties,
            })
        })
        .collect()
}

/// `$data` rows for the relationship import query.
pub fn rel_rows(document: &GraphDocument) -> Vec<Value> {
    document
        .relationships
        .iter()
        .map(|rel| {
            json!({
                "source": rel.source.id,
                "source_label": remove_backticks(&rel.source.node_type),
                "target": rel.target.id,
                "target_label": remove_backticks(&rel.target.node_type),
                "type": remove_backticks(&rel.rel_type.replace(' ', "_").to_uppercase()),
                "properties": rel.properties,
            })
        })
        .collect()
}

/// `$document` parameter. A document without `metadata.id` gets one derived
/// from its page content.
pub fn document_param(document: &GraphDocument) -> Value {
    let mut metadata: Map<String, Value> = document.source.metadata.clone();
    if !metadata.get("id").is_some_and(|id| !id.is_null()) {
        let id = Uuid::new_v5(&DOCUMENT_NS, document.source.page_content.as_bytes());
        metadata.insert("id".to_string(), json!(id.to_string()));
    }
    json!({
        "page_content": document.source.page_content,
        "metadata": metadata,
    })
}

fn remove_backticks(text: &str) -> String {
    text.replace('`', "")
}
