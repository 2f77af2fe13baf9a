//! Schema collection through `apoc.meta.data()` introspection.
//!
//! Three introspection queries produce node properties, relationship
//! properties, and relationship topology. Constraint and index metadata is
//! fetched on a best-effort basis: users without schema privileges get an
//! empty metadata section instead of an error.

use serde::Deserialize;
use serde_json::{json, Value};

use graphlens_core::{
    Params, PropertyDescriptor, Record, RelationshipDescriptor, SchemaConfig, SchemaMetadata,
    StructuredSchema,
};

use crate::client::GraphError;
use crate::executor::{params, ExecutorError, QueryExecutor};

pub const NODE_PROPERTIES_QUERY: &str = r#"
CALL apoc.meta.data()
YIELD label, other, elementType, type, property
WHERE NOT type = "RELATIONSHIP" AND elementType = "node"
  AND NOT label IN $EXCLUDED_LABELS
WITH label AS nodeLabels, collect({property:property, type:type}) AS properties
RETURN {labels: nodeLabels, properties: properties} AS output
"#;

pub const REL_PROPERTIES_QUERY: &str = r#"
CALL apoc.meta.data()
YIELD label, other, elementType, type, property
WHERE NOT type = "RELATIONSHIP" AND elementType = "relationship"
  AND NOT label IN $EXCLUDED_LABELS
WITH label AS relType, collect({property:property, type:type}) AS properties
RETURN {type: relType, properties: properties} AS output
"#;

pub const REL_TOPOLOGY_QUERY: &str = r#"
CALL apoc.meta.data()
YIELD label, other, elementType, type, property
WHERE type = "RELATIONSHIP" AND elementType = "node"
UNWIND other AS other_node
WITH * WHERE NOT label IN $EXCLUDED_LABELS
  AND NOT other_node IN $EXCLUDED_LABELS
RETURN {start: label, type: property, end: toString(other_node)} AS output
"#;

pub const CONSTRAINTS_QUERY: &str = "SHOW CONSTRAINTS";

pub const RANGE_INDEX_QUERY: &str = "CALL apoc.schema.nodes() YIELD label, properties, type, size, \
     valuesSelectivity WHERE type = 'RANGE' RETURN *, \
     size * valuesSelectivity as distinctValues";

const APOC_HINT: &str = "Please ensure the APOC plugin is installed in Neo4j and that \
     'apoc.meta.data()' is allowed in Neo4j configuration";

#[derive(Debug, Deserialize)]
struct NodePropsRow {
    labels: String,
    properties: Vec<PropertyDescriptor>,
}

#[derive(Debug, Deserialize)]
struct RelPropsRow {
    #[serde(rename = "type")]
    rel_type: String,
    properties: Vec<PropertyDescriptor>,
}

#[derive(Debug, Deserialize)]
struct TopologyRow {
    start: String,
    #[serde(rename = "type")]
    rel_type: String,
    end: Value,
}

/// Collect labels, relationship types, their properties, topology, and
/// (when permitted) constraint and index metadata.
///
/// Statistics fields of every descriptor are left unpopulated.
pub async fn collect_schema<E>(
    executor: &E,
    config: &SchemaConfig,
) -> Result<StructuredSchema, GraphError>
where
    E: QueryExecutor + ?Sized,
{
    let excluded_labels = config.excluded_node_labels();
    let excluded_rels = &config.excluded_rels;

    let node_rows: Vec<NodePropsRow> =
        introspect(executor, NODE_PROPERTIES_QUERY, &excluded_labels).await?;
    let rel_rows: Vec<RelPropsRow> =
        introspect(executor, REL_PROPERTIES_QUERY, excluded_rels).await?;
    let topology_rows: Vec<TopologyRow> =
        introspect(executor, REL_TOPOLOGY_QUERY, &excluded_labels).await?;

    let mut schema = StructuredSchema::default();

    for row in node_rows {
        if excluded_labels.contains(&row.labels) {
            continue;
        }
        schema.node_props.insert(row.labels, row.properties);
    }

    for row in rel_rows {
        if excluded_rels.contains(&row.rel_type) {
            continue;
        }
        schema.rel_props.insert(row.rel_type, row.properties);
    }

    for row in topology_rows {
        if excluded_labels.contains(&row.start) || excluded_rels.contains(&row.rel_type) {
            continue;
        }
        for end in end_labels(&row.end) {
            if excluded_labels.contains(&end) {
                continue;
            }
            schema.relationships.push(RelationshipDescriptor {
                start: row.start.clone(),
                rel_type: row.rel_type.clone(),
                end,
            });
        }
    }

    schema.metadata = collect_metadata(executor).await?;

    tracing::debug!(
        labels = schema.node_props.len(),
        rel_types = schema.rel_props.len(),
        patterns = schema.relationships.len(),
        "Collected schema"
    );
    Ok(schema)
}

/// Fetch constraints and range indexes, degrading to empty metadata when
/// the user lacks the privilege to read them.
pub async fn collect_metadata<E>(executor: &E) -> Result<SchemaMetadata, GraphError>
where
    E: QueryExecutor + ?Sized,
{
    let fetched = async {
        let constraints = executor.execute(CONSTRAINTS_QUERY, Params::new()).await?;
        let indexes = executor.execute(RANGE_INDEX_QUERY, Params::new()).await?;
        Ok::<_, ExecutorError>((constraints, indexes))
    }
    .await;

    match fetched {
        Ok((constraints, indexes)) => Ok(SchemaMetadata {
            constraints,
            indexes,
        }),
        Err(ExecutorError::PermissionDenied(reason)) => {
            tracing::warn!(%reason, "No access to constraint and index metadata");
            Ok(SchemaMetadata::default())
        }
        Err(e) => Err(e.into()),
    }
}

async fn introspect<E, T>(
    executor: &E,
    query: &str,
    excluded: &[String],
) -> Result<Vec<T>, GraphError>
where
    E: QueryExecutor + ?Sized,
    T: serde::de::DeserializeOwned,
{
    let records = executor
        .execute(query, params([("EXCLUDED_LABELS", json!(excluded))]))
        .await
        .map_err(|e| match e {
            ExecutorError::ProcedureNotFound(_) => GraphError::MissingCapability {
                procedure: "APOC".to_string(),
                hint: APOC_HINT.to_string(),
            },
            other => GraphError::Query(other),
        })?;

    records.iter().map(output_of).collect()
}

/// Deserialize the `output` column of an introspection record.
fn output_of<T: serde::de::DeserializeOwned>(record: &Record) -> Result<T, GraphError> {
    let output = record
        .get("output")
        .cloned()
        .ok_or_else(|| GraphError::Serialization("record has no `output` column".to_string()))?;
    serde_json::from_value(output).map_err(|e| GraphError::Serialization(e.to_string()))
}

/// Target labels of a topology row, coerced to text. A list yields one label
/// per element.
fn end_labels(end: &Value) -> Vec<String> {
    match end {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(end_labels).collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}
