//! Value statistics for labels and relationship types.
//!
//! For every label/type with declared properties a single aggregation query
//! is generated. Each property contributes its own aggregate fragments,
//! chosen by property type and by whether the whole population or a small
//! sample is scanned:
//!
//! | type                         | exhaustive              | sampled                                   |
//! |------------------------------|-------------------------|-------------------------------------------|
//! | STRING                       | distinct values + count | distinct values, or index enumeration     |
//! | INTEGER/FLOAT/DATE/DATE_TIME/LOCAL_DATE_TIME | min, max, count | min/max if indexed, else distinct values |
//! | LIST                         | min/max size            | min/max size                              |
//! | anything else                | not sampled             | not sampled                               |
//!
//! Statistics are merged into a copy of the descriptors, so a failing query
//! leaves the label/type exactly as collected.

use serde::Deserialize;
use serde_json::{json, Value};

use graphlens_core::types::IndexInfo;
use graphlens_core::{
    Params, PropertyDescriptor, PropertyStats, PropertyType, SchemaConfig, SchemaMetadata,
    StructuredSchema,
};

use crate::client::GraphError;
use crate::executor::{params, ExecutorError, QueryExecutor};

/// Approximate element counts per label and relationship type.
pub const GRAPH_COUNTS_QUERY: &str = "CALL apoc.meta.graph({sample: 1000, maxRels: 100}) \
     YIELD nodes, relationships \
     RETURN [node in nodes | {name: apoc.any.property(node, 'name'), \
     count: apoc.any.property(node, 'count')}] AS nodes, \
     [rel in relationships | {name: apoc.any.property(rel, 'type'), \
     count: apoc.any.property(rel, 'count')}] AS relationships";

/// Distinct values of an indexed property, read from the index.
pub const INDEX_DISTINCT_QUERY: &str =
    "CALL apoc.schema.properties.distinct($label, $property) YIELD value RETURN value";

/// Whether statistics target nodes of a label or relationships of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Node,
    Relationship,
}

/// Population scanned by a statistics query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    Exhaustive,
    Sampled,
}

impl SampleMode {
    /// Exhaustive below the limit, sampled otherwise. Unknown counts sample.
    pub fn for_count(count: Option<i64>, exhaustive_search_limit: u64) -> Self {
        match count {
            Some(c) if c >= 0 && (c as u64) < exhaustive_search_limit => Self::Exhaustive,
            _ => Self::Sampled,
        }
    }
}

/// How the statistics of one property are obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyPlan {
    /// Aggregates computed by the statistics query, and the map literal that
    /// exposes them in the output.
    Aggregate {
        aggregates: Vec<String>,
        output: String,
    },
    /// Full enumeration read from a range index.
    FromIndex,
    /// Not sampled.
    Skip,
}

/// Everything needed to gather statistics for one label/type.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsPlan {
    /// Aggregation query, absent when no property needs aggregation.
    pub query: Option<String>,
    /// Properties whose values come from `INDEX_DISTINCT_QUERY`.
    pub index_lookups: Vec<String>,
}

/// Summary of one enhancement pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnhanceSummary {
    pub enhanced: usize,
    pub skipped: usize,
}

#[derive(Debug, Default, Deserialize)]
struct GraphCounts {
    #[serde(default)]
    nodes: Vec<ElementCount>,
    #[serde(default)]
    relationships: Vec<ElementCount>,
}

#[derive(Debug, Deserialize)]
struct ElementCount {
    name: String,
    #[serde(default)]
    count: Option<i64>,
}

/// Quote a label, type, or property name for interpolation into Cypher.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Decide how to gather statistics for a single property.
///
/// `index` is only consulted in sampled mode: the exhaustive query already
/// sees every value.
pub fn plan_property(
    prop: &PropertyDescriptor,
    mode: SampleMode,
    index: Option<&IndexInfo>,
    config: &SchemaConfig,
) -> PropertyPlan {
    let name = &prop.property;
    let field = format!("n.{}", quote_identifier(name));
    let alias = |suffix: &str| quote_identifier(&format!("{name}_{suffix}"));

    match &prop.property_type {
        PropertyType::String => {
            if mode == SampleMode::Sampled {
                if let Some(idx) = index {
                    if idx.size > 0 && idx.distinct_values <= config.distinct_value_limit as f64 {
                        return PropertyPlan::FromIndex;
                    }
                }
            }
            let values = alias("values");
            let aggregates = vec![format!(
                "collect(distinct substring(toString({field}), 0, {})) AS {values}",
                config.string_truncate
            )];
            let output = match mode {
                SampleMode::Exhaustive => format!(
                    "values: {values}[..{}], distinct_count: size({values})",
                    config.distinct_value_limit
                ),
                SampleMode::Sampled => format!("values: {values}"),
            };
            PropertyPlan::Aggregate { aggregates, output }
        }
        PropertyType::Integer
        | PropertyType::Float
        | PropertyType::Date
        | PropertyType::DateTime
        | PropertyType::LocalDateTime => {
            if mode == SampleMode::Sampled && index.is_none() {
                // min/max over a handful of rows says little; show values.
                let values = alias("values");
                return PropertyPlan::Aggregate {
                    aggregates: vec![format!("collect(distinct toString({field})) AS {values}")],
                    output: format!("values: {values}"),
                };
            }
            let (min, max, distinct) = (alias("min"), alias("max"), alias("distinct"));
            PropertyPlan::Aggregate {
                aggregates: vec![
                    format!("min({field}) AS {min}"),
                    format!("max({field}) AS {max}"),
                    format!("count(distinct {field}) AS {distinct}"),
                ],
                output: format!(
                    "min: toString({min}), max: toString({max}), distinct_count: {distinct}"
                ),
            }
        }
        PropertyType::List => {
            let (min, max) = (alias("size_min"), alias("size_max"));
            PropertyPlan::Aggregate {
                aggregates: vec![
                    format!("min(size({field})) AS {min}"),
                    format!("max(size({field})) AS {max}"),
                ],
                output: format!("min_size: {min}, max_size: {max}"),
            }
        }
        PropertyType::Boolean
        | PropertyType::Point
        | PropertyType::Duration
        | PropertyType::LocalTime
        | PropertyType::Time
        | PropertyType::Map
        | PropertyType::Other(_) => PropertyPlan::Skip,
    }
}

/// Plan the statistics of every property of `label_or_type`.
pub fn plan_statistics(
    label_or_type: &str,
    properties: &[PropertyDescriptor],
    kind: ElementKind,
    mode: SampleMode,
    metadata: &SchemaMetadata,
    config: &SchemaConfig,
) -> StatisticsPlan {
    let mut aggregates = Vec::new();
    let mut outputs = Vec::new();
    let mut index_lookups = Vec::new();

    for prop in properties {
        // Range indexes exist for node labels only.
        let index = match kind {
            ElementKind::Node => metadata.range_index(label_or_type, &prop.property),
            ElementKind::Relationship => None,
        };
        match plan_property(prop, mode, index.as_ref(), config) {
            PropertyPlan::Aggregate {
                aggregates: prop_aggregates,
                output,
            } => {
                aggregates.extend(prop_aggregates);
                outputs.push((prop.property.as_str(), output));
            }
            PropertyPlan::FromIndex => index_lookups.push(prop.property.clone()),
            PropertyPlan::Skip => {}
        }
    }

    let query = (!outputs.is_empty()).then(|| {
        statistics_query(
            label_or_type,
            kind,
            mode,
            &aggregates,
            &outputs,
            config.sample_size,
        )
    });

    StatisticsPlan {
        query,
        index_lookups,
    }
}

/// Assemble the aggregation query text.
fn statistics_query(
    label_or_type: &str,
    kind: ElementKind,
    mode: SampleMode,
    aggregates: &[String],
    outputs: &[(&str, String)],
    sample_size: usize,
) -> String {
    let target = quote_identifier(label_or_type);
    let mut match_clause = match kind {
        ElementKind::Node => format!("MATCH (n:{target})"),
        ElementKind::Relationship => format!("MATCH ()-[n:{target}]->()"),
    };
    if mode == SampleMode::Sampled {
        match_clause.push_str(&format!(" WITH n LIMIT {sample_size}"));
    }

    let with_clause = format!("WITH {}", aggregates.join(",\n     "));
    let return_clause = format!(
        "RETURN {{{}}} AS output",
        outputs
            .iter()
            .map(|(name, output)| format!("{}: {{{output}}}", quote_identifier(name)))
            .collect::<Vec<_>>()
            .join(", ")
    );

    [match_clause, with_clause, return_clause].join("\n")
}

/// Gather statistics for one label/type and return enriched copies of its
/// descriptors. The input is untouched, so a failure leaves nothing half
/// merged.
pub async fn enhance_properties<E>(
    executor: &E,
    label_or_type: &str,
    properties: &[PropertyDescriptor],
    kind: ElementKind,
    mode: SampleMode,
    metadata: &SchemaMetadata,
    config: &SchemaConfig,
) -> Result<Vec<PropertyDescriptor>, ExecutorError>
where
    E: QueryExecutor + ?Sized,
{
    let plan = plan_statistics(label_or_type, properties, kind, mode, metadata, config);
    let mut enriched = properties.to_vec();

    for property in &plan.index_lookups {
        let records = executor
            .execute(
                INDEX_DISTINCT_QUERY,
                params([
                    ("label", json!(label_or_type)),
                    ("property", json!(property)),
                ]),
            )
            .await?;
        let values: Vec<String> = records
            .first()
            .and_then(|r| r.get("value"))
            .and_then(Value::as_array)
            .map(|vals| vals.iter().map(value_text).collect())
            .unwrap_or_default();
        let stats = PropertyStats {
            distinct_count: Some(values.len() as i64),
            values: Some(values),
            ..Default::default()
        };
        if let Some(desc) = enriched.iter_mut().find(|d| &d.property == property) {
            desc.apply_stats(stats, config.distinct_value_limit);
        }
    }

    if let Some(query) = &plan.query {
        tracing::debug!(target_name = %label_or_type, ?mode, %query, "Running statistics query");
        let records = executor.execute(query, Params::new()).await?;
        let output = records
            .first()
            .and_then(|r| r.get("output"))
            .and_then(Value::as_object);

        if let Some(output) = output {
            for desc in enriched.iter_mut() {
                let Some(raw) = output.get(&desc.property) else {
                    continue;
                };
                match serde_json::from_value::<PropertyStats>(raw.clone()) {
                    Ok(stats) => desc.apply_stats(stats, config.distinct_value_limit),
                    Err(e) => tracing::warn!(
                        target_name = %label_or_type,
                        property = %desc.property,
                        error = %e,
                        "Ignoring malformed statistics"
                    ),
                }
            }
        }
    }

    Ok(enriched)
}

/// Enrich every label and relationship type of `schema` with statistics.
///
/// Labels/types whose statistics query fails are left as collected.
/// Connection-level failures abort the pass.
pub async fn enhance_schema<E>(
    executor: &E,
    schema: &mut StructuredSchema,
    config: &SchemaConfig,
) -> Result<EnhanceSummary, GraphError>
where
    E: QueryExecutor + ?Sized,
{
    let records = executor.execute(GRAPH_COUNTS_QUERY, Params::new()).await?;
    let counts: GraphCounts = match records.into_iter().next() {
        Some(record) => serde_json::from_value(Value::Object(record))
            .map_err(|e| GraphError::Serialization(e.to_string()))?,
        None => GraphCounts::default(),
    };

    let StructuredSchema {
        node_props,
        rel_props,
        metadata,
        ..
    } = schema;
    let metadata = &*metadata;
    let mut summary = EnhanceSummary::default();

    let passes = [
        (ElementKind::Node, &counts.nodes, node_props, &config.excluded_labels),
        (
            ElementKind::Relationship,
            &counts.relationships,
            rel_props,
            &config.excluded_rels,
        ),
    ];

    for (kind, elements, props_by_name, excluded) in passes {
        for element in elements {
            if excluded.contains(&element.name) {
                continue;
            }
            let Some(props) = props_by_name.get_mut(&element.name) else {
                continue;
            };
            if props.is_empty() {
                continue;
            }

            let mode = SampleMode::for_count(element.count, config.exhaustive_search_limit);
            let result =
                enhance_properties(executor, &element.name, props, kind, mode, metadata, config)
                    .await;
            match result {
                Ok(enriched) => {
                    *props = enriched;
                    summary.enhanced += 1;
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(
                        target_name = %element.name,
                        ?kind,
                        error = %e,
                        "Skipping statistics"
                    );
                    summary.skipped += 1;
                }
            }
        }
    }

    Ok(summary)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
