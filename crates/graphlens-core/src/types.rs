//! Core data model for introspected graph schemas.
//!
//! A [`StructuredSchema`] is produced by the schema collector, optionally
//! enriched in place with [`PropertyStats`] during a refresh, and then frozen
//! inside a [`SchemaSnapshot`] together with its rendered text.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single result record: column name to value.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Query parameters, same shape as a record.
pub type Params = serde_json::Map<String, serde_json::Value>;

// ── Property Types ────────────────────────────────────────────────

/// Property type as reported by the metadata introspection procedure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PropertyType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    LocalDateTime,
    LocalTime,
    Time,
    Point,
    Duration,
    List,
    Map,
    /// Any type name not known to Graphlens. Never sampled.
    Other(String),
}

impl PropertyType {
    /// Wire name, e.g. `LOCAL_DATE_TIME`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "STRING",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::DateTime => "DATE_TIME",
            Self::LocalDateTime => "LOCAL_DATE_TIME",
            Self::LocalTime => "LOCAL_TIME",
            Self::Time => "TIME",
            Self::Point => "POINT",
            Self::Duration => "DURATION",
            Self::List => "LIST",
            Self::Map => "MAP",
            Self::Other(name) => name,
        }
    }

    /// Types summarized by min/max ranges.
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            Self::Integer | Self::Float | Self::Date | Self::DateTime | Self::LocalDateTime
        )
    }
}

impl From<String> for PropertyType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "STRING" => Self::String,
            "INTEGER" => Self::Integer,
            "FLOAT" => Self::Float,
            "BOOLEAN" => Self::Boolean,
            "DATE" => Self::Date,
            "DATE_TIME" => Self::DateTime,
            "LOCAL_DATE_TIME" => Self::LocalDateTime,
            "LOCAL_TIME" => Self::LocalTime,
            "TIME" => Self::Time,
            "POINT" => Self::Point,
            "DURATION" => Self::Duration,
            "LIST" => Self::List,
            "MAP" => Self::Map,
            _ => Self::Other(name),
        }
    }
}

impl From<&str> for PropertyType {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<PropertyType> for String {
    fn from(ty: PropertyType) -> Self {
        match ty {
            PropertyType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Property Descriptors ──────────────────────────────────────────

/// Statistics returned for one property by a statistics query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyStats {
    #[serde(default)]
    pub values: Option<Vec<String>>,
    #[serde(default)]
    pub distinct_count: Option<i64>,
    #[serde(default)]
    pub min: Option<String>,
    #[serde(default)]
    pub max: Option<String>,
    #[serde(default)]
    pub min_size: Option<i64>,
    #[serde(default)]
    pub max_size: Option<i64>,
}

/// One property of a label or relationship type.
///
/// Statistics fields stay `None` until a statistics pass fills them, and
/// only the fields meaningful for `property_type` are ever set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub property: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<i64>,
}

impl PropertyDescriptor {
    pub fn new(property: impl Into<String>, property_type: impl Into<PropertyType>) -> Self {
        Self {
            property: property.into(),
            property_type: property_type.into(),
            values: None,
            distinct_count: None,
            min: None,
            max: None,
            min_size: None,
            max_size: None,
        }
    }

    /// Merge statistics into this descriptor.
    ///
    /// Fields irrelevant to the property type are ignored. A string property
    /// whose distinct count exceeds `distinct_value_limit` keeps only its
    /// first value as an example.
    pub fn apply_stats(&mut self, stats: PropertyStats, distinct_value_limit: usize) {
        match &self.property_type {
            PropertyType::String => {
                let mut values = stats.values;
                if let (Some(vals), Some(count)) = (values.as_mut(), stats.distinct_count) {
                    if count > distinct_value_limit as i64 {
                        vals.truncate(1);
                    }
                }
                self.values = values.or(self.values.take());
                self.distinct_count = stats.distinct_count.or(self.distinct_count);
            }
            PropertyType::Integer
            | PropertyType::Float
            | PropertyType::Date
            | PropertyType::DateTime
            | PropertyType::LocalDateTime => {
                self.min = stats.min.or(self.min.take());
                self.max = stats.max.or(self.max.take());
                self.distinct_count = stats.distinct_count.or(self.distinct_count);
                self.values = stats.values.or(self.values.take());
            }
            PropertyType::List => {
                self.min_size = stats.min_size.or(self.min_size);
                self.max_size = stats.max_size.or(self.max_size);
            }
            PropertyType::Boolean
            | PropertyType::Point
            | PropertyType::Duration
            | PropertyType::LocalTime
            | PropertyType::Time
            | PropertyType::Map
            | PropertyType::Other(_) => {}
        }
    }
}

/// An observed `(start)-[type]->(end)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipDescriptor {
    pub start: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub end: String,
}

// ── Metadata ──────────────────────────────────────────────────────

/// Constraint and index records as returned by the database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    #[serde(rename = "constraint")]
    pub constraints: Vec<Record>,
    #[serde(rename = "index")]
    pub indexes: Vec<Record>,
}

/// Typed view of a range-index record.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    pub label: String,
    pub properties: Vec<String>,
    pub index_type: String,
    pub size: i64,
    pub distinct_values: f64,
}

impl IndexInfo {
    pub fn from_record(record: &Record) -> Option<Self> {
        let label = record.get("label")?.as_str()?.to_string();
        let properties = record
            .get("properties")?
            .as_array()?
            .iter()
            .filter_map(|p| p.as_str().map(String::from))
            .collect();
        let index_type = record
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();
        let size = record.get("size").and_then(|s| s.as_i64()).unwrap_or(0);
        let distinct_values = record
            .get("distinctValues")
            .and_then(|d| d.as_f64())
            .unwrap_or(0.0);

        Some(Self {
            label,
            properties,
            index_type,
            size,
            distinct_values,
        })
    }
}

impl SchemaMetadata {
    /// The single-property range index on `label.property`, if any.
    pub fn range_index(&self, label: &str, property: &str) -> Option<IndexInfo> {
        self.indexes
            .iter()
            .filter_map(IndexInfo::from_record)
            .find(|idx| {
                idx.label == label
                    && idx.index_type == "RANGE"
                    && idx.properties.len() == 1
                    && idx.properties[0] == property
            })
    }
}

// ── Schema ────────────────────────────────────────────────────────

/// Labels, relationship types, their properties, and topology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredSchema {
    pub node_props: BTreeMap<String, Vec<PropertyDescriptor>>,
    pub rel_props: BTreeMap<String, Vec<PropertyDescriptor>>,
    pub relationships: Vec<RelationshipDescriptor>,
    pub metadata: SchemaMetadata,
}

/// Result of one completed refresh. Replaced as a whole, never patched.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    pub structured: Arc<StructuredSchema>,
    pub formatted: String,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl SchemaSnapshot {
    pub fn new(structured: StructuredSchema, formatted: String) -> Self {
        Self {
            structured: Arc::new(structured),
            formatted,
            refreshed_at: Some(Utc::now()),
        }
    }
}

// ── Graph Documents ───────────────────────────────────────────────

/// An extracted entity to be imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// An extracted relationship between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub source: GraphNode,
    pub target: GraphNode,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// The source text an extraction came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub page_content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Nodes and relationships extracted from one source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub relationships: Vec<GraphRelationship>,
    #[serde(default)]
    pub source: SourceDocument,
}
