//! Schema introspection settings.
//!
//! Loaded from the `[schema]` section of `graphlens.toml` or
//! `GRAPHLENS__SCHEMA__` environment variables. All values are fixed for the
//! lifetime of a store once it has been constructed.

use serde::Deserialize;

/// Structural label applied to every imported entity when the common-label
/// import mode is used. Never part of the user schema.
pub const BASE_ENTITY_LABEL: &str = "__Entity__";

/// Label of the document nodes created by provenance-linked imports.
pub const DOCUMENT_LABEL: &str = "Document";

/// Relationship linking a document node to the entities extracted from it.
pub const MENTIONS_REL: &str = "MENTIONS";

/// Limits and exclusions used while collecting, enhancing, formatting, and
/// sanitizing.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SchemaConfig {
    /// Node labels hidden from the schema (in addition to the base entity label).
    #[serde(default = "default_excluded_labels")]
    pub excluded_labels: Vec<String>,

    /// Relationship types hidden from the schema.
    #[serde(default = "default_excluded_rels")]
    pub excluded_rels: Vec<String>,

    /// Above this many distinct values only one example is kept.
    #[serde(default = "default_distinct_value_limit")]
    pub distinct_value_limit: usize,

    /// Lists with this many elements or more are treated as embeddings.
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,

    /// Labels/types with fewer elements than this get full-population statistics.
    #[serde(default = "default_exhaustive_search_limit")]
    pub exhaustive_search_limit: u64,

    /// Number of elements inspected when statistics are sampled.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// String values are cut to this many characters in statistics.
    #[serde(default = "default_string_truncate")]
    pub string_truncate: usize,

    /// Collect value statistics and render the enhanced schema.
    #[serde(default)]
    pub enhanced_schema: bool,

    /// Strip oversized lists from query results.
    #[serde(default)]
    pub sanitize: bool,

    /// Refresh the schema as soon as a store is connected.
    #[serde(default = "default_true")]
    pub refresh_on_connect: bool,
}

impl SchemaConfig {
    /// Labels excluded from node properties and relationship topology,
    /// including the base entity label.
    pub fn excluded_node_labels(&self) -> Vec<String> {
        let mut labels = self.excluded_labels.clone();
        if !labels.iter().any(|l| l == BASE_ENTITY_LABEL) {
            labels.push(BASE_ENTITY_LABEL.to_string());
        }
        labels
    }
}

fn default_excluded_labels() -> Vec<String> {
    vec![
        "_Bloom_Perspective_".to_string(),
        "_Bloom_Scene_".to_string(),
    ]
}

fn default_excluded_rels() -> Vec<String> {
    vec!["_Bloom_HAS_SCENE_".to_string()]
}

fn default_distinct_value_limit() -> usize {
    10
}

fn default_list_limit() -> usize {
    128
}

fn default_exhaustive_search_limit() -> u64 {
    10_000
}

fn default_sample_size() -> usize {
    5
}

fn default_string_truncate() -> usize {
    50
}

fn default_true() -> bool {
    true
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            excluded_labels: default_excluded_labels(),
            excluded_rels: default_excluded_rels(),
            distinct_value_limit: default_distinct_value_limit(),
            list_limit: default_list_limit(),
            exhaustive_search_limit: default_exhaustive_search_limit(),
            sample_size: default_sample_size(),
            string_truncate: default_string_truncate(),
            enhanced_schema: false,
            sanitize: false,
            refresh_on_connect: default_true(),
        }
    }
}
