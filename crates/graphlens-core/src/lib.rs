//! graphlens-core: Schema data model and pure schema utilities for Graphlens.
//!
//! This crate provides the pieces of schema introspection that need no
//! database access:
//! - The structured schema model (labels, relationship types, properties, topology)
//! - Schema configuration (exclusions and value limits)
//! - Text rendering of a schema (basic and enhanced)
//! - Sanitization of query results (removal of embedding-sized lists)

pub mod config;
pub mod format;
pub mod sanitize;
pub mod types;

pub use config::{SchemaConfig, BASE_ENTITY_LABEL};
pub use format::format_schema;
pub use sanitize::{sanitize_record, sanitize_value};
pub use types::{
    GraphDocument, GraphNode, GraphRelationship, Params, PropertyDescriptor, PropertyStats,
    PropertyType, Record, RelationshipDescriptor, SchemaMetadata, SchemaSnapshot,
    SourceDocument, StructuredSchema,
};
