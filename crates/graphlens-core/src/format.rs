//! Rendering of a structured schema into the line-oriented text handed to
//! downstream readers.
//!
//! Output layout (sections always present, possibly empty):
//!
//! ```text
//! Node properties:
//! <one entry per label>
//! Relationship properties:
//! <one entry per relationship type>
//! The relationships:
//! (:Start)-[:TYPE]->(:End)
//! ```

use std::collections::BTreeMap;

use crate::config::SchemaConfig;
use crate::types::{PropertyDescriptor, PropertyType, StructuredSchema};

/// Render `schema` as text. `enhanced` switches from one flat line per
/// label/type to bulleted properties with example values.
pub fn format_schema(schema: &StructuredSchema, enhanced: bool, config: &SchemaConfig) -> String {
    let (node_lines, rel_lines) = if enhanced {
        (
            enhanced_entries(&schema.node_props, config),
            enhanced_entries(&schema.rel_props, config),
        )
    } else {
        (basic_entries(&schema.node_props), basic_entries(&schema.rel_props))
    };

    let topology: Vec<String> = schema
        .relationships
        .iter()
        .map(|r| format!("(:{})-[:{}]->(:{})", r.start, r.rel_type, r.end))
        .collect();

    [
        "Node properties:".to_string(),
        node_lines.join("\n"),
        "Relationship properties:".to_string(),
        rel_lines.join("\n"),
        "The relationships:".to_string(),
        topology.join("\n"),
    ]
    .join("\n")
}

/// Replace line breaks so a value cannot break the line-oriented layout.
pub fn clean_string_value(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}

fn basic_entries(props: &BTreeMap<String, Vec<PropertyDescriptor>>) -> Vec<String> {
    props
        .iter()
        .map(|(name, properties)| {
            let joined = properties
                .iter()
                .map(|p| format!("{}: {}", p.property, p.property_type))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{name} {{{joined}}}")
        })
        .collect()
}

fn enhanced_entries(
    props: &BTreeMap<String, Vec<PropertyDescriptor>>,
    config: &SchemaConfig,
) -> Vec<String> {
    let mut lines = Vec::new();
    for (name, properties) in props {
        lines.push(format!("- **{name}**"));
        for prop in properties {
            let Some(example) = example_fragment(prop, config) else {
                continue;
            };
            let line = if example.is_empty() {
                format!("  - `{}`: {}", prop.property, prop.property_type)
            } else {
                format!("  - `{}`: {} {example}", prop.property, prop.property_type)
            };
            lines.push(line);
        }
    }
    lines
}

/// The example text for one property, or `None` if the property must not
/// appear in the enhanced schema at all.
fn example_fragment(prop: &PropertyDescriptor, config: &SchemaConfig) -> Option<String> {
    let values = prop.values.as_deref().unwrap_or_default();

    let example = match &prop.property_type {
        PropertyType::String => match values.first() {
            None => String::new(),
            Some(first) => {
                // No count means sampled values: treat as open-ended.
                let many = prop
                    .distinct_count
                    .map_or(true, |c| c > config.distinct_value_limit as i64);
                if many {
                    format!("Example: \"{}\"", clean_string_value(first))
                } else {
                    format!("Available options: {}", option_list(values))
                }
            }
        },
        ty if ty.is_ordered() => match (&prop.min, &prop.max) {
            (Some(min), Some(max)) if !min.is_empty() && !max.is_empty() => format!(
                "Min: {}, Max: {}",
                clean_string_value(min),
                clean_string_value(max)
            ),
            _ => values
                .first()
                .map(|v| format!("Example: \"{}\"", clean_string_value(v)))
                .unwrap_or_default(),
        },
        PropertyType::List => {
            // Embedding-like lists are left out.
            let min_size = prop.min_size?;
            if min_size > config.list_limit as i64 {
                return None;
            }
            match prop.max_size {
                Some(max_size) => format!("Min Size: {min_size}, Max Size: {max_size}"),
                None => format!("Min Size: {min_size}"),
            }
        }
        _ => String::new(),
    };
    Some(example)
}

fn option_list(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| {
            let v = clean_string_value(v);
            if v.contains('\'') && !v.contains('"') {
                format!("\"{v}\"")
            } else {
                format!("'{}'", v.replace('\'', "\\'"))
            }
        })
        .collect();
    format!("[{}]", quoted.join(", "))
}
