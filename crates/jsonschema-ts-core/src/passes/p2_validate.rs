//! Pass 2: Validation
//!
//! Checks structural preconditions on the linked graph. Every violation is
//! collected; the pipeline aborts with all of them if the list is non-empty.

use regex::Regex;
use serde_json::Value;

use crate::naming::to_safe_string;
use crate::schema_graph::SchemaGraph;

/// Validate a linked graph. Returns human-readable violations, empty on success.
pub fn validate(graph: &SchemaGraph, root_name: &str) -> Vec<String> {
    let mut violations = Vec::new();

    if graph.derivable_name(graph.root, root_name).is_none() {
        violations.push(if to_safe_string(root_name).is_empty() && !root_name.is_empty() {
            format!("root name {root_name:?} does not contain a usable identifier")
        } else {
            "schema has no usable root name (no title, $id, name or root name)".to_string()
        });
    }

    for id in graph.ids() {
        let node = graph.node(id);
        let at = &node.pointer;

        for name in node.required() {
            if node.pattern_properties.contains_key(name) && !node.properties.contains_key(name) {
                violations.push(format!(
                    "{at}: {name:?} is both required and a pattern property"
                ));
            }
        }

        for keyword in ["minItems", "maxItems"] {
            if let Some(value) = node.keywords.get(keyword) {
                if value.as_u64().is_none() {
                    violations.push(format!(
                        "{at}: {keyword} must be a non-negative integer, got {value}"
                    ));
                }
            }
        }
        if let (Some(min), Some(max)) = (node.min_items(), node.max_items()) {
            if max < min {
                violations.push(format!(
                    "{at}: maxItems ({max}) is less than minItems ({min})"
                ));
            }
        }

        if let Some(deprecated) = node.keywords.get("deprecated") {
            if !deprecated.is_boolean() {
                violations.push(format!("{at}: deprecated must be a boolean"));
            }
        }

        for pattern in node.pattern_properties.keys() {
            if let Err(e) = Regex::new(pattern) {
                violations.push(format!(
                    "{at}: patternProperties key {pattern:?} is not a valid regular expression ({e})"
                ));
            }
        }

        if let Some(reference) = &node.unresolved_ref {
            violations.push(format!("{at}: unresolved reference {reference:?}"));
        }

        if let Some(Value::Array(values)) = node.keywords.get("enum") {
            if values.is_empty() {
                violations.push(format!("{at}: enum must list at least one value"));
            }
        }
    }

    // A cycle is fine as long as one of its members can be named.
    for cycle in &graph.cycles {
        if cycle
            .iter()
            .all(|&id| graph.derivable_name(id, root_name).is_none())
        {
            let at = &graph.node(cycle[0]).pointer;
            violations.push(format!(
                "{at}: schema refers to itself but has no name (add a title or move it to definitions)"
            ));
        }
    }

    tracing::debug!(violations = violations.len(), "validation complete");
    violations
}

// ===========================================================================
// Tests
// ===========================================================================
