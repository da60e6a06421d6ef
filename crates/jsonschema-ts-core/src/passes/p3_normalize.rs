//! Pass 3: Normalization
//!
//! Canonicalizes schema-level quirks on the linked graph so the parser sees
//! one shape per concept. Each rule runs exactly once per node, in order:
//!
//! 1. Description policy, then `*/` escaped inside descriptions
//! 2. `type: ["null"]` dropped when `enum: [null]` already says it
//! 3. `const` → one-member `enum`
//! 4. Property key canonicalization (keys, `required`, key names, hints)
//! 5. `additionalProperties` default for object schemas
//! 6. Array bounds: doc tags, `minItems` default, `max-items` cap on both
//!    `minItems` and the `maxItems - minItems` span, single `items` expanded
//!    into a tuple, tuples truncated to `maxItems`
//!
//! Standalone names are assigned last, over the whole graph:
//! root name, then explicit names, then names synthesized from the key path
//! for classes and enums, then one synthesized name for each cycle that
//! still has no named member.

use std::borrow::Cow;
use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;

use crate::config::{CompileOptions, DescriptionPolicy, KeyCanonicalization};
use crate::naming::to_safe_string;
use crate::schema_graph::{Additional, Items, SchemaGraph, SchemaId, SchemaNode};

/// Normalize a validated graph.
pub fn normalize(mut graph: SchemaGraph, root_name: &str, options: &CompileOptions) -> SchemaGraph {
    let root = graph.root;
    for id in graph.ids().collect::<Vec<_>>() {
        normalize_node(graph.node_mut(id), id == root, options);
    }
    assign_names(&mut graph, root_name);

    tracing::debug!(
        named = graph
            .nodes
            .iter()
            .filter(|n| n.standalone_name.is_some())
            .count(),
        "normalize complete"
    );
    graph
}

fn normalize_node(node: &mut SchemaNode, is_root: bool, options: &CompileOptions) {
    let keep_description = keeps_description(options.descriptions, is_root);
    if !keep_description {
        node.keywords.remove("description");
    }
    escape_comment_terminators(node);
    drop_redundant_null_type(node);
    const_to_enum(node);
    canonicalize_keys(node, &options.key_canonicalization);
    default_additional_properties(node, options);
    if node.is_array_shaped() {
        normalize_array_bounds(node, keep_description, options);
    }
}

// ---------------------------------------------------------------------------
// Per-node rules
// ---------------------------------------------------------------------------

fn keeps_description(policy: DescriptionPolicy, is_root: bool) -> bool {
    match policy {
        DescriptionPolicy::Keep => true,
        DescriptionPolicy::OmitRoot => !is_root,
        DescriptionPolicy::OmitAll => false,
    }
}

fn escape_comment_terminators(node: &mut SchemaNode) {
    if let Some(Value::String(description)) = node.keywords.get_mut("description") {
        if description.contains("*/") {
            *description = description.replace("*/", "*\\/");
        }
    }
}

fn drop_redundant_null_type(node: &mut SchemaNode) {
    let null_enum = matches!(node.enum_values(), Some(values) if values.as_slice() == [Value::Null]);
    if null_enum && node.types() == ["null"] {
        node.keywords.remove("type");
    }
}

fn const_to_enum(node: &mut SchemaNode) {
    if let Some(value) = node.keywords.remove("const") {
        node.keywords
            .insert("enum".to_string(), Value::Array(vec![value]));
    }
}

/// Rewrite `key` by the first rule whose `contains` it includes.
fn canonical_key<'k>(key: &'k str, rules: &[KeyCanonicalization]) -> Cow<'k, str> {
    rules
        .iter()
        .find(|rule| key.contains(rule.contains.as_str()))
        .map_or(Cow::Borrowed(key), |rule| Cow::Owned(rule.canonical.clone()))
}

fn canonicalize_keys(node: &mut SchemaNode, rules: &[KeyCanonicalization]) {
    if rules.is_empty() {
        return;
    }

    if !node.properties.is_empty() {
        let mut renamed: IndexMap<String, SchemaId> = IndexMap::new();
        for (key, child) in std::mem::take(&mut node.properties) {
            let canonical = canonical_key(&key, rules).into_owned();
            if renamed.contains_key(&canonical) {
                tracing::warn!(
                    pointer = %node.pointer,
                    key = %key,
                    canonical = %canonical,
                    "canonical key already present; keeping the first property"
                );
                continue;
            }
            renamed.insert(canonical, child);
        }
        node.properties = renamed;
    }

    if let Some(Value::Array(required)) = node.keywords.get_mut("required") {
        let mut seen = HashSet::new();
        let mut canonical_required = Vec::with_capacity(required.len());
        for name in required.drain(..) {
            let name = match name {
                Value::String(s) => Value::String(canonical_key(&s, rules).into_owned()),
                other => other,
            };
            if seen.insert(name.to_string()) {
                canonical_required.push(name);
            }
        }
        *required = canonical_required;
    }

    if let Some(key_name) = node.key_name.take() {
        let canonical = canonical_key(&key_name, rules).into_owned();
        if node.name_hint.as_deref() == Some(key_name.as_str()) {
            node.name_hint = Some(canonical.clone());
        }
        node.key_name = Some(canonical);
    }
}

fn default_additional_properties(node: &mut SchemaNode, options: &CompileOptions) {
    if node.additional_properties.is_none()
        && node.pattern_properties.is_empty()
        && node.is_object_shaped()
    {
        node.additional_properties = Some(Additional::Allowed(options.additional_properties_default));
    }
}

fn append_to_description(node: &mut SchemaNode, tags: &[String]) {
    let tags = tags.join("\n");
    let description = match node.description() {
        Some(existing) => format!("{existing}\n\n{tags}"),
        None => tags,
    };
    node.keywords
        .insert("description".to_string(), Value::String(description));
}

/// Longest tuple the normalizer will spell out, whatever `max-items` says.
const TUPLE_LENGTH_LIMIT: u64 = 1024;

fn normalize_array_bounds(node: &mut SchemaNode, keep_description: bool, options: &CompileOptions) {
    let tags: Vec<String> = [("minItems", node.min_items()), ("maxItems", node.max_items())]
        .into_iter()
        .filter_map(|(keyword, value)| value.map(|v| format!("@{keyword} {v}")))
        .collect();
    if !tags.is_empty() && keep_description {
        append_to_description(node, &tags);
    }

    if options.ignore_min_and_max_items {
        node.keywords.remove("minItems");
        node.keywords.remove("maxItems");
        return;
    }

    let mut min = node.min_items().unwrap_or(0);
    if options.max_items >= 0 && min > options.max_items as u64 {
        // Too long to spell out as a tuple: fall back to an unbounded array.
        min = 0;
        node.keywords.remove("maxItems");
    }
    node.keywords.insert("minItems".to_string(), Value::from(min));

    if let Some(max) = node.max_items() {
        if options.max_items >= 0 && max.saturating_sub(min) > options.max_items as u64 {
            node.keywords.remove("maxItems");
        }
    }
    let mut max = node.max_items();

    // Applies even with the cap disabled: past it the tuples cannot be built.
    if max.unwrap_or(min) > TUPLE_LENGTH_LIMIT {
        tracing::warn!(
            pointer = %node.pointer,
            limit = TUPLE_LENGTH_LIMIT,
            "array bounds too large to spell out as tuples; emitting an unbounded array"
        );
        min = 0;
        max = None;
        node.keywords.insert("minItems".to_string(), Value::from(0));
        node.keywords.remove("maxItems");
    }

    if let Some(Items::Single(item)) = node.items {
        if max.is_some() || min > 0 {
            let len = max.unwrap_or(min) as usize;
            node.items = Some(Items::Tuple(vec![item; len]));
            if max.is_none() {
                node.additional_items = Some(Additional::Schema(item));
            }
        }
    }

    if let (Some(Items::Tuple(items)), Some(max)) = (&mut node.items, max) {
        items.truncate(max as usize);
    }
}

// ---------------------------------------------------------------------------
// Standalone names
// ---------------------------------------------------------------------------

fn assign_names(graph: &mut SchemaGraph, root_name: &str) {
    let mut taken: HashSet<String> = HashSet::new();

    if let Some(name) = graph.derivable_name(graph.root, root_name) {
        taken.insert(name.clone());
        let root = graph.root;
        graph.node_mut(root).standalone_name = Some(name);
    }

    let explicit: Vec<(SchemaId, String)> = graph
        .ids()
        .filter(|&id| id != graph.root)
        .filter_map(|id| graph.explicit_name(id).map(|name| (id, name)))
        .collect();
    for (id, name) in explicit {
        tracing::trace!(pointer = %graph.node(id).pointer, name = %name, "explicit name");
        taken.insert(name.clone());
        graph.node_mut(id).standalone_name = Some(name);
    }

    for id in graph.ids().collect::<Vec<_>>() {
        let node = graph.node(id);
        if node.standalone_name.is_some() || !(node.is_class_shaped() || node.is_enum_shaped()) {
            continue;
        }
        synthesize_name(graph, id, &mut taken);
    }

    // A cycle needs one name to break it; any member already named will do.
    for cycle in graph.cycles.clone() {
        if cycle
            .iter()
            .any(|&id| graph.node(id).standalone_name.is_some())
        {
            continue;
        }
        for id in cycle {
            if synthesize_name(graph, id, &mut taken) {
                break;
            }
        }
    }
}

/// Name `id` after its key-path hint. Returns `false` if it has none.
fn synthesize_name(graph: &mut SchemaGraph, id: SchemaId, taken: &mut HashSet<String>) -> bool {
    let node = graph.node(id);
    let Some(hint) = node.name_hint.as_deref().map(to_safe_string) else {
        return false;
    };
    if hint.is_empty() {
        return false;
    }

    let name = if taken.contains(&hint) {
        match nearest_named_ancestor(graph, id) {
            Some(ancestor) => format!("{ancestor}{hint}"),
            None => hint,
        }
    } else {
        hint
    };
    tracing::trace!(pointer = %node.pointer, name = %name, "synthesized name");
    taken.insert(name.clone());
    graph.node_mut(id).standalone_name = Some(name);
    true
}

fn nearest_named_ancestor(graph: &SchemaGraph, id: SchemaId) -> Option<&str> {
    let mut seen = HashSet::new();
    let mut current = graph.node(id).parent;
    while let Some(parent) = current {
        if !seen.insert(parent) {
            break;
        }
        let node = graph.node(parent);
        if let Some(name) = node.standalone_name.as_deref() {
            return Some(name);
        }
        current = node.parent;
    }
    None
}

// ===========================================================================
// Tests
// ===========================================================================
