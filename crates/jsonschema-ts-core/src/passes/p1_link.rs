//! Pass 1: Linking
//!
//! Walks the dereferenced document depth-first and builds the
//! [`SchemaGraph`] arena:
//!
//! 1. A bare `$ref` contributes no node of its own: the site takes the
//!    target's [`SchemaId`], so diamonds and repeated refs share one node
//! 2. A `$ref` with sibling keywords becomes its own node whose keywords are
//!    the target's overlaid by the siblings; children inherited from the
//!    target keep the target's identities
//! 3. Reaching a node that is still on the traversal stack closes a cycle:
//!    the stack segment from that node to the top is recorded as one cycle
//!    and every member is marked cyclic, wherever the walk entered it
//!
//! Nodes remember where they were first reached (parent, property key,
//! definition key) and a key-path name hint for the normalizer.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::config::CompileOptions;
use crate::error::CompileError;
use crate::passes::p0_dereference::{is_bare_ref, Dereferenced};
use crate::resolver::EXTERNAL_KEY;
use crate::schema_graph::{Additional, Items, SchemaGraph, SchemaId, SchemaNode};
use crate::schema_utils::{build_path, resolve_pointer};

/// Shared traversal context, reducing argument count.
struct LinkContext<'a> {
    root: &'a Value,
    max_depth: usize,
    nodes: Vec<SchemaNode>,
    by_pointer: HashMap<String, SchemaId>,
    stack: Vec<SchemaId>,
    cycles: Vec<Vec<SchemaId>>,
}

/// Where a node was reached from.
#[derive(Debug, Clone, Default)]
struct Origin {
    parent: Option<SchemaId>,
    key_name: Option<String>,
    definition_name: Option<String>,
    hint: Option<String>,
}

/// Link a dereferenced document into a [`SchemaGraph`].
pub fn link(
    dereferenced: &Dereferenced,
    options: &CompileOptions,
) -> Result<SchemaGraph, CompileError> {
    let mut ctx = LinkContext {
        root: &dereferenced.schema,
        max_depth: options.max_depth,
        nodes: Vec::new(),
        by_pointer: HashMap::new(),
        stack: Vec::new(),
        cycles: Vec::new(),
    };
    let root = link_node(&mut ctx, "#", &dereferenced.schema, Origin::default(), 0)?;

    let graph = SchemaGraph {
        nodes: ctx.nodes,
        root,
        dereferenced_paths: dereferenced.dereferenced_paths.clone(),
        cycles: ctx.cycles,
    };
    tracing::debug!(
        nodes = graph.len(),
        cycles = graph.cycles.len(),
        "link complete"
    );
    Ok(graph)
}

fn link_node<'a>(
    ctx: &mut LinkContext<'a>,
    pointer: &str,
    value: &'a Value,
    origin: Origin,
    depth: usize,
) -> Result<SchemaId, CompileError> {
    if depth > ctx.max_depth {
        return Err(CompileError::RecursionDepthExceeded {
            path: pointer.to_string(),
            max_depth: ctx.max_depth,
        });
    }

    // Bare ref: the site shares the target's identity.
    if is_bare_ref(value) {
        let target = value.get("$ref").and_then(Value::as_str).unwrap_or("#");
        let id = match resolve_pointer(ctx.root, target) {
            Some(target_value) if target != pointer => {
                link_node(ctx, target, target_value, origin, depth + 1)?
            }
            _ => unresolved(ctx, pointer, target, origin),
        };
        ctx.by_pointer.entry(pointer.to_string()).or_insert(id);
        return Ok(id);
    }

    if let Some(&id) = ctx.by_pointer.get(pointer) {
        close_cycle(ctx, id, pointer);
        let node = &mut ctx.nodes[id.0];
        if node.definition_name.is_none() {
            node.definition_name = origin.definition_name;
        }
        if node.key_name.is_none() {
            node.key_name = origin.key_name;
        }
        return Ok(id);
    }

    let id = SchemaId(ctx.nodes.len());
    let mut node = SchemaNode::new(pointer);
    node.parent = origin.parent;
    node.key_name = origin.key_name;
    node.definition_name = origin.definition_name;
    node.name_hint = origin.hint;
    if let Value::Bool(b) = value {
        node.boolean = Some(*b);
    }
    ctx.nodes.push(node);
    ctx.by_pointer.insert(pointer.to_string(), id);

    let Some(obj) = value.as_object() else {
        return Ok(id);
    };

    ctx.stack.push(id);
    let entries = collect_entries(ctx, pointer, obj, id);
    for (keyword, (child, base)) in entries {
        link_keyword(ctx, id, &keyword, child, &base, depth)?;
    }
    ctx.stack.pop();

    Ok(id)
}

/// Record a cycle if `id` is still being expanded.
fn close_cycle(ctx: &mut LinkContext<'_>, id: SchemaId, pointer: &str) {
    let Some(start) = ctx.stack.iter().position(|&entry| entry == id) else {
        return;
    };
    let members = ctx.stack[start..].to_vec();
    tracing::trace!(pointer, len = members.len(), "cycle detected");
    for member in &members {
        ctx.nodes[member.0].cyclic = true;
    }
    if !ctx.cycles.contains(&members) {
        ctx.cycles.push(members);
    }
}

/// Node standing in for a `$ref` whose target does not exist.
fn unresolved(ctx: &mut LinkContext<'_>, pointer: &str, target: &str, origin: Origin) -> SchemaId {
    let id = SchemaId(ctx.nodes.len());
    let mut node = SchemaNode::new(pointer);
    node.parent = origin.parent;
    node.key_name = origin.key_name;
    node.name_hint = origin.hint;
    node.unresolved_ref = Some(target.to_string());
    ctx.nodes.push(node);
    id
}

/// Keywords of `obj` paired with the pointer their subschemas live under.
///
/// For an extended ref these are the target's keywords overlaid by the
/// site's siblings.
fn collect_entries<'v>(
    ctx: &mut LinkContext<'v>,
    pointer: &str,
    obj: &'v Map<String, Value>,
    id: SchemaId,
) -> IndexMap<String, (&'v Value, String)> {
    let mut entries: IndexMap<String, (&'v Value, String)> = IndexMap::new();

    if let Some(target) = obj.get("$ref").and_then(Value::as_str) {
        match resolve_pointer(ctx.root, target).and_then(Value::as_object) {
            Some(target_obj) => {
                if target_obj.contains_key("$ref") {
                    tracing::warn!(
                        pointer,
                        target,
                        "extended $ref points at another extended $ref; inner ref ignored"
                    );
                }
                // The site is a different schema than its target, so it
                // does not inherit the target's name.
                for (keyword, child) in target_obj {
                    if keyword != "title" && keyword != "$id" {
                        entries.insert(keyword.clone(), (child, target.to_string()));
                    }
                }
            }
            None => ctx.nodes[id.0].unresolved_ref = Some(target.to_string()),
        }
    }

    for (keyword, child) in obj {
        entries.insert(keyword.clone(), (child, pointer.to_string()));
    }
    entries.shift_remove("$ref");
    entries.shift_remove(EXTERNAL_KEY);
    entries
}

fn link_keyword<'a>(
    ctx: &mut LinkContext<'a>,
    id: SchemaId,
    keyword: &str,
    value: &'a Value,
    base: &str,
    depth: usize,
) -> Result<(), CompileError> {
    let hint = ctx.nodes[id.0].name_hint.clone();
    let suffixed = |suffix: &str| hint.as_ref().map(|h| format!("{h}{suffix}"));
    let child_origin = |key_name: Option<&str>, hint: Option<String>| Origin {
        parent: Some(id),
        key_name: key_name.map(str::to_string),
        definition_name: None,
        hint,
    };

    match keyword {
        "properties" | "patternProperties" | "definitions" | "$defs" => {
            let Some(map) = value.as_object() else {
                return Ok(());
            };
            let mut linked = IndexMap::new();
            for (key, child) in map {
                let path = build_path(base, &[keyword, key.as_str()]);
                let origin = match keyword {
                    "properties" => child_origin(Some(key.as_str()), Some(key.clone())),
                    "patternProperties" => child_origin(Some(key.as_str()), None),
                    _ => Origin {
                        definition_name: Some(key.clone()),
                        ..child_origin(None, Some(key.clone()))
                    },
                };
                linked.insert(key.clone(), link_node(ctx, &path, child, origin, depth + 1)?);
            }
            let node = &mut ctx.nodes[id.0];
            match keyword {
                "properties" => node.properties = linked,
                "patternProperties" => node.pattern_properties = linked,
                _ => node.definitions.extend(linked),
            }
        }
        "additionalProperties" | "additionalItems" => {
            let additional = match value {
                Value::Bool(b) => Additional::Allowed(*b),
                Value::Object(_) => {
                    let suffix = if keyword == "additionalItems" {
                        "Item"
                    } else {
                        "Value"
                    };
                    let path = build_path(base, &[keyword]);
                    let origin = child_origin(None, suffixed(suffix));
                    Additional::Schema(link_node(ctx, &path, value, origin, depth + 1)?)
                }
                _ => return Ok(()),
            };
            let node = &mut ctx.nodes[id.0];
            if keyword == "additionalItems" {
                node.additional_items = Some(additional);
            } else {
                node.additional_properties = Some(additional);
            }
        }
        "items" => {
            let items = match value {
                Value::Array(children) => {
                    let mut linked = Vec::with_capacity(children.len());
                    for (i, child) in children.iter().enumerate() {
                        let path = build_path(base, &["items", &i.to_string()]);
                        let origin = child_origin(None, suffixed("Item"));
                        linked.push(link_node(ctx, &path, child, origin, depth + 1)?);
                    }
                    Items::Tuple(linked)
                }
                Value::Object(_) | Value::Bool(_) => {
                    let path = build_path(base, &["items"]);
                    let origin = child_origin(None, suffixed("Item"));
                    Items::Single(link_node(ctx, &path, value, origin, depth + 1)?)
                }
                _ => return Ok(()),
            };
            ctx.nodes[id.0].items = Some(items);
        }
        "anyOf" | "oneOf" | "allOf" | "extends" => {
            let members: Vec<(String, &'a Value)> = match value {
                Value::Array(children) => children
                    .iter()
                    .enumerate()
                    .map(|(i, child)| (build_path(base, &[keyword, &i.to_string()]), child))
                    .collect(),
                Value::Object(_) if keyword == "extends" => {
                    vec![(build_path(base, &[keyword]), value)]
                }
                _ => return Ok(()),
            };
            let by_ref = !members.is_empty() && members.iter().all(|(_, m)| is_bare_ref(m));
            let mut linked = Vec::with_capacity(members.len());
            for (path, child) in members {
                let origin = child_origin(None, None);
                linked.push(link_node(ctx, &path, child, origin, depth + 1)?);
            }
            let node = &mut ctx.nodes[id.0];
            match keyword {
                "anyOf" => node.any_of = linked,
                "oneOf" => node.one_of = linked,
                "allOf" => {
                    node.all_of = linked;
                    node.all_of_by_ref = by_ref;
                }
                _ => node.extends = linked,
            }
        }
        // Negation has no counterpart in the generated types.
        "not" => {}
        _ => {
            ctx.nodes[id.0]
                .keywords
                .insert(keyword.to_string(), value.clone());
        }
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
