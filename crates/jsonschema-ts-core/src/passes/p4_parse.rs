//! Pass 4: Parsing
//!
//! Converts the normalized [`SchemaGraph`] into the typed [`Ast`]. Parsing
//! is memoized by [`SchemaId`]: a node's [`AstId`] is reserved before its
//! children are parsed, so cycles resolve to the in-progress id instead of
//! recursing forever, and shared schemas become shared AST nodes.
//!
//! A schema can say several things at once (`properties` and `anyOf`,
//! `type: ["string", "null"]`). Each independent statement is a facet; one
//! facet becomes the node's kind, several become an `Intersection`.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::ast::{Ast, AstId, AstKind, AstNode, ClassMember, EnumEntry};
use crate::config::CompileOptions;
use crate::naming::{enum_label, INDEX_SIGNATURE_KEY};
use crate::schema_graph::{Additional, Items, SchemaGraph, SchemaId};

/// Shared traversal context, reducing argument count.
struct ParseContext<'g> {
    graph: &'g SchemaGraph,
    options: &'g CompileOptions,
    ast: Ast,
    memo: HashMap<SchemaId, AstId>,
    placeholder: Option<AstId>,
}

/// Parse a normalized graph into an AST.
pub fn parse(graph: &SchemaGraph, options: &CompileOptions) -> Ast {
    let mut ctx = ParseContext {
        graph,
        options,
        ast: Ast::new(),
        memo: HashMap::new(),
        placeholder: None,
    };
    let root = parse_node(&mut ctx, graph.root);
    ctx.ast.root = root;

    tracing::debug!(nodes = ctx.ast.len(), "parse complete");
    ctx.ast
}

fn parse_node(ctx: &mut ParseContext<'_>, id: SchemaId) -> AstId {
    if let Some(&ast_id) = ctx.memo.get(&id) {
        return ast_id;
    }

    let graph = ctx.graph;
    let node = graph.node(id);
    let mut ast_node = AstNode::new(AstKind::Any);
    ast_node.standalone_name = node.standalone_name.clone();
    ast_node.key_name = node.key_name.clone();
    ast_node.comment = comment_of(graph, id);
    ast_node.origin = Some(node.pointer.clone());
    let ast_id = ctx.ast.push(ast_node);
    ctx.memo.insert(id, ast_id);

    let kind = parse_kind(ctx, id);
    tracing::trace!(pointer = %node.pointer, ?ast_id, "parsed");
    ctx.ast.node_mut(ast_id).kind = kind;
    ast_id
}

fn comment_of(graph: &SchemaGraph, id: SchemaId) -> Option<String> {
    let node = graph.node(id);
    let deprecated = matches!(node.keywords.get("deprecated"), Some(Value::Bool(true)));
    match (node.description(), deprecated) {
        (Some(description), true) => Some(format!("{description}\n\n@deprecated")),
        (Some(description), false) => Some(description.to_string()),
        (None, true) => Some("@deprecated".to_string()),
        (None, false) => None,
    }
}

fn placeholder_kind(options: &CompileOptions) -> AstKind {
    if options.unknown_any {
        AstKind::Unknown
    } else {
        AstKind::Any
    }
}

/// One shared unnamed Any/Unknown node per parse.
fn placeholder(ctx: &mut ParseContext<'_>) -> AstId {
    if let Some(id) = ctx.placeholder {
        return id;
    }
    let id = ctx.ast.push(AstNode::new(placeholder_kind(ctx.options)));
    ctx.placeholder = Some(id);
    id
}

fn push_unnamed(ctx: &mut ParseContext<'_>, kind: AstKind) -> AstId {
    ctx.ast.push(AstNode::new(kind))
}

// ---------------------------------------------------------------------------
// Facets
// ---------------------------------------------------------------------------

fn parse_kind(ctx: &mut ParseContext<'_>, id: SchemaId) -> AstKind {
    let graph = ctx.graph;
    let node = graph.node(id);

    if let Some(allowed) = node.boolean {
        return if allowed {
            placeholder_kind(ctx.options)
        } else {
            AstKind::CustomType("never".to_string())
        };
    }
    if let Some(ts_type) = node.ts_type() {
        return AstKind::CustomType(ts_type.to_string());
    }

    let super_types = super_types(ctx, id);
    let mut facets: Vec<AstKind> = Vec::new();

    if node.is_enum_shaped() {
        facets.push(enum_kind(ctx, id));
    } else if !super_types.is_empty() {
        facets.push(class_kind(ctx, id, super_types.clone()));
    } else {
        let types = node.types();
        match types.as_slice() {
            [] if node.is_object_shaped() => {
                facets.push(object_kind(ctx, id));
            }
            [] if node.is_array_shaped() => facets.push(array_kind(ctx, id)),
            [] => {}
            [single] => facets.push(type_kind(ctx, id, single)),
            many => {
                let members = many
                    .iter()
                    .map(|t| {
                        let kind = type_kind(ctx, id, t);
                        push_unnamed(ctx, kind)
                    })
                    .collect();
                facets.push(AstKind::Union(members));
            }
        }
    }

    if super_types.is_empty() {
        for group in [&node.all_of, &node.extends] {
            if !group.is_empty() {
                let members = group.iter().map(|&m| parse_node(ctx, m)).collect();
                facets.push(AstKind::Intersection(members));
            }
        }
    }
    for group in [&node.any_of, &node.one_of] {
        if !group.is_empty() {
            let members = group.iter().map(|&m| parse_node(ctx, m)).collect();
            facets.push(AstKind::Union(members));
        }
    }

    match facets.len() {
        0 => placeholder_kind(ctx.options),
        1 => facets.remove(0),
        _ => {
            let members = facets
                .into_iter()
                .map(|kind| push_unnamed(ctx, kind))
                .collect();
            AstKind::Intersection(members)
        }
    }
}

fn type_kind(ctx: &mut ParseContext<'_>, id: SchemaId, name: &str) -> AstKind {
    match name {
        "string" => AstKind::String,
        "number" | "integer" => AstKind::Number,
        "boolean" => AstKind::Boolean,
        "null" => AstKind::Null,
        "object" => object_kind(ctx, id),
        "array" => array_kind(ctx, id),
        "any" => placeholder_kind(ctx.options),
        other => {
            tracing::warn!(
                pointer = %ctx.graph.node(id).pointer,
                type_name = other,
                "unknown type name, emitting placeholder"
            );
            placeholder_kind(ctx.options)
        }
    }
}

/// `allOf` / `extends` made purely of named classes become super types of
/// a named class.
fn super_types(ctx: &mut ParseContext<'_>, id: SchemaId) -> Vec<AstId> {
    let graph = ctx.graph;
    let node = graph.node(id);
    if node.standalone_name.is_none() || node.is_enum_shaped() {
        return Vec::new();
    }

    let mut candidates: Vec<SchemaId> = Vec::new();
    if node.all_of_by_ref {
        candidates.extend(&node.all_of);
    }
    candidates.extend(&node.extends);
    if candidates.is_empty() || node.all_of.len() + node.extends.len() != candidates.len() {
        return Vec::new();
    }

    let all_named_classes = candidates.iter().all(|&c| {
        let candidate = graph.node(c);
        c != id && candidate.standalone_name.is_some() && candidate.is_class_shaped()
    });
    if !all_named_classes {
        return Vec::new();
    }
    candidates.into_iter().map(|c| parse_node(ctx, c)).collect()
}

fn enum_kind(ctx: &mut ParseContext<'_>, id: SchemaId) -> AstKind {
    let graph = ctx.graph;
    let node = graph.node(id);
    let values = node.enum_values().cloned().unwrap_or_default();

    if node.standalone_name.is_some() {
        if let Some(entries) = enum_entries(node.keywords.get("tsEnumNames"), &values) {
            return AstKind::Enum(entries);
        }
    }

    if values.len() == 1 {
        return AstKind::Literal(values[0].clone());
    }
    let literals = values
        .into_iter()
        .map(|value| push_unnamed(ctx, AstKind::Literal(value)))
        .collect();
    AstKind::Union(literals)
}

/// Labeled entries, or `None` when the values cannot form an enum.
fn enum_entries(ts_enum_names: Option<&Value>, values: &[Value]) -> Option<Vec<EnumEntry>> {
    if values.is_empty() || !values.iter().all(|v| v.is_string() || v.is_number()) {
        return None;
    }

    // Unusable `tsEnumNames` (wrong length, non-strings) fall back to
    // labels derived from the values.
    let custom: Option<Vec<String>> = ts_enum_names
        .and_then(Value::as_array)
        .filter(|names| names.len() == values.len())
        .and_then(|names| {
            names
                .iter()
                .map(|n| n.as_str().map(str::to_string))
                .collect()
        });
    let labels: Vec<String> = match custom {
        Some(labels) => labels,
        None => values.iter().map(enum_label).collect::<Option<_>>()?,
    };

    let mut seen = HashSet::new();
    if !labels.iter().all(|label| seen.insert(label.as_str())) {
        return None;
    }

    Some(
        labels
            .into_iter()
            .zip(values.iter().cloned())
            .map(|(label, value)| EnumEntry { label, value })
            .collect(),
    )
}

fn object_kind(ctx: &mut ParseContext<'_>, id: SchemaId) -> AstKind {
    if ctx.graph.node(id).is_class_shaped() {
        class_kind(ctx, id, Vec::new())
    } else {
        AstKind::Object
    }
}

fn class_kind(ctx: &mut ParseContext<'_>, id: SchemaId, super_types: Vec<AstId>) -> AstKind {
    let graph = ctx.graph;
    let node = graph.node(id);
    let required = node.required();
    let mut members = Vec::new();

    for (key, &child) in &node.properties {
        members.push(ClassMember {
            key_name: key.clone(),
            node: parse_node(ctx, child),
            is_required: required.contains(&key.as_str()) || graph.node(child).required_flag(),
            is_pattern_property: false,
            is_unreachable_definition: false,
            is_index_signature: false,
        });
    }

    let single_pattern = node.pattern_properties.len() == 1
        && node.additional_properties == Some(Additional::Allowed(false));
    for (pattern, &child) in &node.pattern_properties {
        members.push(ClassMember {
            key_name: if single_pattern {
                INDEX_SIGNATURE_KEY.to_string()
            } else {
                pattern.clone()
            },
            node: parse_node(ctx, child),
            is_required: single_pattern || required.contains(&pattern.as_str()),
            is_pattern_property: !single_pattern,
            is_unreachable_definition: false,
            is_index_signature: single_pattern,
        });
    }

    let additional = match node.additional_properties {
        Some(Additional::Allowed(true)) => Some(placeholder(ctx)),
        Some(Additional::Schema(child)) => Some(parse_node(ctx, child)),
        _ => None,
    };
    if let Some(value) = additional {
        members.push(ClassMember {
            key_name: INDEX_SIGNATURE_KEY.to_string(),
            node: value,
            is_required: true,
            is_pattern_property: false,
            is_unreachable_definition: false,
            is_index_signature: true,
        });
    }

    if ctx.options.unreachable_definitions {
        for (key, &child) in &node.definitions {
            members.push(ClassMember {
                key_name: key.clone(),
                node: parse_node(ctx, child),
                is_required: true,
                is_pattern_property: false,
                is_unreachable_definition: true,
                is_index_signature: false,
            });
        }
    }

    AstKind::Class {
        members,
        super_types,
    }
}

fn array_kind(ctx: &mut ParseContext<'_>, id: SchemaId) -> AstKind {
    let graph = ctx.graph;
    let node = graph.node(id);
    let ignore_bounds = ctx.options.ignore_min_and_max_items;
    let min = node.min_items().unwrap_or(0) as usize;
    let max = node.max_items().map(|m| m as usize);

    match &node.items {
        Some(Items::Tuple(children)) => {
            let elements: Vec<AstId> = children.iter().map(|&c| parse_node(ctx, c)).collect();
            let spread = match node.additional_items {
                Some(Additional::Allowed(true)) => Some(placeholder(ctx)),
                Some(Additional::Schema(child)) => Some(parse_node(ctx, child)),
                _ => None,
            };
            let (min_items, max_items) = if ignore_bounds {
                (elements.len(), None)
            } else {
                (min, max)
            };
            AstKind::Tuple {
                elements,
                min_items,
                max_items,
                spread,
            }
        }
        Some(Items::Single(child)) => AstKind::Array {
            element: parse_node(ctx, *child),
        },
        None if !ignore_bounds && (min > 0 || max.is_some()) => {
            let any = placeholder(ctx);
            AstKind::Tuple {
                elements: vec![any; max.unwrap_or(0).max(min)],
                min_items: min,
                max_items: max,
                spread: if max.is_none() { Some(any) } else { None },
            }
        }
        None => AstKind::Array {
            element: placeholder(ctx),
        },
    }
}

// ===========================================================================
// Tests
// ===========================================================================
