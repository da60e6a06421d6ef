//! Pass 5: Optimization
//!
//! Simplifies the parsed AST and settles standalone naming:
//!
//! 1. Unions and intersections: unnamed children of the same kind are
//!    flattened one level, `Any`/`Unknown` absorption is applied, and
//!    members that render identically are dropped
//! 2. Names: nodes sharing a standalone name must be structurally identical.
//!    Later ones become references to the first; different structure under
//!    one name is a [`CompileError::NameCollision`]
//! 3. Optional class deduplication: identical classes under different names
//!    collapse onto the first-seen name
//!
//! Every traversal walks [`Ast::reachable`], which visits each id once.

use std::collections::{HashMap, HashSet};

use crate::ast::{Ast, AstId, AstKind};
use crate::config::CompileOptions;
use crate::error::CompileError;
use crate::generator::expression::TypeRenderer;

/// Optimize a parsed AST.
pub fn optimize(mut ast: Ast, options: &CompileOptions) -> Result<Ast, CompileError> {
    let reachable = ast.reachable();

    // Children before parents, so nested operations are already flat.
    for &id in reachable.iter().rev() {
        if let Some(kind) = simplify_set_operation(&ast, id, options) {
            tracing::trace!(?id, "simplified set operation");
            ast.node_mut(id).kind = kind;
        }
    }

    finalize_names(&mut ast, options)?;
    if options.deduplicate_classes {
        deduplicate_classes(&mut ast, options);
    }

    tracing::debug!(
        nodes = ast.len(),
        named = ast
            .reachable()
            .iter()
            .filter(|&&id| ast.standalone_name(id).is_some())
            .count(),
        "optimize complete"
    );
    Ok(ast)
}

// ---------------------------------------------------------------------------
// Set operations
// ---------------------------------------------------------------------------

fn simplify_set_operation(ast: &Ast, id: AstId, options: &CompileOptions) -> Option<AstKind> {
    let (members, is_union) = match ast.kind(id) {
        AstKind::Union(members) => (members, true),
        AstKind::Intersection(members) => (members, false),
        _ => return None,
    };

    let mut flat: Vec<AstId> = Vec::with_capacity(members.len());
    for &member in members {
        let nested = match ast.kind(member) {
            AstKind::Union(inner) if is_union => Some(inner),
            AstKind::Intersection(inner) if !is_union => Some(inner),
            _ => None,
        };
        match nested {
            Some(inner) if member != id && ast.standalone_name(member).is_none() => {
                flat.extend(inner.iter().copied())
            }
            _ => flat.push(member),
        }
    }

    let has = |pred: fn(&AstKind) -> bool| flat.iter().any(|&m| pred(ast.kind(m)));
    if has(|k| matches!(k, AstKind::Any)) {
        return Some(AstKind::Any);
    }
    if is_union && has(|k| matches!(k, AstKind::Unknown)) {
        return Some(AstKind::Unknown);
    }

    if !is_union {
        let has_class = has(|k| matches!(k, AstKind::Class { .. }));
        flat.retain(|&m| match ast.kind(m) {
            AstKind::Unknown => false,
            AstKind::Object => !has_class,
            _ => true,
        });
        if flat.is_empty() {
            return Some(AstKind::Unknown);
        }
    }

    let members = dedupe_members(ast, &flat, options);
    Some(if is_union {
        AstKind::Union(members)
    } else {
        AstKind::Intersection(members)
    })
}

/// Drop members whose rendered text repeats an earlier member, and unnamed
/// members that spell out a named sibling's structure.
fn dedupe_members(ast: &Ast, members: &[AstId], options: &CompileOptions) -> Vec<AstId> {
    let mut renderer = TypeRenderer::new(ast, options);
    let named_structures: HashSet<String> = members
        .iter()
        .filter(|&&m| ast.standalone_name(m).is_some())
        .map(|&m| renderer.render_raw(m))
        .collect();

    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(members.len());
    for &member in members {
        let text = renderer.render(member);
        if !seen.insert(text.clone()) {
            continue;
        }
        if ast.standalone_name(member).is_none() && named_structures.contains(&text) {
            continue;
        }
        kept.push(member);
    }
    kept
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// Comparable structure of a node, independent of its own name.
fn structure(renderer: &mut TypeRenderer<'_>, ast: &Ast, id: AstId) -> String {
    match ast.kind(id) {
        AstKind::Enum(entries) => format!("enum {entries:?}"),
        AstKind::Class { super_types, .. } => {
            let supers: Vec<String> = super_types.iter().map(|&s| renderer.render(s)).collect();
            format!("class {} extends {}", renderer.render_raw(id), supers.join(", "))
        }
        _ => renderer.render_raw(id),
    }
}

fn origin_of(ast: &Ast, id: AstId) -> String {
    ast.node(id)
        .origin
        .clone()
        .unwrap_or_else(|| format!("node {}", id.0))
}

fn finalize_names(ast: &mut Ast, options: &CompileOptions) -> Result<(), CompileError> {
    let mut first_by_name: HashMap<String, (AstId, String)> = HashMap::new();
    let mut merges: Vec<(AstId, String)> = Vec::new();
    {
        let mut renderer = TypeRenderer::new(ast, options);
        for id in ast.reachable() {
            let Some(name) = ast.standalone_name(id) else {
                continue;
            };
            let shape = structure(&mut renderer, ast, id);
            match first_by_name.get(name) {
                None => {
                    first_by_name.insert(name.to_string(), (id, shape));
                }
                Some((_, first_shape)) if *first_shape == shape => {
                    merges.push((id, name.to_string()));
                }
                Some((first, _)) => {
                    return Err(CompileError::NameCollision {
                        name: name.to_string(),
                        first: origin_of(ast, *first),
                        second: origin_of(ast, id),
                    });
                }
            }
        }
    }

    for (id, name) in merges {
        tracing::debug!(name = %name, origin = %origin_of(ast, id), "merged duplicate declaration");
        make_reference(ast, id, name);
    }
    Ok(())
}

fn deduplicate_classes(ast: &mut Ast, options: &CompileOptions) {
    let mut first_by_shape: HashMap<String, String> = HashMap::new();
    let mut merges: Vec<(AstId, String)> = Vec::new();
    {
        let mut renderer = TypeRenderer::new(ast, options);
        for id in ast.reachable() {
            let (Some(name), AstKind::Class { .. }) = (ast.standalone_name(id), ast.kind(id)) else {
                continue;
            };
            let shape = structure(&mut renderer, ast, id);
            match first_by_shape.get(&shape) {
                Some(first) if first != name => merges.push((id, first.clone())),
                Some(_) => {}
                None => {
                    first_by_shape.insert(shape, name.to_string());
                }
            }
        }
    }

    for (id, target) in merges {
        tracing::debug!(target = %target, origin = %origin_of(ast, id), "deduplicated class");
        make_reference(ast, id, target);
    }
}

fn make_reference(ast: &mut Ast, id: AstId, target_name: String) {
    let node = ast.node_mut(id);
    node.kind = AstKind::Reference { target_name };
    node.standalone_name = None;
}

// ===========================================================================
// Tests
// ===========================================================================
