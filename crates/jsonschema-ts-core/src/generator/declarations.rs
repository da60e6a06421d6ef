//! Top-level declarations.
//!
//! Three passes walk the optimized AST, each with its own visited set,
//! because each decides emission on its own terms:
//!
//! - [`declare_types`]: named non-class, non-enum nodes become `export type`
//! - [`declare_classes`]: named classes become `export class`
//! - [`declare_enums`]: every enum becomes `export [const] enum`
//!
//! Types and classes are emitted when the node is the compile root or when
//! `declare_externally_referenced` is set.

use std::collections::HashSet;

use crate::ast::{Ast, AstId, AstKind, EnumEntry};
use crate::config::CompileOptions;
use crate::generator::expression::TypeRenderer;
use crate::naming::escape_key_name;

/// Per-pass traversal. Every call owns a fresh visited set.
fn walk(ast: &Ast, mut visit: impl FnMut(AstId)) {
    let mut visited: HashSet<AstId> = HashSet::new();
    let mut stack = vec![ast.root];
    while let Some(id) = stack.pop() {
        if id.0 >= ast.len() || !visited.insert(id) {
            continue;
        }
        visit(id);
        let mut children = ast.kind(id).children();
        children.reverse();
        stack.extend(children);
    }
}

fn should_declare(
    ast: &Ast,
    id: AstId,
    name: &str,
    root_name: &str,
    options: &CompileOptions,
) -> bool {
    id == ast.root || name == root_name || options.declare_externally_referenced
}

/// JSDoc block, each line prefixed with `indent`.
pub fn doc_comment(comment: &str, indent: &str) -> String {
    let mut out = format!("{indent}/**\n");
    for line in comment.lines() {
        if line.is_empty() {
            out.push_str(&format!("{indent} *\n"));
        } else {
            out.push_str(&format!("{indent} * {line}\n"));
        }
    }
    out.push_str(&format!("{indent} */"));
    out
}

fn with_comment(ast: &Ast, id: AstId, body: String) -> String {
    match ast.node(id).comment.as_deref() {
        Some(comment) if !comment.trim().is_empty() => {
            format!("{}\n{body}", doc_comment(comment, ""))
        }
        _ => body,
    }
}

// ---------------------------------------------------------------------------
// Type aliases
// ---------------------------------------------------------------------------

pub fn declare_types(
    ast: &Ast,
    renderer: &mut TypeRenderer<'_>,
    root_name: &str,
    options: &CompileOptions,
) -> Vec<String> {
    let mut blocks = Vec::new();
    walk(ast, |id| {
        let Some(name) = ast.standalone_name(id) else {
            return;
        };
        if matches!(ast.kind(id), AstKind::Class { .. } | AstKind::Enum(_)) {
            return;
        }
        if !should_declare(ast, id, name, root_name, options) {
            return;
        }
        let body = format!("export type {name} = {};", renderer.render_raw(id));
        blocks.push(with_comment(ast, id, body));
    });
    tracing::trace!(count = blocks.len(), "declared type aliases");
    blocks
}

// ---------------------------------------------------------------------------
// Classes
// ---------------------------------------------------------------------------

/// `emitted` is the class-name registry for one compile call. It is owned by
/// the caller and never shared between compiles.
pub fn declare_classes(
    ast: &Ast,
    renderer: &mut TypeRenderer<'_>,
    root_name: &str,
    options: &CompileOptions,
    emitted: &mut HashSet<String>,
) -> Vec<String> {
    let mut blocks = Vec::new();
    walk(ast, |id| {
        let Some(name) = ast.standalone_name(id) else {
            return;
        };
        let AstKind::Class {
            members,
            super_types,
        } = ast.kind(id)
        else {
            return;
        };
        if !should_declare(ast, id, name, root_name, options) {
            return;
        }
        if !emitted.insert(name.to_string()) {
            tracing::debug!(name, "class already declared in this compile");
            return;
        }

        let mut header = format!("export class {name} ");
        if !super_types.is_empty() {
            let supers: Vec<String> = super_types.iter().map(|&s| renderer.render(s)).collect();
            header.push_str(&format!("extends {} ", supers.join(", ")));
        }
        header.push('{');

        let mut lines = vec![header];
        for member in members
            .iter()
            .filter(|m| !m.is_pattern_property && !m.is_unreachable_definition)
        {
            let member_node = ast.node(member.node);
            if member_node.standalone_name.is_none() {
                if let Some(comment) = member_node.comment.as_deref() {
                    if !comment.trim().is_empty() {
                        lines.push(doc_comment(comment, "  "));
                    }
                }
            }
            lines.push(format!("  {};", renderer.member_signature(member)));
        }
        lines.push("}".to_string());

        let mut block = with_comment(ast, id, lines.join("\n"));
        if let Some(banner) = &options.class_banner {
            block = format!("{banner}\n{block}");
        }
        blocks.push(block);
    });
    tracing::trace!(count = blocks.len(), "declared classes");
    blocks
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

pub fn declare_enums(ast: &Ast, options: &CompileOptions) -> Vec<String> {
    let mut blocks = Vec::new();
    walk(ast, |id| {
        let (Some(name), AstKind::Enum(entries)) = (ast.standalone_name(id), ast.kind(id)) else {
            return;
        };
        let keyword = if options.enable_const_enums {
            "export const enum"
        } else {
            "export enum"
        };
        let body = format!("{keyword} {name} {{\n{}\n}}", enum_body(entries));
        blocks.push(with_comment(ast, id, body));
    });
    tracing::trace!(count = blocks.len(), "declared enums");
    blocks
}

fn enum_body(entries: &[EnumEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("  {} = {}", escape_key_name(&entry.label), entry.value))
        .collect::<Vec<_>>()
        .join(",\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstNode, ClassMember};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn member(key: &str, node: AstId, is_required: bool) -> ClassMember {
        ClassMember {
            key_name: key.into(),
            node,
            is_required,
            is_pattern_property: false,
            is_unreachable_definition: false,
            is_index_signature: false,
        }
    }

    fn named(ast: &mut Ast, kind: AstKind, name: &str) -> AstId {
        let id = ast.push(AstNode::new(kind));
        ast.node_mut(id).standalone_name = Some(name.into());
        id
    }

    #[test]
    fn test_doc_comment_format() {
        assert_eq!(doc_comment("a\n\nb", "  "), "  /**\n   * a\n   *\n   * b\n   */");
    }

    #[test]
    fn test_class_declaration_with_member_comment() {
        let mut ast = Ast::new();
        let s = ast.push(AstNode::new(AstKind::String));
        ast.node_mut(s).comment = Some("Street line".into());
        let root = named(
            &mut ast,
            AstKind::Class {
                members: vec![member("street", s, true), member("zip-code", s, false)],
                super_types: vec![],
            },
            "Address",
        );
        ast.root = root;

        let options = CompileOptions::default();
        let mut renderer = TypeRenderer::new(&ast, &options);
        let mut emitted = HashSet::new();
        let blocks = declare_classes(&ast, &mut renderer, "Address", &options, &mut emitted);

        assert_eq!(
            blocks,
            vec![concat!(
                "export class Address {\n",
                "  /**\n",
                "   * Street line\n",
                "   */\n",
                "  street: string;\n",
                "  /**\n",
                "   * Street line\n",
                "   */\n",
                "  \"zip-code\"?: string;\n",
                "}"
            )
            .to_string()]
        );
        assert!(emitted.contains("Address"));
    }

    #[test]
    fn test_named_member_comment_not_repeated() {
        let mut ast = Ast::new();
        let inner = named(
            &mut ast,
            AstKind::Class {
                members: vec![],
                super_types: vec![],
            },
            "Inner",
        );
        ast.node_mut(inner).comment = Some("Inner docs".into());
        let root = named(
            &mut ast,
            AstKind::Class {
                members: vec![member("inner", inner, true)],
                super_types: vec![inner],
            },
            "Outer",
        );
        ast.root = root;

        let options = CompileOptions::default();
        let mut renderer = TypeRenderer::new(&ast, &options);
        let blocks = declare_classes(&ast, &mut renderer, "Outer", &options, &mut HashSet::new());

        assert_eq!(
            blocks,
            vec![
                "export class Outer extends Inner {\n  inner: Inner;\n}".to_string(),
                "/**\n * Inner docs\n */\nexport class Inner {\n}".to_string(),
            ]
        );
    }

    #[test]
    fn test_registry_suppresses_within_one_call_only() {
        let mut ast = Ast::new();
        let root = named(
            &mut ast,
            AstKind::Class {
                members: vec![],
                super_types: vec![],
            },
            "Thing",
        );
        ast.root = root;
        let options = CompileOptions::default();

        let mut emitted = HashSet::new();
        let mut renderer = TypeRenderer::new(&ast, &options);
        let mut declare =
            |emitted: &mut HashSet<String>| declare_classes(&ast, &mut renderer, "Thing", &options, emitted);

        assert_eq!(declare(&mut emitted).len(), 1);
        assert!(declare(&mut emitted).is_empty());
        assert_eq!(declare(&mut HashSet::new()).len(), 1);
    }

    #[test]
    fn test_external_types_follow_policy() {
        let mut ast = Ast::new();
        let s = ast.push(AstNode::new(AstKind::String));
        let n = ast.push(AstNode::new(AstKind::Null));
        let alias = named(&mut ast, AstKind::Union(vec![s, n]), "MaybeString");
        let root = named(
            &mut ast,
            AstKind::Class {
                members: vec![member("value", alias, true)],
                super_types: vec![],
            },
            "Root",
        );
        ast.root = root;

        let options = CompileOptions::default();
        let mut renderer = TypeRenderer::new(&ast, &options);
        assert_eq!(
            declare_types(&ast, &mut renderer, "Root", &options),
            vec!["export type MaybeString = (string | null);".to_string()]
        );

        let options = CompileOptions {
            declare_externally_referenced: false,
            ..CompileOptions::default()
        };
        let mut renderer = TypeRenderer::new(&ast, &options);
        assert!(declare_types(&ast, &mut renderer, "Root", &options).is_empty());
    }

    #[test]
    fn test_enum_declaration() {
        let mut ast = Ast::new();
        let root = named(
            &mut ast,
            AstKind::Enum(vec![
                EnumEntry {
                    label: "Open".into(),
                    value: json!("open"),
                },
                EnumEntry {
                    label: "_1".into(),
                    value: json!(1),
                },
            ]),
            "Status",
        );
        ast.root = root;

        assert_eq!(
            declare_enums(&ast, &CompileOptions::default()),
            vec!["export const enum Status {\n  Open = \"open\",\n  _1 = 1\n}".to_string()]
        );
        let options = CompileOptions {
            enable_const_enums: false,
            ..CompileOptions::default()
        };
        assert!(declare_enums(&ast, &options)[0].starts_with("export enum Status {"));
    }
}
