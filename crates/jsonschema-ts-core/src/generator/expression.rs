//! Inline type expressions.
//!
//! [`TypeRenderer`] renders any AST node as a type expression. Rendering is
//! memoized per [`AstId`]: the same node reached from different places
//! renders to the same text once, and a node with a standalone name always
//! renders as that name, which is what stops cycles through named nodes.

use std::collections::{HashMap, HashSet};

use crate::ast::{Ast, AstId, AstKind, ClassMember};
use crate::config::CompileOptions;
use crate::naming::{escape_key_name, INDEX_SIGNATURE_KEY};

pub struct TypeRenderer<'a> {
    ast: &'a Ast,
    options: &'a CompileOptions,
    memo: HashMap<AstId, String>,
    in_progress: HashSet<AstId>,
}

impl<'a> TypeRenderer<'a> {
    pub fn new(ast: &'a Ast, options: &'a CompileOptions) -> Self {
        Self {
            ast,
            options,
            memo: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// Render `id` as it appears where it is used: its standalone name if
    /// it has one, otherwise its structure.
    pub fn render(&mut self, id: AstId) -> String {
        let ast = self.ast;
        if let Some(name) = ast.standalone_name(id) {
            return name.to_string();
        }
        if let Some(text) = self.memo.get(&id) {
            return text.clone();
        }
        let text = self.render_raw(id);
        self.memo.insert(id, text.clone());
        text
    }

    /// Render the structure of `id`, ignoring its own standalone name.
    pub fn render_raw(&mut self, id: AstId) -> String {
        if !self.in_progress.insert(id) {
            tracing::warn!(
                origin = ?self.ast.node(id).origin,
                "unnamed node refers to itself, emitting placeholder"
            );
            return self.options.placeholder().to_string();
        }
        let text = self.render_kind(id);
        self.in_progress.remove(&id);
        text
    }

    /// `key: T` or `key?: T`, without the trailing semicolon.
    pub fn member_signature(&mut self, member: &ClassMember) -> String {
        let mut ty = self.render(member.node);
        let key = if member.is_index_signature {
            if self.options.strict_index_signatures {
                ty = format!("{} | undefined", parenthesize(&ty));
            }
            INDEX_SIGNATURE_KEY.to_string()
        } else {
            escape_key_name(&member.key_name)
        };
        format!(
            "{}{}: {}",
            key,
            if member.is_required { "" } else { "?" },
            ty
        )
    }

    fn render_kind(&mut self, id: AstId) -> String {
        let ast = self.ast;
        match ast.kind(id) {
            AstKind::Any => "any".to_string(),
            AstKind::Unknown => "unknown".to_string(),
            AstKind::Null => "null".to_string(),
            AstKind::Boolean => "boolean".to_string(),
            AstKind::Number => "number".to_string(),
            AstKind::String => "string".to_string(),
            AstKind::Object => "object".to_string(),
            AstKind::Literal(value) => value.to_string(),
            AstKind::Array { element } => {
                let element = self.render(*element);
                format!("{}[]", parenthesize(&element))
            }
            AstKind::Tuple {
                elements,
                min_items,
                max_items,
                spread,
            } => self.render_tuple(elements, *min_items, *max_items, *spread),
            AstKind::Union(members) => self.render_set_operation(members, "|"),
            AstKind::Intersection(members) => self.render_set_operation(members, "&"),
            AstKind::Enum(entries) => {
                let values: Vec<String> = entries.iter().map(|e| e.value.to_string()).collect();
                match values.len() {
                    0 => "never".to_string(),
                    1 => values[0].clone(),
                    _ => format!("({})", values.join(" | ")),
                }
            }
            AstKind::Class { members, .. } => {
                let signatures: Vec<String> = members
                    .iter()
                    .filter(|m| !m.is_pattern_property && !m.is_unreachable_definition)
                    .map(|m| self.member_signature(m))
                    .collect();
                if signatures.is_empty() {
                    "{}".to_string()
                } else {
                    format!("{{ {} }}", signatures.join("; "))
                }
            }
            AstKind::Reference { target_name } => target_name.clone(),
            AstKind::CustomType(raw) => raw.clone(),
        }
    }

    fn render_set_operation(&mut self, members: &[AstId], separator: &str) -> String {
        let mut rendered: Vec<String> = members.iter().map(|&m| self.render(m)).collect();
        match rendered.len() {
            0 if separator == "|" => "never".to_string(),
            0 => "unknown".to_string(),
            1 => rendered.remove(0),
            _ => {
                if separator == "&" {
                    rendered = rendered.iter().map(|r| parenthesize(r)).collect();
                }
                format!("({})", rendered.join(&format!(" {separator} ")))
            }
        }
    }

    /// Bounded arrays as unions of fixed-length tuples.
    ///
    /// Optional tuple elements (`[A, B?]`) admit `undefined` holes, so every
    /// allowed length from `min_items` up gets its own alternative instead.
    /// Only the longest alternative carries the spread.
    fn render_tuple(
        &mut self,
        elements: &[AstId],
        min_items: usize,
        max_items: Option<usize>,
        spread: Option<AstId>,
    ) -> String {
        let placeholder = self.options.placeholder().to_string();
        let mut params: Vec<String> = elements.iter().map(|&e| self.render(e)).collect();

        let mut spread = spread.map(|s| self.render(s));
        let declared_spread = spread.is_some();
        if max_items.is_none() && !declared_spread && min_items > params.len() {
            spread = Some(placeholder.clone());
        }
        if let Some(max) = max_items {
            if max > params.len() && !declared_spread {
                params.resize(max, placeholder);
            }
        }

        let spread = spread.map(|s| format!("...{}[]", parenthesize(&s)));
        let tuple = |params: &[String], with_spread: bool| {
            let mut parts = params.to_vec();
            if let (true, Some(s)) = (with_spread, &spread) {
                parts.push(s.clone());
            }
            format!("[{}]", parts.join(", "))
        };

        if params.len() > min_items {
            (min_items..=params.len())
                .map(|len| tuple(&params[..len], len == params.len()))
                .collect::<Vec<_>>()
                .join(" | ")
        } else {
            tuple(&params, true)
        }
    }
}

/// Wrap `text` in parentheses when a top-level `|` or `&` would otherwise
/// bind looser than the surrounding syntax.
pub fn parenthesize(text: &str) -> String {
    if has_top_level_operator(text) {
        format!("({text})")
    } else {
        text.to_string()
    }
}

fn has_top_level_operator(text: &str) -> bool {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' | '>' => depth -= 1,
            '|' | '&' if depth == 0 => return true,
            _ => {}
        }
    }
    false
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstNode;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn leaf(ast: &mut Ast, kind: AstKind) -> AstId {
        ast.push(AstNode::new(kind))
    }

    fn tuple(
        ast: &mut Ast,
        elements: Vec<AstId>,
        min_items: usize,
        max_items: Option<usize>,
        spread: Option<AstId>,
    ) -> AstId {
        leaf(
            ast,
            AstKind::Tuple {
                elements,
                min_items,
                max_items,
                spread,
            },
        )
    }

    #[test]
    fn test_tuple_min_one_max_three() {
        let mut ast = Ast::new();
        let s = leaf(&mut ast, AstKind::String);
        let t = tuple(&mut ast, vec![s], 1, Some(3), None);
        let options = CompileOptions::default();
        let mut renderer = TypeRenderer::new(&ast, &options);

        assert_eq!(
            renderer.render(t),
            "[string] | [string, unknown] | [string, unknown, unknown]"
        );
    }

    #[test]
    fn test_tuple_without_bounds_is_single() {
        let mut ast = Ast::new();
        let t = tuple(&mut ast, vec![], 0, None, None);
        let options = CompileOptions::default();
        let mut renderer = TypeRenderer::new(&ast, &options);
        assert_eq!(renderer.render(t), "[]");
    }

    #[test]
    fn test_tuple_spread_only_on_longest_alternative() {
        let mut ast = Ast::new();
        let s = leaf(&mut ast, AstKind::String);
        let n = leaf(&mut ast, AstKind::Number);
        let b = leaf(&mut ast, AstKind::Boolean);
        let t = tuple(&mut ast, vec![s, n], 1, None, Some(b));
        let options = CompileOptions::default();
        let mut renderer = TypeRenderer::new(&ast, &options);
        assert_eq!(
            renderer.render(t),
            "[string] | [string, number, ...boolean[]]"
        );
    }

    #[test]
    fn test_tuple_min_above_declared_spreads_placeholder() {
        let mut ast = Ast::new();
        let s = leaf(&mut ast, AstKind::String);
        let t = tuple(&mut ast, vec![s], 3, None, None);
        let options = CompileOptions {
            unknown_any: false,
            ..CompileOptions::default()
        };
        let mut renderer = TypeRenderer::new(&ast, &options);
        assert_eq!(renderer.render(t), "[string, ...any[]]");
    }

    #[test]
    fn test_single_member_set_operations_collapse() {
        let mut ast = Ast::new();
        let s = leaf(&mut ast, AstKind::String);
        let u = leaf(&mut ast, AstKind::Union(vec![s]));
        let i = leaf(&mut ast, AstKind::Intersection(vec![s]));
        let n = leaf(&mut ast, AstKind::Null);
        let pair = leaf(&mut ast, AstKind::Union(vec![s, n]));
        let options = CompileOptions::default();
        let mut renderer = TypeRenderer::new(&ast, &options);

        assert_eq!(renderer.render(u), "string");
        assert_eq!(renderer.render(i), "string");
        assert_eq!(renderer.render(pair), "(string | null)");
    }

    #[test]
    fn test_named_nodes_render_as_names_and_memo_is_stable() {
        let mut ast = Ast::new();
        let root = leaf(&mut ast, AstKind::Any);
        let child = leaf(&mut ast, AstKind::Array { element: root });
        ast.node_mut(root).kind = AstKind::Class {
            members: vec![ClassMember {
                key_name: "children".into(),
                node: child,
                is_required: false,
                is_pattern_property: false,
                is_unreachable_definition: false,
                is_index_signature: false,
            }],
            super_types: vec![],
        };
        ast.node_mut(root).standalone_name = Some("Tree".into());
        let options = CompileOptions::default();
        let mut renderer = TypeRenderer::new(&ast, &options);

        let first = renderer.render(child);
        assert_eq!(first, "Tree[]");
        assert_eq!(renderer.render(child), first);
        assert_eq!(renderer.render_raw(root), "{ children?: Tree[] }");
    }

    #[test]
    fn test_array_of_union_is_parenthesized() {
        let mut ast = Ast::new();
        let s = leaf(&mut ast, AstKind::String);
        let one = tuple(&mut ast, vec![s], 0, Some(1), None);
        let arr = leaf(&mut ast, AstKind::Array { element: one });
        let lit = leaf(&mut ast, AstKind::Literal(json!("a|b")));
        let lit_arr = leaf(&mut ast, AstKind::Array { element: lit });
        let options = CompileOptions::default();
        let mut renderer = TypeRenderer::new(&ast, &options);

        assert_eq!(renderer.render(arr), "([] | [string])[]");
        assert_eq!(renderer.render(lit_arr), "\"a|b\"[]");
    }

    #[test]
    fn test_member_signature_escaping_and_strict_index() {
        let mut ast = Ast::new();
        let s = leaf(&mut ast, AstKind::String);
        let options = CompileOptions {
            strict_index_signatures: true,
            ..CompileOptions::default()
        };
        let mut renderer = TypeRenderer::new(&ast, &options);
        let member = |key: &str, required: bool, is_index_signature: bool| ClassMember {
            key_name: key.into(),
            node: s,
            is_required: required,
            is_pattern_property: false,
            is_unreachable_definition: false,
            is_index_signature,
        };

        assert_eq!(
            renderer.member_signature(&member("first-name", false, false)),
            "\"first-name\"?: string"
        );
        assert_eq!(
            renderer.member_signature(&member(INDEX_SIGNATURE_KEY, true, true)),
            "[k: string]: string | undefined"
        );
        // A property that merely has the index-signature text as its key.
        assert_eq!(
            renderer.member_signature(&member(INDEX_SIGNATURE_KEY, false, false)),
            "\"[k: string]\"?: string"
        );
    }
}
