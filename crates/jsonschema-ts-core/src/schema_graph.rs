//! Arena of linked schema nodes.
//!
//! The linker turns the dereferenced document into a [`SchemaGraph`]: one
//! [`SchemaNode`] per logical schema location, addressed by [`SchemaId`].
//! Every place that refers to the same schema (a `$ref`, a diamond through
//! two parents, a cycle back to an ancestor) holds the same id, so later
//! stages key their visited sets and memo tables by id rather than by value.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::naming::{name_from_ref, to_safe_string};

/// Stable identity of a schema node within one compile call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub usize);

/// `additionalProperties` / `additionalItems`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Additional {
    Allowed(bool),
    Schema(SchemaId),
}

/// `items`: one schema for every element, or one per position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Items {
    Single(SchemaId),
    Tuple(Vec<SchemaId>),
}

#[derive(Debug, Clone, Default)]
pub struct SchemaNode {
    /// Canonical JSON Pointer of this node in the bundled document.
    pub pointer: String,
    /// Property key under which the node was first reached.
    pub key_name: Option<String>,
    /// `definitions` / `$defs` key, if the node lives there.
    pub definition_name: Option<String>,
    /// Name suggested by the key path (`tags` → `TagsItem`).
    pub name_hint: Option<String>,
    /// First parent the node was reached from.
    pub parent: Option<SchemaId>,
    /// The node lies on at least one entry of [`SchemaGraph::cycles`].
    pub cyclic: bool,
    /// A `$ref` the linker could not follow.
    pub unresolved_ref: Option<String>,
    /// `true` / `false` schemas.
    pub boolean: Option<bool>,
    /// Every keyword that does not hold a subschema.
    pub keywords: Map<String, Value>,
    pub properties: IndexMap<String, SchemaId>,
    pub pattern_properties: IndexMap<String, SchemaId>,
    pub additional_properties: Option<Additional>,
    pub definitions: IndexMap<String, SchemaId>,
    pub items: Option<Items>,
    pub additional_items: Option<Additional>,
    pub all_of: Vec<SchemaId>,
    /// Every `allOf` member was a bare `$ref`.
    pub all_of_by_ref: bool,
    pub any_of: Vec<SchemaId>,
    pub one_of: Vec<SchemaId>,
    /// Draft-3 `extends`.
    pub extends: Vec<SchemaId>,
    /// Set by the normalizer.
    pub standalone_name: Option<String>,
}

impl SchemaNode {
    pub fn new(pointer: &str) -> Self {
        Self {
            pointer: pointer.to_string(),
            ..Self::default()
        }
    }

    fn keyword_str(&self, keyword: &str) -> Option<&str> {
        self.keywords.get(keyword).and_then(Value::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.keyword_str("title")
    }

    pub fn description(&self) -> Option<&str> {
        self.keyword_str("description")
    }

    pub fn ts_type(&self) -> Option<&str> {
        self.keyword_str("tsType")
    }

    /// Names listed under `type`, in order.
    pub fn types(&self) -> Vec<&str> {
        match self.keywords.get("type") {
            Some(Value::String(t)) => vec![t.as_str()],
            Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.types().contains(&name)
    }

    pub fn enum_values(&self) -> Option<&Vec<Value>> {
        self.keywords.get("enum").and_then(Value::as_array)
    }

    /// Names listed under `required` (draft-4 style).
    pub fn required(&self) -> Vec<&str> {
        match self.keywords.get("required") {
            Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Draft-3 `required: true` on the property itself.
    pub fn required_flag(&self) -> bool {
        matches!(self.keywords.get("required"), Some(Value::Bool(true)))
    }

    pub fn min_items(&self) -> Option<u64> {
        self.keywords.get("minItems").and_then(Value::as_u64)
    }

    pub fn max_items(&self) -> Option<u64> {
        self.keywords.get("maxItems").and_then(Value::as_u64)
    }

    pub fn is_array_shaped(&self) -> bool {
        self.has_type("array") || self.items.is_some()
    }

    pub fn is_object_shaped(&self) -> bool {
        self.has_type("object") || self.is_class_shaped() || self.additional_properties.is_some()
    }

    /// Object schemas that carry members and so become classes.
    pub fn is_class_shaped(&self) -> bool {
        !self.properties.is_empty()
            || !self.pattern_properties.is_empty()
            || matches!(
                self.additional_properties,
                Some(Additional::Schema(_)) | Some(Additional::Allowed(true))
            )
    }

    pub fn is_enum_shaped(&self) -> bool {
        self.enum_values().is_some()
    }
}

/// Linked schema document.
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    pub nodes: Vec<SchemaNode>,
    pub root: SchemaId,
    /// Canonical target pointer → first `$ref` text that reached it.
    pub dereferenced_paths: IndexMap<String, String>,
    /// Every cycle the linker closed, as the traversal-stack segment from
    /// the node it re-entered down to the node that pointed back at it.
    pub cycles: Vec<Vec<SchemaId>>,
}

impl SchemaGraph {
    pub fn node(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: SchemaId) -> &mut SchemaNode {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = SchemaId> {
        (0..self.nodes.len()).map(SchemaId)
    }

    /// Every subschema of `id`, in keyword order.
    pub fn children(&self, id: SchemaId) -> Vec<SchemaId> {
        let node = self.node(id);
        let mut out: Vec<SchemaId> = Vec::new();
        out.extend(node.properties.values());
        out.extend(node.pattern_properties.values());
        if let Some(Additional::Schema(child)) = node.additional_properties {
            out.push(child);
        }
        out.extend(node.definitions.values());
        match &node.items {
            Some(Items::Single(child)) => out.push(*child),
            Some(Items::Tuple(children)) => out.extend(children),
            None => {}
        }
        if let Some(Additional::Schema(child)) = node.additional_items {
            out.push(child);
        }
        out.extend(&node.all_of);
        out.extend(&node.any_of);
        out.extend(&node.one_of);
        out.extend(&node.extends);
        out
    }

    /// Name suggested by the `$ref` text that reached this node.
    pub fn ref_name(&self, id: SchemaId) -> Option<String> {
        self.dereferenced_paths
            .get(&self.node(id).pointer)
            .and_then(|reference| name_from_ref(reference))
    }

    /// Name the schema gives itself: `title`, `$id`, definition key, or
    /// the `$ref` that reached it.
    pub fn explicit_name(&self, id: SchemaId) -> Option<String> {
        let node = self.node(id);
        let candidates = [
            node.title().map(to_safe_string),
            node.keyword_str("$id").and_then(name_from_ref),
            node.definition_name.as_deref().map(to_safe_string),
            self.ref_name(id),
        ];
        candidates.into_iter().flatten().find(|name| !name.is_empty())
    }

    /// Best name available for `id` before normalization.
    ///
    /// The root falls back to its `name` keyword and then to `root_name`;
    /// other nodes fall back to their key-path hint.
    pub fn derivable_name(&self, id: SchemaId, root_name: &str) -> Option<String> {
        let node = self.node(id);
        let candidates = if id == self.root {
            [
                node.title().map(to_safe_string),
                node.keyword_str("$id").and_then(name_from_ref),
                node.keyword_str("name").map(to_safe_string),
                Some(to_safe_string(root_name)),
            ]
        } else {
            [
                self.explicit_name(id),
                node.name_hint.as_deref().map(to_safe_string),
                None,
                None,
            ]
        };
        candidates.into_iter().flatten().find(|name| !name.is_empty())
    }
}
