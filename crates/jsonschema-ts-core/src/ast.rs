//! Typed intermediate representation between the schema graph and the
//! generated text.
//!
//! Nodes live in an arena ([`Ast`]) and are addressed by [`AstId`]. The
//! parser creates one node per linked schema node, so the id carries the
//! schema's identity: the generator memoizes rendering and guards its
//! traversals by id, never by structural equality.

use serde_json::Value;

/// Stable identity of an AST node within one compile call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AstId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct EnumEntry {
    pub label: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMember {
    pub key_name: String,
    pub node: AstId,
    pub is_required: bool,
    pub is_pattern_property: bool,
    pub is_unreachable_definition: bool,
    /// Rendered as `[k: string]` rather than as a quoted property key.
    pub is_index_signature: bool,
}

/// The closed set of node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum AstKind {
    Any,
    Unknown,
    Null,
    Boolean,
    Number,
    String,
    Literal(Value),
    Object,
    Array {
        element: AstId,
    },
    /// `max_items: None` means unbounded.
    Tuple {
        elements: Vec<AstId>,
        min_items: usize,
        max_items: Option<usize>,
        spread: Option<AstId>,
    },
    Union(Vec<AstId>),
    Intersection(Vec<AstId>),
    Enum(Vec<EnumEntry>),
    Class {
        members: Vec<ClassMember>,
        super_types: Vec<AstId>,
    },
    Reference {
        target_name: String,
    },
    CustomType(String),
}

impl AstKind {
    /// Direct children in declaration order.
    pub fn children(&self) -> Vec<AstId> {
        match self {
            AstKind::Array { element } => vec![*element],
            AstKind::Tuple {
                elements, spread, ..
            } => elements.iter().copied().chain(*spread).collect(),
            AstKind::Union(members) | AstKind::Intersection(members) => members.clone(),
            AstKind::Class {
                members,
                super_types,
            } => members
                .iter()
                .map(|m| m.node)
                .chain(super_types.iter().copied())
                .collect(),
            AstKind::Any
            | AstKind::Unknown
            | AstKind::Null
            | AstKind::Boolean
            | AstKind::Number
            | AstKind::String
            | AstKind::Literal(_)
            | AstKind::Object
            | AstKind::Enum(_)
            | AstKind::Reference { .. }
            | AstKind::CustomType(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub kind: AstKind,
    /// Present when the node is emitted as a top-level declaration.
    pub standalone_name: Option<String>,
    /// Field name under which the node sits inside a class.
    pub key_name: Option<String>,
    /// Doc text carried to the output.
    pub comment: Option<String>,
    /// Pointer of the schema the node was parsed from.
    pub origin: Option<String>,
}

impl AstNode {
    pub fn new(kind: AstKind) -> Self {
        Self {
            kind,
            standalone_name: None,
            key_name: None,
            comment: None,
            origin: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    pub nodes: Vec<AstNode>,
    pub root: AstId,
}

impl Ast {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: AstId(0),
        }
    }

    pub fn push(&mut self, node: AstNode) -> AstId {
        self.nodes.push(node);
        AstId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: AstId) -> &AstNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: AstId) -> &mut AstNode {
        &mut self.nodes[id.0]
    }

    pub fn kind(&self, id: AstId) -> &AstKind {
        &self.nodes[id.0].kind
    }

    pub fn standalone_name(&self, id: AstId) -> Option<&str> {
        self.nodes[id.0].standalone_name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes reachable from the root, each once, in depth-first preorder.
    pub fn reachable(&self) -> Vec<AstId> {
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if id.0 >= self.nodes.len() || visited[id.0] {
                continue;
            }
            visited[id.0] = true;
            order.push(id);
            let mut children = self.kind(id).children();
            children.reverse();
            stack.extend(children);
        }
        order
    }
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}
