//! Schema node model and arena storage
//!
//! A document is a tree of [`SchemaNode`]s allocated in a [`SchemaArena`] and
//! addressed by stable [`NodeId`] handles. Handles give every node an identity
//! independent of its structure, which is what reference resolution and path
//! discovery traverse by: two structurally identical nodes at different graph
//! positions are distinct, and a pointer node links to its target by handle
//! rather than by copy, so cycles stay finite.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// JSON type classifier for a schema node
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    /// The keyword as it appears in the `type` field
    pub fn as_str(&self) -> &'static str {
        match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }

    /// Parse a `type` keyword value
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "null" => Some(JsonType::Null),
            "boolean" => Some(JsonType::Boolean),
            "integer" => Some(JsonType::Integer),
            "number" => Some(JsonType::Number),
            "string" => Some(JsonType::String),
            "array" => Some(JsonType::Array),
            "object" => Some(JsonType::Object),
            _ => None,
        }
    }
}

/// Stable handle to a node in a [`SchemaArena`].
///
/// Handles are only produced by [`SchemaArena::alloc`] and the arena is
/// append-only, so a handle never dangles within its session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Arena index of this handle
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Shape of the `items` keyword, preserved for round-trip emission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Items {
    #[default]
    None,
    /// `"items": { ... }`
    Single(NodeId),
    /// `"items": [ ... ]`
    Tuple(Vec<NodeId>),
}

impl Items {
    /// Child handles in index order
    pub fn ids(&self) -> Vec<NodeId> {
        match self {
            Items::None => Vec::new(),
            Items::Single(id) => vec![*id],
            Items::Tuple(ids) => ids.clone(),
        }
    }
}

/// Value of a keyword the structural model does not recognize.
///
/// An unknown keyword whose value is a JSON object is parsed as a child
/// schema node so references can address into it; anything else is kept
/// verbatim and round-trips unchanged.
#[derive(Debug, Clone)]
pub enum ExtensionValue {
    Node(NodeId),
    Value(serde_json::Value),
}

/// One fragment of a JSON Schema document.
///
/// A node with a non-null `reference` is a *pointer node*: after resolution
/// it carries a `resolved` link to exactly one structural target, and its own
/// structural fields are ignored for semantic purposes (the raw reference
/// string is preserved for re-emission).
#[derive(Debug, Clone, Default)]
pub struct SchemaNode {
    /// Type classifier; empty set means unconstrained ("any")
    pub types: BTreeSet<JsonType>,
    /// Raw `$ref` string, verbatim from the source
    pub reference: Option<String>,
    /// Live link to the structural target, set by the resolver
    pub resolved: Option<NodeId>,
    /// Source document of the target, as observed from the referencing
    /// document (e.g. `./collection.json`). Set on external pointer nodes
    /// and on definitions imported by inlining.
    pub document_path: Option<String>,
    /// `properties`, in insertion order
    pub properties: IndexMap<String, NodeId>,
    /// `items`
    pub items: Items,
    /// `allOf`
    pub all_of: Vec<NodeId>,
    /// `anyOf`
    pub any_of: Vec<NodeId>,
    /// `oneOf`
    pub one_of: Vec<NodeId>,
    /// `definitions` (also accepts `$defs` on input), in insertion order
    pub definitions: IndexMap<String, NodeId>,
    /// `required` property names
    pub required: Vec<String>,
    /// `x-abstract` extension marker
    pub is_abstract: bool,
    /// Unrecognized keywords, in insertion order
    pub extensions: IndexMap<String, ExtensionValue>,
    /// Verbatim non-object schema value (e.g. a boolean schema). Set instead
    /// of the structural fields, which stay empty.
    pub opaque: Option<serde_json::Value>,
}

impl SchemaNode {
    /// Is this a pointer node?
    pub fn is_pointer(&self) -> bool {
        self.reference.is_some()
    }

    /// Does the classifier contain `ty`?
    pub fn has_type(&self, ty: JsonType) -> bool {
        self.types.contains(&ty)
    }

    /// All structural child handles: definitions, properties, items,
    /// composition keywords, and extension schema nodes. Resolved links are
    /// deliberately not children; traversal is structural.
    pub fn children(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        out.extend(self.definitions.values().copied());
        out.extend(self.properties.values().copied());
        out.extend(self.items.ids());
        out.extend(self.all_of.iter().copied());
        out.extend(self.any_of.iter().copied());
        out.extend(self.one_of.iter().copied());
        for value in self.extensions.values() {
            if let ExtensionValue::Node(id) = value {
                out.push(*id);
            }
        }
        out
    }
}

/// Append-only node storage for one resolution session
#[derive(Debug, Default)]
pub struct SchemaArena {
    nodes: Vec<SchemaNode>,
}

impl SchemaArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node, returning its stable handle
    pub fn alloc(&mut self, node: SchemaNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Get a node by handle
    pub fn get(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    /// Get a node mutably by handle
    pub fn get_mut(&mut self, id: NodeId) -> &mut SchemaNode {
        &mut self.nodes[id.0]
    }

    /// Follow a pointer node to its structural target; identity for
    /// structural nodes. Resolution collapses indirection chains, so a
    /// single hop reaches the terminus.
    pub fn actual(&self, id: NodeId) -> &SchemaNode {
        let node = self.get(id);
        match node.resolved {
            Some(target) => self.get(target),
            None => node,
        }
    }

    /// Handle of the structural target a node stands for
    pub fn actual_id(&self, id: NodeId) -> NodeId {
        self.get(id).resolved.unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
