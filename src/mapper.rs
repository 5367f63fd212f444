//! Type-graph-to-schema mapping
//!
//! Builds an in-memory schema document from a caller-described type graph.
//! The caller implements [`TypeProvider`] over its own type identifiers; the
//! mapper walks usages from a root type, registers each named type as a
//! `definitions` entry exactly once, and emits every usage as an
//! already-resolved pointer node. Recursive types stay finite for the same
//! reason cyclic documents do: the second encounter links by handle instead
//! of descending again.

use std::collections::HashMap;
use std::hash::Hash;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::document::DocumentRegistry;
use crate::paths::escape_segment;
use crate::schema::{ExtensionValue, Items, JsonType, NodeId, SchemaArena, SchemaNode};

/// Shape of one type in the caller's graph.
#[derive(Debug, Clone)]
pub enum TypeShape<I> {
    /// A scalar mapping directly onto a JSON type
    Primitive(JsonType),
    /// A sequence of the given element type
    Array(I),
    /// A string-keyed map of the given value type
    Map(I),
    /// A named composite with members
    Object(Vec<Member<I>>),
    /// A named closed set of string values
    Enum(Vec<String>),
}

/// One member of an object type.
#[derive(Debug, Clone)]
pub struct Member<I> {
    pub name: String,
    pub ty: I,
    /// Required members land in the schema's `required` list
    pub required: bool,
    /// Ignored members are omitted from the schema entirely
    pub ignored: bool,
}

/// Everything the mapper needs to know about one type.
#[derive(Debug, Clone)]
pub struct TypeDescription<I> {
    /// Definition name; only meaningful for object and enum shapes
    pub name: String,
    /// Emitted as the `x-abstract` flag
    pub is_abstract: bool,
    pub shape: TypeShape<I>,
}

/// Capability trait over a caller's type graph.
pub trait TypeProvider {
    type Id: Clone + Eq + Hash;

    fn describe(&self, id: &Self::Id) -> TypeDescription<Self::Id>;
}

/// Map a type graph rooted at `root` into a schema document.
///
/// Returns the session holding the synthesized document (registered under
/// the empty identifier) and its root node, ready for serialization.
pub fn map_type_graph<P: TypeProvider>(provider: &P, root: &P::Id) -> (DocumentRegistry, NodeId) {
    let mut registry = DocumentRegistry::with_file_loader();
    let (root_node, definitions) = {
        let mut mapper = Mapper {
            provider,
            arena: &mut registry.arena,
            named: HashMap::new(),
            definitions: IndexMap::new(),
        };
        let root_node = mapper.usage(root);
        (root_node, mapper.definitions)
    };
    debug!(definitions = definitions.len(), "mapped type graph");
    registry.arena.get_mut(root_node).definitions = definitions;
    registry.add_synthesized("", root_node);
    (registry, root_node)
}

struct Mapper<'a, P: TypeProvider> {
    provider: &'a P,
    arena: &'a mut SchemaArena,
    /// Named types already registered, by type identity
    named: HashMap<P::Id, (NodeId, String)>,
    /// Definition entries in registration order
    definitions: IndexMap<String, NodeId>,
}

impl<P: TypeProvider> Mapper<'_, P> {
    /// Emit one usage of a type: anonymous shapes inline, named shapes
    /// become resolved pointer nodes into `definitions`.
    fn usage(&mut self, id: &P::Id) -> NodeId {
        let description = self.provider.describe(id);
        match description.shape {
            TypeShape::Primitive(ty) => self.arena.alloc(SchemaNode {
                types: [ty].into_iter().collect(),
                ..Default::default()
            }),
            TypeShape::Array(ref elem) => {
                let child = self.usage(elem);
                self.arena.alloc(SchemaNode {
                    types: [JsonType::Array].into_iter().collect(),
                    items: Items::Single(child),
                    ..Default::default()
                })
            }
            TypeShape::Map(ref elem) => {
                let child = self.usage(elem);
                let mut node = SchemaNode {
                    types: [JsonType::Object].into_iter().collect(),
                    ..Default::default()
                };
                node.extensions.insert(
                    "additionalProperties".to_string(),
                    ExtensionValue::Node(child),
                );
                self.arena.alloc(node)
            }
            TypeShape::Object(_) | TypeShape::Enum(_) => {
                let (target, name) = self.definition(id, description);
                self.arena.alloc(SchemaNode {
                    reference: Some(format!("#/definitions/{}", escape_segment(&name))),
                    resolved: Some(target),
                    ..Default::default()
                })
            }
        }
    }

    /// Register a named type's definition, once per type identity. The
    /// placeholder is allocated and recorded before the body is built so
    /// self-referential members link back to it.
    fn definition(&mut self, id: &P::Id, description: TypeDescription<P::Id>) -> (NodeId, String) {
        if let Some((node, name)) = self.named.get(id) {
            return (*node, name.clone());
        }
        let node = self.arena.alloc(SchemaNode::default());
        let name = self.unique_name(&description.name);
        self.definitions.insert(name.clone(), node);
        self.named.insert(id.clone(), (node, name.clone()));

        let mut body = SchemaNode::default();
        body.is_abstract = description.is_abstract;
        match description.shape {
            TypeShape::Object(members) => {
                body.types.insert(JsonType::Object);
                for member in members {
                    if member.ignored {
                        continue;
                    }
                    let child = self.usage(&member.ty);
                    body.properties.insert(member.name.clone(), child);
                    if member.required {
                        body.required.push(member.name);
                    }
                }
            }
            TypeShape::Enum(values) => {
                body.types.insert(JsonType::String);
                body.extensions.insert(
                    "enum".to_string(),
                    ExtensionValue::Value(Value::Array(
                        values.into_iter().map(Value::String).collect(),
                    )),
                );
            }
            _ => {}
        }
        *self.arena.get_mut(node) = body;
        (node, name)
    }

    /// Distinct type identities with the same declared name get numeric
    /// suffixes, first come first served.
    fn unique_name(&self, base: &str) -> String {
        if !self.definitions.contains_key(base) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}{}", base, n);
            if !self.definitions.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}
