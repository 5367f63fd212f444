//! Parsing JSON documents into arena-backed schema nodes
//!
//! The parser is tolerant: every keyword the structural model recognizes is
//! lifted into typed fields, and everything else lands in the extension map
//! so it round-trips unchanged. An unknown keyword whose value is a JSON
//! object is parsed as a child schema node, which is what lets references
//! address into extension data (`#/definitions/collection/bar`).
//!
//! Each parsed node is recorded in a per-document cache keyed by its
//! JSON-Pointer path, so the resolver can revisit nodes in O(1).

use std::collections::HashMap;

use serde_json::Value;

use crate::error::Result;
use crate::paths::escape_segment;
use crate::schema::{ExtensionValue, Items, JsonType, NodeId, SchemaArena, SchemaNode};

/// Parses one document's JSON into the shared arena.
pub struct Parser<'a> {
    arena: &'a mut SchemaArena,
    pointer_cache: HashMap<String, NodeId>,
}

impl<'a> Parser<'a> {
    pub fn new(arena: &'a mut SchemaArena) -> Self {
        Self {
            arena,
            pointer_cache: HashMap::new(),
        }
    }

    /// Parse a document root, returning the root handle and the
    /// pointer-path cache of every node parsed along the way.
    pub fn parse_root(mut self, value: &Value) -> Result<(NodeId, HashMap<String, NodeId>)> {
        let root = self.parse_node(value, "#");
        Ok((root, self.pointer_cache))
    }

    fn parse_node(&mut self, value: &Value, pointer: &str) -> NodeId {
        // Allocate before descending so the cache entry exists up front.
        let id = self.arena.alloc(SchemaNode::default());
        self.pointer_cache.insert(pointer.to_string(), id);

        let Some(object) = value.as_object() else {
            // Non-object schema values (e.g. boolean schemas) carry no
            // structure we model; keep them verbatim.
            self.arena.get_mut(id).opaque = Some(value.clone());
            return id;
        };

        let mut node = SchemaNode::default();
        for (key, val) in object {
            match key.as_str() {
                "$ref" => match val.as_str() {
                    Some(reference) => node.reference = Some(reference.to_string()),
                    None => self.keep_raw(&mut node, key, val),
                },
                "type" => {
                    if !self.parse_types(&mut node, val) {
                        self.keep_raw(&mut node, key, val);
                    }
                }
                "properties" => match self.parse_keyed(val, pointer, "properties") {
                    Some(children) => node.properties = children,
                    None => self.keep_raw(&mut node, key, val),
                },
                "definitions" | "$defs" => match self.parse_keyed(val, pointer, key) {
                    Some(children) => node.definitions.extend(children),
                    None => self.keep_raw(&mut node, key, val),
                },
                "items" => match val {
                    Value::Object(_) => {
                        let child = self.parse_node(val, &format!("{}/items", pointer));
                        node.items = Items::Single(child);
                    }
                    Value::Array(entries) => {
                        let children = entries
                            .iter()
                            .enumerate()
                            .map(|(i, entry)| {
                                self.parse_node(entry, &format!("{}/items/{}", pointer, i))
                            })
                            .collect();
                        node.items = Items::Tuple(children);
                    }
                    _ => self.keep_raw(&mut node, key, val),
                },
                "allOf" | "anyOf" | "oneOf" => match self.parse_sequence(val, pointer, key) {
                    Some(children) => match key.as_str() {
                        "allOf" => node.all_of = children,
                        "anyOf" => node.any_of = children,
                        _ => node.one_of = children,
                    },
                    None => self.keep_raw(&mut node, key, val),
                },
                "required" => match parse_string_array(val) {
                    Some(names) => node.required = names,
                    None => self.keep_raw(&mut node, key, val),
                },
                "x-abstract" => match val.as_bool() {
                    Some(flag) => node.is_abstract = flag,
                    None => self.keep_raw(&mut node, key, val),
                },
                _ => {
                    if val.is_object() {
                        let child_pointer =
                            format!("{}/{}", pointer, escape_segment(key));
                        let child = self.parse_node(val, &child_pointer);
                        node.extensions
                            .insert(key.clone(), ExtensionValue::Node(child));
                    } else {
                        self.keep_raw(&mut node, key, val);
                    }
                }
            }
        }

        *self.arena.get_mut(id) = node;
        id
    }

    fn keep_raw(&mut self, node: &mut SchemaNode, key: &str, val: &Value) {
        node.extensions
            .insert(key.to_string(), ExtensionValue::Value(val.clone()));
    }

    fn parse_types(&mut self, node: &mut SchemaNode, val: &Value) -> bool {
        match val {
            Value::String(s) => match JsonType::from_keyword(s) {
                Some(ty) => {
                    node.types.insert(ty);
                    true
                }
                None => false,
            },
            Value::Array(entries) => {
                let mut parsed = Vec::with_capacity(entries.len());
                for entry in entries {
                    match entry.as_str().and_then(JsonType::from_keyword) {
                        Some(ty) => parsed.push(ty),
                        None => return false,
                    }
                }
                node.types.extend(parsed);
                true
            }
            _ => false,
        }
    }

    /// Parse a map keyword (`properties`, `definitions`). Returns None only
    /// when the value is not an object; individual non-object entries parse
    /// as opaque nodes so one odd member never hides its siblings'
    /// references.
    fn parse_keyed(
        &mut self,
        val: &Value,
        pointer: &str,
        keyword: &str,
    ) -> Option<indexmap::IndexMap<String, NodeId>> {
        let object = val.as_object()?;
        let mut children = indexmap::IndexMap::with_capacity(object.len());
        for (name, child_val) in object {
            let child_pointer =
                format!("{}/{}/{}", pointer, keyword, escape_segment(name));
            let child = self.parse_node(child_val, &child_pointer);
            children.insert(name.clone(), child);
        }
        Some(children)
    }

    fn parse_sequence(
        &mut self,
        val: &Value,
        pointer: &str,
        keyword: &str,
    ) -> Option<Vec<NodeId>> {
        let entries = val.as_array()?;
        Some(
            entries
                .iter()
                .enumerate()
                .map(|(i, entry)| {
                    self.parse_node(entry, &format!("{}/{}/{}", pointer, keyword, i))
                })
                .collect(),
        )
    }
}

fn parse_string_array(val: &Value) -> Option<Vec<String>> {
    let entries = val.as_array()?;
    entries
        .iter()
        .map(|v| v.as_str().map(String::from))
        .collect()
}
