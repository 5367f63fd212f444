//! Canonical JSON emission
//!
//! Turns a resolved node graph back into a `serde_json::Value`. Pointer nodes
//! emit as `{"$ref": <path>}` where the path is recomputed from the target's
//! current graph position, so a reference stays valid after the graph has
//! been rearranged. Member order is fixed (`$ref`, `type`, `properties`,
//! `items`, `required`, `allOf`, `anyOf`, `oneOf`, `definitions`,
//! `x-abstract`, then extensions in insertion order) so equal graphs emit
//! byte-equal documents.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::debug;

use crate::document::DocumentRegistry;
use crate::error::{Result, SchemaError};
use crate::paths::find_paths;
use crate::schema::{ExtensionValue, Items, NodeId};

/// Emit a document as a self-contained JSON value: external reference
/// targets are first linked into the root's `definitions`, then every
/// pointer emits a local path.
pub fn to_json(registry: &mut DocumentRegistry, identifier: &str) -> Result<Value> {
    crate::resolver::inline_external_references(registry, identifier)?;
    emit_document(registry, identifier, false)
}

/// Emit a document preserving cross-document references: pointer nodes that
/// crossed a document boundary emit their original reference string, local
/// pointers emit recomputed paths. No inlining happens.
pub fn to_json_with_external_references(
    registry: &mut DocumentRegistry,
    identifier: &str,
) -> Result<Value> {
    emit_document(registry, identifier, true)
}

fn emit_document(
    registry: &DocumentRegistry,
    identifier: &str,
    keep_external: bool,
) -> Result<Value> {
    let root = match registry.document(identifier) {
        Some(doc) => doc.root,
        None => {
            return Err(SchemaError::InvalidDocument {
                identifier: identifier.to_string(),
                reason: "document not loaded".to_string(),
            })
        }
    };
    debug!(identifier, keep_external, "emitting document");

    // Every structurally reachable pointer needs its target's path, except
    // external pointers when those re-emit their raw reference.
    let mut targets: HashSet<NodeId> = HashSet::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut pending = vec![root];
    while let Some(id) = pending.pop() {
        if !visited.insert(id) {
            continue;
        }
        let node = registry.node(id);
        if let Some(target) = node.resolved {
            if !(keep_external && node.document_path.is_some()) {
                targets.insert(target);
            }
        }
        pending.extend(node.children());
    }
    if keep_external {
        // A local pointer can still terminate in a foreign document through
        // an indirection chain; without inlining that terminus has no local
        // path, so the pointer re-emits its preserved reference instead.
        targets.retain(|target| visited.contains(target));
    }

    let paths = find_paths(registry.arena(), root, &targets)?;
    Ok(emit_node(registry, root, &paths, keep_external))
}

fn emit_node(
    registry: &DocumentRegistry,
    id: NodeId,
    paths: &std::collections::HashMap<NodeId, String>,
    keep_external: bool,
) -> Value {
    let node = registry.node(id);

    // Opaque non-object schema value, kept verbatim by the parser.
    if let Some(raw) = &node.opaque {
        return raw.clone();
    }

    let mut out = Map::new();

    if let Some(reference) = &node.reference {
        let raw = keep_external && node.document_path.is_some();
        let emitted = if raw {
            reference.clone()
        } else {
            match node.resolved.and_then(|target| paths.get(&target)) {
                Some(path) => path.clone(),
                None => reference.clone(),
            }
        };
        out.insert("$ref".to_string(), Value::String(emitted));
    }

    match node.types.len() {
        0 => {}
        1 => {
            if let Some(ty) = node.types.iter().next() {
                out.insert("type".to_string(), Value::String(ty.as_str().to_string()));
            }
        }
        _ => {
            let entries = node
                .types
                .iter()
                .map(|ty| Value::String(ty.as_str().to_string()))
                .collect();
            out.insert("type".to_string(), Value::Array(entries));
        }
    }

    if !node.properties.is_empty() {
        let mut members = Map::new();
        for (name, child) in &node.properties {
            members.insert(name.clone(), emit_node(registry, *child, paths, keep_external));
        }
        out.insert("properties".to_string(), Value::Object(members));
    }

    match &node.items {
        Items::None => {}
        Items::Single(child) => {
            out.insert(
                "items".to_string(),
                emit_node(registry, *child, paths, keep_external),
            );
        }
        Items::Tuple(children) => {
            let entries = children
                .iter()
                .map(|child| emit_node(registry, *child, paths, keep_external))
                .collect();
            out.insert("items".to_string(), Value::Array(entries));
        }
    }

    if !node.required.is_empty() {
        let names = node
            .required
            .iter()
            .map(|name| Value::String(name.clone()))
            .collect();
        out.insert("required".to_string(), Value::Array(names));
    }

    for (keyword, children) in [
        ("allOf", &node.all_of),
        ("anyOf", &node.any_of),
        ("oneOf", &node.one_of),
    ] {
        if !children.is_empty() {
            let entries = children
                .iter()
                .map(|child| emit_node(registry, *child, paths, keep_external))
                .collect();
            out.insert(keyword.to_string(), Value::Array(entries));
        }
    }

    if !node.definitions.is_empty() {
        let mut members = Map::new();
        for (name, child) in &node.definitions {
            members.insert(name.clone(), emit_node(registry, *child, paths, keep_external));
        }
        out.insert("definitions".to_string(), Value::Object(members));
    }

    if node.is_abstract {
        out.insert("x-abstract".to_string(), Value::Bool(true));
    }

    for (key, value) in &node.extensions {
        match value {
            ExtensionValue::Node(child) => {
                out.insert(key.clone(), emit_node(registry, *child, paths, keep_external));
            }
            ExtensionValue::Value(raw) => {
                out.insert(key.clone(), raw.clone());
            }
        }
    }

    Value::Object(out)
}
