//! Reference resolution
//!
//! Walks every schema node reachable from a document root and turns each
//! `$ref` string into a live arena link. Local pointers navigate the current
//! document; cross-document references load (and transitively resolve) the
//! target document through the registry; indirection chains are followed to
//! their structural terminus.
//!
//! Cycle discipline: a chain that revisits a *pointer* node is an error; a
//! chain that reaches a *structural* node terminates there, however many
//! hops preceded it, and a structural node whose descendant refers back to
//! it is a legal cycle — resolution reuses the existing link instead of
//! recursing.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, trace};

use crate::document::{resolve_path, DocumentRegistry};
use crate::error::{Result, SchemaError};
use crate::paths::unescape_segment;
use crate::schema::{ExtensionValue, Items, NodeId};

/// Resolve every reference reachable from `identifier`'s root.
///
/// All-or-nothing: the first failure aborts the session's resolution and no
/// partially-linked graph is exposed.
pub fn resolve_document(registry: &mut DocumentRegistry, identifier: &str) -> Result<()> {
    // Guards mutual recursion between documents that reference each other.
    if !registry.resolved.insert(identifier.to_string()) {
        return Ok(());
    }
    let root = match registry.document(identifier) {
        Some(doc) => doc.root,
        None => {
            return Err(SchemaError::InvalidDocument {
                identifier: identifier.to_string(),
                reason: "document not loaded".to_string(),
            })
        }
    };
    debug!(identifier, "resolving document references");

    let mut pending = vec![root];
    let mut visited: HashSet<NodeId> = HashSet::new();
    while let Some(id) = pending.pop() {
        if !visited.insert(id) {
            continue;
        }
        let needs_resolution = {
            let node = registry.arena.get(id);
            node.reference.is_some() && node.resolved.is_none()
        };
        if needs_resolution {
            let mut chain = Vec::new();
            resolve_reference(registry, identifier, id, &mut chain)?;
        }
        pending.extend(registry.arena.get(id).children());
    }
    Ok(())
}

/// Resolve one pointer node, returning the structural terminus of its chain.
/// `chain` holds the `(document, reference)` pairs currently being followed.
fn resolve_reference(
    registry: &mut DocumentRegistry,
    document: &str,
    id: NodeId,
    chain: &mut Vec<(String, String)>,
) -> Result<NodeId> {
    let Some(reference) = registry.arena.get(id).reference.clone() else {
        return Ok(id);
    };
    if let Some(existing) = registry.arena.get(id).resolved {
        return Ok(existing);
    }

    let key = (document.to_string(), reference.clone());
    if chain.contains(&key) {
        return Err(SchemaError::CircularReference {
            reference,
            document: document.to_string(),
        });
    }
    chain.push(key);
    trace!(%reference, document, "resolving reference");

    let (document_part, pointer_part) = split_reference(&reference);

    let (target_document, target_root) = match document_part {
        None => {
            let root = match registry.document(document) {
                Some(doc) => doc.root,
                None => {
                    return Err(SchemaError::InvalidDocument {
                        identifier: document.to_string(),
                        reason: "document not loaded".to_string(),
                    })
                }
            };
            (document.to_string(), root)
        }
        Some(path) => {
            let target_identifier = resolve_path(document, path);
            let already_loaded = registry.document(&target_identifier).is_some();
            let root = registry.load(&target_identifier)?;
            if !already_loaded {
                // Record how this document was first reached.
                if let Some(doc) = registry.document_mut(&target_identifier) {
                    doc.document_path = Some(path.to_string());
                }
            }
            // Resolve the loaded document transitively so multi-hop
            // references land on structural nodes.
            resolve_document(registry, &target_identifier)?;
            (target_identifier, root)
        }
    };

    let target = match pointer_part {
        None | Some("") | Some("/") => target_root,
        Some(pointer) => navigate(registry, &target_document, pointer).ok_or_else(|| {
            SchemaError::ReferenceNotFound {
                reference: reference.clone(),
                document: document.to_string(),
            }
        })?,
    };

    // Follow indirection to its structural terminus.
    let terminus = if registry.arena.get(target).is_pointer() {
        resolve_reference(registry, &target_document, target, chain)?
    } else {
        target
    };

    let node = registry.arena.get_mut(id);
    node.resolved = Some(terminus);
    if let Some(path) = document_part {
        node.document_path = Some(path.to_string());
    }
    chain.pop();
    Ok(terminus)
}

/// Split a reference string into its document and pointer parts.
/// `#/a/b` → (None, Some("/a/b")); `x.json#/a` → (Some("x.json"), Some("/a"));
/// `x.json` → (Some("x.json"), None).
fn split_reference(reference: &str) -> (Option<&str>, Option<&str>) {
    match reference.split_once('#') {
        Some((doc, pointer)) => {
            let doc = if doc.is_empty() { None } else { Some(doc) };
            (doc, Some(pointer))
        }
        None => (Some(reference), None),
    }
}

/// Look up the node a JSON Pointer addresses within a document.
fn navigate(registry: &DocumentRegistry, identifier: &str, pointer: &str) -> Option<NodeId> {
    let doc = registry.document(identifier)?;
    if pointer.is_empty() || pointer == "/" {
        return Some(doc.root);
    }
    if let Some(id) = doc.node_at(&format!("#{}", pointer)) {
        return Some(id);
    }

    // Structural descent for spellings that differ from the cached parse
    // paths (alternate escaping, $defs aliasing).
    let mut cursor = Cursor::Node(doc.root);
    for raw in pointer.trim_start_matches('/').split('/') {
        let segment = unescape_segment(raw);
        cursor = step(registry, cursor, &segment)?;
    }
    match cursor {
        Cursor::Node(id) => Some(id),
        _ => None,
    }
}

enum Cursor {
    /// At a schema node
    Node(NodeId),
    /// Entered a keyed member; awaiting the key segment
    Keyed(NodeId, Member),
    /// Entered an ordered member; awaiting the index segment
    Indexed(Vec<NodeId>),
}

enum Member {
    Properties,
    Definitions,
}

fn step(registry: &DocumentRegistry, cursor: Cursor, segment: &str) -> Option<Cursor> {
    match cursor {
        Cursor::Node(id) => {
            let node = registry.arena.get(id);
            match segment {
                "properties" => Some(Cursor::Keyed(id, Member::Properties)),
                "definitions" | "$defs" => Some(Cursor::Keyed(id, Member::Definitions)),
                "items" => match &node.items {
                    Items::Single(child) => Some(Cursor::Node(*child)),
                    Items::Tuple(children) => Some(Cursor::Indexed(children.clone())),
                    Items::None => None,
                },
                "allOf" => Some(Cursor::Indexed(node.all_of.clone())),
                "anyOf" => Some(Cursor::Indexed(node.any_of.clone())),
                "oneOf" => Some(Cursor::Indexed(node.one_of.clone())),
                other => match node.extensions.get(other) {
                    Some(ExtensionValue::Node(child)) => Some(Cursor::Node(*child)),
                    _ => None,
                },
            }
        }
        Cursor::Keyed(id, member) => {
            let node = registry.arena.get(id);
            let map = match member {
                Member::Properties => &node.properties,
                Member::Definitions => &node.definitions,
            };
            map.get(segment).copied().map(Cursor::Node)
        }
        Cursor::Indexed(children) => {
            let index: usize = segment.parse().ok()?;
            children.get(index).copied().map(Cursor::Node)
        }
    }
}

/// Link every externally-referenced target into the root document's
/// `definitions`, so an emitted document is self-contained.
///
/// Targets are linked by handle, never deep-copied: a target referenced from
/// many pointer nodes, or participating in a cycle, is imported exactly once.
pub fn inline_external_references(
    registry: &mut DocumentRegistry,
    identifier: &str,
) -> Result<()> {
    let root = match registry.document(identifier) {
        Some(doc) => doc.root,
        None => {
            return Err(SchemaError::InvalidDocument {
                identifier: identifier.to_string(),
                reason: "document not loaded".to_string(),
            })
        }
    };

    // Gather every resolved pointer node, following resolved links so
    // targets-of-targets are found in one pass. Pointer nodes without a
    // document path are included too: a foreign document's internal
    // references resolve into that document's own definitions, which the
    // root document cannot reach structurally.
    let mut imports: Vec<(NodeId, Option<String>, String)> = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut pending = vec![root];
    while let Some(id) = pending.pop() {
        if !visited.insert(id) {
            continue;
        }
        let node = registry.arena.get(id);
        if let Some(target) = node.resolved {
            if let Some(reference) = node.reference.as_ref() {
                imports.push((target, node.document_path.clone(), reference.clone()));
            }
            pending.push(target);
        }
        pending.extend(node.children());
    }

    // Reachability is rechecked per import: linking a target into the root's
    // definitions can make later targets reachable through its subtree.
    for (target, doc_path, reference) in imports {
        if structural_reachable(registry, root).contains(&target) {
            continue;
        }
        let name = definition_name(registry, root, target, &reference, doc_path.as_deref());
        debug!(name = %name, "importing external definition");
        registry.arena.get_mut(root).definitions.insert(name, target);
        if let Some(doc_path) = doc_path {
            registry.arena.get_mut(target).document_path = Some(doc_path);
        }
    }
    Ok(())
}

fn structural_reachable(registry: &DocumentRegistry, root: NodeId) -> HashSet<NodeId> {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut pending = vec![root];
    while let Some(id) = pending.pop() {
        if visited.insert(id) {
            pending.extend(registry.arena.get(id).children());
        }
    }
    visited
}

/// Pick a `definitions` name for an imported target: the last pointer
/// segment when the reference has one, the file stem otherwise, with a
/// numeric suffix on collision.
fn definition_name(
    registry: &DocumentRegistry,
    root: NodeId,
    target: NodeId,
    reference: &str,
    doc_path: Option<&str>,
) -> String {
    let base = match reference.split_once('#') {
        Some((_, pointer)) if !pointer.is_empty() && pointer != "/" => pointer
            .rsplit('/')
            .next()
            .map(unescape_segment)
            .unwrap_or_default(),
        _ => doc_path
            .and_then(|p| Path::new(p).file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let base = if base.is_empty() {
        "definition".to_string()
    } else {
        base
    };

    let definitions = &registry.arena.get(root).definitions;
    if definitions.get(&base).map_or(true, |&existing| existing == target) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}{}", base, n);
        match definitions.get(&candidate) {
            None => return candidate,
            Some(&existing) if existing == target => return candidate,
            _ => n += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentRegistry;
    use crate::schema::JsonType;

    #[test]
    fn test_nested_definition_reference_resolves() {
        let (registry, root) = DocumentRegistry::from_json(
            r##"{
                "type": "object",
                "properties": { "foo": { "$ref": "#/definitions/collection/bar" } },
                "definitions": { "collection": { "bar": { "type": "integer" } } }
            }"##,
        )
        .unwrap();
        let foo = registry.node(root).properties["foo"];
        assert!(registry.actual(foo).has_type(JsonType::Integer));
    }

    #[test]
    fn test_root_self_reference() {
        let (registry, root) = DocumentRegistry::from_json(
            r##"{ "properties": { "me": { "$ref": "#" } } }"##,
        )
        .unwrap();
        let me = registry.node(root).properties["me"];
        assert_eq!(registry.node(me).resolved, Some(root));
    }

    #[test]
    fn test_indirection_chain_reaches_structural_node() {
        let (registry, root) = DocumentRegistry::from_json(
            r##"{
                "properties": { "foo": { "$ref": "#/definitions/a" } },
                "definitions": {
                    "a": { "$ref": "#/definitions/b" },
                    "b": { "type": "string" }
                }
            }"##,
        )
        .unwrap();
        let foo = registry.node(root).properties["foo"];
        let b = registry.node(root).definitions["b"];
        // The chain collapses to the structural terminus, not to `a`.
        assert_eq!(registry.node(foo).resolved, Some(b));
        assert!(registry.actual(foo).has_type(JsonType::String));
    }

    #[test]
    fn test_pointer_cycle_is_an_error() {
        let err = DocumentRegistry::from_json(
            r##"{
                "definitions": {
                    "a": { "$ref": "#/definitions/b" },
                    "b": { "$ref": "#/definitions/a" }
                }
            }"##,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::CircularReference { .. }));
    }

    #[test]
    fn test_structural_cycle_is_legal() {
        let (registry, root) = DocumentRegistry::from_json(
            r##"{
                "definitions": {
                    "Tree": {
                        "type": "object",
                        "properties": {
                            "children": {
                                "type": "array",
                                "items": { "$ref": "#/definitions/Tree" }
                            }
                        }
                    }
                }
            }"##,
        )
        .unwrap();
        let tree = registry.node(root).definitions["Tree"];
        let children = registry.node(tree).properties["children"];
        let Items::Single(pointer) = registry.node(children).items else {
            panic!("expected single items schema");
        };
        assert_eq!(registry.node(pointer).resolved, Some(tree));
    }

    #[test]
    fn test_missing_segment_is_reference_not_found() {
        let err = DocumentRegistry::from_json(
            r##"{ "properties": { "foo": { "$ref": "#/definitions/missing" } } }"##,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::ReferenceNotFound { ref reference, .. }
                if reference == "#/definitions/missing"
        ));
    }

    #[test]
    fn test_escaped_pointer_segments() {
        let (registry, root) = DocumentRegistry::from_json(
            r##"{
                "properties": { "foo": { "$ref": "#/definitions/a~1b~0c" } },
                "definitions": { "a/b~c": { "type": "boolean" } }
            }"##,
        )
        .unwrap();
        let foo = registry.node(root).properties["foo"];
        assert!(registry.actual(foo).has_type(JsonType::Boolean));
    }
}
