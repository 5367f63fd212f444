//! Path discovery
//!
//! Computes, for a set of target node identities, the first JSON-Pointer path
//! reaching each from a root node. Traversal is depth-first and purely
//! structural: keyed maps in insertion order, sequences in index order,
//! structured members by keyword name, and extension data spliced in at the
//! owner's own path (unknown keywords are inlined members, not a nested
//! `extensions` object). A visited set of node identities guarantees
//! termination on cyclic graphs, and traversal stops as soon as the last
//! sought target has been found.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, SchemaError};
use crate::schema::{ExtensionValue, Items, NodeId, SchemaArena};

/// Escape a key for use as a JSON Pointer segment (`~` → `~0`, `/` → `~1`)
pub fn escape_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Unescape a JSON Pointer segment (`~1` → `/`, `~0` → `~`)
pub fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Find the discovery path of a single node from `root`.
pub fn find_path(arena: &SchemaArena, root: NodeId, target: NodeId) -> Result<String> {
    let targets: HashSet<NodeId> = [target].into_iter().collect();
    let mut paths = find_paths(arena, root, &targets)?;
    paths
        .remove(&target)
        .ok_or(SchemaError::PathNotFound { missing: 1 })
}

/// Find the discovery paths of every node in `targets` from `root`.
///
/// Fails with [`SchemaError::PathNotFound`] if any target is unreachable by
/// structural traversal — a referenced schema that is not anchored under a
/// `definitions` entry of some ancestor.
pub fn find_paths(
    arena: &SchemaArena,
    root: NodeId,
    targets: &HashSet<NodeId>,
) -> Result<HashMap<NodeId, String>> {
    let mut found: HashMap<NodeId, String> = HashMap::new();
    if targets.is_empty() {
        return Ok(found);
    }
    let mut visited: HashSet<NodeId> = HashSet::new();
    visit(arena, root, "#", targets, &mut found, &mut visited);

    if found.len() < targets.len() {
        return Err(SchemaError::PathNotFound {
            missing: targets.len() - found.len(),
        });
    }
    Ok(found)
}

/// Returns true once every target has been found (early exit signal).
fn visit(
    arena: &SchemaArena,
    id: NodeId,
    path: &str,
    targets: &HashSet<NodeId>,
    found: &mut HashMap<NodeId, String>,
    visited: &mut HashSet<NodeId>,
) -> bool {
    if !visited.insert(id) {
        return false;
    }

    if targets.contains(&id) && !found.contains_key(&id) {
        found.insert(id, path.to_string());
        if found.len() == targets.len() {
            return true;
        }
    }

    let node = arena.get(id);

    // Definitions first: reference paths prefer `#/definitions/...` anchors.
    for (name, child) in &node.definitions {
        let child_path = format!("{}/definitions/{}", path, escape_segment(name));
        if visit(arena, *child, &child_path, targets, found, visited) {
            return true;
        }
    }

    for (name, child) in &node.properties {
        let child_path = format!("{}/properties/{}", path, escape_segment(name));
        if visit(arena, *child, &child_path, targets, found, visited) {
            return true;
        }
    }

    match &node.items {
        Items::None => {}
        Items::Single(child) => {
            let child_path = format!("{}/items", path);
            if visit(arena, *child, &child_path, targets, found, visited) {
                return true;
            }
        }
        Items::Tuple(children) => {
            for (i, child) in children.iter().enumerate() {
                let child_path = format!("{}/items/{}", path, i);
                if visit(arena, *child, &child_path, targets, found, visited) {
                    return true;
                }
            }
        }
    }

    for (keyword, children) in [
        ("allOf", &node.all_of),
        ("anyOf", &node.any_of),
        ("oneOf", &node.one_of),
    ] {
        for (i, child) in children.iter().enumerate() {
            let child_path = format!("{}/{}/{}", path, keyword, i);
            if visit(arena, *child, &child_path, targets, found, visited) {
                return true;
            }
        }
    }

    // Extension data is spliced at the owner's path: the key appends
    // directly, with no intermediate segment. Raw extension values cannot
    // contain schema nodes, so they are leaves here.
    for (key, value) in &node.extensions {
        if let ExtensionValue::Node(child) = value {
            let child_path = format!("{}/{}", path, escape_segment(key));
            if visit(arena, *child, &child_path, targets, found, visited) {
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaNode;

    fn arena_with_tree() -> (SchemaArena, NodeId, NodeId, NodeId) {
        // root -> definitions.Tree -> properties.children -> items -> pointer(Tree)
        let mut arena = SchemaArena::new();
        let tree = arena.alloc(SchemaNode::default());
        let pointer = arena.alloc(SchemaNode {
            reference: Some("#/definitions/Tree".to_string()),
            resolved: Some(tree),
            ..Default::default()
        });
        let children = arena.alloc(SchemaNode {
            items: Items::Single(pointer),
            ..Default::default()
        });
        arena
            .get_mut(tree)
            .properties
            .insert("children".to_string(), children);
        let mut root = SchemaNode::default();
        root.definitions.insert("Tree".to_string(), tree);
        let root = arena.alloc(root);
        (arena, root, tree, pointer)
    }

    #[test]
    fn test_path_through_cycle_terminates() {
        let (arena, root, tree, _) = arena_with_tree();
        let path = find_path(&arena, root, tree).unwrap();
        assert_eq!(path, "#/definitions/Tree");
    }

    #[test]
    fn test_first_discovered_path_wins_and_is_idempotent() {
        let (arena, root, _, pointer) = arena_with_tree();
        let first = find_path(&arena, root, pointer).unwrap();
        let second = find_path(&arena, root, pointer).unwrap();
        assert_eq!(first, "#/definitions/Tree/properties/children/items");
        assert_eq!(first, second);
    }

    #[test]
    fn test_unreachable_target_fails() {
        let (mut arena, root, _, _) = arena_with_tree();
        let orphan = arena.alloc(SchemaNode::default());
        let err = find_path(&arena, root, orphan).unwrap_err();
        assert!(matches!(err, SchemaError::PathNotFound { missing: 1 }));
    }

    #[test]
    fn test_extension_nodes_splice_at_owner_path() {
        let mut arena = SchemaArena::new();
        let bar = arena.alloc(SchemaNode::default());
        let mut collection = SchemaNode::default();
        collection
            .extensions
            .insert("bar".to_string(), ExtensionValue::Node(bar));
        let collection = arena.alloc(collection);
        let mut root = SchemaNode::default();
        root.definitions.insert("collection".to_string(), collection);
        let root = arena.alloc(root);

        let path = find_path(&arena, root, bar).unwrap();
        assert_eq!(path, "#/definitions/collection/bar");
    }

    #[test]
    fn test_segment_escaping() {
        assert_eq!(escape_segment("a/b~c"), "a~1b~0c");
        assert_eq!(unescape_segment("a~1b~0c"), "a/b~c");
        // Unescape order matters: `~01` must become `~1`, not `/`.
        assert_eq!(unescape_segment("~01"), "~1");
    }

    #[test]
    fn test_multiple_targets_early_exit() {
        let (arena, root, tree, pointer) = arena_with_tree();
        let targets: HashSet<NodeId> = [tree, pointer].into_iter().collect();
        let paths = find_paths(&arena, root, &targets).unwrap();
        assert_eq!(paths[&tree], "#/definitions/Tree");
        assert_eq!(
            paths[&pointer],
            "#/definitions/Tree/properties/children/items"
        );
    }
}
