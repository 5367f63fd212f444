//! Reference-cycle analysis over a resolved document
//!
//! Builds a directed graph whose nodes are the root document's `definitions`
//! entries and whose edges are the resolved references between their
//! subtrees, then computes strongly connected components. Consumers use this
//! to tell recursive definitions apart from plain ones, e.g. to decide where
//! indirection is needed in generated code.

use std::collections::{HashMap, HashSet};

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::document::DocumentRegistry;
use crate::error::{Result, SchemaError};
use crate::schema::NodeId;

/// How one definition reaches another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// The definition is itself a `$ref`
    Reference,
    /// Through a property
    Property,
    /// Through `items`
    Items,
    /// Through a composition keyword
    Composition,
    /// Through extension data
    Extension,
}

/// Strongly-connected-component view of a document's definitions.
pub struct ReferenceAnalysis {
    graph: DiGraph<String, EdgeKind>,
    indices: HashMap<String, NodeIndex>,
    groups: Vec<Vec<String>>,
    cyclic: HashSet<String>,
}

impl ReferenceAnalysis {
    /// Analyze the definitions of a resolved document.
    pub fn from_document(registry: &DocumentRegistry, identifier: &str) -> Result<Self> {
        let root = match registry.document(identifier) {
            Some(doc) => doc.root,
            None => {
                return Err(SchemaError::InvalidDocument {
                    identifier: identifier.to_string(),
                    reason: "document not loaded".to_string(),
                })
            }
        };

        let definitions: Vec<(String, NodeId)> = registry
            .node(root)
            .definitions
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect();

        // Which definition owns each node of each subtree. Subtrees are
        // disjoint parse trees, so first-wins assignment is exact.
        let mut owner: HashMap<NodeId, usize> = HashMap::new();
        for (index, (_, def_root)) in definitions.iter().enumerate() {
            let mut pending = vec![*def_root];
            while let Some(id) = pending.pop() {
                if owner.contains_key(&id) {
                    continue;
                }
                owner.insert(id, index);
                pending.extend(registry.node(id).children());
            }
        }

        let mut graph: DiGraph<String, EdgeKind> = DiGraph::new();
        let mut indices: HashMap<String, NodeIndex> = HashMap::new();
        let nodes: Vec<NodeIndex> = definitions
            .iter()
            .map(|(name, _)| {
                let index = graph.add_node(name.clone());
                indices.insert(name.clone(), index);
                index
            })
            .collect();

        for (index, (_, def_root)) in definitions.iter().enumerate() {
            let mut visited: HashSet<NodeId> = HashSet::new();
            let mut pending: Vec<(NodeId, EdgeKind)> = vec![(*def_root, EdgeKind::Reference)];
            while let Some((id, kind)) = pending.pop() {
                if !visited.insert(id) {
                    continue;
                }
                let node = registry.node(id);
                if let Some(target) = node.resolved {
                    if let Some(&target_def) = owner.get(&target) {
                        graph.add_edge(nodes[index], nodes[target_def], kind);
                    }
                }
                for child in node.definitions.values() {
                    pending.push((*child, EdgeKind::Reference));
                }
                for child in node.properties.values() {
                    pending.push((*child, EdgeKind::Property));
                }
                for child in node.items.ids() {
                    pending.push((child, EdgeKind::Items));
                }
                for child in node
                    .all_of
                    .iter()
                    .chain(node.any_of.iter())
                    .chain(node.one_of.iter())
                {
                    pending.push((*child, EdgeKind::Composition));
                }
                for value in node.extensions.values() {
                    if let crate::schema::ExtensionValue::Node(child) = value {
                        pending.push((*child, EdgeKind::Extension));
                    }
                }
            }
        }

        // Components of size one only count when they loop onto themselves.
        let groups: Vec<Vec<String>> = kosaraju_scc(&graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || graph.find_edge(scc[0], scc[0]).is_some()
            })
            .map(|scc| scc.into_iter().map(|n| graph[n].clone()).collect())
            .collect();
        let cyclic: HashSet<String> = groups.iter().flatten().cloned().collect();
        debug!(
            definitions = definitions.len(),
            cycles = groups.len(),
            "analyzed definition references"
        );

        Ok(Self {
            graph,
            indices,
            groups,
            cyclic,
        })
    }

    /// Cyclic definition groups, one entry per strongly connected component
    /// of size greater than one or with a self-edge.
    pub fn scc_groups(&self) -> &[Vec<String>] {
        &self.groups
    }

    /// Does this definition participate in any reference cycle?
    pub fn is_cyclic(&self, name: &str) -> bool {
        self.cyclic.contains(name)
    }

    /// Names of the definitions this one references directly, in edge order
    /// without duplicates.
    pub fn dependencies(&self, name: &str) -> Vec<String> {
        let Some(&index) = self.indices.get(name) else {
            return Vec::new();
        };
        let mut seen: HashSet<NodeIndex> = HashSet::new();
        self.graph
            .neighbors(index)
            .filter(|n| seen.insert(*n))
            .map(|n| self.graph[n].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(json: &str) -> ReferenceAnalysis {
        let (registry, _) = DocumentRegistry::from_json(json).unwrap();
        ReferenceAnalysis::from_document(&registry, "").unwrap()
    }

    #[test]
    fn test_self_recursive_definition() {
        let analysis = analyze(
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
                    },
                    "Leaf": { "type": "string" }
                }
            }"##,
        );
        assert!(analysis.is_cyclic("Tree"));
        assert!(!analysis.is_cyclic("Leaf"));
        assert_eq!(analysis.scc_groups(), &[vec!["Tree".to_string()]]);
    }

    #[test]
    fn test_mutual_recursion_is_one_group() {
        let analysis = analyze(
            r##"{
                "definitions": {
                    "A": { "properties": { "b": { "$ref": "#/definitions/B" } } },
                    "B": { "properties": { "a": { "$ref": "#/definitions/A" } } }
                }
            }"##,
        );
        assert!(analysis.is_cyclic("A"));
        assert!(analysis.is_cyclic("B"));
        assert_eq!(analysis.scc_groups().len(), 1);
        let mut group = analysis.scc_groups()[0].clone();
        group.sort();
        assert_eq!(group, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_linear_chain_has_no_cycles() {
        let analysis = analyze(
            r##"{
                "definitions": {
                    "A": { "properties": { "b": { "$ref": "#/definitions/B" } } },
                    "B": { "type": "string" }
                }
            }"##,
        );
        assert!(analysis.scc_groups().is_empty());
        assert_eq!(analysis.dependencies("A"), vec!["B".to_string()]);
        assert!(analysis.dependencies("B").is_empty());
    }

    #[test]
    fn test_unknown_name_has_no_dependencies() {
        let analysis = analyze(r##"{ "definitions": { "A": { "type": "string" } } }"##);
        assert!(analysis.dependencies("Missing").is_empty());
    }
}
