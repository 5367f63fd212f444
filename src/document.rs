//! Documents, loading, and the per-session registry
//!
//! A [`DocumentRegistry`] is one resolution session: it owns the node arena,
//! the loader, and every document loaded so far. Sessions share nothing; a
//! handle from one session means nothing to another. Loads are single-flight
//! by construction — the cache is consulted before every fetch and the
//! session is single-owner, so an identifier is never fetched twice and
//! always yields the same `Document`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::checksum::Checksum;
use crate::error::{Result, SchemaError};
use crate::parser::Parser;
use crate::schema::{NodeId, SchemaArena, SchemaNode};

/// Fetches raw document text by identifier. The only I/O boundary of the
/// engine; everything behind it is pure graph work.
pub trait DocumentLoader {
    fn fetch(&self, identifier: &str) -> std::io::Result<String>;
}

/// Loads documents from the local filesystem.
#[derive(Debug, Default)]
pub struct FileLoader;

impl DocumentLoader for FileLoader {
    fn fetch(&self, identifier: &str) -> std::io::Result<String> {
        fs::read_to_string(identifier)
    }
}

/// A loaded schema document: identifier, root node, and the pointer cache
/// built during parsing.
#[derive(Debug)]
pub struct Document {
    /// Source path or URI (empty for in-memory documents)
    pub identifier: String,
    /// Root schema node
    pub root: NodeId,
    /// Checksum of the raw text (None for synthesized documents)
    pub checksum: Option<Checksum>,
    /// The relative reference through which this document was first reached,
    /// as written in the referencing document (e.g. `./collection.json`).
    /// None for the root document of a session.
    pub document_path: Option<String>,
    pub(crate) nodes_by_pointer: HashMap<String, NodeId>,
}

impl Document {
    /// Look up a node by its JSON-Pointer path (e.g. `#/definitions/Foo`)
    pub fn node_at(&self, pointer: &str) -> Option<NodeId> {
        self.nodes_by_pointer.get(pointer).copied()
    }
}

/// One resolution session.
pub struct DocumentRegistry {
    pub(crate) arena: SchemaArena,
    loader: Box<dyn DocumentLoader>,
    documents: IndexMap<String, Document>,
    /// Documents whose reference pass has started (guards mutual recursion).
    pub(crate) resolved: HashSet<String>,
}

impl std::fmt::Debug for DocumentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentRegistry")
            .field("documents", &self.documents.keys().collect::<Vec<_>>())
            .field("nodes", &self.arena.len())
            .finish_non_exhaustive()
    }
}

impl DocumentRegistry {
    pub fn new(loader: Box<dyn DocumentLoader>) -> Self {
        Self {
            arena: SchemaArena::new(),
            loader,
            documents: IndexMap::new(),
            resolved: HashSet::new(),
        }
    }

    /// A session backed by the local filesystem
    pub fn with_file_loader() -> Self {
        Self::new(Box::new(FileLoader))
    }

    /// Load, parse, and fully resolve a document from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<(Self, NodeId)> {
        let identifier = path.as_ref().to_string_lossy().replace('\\', "/");
        let mut registry = Self::with_file_loader();
        let root = registry.load(&identifier)?;
        crate::resolver::resolve_document(&mut registry, &identifier)?;
        Ok((registry, root))
    }

    /// Parse and fully resolve an in-memory document. Its identifier is the
    /// empty string; relative external references it contains are passed to
    /// the loader unchanged.
    pub fn from_json(json: &str) -> Result<(Self, NodeId)> {
        let mut registry = Self::with_file_loader();
        let root = registry.add_document("", json)?;
        crate::resolver::resolve_document(&mut registry, "")?;
        Ok((registry, root))
    }

    /// Load a document by identifier, idempotently. A cached identifier is
    /// never fetched again.
    pub fn load(&mut self, identifier: &str) -> Result<NodeId> {
        if let Some(doc) = self.documents.get(identifier) {
            trace!(identifier, "document cache hit");
            return Ok(doc.root);
        }
        debug!(identifier, "loading document");
        let text = self
            .loader
            .fetch(identifier)
            .map_err(|e| SchemaError::DocumentLoad {
                identifier: identifier.to_string(),
                reason: e.to_string(),
            })?;
        self.add_document(identifier, &text)
    }

    /// Register a document from raw JSON text under `identifier`.
    pub fn add_document(&mut self, identifier: &str, json: &str) -> Result<NodeId> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| SchemaError::DocumentLoad {
                identifier: identifier.to_string(),
                reason: format!("invalid JSON: {}", e),
            })?;
        let checksum = Checksum::from_bytes(json.as_bytes());
        let (root, cache) = Parser::new(&mut self.arena).parse_root(&value)?;
        self.documents.insert(
            identifier.to_string(),
            Document {
                identifier: identifier.to_string(),
                root,
                checksum: Some(checksum),
                document_path: None,
                nodes_by_pointer: cache,
            },
        );
        Ok(root)
    }

    /// Register an already-built in-memory document (used by the type
    /// mapper, whose graphs need no reference pass).
    pub(crate) fn add_synthesized(&mut self, identifier: &str, root: NodeId) {
        let mut cache = HashMap::new();
        cache.insert("#".to_string(), root);
        self.documents.insert(
            identifier.to_string(),
            Document {
                identifier: identifier.to_string(),
                root,
                checksum: None,
                document_path: None,
                nodes_by_pointer: cache,
            },
        );
        self.resolved.insert(identifier.to_string());
    }

    pub fn document(&self, identifier: &str) -> Option<&Document> {
        self.documents.get(identifier)
    }

    pub(crate) fn document_mut(&mut self, identifier: &str) -> Option<&mut Document> {
        self.documents.get_mut(identifier)
    }

    /// All loaded documents, in load order
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn arena(&self) -> &SchemaArena {
        &self.arena
    }

    /// Get a node by handle
    pub fn node(&self, id: NodeId) -> &SchemaNode {
        self.arena.get(id)
    }

    /// Follow a pointer node to its structural target
    pub fn actual(&self, id: NodeId) -> &SchemaNode {
        self.arena.actual(id)
    }

    /// Serialize a resolved document as a self-contained JSON value.
    /// See [`crate::serializer::to_json`].
    pub fn to_json(&mut self, identifier: &str) -> Result<serde_json::Value> {
        crate::serializer::to_json(self, identifier)
    }

    /// Serialize a resolved document preserving cross-document references.
    /// See [`crate::serializer::to_json_with_external_references`].
    pub fn to_json_with_external_references(
        &mut self,
        identifier: &str,
    ) -> Result<serde_json::Value> {
        crate::serializer::to_json_with_external_references(self, identifier)
    }
}

/// Join a relative reference against a base document identifier using
/// filesystem-relative semantics (`.` and `..` folding). Absolute
/// identifiers pass through unchanged, as do references from in-memory
/// documents (no base to join against).
pub fn resolve_path(base: &str, reference: &str) -> String {
    if base.is_empty() || reference.starts_with('/') || reference.contains("://") {
        return reference.to_string();
    }
    let absolute = base.starts_with('/');
    let base_dir = match base.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in base_dir.split('/').chain(reference.split('/')) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}
