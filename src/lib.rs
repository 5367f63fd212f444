//! Schema Graph
//!
//! A structural JSON Schema document engine: documents parse into an
//! arena-backed node graph, references resolve into live node links, and
//! the resolved graph serializes back to JSON with recomputed pointer paths.
//!
//! ## Features
//!
//! - **Arena Storage**: Nodes live in an append-only arena addressed by
//!   stable handles, so identity survives graph rearrangement
//! - **Reference Resolution**: Local pointers, cross-document references,
//!   and indirection chains all resolve to handle links; structural cycles
//!   stay finite, pointer cycles are rejected
//! - **Path Discovery**: First-found JSON-Pointer paths over cyclic graphs
//! - **Self-Contained Emission**: External targets link into the root's
//!   `definitions` so one document carries everything it references
//! - **Type Mapping**: Caller-described type graphs map onto schema
//!   documents with deduplicated definitions
//! - **Cycle Analysis**: Strongly connected components over the resolved
//!   definition graph
//!
//! ## Architecture
//!
//! ```text
//! DocumentRegistry (one session)
//! ├── SchemaArena          append-only node storage
//! ├── DocumentLoader       the only I/O boundary
//! └── Document*            parsed roots + pointer caches
//!       │
//!       ├── resolver       $ref strings → NodeId links
//!       ├── paths          NodeId → "#/definitions/..." discovery
//!       ├── serializer     resolved graph → serde_json::Value
//!       ├── mapper         TypeProvider graphs → documents
//!       └── analysis       definition SCCs (petgraph)
//! ```

pub mod analysis;
pub mod checksum;
pub mod document;
pub mod error;
pub mod mapper;
pub mod parser;
pub mod paths;
pub mod resolver;
pub mod schema;
pub mod serializer;

pub use analysis::{EdgeKind, ReferenceAnalysis};
pub use checksum::Checksum;
pub use document::{Document, DocumentLoader, DocumentRegistry, FileLoader};
pub use error::{Result, SchemaError};
pub use mapper::{map_type_graph, Member, TypeDescription, TypeProvider, TypeShape};
pub use paths::{find_path, find_paths};
pub use schema::{ExtensionValue, Items, JsonType, NodeId, SchemaArena, SchemaNode};
