//! Error types for schema resolution sessions

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Errors raised while loading, resolving, or emitting schema documents.
///
/// Every variant is fatal to the resolution session that raised it: a
/// half-resolved graph is never handed back to the caller, and the resolver
/// never retries a failed load on its own.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("could not load document '{identifier}': {reason}")]
    DocumentLoad { identifier: String, reason: String },

    #[error("reference '{reference}' not found (document '{document}')")]
    ReferenceNotFound { reference: String, document: String },

    #[error("circular reference chain at '{reference}' (document '{document}')")]
    CircularReference { reference: String, document: String },

    #[error("{missing} referenced schema(s) not reachable by traversal: referenced schemas must be reachable from a 'definitions' entry")]
    PathNotFound { missing: usize },

    #[error("invalid document '{identifier}': {reason}")]
    InvalidDocument { identifier: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
