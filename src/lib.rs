//! # Graphwire - Dependency Graph Resolver
//!
//! Resolves declared bindings, scope contributions and nested graph specs
//! into validated, ordered binding graphs.
//!
//! Graphwire provides:
//! - Canonical keys with wrapping context (`Provider`, `Lazy`, optional)
//! - Contribution aggregation with exclude/replace/rank resolution
//! - Graph building with parent-to-child extension and shadowing
//! - Validation (missing bindings, scopes, unbreakable cycles, unused)
//! - SCC-aware initialization order and sharding for large graphs

pub mod key;
pub mod binding;
pub mod declaration;
pub mod diagnostic;
pub mod contribution;
pub mod context;
pub mod graph;
pub mod hierarchy;
pub mod extension;
pub mod builder;
pub mod validate;
pub mod topology;
pub mod shard;
pub mod resolver;
pub mod report;
pub mod config;
pub mod output;
pub mod ui;

// Re-exports for convenient access
pub use binding::{Binding, BindingKind, Provenance};
pub use config::ResolverConfig;
pub use declaration::{BindingDeclaration, Contribution, DeclarationSet, GraphSpec};
pub use diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use graph::BindingGraph;
pub use key::{ContextualTypeKey, Origin, ScopeMarker, TypeKey, Wrapping};
pub use resolver::{GraphOutcome, ResolutionOutput, ResolvedGraph, Resolver};

/// Result type alias for Graphwire operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Graphwire operations
///
/// User-facing resolution problems are [`Diagnostic`]s, not errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid declaration: {0}")]
    InvalidDeclaration(String),

    #[error("Unknown graph: {0}")]
    UnknownGraph(String),

    #[error("Invalid graph hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("Internal error in {graph}: {message}")]
    Internal { graph: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Toml(#[from] toml::de::Error),
}
