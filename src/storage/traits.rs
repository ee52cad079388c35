//! Storage trait definitions

use crate::graph::{GraphNode, Label, RelationType, Statement, WriteSummary};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Row decode error: {0}")]
    Decode(String),

    #[cfg(feature = "neo4j")]
    #[error("Bolt error: {0}")]
    Bolt(#[from] neo4rs::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One `UseCase <- TRACE - Class <- IMPLEMENTS - CodeFile` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceChain {
    pub use_case_id: String,
    pub class_name: String,
    pub file_path: String,
}

/// Aggregate chain counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChainCounts {
    /// Every use case in the store
    pub use_cases: u64,
    /// Distinct classes with a `TRACE` to some use case
    pub classes: u64,
    /// Distinct files implementing one of those classes
    pub code_files: u64,
}

/// Nodes missing one tier of the chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Orphans {
    /// Use cases with no incoming `TRACE` or `SUPPORTS`
    pub use_cases_without_class: Vec<String>,
    /// Classes with no incoming `IMPLEMENTS`
    pub classes_without_file: Vec<String>,
}

impl Orphans {
    pub fn is_empty(&self) -> bool {
        self.use_cases_without_class.is_empty() && self.classes_without_file.is_empty()
    }
}

/// Trait for graph storage backends
///
/// Every write is an upsert. Edge writes whose endpoints do not exist are a
/// no-op. Nothing here deletes graph state.
pub trait GraphStore: Send + Sync {
    // === Writes ===

    /// Apply a single statement
    fn execute(&self, statement: &Statement) -> StorageResult<WriteSummary>;

    /// Apply a batch atomically; on the first failure the batch is rolled
    /// back and that failure returned
    fn transaction(&self, statements: &[Statement]) -> StorageResult<WriteSummary>;

    // === Reads ===

    /// Nodes of `label` where any of the given property equalities hold
    fn find_nodes(
        &self,
        label: Label,
        any_of: &[(&'static str, &str)],
    ) -> StorageResult<Vec<GraphNode>>;

    fn count_nodes(&self, label: Label) -> StorageResult<u64>;

    fn count_edges(&self, relation: RelationType) -> StorageResult<u64>;

    // === Traceability ===

    /// Sample of complete three-tier chains, ordered by use case, class, file
    fn trace_chains(&self, limit: usize) -> StorageResult<Vec<TraceChain>>;

    fn chain_counts(&self) -> StorageResult<ChainCounts>;

    fn orphans(&self) -> StorageResult<Orphans>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: GraphStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
