//! Storage backends for tracegraph
//!
//! Every backend implements the `GraphStore` trait. `SqliteStore` is the
//! embedded default; `Neo4jStore` talks Bolt and is behind the `neo4j`
//! feature.

#[cfg(feature = "neo4j")]
mod neo4j;
mod sqlite;
mod traits;

#[cfg(feature = "neo4j")]
pub use neo4j::Neo4jStore;
pub use sqlite::SqliteStore;
pub use traits::{
    ChainCounts, GraphStore, OpenStore, Orphans, StorageError, StorageResult, TraceChain,
};

use crate::config::{Backend, Config};

/// Open the backend selected by `config.store.backend`
pub fn open_store(config: &Config) -> StorageResult<Box<dyn GraphStore>> {
    match config.store.backend {
        Backend::Sqlite => {
            tracing::info!(path = %config.store.path.display(), "opening sqlite store");
            Ok(Box::new(SqliteStore::open(&config.store.path)?))
        }
        #[cfg(feature = "neo4j")]
        Backend::Neo4j => {
            tracing::info!(uri = %config.endpoints.bolt, "connecting to neo4j");
            Ok(Box::new(Neo4jStore::connect(config)?))
        }
        #[cfg(not(feature = "neo4j"))]
        Backend::Neo4j => Err(StorageError::BackendUnavailable(
            "neo4j backend requires the `neo4j` feature".to_string(),
        )),
    }
}
