//! tracegraph: requirement-to-code traceability graph
//!
//! Extracts design facts from PlantUML diagrams and trace markers from
//! source-code docstrings, and merges both idempotently into one property
//! graph holding the chain requirement -> design class -> code file.
//!
//! # Pipeline
//!
//! - [`DiagramParser`] turns diagrams into a [`FactSet`]
//! - [`GraphImporter`] upserts the facts under a [`Stage`] profile
//! - [`CodeScanner`] recovers classes and their `Trace: [...]` markers
//! - [`TraceLinker`] links code files to classes and use cases
//! - [`ConsistencyVerifier`] samples chains and lists orphans
//!
//! # Example
//!
//! ```
//! use tracegraph::{DiagramParser, GraphImporter, OpenStore, SqliteStore, Stage};
//!
//! let store = SqliteStore::open_in_memory().unwrap();
//! let mut parser = DiagramParser::new();
//! parser.parse_source("class_diagram.puml", "class \"Sensor\" as S01 { - value : float }");
//! GraphImporter::new(&store).import(parser.facts(), Stage::Design).unwrap();
//! ```

pub mod config;
pub mod diagram;
pub mod graph;
pub mod importer;
pub mod requirement;
pub mod scanner;
pub mod storage;
pub mod trace;

pub use config::{Config, ConfigError};
pub use diagram::{DiagramParser, FactSet, ParseError};
pub use graph::{Label, NodeKey, RelationType, Statement, WriteSummary};
pub use importer::{GraphImporter, ImportSummary, Stage};
pub use scanner::{CodeScanner, ScanError, ScannedFile};
pub use storage::{open_store, GraphStore, OpenStore, SqliteStore, StorageError, StorageResult};
pub use trace::{ConsistencyVerifier, LinkSummary, TraceLinker, TraceReport, VerificationReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the stderr log subscriber used by the binaries (`RUST_LOG`
/// filters, `warn` when unset)
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
