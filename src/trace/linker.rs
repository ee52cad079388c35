//! Links scanned code files to design classes and use cases
//!
//! `CodeFile -IMPLEMENTS-> Class -TRACE-> UseCase`

use crate::graph::{Label, NodeKey, RelationType, Statement, WriteSummary};
use crate::scanner::ScannedFile;
use crate::storage::{GraphStore, StorageResult};
use serde::Serialize;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// What a linking run wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkSummary {
    pub files: usize,
    pub classes: usize,
    /// `TRACE` edges requested (class, use case pairs)
    pub trace_links: usize,
    pub writes: WriteSummary,
}

impl fmt::Display for LinkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Linked {} files, {} classes, {} trace links ({} nodes created, {} relationships created)",
            self.files,
            self.classes,
            self.trace_links,
            self.writes.nodes_created,
            self.writes.relationships_created
        )
    }
}

/// Writes scanner output into the store next to the design graph
pub struct TraceLinker<'a, S: GraphStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: GraphStore + ?Sized> TraceLinker<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Class keys a scanned class name resolves to
    ///
    /// Design classes are matched by `id` or `name`. With no match a class
    /// keyed by the scanned name is created.
    fn resolve_class(
        &self,
        name: &str,
        statements: &mut Vec<Statement>,
    ) -> StorageResult<Vec<NodeKey>> {
        let matched: Vec<NodeKey> = self
            .store
            .find_nodes(Label::Class, &[("id", name), ("name", name)])?
            .iter()
            .filter_map(|node| node.get_str("id"))
            .map(NodeKey::class)
            .collect();

        if !matched.is_empty() {
            return Ok(matched);
        }

        let key = NodeKey::class(name);
        statements.push(Statement::merge_node(key.clone(), [("name", name)]));
        Ok(vec![key])
    }

    /// Statements for one file
    fn file_statements(&self, file: &ScannedFile) -> StorageResult<(Vec<Statement>, usize)> {
        let file_key = NodeKey::code_file(code_file_path(&file.path));
        let mut statements = vec![Statement::merge_key(file_key.clone())];
        let mut trace_links = 0;

        for class in file.classes() {
            let class_keys = self.resolve_class(&class.name, &mut statements)?;

            for class_key in &class_keys {
                statements.push(Statement::merge_edge(
                    file_key.clone(),
                    RelationType::Implements,
                    class_key.clone(),
                ));
            }

            for trace in &class.traces {
                let use_case = NodeKey::use_case(trace);
                statements.push(Statement::merge_key(use_case.clone()));
                for class_key in &class_keys {
                    statements.push(Statement::merge_edge(
                        class_key.clone(),
                        RelationType::Trace,
                        use_case.clone(),
                    ));
                    trace_links += 1;
                }
            }
        }

        Ok((statements, trace_links))
    }

    /// Link every file, one transaction per file
    pub fn link(&self, files: &[ScannedFile]) -> StorageResult<LinkSummary> {
        let mut summary = LinkSummary::default();

        for file in files {
            let (statements, trace_links) = self.file_statements(file)?;
            let written = self.store.transaction(&statements)?;
            tracing::debug!(
                path = %file.path.display(),
                nodes_created = written.nodes_created,
                relationships_created = written.relationships_created,
                "linked file"
            );

            summary.files += 1;
            summary.classes += file.classes().count();
            summary.trace_links += trace_links;
            summary.writes += written;
        }

        tracing::info!(files = summary.files, classes = summary.classes, "linking finished");
        Ok(summary)
    }
}

/// Key path of a code file, relative to the working directory when under it
///
/// Existing files are canonicalized, so `src/a.py` and `./src/a.py` share
/// one `CodeFile`. Paths that cannot be resolved only lose their `.` parts.
fn code_file_path(path: &Path) -> String {
    let resolved = match path.canonicalize() {
        Ok(absolute) => std::env::current_dir()
            .and_then(|cwd| cwd.canonicalize())
            .ok()
            .and_then(|cwd| absolute.strip_prefix(&cwd).ok().map(Path::to_path_buf))
            .unwrap_or(absolute),
        Err(_) => path
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect::<PathBuf>(),
    };
    resolved.to_string_lossy().into_owned()
}
