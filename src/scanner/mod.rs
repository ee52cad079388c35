//! Source-code scanning for trace markers
//!
//! Finds class and function definitions in Python-style sources, recovers
//! the docstring that follows each one and reads its `Trace: [...]` marker.
//!
//! A class's region runs from its definition to the next class definition,
//! and the first triple-quoted string in that region is its docstring. When
//! a docstring carries several markers the last one wins.

use crate::config::ScanConfig;
use crate::requirement::extract_requirement_ids;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use walkdir::WalkDir;

fn re_class_def() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*class\s+(\w+)\s*(?:\([^)]*\))?\s*:").expect("class def regex")
    })
}

fn re_function_def() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*(?:async\s+)?def\s+(\w+)\s*\(").expect("function def regex")
    })
}

fn re_trace_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Trace:\s*\[([^\]\n]*)\]").expect("trace marker regex"))
}

/// Errors for a single scanned file
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {path} as UTF-8")]
    Decode { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityKind {
    Class,
    Function,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Class => "Class",
            EntityKind::Function => "Function",
        }
    }
}

/// A class or function definition and its trace ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedEntity {
    pub kind: EntityKind,
    pub name: String,
    /// 1-based line of the definition
    pub line: usize,
    /// Normalized requirement ids from the last marker in the docstring
    pub traces: Vec<String>,
}

/// Everything recovered from one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub entities: Vec<ScannedEntity>,
}

impl ScannedFile {
    pub fn classes(&self) -> impl Iterator<Item = &ScannedEntity> {
        self.entities.iter().filter(|e| e.kind == EntityKind::Class)
    }

    pub fn has_classes(&self) -> bool {
        self.classes().next().is_some()
    }
}

/// First triple-quoted string in `region`, `"""` or `'''` whichever opens first
fn find_docstring(region: &str) -> Option<&str> {
    let double = region.find("\"\"\"");
    let single = region.find("'''");
    let (start, quote) = match (double, single) {
        (Some(d), Some(s)) if s < d => (s, "'''"),
        (Some(d), _) => (d, "\"\"\""),
        (None, Some(s)) => (s, "'''"),
        (None, None) => return None,
    };
    let body_start = start + quote.len();
    let body_len = region[body_start..].find(quote)?;
    Some(&region[body_start..body_start + body_len])
}

/// Ids of the last `Trace: [...]` marker in `docstring`
fn last_marker_ids(docstring: &str) -> Vec<String> {
    let mut traces = Vec::new();
    for caps in re_trace_marker().captures_iter(docstring) {
        traces = extract_requirement_ids(&caps[1]);
    }
    traces
}

fn line_of(content: &str, offset: usize) -> usize {
    content[..offset].matches('\n').count() + 1
}

/// Scans source trees for trace markers
#[derive(Debug, Clone, Default)]
pub struct CodeScanner {
    config: ScanConfig,
}

impl CodeScanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Entities defined in `content`, in document order
    pub fn scan_source(&self, content: &str) -> Vec<ScannedEntity> {
        let class_defs: Vec<(usize, usize, String)> = re_class_def()
            .captures_iter(content)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some((whole.start(), whole.end(), caps[1].to_string()))
            })
            .collect();

        let function_defs: Vec<(usize, usize, String)> = re_function_def()
            .captures_iter(content)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some((whole.start(), whole.end(), caps[1].to_string()))
            })
            .collect();

        let mut entities = Vec::new();

        // Class region: up to the next class definition
        for (i, (start, end, name)) in class_defs.iter().enumerate() {
            let region_end = class_defs
                .get(i + 1)
                .map(|(next, _, _)| *next)
                .unwrap_or(content.len());
            entities.push(ScannedEntity {
                kind: EntityKind::Class,
                name: name.clone(),
                line: line_of(content, *start),
                traces: find_docstring(&content[*end..region_end])
                    .map(last_marker_ids)
                    .unwrap_or_default(),
            });
        }

        // Function region: up to the next definition of either kind
        for (start, end, name) in &function_defs {
            let region_end = class_defs
                .iter()
                .chain(function_defs.iter())
                .map(|(next, _, _)| *next)
                .filter(|next| next > start)
                .min()
                .unwrap_or(content.len());
            entities.push(ScannedEntity {
                kind: EntityKind::Function,
                name: name.clone(),
                line: line_of(content, *start),
                traces: find_docstring(&content[*end..region_end])
                    .map(last_marker_ids)
                    .unwrap_or_default(),
            });
        }

        entities.sort_by_key(|e| e.line);
        entities
    }

    pub fn scan_file(&self, path: impl AsRef<Path>) -> Result<ScannedFile, ScanError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ScanError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let content = String::from_utf8(bytes).map_err(|_| ScanError::Decode {
            path: path.to_path_buf(),
        })?;

        Ok(ScannedFile {
            path: path.to_path_buf(),
            entities: self.scan_source(&content),
        })
    }

    /// Every matching file under `root` with at least one entity, sorted by
    /// path. Unreadable files are logged and skipped.
    pub fn scan_tree(&self, root: impl AsRef<Path>) -> Vec<ScannedFile> {
        let root = root.as_ref();
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.depth() > 0
                    && entry.file_type().is_dir()
                    && self
                        .config
                        .is_excluded_dir(&entry.file_name().to_string_lossy()))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let accepted = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| self.config.accepts_extension(e))
                .unwrap_or(false);
            if !accepted {
                continue;
            }

            match self.scan_file(entry.path()) {
                Ok(file) if !file.entities.is_empty() => files.push(file),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "skipping file")
                }
            }
        }

        tracing::debug!(root = %root.display(), files = files.len(), "scanned tree");
        files
    }

    /// Files under `root` that define at least one class
    pub fn scan_directory(&self, root: impl AsRef<Path>) -> Vec<ScannedFile> {
        self.scan_tree(root)
            .into_iter()
            .filter(ScannedFile::has_classes)
            .collect()
    }
}
