//! PlantUML diagram parsing
//!
//! [`DiagramParser`] turns diagram sources into a [`FactSet`]. The kind of
//! diagram is chosen from the file name; unrecognised names run every
//! extractor. Markdown files are reduced to their `plantuml` code fences
//! first. Malformed text never fails, it just yields fewer facts.

mod extract;
mod facts;
mod rules;


pub use extract::{
    extract_activities, extract_classes, extract_components, extract_dependencies,
    extract_use_cases, parse_attributes, parse_trace_markers, use_case_for_activity,
};
pub use facts::{
    activity_id, slugify_identity, ActivityFact, AttributeFact, ClassFact, ComponentFact,
    DependencyFact, FactSet, UseCaseFact, ACTIVITY_ID_MAX_LEN, UNKNOWN_USE_CASE,
};
pub use rules::{apply_rules, Arity, ExtractionRule, RuleMatch};

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading diagram files
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read diagram {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Diagram kind, chosen from the file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramKind {
    Activity,
    Class,
    UseCase,
    /// Unrecognised name: every extractor runs
    Unknown,
}

impl DiagramKind {
    /// Case-insensitive, ignoring `_`, `-` and spaces
    pub fn from_file_name(file_name: &str) -> Self {
        let normalized: String = file_name
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        let has_any = |keys: &[&str]| keys.iter().any(|k| normalized.contains(k));

        if has_any(&["activity", "sequence", "flow", "活动图", "序列图", "流程图"]) {
            DiagramKind::Activity
        } else if has_any(&["classdiagram", "类图"]) {
            DiagramKind::Class
        } else if has_any(&["usecasediagram", "用例图"]) {
            DiagramKind::UseCase
        } else {
            DiagramKind::Unknown
        }
    }
}

/// Counts of facts added by one source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub classes: usize,
    pub use_cases: usize,
    pub dependencies: usize,
    pub components: usize,
    pub activities: usize,
}

/// Concatenated bodies of the `plantuml` fenced blocks in a markdown
/// document, or the document unchanged when it has none
pub fn unwrap_markdown(content: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    for event in Parser::new(content) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(lang))) => {
                let lang = lang.trim().to_ascii_lowercase();
                if lang == "plantuml" || lang == "puml" {
                    current = Some(String::new());
                }
            }
            Event::Text(text) => {
                if let Some(block) = current.as_mut() {
                    block.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }

    if blocks.is_empty() {
        content.to_string()
    } else {
        blocks.join("\n")
    }
}

fn is_markdown(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("markdown"))
        .unwrap_or(false)
}

/// Accumulates facts across every diagram of a run
#[derive(Debug, Default)]
pub struct DiagramParser {
    facts: FactSet,
}

impl DiagramParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn facts(&self) -> &FactSet {
        &self.facts
    }

    pub fn into_facts(self) -> FactSet {
        self.facts
    }

    /// Read and parse one diagram file
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> Result<ParseStats, ParseError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ParseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.parse_source(&path.to_string_lossy(), &content))
    }

    /// Parse every file; unreadable ones are logged and skipped. Returns how
    /// many files were parsed.
    pub fn parse_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> usize {
        let mut parsed = 0;
        for path in paths {
            match self.parse_file(path) {
                Ok(stats) => {
                    parsed += 1;
                    tracing::info!(
                        path = %path.as_ref().display(),
                        classes = stats.classes,
                        use_cases = stats.use_cases,
                        dependencies = stats.dependencies,
                        components = stats.components,
                        activities = stats.activities,
                        "parsed diagram"
                    );
                }
                Err(e) => tracing::warn!(error = %e, "skipping diagram"),
            }
        }
        parsed
    }

    /// Parse diagram text; `file_path` drives dispatch and activity scoping
    pub fn parse_source(&mut self, file_path: &str, content: &str) -> ParseStats {
        let text = if is_markdown(file_path) {
            unwrap_markdown(content)
        } else {
            content.to_string()
        };

        let file_name = Path::new(file_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.to_string());

        let mut stats = ParseStats::default();
        match DiagramKind::from_file_name(&file_name) {
            DiagramKind::Activity => {
                self.facts
                    .activities
                    .push(extract_activities(&text, file_path));
                stats.activities = 1;
            }
            DiagramKind::Class => {
                self.class_diagram(&text, &mut stats);
            }
            DiagramKind::UseCase => {
                stats.use_cases = extract_use_cases(&text, &mut self.facts.use_cases);
            }
            DiagramKind::Unknown => {
                self.class_diagram(&text, &mut stats);
                stats.use_cases = extract_use_cases(&text, &mut self.facts.use_cases);
                let fragment = extract_activities(&text, file_path);
                if !fragment.is_empty() {
                    self.facts.activities.push(fragment);
                    stats.activities = 1;
                }
            }
        }
        stats
    }

    fn class_diagram(&mut self, text: &str, stats: &mut ParseStats) {
        stats.classes = extract_classes(text, &mut self.facts.classes);

        for dependency in extract_dependencies(text) {
            if !self.facts.dependencies.contains(&dependency) {
                self.facts.dependencies.push(dependency);
                stats.dependencies += 1;
            }
        }

        for component in extract_components(text) {
            if !self.facts.components.iter().any(|c| c.name == component.name) {
                self.facts.components.push(component);
                stats.components += 1;
            }
        }
    }
}
