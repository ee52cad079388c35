//! Store-free requirement trace report

use crate::scanner::ScannedFile;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

const BANNER_WIDTH: usize = 60;
const SECTION_WIDTH: usize = 30;

/// Traced entities grouped by requirement id, then by file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TraceReport {
    /// requirement id -> file path -> entity labels (`Class: X`, `Function: f`)
    pub requirements: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl TraceReport {
    /// Group every traced entity in `files`; paths are shown relative to `root`
    pub fn from_files(files: &[ScannedFile], root: &Path) -> Self {
        let mut requirements: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();

        for file in files {
            let shown = file
                .path
                .strip_prefix(root)
                .unwrap_or(&file.path)
                .to_string_lossy()
                .into_owned();

            for entity in &file.entities {
                let label = format!("{}: {}", entity.kind.as_str(), entity.name);
                for requirement in &entity.traces {
                    requirements
                        .entry(requirement.clone())
                        .or_default()
                        .entry(shown.clone())
                        .or_default()
                        .push(label.clone());
                }
            }
        }

        Self { requirements }
    }

    pub fn requirement_count(&self) -> usize {
        self.requirements.len()
    }

    /// Entity mentions summed over every requirement
    pub fn entity_count(&self) -> usize {
        self.requirements
            .values()
            .flat_map(|files| files.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

impl fmt::Display for TraceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let banner = "=".repeat(BANNER_WIDTH);
        writeln!(f, "{}", banner)?;
        writeln!(f, "Requirement Trace Report")?;
        writeln!(f, "{}", banner)?;

        if self.is_empty() {
            return write!(f, "No trace markers found");
        }

        for (requirement, files) in &self.requirements {
            writeln!(f)?;
            writeln!(f, "[UC] {}", requirement)?;
            writeln!(f, "{}", "-".repeat(SECTION_WIDTH))?;
            for (path, entities) in files {
                writeln!(f, "File: {}", path)?;
                for entity in entities {
                    writeln!(f, "  - {}", entity)?;
                }
            }
        }

        writeln!(f)?;
        writeln!(f, "{}", banner)?;
        writeln!(
            f,
            "{} requirements traced across {} entities",
            self.requirement_count(),
            self.entity_count()
        )?;
        write!(f, "{}", banner)
    }
}
