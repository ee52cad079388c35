//! Per-fact-kind extractors over PlantUML text

use super::facts::{
    activity_id, slugify_identity, ActivityFact, AttributeFact, ClassFact, ComponentFact,
    DependencyFact, UseCaseFact, UNKNOWN_USE_CASE,
};
use super::rules::{apply_rules, Arity, ExtractionRule, RuleMatch, NAME};
use crate::requirement::{extract_requirement_ids, is_requirement_id, normalize_requirement_id};
use regex::Regex;
use std::sync::OnceLock;

// Optional `<<stereotype>>` between a declaration and its body
const STEREOTYPE: &str = r"(?:<<[^>\n]*>>\s*)?";

fn re_attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*[-+#~][ \t]*(?P<name>[^:\n(]*?)[ \t]*:[ \t]*(?P<type>[^\n]*?)[ \t]*$",
        )
        .expect("attribute regex")
    })
}

fn re_trace_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(?P<inner>[^\]\n]*)\]").expect("trace marker regex"))
}

fn re_dependency() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(\w+)\s*(<\|--|--|\.\.>|o--|\*--|--\*|--o|\\--|//--|-->|<--|\.\.\||o\.\.|\*\.\.|<\*--|--\*>|<\|\.\.|\.\.\|>)\s*(\w+)",
        )
        .expect("dependency regex")
    })
}

fn re_package_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"\bpackage\s+{}\s*{}\{{", NAME, STEREOTYPE))
            .expect("package regex")
    })
}

fn re_aliased_class() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"\bclass\s+{}\s+as\s+(?P<alias>[^\s{{]+)", NAME))
            .expect("aliased class regex")
    })
}

fn re_activity_node() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m):(?P<label>[^:;\n]+);|^[ \t]*(?P<marker>start|stop|end)[ \t]*$")
            .expect("activity regex")
    })
}

fn re_arrow_target() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"->\s*"?(?P<target>[^"\n]*)"?"#).expect("arrow regex"))
}

// === Classes ===

fn build_class(m: RuleMatch<'_>) -> ClassFact {
    let id = match m.alias {
        Some(alias) => alias.to_string(),
        None => slugify_identity(m.name),
    };
    let body = m.body.unwrap_or("");
    ClassFact {
        id,
        name: m.name.to_string(),
        attributes: parse_attributes(body),
        traces: parse_trace_markers(body),
    }
}

fn class_rules() -> &'static [ExtractionRule<ClassFact>] {
    static RULES: OnceLock<Vec<ExtractionRule<ClassFact>>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            ExtractionRule::new(
                "class:aliased-with-body",
                &format!(
                    r"\bclass\s+{}\s+as\s+(?P<alias>[^\s{{]+)\s*{}\{{(?P<body>[^}}]*)\}}",
                    NAME, STEREOTYPE
                ),
                Arity::NameAliasBody,
                build_class,
            ),
            ExtractionRule::new(
                "class:aliased",
                &format!(r"\bclass\s+{}\s+as\s+(?P<alias>[^\s{{]+)", NAME),
                Arity::NameAlias,
                build_class,
            ),
            ExtractionRule::new(
                "class:with-body",
                &format!(
                    r"\bclass\s+{}\s*{}\{{(?P<body>[^}}]*)\}}",
                    NAME, STEREOTYPE
                ),
                Arity::NameBody,
                build_class,
            ),
            ExtractionRule::new(
                "class:bare",
                &format!(
                    r"(?m)^[ \t]*(?:abstract\s+)?class\s+{}[ \t]*(?:<<[^>\n]*>>)?[ \t]*$",
                    NAME
                ),
                Arity::Name,
                build_class,
            ),
        ]
    })
}

/// `[-+#~] name : type` lines of a class body, in document order
///
/// Lines missing either the name or the type are skipped.
pub fn parse_attributes(body: &str) -> Vec<AttributeFact> {
    re_attribute()
        .captures_iter(body)
        .filter_map(|caps| {
            let name = caps["name"].trim();
            let attr_type = caps["type"].trim();
            if name.is_empty() || attr_type.is_empty() {
                return None;
            }
            Some(AttributeFact::new(name, attr_type))
        })
        .collect()
}

/// Requirement ids from every bracketed marker in a class body, deduplicated
pub fn parse_trace_markers(body: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for caps in re_trace_marker().captures_iter(body) {
        for id in extract_requirement_ids(&caps["inner"]) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// Append newly declared classes to `acc`; returns how many were added
pub fn extract_classes(text: &str, acc: &mut Vec<ClassFact>) -> usize {
    apply_rules(class_rules(), text, |c| c.id.as_str(), acc)
}

// === Use cases ===

fn build_use_case(m: RuleMatch<'_>) -> UseCaseFact {
    let id = match m.alias {
        Some(alias) if is_requirement_id(alias) => {
            normalize_requirement_id(alias).unwrap_or_else(|| alias.to_string())
        }
        Some(alias) => alias.to_string(),
        None => slugify_identity(m.name),
    };
    UseCaseFact {
        id,
        name: m.name.trim().to_string(),
    }
}

fn use_case_rules() -> &'static [ExtractionRule<UseCaseFact>] {
    static RULES: OnceLock<Vec<ExtractionRule<UseCaseFact>>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            ExtractionRule::new(
                "usecase:keyword-aliased",
                &format!(r"\busecase\s+{}\s+as\s+(?P<alias>[\w.\-]+)", NAME),
                Arity::NameAlias,
                build_use_case,
            ),
            ExtractionRule::new(
                "usecase:paren-aliased",
                r"\((?P<name>[^)\n]+)\)\s+as\s+(?P<alias>[\w.\-]+)",
                Arity::NameAlias,
                build_use_case,
            ),
            ExtractionRule::new(
                "usecase:bare",
                &format!(r"(?m)^[ \t]*usecase\s+{}[ \t]*$", NAME),
                Arity::Name,
                build_use_case,
            ),
        ]
    })
}

/// Append newly declared use cases to `acc`; returns how many were added
pub fn extract_use_cases(text: &str, acc: &mut Vec<UseCaseFact>) -> usize {
    apply_rules(use_case_rules(), text, |u| u.id.as_str(), acc)
}

// === Dependencies ===

/// Every `A <token> B` relation, with the literal token
pub fn extract_dependencies(text: &str) -> Vec<DependencyFact> {
    re_dependency()
        .captures_iter(text)
        .map(|caps| DependencyFact {
            source: caps[1].to_string(),
            token: caps[2].to_string(),
            target: caps[3].to_string(),
        })
        .collect()
}

// === Components ===

/// Byte offset just past the `}` closing the block whose `{` ends at `open`
fn find_block_end(text: &str, open: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (i, ch) in text[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// `package` blocks and the aliased classes declared inside them
///
/// A package whose braces never balance is skipped.
pub fn extract_components(text: &str) -> Vec<ComponentFact> {
    let mut components = Vec::new();
    for caps in re_package_header().captures_iter(text) {
        let Some(name) = caps.name("qname").or_else(|| caps.name("name")) else {
            continue;
        };
        let Some(header) = caps.get(0) else {
            continue;
        };
        let body_start = header.end();
        let Some(body_end) = find_block_end(text, body_start) else {
            tracing::debug!(package = name.as_str(), "unbalanced package body skipped");
            continue;
        };

        let mut class_ids: Vec<String> = Vec::new();
        for class in re_aliased_class().captures_iter(&text[body_start..body_end]) {
            let id = class["alias"].to_string();
            if !class_ids.contains(&id) {
                class_ids.push(id);
            }
        }

        components.push(ComponentFact {
            name: name.as_str().to_string(),
            class_ids,
        });
    }
    components
}

// === Activities ===

/// Use-case id for an activity diagram: from the file name, then the whole
/// path, else [`UNKNOWN_USE_CASE`]
pub fn use_case_for_activity(file_path: &str) -> String {
    let file_name = std::path::Path::new(file_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    normalize_requirement_id(&file_name)
        .or_else(|| normalize_requirement_id(file_path))
        .unwrap_or_else(|| UNKNOWN_USE_CASE.to_string())
}

/// Activity fragment of one diagram
pub fn extract_activities(text: &str, file_path: &str) -> ActivityFact {
    let activities = re_activity_node()
        .captures_iter(text)
        .filter_map(|caps| {
            caps.name("label")
                .or_else(|| caps.name("marker"))
                .map(|m| m.as_str().trim().to_string())
        })
        .filter(|label| !activity_id(label).is_empty())
        .collect();

    let arrows = re_arrow_target()
        .captures_iter(text)
        .map(|caps| caps["target"].trim().to_string())
        .filter(|target| !target.is_empty())
        .collect();

    ActivityFact {
        use_case_id: use_case_for_activity(file_path),
        file_path: file_path.to_string(),
        activities,
        arrows,
    }
}
