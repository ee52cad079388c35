//! Fact types produced by the diagram parser

use serde::Serialize;

/// Maximum length (in characters) of a derived activity id
pub const ACTIVITY_ID_MAX_LEN: usize = 50;

/// Use-case id recorded when an activity diagram's name carries none
pub const UNKNOWN_USE_CASE: &str = "UNKNOWN";

/// A `name : type` line inside a class body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeFact {
    pub name: String,
    #[serde(rename = "type")]
    pub attr_type: String,
}

impl AttributeFact {
    pub fn new(name: impl Into<String>, attr_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attr_type: attr_type.into(),
        }
    }
}

/// A class declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassFact {
    /// Identity key: the declared alias, or the slugified name
    pub id: String,
    pub name: String,
    /// Attributes in document order
    pub attributes: Vec<AttributeFact>,
    /// Normalized requirement ids from the body's trace markers
    pub traces: Vec<String>,
}

/// A use-case declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UseCaseFact {
    pub id: String,
    pub name: String,
}

/// A `package` block and the aliased classes declared inside it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentFact {
    pub name: String,
    pub class_ids: Vec<String>,
}

/// A relation between two identifiers, with the literal arrow token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyFact {
    pub source: String,
    pub token: String,
    pub target: String,
}

/// Activity-diagram fragment scoped under one use case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityFact {
    pub use_case_id: String,
    pub file_path: String,
    /// Activity labels and `start`/`stop`/`end` markers, in document order
    pub activities: Vec<String>,
    /// Arrow target texts, not tied to `activities`
    pub arrows: Vec<String>,
}

impl ActivityFact {
    pub fn is_empty(&self) -> bool {
        self.activities.is_empty() && self.arrows.is_empty()
    }
}

/// Everything extracted from one or more diagram sources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FactSet {
    pub use_cases: Vec<UseCaseFact>,
    pub classes: Vec<ClassFact>,
    pub dependencies: Vec<DependencyFact>,
    pub components: Vec<ComponentFact>,
    pub activities: Vec<ActivityFact>,
}

impl FactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(&self, id: &str) -> Option<&ClassFact> {
        self.classes.iter().find(|c| c.id == id)
    }

    pub fn use_case(&self, id: &str) -> Option<&UseCaseFact> {
        self.use_cases.iter().find(|u| u.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.use_cases.is_empty()
            && self.classes.is_empty()
            && self.dependencies.is_empty()
            && self.components.is_empty()
            && self.activities.is_empty()
    }
}

/// Identity key for a declaration without alias: spaces become `_`, quotes go
pub fn slugify_identity(name: &str) -> String {
    name.replace(' ', "_").replace('"', "")
}

/// Identity key for an activity label, truncated to [`ACTIVITY_ID_MAX_LEN`] chars
pub fn activity_id(label: &str) -> String {
    slugify_identity(label)
        .chars()
        .take(ACTIVITY_ID_MAX_LEN)
        .collect()
}
