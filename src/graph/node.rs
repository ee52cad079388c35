//! Node labels, identity keys and property values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// `type` value carried by every activity-diagram `UMLFile` node
pub const ACTIVITY_DIAGRAM: &str = "ActivityDiagram";

/// Closed set of node labels
///
/// Only [`Label::as_str`] values ever reach query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    UseCase,
    Class,
    Attribute,
    Component,
    Activity,
    CodeFile,
    #[serde(rename = "UMLFile")]
    UmlFile,
}

impl Label {
    pub const ALL: [Label; 7] = [
        Label::UseCase,
        Label::Class,
        Label::Attribute,
        Label::Component,
        Label::Activity,
        Label::CodeFile,
        Label::UmlFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::UseCase => "UseCase",
            Label::Class => "Class",
            Label::Attribute => "Attribute",
            Label::Component => "Component",
            Label::Activity => "Activity",
            Label::CodeFile => "CodeFile",
            Label::UmlFile => "UMLFile",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Properties collection, ordered by name
pub type Properties = BTreeMap<String, String>;

/// Identity of a node: its label plus the key properties a merge matches on
///
/// Most labels are keyed by a single property; `Attribute` (name, type) and
/// `UMLFile` (path, type) use composite keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub label: Label,
    pub key: Vec<(&'static str, String)>,
}

impl NodeKey {
    fn single(label: Label, prop: &'static str, value: impl Into<String>) -> Self {
        Self {
            label,
            key: vec![(prop, value.into())],
        }
    }

    pub fn use_case(id: impl Into<String>) -> Self {
        Self::single(Label::UseCase, "id", id)
    }

    pub fn class(id: impl Into<String>) -> Self {
        Self::single(Label::Class, "id", id)
    }

    pub fn attribute(name: impl Into<String>, attr_type: impl Into<String>) -> Self {
        Self {
            label: Label::Attribute,
            key: vec![("name", name.into()), ("type", attr_type.into())],
        }
    }

    pub fn component(name: impl Into<String>) -> Self {
        Self::single(Label::Component, "name", name)
    }

    pub fn activity(id: impl Into<String>) -> Self {
        Self::single(Label::Activity, "id", id)
    }

    pub fn code_file(path: impl Into<String>) -> Self {
        Self::single(Label::CodeFile, "path", path)
    }

    pub fn uml_file(path: impl Into<String>, diagram_type: impl Into<String>) -> Self {
        Self {
            label: Label::UmlFile,
            key: vec![("path", path.into()), ("type", diagram_type.into())],
        }
    }

    /// Canonical text form of the key values, used as the storage identity
    pub fn key_json(&self) -> String {
        let values: Vec<&str> = self.key.iter().map(|(_, v)| v.as_str()).collect();
        serde_json::to_string(&values).unwrap_or_default()
    }

    /// A key with an empty value cannot identify anything
    pub fn is_valid(&self) -> bool {
        !self.key.is_empty() && self.key.iter().all(|(_, v)| !v.trim().is_empty())
    }

    /// Key properties as a property map
    pub fn key_properties(&self) -> Properties {
        self.key
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.label)?;
        for (i, (k, v)) in self.key.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        write!(f, "}}")
    }
}

/// A node read back from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub label: Label,
    pub properties: Properties,
}

impl GraphNode {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}
