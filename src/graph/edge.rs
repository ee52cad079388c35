//! Relationship types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of relationship types
///
/// Diagram arrow tokens are mapped onto this enum; anything unrecognised
/// becomes [`RelationType::RelatesTo`], so free text never reaches a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    HasAttribute,
    Supports,
    Contains,
    Includes,
    HasDiagram,
    Implements,
    Trace,
    InheritsFrom,
    AssociatedWith,
    DependsOn,
    Aggregates,
    Composes,
    RelatesTo,
}

impl RelationType {
    pub const ALL: [RelationType; 13] = [
        RelationType::HasAttribute,
        RelationType::Supports,
        RelationType::Contains,
        RelationType::Includes,
        RelationType::HasDiagram,
        RelationType::Implements,
        RelationType::Trace,
        RelationType::InheritsFrom,
        RelationType::AssociatedWith,
        RelationType::DependsOn,
        RelationType::Aggregates,
        RelationType::Composes,
        RelationType::RelatesTo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::HasAttribute => "HAS_ATTRIBUTE",
            RelationType::Supports => "SUPPORTS",
            RelationType::Contains => "CONTAINS",
            RelationType::Includes => "INCLUDES",
            RelationType::HasDiagram => "HAS_DIAGRAM",
            RelationType::Implements => "IMPLEMENTS",
            RelationType::Trace => "TRACE",
            RelationType::InheritsFrom => "INHERITS_FROM",
            RelationType::AssociatedWith => "ASSOCIATED_WITH",
            RelationType::DependsOn => "DEPENDS_ON",
            RelationType::Aggregates => "AGGREGATES",
            RelationType::Composes => "COMPOSES",
            RelationType::RelatesTo => "RELATES_TO",
        }
    }

    /// Map a diagram arrow token to a relationship type
    pub fn from_token(token: &str) -> Self {
        match token.trim() {
            "<|--" => RelationType::InheritsFrom,
            "--" => RelationType::AssociatedWith,
            "..>" => RelationType::DependsOn,
            "o--" => RelationType::Aggregates,
            "*--" => RelationType::Composes,
            _ => RelationType::RelatesTo,
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
