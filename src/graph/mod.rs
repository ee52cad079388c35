//! Core graph data structures

mod edge;
mod node;
mod statement;

#[cfg(test)]
mod tests;

pub use edge::RelationType;
pub use node::{GraphNode, Label, NodeKey, Properties, ACTIVITY_DIAGRAM};
pub use statement::{Statement, WriteSummary};
