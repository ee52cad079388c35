//! Typed write statements and their counters

use super::edge::RelationType;
use super::node::{NodeKey, Properties};
use serde::Serialize;
use std::ops::{Add, AddAssign};

/// A single idempotent graph write
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Upsert a node by key; supplied properties overwrite, others are kept
    MergeNode { key: NodeKey, properties: Properties },
    /// Upsert a relationship between two existing nodes
    MergeEdge {
        from: NodeKey,
        relation: RelationType,
        to: NodeKey,
    },
}

impl Statement {
    pub fn merge_node<I, K, V>(key: NodeKey, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Statement::MergeNode {
            key,
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Upsert a node carrying only its key properties
    pub fn merge_key(key: NodeKey) -> Self {
        Statement::MergeNode {
            key,
            properties: Properties::new(),
        }
    }

    pub fn merge_edge(from: NodeKey, relation: RelationType, to: NodeKey) -> Self {
        Statement::MergeEdge { from, relation, to }
    }
}

/// Counters reported for a write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub nodes_created: u64,
    pub relationships_created: u64,
    pub properties_set: u64,
}

impl WriteSummary {
    /// True when the write created nothing
    pub fn created_nothing(&self) -> bool {
        self.nodes_created == 0 && self.relationships_created == 0
    }
}

impl AddAssign for WriteSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.nodes_created += rhs.nodes_created;
        self.relationships_created += rhs.relationships_created;
        self.properties_set += rhs.properties_set;
    }
}

impl Add for WriteSummary {
    type Output = WriteSummary;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}
