//! Read-only consistency checks over the three-tier chain

use crate::storage::{ChainCounts, GraphStore, Orphans, StorageResult, TraceChain};
use serde::Serialize;
use std::fmt;

/// Rows sampled unless the caller asks otherwise
pub const DEFAULT_SAMPLE_LIMIT: usize = 10;

/// Chain sample, counts and orphans
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub chains: Vec<TraceChain>,
    pub counts: ChainCounts,
    pub orphans: Orphans,
}

impl VerificationReport {
    /// True when at least one complete chain exists
    pub fn has_chains(&self) -> bool {
        !self.chains.is_empty()
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trace chains (UseCase <- Class <- CodeFile):")?;
        if self.chains.is_empty() {
            writeln!(f, "  no complete chains found")?;
        }
        for chain in &self.chains {
            writeln!(
                f,
                "  {} <- {} <- {}",
                chain.use_case_id, chain.class_name, chain.file_path
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Counts:")?;
        writeln!(f, "  use cases:              {}", self.counts.use_cases)?;
        writeln!(f, "  classes tracing to one: {}", self.counts.classes)?;
        writeln!(f, "  implementing files:     {}", self.counts.code_files)?;

        writeln!(f)?;
        if self.orphans.is_empty() {
            write!(f, "No orphans")?;
            return Ok(());
        }
        writeln!(f, "Orphans:")?;
        for id in &self.orphans.use_cases_without_class {
            writeln!(f, "  use case without class: {}", id)?;
        }
        for name in &self.orphans.classes_without_file {
            writeln!(f, "  class without code file: {}", name)?;
        }
        Ok(())
    }
}

pub struct ConsistencyVerifier<'a, S: GraphStore + ?Sized> {
    store: &'a S,
    limit: usize,
}

impl<'a, S: GraphStore + ?Sized> ConsistencyVerifier<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            limit: DEFAULT_SAMPLE_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn verify(&self) -> StorageResult<VerificationReport> {
        let report = VerificationReport {
            chains: self.store.trace_chains(self.limit)?,
            counts: self.store.chain_counts()?,
            orphans: self.store.orphans()?,
        };

        if !report.has_chains() {
            tracing::warn!("no complete trace chains in the store");
        }
        Ok(report)
    }
}
