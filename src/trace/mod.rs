//! Requirement traceability: linking, verification and reporting

mod linker;
mod report;
mod verifier;

pub use linker::{LinkSummary, TraceLinker};
pub use report::TraceReport;
pub use verifier::{ConsistencyVerifier, VerificationReport, DEFAULT_SAMPLE_LIMIT};
