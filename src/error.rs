//! Typed domain errors for the core's failure kinds.
//!
//! Plumbing errors (config parsing, process spawn failures, malformed
//! responses) stay as `anyhow::Error`; only the classification the core
//! actually branches on (transient, per-PR-merge-rejection, invariant
//! violation) gets its own enum.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Network, API, ref-resolution, or job-list failure. Aborts the whole
    /// iteration; the next iteration retries from scratch with no bookkeeping.
    #[error("transient upstream error: {0}")]
    Transient(#[from] anyhow::Error),

    /// A configuration or invariant violation that should be unreachable.
    /// Fatal for the iteration; callers should log loudly.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

/// Outcome of requesting a merge for one PR. The two named rejection
/// classes are swallowed by the executor with a log entry; everything
/// else aborts the iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Ok,
    /// The PR head changed since observation.
    ModifiedHead,
    /// The forge refuses merge despite a green status.
    Unmergeable,
}

pub type Result<T> = std::result::Result<T, CoreError>;
