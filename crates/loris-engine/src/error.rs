use loris_cfa::EdgeId;
use loris_smt::SolverError;
use thiserror::Error;

/// A domain could not evaluate an edge (unmodeled feature, bad operand).
///
/// Fatal to the current run; never retried.
#[derive(Debug, Error)]
#[error("domain `{domain}` cannot evaluate `{edge}`: {reason}")]
pub struct TransferError {
    pub domain: &'static str,
    pub edge: String,
    pub reason: String,
}

/// Errors of the fixpoint engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Transfer(#[from] TransferError),
    /// Cooperative cancellation was requested. The reached set is left in a
    /// consistent, resumable state.
    #[error("analysis interrupted")]
    Interrupted,
    #[error("solver failure: {0}")]
    Solver(#[from] SolverError),
    /// Incompatible domain composition detected at construction.
    #[error("invalid analysis composition: {0}")]
    Composition(String),
}

/// Reasons a refinement attempt terminates the CEGAR loop.
#[derive(Debug, Error)]
pub enum RefinementError {
    /// The counterexample yielded no new precision facts; continuing would
    /// re-derive the same path forever.
    #[error("refinement produced no new facts for counterexample of {} edges", path.len())]
    RepeatedCounterexample { path: Vec<EdgeId> },
    /// The interpolation deadline expired.
    #[error("interpolation timed out")]
    Timeout,
    /// The path formula exceeded the configured size budget before any
    /// solver call was made.
    #[error("path formula of size {size} exceeds refinement budget {limit}")]
    TooMuchUnrolling { size: usize, limit: usize },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<SolverError> for RefinementError {
    fn from(e: SolverError) -> Self {
        RefinementError::Engine(EngineError::Solver(e))
    }
}
