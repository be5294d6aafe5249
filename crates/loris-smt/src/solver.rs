use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::terms::Term;

/// Errors surfaced by solver backends.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("unsupported formula fragment: {0}")]
    Unsupported(String),
    #[error("interpolant requested without a preceding unsat check")]
    NotAfterUnsat,
    #[error("model requested without a preceding sat check")]
    NoModel,
    #[error("pop on empty assertion stack")]
    EmptyStack,
    #[error("solver backend failure: {0}")]
    Backend(String),
}

/// Handle to one asserted formula on the solver stack.
///
/// Returned by [`InterpolatingSolver::push`] and consumed by
/// [`InterpolatingSolver::interpolant`] to identify the A-side partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub(crate) u64);

impl GroupId {
    /// Mint a handle. Backends are responsible for uniqueness within one
    /// session.
    pub fn new(raw: u64) -> Self {
        GroupId(raw)
    }

    /// Numeric form, for logs only.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A satisfying assignment extracted from a sat result.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub values: HashMap<String, ModelValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValue {
    Int(i64),
    Bool(bool),
}

impl Model {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ModelValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ModelValue::Bool(b)) => Some(*b),
            Some(ModelValue::Int(n)) => Some(*n != 0),
            None => None,
        }
    }
}

/// Incremental interpolating solver session.
///
/// The engine relies on the following contract:
/// - `push`/`pop` obey stack discipline;
/// - `interpolant` is only called immediately after an `is_unsat` that
///   returned `true`, with exactly the currently-pushed formulas;
/// - `model` is only called immediately after an `is_unsat` that returned
///   `false`;
/// - a session is never shared between threads, and is not reused after it
///   was abandoned by a timed-out caller.
pub trait InterpolatingSolver: Send {
    /// Assert a formula and return its interpolation group handle.
    fn push(&mut self, formula: Term) -> GroupId;

    /// Retract the most recently pushed formula.
    fn pop(&mut self);

    /// Decide satisfiability of the conjunction of all pushed formulas.
    fn is_unsat(&mut self) -> Result<bool, SolverError>;

    /// Interpolant between the formulas in `a_groups` (the A side) and all
    /// other currently-pushed formulas (the B side).
    fn interpolant(&mut self, a_groups: &[GroupId]) -> Result<Term, SolverError>;

    /// Satisfying assignment for the pushed formulas.
    fn model(&mut self) -> Result<Model, SolverError>;
}

/// Factory producing fresh solver sessions.
///
/// One session is created per refinement attempt (or kept long-lived when the
/// interpolation manager reuses its environment); sessions are never shared.
pub type SolverFactory = Arc<dyn Fn() -> Box<dyn InterpolatingSolver> + Send + Sync>;
