//! Explicit-value domain: tracks concrete integer values of a precision-
//! selected set of variables per location.
//!
//! The initial precision tracks nothing, so every guard is initially
//! passable and the first analysis round is a pure reachability check;
//! refinement then grows the tracked set from interpolant symbols.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use loris_cfa::{Cfa, CfaEdge, EdgeOp, Expr, NodeId, Value};

use crate::composite::CompositePrecision;
use crate::cpa::{downcast, Cpa, DomainPrecision, DomainState, DynValue};
use crate::error::TransferError;
use crate::refine::{PrecisionIncrement, RefinementStrategy};

/// Partial map from variable names to known concrete values. A missing
/// entry means "any value".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValueState {
    pub assignment: BTreeMap<String, i64>,
}

/// Which variables the domain tracks, per location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuePrecision {
    /// Track every variable everywhere (no refinement needed).
    pub track_all: bool,
    pub by_location: BTreeMap<NodeId, BTreeSet<String>>,
}

impl ValuePrecision {
    pub fn track_all() -> Self {
        Self {
            track_all: true,
            by_location: BTreeMap::new(),
        }
    }

    pub fn untracked() -> Self {
        Self {
            track_all: false,
            by_location: BTreeMap::new(),
        }
    }

    pub fn tracks(&self, location: NodeId, var: &str) -> bool {
        self.track_all
            || self
                .by_location
                .get(&location)
                .is_some_and(|vars| vars.contains(var))
    }
}

/// The explicit-value analysis.
#[derive(Debug, Default)]
pub struct ValueAnalysis;

impl ValueAnalysis {
    fn error(edge: &CfaEdge, reason: impl Into<String>) -> TransferError {
        TransferError {
            domain: "value",
            edge: edge.to_string(),
            reason: reason.into(),
        }
    }
}

impl Cpa for ValueAnalysis {
    fn name(&self) -> &'static str {
        "value"
    }

    fn initial_state(&self, _cfa: &Cfa, _location: NodeId) -> DomainState {
        Box::new(ValueState::default())
    }

    fn initial_precision(&self, _cfa: &Cfa, _location: NodeId) -> DomainPrecision {
        Arc::new(ValuePrecision::untracked())
    }

    fn transfer(
        &self,
        state: &dyn DynValue,
        precision: &dyn DynValue,
        edge: &CfaEdge,
    ) -> Result<Vec<DomainState>, TransferError> {
        let state = downcast::<ValueState>(state);
        let precision = downcast::<ValuePrecision>(precision);
        match &edge.op {
            EdgeOp::Skip | EdgeOp::Call { .. } | EdgeOp::Return => {
                Ok(vec![Box::new(state.clone())])
            }
            EdgeOp::Assign { var, value } => {
                let mut next = state.clone();
                let known = value.eval(&state.assignment).map(|v| v.as_int());
                match known {
                    Some(None) => {
                        return Err(Self::error(edge, "assigned expression is not an integer"))
                    }
                    Some(Some(n)) if precision.tracks(edge.target, var) => {
                        next.assignment.insert(var.clone(), n);
                    }
                    // Untracked or not determined: the old binding is stale
                    // either way.
                    _ => {
                        next.assignment.remove(var);
                    }
                }
                Ok(vec![Box::new(next)])
            }
            EdgeOp::Assume { cond } => match cond.eval(&state.assignment) {
                Some(Value::Bool(false)) => Ok(Vec::new()),
                Some(Value::Bool(true)) => Ok(vec![Box::new(state.clone())]),
                Some(Value::Int(_)) => Err(Self::error(edge, "guard is not boolean")),
                None => {
                    // The guard is open; pass it, but learn a tracked
                    // equality when it pins a single unknown variable.
                    let mut next = state.clone();
                    if let Some((var, n)) = pinned_equality(cond) {
                        if precision.tracks(edge.target, var)
                            && !next.assignment.contains_key(var)
                        {
                            next.assignment.insert(var.to_string(), n);
                        }
                    }
                    Ok(vec![Box::new(next)])
                }
            },
        }
    }

    /// A state with more constraints describes fewer runs: `candidate` is
    /// covered when some reached state's bindings are a subset of its own.
    fn stop(
        &self,
        state: &dyn DynValue,
        reached: &[&dyn DynValue],
        _precision: &dyn DynValue,
    ) -> bool {
        let candidate = downcast::<ValueState>(state);
        reached.iter().any(|r| {
            let reached = downcast::<ValueState>(*r);
            reached
                .assignment
                .iter()
                .all(|(var, value)| candidate.assignment.get(var) == Some(value))
        })
    }
}

/// `x == n` (either operand order) with a literal right side.
fn pinned_equality(cond: &Expr) -> Option<(&str, i64)> {
    match cond {
        Expr::Eq(l, r) => match (&**l, &**r) {
            (Expr::Var(name), Expr::IntLit(n)) | (Expr::IntLit(n), Expr::Var(name)) => {
                Some((name, *n))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Folds interpolant-derived variable sets into the value slot of the
/// composite precision.
pub struct ValueRefinementStrategy {
    slot: usize,
}

impl ValueRefinementStrategy {
    pub fn new(slot: usize) -> Self {
        Self { slot }
    }
}

impl RefinementStrategy for ValueRefinementStrategy {
    fn adds_information(
        &self,
        precision: &CompositePrecision,
        location: NodeId,
        variables: &BTreeSet<String>,
    ) -> bool {
        let value = downcast::<ValuePrecision>(precision.slots[self.slot].as_ref());
        !value.track_all && variables.iter().any(|v| !value.tracks(location, v))
    }

    fn extend(
        &self,
        precision: &CompositePrecision,
        increment: &PrecisionIncrement,
    ) -> CompositePrecision {
        let mut extended = downcast::<ValuePrecision>(precision.slots[self.slot].as_ref()).clone();
        for (location, variables) in increment {
            extended
                .by_location
                .entry(*location)
                .or_default()
                .extend(variables.iter().cloned());
        }
        let mut slots = precision.slots.clone();
        slots[self.slot] = Arc::new(extended);
        CompositePrecision { slots }
    }
}
