//! The configurable-program-analysis plugin surface.
//!
//! A domain implements [`Cpa`] over its own abstract-state and precision
//! types; the engine handles them as opaque [`DynValue`]s and never inspects
//! their contents. Composition of several domains into one analysis is done
//! by [`crate::composite::CompositeCpa`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use loris_cfa::{Cfa, CfaEdge, NodeId};

use crate::error::TransferError;

/// Capability trait for dynamically-typed domain values (abstract states and
/// precisions): cloning, equality, and downcasting.
pub trait DynValue: Any + fmt::Debug + Send + Sync {
    fn dyn_clone(&self) -> Box<dyn DynValue>;
    fn dyn_eq(&self, other: &dyn DynValue) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<T> DynValue for T
where
    T: Any + fmt::Debug + Clone + PartialEq + Send + Sync,
{
    fn dyn_clone(&self) -> Box<dyn DynValue> {
        Box::new(self.clone())
    }

    fn dyn_eq(&self, other: &dyn DynValue) -> bool {
        match other.as_any().downcast_ref::<T>() {
            Some(o) => self == o,
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One domain's abstract state, owned by the ARG node holding it.
pub type DomainState = Box<dyn DynValue>;

/// One domain's precision. Shared immutably; refinement builds replacements
/// instead of mutating in place.
pub type DomainPrecision = Arc<dyn DynValue>;

// No `PartialEq for Box<dyn DynValue>`: that would let the blanket impl
// above cover the box itself, and method calls on a boxed receiver would
// then resolve to the box instead of the value inside. Equality goes
// through `dyn_eq` explicitly.
impl Clone for Box<dyn DynValue> {
    fn clone(&self) -> Self {
        self.dyn_clone()
    }
}

/// Downcast a domain value to its concrete type.
///
/// Panics on mismatch: slot/domain identity is fixed at engine construction,
/// so a mismatch is a programming error, not a recoverable condition.
pub fn downcast<T: Any>(value: &dyn DynValue) -> &T {
    value
        .as_any()
        .downcast_ref::<T>()
        .unwrap_or_else(|| panic!("domain value has unexpected type (composition mismatch)"))
}

/// Signal from precision adjustment to the fixpoint loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecisionAdjustmentAction {
    /// Keep the (possibly coarsened) successor.
    Continue,
    /// Discard the successor and do not explore this branch further.
    Break,
}

/// One pluggable abstract domain: transfer, merge, stop, precision
/// adjustment, and the initial-state/precision factory pair.
///
/// Default implementations give the common merge-sep (never join) and
/// stop-sep (equality coverage) operators; domains override what they need.
pub trait Cpa: Send + Sync {
    /// Short identifier used in diagnostics.
    fn name(&self) -> &'static str;

    fn initial_state(&self, cfa: &Cfa, location: NodeId) -> DomainState;

    fn initial_precision(&self, cfa: &Cfa, location: NodeId) -> DomainPrecision;

    /// Abstract successors of `state` over `edge`. An empty result means the
    /// edge is infeasible in this domain.
    fn transfer(
        &self,
        state: &dyn DynValue,
        precision: &dyn DynValue,
        edge: &CfaEdge,
    ) -> Result<Vec<DomainState>, TransferError>;

    /// Post-hoc constraint from sibling domains' just-computed successor
    /// states. `None` means "no constraint from me"; an empty set prunes the
    /// successor tuple as infeasible.
    ///
    /// Contract: every domain observes the pre-strengthen tuple in
    /// `siblings`; results are substituted only after the whole pass.
    fn strengthen(
        &self,
        _state: &dyn DynValue,
        _siblings: &[DomainState],
        _edge: &CfaEdge,
    ) -> Result<Option<Vec<DomainState>>, TransferError> {
        Ok(None)
    }

    /// Combine the new state `a` with the already-reached state `b`,
    /// returning the replacement for `b`.
    ///
    /// Precondition (caller-enforced, not checked): the result subsumes `b`,
    /// otherwise the fixpoint may not terminate.
    fn merge(
        &self,
        _a: &dyn DynValue,
        b: &dyn DynValue,
        _precision: &dyn DynValue,
    ) -> DomainState {
        b.dyn_clone()
    }

    /// Whether `state` adds no behavior over the given reached states.
    fn stop(
        &self,
        state: &dyn DynValue,
        reached: &[&dyn DynValue],
        _precision: &dyn DynValue,
    ) -> bool {
        reached.iter().any(|r| state.dyn_eq(*r))
    }

    /// Coarsen the state or precision before the successor is stored.
    fn adjust_precision(
        &self,
        state: &dyn DynValue,
        precision: &DomainPrecision,
    ) -> (DomainState, DomainPrecision, PrecisionAdjustmentAction) {
        (
            state.dyn_clone(),
            Arc::clone(precision),
            PrecisionAdjustmentAction::Continue,
        )
    }

    /// Whether this state signals a property violation.
    fn is_target(&self, _state: &dyn DynValue) -> bool {
        false
    }
}
