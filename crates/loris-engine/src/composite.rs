//! Composition of N wrapped domains into one analysis.
//!
//! The fixpoint engine only ever sees the composite: an ordered tuple of
//! per-domain states and precisions with tuple arity fixed at construction.
//! Transfer short-circuits as soon as one domain reports an empty successor
//! set; cross-domain constraints are applied in a post-hoc strengthen pass
//! in which every domain observes the pre-strengthen tuple.

use std::fmt;
use std::sync::Arc;

use loris_cfa::{Cfa, CfaEdge, NodeId};

use crate::cpa::{Cpa, DomainPrecision, DomainState, PrecisionAdjustmentAction};
use crate::error::{EngineError, TransferError};

/// An abstract state of the composed analysis: the location it denotes plus
/// one state slot per wrapped domain, in domain order.
#[derive(Debug, Clone)]
pub struct CompositeState {
    pub location: NodeId,
    pub slots: Vec<DomainState>,
}

impl PartialEq for CompositeState {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location
            && self.slots.len() == other.slots.len()
            && self
                .slots
                .iter()
                .zip(&other.slots)
                .all(|(a, b)| a.dyn_eq(b.as_ref()))
    }
}

/// Precision of the composed analysis, one slot per wrapped domain.
#[derive(Debug, Clone)]
pub struct CompositePrecision {
    pub slots: Vec<DomainPrecision>,
}

impl fmt::Display for CompositeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{} {:?}", self.location, self.slots)
    }
}

/// The composed analysis. Wraps the domain list and presents single
/// transfer/merge/stop/adjust operators to the engine.
pub struct CompositeCpa {
    cfa: Arc<Cfa>,
    cpas: Vec<Arc<dyn Cpa>>,
}

impl CompositeCpa {
    /// Compose the given domains, in order. The order is part of the
    /// analysis configuration: transfer evaluates domains front to back.
    pub fn new(cfa: Arc<Cfa>, cpas: Vec<Arc<dyn Cpa>>) -> Result<Self, EngineError> {
        if cpas.is_empty() {
            return Err(EngineError::Composition(
                "composite analysis needs at least one domain".to_string(),
            ));
        }
        Ok(Self { cfa, cpas })
    }

    pub fn cfa(&self) -> &Arc<Cfa> {
        &self.cfa
    }

    pub fn num_domains(&self) -> usize {
        self.cpas.len()
    }

    /// Initial composite state and precision at the CFA entry.
    pub fn initial(&self) -> (CompositeState, CompositePrecision) {
        let entry = self.cfa.entry();
        let slots = self
            .cpas
            .iter()
            .map(|c| c.initial_state(&self.cfa, entry))
            .collect();
        let precisions = self
            .cpas
            .iter()
            .map(|c| c.initial_precision(&self.cfa, entry))
            .collect();
        (
            CompositeState {
                location: entry,
                slots,
            },
            CompositePrecision { slots: precisions },
        )
    }

    fn check_arity(&self, state: &CompositeState, precision: &CompositePrecision) {
        // Arity is fixed at construction; a mismatch is a programming error.
        assert_eq!(state.slots.len(), self.cpas.len(), "composite state arity mismatch");
        assert_eq!(
            precision.slots.len(),
            self.cpas.len(),
            "composite precision arity mismatch"
        );
    }

    /// Successor states of `state` over `edge`.
    ///
    /// Evaluates each wrapped transfer relation in domain order and
    /// short-circuits on the first empty successor set; then forms the
    /// cross-tuple of the per-domain successors and runs the strengthen
    /// pass on each tuple.
    pub fn successors(
        &self,
        state: &CompositeState,
        precision: &CompositePrecision,
        edge: &CfaEdge,
    ) -> Result<Vec<CompositeState>, TransferError> {
        self.check_arity(state, precision);

        let mut per_domain: Vec<Vec<DomainState>> = Vec::with_capacity(self.cpas.len());
        for (i, cpa) in self.cpas.iter().enumerate() {
            let succs = cpa.transfer(state.slots[i].as_ref(), precision.slots[i].as_ref(), edge)?;
            if succs.is_empty() {
                return Ok(Vec::new());
            }
            per_domain.push(succs);
        }

        let mut out = Vec::new();
        'tuples: for tuple in cross_product(&per_domain) {
            // Strengthen pass: every domain sees the pre-strengthen tuple;
            // substitutions happen only after the full pass.
            let mut strengthened: Vec<Vec<DomainState>> = Vec::with_capacity(tuple.len());
            for (i, cpa) in self.cpas.iter().enumerate() {
                match cpa.strengthen(tuple[i].as_ref(), &tuple, edge)? {
                    None => strengthened.push(vec![tuple[i].clone()]),
                    Some(states) if states.is_empty() => continue 'tuples,
                    Some(states) => strengthened.push(states),
                }
            }
            for slots in cross_product(&strengthened) {
                out.push(CompositeState {
                    location: edge.target,
                    slots,
                });
            }
        }
        Ok(out)
    }

    /// Per-slot merge of the new state `a` into the reached state `b`.
    pub fn merge(
        &self,
        a: &CompositeState,
        b: &CompositeState,
        precision: &CompositePrecision,
    ) -> CompositeState {
        self.check_arity(a, precision);
        self.check_arity(b, precision);
        debug_assert_eq!(a.location, b.location, "merge across locations");
        let slots = self
            .cpas
            .iter()
            .enumerate()
            .map(|(i, cpa)| {
                cpa.merge(
                    a.slots[i].as_ref(),
                    b.slots[i].as_ref(),
                    precision.slots[i].as_ref(),
                )
            })
            .collect();
        CompositeState {
            location: b.location,
            slots,
        }
    }

    /// Whether `candidate` is covered by `reached`: every slot's stop
    /// operator must agree.
    pub fn covered_by(
        &self,
        candidate: &CompositeState,
        reached: &CompositeState,
        precision: &CompositePrecision,
    ) -> bool {
        self.check_arity(candidate, precision);
        if candidate.location != reached.location {
            return false;
        }
        self.cpas.iter().enumerate().all(|(i, cpa)| {
            cpa.stop(
                candidate.slots[i].as_ref(),
                &[reached.slots[i].as_ref()],
                precision.slots[i].as_ref(),
            )
        })
    }

    /// Per-slot precision adjustment. A `Break` from any slot aborts the
    /// successor immediately.
    pub fn adjust_precision(
        &self,
        state: &CompositeState,
        precision: &CompositePrecision,
    ) -> (CompositeState, CompositePrecision, PrecisionAdjustmentAction) {
        self.check_arity(state, precision);
        let mut states = Vec::with_capacity(self.cpas.len());
        let mut precisions = Vec::with_capacity(self.cpas.len());
        for (i, cpa) in self.cpas.iter().enumerate() {
            let (s, p, action) = cpa.adjust_precision(state.slots[i].as_ref(), &precision.slots[i]);
            if action == PrecisionAdjustmentAction::Break {
                return (
                    CompositeState {
                        location: state.location,
                        slots: state.slots.clone(),
                    },
                    CompositePrecision {
                        slots: precision.slots.clone(),
                    },
                    PrecisionAdjustmentAction::Break,
                );
            }
            states.push(s);
            precisions.push(p);
        }
        (
            CompositeState {
                location: state.location,
                slots: states,
            },
            CompositePrecision { slots: precisions },
            PrecisionAdjustmentAction::Continue,
        )
    }

    /// Whether the state violates the property: an error location, or any
    /// wrapped domain flagging its slot as a target.
    pub fn is_target(&self, state: &CompositeState) -> bool {
        self.cfa.node(state.location).is_error
            || self
                .cpas
                .iter()
                .enumerate()
                .any(|(i, cpa)| cpa.is_target(state.slots[i].as_ref()))
    }
}

/// Lock-step cross product of per-slot alternatives.
fn cross_product<T: Clone>(parts: &[Vec<T>]) -> Vec<Vec<T>> {
    let mut tuples: Vec<Vec<T>> = vec![Vec::new()];
    for alternatives in parts {
        let mut next = Vec::with_capacity(tuples.len() * alternatives.len());
        for tuple in &tuples {
            for alt in alternatives {
                let mut extended = tuple.clone();
                extended.push(alt.clone());
                next.push(extended);
            }
        }
        tuples = next;
    }
    tuples
}
