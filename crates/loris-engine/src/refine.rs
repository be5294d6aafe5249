//! Counterexample-guided refinement of one target path.
//!
//! The refiner extracts the ARG path to a target node, asks the
//! interpolation manager to decide it, and either builds a concrete witness
//! (feasible) or folds the interpolant symbols into the precision and prunes
//! the stale part of the ARG (spurious).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info};

use loris_cfa::NodeId;
use loris_smt::ModelValue;

use crate::arg::{Arg, ArgId};
use crate::composite::{CompositeCpa, CompositePrecision};
use crate::error::RefinementError;
use crate::interpolation::{CounterexampleTraceInfo, InterpolationManager};
use crate::path::{self, base_name};
use crate::reached::ReachedSet;
use crate::result::Witness;

/// Variables that refinement wants tracked, per location.
pub type PrecisionIncrement = BTreeMap<NodeId, BTreeSet<String>>;

/// Domain-specific half of refinement: deciding whether an increment is new
/// information and folding it into a composite precision.
pub trait RefinementStrategy: Send + Sync {
    /// Whether tracking `variables` at `location` is not already implied by
    /// `precision`.
    fn adds_information(
        &self,
        precision: &CompositePrecision,
        location: NodeId,
        variables: &BTreeSet<String>,
    ) -> bool;

    /// `precision` extended by the whole increment.
    fn extend(
        &self,
        precision: &CompositePrecision,
        increment: &PrecisionIncrement,
    ) -> CompositePrecision;
}

/// Outcome of one refinement attempt.
#[derive(Debug)]
pub enum RefinementOutcome {
    /// The counterexample is real; verification is done.
    Feasible(Witness),
    /// The ARG was pruned and the precision strengthened; the fixpoint can
    /// resume.
    Refined,
}

pub struct Refiner {
    composite: Arc<CompositeCpa>,
    manager: InterpolationManager,
    strategy: Box<dyn RefinementStrategy>,
}

impl Refiner {
    pub fn new(
        composite: Arc<CompositeCpa>,
        manager: InterpolationManager,
        strategy: Box<dyn RefinementStrategy>,
    ) -> Self {
        Self {
            composite,
            manager,
            strategy,
        }
    }

    /// Decide the path to `target` and refine away the spurious prefix.
    pub fn refine(
        &mut self,
        arg: &mut Arg,
        reached: &mut ReachedSet,
        target: ArgId,
    ) -> Result<RefinementOutcome, RefinementError> {
        let (path_nodes, path_edges) = arg.path_from_root(target);
        let formulas = path::encode_path(self.composite.cfa(), &path_edges);
        debug!(
            target,
            edges = path_edges.len(),
            size = formulas.size(),
            "checking counterexample"
        );

        match self.manager.build_counterexample_trace(&formulas)? {
            CounterexampleTraceInfo::Feasible { model, branching } => {
                let assignment = model
                    .values
                    .iter()
                    .map(|(name, value)| {
                        let v = match value {
                            ModelValue::Int(n) => *n,
                            ModelValue::Bool(b) => i64::from(*b),
                        };
                        (name.clone(), v)
                    })
                    .collect();
                info!(edges = path_edges.len(), "counterexample is feasible");
                Ok(RefinementOutcome::Feasible(Witness {
                    edges: path_edges,
                    assignment,
                    branching,
                }))
            }
            CounterexampleTraceInfo::Spurious { interpolants } => {
                let increment = interpolant_increment(&interpolants, &formulas.locations);
                self.apply_refinement(arg, reached, &path_nodes, &formulas.locations, increment)
                    .map(|()| RefinementOutcome::Refined)
                    .map_err(|()| RefinementError::RepeatedCounterexample { path: path_edges })
            }
            CounterexampleTraceInfo::SpuriousNoInterpolants => {
                Err(RefinementError::RepeatedCounterexample { path: path_edges })
            }
        }
    }

    /// Remove the earliest path node that learns something (together with
    /// everything below it) and re-queue its parents under the strengthened
    /// precision, so the edge establishing the learned fact is re-executed.
    /// `Err(())` means the increment taught the analysis nothing new.
    fn apply_refinement(
        &mut self,
        arg: &mut Arg,
        reached: &mut ReachedSet,
        path_nodes: &[ArgId],
        block_locations: &[NodeId],
        increment: PrecisionIncrement,
    ) -> Result<(), ()> {
        if increment.is_empty() {
            return Err(());
        }

        // Path node i + 1 sits at the target location of block i. The pivot
        // is the earliest such node whose precision misses part of the
        // increment for its location.
        let mut pivot = None;
        for (block, &node) in path_nodes.iter().skip(1).enumerate() {
            let location = block_locations[block];
            let Some(variables) = increment.get(&location) else {
                continue;
            };
            let precision = reached.precision(node);
            if self.strategy.adds_information(precision, location, variables) {
                pivot = Some(node);
                break;
            }
        }
        let Some(pivot) = pivot else {
            return Err(());
        };

        // The pivot's own state was computed without the learned facts, on
        // the edge coming into it. Keeping the pivot would re-derive the
        // same counterexample from that stale state, so the pivot goes too
        // and its parents re-explore the incoming edge.
        let new_precision = self.strategy.extend(reached.precision(pivot), &increment);
        let parents: Vec<ArgId> = arg.node(pivot).parents.iter().map(|(p, _)| *p).collect();
        let removal = arg.remove_subtree(pivot);
        for &removed in &removal.removed {
            reached.forget(removed);
        }
        // Covered nodes were never reached; an uncovered node enters the
        // reached set now, inheriting its parent's precision.
        for &uncovered in &removal.uncovered {
            let node = arg.node(uncovered);
            let location = node.state.location;
            let precision = node
                .parents
                .first()
                .map(|(p, _)| reached.precision(*p).clone());
            if let Some(precision) = precision {
                reached.add(uncovered, location, precision);
            }
        }
        for &stale in &removal.stale_parents {
            reached.re_add_to_waitlist(stale, arg.node(stale).state.location);
        }
        for &parent in &parents {
            if !arg.contains(parent) {
                continue;
            }
            reached.set_precision(parent, new_precision.clone());
            reached.re_add_to_waitlist(parent, arg.node(parent).state.location);
        }
        info!(
            pivot,
            removed = removal.removed.len(),
            "pruned spurious subtree"
        );
        Ok(())
    }
}

/// Per-location variable increment from the interpolant sequence. The
/// interpolant at boundary `i` holds at the target location of block `i`;
/// its symbols, stripped of their SSA indices, are the variables worth
/// tracking there.
fn interpolant_increment(interpolants: &[loris_smt::Term], locations: &[NodeId]) -> PrecisionIncrement {
    let mut increment = PrecisionIncrement::new();
    for (i, itp) in interpolants.iter().enumerate() {
        if itp.is_true() || itp.is_false() {
            continue;
        }
        let entry = increment.entry(locations[i]).or_default();
        for symbol in itp.symbols() {
            entry.insert(base_name(&symbol).to_string());
        }
    }
    increment.retain(|_, vars| !vars.is_empty());
    increment
}

#[cfg(test)]
mod tests {
    use super::*;
    use loris_smt::Term;

    #[test]
    fn increment_strips_ssa_indices_and_skips_trivial_interpolants() {
        let interpolants = vec![
            Term::bool(true),
            Term::var("x@2").le(Term::int(0)),
            Term::var("x@2").sub(Term::var("y@1")).le(Term::int(3)),
        ];
        let locations = vec![10, 11, 12];
        let increment = interpolant_increment(&interpolants, &locations);
        assert!(!increment.contains_key(&10));
        assert_eq!(
            increment[&11],
            BTreeSet::from(["x".to_string()])
        );
        assert_eq!(
            increment[&12],
            BTreeSet::from(["x".to_string(), "y".to_string()])
        );
    }
}
