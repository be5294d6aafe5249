//! Feasibility checking and Craig interpolation over counterexample paths.
//!
//! One [`InterpolationManager`] owns the solver interaction of the refiner:
//! it decides whether the conjunction of the path's formula blocks is
//! satisfiable, extracts a model for feasible paths, and computes one
//! interpolant per block boundary for spurious ones. The interpolant
//! sequence obeys the chain laws: `true /\ f_0` implies `itp_0`,
//! `itp_{i-1} /\ f_i` implies `itp_i`, and `itp_{n-2} /\ f_{n-1}` is
//! unsatisfiable.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use loris_cfa::EdgeId;
use loris_smt::{GroupId, InterpolatingSolver, Model, SolverError, SolverFactory, Term};

use crate::config::{AnalysisOptions, ItpOrdering};
use crate::error::{EngineError, RefinementError};
use crate::monitor::{self, Monitored};
use crate::path::PathFormulas;

/// Verdict on one counterexample path.
#[derive(Debug)]
pub enum CounterexampleTraceInfo {
    /// The path is concretely executable.
    Feasible {
        model: Model,
        branching: BTreeMap<EdgeId, bool>,
    },
    /// The path is excluded by the interpolant sequence (one interpolant per
    /// block boundary, so `interpolants.len() == blocks - 1`).
    Spurious { interpolants: Vec<Term> },
    /// The path is excluded but no boundary interpolants exist (single-block
    /// refutation). Carries no usable precision information.
    SpuriousNoInterpolants,
}

/// Solver frontend of the refiner.
pub struct InterpolationManager {
    factory: SolverFactory,
    ordering: ItpOrdering,
    well_scoped: bool,
    verify: bool,
    use_useful_blocks: bool,
    reuse_environment: bool,
    time_limit: Option<Duration>,
    max_refinement_size: usize,
    /// Live solver session kept across refinements when environment reuse is
    /// on. Dropped whenever a timed-out worker may still hold it.
    reusable: Option<Interpolator>,
}

impl InterpolationManager {
    pub fn new(factory: SolverFactory, options: &AnalysisOptions) -> Result<Self, EngineError> {
        if options.well_scoped_interpolants && options.itp_ordering != ItpOrdering::Forward {
            return Err(EngineError::Composition(
                "well-scoped interpolants require forward interpolant ordering".to_string(),
            ));
        }
        Ok(Self {
            factory,
            ordering: options.itp_ordering,
            well_scoped: options.well_scoped_interpolants,
            verify: options.verify_interpolants,
            use_useful_blocks: options.use_useful_blocks,
            reuse_environment: options.reuse_interpolation_environment,
            time_limit: options.itp_time_limit,
            max_refinement_size: options.max_refinement_size,
            reusable: None,
        })
    }

    /// Decide the path and, if spurious, compute its interpolant sequence.
    pub fn build_counterexample_trace(
        &mut self,
        path: &PathFormulas,
    ) -> Result<CounterexampleTraceInfo, RefinementError> {
        let size = path.size();
        if self.max_refinement_size > 0 && size > self.max_refinement_size {
            return Err(RefinementError::TooMuchUnrolling {
                size,
                limit: self.max_refinement_size,
            });
        }

        let request = ItpRequest {
            formulas: path.formulas.clone(),
            scope_starts: path.scope_starts.clone(),
            branching: path.branching.clone(),
            ordering: self.ordering,
            well_scoped: self.well_scoped,
            verify: self.verify,
            use_useful_blocks: self.use_useful_blocks,
        };
        let mut interpolator = self
            .reusable
            .take()
            .unwrap_or_else(|| Interpolator::new(Arc::clone(&self.factory)));

        match self.time_limit {
            None => {
                let result = interpolator.run(&request);
                if self.reuse_environment {
                    self.reusable = Some(interpolator);
                }
                Ok(result?)
            }
            Some(limit) => {
                let monitored = monitor::run_with_deadline("loris-itp", limit, move || {
                    let result = interpolator.run(&request);
                    (interpolator, result)
                });
                match monitored {
                    Monitored::Finished((interpolator, result)) => {
                        if self.reuse_environment {
                            self.reusable = Some(interpolator);
                        }
                        Ok(result?)
                    }
                    // The abandoned worker still owns the session; it must
                    // not be reused.
                    Monitored::DeadlineExceeded => Err(RefinementError::Timeout),
                }
            }
        }
    }
}

/// Parameters of one interpolation run, owned so the worker thread can take
/// them across the monitor boundary.
struct ItpRequest {
    formulas: Vec<Term>,
    scope_starts: Vec<usize>,
    branching: BTreeMap<EdgeId, bool>,
    ordering: ItpOrdering,
    well_scoped: bool,
    verify: bool,
    use_useful_blocks: bool,
}

/// One incremental solver session plus the suffix-diffing assertion stack.
struct Interpolator {
    factory: SolverFactory,
    solver: Box<dyn InterpolatingSolver>,
    /// Formulas currently on the solver stack, in assertion order.
    asserted: Vec<(Term, GroupId)>,
}

impl Interpolator {
    fn new(factory: SolverFactory) -> Self {
        let solver = (factory)();
        Self {
            factory,
            solver,
            asserted: Vec::new(),
        }
    }

    fn run(&mut self, request: &ItpRequest) -> Result<CounterexampleTraceInfo, SolverError> {
        let mut formulas = request.formulas.clone();
        if request.use_useful_blocks {
            formulas = self.shrink_to_useful_blocks(formulas)?;
        }

        let n = formulas.len();
        let order = assertion_order(n, request.ordering);
        let groups = self.assert_in_order(&formulas, &order);

        if !self.solver.is_unsat()? {
            let model = self.solver.model()?;
            debug!(blocks = n, "counterexample is feasible");
            return Ok(CounterexampleTraceInfo::Feasible {
                model,
                branching: request.branching.clone(),
            });
        }

        if n <= 1 {
            return Ok(CounterexampleTraceInfo::SpuriousNoInterpolants);
        }
        let mut interpolants: Vec<Option<Term>> = vec![None; n - 1];
        for boundary in boundary_order(n, request.ordering) {
            let a_start = if request.well_scoped {
                request.scope_starts[boundary]
            } else {
                0
            };
            let a_groups: Vec<GroupId> = (a_start..=boundary).map(|i| groups[i]).collect();
            interpolants[boundary] = Some(self.solver.interpolant(&a_groups)?);
        }
        let interpolants: Vec<Term> = interpolants
            .into_iter()
            .map(|itp| itp.unwrap_or_else(|| Term::bool(true)))
            .collect();

        if request.verify {
            self.verify_interpolants(&formulas, &interpolants)?;
        }
        debug!(
            blocks = n,
            interpolants = interpolants.len(),
            "counterexample is spurious"
        );
        Ok(CounterexampleTraceInfo::Spurious { interpolants })
    }

    /// Assert the formulas in the given order, reusing the longest common
    /// prefix already on the solver stack. Returns one group id per
    /// original block index.
    fn assert_in_order(&mut self, formulas: &[Term], order: &[usize]) -> Vec<GroupId> {
        let desired: Vec<&Term> = order.iter().map(|&i| &formulas[i]).collect();
        let common = self
            .asserted
            .iter()
            .zip(&desired)
            .take_while(|((have, _), want)| have == **want)
            .count();
        while self.asserted.len() > common {
            self.solver.pop();
            self.asserted.pop();
        }
        for want in &desired[common..] {
            let gid = self.solver.push((*want).clone());
            self.asserted.push(((*want).clone(), gid));
        }

        let mut groups: Vec<Option<GroupId>> = vec![None; formulas.len()];
        for (pos, &original) in order.iter().enumerate() {
            groups[original] = Some(self.asserted[pos].1);
        }
        groups
            .into_iter()
            .map(|g| g.expect("assertion order covers every block"))
            .collect()
    }

    /// Replace blocks not needed for unsatisfiability with `true`, keeping
    /// block indices aligned with path positions. Deletion-based
    /// minimization on scratch sessions; the incremental session is not
    /// touched.
    fn shrink_to_useful_blocks(&self, mut formulas: Vec<Term>) -> Result<Vec<Term>, SolverError> {
        if !self.scratch_unsat(&formulas)? {
            // Feasible path; the main check will extract the model.
            return Ok(formulas);
        }
        for i in 0..formulas.len() {
            if formulas[i].is_true() {
                continue;
            }
            let saved = std::mem::replace(&mut formulas[i], Term::bool(true));
            if !self.scratch_unsat(&formulas)? {
                formulas[i] = saved;
            }
        }
        Ok(formulas)
    }

    fn scratch_unsat(&self, formulas: &[Term]) -> Result<bool, SolverError> {
        let mut solver = (self.factory)();
        for f in formulas {
            solver.push(f.clone());
        }
        solver.is_unsat()
    }

    /// Check the interpolant sequence against the chain laws and the
    /// shared-symbol property with an independent session.
    fn verify_interpolants(&self, formulas: &[Term], interpolants: &[Term]) -> Result<(), SolverError> {
        let n = formulas.len();
        for (i, itp) in interpolants.iter().enumerate() {
            let mut a_symbols = std::collections::BTreeSet::new();
            let mut b_symbols = std::collections::BTreeSet::new();
            for (j, f) in formulas.iter().enumerate() {
                let side = if j <= i { &mut a_symbols } else { &mut b_symbols };
                side.extend(f.symbols());
            }
            for symbol in itp.symbols() {
                if !(a_symbols.contains(&symbol) && b_symbols.contains(&symbol)) {
                    return Err(SolverError::Backend(format!(
                        "interpolant at boundary {i} mentions unshared symbol {symbol}"
                    )));
                }
            }
        }
        for i in 0..n {
            let premise = if i == 0 {
                Term::bool(true)
            } else {
                interpolants[i - 1].clone()
            };
            let conclusion = if i == n - 1 {
                Term::bool(false)
            } else {
                interpolants[i].clone()
            };
            let mut solver = (self.factory)();
            solver.push(premise);
            solver.push(formulas[i].clone());
            solver.push(conclusion.not());
            if !solver.is_unsat()? {
                return Err(SolverError::Backend(format!(
                    "interpolant chain law violated at block {i}"
                )));
            }
        }
        Ok(())
    }
}

/// Block assertion order under the given policy. The partitions handed to
/// the solver are always original-index prefixes; the policy only changes
/// the order formulas reach the solver stack.
fn assertion_order(n: usize, ordering: ItpOrdering) -> Vec<usize> {
    match ordering {
        ItpOrdering::Forward => (0..n).collect(),
        ItpOrdering::Backward => (0..n).rev().collect(),
        ItpOrdering::Zigzag => {
            let mut out = Vec::with_capacity(n);
            let (mut lo, mut hi) = (0usize, n);
            let mut from_low = true;
            while lo < hi {
                if from_low {
                    out.push(lo);
                    lo += 1;
                } else {
                    hi -= 1;
                    out.push(hi);
                }
                from_low = !from_low;
            }
            out
        }
    }
}

/// Order in which block boundaries are interpolated.
fn boundary_order(n: usize, ordering: ItpOrdering) -> Vec<usize> {
    let boundaries = n.saturating_sub(1);
    assertion_order(boundaries, ordering)
}
