//! The ARG worklist fixpoint.
//!
//! Pops frontier nodes per the traversal order, evaluates the composite
//! transfer relation over every leaving CFA edge, then applies precision
//! adjustment, merge, and stop to each successor before it enters the
//! reached set. Target states are never expanded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use loris_cfa::CfaEdge;

use crate::arg::{Arg, ArgId};
use crate::composite::{CompositeCpa, CompositePrecision, CompositeState};
use crate::config::{AnalysisOptions, TargetPolicy};
use crate::cpa::PrecisionAdjustmentAction;
use crate::error::{EngineError, TransferError};
use crate::monitor::{self, Monitored};
use crate::reached::ReachedSet;
use crate::result::AnalysisStatistics;
use crate::shutdown::ShutdownSignal;

/// The configurable fixpoint engine. One instance drives one ARG/reached-set
/// pair; CEGAR re-enters [`CpaAlgorithm::run`] after each refinement.
pub struct CpaAlgorithm {
    composite: Arc<CompositeCpa>,
    options: AnalysisOptions,
    shutdown: ShutdownSignal,
    pub stats: AnalysisStatistics,
    /// Cumulative monitored-transfer time along the path to each node.
    path_elapsed: HashMap<ArgId, Duration>,
    budget_discards: u32,
}

impl CpaAlgorithm {
    pub fn new(
        composite: Arc<CompositeCpa>,
        options: AnalysisOptions,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            composite,
            options,
            shutdown,
            stats: AnalysisStatistics::default(),
            path_elapsed: HashMap::new(),
            budget_discards: 0,
        }
    }

    pub fn composite(&self) -> &Arc<CompositeCpa> {
        &self.composite
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Seed an empty ARG/reached-set pair with the initial state at the CFA
    /// entry. A no-op when the ARG already has nodes (resumed run).
    pub fn seed(&self, arg: &mut Arg, reached: &mut ReachedSet) {
        if !arg.is_empty() {
            return;
        }
        let (state, precision) = self.composite.initial();
        let location = state.location;
        let is_target = self.composite.is_target(&state);
        let root = arg.add_node(state, None, is_target);
        reached.add(root, location, precision);
        debug!(root, location, "seeded initial state");
    }

    /// Run the worklist to fixpoint or to the first target, per the target
    /// policy. Returns the target nodes found (empty means the waitlist was
    /// exhausted and the ARG is complete).
    pub fn run(&mut self, arg: &mut Arg, reached: &mut ReachedSet) -> Result<Vec<ArgId>, EngineError> {
        // Targets may already exist: a seeded error entry, or leftovers from
        // an earlier round under TargetPolicy::Continue.
        let mut targets: Vec<ArgId> = arg
            .iter()
            .filter(|n| n.is_target && n.covered_by.is_none())
            .map(|n| n.id)
            .collect();
        if !targets.is_empty() && self.options.target_policy == TargetPolicy::StopAtFirst {
            return Ok(targets);
        }

        let cfa = Arc::clone(self.composite.cfa());
        while let Some(id) = reached.pop_frontier(self.options.traversal) {
            self.shutdown.check()?;
            // Popped ids can be stale: removed by refinement, covered, or
            // replaced by a merge after they were enqueued.
            if !arg.contains(id) || arg.node(id).covered_by.is_some() {
                continue;
            }
            if arg.node(id).is_target {
                continue;
            }
            self.stats.expansions += 1;

            let state = arg.node(id).state.clone();
            let precision = reached.precision(id).clone();
            let inherited = self.path_elapsed.get(&id).copied().unwrap_or_default();
            // The expanded node may itself get merged away below; track the
            // live id so new children link to the survivor.
            let mut parent = id;

            for edge in cfa.leaving_edges(state.location) {
                self.stats.transfer_calls += 1;
                let started = Instant::now();
                let successors = match self.monitored_transfer(&state, &precision, edge)? {
                    Some(s) => s,
                    None => {
                        self.stats.transfer_timeouts += 1;
                        debug!(edge = %edge, "transfer hit its deadline, dropping edge");
                        continue;
                    }
                };
                let spent = inherited + started.elapsed();
                if let Some(budget) = self.options.path_time_budget {
                    if spent > budget {
                        self.stats.path_budget_discards += 1;
                        self.budget_discards += 1;
                        if self.budget_discards >= self.options.path_budget_reset_after {
                            self.budget_discards = 0;
                            self.path_elapsed.clear();
                        }
                        continue;
                    }
                }

                for successor in successors {
                    let (successor, succ_precision, action) =
                        self.composite.adjust_precision(&successor, &precision);
                    if action == PrecisionAdjustmentAction::Break {
                        self.stats.adjustment_breaks += 1;
                        continue;
                    }

                    parent = self.merge_into_reached(arg, reached, &successor, parent);

                    if let Some(coverer) = self.find_coverer(arg, reached, &successor, &succ_precision)
                    {
                        self.stats.stops += 1;
                        let covered = arg.add_node(successor, Some((parent, edge.id)), false);
                        arg.set_covered(covered, coverer);
                        continue;
                    }

                    let is_target = self.composite.is_target(&successor);
                    let location = successor.location;
                    let node = arg.add_node(successor, Some((parent, edge.id)), is_target);
                    self.path_elapsed.insert(node, spent);
                    reached.add(node, location, succ_precision);
                    if is_target {
                        debug!(node, location, "target state reached");
                        targets.push(node);
                        if self.options.target_policy == TargetPolicy::StopAtFirst {
                            return Ok(targets);
                        }
                    }
                }
            }
        }

        targets.sort_unstable();
        targets.dedup();
        targets.retain(|t| arg.contains(*t));
        info!(
            expansions = self.stats.expansions,
            reached = arg.len(),
            targets = targets.len(),
            "waitlist exhausted"
        );
        Ok(targets)
    }

    /// Merge the successor into every reached state at its location. Changed
    /// reached states are replaced in the ARG and re-explored. Returns the
    /// (possibly replaced) id of `parent`.
    fn merge_into_reached(
        &mut self,
        arg: &mut Arg,
        reached: &mut ReachedSet,
        successor: &CompositeState,
        parent: ArgId,
    ) -> ArgId {
        let mut parent = parent;
        let candidates: Vec<ArgId> = reached.reached_at(successor.location).to_vec();
        for existing in candidates {
            let existing_precision = reached.precision(existing).clone();
            let merged = self
                .composite
                .merge(successor, &arg.node(existing).state, &existing_precision);
            if merged == arg.node(existing).state {
                continue;
            }
            self.stats.merges += 1;
            let is_target = self.composite.is_target(&merged);
            let replacement = arg.replace_with_merged(existing, merged, is_target);
            reached.replace(existing, replacement, successor.location);
            reached.re_add_to_waitlist(replacement, successor.location);
            if let Some(elapsed) = self.path_elapsed.remove(&existing) {
                self.path_elapsed.insert(replacement, elapsed);
            }
            if existing == parent {
                parent = replacement;
            }
        }
        parent
    }

    /// First reached state at the successor's location that covers it.
    fn find_coverer(
        &self,
        arg: &Arg,
        reached: &ReachedSet,
        successor: &CompositeState,
        precision: &CompositePrecision,
    ) -> Option<ArgId> {
        reached
            .reached_at(successor.location)
            .iter()
            .copied()
            .find(|&r| self.composite.covered_by(successor, &arg.node(r).state, precision))
    }

    /// Transfer with an optional wall-clock deadline. `None` means the
    /// deadline expired and the edge contributes no successors this round.
    fn monitored_transfer(
        &self,
        state: &CompositeState,
        precision: &CompositePrecision,
        edge: &CfaEdge,
    ) -> Result<Option<Vec<CompositeState>>, TransferError> {
        match self.options.transfer_time_limit {
            None => self.composite.successors(state, precision, edge).map(Some),
            Some(limit) => {
                let composite = Arc::clone(&self.composite);
                let state = state.clone();
                let precision = precision.clone();
                let edge = edge.clone();
                let monitored = monitor::run_with_deadline("loris-transfer", limit, move || {
                    composite.successors(&state, &precision, &edge)
                });
                match monitored {
                    Monitored::Finished(result) => result.map(Some),
                    Monitored::DeadlineExceeded => Ok(None),
                }
            }
        }
    }
}
