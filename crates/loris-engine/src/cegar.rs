//! The counterexample-guided abstraction refinement loop.
//!
//! Alternates the worklist fixpoint with refinement: every target the
//! fixpoint produces is either a real counterexample (verdict `UNSAFE`) or
//! spurious, in which case the refiner strengthens the precision, prunes the
//! stale ARG region, and the fixpoint resumes on the surviving frontier.

use tracing::{info, warn};

use crate::algorithm::CpaAlgorithm;
use crate::arg::Arg;
use crate::error::{EngineError, RefinementError};
use crate::reached::ReachedSet;
use crate::refine::{RefinementOutcome, Refiner};
use crate::result::{AnalysisStatistics, UnknownReason, Verdict};

pub struct CegarAlgorithm {
    algorithm: CpaAlgorithm,
    refiner: Refiner,
}

impl CegarAlgorithm {
    pub fn new(algorithm: CpaAlgorithm, refiner: Refiner) -> Self {
        Self { algorithm, refiner }
    }

    pub fn statistics(&self) -> &AnalysisStatistics {
        &self.algorithm.stats
    }

    /// Run verification to a verdict. Seeds the ARG when it is empty, so a
    /// pre-populated (reused) ARG resumes instead of restarting.
    pub fn run(&mut self, arg: &mut Arg, reached: &mut ReachedSet) -> Result<Verdict, EngineError> {
        self.algorithm.seed(arg, reached);
        let max_refinements = self.algorithm.options().max_refinements;

        loop {
            let targets = match self.algorithm.run(arg, reached) {
                Ok(targets) => targets,
                Err(EngineError::Interrupted) => {
                    return Ok(Verdict::Unknown {
                        reason: UnknownReason::Interrupted,
                    })
                }
                Err(e) => return Err(e),
            };
            if targets.is_empty() {
                info!(
                    refinements = self.algorithm.stats.refinements,
                    "no target reachable, program is safe"
                );
                return Ok(Verdict::Safe);
            }

            if self.algorithm.stats.refinements as usize >= max_refinements {
                warn!(max_refinements, "refinement limit reached");
                return Ok(Verdict::Unknown {
                    reason: UnknownReason::RefinementLimit,
                });
            }
            self.algorithm.stats.refinements += 1;

            match self.refiner.refine(arg, reached, targets[0]) {
                Ok(RefinementOutcome::Feasible(witness)) => {
                    return Ok(Verdict::Unsafe { witness })
                }
                Ok(RefinementOutcome::Refined) => continue,
                Err(RefinementError::RepeatedCounterexample { path }) => {
                    warn!(edges = path.len(), "counterexample repeats, giving up");
                    return Ok(Verdict::Unknown {
                        reason: UnknownReason::RepeatedCounterexample,
                    });
                }
                Err(RefinementError::Timeout) => {
                    return Ok(Verdict::Unknown {
                        reason: UnknownReason::RefinementTimeout,
                    })
                }
                Err(RefinementError::TooMuchUnrolling { size, limit }) => {
                    warn!(size, limit, "path formula outgrew the refinement budget");
                    return Ok(Verdict::Unknown {
                        reason: UnknownReason::TooMuchUnrolling,
                    });
                }
                Err(RefinementError::Engine(EngineError::Interrupted)) => {
                    return Ok(Verdict::Unknown {
                        reason: UnknownReason::Interrupted,
                    })
                }
                Err(RefinementError::Engine(e)) => return Err(e),
            }
        }
    }
}
