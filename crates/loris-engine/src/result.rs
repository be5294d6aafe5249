use std::collections::BTreeMap;
use std::fmt;

use loris_cfa::EdgeId;
use serde::Serialize;

/// Why a run ended without a definite verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UnknownReason {
    /// Cooperative cancellation was requested.
    #[serde(rename = "interrupted")]
    Interrupted,
    /// A refinement produced no new precision facts.
    #[serde(rename = "repeated_counterexample")]
    RepeatedCounterexample,
    /// The interpolation deadline expired.
    #[serde(rename = "refinement_timeout")]
    RefinementTimeout,
    /// The path formula outgrew the refinement size budget.
    #[serde(rename = "too_much_unrolling")]
    TooMuchUnrolling,
    /// The configured refinement-round cap was reached.
    #[serde(rename = "refinement_limit")]
    RefinementLimit,
}

impl fmt::Display for UnknownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownReason::Interrupted => write!(f, "interrupted"),
            UnknownReason::RepeatedCounterexample => write!(f, "repeated counterexample"),
            UnknownReason::RefinementTimeout => write!(f, "refinement timeout"),
            UnknownReason::TooMuchUnrolling => write!(f, "too much unrolling"),
            UnknownReason::RefinementLimit => write!(f, "refinement limit reached"),
        }
    }
}

/// Concrete error-path witness accompanying an `UNSAFE` verdict.
#[derive(Debug, Clone, Serialize)]
pub struct Witness {
    /// The CFA edges of the error path, in execution order.
    pub edges: Vec<EdgeId>,
    /// Satisfying assignment of the path formula (SSA-indexed names).
    pub assignment: BTreeMap<String, i64>,
    /// Truth value of each assume edge taken on the path, keyed by edge id.
    pub branching: BTreeMap<EdgeId, bool>,
}

/// The outcome of a verification run.
#[derive(Debug, Clone, Serialize)]
pub enum Verdict {
    /// The error location is unreachable under the final precision.
    Safe,
    /// A feasible error path was found.
    Unsafe { witness: Witness },
    /// The analysis could not decide.
    Unknown { reason: UnknownReason },
}

impl Verdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, Verdict::Safe)
    }

    pub fn is_unsafe(&self) -> bool {
        matches!(self, Verdict::Unsafe { .. })
    }

    /// Structured form for the surrounding reporting layer.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Safe => write!(f, "SAFE"),
            Verdict::Unsafe { witness } => {
                write!(f, "UNSAFE (error path of {} edges)", witness.edges.len())
            }
            Verdict::Unknown { reason } => write!(f, "UNKNOWN ({reason})"),
        }
    }
}

/// Counters reported by the fixpoint engine.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisStatistics {
    /// Frontier nodes expanded.
    pub expansions: u64,
    /// Transfer-relation invocations (per edge).
    pub transfer_calls: u64,
    /// Successors merged into existing states.
    pub merges: u64,
    /// Successors subsumed by the stop operator.
    pub stops: u64,
    /// Successors discarded by precision adjustment (`Break`).
    pub adjustment_breaks: u64,
    /// Monitored transfers that hit their deadline.
    pub transfer_timeouts: u64,
    /// Successors discarded for exceeding the cumulative path budget.
    pub path_budget_discards: u64,
    /// CEGAR refinement rounds performed.
    pub refinements: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdicts_render_and_serialize() {
        let unknown = Verdict::Unknown {
            reason: UnknownReason::RepeatedCounterexample,
        };
        assert_eq!(unknown.to_string(), "UNKNOWN (repeated counterexample)");
        assert_eq!(
            unknown.to_json()["Unknown"]["reason"],
            "repeated_counterexample"
        );

        let unsafe_verdict = Verdict::Unsafe {
            witness: Witness {
                edges: vec![3, 7],
                assignment: BTreeMap::from([("x@0".to_string(), 1)]),
                branching: BTreeMap::from([(3, true)]),
            },
        };
        assert!(unsafe_verdict.is_unsafe());
        assert_eq!(unsafe_verdict.to_json()["Unsafe"]["witness"]["edges"][0], 3);
    }
}
