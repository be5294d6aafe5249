mod common;
use common::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use loris_cfa::{Cfa, CfaBuilder, CfaEdge, EdgeOp, Expr, NodeId};
use loris_engine::domains::{ValueAnalysis, ValuePrecision, ValueRefinementStrategy, ValueState};
use loris_engine::{
    AnalysisOptions, Arg, CompositeCpa, Cpa, CpaAlgorithm, DomainPrecision, DomainState, DynValue,
    InterpolationManager, ReachedSet, RefinementOutcome, Refiner, ShutdownSignal, TransferError,
};

/// Counts transfer invocations; yields one successor or none.
struct CountingDomain {
    calls: Arc<AtomicUsize>,
    produces: bool,
}

impl Cpa for CountingDomain {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn initial_state(&self, _cfa: &Cfa, _location: NodeId) -> DomainState {
        Box::new(0u8)
    }

    fn initial_precision(&self, _cfa: &Cfa, _location: NodeId) -> DomainPrecision {
        Arc::new(())
    }

    fn transfer(
        &self,
        state: &dyn DynValue,
        _precision: &dyn DynValue,
        _edge: &CfaEdge,
    ) -> Result<Vec<DomainState>, TransferError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(if self.produces {
            vec![state.dyn_clone()]
        } else {
            Vec::new()
        })
    }
}

fn skip_edge_cfa() -> Arc<Cfa> {
    let mut b = CfaBuilder::new();
    let n0 = b.node("a");
    let n1 = b.node("b");
    b.edge(n0, n1, EdgeOp::Skip);
    Arc::new(b.build(n0))
}

#[test]
fn composite_transfer_short_circuits_on_empty_successors() {
    let cfa = skip_edge_cfa();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let composite = CompositeCpa::new(
        Arc::clone(&cfa),
        vec![
            Arc::new(CountingDomain {
                calls: Arc::clone(&first),
                produces: false,
            }),
            Arc::new(CountingDomain {
                calls: Arc::clone(&second),
                produces: true,
            }),
        ],
    )
    .unwrap();

    let (state, precision) = composite.initial();
    let successors = composite
        .successors(&state, &precision, cfa.edge(0))
        .unwrap();
    assert!(successors.is_empty());
    assert_eq!(first.load(Ordering::Relaxed), 1);
    // The second domain is never consulted.
    assert_eq!(second.load(Ordering::Relaxed), 0);
}

#[test]
fn merge_result_subsumes_the_reached_state() {
    let domain = JoiningValueDomain;
    let precision = ValuePrecision::track_all();
    let a = ValueState {
        assignment: [("x".to_string(), 1)].into(),
    };
    let b = ValueState {
        assignment: [("x".to_string(), 1), ("y".to_string(), 2)].into(),
    };

    let merged = domain.merge(&a, &b, &precision);
    // Monotone merge: b is covered by merge(a, b).
    assert!(domain.stop(&b, &[merged.as_ref()], &precision));
    // And the merge dropped the binding a and b disagree on implicitly
    // (y is unknown in a, so the join may not keep it).
    let merged = merged
        .as_any()
        .downcast_ref::<ValueState>()
        .expect("value state");
    assert_eq!(merged.assignment.get("x"), Some(&1));
    assert_eq!(merged.assignment.get("y"), None);
}

#[test]
fn changed_merge_replaces_the_reached_node_and_requeues_it() {
    // Two paths assign different values to y and join; under a joining merge
    // the reached join node is replaced by the weaker merged state.
    let mut b = CfaBuilder::new();
    let n0 = b.node("entry");
    let left = b.node("left");
    let right = b.node("right");
    let join = b.node("join");
    b.edge(
        n0,
        left,
        EdgeOp::Assign {
            var: "y".into(),
            value: Expr::int(1),
        },
    );
    b.edge(
        n0,
        right,
        EdgeOp::Assign {
            var: "y".into(),
            value: Expr::int(2),
        },
    );
    b.edge(left, join, EdgeOp::Skip);
    b.edge(right, join, EdgeOp::Skip);
    let cfa = Arc::new(b.build(n0));

    let composite = Arc::new(
        CompositeCpa::new(Arc::clone(&cfa), vec![Arc::new(JoiningValueDomain)]).unwrap(),
    );
    let mut algorithm = CpaAlgorithm::new(
        Arc::clone(&composite),
        AnalysisOptions::default(),
        ShutdownSignal::new(),
    );
    let mut arg = Arg::new();
    let mut reached = ReachedSet::new();
    algorithm.seed(&mut arg, &mut reached);
    let targets = algorithm.run(&mut arg, &mut reached).unwrap();
    assert!(targets.is_empty());
    assert!(algorithm.stats.merges >= 1);

    // Exactly one live node remains at the join location, and it knows
    // nothing about y.
    let at_join: Vec<_> = reached.reached_at(join).to_vec();
    assert_eq!(at_join.len(), 1);
    let state = arg.node(at_join[0]).state.slots[0]
        .as_any()
        .downcast_ref::<ValueState>()
        .expect("value state")
        .clone();
    assert!(state.assignment.is_empty());
}

#[test]
fn pruned_subtree_disappears_from_the_reached_index() {
    let program = guarded_safe_program();
    let options = AnalysisOptions::default();
    let composite = Arc::new(
        CompositeCpa::new(Arc::clone(&program.cfa), vec![Arc::new(ValueAnalysis)]).unwrap(),
    );
    let mut algorithm = CpaAlgorithm::new(
        Arc::clone(&composite),
        options.clone(),
        ShutdownSignal::new(),
    );
    let mut arg = Arg::new();
    let mut reached = ReachedSet::new();
    algorithm.seed(&mut arg, &mut reached);
    let targets = algorithm.run(&mut arg, &mut reached).unwrap();
    assert_eq!(targets.len(), 1, "blind round must reach the error");

    let manager = InterpolationManager::new(solver_factory(), &options).unwrap();
    let mut refiner = Refiner::new(
        Arc::clone(&composite),
        manager,
        Box::new(ValueRefinementStrategy::new(0)),
    );
    let outcome = refiner.refine(&mut arg, &mut reached, targets[0]).unwrap();
    assert!(matches!(outcome, RefinementOutcome::Refined));

    // The pivot at the branch location is gone along with its subtree: its
    // state was computed before x was tracked, so it must not be reused.
    assert!(!arg.contains(targets[0]));
    assert!(reached.reached_at(program.error).is_empty());
    assert!(reached.reached_at(program.branch).is_empty());

    // The pivot's parent survives childless, re-queued under a precision
    // that now tracks x at the branch, so the assignment edge re-executes.
    let entry = program.cfa.entry();
    let at_entry = reached.reached_at(entry);
    assert_eq!(at_entry.len(), 1);
    let root = at_entry[0];
    assert!(arg.node(root).children.is_empty());
    let precision = reached.precision(root).slots[0]
        .as_any()
        .downcast_ref::<ValuePrecision>()
        .expect("value precision");
    assert!(precision.tracks(program.branch, "x"));
    assert!(!reached.waitlist_is_empty(), "parent must be re-queued");
}
