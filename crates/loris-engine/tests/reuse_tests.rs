mod common;
use common::*;

use std::sync::Arc;

use loris_cfa::{CfaBuilder, EdgeOp, GuardAutomaton, GuardLabel};
use loris_engine::{reuse, AnalysisOptions, Arg, ReachedSet, Verdict};

/// Straight-line program `n0 -e0-> n1 -e1-> n2 -e2-> n3` plus two automaton
/// versions: v2 appends one transition (and a goal) to v1.
struct Fixture {
    cfa: Arc<loris_cfa::Cfa>,
    v1: Arc<GuardAutomaton>,
    v2: Arc<GuardAutomaton>,
}

fn fixture() -> Fixture {
    let mut b = CfaBuilder::new();
    let n0 = b.node("n0");
    let n1 = b.node("n1");
    let n2 = b.node("n2");
    let n3 = b.node("n3");
    let e0 = b.edge(n0, n1, EdgeOp::Skip);
    b.edge(n1, n2, EdgeOp::Skip);
    let e2 = b.edge(n2, n3, EdgeOp::Skip);
    let cfa = Arc::new(b.build(n0));

    let mut v1 = GuardAutomaton::new(3, 0);
    v1.add_edge(0, 1, GuardLabel::edges([e0]));

    let mut v2 = v1.clone();
    v2.add_edge(1, 2, GuardLabel::edges([e2]));
    v2.mark_accepting(2);

    Fixture {
        cfa,
        v1: Arc::new(v1),
        v2: Arc::new(v2),
    }
}

#[test]
fn appended_goal_transition_reopens_only_the_divergence_frontier() {
    let f = fixture();

    // Full run against the old automaton: no goal, everything explored.
    let mut engine = automaton_engine(
        Arc::clone(&f.cfa),
        Arc::clone(&f.v1),
        AnalysisOptions::default(),
    );
    let mut arg = Arg::new();
    let mut reached = ReachedSet::new();
    let verdict = engine.run(&mut arg, &mut reached).expect("run completes");
    assert!(verdict.is_safe());

    // Reuse: re-open the nodes sitting at the changed automaton state, then
    // resume against the new automaton.
    let reopened = reuse::reuse_arg(&mut arg, &mut reached, 1, &f.v1, &f.v2);
    assert_eq!(reopened, 1, "only the divergence frontier is re-opened");

    let mut resumed = automaton_engine(
        Arc::clone(&f.cfa),
        Arc::clone(&f.v2),
        AnalysisOptions::default(),
    );
    let verdict = resumed.run(&mut arg, &mut reached).expect("run completes");
    assert!(verdict.is_unsafe(), "appended goal is reachable");
    let resumed_transfers = resumed.statistics().transfer_calls;

    // From-scratch baseline against the new automaton.
    let mut scratch = automaton_engine(
        Arc::clone(&f.cfa),
        Arc::clone(&f.v2),
        AnalysisOptions::default(),
    );
    let mut scratch_arg = Arg::new();
    let mut scratch_reached = ReachedSet::new();
    let verdict = scratch
        .run(&mut scratch_arg, &mut scratch_reached)
        .expect("run completes");
    assert!(verdict.is_unsafe());
    let scratch_transfers = scratch.statistics().transfer_calls;

    assert!(
        resumed_transfers < scratch_transfers,
        "reuse must re-evaluate fewer edges ({resumed_transfers} vs {scratch_transfers})"
    );
}

#[test]
fn identical_automaton_reopens_nothing() {
    let f = fixture();
    let mut engine = automaton_engine(
        Arc::clone(&f.cfa),
        Arc::clone(&f.v1),
        AnalysisOptions::default(),
    );
    let mut arg = Arg::new();
    let mut reached = ReachedSet::new();
    engine.run(&mut arg, &mut reached).expect("run completes");

    assert_eq!(reuse::reuse_arg(&mut arg, &mut reached, 1, &f.v1, &f.v1), 0);
    assert!(reached.waitlist_is_empty());
}

#[test]
fn unsafe_verdict_after_reuse_carries_the_full_path() {
    let f = fixture();
    let mut engine = automaton_engine(
        Arc::clone(&f.cfa),
        Arc::clone(&f.v1),
        AnalysisOptions::default(),
    );
    let mut arg = Arg::new();
    let mut reached = ReachedSet::new();
    engine.run(&mut arg, &mut reached).expect("run completes");

    reuse::reuse_arg(&mut arg, &mut reached, 1, &f.v1, &f.v2);
    let mut resumed = automaton_engine(
        Arc::clone(&f.cfa),
        Arc::clone(&f.v2),
        AnalysisOptions::default(),
    );
    match resumed.run(&mut arg, &mut reached).expect("run completes") {
        Verdict::Unsafe { witness } => {
            // The witness spans the whole program, including the reused
            // prefix that was never re-evaluated.
            assert_eq!(witness.edges.len(), 3);
        }
        other => panic!("expected UNSAFE, got {other}"),
    }
}
