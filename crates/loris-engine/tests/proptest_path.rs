use std::collections::HashMap;

use proptest::prelude::*;

use loris_cfa::{Cfa, CfaBuilder, EdgeId, EdgeOp, Expr};
use loris_engine::path::encode_path;

fn op_strategy() -> impl Strategy<Value = EdgeOp> {
    let var = prop_oneof![Just("x"), Just("y"), Just("z")];
    prop_oneof![
        Just(EdgeOp::Skip),
        (var.clone(), -5i64..5).prop_map(|(v, n)| EdgeOp::Assign {
            var: v.to_string(),
            value: Expr::int(n),
        }),
        (var.clone(), var.clone()).prop_map(|(v, w)| EdgeOp::Assign {
            var: v.to_string(),
            value: Expr::var(w),
        }),
        (var, -5i64..5).prop_map(|(v, n)| EdgeOp::Assume {
            cond: Expr::var(v).eq(Expr::int(n)),
        }),
    ]
}

fn chain(ops: &[EdgeOp]) -> (Cfa, Vec<EdgeId>) {
    let mut b = CfaBuilder::new();
    let entry = b.node("n0");
    let mut prev = entry;
    let mut edges = Vec::new();
    for (i, op) in ops.iter().enumerate() {
        let next = b.node(format!("n{}", i + 1));
        edges.push(b.edge(prev, next, op.clone()));
        prev = next;
    }
    (b.build(entry), edges)
}

proptest! {
    #[test]
    fn blocks_stay_aligned_with_path_positions(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let (cfa, edges) = chain(&ops);
        let pf = encode_path(&cfa, &edges);
        prop_assert_eq!(pf.formulas.len(), edges.len());
        prop_assert_eq!(pf.locations.len(), edges.len());
        prop_assert_eq!(pf.scope_starts.len(), edges.len());
        // A straight-line path without calls stays in the root scope.
        prop_assert!(pf.scope_starts.iter().all(|s| *s == 0));
    }

    #[test]
    fn each_assignment_defines_the_next_ssa_index(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let (cfa, edges) = chain(&ops);
        let pf = encode_path(&cfa, &edges);

        let mut writes: HashMap<String, u32> = HashMap::new();
        for (i, op) in ops.iter().enumerate() {
            match op {
                EdgeOp::Assign { var, .. } => {
                    let count = writes.entry(var.clone()).or_insert(0);
                    *count += 1;
                    let defined = format!("{var}@{count}");
                    prop_assert!(
                        pf.formulas[i].symbols().contains(&defined),
                        "block {i} must define {defined}"
                    );
                }
                EdgeOp::Assume { cond } => {
                    // Guards read the current index of each variable.
                    for var in cond.variables() {
                        let index = writes.get(&var).copied().unwrap_or(0);
                        let read = format!("{var}@{index}");
                        prop_assert!(
                            pf.formulas[i].symbols().contains(&read),
                            "block {i} must read {read}"
                        );
                    }
                }
                _ => {}
            }
        }
    }
}
