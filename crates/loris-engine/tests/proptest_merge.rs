mod common;
use common::JoiningValueDomain;

use std::collections::BTreeMap;

use proptest::prelude::*;

use loris_engine::domains::{ValuePrecision, ValueState};
use loris_engine::Cpa;

fn assignment_strategy() -> impl Strategy<Value = BTreeMap<String, i64>> {
    let var = prop_oneof![Just("a"), Just("b"), Just("c"), Just("d")];
    prop::collection::btree_map(var.prop_map(String::from), -3i64..3, 0..4)
}

proptest! {
    #[test]
    fn merge_result_covers_both_operands(
        a in assignment_strategy(),
        b in assignment_strategy(),
    ) {
        let domain = JoiningValueDomain;
        let precision = ValuePrecision::track_all();
        let a = ValueState { assignment: a };
        let b = ValueState { assignment: b };

        // Monotone merge: merge(a, b) must be at least as weak as b, so b
        // is stopped by it. The join here is symmetric, so a is covered too.
        let merged = domain.merge(&a, &b, &precision);
        prop_assert!(domain.stop(&b, &[merged.as_ref()], &precision));
        prop_assert!(domain.stop(&a, &[merged.as_ref()], &precision));
    }

    #[test]
    fn merging_into_a_weaker_state_changes_nothing(
        b in assignment_strategy(),
    ) {
        let domain = JoiningValueDomain;
        let precision = ValuePrecision::track_all();
        let b = ValueState { assignment: b };

        // Joining a state with itself keeps every binding.
        let merged = domain.merge(&b, &b, &precision);
        let merged = merged
            .as_any()
            .downcast_ref::<ValueState>()
            .expect("value state");
        prop_assert_eq!(&merged.assignment, &b.assignment);
    }
}
