//! Incremental reuse of an existing ARG when the guard automaton evolves.
//!
//! Instead of restarting verification after a goal-automaton update, the
//! parts of the ARG whose automaton behavior is unchanged stay valid. Only
//! nodes sitting in an automaton state whose outgoing transitions (or
//! acceptance) differ between the automaton versions are re-opened: their
//! subtrees are dropped and they re-enter the waitlist.

use std::collections::BTreeSet;

use tracing::info;

use loris_cfa::{AutomatonStateId, GuardAutomaton, GuardEdge};

use crate::arg::{Arg, ArgId};
use crate::cpa::downcast;
use crate::domains::automaton::AutomatonState;
use crate::reached::ReachedSet;

/// Automaton states whose behavior differs between the two versions,
/// restricted to states reachable in the old automaton.
///
/// A differing initial state invalidates everything; every old-reachable
/// state is returned in that case.
pub fn changed_states(old: &GuardAutomaton, new: &GuardAutomaton) -> BTreeSet<AutomatonStateId> {
    let mut reachable = BTreeSet::new();
    let mut queue = vec![old.initial()];
    while let Some(state) = queue.pop() {
        if !reachable.insert(state) {
            continue;
        }
        for edge in old.outgoing_edges(state) {
            queue.push(edge.target);
        }
    }

    if old.initial() != new.initial() {
        return reachable;
    }

    reachable
        .iter()
        .copied()
        .filter(|&state| {
            let old_out: BTreeSet<&GuardEdge> = old.outgoing_edges(state).collect();
            let new_out: BTreeSet<&GuardEdge> = new.outgoing_edges(state).collect();
            old_out != new_out || old.is_accepting(state) != new.is_accepting(state)
        })
        .collect()
}

/// Re-open every ARG node whose automaton slot sits in a changed state:
/// drop its subtree and put it back on the waitlist. Returns the number of
/// re-opened nodes; `0` means the old ARG is fully valid for the new
/// automaton.
pub fn reuse_arg(
    arg: &mut Arg,
    reached: &mut ReachedSet,
    automaton_slot: usize,
    old: &GuardAutomaton,
    new: &GuardAutomaton,
) -> usize {
    let frontier = changed_states(old, new);
    if frontier.is_empty() {
        return 0;
    }

    let stale: Vec<ArgId> = arg
        .iter()
        .filter(|n| n.covered_by.is_none())
        .filter(|n| {
            let slot = downcast::<AutomatonState>(n.state.slots[automaton_slot].as_ref());
            frontier.contains(&slot.state)
        })
        .map(|n| n.id)
        .collect();

    let mut reopened = 0;
    for id in stale {
        // Earlier removals may have taken this node with them.
        if !arg.contains(id) {
            continue;
        }
        let location = arg.node(id).state.location;
        if !arg.node(id).children.is_empty() {
            let removal = arg.remove_children_subtrees(id);
            for &removed in &removal.removed {
                reached.forget(removed);
            }
            for &uncovered in &removal.uncovered {
                let node = arg.node(uncovered);
                let precision = node
                    .parents
                    .first()
                    .map(|(p, _)| reached.precision(*p).clone());
                if let Some(precision) = precision {
                    reached.add(uncovered, node.state.location, precision);
                }
            }
            for &parent in &removal.stale_parents {
                reached.re_add_to_waitlist(parent, arg.node(parent).state.location);
            }
        }
        reached.re_add_to_waitlist(id, location);
        reopened += 1;
    }
    info!(
        changed = frontier.len(),
        reopened, "reusing ARG for updated automaton"
    );
    reopened
}

#[cfg(test)]
mod tests {
    use super::*;
    use loris_cfa::GuardLabel;

    #[test]
    fn unchanged_automata_have_no_changed_states() {
        let mut a = GuardAutomaton::new(2, 0);
        a.add_edge(0, 1, GuardLabel::edges([3]));
        a.mark_accepting(1);
        assert!(changed_states(&a, &a.clone()).is_empty());
    }

    #[test]
    fn retargeted_transition_marks_only_its_source() {
        let mut old = GuardAutomaton::new(3, 0);
        old.add_edge(0, 1, GuardLabel::edges([3]));
        old.add_edge(1, 2, GuardLabel::edges([4]));
        old.mark_accepting(2);

        let mut new = GuardAutomaton::new(3, 0);
        new.add_edge(0, 1, GuardLabel::edges([3]));
        new.add_edge(1, 2, GuardLabel::edges([5]));
        new.mark_accepting(2);

        assert_eq!(changed_states(&old, &new), BTreeSet::from([1]));
    }

    #[test]
    fn acceptance_change_marks_the_state() {
        let mut old = GuardAutomaton::new(2, 0);
        old.add_edge(0, 1, GuardLabel::edges([3]));
        let mut new = old.clone();
        new.mark_accepting(1);

        assert_eq!(changed_states(&old, &new), BTreeSet::from([1]));
    }

    #[test]
    fn differing_initial_states_invalidate_all_reachable_states() {
        let mut old = GuardAutomaton::new(2, 0);
        old.add_edge(0, 1, GuardLabel::Any);
        let new = GuardAutomaton::new(2, 1);

        assert_eq!(changed_states(&old, &new), BTreeSet::from([0, 1]));
    }
}
