use std::collections::BTreeSet;

use crate::graph::EdgeId;

/// A unique identifier for a guard-automaton state.
pub type AutomatonStateId = usize;

/// Label of a guard-automaton transition: the set of CFA edges it matches.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum GuardLabel {
    /// Matches exactly the listed CFA edges.
    Edges(BTreeSet<EdgeId>),
    /// Matches every CFA edge.
    Any,
}

impl GuardLabel {
    pub fn edges(ids: impl IntoIterator<Item = EdgeId>) -> Self {
        GuardLabel::Edges(ids.into_iter().collect())
    }

    pub fn matches(&self, edge: EdgeId) -> bool {
        match self {
            GuardLabel::Edges(set) => set.contains(&edge),
            GuardLabel::Any => true,
        }
    }
}

/// A transition of the guard automaton.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GuardEdge {
    pub source: AutomatonStateId,
    pub target: AutomatonStateId,
    pub label: GuardLabel,
}

/// A finite automaton over CFA edges, used for goal tracking and for
/// incremental reuse of analysis results when the automaton evolves.
///
/// Semantics: on a CFA edge, the automaton moves along every matching
/// transition; when no transition matches it stays in its current state.
/// Accepting states mark reached goals (target states for the engine).
#[derive(Debug, Clone, Default)]
pub struct GuardAutomaton {
    num_states: usize,
    initial: AutomatonStateId,
    accepting: BTreeSet<AutomatonStateId>,
    edges: Vec<GuardEdge>,
}

impl GuardAutomaton {
    pub fn new(num_states: usize, initial: AutomatonStateId) -> Self {
        assert!(initial < num_states, "initial state out of range");
        Self {
            num_states,
            initial,
            accepting: BTreeSet::new(),
            edges: Vec::new(),
        }
    }

    pub fn initial(&self) -> AutomatonStateId {
        self.initial
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn mark_accepting(&mut self, state: AutomatonStateId) {
        assert!(state < self.num_states);
        self.accepting.insert(state);
    }

    pub fn is_accepting(&self, state: AutomatonStateId) -> bool {
        self.accepting.contains(&state)
    }

    pub fn add_edge(&mut self, source: AutomatonStateId, target: AutomatonStateId, label: GuardLabel) {
        assert!(source < self.num_states && target < self.num_states);
        self.edges.push(GuardEdge {
            source,
            target,
            label,
        });
    }

    /// All transitions leaving the given state.
    pub fn outgoing_edges(&self, state: AutomatonStateId) -> impl Iterator<Item = &GuardEdge> {
        self.edges.iter().filter(move |e| e.source == state)
    }

    /// Successor states on the given CFA edge. Falls back to staying in
    /// `state` when no transition matches.
    pub fn successors(&self, state: AutomatonStateId, edge: EdgeId) -> Vec<AutomatonStateId> {
        let matched: Vec<AutomatonStateId> = self
            .outgoing_edges(state)
            .filter(|e| e.label.matches(edge))
            .map(|e| e.target)
            .collect();
        if matched.is_empty() {
            vec![state]
        } else {
            matched
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn automaton_stays_put_on_unmatched_edges() {
        let mut a = GuardAutomaton::new(2, 0);
        a.add_edge(0, 1, GuardLabel::edges([7]));
        a.mark_accepting(1);

        assert_eq!(a.successors(0, 3), vec![0]);
        assert_eq!(a.successors(0, 7), vec![1]);
        assert!(a.is_accepting(1));
    }
}
