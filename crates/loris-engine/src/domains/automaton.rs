//! Guard-automaton domain: runs a [`GuardAutomaton`] alongside the analysis
//! and flags accepting automaton states as targets.

use std::sync::Arc;

use loris_cfa::{AutomatonStateId, Cfa, CfaEdge, GuardAutomaton, NodeId};

use crate::cpa::{downcast, Cpa, DomainPrecision, DomainState, DynValue};
use crate::error::TransferError;

/// Current automaton state, one per composite tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutomatonState {
    pub state: AutomatonStateId,
}

pub struct AutomatonAnalysis {
    automaton: Arc<GuardAutomaton>,
}

impl AutomatonAnalysis {
    pub fn new(automaton: Arc<GuardAutomaton>) -> Self {
        Self { automaton }
    }

    pub fn automaton(&self) -> &Arc<GuardAutomaton> {
        &self.automaton
    }
}

impl Cpa for AutomatonAnalysis {
    fn name(&self) -> &'static str {
        "automaton"
    }

    fn initial_state(&self, _cfa: &Cfa, _location: NodeId) -> DomainState {
        Box::new(AutomatonState {
            state: self.automaton.initial(),
        })
    }

    fn initial_precision(&self, _cfa: &Cfa, _location: NodeId) -> DomainPrecision {
        Arc::new(())
    }

    fn transfer(
        &self,
        state: &dyn DynValue,
        _precision: &dyn DynValue,
        edge: &CfaEdge,
    ) -> Result<Vec<DomainState>, TransferError> {
        let current = downcast::<AutomatonState>(state);
        Ok(self
            .automaton
            .successors(current.state, edge.id)
            .into_iter()
            .map(|s| Box::new(AutomatonState { state: s }) as DomainState)
            .collect())
    }

    fn is_target(&self, state: &dyn DynValue) -> bool {
        self.automaton
            .is_accepting(downcast::<AutomatonState>(state).state)
    }
}
