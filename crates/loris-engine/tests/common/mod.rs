#![allow(dead_code)]

use std::sync::Arc;

use loris_cfa::{Cfa, CfaBuilder, CfaEdge, EdgeId, EdgeOp, Expr, NodeId};
use loris_engine::domains::{
    AutomatonAnalysis, ValueAnalysis, ValuePrecision, ValueRefinementStrategy, ValueState,
};
use loris_engine::{
    AnalysisOptions, CegarAlgorithm, CompositeCpa, Cpa, CpaAlgorithm, DomainPrecision,
    DomainState, DynValue, InterpolationManager, Refiner, ShutdownSignal, TransferError,
};
use loris_smt::{BuiltinSolver, InterpolatingSolver, SolverFactory};

pub fn solver_factory() -> SolverFactory {
    Arc::new(|| Box::new(BuiltinSolver::new()) as Box<dyn InterpolatingSolver>)
}

pub struct BranchProgram {
    pub cfa: Arc<Cfa>,
    pub entry: NodeId,
    pub branch_true: EdgeId,
    pub branch_false: EdgeId,
    pub to_error: EdgeId,
    pub error: NodeId,
}

/// `if (x == 1) target(); else skip();` with `x` unconstrained.
pub fn branch_program() -> BranchProgram {
    let mut b = CfaBuilder::new();
    let n0 = b.node("entry");
    let n1 = b.node("then");
    let n2 = b.node("else");
    let err = b.error_node("error");
    let branch_true = b.edge(
        n0,
        n1,
        EdgeOp::Assume {
            cond: Expr::var("x").eq(Expr::int(1)),
        },
    );
    let branch_false = b.edge(
        n0,
        n2,
        EdgeOp::Assume {
            cond: Expr::var("x").eq(Expr::int(1)).not(),
        },
    );
    let to_error = b.edge(n1, err, EdgeOp::Skip);
    BranchProgram {
        cfa: Arc::new(b.build(n0)),
        entry: n0,
        branch_true,
        branch_false,
        to_error,
        error: err,
    }
}

pub struct GuardedProgram {
    pub cfa: Arc<Cfa>,
    pub assign: EdgeId,
    pub branch: NodeId,
    pub guard_true: EdgeId,
    pub error: NodeId,
}

/// `x := 0; if (x == 1) target(); else skip();` — safe, but only once the
/// analysis tracks `x`.
pub fn guarded_safe_program() -> GuardedProgram {
    let mut b = CfaBuilder::new();
    let n0 = b.node("entry");
    let n1 = b.node("branch");
    let n2 = b.node("else");
    let err = b.error_node("error");
    let assign = b.edge(
        n0,
        n1,
        EdgeOp::Assign {
            var: "x".into(),
            value: Expr::int(0),
        },
    );
    let guard_true = b.edge(
        n1,
        err,
        EdgeOp::Assume {
            cond: Expr::var("x").eq(Expr::int(1)),
        },
    );
    b.edge(
        n1,
        n2,
        EdgeOp::Assume {
            cond: Expr::var("x").eq(Expr::int(1)).not(),
        },
    );
    GuardedProgram {
        cfa: Arc::new(b.build(n0)),
        assign,
        branch: n1,
        guard_true,
        error: err,
    }
}

/// A value domain whose merge joins states by keeping only the agreeing
/// bindings, so the merged state covers both operands.
pub struct JoiningValueDomain;

impl Cpa for JoiningValueDomain {
    fn name(&self) -> &'static str {
        "joining-value"
    }

    fn initial_state(&self, _cfa: &Cfa, _location: NodeId) -> DomainState {
        Box::new(ValueState::default())
    }

    fn initial_precision(&self, _cfa: &Cfa, _location: NodeId) -> DomainPrecision {
        Arc::new(ValuePrecision::track_all())
    }

    fn transfer(
        &self,
        state: &dyn DynValue,
        precision: &dyn DynValue,
        edge: &CfaEdge,
    ) -> Result<Vec<DomainState>, TransferError> {
        ValueAnalysis.transfer(state, precision, edge)
    }

    fn merge(&self, a: &dyn DynValue, b: &dyn DynValue, _precision: &dyn DynValue) -> DomainState {
        let a = a
            .as_any()
            .downcast_ref::<ValueState>()
            .expect("value state");
        let b = b
            .as_any()
            .downcast_ref::<ValueState>()
            .expect("value state");
        let joined = ValueState {
            assignment: b
                .assignment
                .iter()
                .filter(|(var, value)| a.assignment.get(*var) == Some(*value))
                .map(|(var, value)| (var.clone(), *value))
                .collect(),
        };
        Box::new(joined)
    }

    fn stop(
        &self,
        state: &dyn DynValue,
        reached: &[&dyn DynValue],
        precision: &dyn DynValue,
    ) -> bool {
        ValueAnalysis.stop(state, reached, precision)
    }
}

/// A CEGAR engine over the given domains, refining the value slot.
pub fn cegar_engine(
    cfa: Arc<Cfa>,
    cpas: Vec<Arc<dyn Cpa>>,
    value_slot: usize,
    options: AnalysisOptions,
) -> CegarAlgorithm {
    let composite = Arc::new(CompositeCpa::new(cfa, cpas).expect("composition is valid"));
    let algorithm = CpaAlgorithm::new(Arc::clone(&composite), options.clone(), ShutdownSignal::new());
    let manager =
        InterpolationManager::new(solver_factory(), &options).expect("options are consistent");
    let refiner = Refiner::new(
        composite,
        manager,
        Box::new(ValueRefinementStrategy::new(value_slot)),
    );
    CegarAlgorithm::new(algorithm, refiner)
}

/// Engine with the value domain only.
pub fn value_engine(cfa: Arc<Cfa>, options: AnalysisOptions) -> CegarAlgorithm {
    cegar_engine(cfa, vec![Arc::new(ValueAnalysis)], 0, options)
}

/// Engine with the value domain plus a guard automaton.
pub fn automaton_engine(
    cfa: Arc<Cfa>,
    automaton: Arc<loris_cfa::GuardAutomaton>,
    options: AnalysisOptions,
) -> CegarAlgorithm {
    cegar_engine(
        cfa,
        vec![
            Arc::new(ValueAnalysis),
            Arc::new(AutomatonAnalysis::new(automaton)),
        ],
        0,
        options,
    )
}
