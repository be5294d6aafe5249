//! Error-path extraction and path-formula encoding.
//!
//! A counterexample path is turned into one formula block per CFA edge, in
//! single-static-assignment form: every write to a program variable bumps
//! its index, reads use the current index, and names are rendered as
//! `x@3`. The conjunction of all blocks is satisfiable exactly when the
//! path is concretely executable.

use std::collections::{BTreeMap, HashMap};

use loris_cfa::{Cfa, EdgeId, EdgeOp, Expr, NodeId};
use loris_smt::Term;

/// The per-block encoding of one error path.
#[derive(Debug, Clone)]
pub struct PathFormulas {
    /// One formula block per path edge, in execution order. Edges without
    /// data semantics (skip, call, return) contribute `true` blocks so block
    /// indices stay aligned with path positions.
    pub formulas: Vec<Term>,
    /// Direction taken at each assume edge on the path.
    pub branching: BTreeMap<EdgeId, bool>,
    /// Target location of each block's edge.
    pub locations: Vec<NodeId>,
    /// For each block, the block index at which its function scope began.
    /// Used to restrict interpolation partitions to the current scope.
    pub scope_starts: Vec<usize>,
}

impl PathFormulas {
    /// Total term size of the path formula, for refinement size budgets.
    pub fn size(&self) -> usize {
        self.formulas.iter().map(Term::node_count).sum()
    }
}

/// SSA index state during encoding.
#[derive(Debug, Default)]
struct SsaMap {
    indices: HashMap<String, u32>,
}

impl SsaMap {
    fn read(&self, var: &str) -> String {
        ssa_name(var, self.indices.get(var).copied().unwrap_or(0))
    }

    fn write(&mut self, var: &str) -> String {
        let next = self.indices.get(var).copied().unwrap_or(0) + 1;
        self.indices.insert(var.to_string(), next);
        ssa_name(var, next)
    }
}

fn ssa_name(var: &str, index: u32) -> String {
    format!("{var}@{index}")
}

/// The program variable behind an SSA-indexed symbol (`x@3` -> `x`).
pub fn base_name(symbol: &str) -> &str {
    match symbol.rfind('@') {
        Some(pos) => &symbol[..pos],
        None => symbol,
    }
}

/// Encode a CFA edge sequence into per-edge formula blocks.
pub fn encode_path(cfa: &Cfa, edges: &[EdgeId]) -> PathFormulas {
    let mut ssa = SsaMap::default();
    let mut formulas = Vec::with_capacity(edges.len());
    let mut branching = BTreeMap::new();
    let mut locations = Vec::with_capacity(edges.len());
    let mut scope_starts = Vec::with_capacity(edges.len());
    // Stack of block indices where the currently open function scopes began.
    let mut scopes: Vec<usize> = vec![0];

    for (i, &edge_id) in edges.iter().enumerate() {
        let edge = cfa.edge(edge_id);
        let block = match &edge.op {
            EdgeOp::Skip => Term::bool(true),
            EdgeOp::Assign { var, value } => {
                let rhs = expr_to_term(value, &ssa);
                Term::var(ssa.write(var)).eq(rhs)
            }
            EdgeOp::Assume { cond } => {
                // A negated guard is the else-branch of its condition.
                branching.insert(edge_id, !matches!(cond, Expr::Not(_)));
                expr_to_term(cond, &ssa)
            }
            EdgeOp::Call { .. } => {
                scopes.push(i);
                Term::bool(true)
            }
            EdgeOp::Return => {
                if scopes.len() > 1 {
                    scopes.pop();
                }
                Term::bool(true)
            }
        };
        formulas.push(block);
        locations.push(edge.target);
        scope_starts.push(*scopes.last().unwrap_or(&0));
    }

    PathFormulas {
        formulas,
        branching,
        locations,
        scope_starts,
    }
}

/// Translate an edge-label expression under the current SSA indices.
fn expr_to_term(expr: &Expr, ssa: &SsaMap) -> Term {
    match expr {
        Expr::Var(name) => Term::var(ssa.read(name)),
        Expr::IntLit(n) => Term::int(*n),
        Expr::BoolLit(b) => Term::bool(*b),
        Expr::Add(l, r) => expr_to_term(l, ssa).add(expr_to_term(r, ssa)),
        Expr::Sub(l, r) => expr_to_term(l, ssa).sub(expr_to_term(r, ssa)),
        Expr::Mul(l, r) => expr_to_term(l, ssa).mul(expr_to_term(r, ssa)),
        Expr::Eq(l, r) => expr_to_term(l, ssa).eq(expr_to_term(r, ssa)),
        Expr::Ne(l, r) => expr_to_term(l, ssa).ne(expr_to_term(r, ssa)),
        Expr::Lt(l, r) => expr_to_term(l, ssa).lt(expr_to_term(r, ssa)),
        Expr::Le(l, r) => expr_to_term(l, ssa).le(expr_to_term(r, ssa)),
        Expr::Gt(l, r) => expr_to_term(l, ssa).gt(expr_to_term(r, ssa)),
        Expr::Ge(l, r) => expr_to_term(l, ssa).ge(expr_to_term(r, ssa)),
        Expr::And(l, r) => Term::And(vec![expr_to_term(l, ssa), expr_to_term(r, ssa)]),
        Expr::Or(l, r) => Term::Or(vec![expr_to_term(l, ssa), expr_to_term(r, ssa)]),
        Expr::Not(e) => expr_to_term(e, ssa).not(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loris_cfa::CfaBuilder;

    fn chain(ops: Vec<EdgeOp>) -> (Cfa, Vec<EdgeId>) {
        let mut b = CfaBuilder::new();
        let mut prev = b.node("n0");
        let entry = prev;
        let mut edges = Vec::new();
        for (i, op) in ops.into_iter().enumerate() {
            let next = b.node(format!("n{}", i + 1));
            edges.push(b.edge(prev, next, op));
            prev = next;
        }
        (b.build(entry), edges)
    }

    #[test]
    fn assignments_bump_ssa_indices_and_reads_use_current_ones() {
        let (cfa, edges) = chain(vec![
            EdgeOp::Assign {
                var: "x".into(),
                value: Expr::int(0),
            },
            EdgeOp::Assign {
                var: "x".into(),
                value: Expr::var("x").add(Expr::int(1)),
            },
            EdgeOp::Assume {
                cond: Expr::var("x").eq(Expr::int(1)),
            },
        ]);
        let pf = encode_path(&cfa, &edges);
        assert_eq!(pf.formulas[0], Term::var("x@1").eq(Term::int(0)));
        assert_eq!(
            pf.formulas[1],
            Term::var("x@2").eq(Term::var("x@1").add(Term::int(1)))
        );
        assert_eq!(pf.formulas[2], Term::var("x@2").eq(Term::int(1)));
    }

    #[test]
    fn branching_records_the_guard_direction() {
        let (cfa, edges) = chain(vec![
            EdgeOp::Assume {
                cond: Expr::var("x").eq(Expr::int(1)),
            },
            EdgeOp::Assume {
                cond: Expr::var("y").eq(Expr::int(2)).not(),
            },
        ]);
        let pf = encode_path(&cfa, &edges);
        assert_eq!(pf.branching.get(&edges[0]), Some(&true));
        assert_eq!(pf.branching.get(&edges[1]), Some(&false));
    }

    #[test]
    fn scope_starts_follow_calls_and_returns() {
        let (cfa, edges) = chain(vec![
            EdgeOp::Skip,
            EdgeOp::Call {
                function: "f".into(),
            },
            EdgeOp::Skip,
            EdgeOp::Return,
            EdgeOp::Skip,
        ]);
        let pf = encode_path(&cfa, &edges);
        assert_eq!(pf.scope_starts, vec![0, 1, 1, 0, 0]);
    }

    #[test]
    fn base_name_strips_the_ssa_suffix() {
        assert_eq!(base_name("x@3"), "x");
        assert_eq!(base_name("plain"), "plain");
    }
}
