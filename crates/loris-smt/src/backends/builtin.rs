//! Built-in decision procedure for integer difference constraints.
//!
//! Satisfiability is decided by DPLL-style splitting over the boolean
//! structure with a Bellman-Ford feasibility check on the difference
//! constraints of each branch. Refutations of conjunctive problems are
//! negative cycles in the constraint graph; interpolants are obtained by
//! summarizing the maximal A-labeled sub-paths of the refuting cycle, which
//! yields formulas over exactly the symbols shared between the A and B
//! partitions.

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use crate::solver::{GroupId, InterpolatingSolver, Model, ModelValue, SolverError};
use crate::terms::Term;

/// A difference constraint `plus - minus <= bound`, where a missing side
/// stands for the constant zero.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DiffCon {
    plus: Option<String>,
    minus: Option<String>,
    bound: i64,
}

/// Normal form of an asserted formula: negations pushed to the atoms,
/// atoms linearized into difference constraints.
#[derive(Debug, Clone)]
enum Norm {
    True,
    False,
    /// Conjunction of difference constraints.
    Lits(Vec<DiffCon>),
    And(Vec<Norm>),
    Or(Vec<Norm>),
}

/// Linear combination of variables plus a constant.
#[derive(Debug, Clone, Default)]
struct LinExpr {
    coeffs: BTreeMap<String, i64>,
    constant: i64,
}

impl LinExpr {
    fn constant(n: i64) -> Self {
        LinExpr {
            coeffs: BTreeMap::new(),
            constant: n,
        }
    }

    fn variable(name: &str) -> Self {
        LinExpr {
            coeffs: BTreeMap::from([(name.to_string(), 1)]),
            constant: 0,
        }
    }

    fn negate(mut self) -> Self {
        for c in self.coeffs.values_mut() {
            *c = -*c;
        }
        self.constant = -self.constant;
        self
    }

    fn add(mut self, other: LinExpr) -> Self {
        for (name, c) in other.coeffs {
            let entry = self.coeffs.entry(name).or_insert(0);
            *entry += c;
        }
        self.coeffs.retain(|_, c| *c != 0);
        self.constant += other.constant;
        self
    }

    fn sub(self, other: LinExpr) -> Self {
        self.add(other.negate())
    }

    fn scale(mut self, factor: i64) -> Self {
        for c in self.coeffs.values_mut() {
            *c *= factor;
        }
        self.coeffs.retain(|_, c| *c != 0);
        self.constant *= factor;
        self
    }

    fn from_term(term: &Term) -> Result<LinExpr, SolverError> {
        match term {
            Term::Var(name) => Ok(LinExpr::variable(name)),
            Term::IntLit(n) => Ok(LinExpr::constant(*n)),
            Term::Add(l, r) => Ok(LinExpr::from_term(l)?.add(LinExpr::from_term(r)?)),
            Term::Sub(l, r) => Ok(LinExpr::from_term(l)?.sub(LinExpr::from_term(r)?)),
            Term::Mul(l, r) => match (&**l, &**r) {
                (Term::IntLit(n), other) | (other, Term::IntLit(n)) => {
                    Ok(LinExpr::from_term(other)?.scale(*n))
                }
                _ => Err(SolverError::Unsupported(
                    "non-linear multiplication".to_string(),
                )),
            },
            other => Err(SolverError::Unsupported(format!(
                "arithmetic position holds non-arithmetic term: {other}"
            ))),
        }
    }

    /// Turn `self <= 0` into a difference constraint, if it is one.
    fn into_diff_le_zero(self) -> Result<DiffCon, SolverError> {
        let mut plus = None;
        let mut minus = None;
        for (name, c) in &self.coeffs {
            match c {
                1 if plus.is_none() => plus = Some(name.clone()),
                -1 if minus.is_none() => minus = Some(name.clone()),
                _ => {
                    return Err(SolverError::Unsupported(format!(
                        "constraint is not a difference constraint (coefficient {c} on {name})"
                    )))
                }
            }
        }
        Ok(DiffCon {
            plus,
            minus,
            bound: -self.constant,
        })
    }
}

/// Normalize `term` (negated if `negated`) into [`Norm`].
fn normalize(term: &Term, negated: bool) -> Result<Norm, SolverError> {
    match term {
        Term::BoolLit(b) => Ok(if *b != negated { Norm::True } else { Norm::False }),
        // A bare variable in boolean position is pinned to 1 (true) or 0.
        Term::Var(name) => {
            let value = if negated { 0 } else { 1 };
            let e = LinExpr::variable(name).sub(LinExpr::constant(value));
            Ok(Norm::Lits(vec![
                e.clone().into_diff_le_zero()?,
                e.negate().into_diff_le_zero()?,
            ]))
        }
        Term::Not(t) => normalize(t, !negated),
        Term::And(ts) => {
            let parts = ts
                .iter()
                .map(|t| normalize(t, negated))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(if negated { Norm::Or(parts) } else { Norm::And(parts) })
        }
        Term::Or(ts) => {
            let parts = ts
                .iter()
                .map(|t| normalize(t, negated))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(if negated { Norm::And(parts) } else { Norm::Or(parts) })
        }
        Term::Implies(l, r) => {
            let parts = vec![normalize(l, !negated)?, normalize(r, negated)?];
            Ok(if negated { Norm::And(parts) } else { Norm::Or(parts) })
        }
        Term::Le(l, r) | Term::Gt(l, r) => {
            // l <= r, negated form is l > r.
            let gt = matches!(term, Term::Gt(..)) != negated;
            let e = LinExpr::from_term(l)?.sub(LinExpr::from_term(r)?);
            atom(if gt { strict(e.negate()) } else { e })
        }
        Term::Lt(l, r) | Term::Ge(l, r) => {
            let ge = matches!(term, Term::Ge(..)) != negated;
            let e = LinExpr::from_term(l)?.sub(LinExpr::from_term(r)?);
            atom(if ge { e.negate() } else { strict(e) })
        }
        Term::Eq(l, r) | Term::Ne(l, r) => {
            let ne = matches!(term, Term::Ne(..)) != negated;
            let e = LinExpr::from_term(l)?.sub(LinExpr::from_term(r)?);
            if ne {
                // e != 0  <=>  e <= -1 \/ -e <= -1
                Ok(Norm::Or(vec![
                    atom(strict(e.clone()))?,
                    atom(strict(e.negate()))?,
                ]))
            } else {
                Ok(Norm::Lits(vec![
                    e.clone().into_diff_le_zero()?,
                    e.negate().into_diff_le_zero()?,
                ]))
            }
        }
        Term::IntLit(_) | Term::Add(..) | Term::Sub(..) | Term::Mul(..) => Err(
            SolverError::Unsupported(format!("arithmetic term in boolean position: {term}")),
        ),
    }
}

/// `e < 0` as `e + 1 <= 0` over the integers.
fn strict(e: LinExpr) -> LinExpr {
    e.add(LinExpr::constant(1))
}

fn atom(e: LinExpr) -> Result<Norm, SolverError> {
    Ok(Norm::Lits(vec![e.into_diff_le_zero()?]))
}

/// One edge of the difference-constraint graph, tagged with the assertion
/// group it came from.
#[derive(Debug, Clone)]
struct ConEdge {
    con: DiffCon,
    group: u64,
}

/// Result of a feasibility check on a conjunction of difference constraints.
enum Feasibility {
    /// A satisfying variable assignment.
    Feasible(HashMap<String, i64>),
    /// The refuting negative cycle, as a forward-ordered edge sequence.
    Infeasible(Vec<ConEdge>),
}

/// Bellman-Ford feasibility over the shared-source potential graph.
///
/// A constraint `x - y <= c` is the edge `y -> x` with weight `c`; the
/// conjunction is satisfiable iff the graph has no negative cycle. The
/// missing side of a constraint attaches to a dedicated zero node, so purely
/// constant contradictions surface as negative self-loops.
fn check_feasibility(cons: &[ConEdge]) -> Feasibility {
    // Node 0 is the zero node.
    let mut names: Vec<Option<String>> = vec![None];
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut node = |name: &Option<String>, names: &mut Vec<Option<String>>| -> usize {
        match name {
            None => 0,
            Some(n) => *index.entry(n.clone()).or_insert_with(|| {
                names.push(Some(n.clone()));
                names.len() - 1
            }),
        }
    };

    struct Edge {
        from: usize,
        to: usize,
        weight: i64,
        con: usize,
    }
    let mut edges = Vec::with_capacity(cons.len());
    for (i, c) in cons.iter().enumerate() {
        let from = node(&c.con.minus, &mut names);
        let to = node(&c.con.plus, &mut names);
        edges.push(Edge {
            from,
            to,
            weight: c.con.bound,
            con: i,
        });
    }

    let n = names.len();
    let mut dist = vec![0i64; n];
    let mut parent: Vec<Option<usize>> = vec![None; n];

    let mut touched = None;
    for round in 0..=n {
        let mut changed = None;
        for e in &edges {
            if dist[e.from] + e.weight < dist[e.to] {
                dist[e.to] = dist[e.from] + e.weight;
                parent[e.to] = Some(e.con);
                changed = Some(e.to);
            }
        }
        match changed {
            None => break,
            Some(v) if round == n => {
                touched = Some(v);
                break;
            }
            Some(_) => {}
        }
    }

    let Some(mut v) = touched else {
        let zero = dist[0];
        let model = names
            .iter()
            .enumerate()
            .filter_map(|(i, name)| name.clone().map(|n| (n, dist[i] - zero)))
            .collect();
        return Feasibility::Feasible(model);
    };

    // Walk parent pointers n times to land inside the cycle, then collect it.
    for _ in 0..n {
        let e = parent[v].expect("relaxed node must have a parent edge");
        v = edges[e].from;
    }
    let start = v;
    let mut cycle = Vec::new();
    loop {
        let e = parent[v].expect("cycle node must have a parent edge");
        cycle.push(cons[edges[e].con].clone());
        v = edges[e].from;
        if v == start {
            break;
        }
    }
    // Collected backwards (to -> from); reverse into forward edge order.
    cycle.reverse();
    debug_assert!(cycle.iter().map(|e| e.con.bound).sum::<i64>() < 0);
    Feasibility::Infeasible(cycle)
}

/// DPLL over the boolean structure: split on disjunctions, decide leaves with
/// the difference-constraint feasibility check.
fn dpll(fixed: Vec<ConEdge>, mut pending: Vec<(Norm, u64)>) -> Option<HashMap<String, i64>> {
    let mut fixed = fixed;
    while let Some((norm, group)) = pending.pop() {
        match norm {
            Norm::True => {}
            Norm::False => return None,
            Norm::Lits(cs) => {
                fixed.extend(cs.into_iter().map(|con| ConEdge { con, group }));
            }
            Norm::And(parts) => {
                pending.extend(parts.into_iter().map(|p| (p, group)));
            }
            Norm::Or(parts) => {
                for part in parts {
                    let mut branch = pending.clone();
                    branch.push((part, group));
                    if let Some(model) = dpll(fixed.clone(), branch) {
                        return Some(model);
                    }
                }
                return None;
            }
        }
    }
    match check_feasibility(&fixed) {
        Feasibility::Feasible(model) => Some(model),
        Feasibility::Infeasible(_) => None,
    }
}

#[derive(Debug, Clone)]
enum LastCheck {
    None,
    Sat(HashMap<String, i64>),
    Unsat,
}

/// The built-in interpolating solver.
pub struct BuiltinSolver {
    stack: Vec<(GroupId, Term)>,
    next_group: u64,
    last_check: LastCheck,
}

impl BuiltinSolver {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            next_group: 0,
            last_check: LastCheck::None,
        }
    }

    /// The asserted stack flattened into difference constraints. Fails when
    /// any asserted formula needs case splitting, since cycle-partition
    /// interpolation is only defined for conjunctive refutations.
    fn conjunctive_constraints(&self) -> Result<Vec<ConEdge>, SolverError> {
        let mut cons = Vec::new();
        for (gid, term) in &self.stack {
            let mut todo = vec![normalize(term, false)?];
            while let Some(norm) = todo.pop() {
                match norm {
                    Norm::True => {}
                    // An asserted `false`: a constant contradiction, kept as
                    // a negative self-loop on the zero node.
                    Norm::False => cons.push(ConEdge {
                        con: DiffCon {
                            plus: None,
                            minus: None,
                            bound: -1,
                        },
                        group: gid.0,
                    }),
                    Norm::Lits(cs) => {
                        cons.extend(cs.into_iter().map(|con| ConEdge { con, group: gid.0 }))
                    }
                    Norm::And(parts) => todo.extend(parts),
                    Norm::Or(_) => {
                        return Err(SolverError::Unsupported(
                            "disjunctive formula in interpolation problem".to_string(),
                        ))
                    }
                }
            }
        }
        Ok(cons)
    }

    /// Summarize the maximal A-labeled runs of the refuting cycle.
    fn cycle_interpolant(cycle: &[ConEdge], a_groups: &[GroupId]) -> Term {
        let is_a: Vec<bool> = cycle
            .iter()
            .map(|e| a_groups.iter().any(|g| g.0 == e.group))
            .collect();

        if is_a.iter().all(|a| !a) {
            return Term::bool(true);
        }
        if is_a.iter().all(|a| *a) {
            return Term::bool(false);
        }

        let len = cycle.len();
        // Rotate so scanning starts at an A edge preceded by a B edge.
        let start = (0..len)
            .find(|i| is_a[*i] && !is_a[(*i + len - 1) % len])
            .expect("mixed cycle has an A-run start");

        let mut atoms = Vec::new();
        let mut run: Option<(Option<String>, i64)> = None; // (run start node, weight)
        for k in 0..len {
            let i = (start + k) % len;
            let edge = &cycle[i];
            if is_a[i] {
                let (s, w) = run.take().unwrap_or((edge.con.minus.clone(), 0));
                run = Some((s, w + edge.con.bound));
                let run_end = edge.con.plus.clone();
                // Close the run if the next edge is B (or the cycle ends).
                let next = (i + 1) % len;
                if !is_a[next] {
                    let (s, w) = run.take().expect("open run");
                    if let Some(atom) = run_atom(s, run_end, w) {
                        atoms.push(atom);
                    }
                }
            }
        }
        Term::and_all(atoms)
    }
}

/// Atom summarizing an A-run from `s` to `t` with total weight `w`:
/// `t - s <= w`. Returns `None` for the vacuous `0 <= w` with `w >= 0`.
fn run_atom(s: Option<String>, t: Option<String>, w: i64) -> Option<Term> {
    match (t, s) {
        (Some(t), Some(s)) => Some(Term::var(t).sub(Term::var(s)).le(Term::int(w))),
        (Some(t), None) => Some(Term::var(t).le(Term::int(w))),
        (None, Some(s)) => Some(Term::var(s).ge(Term::int(-w))),
        (None, None) => {
            if w < 0 {
                Some(Term::bool(false))
            } else {
                None
            }
        }
    }
}

impl Default for BuiltinSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl InterpolatingSolver for BuiltinSolver {
    fn push(&mut self, formula: Term) -> GroupId {
        let gid = GroupId(self.next_group);
        self.next_group += 1;
        self.stack.push((gid, formula));
        self.last_check = LastCheck::None;
        gid
    }

    fn pop(&mut self) {
        assert!(!self.stack.is_empty(), "pop on empty assertion stack");
        self.stack.pop();
        self.last_check = LastCheck::None;
    }

    fn is_unsat(&mut self) -> Result<bool, SolverError> {
        let pending = self
            .stack
            .iter()
            .map(|(gid, t)| Ok((normalize(t, false)?, gid.0)))
            .collect::<Result<Vec<_>, SolverError>>()?;
        match dpll(Vec::new(), pending) {
            Some(model) => {
                trace!(assertions = self.stack.len(), "sat");
                self.last_check = LastCheck::Sat(model);
                Ok(false)
            }
            None => {
                trace!(assertions = self.stack.len(), "unsat");
                self.last_check = LastCheck::Unsat;
                Ok(true)
            }
        }
    }

    fn interpolant(&mut self, a_groups: &[GroupId]) -> Result<Term, SolverError> {
        if !matches!(self.last_check, LastCheck::Unsat) {
            return Err(SolverError::NotAfterUnsat);
        }
        let cons = self.conjunctive_constraints()?;
        match check_feasibility(&cons) {
            Feasibility::Infeasible(cycle) => Ok(Self::cycle_interpolant(&cycle, a_groups)),
            Feasibility::Feasible(_) => Err(SolverError::Unsupported(
                "refutation requires case splitting; no conjunctive refutation exists".to_string(),
            )),
        }
    }

    fn model(&mut self) -> Result<Model, SolverError> {
        match &self.last_check {
            LastCheck::Sat(assignment) => Ok(Model {
                values: assignment
                    .iter()
                    .map(|(k, v)| (k.clone(), ModelValue::Int(*v)))
                    .collect(),
            }),
            _ => Err(SolverError::NoModel),
        }
    }
}
