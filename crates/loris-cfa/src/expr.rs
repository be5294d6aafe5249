use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// A concrete value in the edge-label language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Value {
    Int(i64),
    Bool(bool),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Side-effect-free expression over program variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Variable reference by name.
    Var(String),
    /// Integer literal.
    IntLit(i64),
    /// Boolean literal.
    BoolLit(bool),

    // Arithmetic
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),

    // Comparison
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Ge(Box<Expr>, Box<Expr>),

    // Boolean logic
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn int(n: i64) -> Self {
        Expr::IntLit(n)
    }

    pub fn add(self, other: Expr) -> Self {
        Expr::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: Expr) -> Self {
        Expr::Sub(Box::new(self), Box::new(other))
    }

    pub fn eq(self, other: Expr) -> Self {
        Expr::Eq(Box::new(self), Box::new(other))
    }

    pub fn ne(self, other: Expr) -> Self {
        Expr::Ne(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: Expr) -> Self {
        Expr::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: Expr) -> Self {
        Expr::Le(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: Expr) -> Self {
        Expr::Gt(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: Expr) -> Self {
        Expr::Ge(Box::new(self), Box::new(other))
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Collect the free variables of this expression.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Var(name) => {
                out.insert(name.clone());
            }
            Expr::IntLit(_) | Expr::BoolLit(_) => {}
            Expr::Add(l, r)
            | Expr::Sub(l, r)
            | Expr::Mul(l, r)
            | Expr::Eq(l, r)
            | Expr::Ne(l, r)
            | Expr::Lt(l, r)
            | Expr::Le(l, r)
            | Expr::Gt(l, r)
            | Expr::Ge(l, r)
            | Expr::And(l, r)
            | Expr::Or(l, r) => {
                l.collect_variables(out);
                r.collect_variables(out);
            }
            Expr::Not(e) => e.collect_variables(out),
        }
    }

    /// Evaluate under a partial assignment. Returns `None` when the value of
    /// the expression is not determined by the known variables.
    pub fn eval(&self, env: &BTreeMap<String, i64>) -> Option<Value> {
        match self {
            Expr::Var(name) => env.get(name).map(|n| Value::Int(*n)),
            Expr::IntLit(n) => Some(Value::Int(*n)),
            Expr::BoolLit(b) => Some(Value::Bool(*b)),
            Expr::Add(l, r) => Some(Value::Int(
                l.eval(env)?.as_int()?.checked_add(r.eval(env)?.as_int()?)?,
            )),
            Expr::Sub(l, r) => Some(Value::Int(
                l.eval(env)?.as_int()?.checked_sub(r.eval(env)?.as_int()?)?,
            )),
            Expr::Mul(l, r) => Some(Value::Int(
                l.eval(env)?.as_int()?.checked_mul(r.eval(env)?.as_int()?)?,
            )),
            Expr::Eq(l, r) => Some(Value::Bool(l.eval(env)?.as_int()? == r.eval(env)?.as_int()?)),
            Expr::Ne(l, r) => Some(Value::Bool(l.eval(env)?.as_int()? != r.eval(env)?.as_int()?)),
            Expr::Lt(l, r) => Some(Value::Bool(l.eval(env)?.as_int()? < r.eval(env)?.as_int()?)),
            Expr::Le(l, r) => Some(Value::Bool(l.eval(env)?.as_int()? <= r.eval(env)?.as_int()?)),
            Expr::Gt(l, r) => Some(Value::Bool(l.eval(env)?.as_int()? > r.eval(env)?.as_int()?)),
            Expr::Ge(l, r) => Some(Value::Bool(l.eval(env)?.as_int()? >= r.eval(env)?.as_int()?)),
            Expr::And(l, r) => {
                // Short-circuit on a known-false side even if the other side
                // is undetermined.
                match (l.eval(env).and_then(|v| v.as_bool()), r.eval(env).and_then(|v| v.as_bool())) {
                    (Some(false), _) | (_, Some(false)) => Some(Value::Bool(false)),
                    (Some(true), Some(true)) => Some(Value::Bool(true)),
                    _ => None,
                }
            }
            Expr::Or(l, r) => {
                match (l.eval(env).and_then(|v| v.as_bool()), r.eval(env).and_then(|v| v.as_bool())) {
                    (Some(true), _) | (_, Some(true)) => Some(Value::Bool(true)),
                    (Some(false), Some(false)) => Some(Value::Bool(false)),
                    _ => None,
                }
            }
            Expr::Not(e) => Some(Value::Bool(!e.eval(env)?.as_bool()?)),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(name) => write!(f, "{name}"),
            Expr::IntLit(n) => write!(f, "{n}"),
            Expr::BoolLit(b) => write!(f, "{b}"),
            Expr::Add(l, r) => write!(f, "({l} + {r})"),
            Expr::Sub(l, r) => write!(f, "({l} - {r})"),
            Expr::Mul(l, r) => write!(f, "({l} * {r})"),
            Expr::Eq(l, r) => write!(f, "({l} == {r})"),
            Expr::Ne(l, r) => write!(f, "({l} != {r})"),
            Expr::Lt(l, r) => write!(f, "({l} < {r})"),
            Expr::Le(l, r) => write!(f, "({l} <= {r})"),
            Expr::Gt(l, r) => write!(f, "({l} > {r})"),
            Expr::Ge(l, r) => write!(f, "({l} >= {r})"),
            Expr::And(l, r) => write!(f, "({l} && {r})"),
            Expr::Or(l, r) => write!(f, "({l} || {r})"),
            Expr::Not(e) => write!(f, "!{e}"),
        }
    }
}

/// Operation labeling a CFA edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeOp {
    /// No-op edge (blank edges, joins).
    Skip,
    /// Assignment `var := value`.
    Assign { var: String, value: Expr },
    /// Guard edge: passable only when the condition holds.
    Assume { cond: Expr },
    /// Entry into the named function.
    Call { function: String },
    /// Return from the current function.
    Return,
}

impl fmt::Display for EdgeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeOp::Skip => write!(f, "skip"),
            EdgeOp::Assign { var, value } => write!(f, "{var} := {value}"),
            EdgeOp::Assume { cond } => write!(f, "[{cond}]"),
            EdgeOp::Call { function } => write!(f, "call {function}"),
            EdgeOp::Return => write!(f, "return"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_eval_determines_guards_from_known_variables() {
        let mut env = BTreeMap::new();
        env.insert("x".to_string(), 0);

        let cond = Expr::var("x").eq(Expr::int(1));
        assert_eq!(cond.eval(&env), Some(Value::Bool(false)));

        let open = Expr::var("y").eq(Expr::int(1));
        assert_eq!(open.eval(&env), None);
    }

    #[test]
    fn and_short_circuits_on_known_false_conjunct() {
        let env = BTreeMap::from([("x".to_string(), 2)]);
        let e = Expr::var("y")
            .eq(Expr::int(1))
            .and(Expr::var("x").eq(Expr::int(0)));
        assert_eq!(e.eval(&env), Some(Value::Bool(false)));
    }
}
