use std::collections::BTreeSet;
use std::fmt;

/// Abstract formula representation, solver-agnostic.
///
/// Path formulas and interpolants are exchanged between the engine and the
/// solver backends in this form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// Variable reference by name (SSA-indexed names like `x@3`).
    Var(String),
    /// Integer literal.
    IntLit(i64),
    /// Boolean literal.
    BoolLit(bool),

    // Arithmetic
    Add(Box<Term>, Box<Term>),
    Sub(Box<Term>, Box<Term>),
    Mul(Box<Term>, Box<Term>),

    // Comparison
    Eq(Box<Term>, Box<Term>),
    Ne(Box<Term>, Box<Term>),
    Lt(Box<Term>, Box<Term>),
    Le(Box<Term>, Box<Term>),
    Gt(Box<Term>, Box<Term>),
    Ge(Box<Term>, Box<Term>),

    // Boolean logic
    And(Vec<Term>),
    Or(Vec<Term>),
    Not(Box<Term>),
    Implies(Box<Term>, Box<Term>),
}

#[allow(clippy::should_implement_trait)]
impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    pub fn int(n: i64) -> Self {
        Term::IntLit(n)
    }

    pub fn bool(b: bool) -> Self {
        Term::BoolLit(b)
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Term::BoolLit(true))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Term::BoolLit(false))
    }

    pub fn add(self, other: Term) -> Self {
        Term::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: Term) -> Self {
        Term::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: Term) -> Self {
        Term::Mul(Box::new(self), Box::new(other))
    }

    pub fn eq(self, other: Term) -> Self {
        Term::Eq(Box::new(self), Box::new(other))
    }

    pub fn ne(self, other: Term) -> Self {
        Term::Ne(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: Term) -> Self {
        Term::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: Term) -> Self {
        Term::Le(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: Term) -> Self {
        Term::Gt(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: Term) -> Self {
        Term::Ge(Box::new(self), Box::new(other))
    }

    pub fn not(self) -> Self {
        Term::Not(Box::new(self))
    }

    pub fn implies(self, other: Term) -> Self {
        Term::Implies(Box::new(self), Box::new(other))
    }

    /// Conjunction that collapses trivial cases.
    pub fn and_all(terms: impl IntoIterator<Item = Term>) -> Self {
        let mut parts: Vec<Term> = terms.into_iter().filter(|t| !t.is_true()).collect();
        if parts.iter().any(Term::is_false) {
            return Term::BoolLit(false);
        }
        match parts.len() {
            0 => Term::BoolLit(true),
            1 => parts.remove(0),
            _ => Term::And(parts),
        }
    }

    /// Free symbols of the term.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Term::Var(name) => {
                out.insert(name.clone());
            }
            Term::IntLit(_) | Term::BoolLit(_) => {}
            Term::Add(l, r)
            | Term::Sub(l, r)
            | Term::Mul(l, r)
            | Term::Eq(l, r)
            | Term::Ne(l, r)
            | Term::Lt(l, r)
            | Term::Le(l, r)
            | Term::Gt(l, r)
            | Term::Ge(l, r)
            | Term::Implies(l, r) => {
                l.collect_symbols(out);
                r.collect_symbols(out);
            }
            Term::And(ts) | Term::Or(ts) => {
                for t in ts {
                    t.collect_symbols(out);
                }
            }
            Term::Not(t) => t.collect_symbols(out),
        }
    }

    /// Number of nodes in the term tree. Used for refinement size budgets.
    pub fn node_count(&self) -> usize {
        match self {
            Term::Var(_) | Term::IntLit(_) | Term::BoolLit(_) => 1,
            Term::Add(l, r)
            | Term::Sub(l, r)
            | Term::Mul(l, r)
            | Term::Eq(l, r)
            | Term::Ne(l, r)
            | Term::Lt(l, r)
            | Term::Le(l, r)
            | Term::Gt(l, r)
            | Term::Ge(l, r)
            | Term::Implies(l, r) => 1 + l.node_count() + r.node_count(),
            Term::And(ts) | Term::Or(ts) => 1 + ts.iter().map(Term::node_count).sum::<usize>(),
            Term::Not(t) => 1 + t.node_count(),
        }
    }
}

/// Renders the term in an SMT-LIB-like prefix form, for dumps and logs.
impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn bin(f: &mut fmt::Formatter<'_>, op: &str, l: &Term, r: &Term) -> fmt::Result {
            write!(f, "({op} {l} {r})")
        }
        fn nary(f: &mut fmt::Formatter<'_>, op: &str, ts: &[Term]) -> fmt::Result {
            write!(f, "({op}")?;
            for t in ts {
                write!(f, " {t}")?;
            }
            write!(f, ")")
        }
        match self {
            Term::Var(name) => write!(f, "{name}"),
            Term::IntLit(n) => write!(f, "{n}"),
            Term::BoolLit(b) => write!(f, "{b}"),
            Term::Add(l, r) => bin(f, "+", l, r),
            Term::Sub(l, r) => bin(f, "-", l, r),
            Term::Mul(l, r) => bin(f, "*", l, r),
            Term::Eq(l, r) => bin(f, "=", l, r),
            Term::Ne(l, r) => bin(f, "distinct", l, r),
            Term::Lt(l, r) => bin(f, "<", l, r),
            Term::Le(l, r) => bin(f, "<=", l, r),
            Term::Gt(l, r) => bin(f, ">", l, r),
            Term::Ge(l, r) => bin(f, ">=", l, r),
            Term::And(ts) => nary(f, "and", ts),
            Term::Or(ts) => nary(f, "or", ts),
            Term::Not(t) => write!(f, "(not {t})"),
            Term::Implies(l, r) => bin(f, "=>", l, r),
        }
    }
}
