//! Solver backends implementing [`crate::solver::InterpolatingSolver`].

pub mod builtin;

pub use builtin::BuiltinSolver;
