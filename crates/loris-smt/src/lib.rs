#![doc = include_str!("../README.md")]

//! Terms, the interpolating-solver contract, and the built-in
//! difference-logic backend.

pub mod backends;
pub mod solver;
pub mod terms;

pub use backends::BuiltinSolver;
pub use solver::{GroupId, InterpolatingSolver, Model, ModelValue, SolverError, SolverFactory};
pub use terms::Term;
