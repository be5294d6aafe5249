#![doc = include_str!("../README.md")]

//! Control-flow automaton (CFA) and guard automaton representations.
//!
//! This crate defines the program graph consumed by the analysis engine:
//! locations with labeled outgoing edges, the statement/expression language
//! on edge labels, and the guard automaton used for goal tracking and
//! incremental reuse of analysis results.

pub mod automaton;
pub mod expr;
pub mod graph;

pub use automaton::{AutomatonStateId, GuardAutomaton, GuardEdge, GuardLabel};
pub use expr::{EdgeOp, Expr, Value};
pub use graph::{Cfa, CfaBuilder, CfaEdge, CfaNode, EdgeId, NodeId};
