//! Bundled abstract domains.

pub mod automaton;
pub mod value;

pub use automaton::{AutomatonAnalysis, AutomatonState};
pub use value::{ValueAnalysis, ValuePrecision, ValueRefinementStrategy, ValueState};
