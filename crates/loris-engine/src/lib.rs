#![doc = include_str!("../README.md")]

//! Analysis engine: CPA operator composition, the ARG worklist fixpoint,
//! and the interpolation-based CEGAR refinement loop.

pub mod algorithm;
pub mod arg;
pub mod cegar;
pub mod composite;
pub mod config;
pub mod cpa;
pub mod domains;
pub mod error;
pub mod interpolation;
pub mod monitor;
pub mod path;
pub mod reached;
pub mod refine;
pub mod result;
pub mod reuse;
pub mod shutdown;

pub use algorithm::CpaAlgorithm;
pub use arg::{Arg, ArgId};
pub use cegar::CegarAlgorithm;
pub use composite::{CompositeCpa, CompositePrecision, CompositeState};
pub use config::{AnalysisOptions, ItpOrdering, TargetPolicy, TraversalOrder};
pub use cpa::{Cpa, DomainPrecision, DomainState, DynValue, PrecisionAdjustmentAction};
pub use error::{EngineError, RefinementError, TransferError};
pub use interpolation::{CounterexampleTraceInfo, InterpolationManager};
pub use reached::ReachedSet;
pub use refine::{RefinementOutcome, RefinementStrategy, Refiner};
pub use result::{AnalysisStatistics, UnknownReason, Verdict, Witness};
pub use shutdown::ShutdownSignal;
