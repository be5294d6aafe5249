use std::time::Duration;

/// Order in which frontier nodes are popped from the waitlist.
///
/// Affects the shape of found counterexamples, never soundness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalOrder {
    /// Last in, first out.
    #[default]
    DepthFirst,
    /// First in, first out.
    BreadthFirst,
    /// Smallest location id first.
    LocationOrder,
}

/// What to do when the fixpoint produces a target state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetPolicy {
    /// Halt the fixpoint on the first target state found.
    #[default]
    StopAtFirst,
    /// Keep exploring; targets are collected and reported at the end.
    Continue,
}

/// Direction in which interpolation partition boundaries are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItpOrdering {
    /// Index 0..n.
    #[default]
    Forward,
    /// Index n..0.
    Backward,
    /// Alternating from both ends toward the middle.
    Zigzag,
}

/// Validated engine options.
///
/// Assembled and validated by the (out-of-scope) configuration layer; the
/// engine takes them as given.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub traversal: TraversalOrder,
    pub target_policy: TargetPolicy,

    /// Wall-clock budget for one monitored transfer evaluation; `None`
    /// disables monitoring and runs transfers inline.
    pub transfer_time_limit: Option<Duration>,
    /// Cumulative transfer-time budget along one path; successors of a
    /// branch that exceeds it are discarded.
    pub path_time_budget: Option<Duration>,
    /// After this many discarded successors the cumulative path budget is
    /// reset, so one branch is not starved forever.
    pub path_budget_reset_after: u32,

    /// Interpolation ordering policy.
    pub itp_ordering: ItpOrdering,
    /// Restrict interpolant A-partitions to the current function scope.
    /// Requires [`ItpOrdering::Forward`].
    pub well_scoped_interpolants: bool,
    /// Independently verify computed interpolants against the chain laws.
    pub verify_interpolants: bool,
    /// Pre-filter the path to a minimal unsatisfiable block subset before
    /// interpolation.
    pub use_useful_blocks: bool,
    /// Keep one solver session alive across refinement attempts and only
    /// push/pop the differing suffix.
    pub reuse_interpolation_environment: bool,
    /// Deadline for one feasibility-plus-interpolation computation; `None`
    /// disables the worker thread and runs inline.
    pub itp_time_limit: Option<Duration>,
    /// Reject refinement when the path formula exceeds this many term nodes
    /// (0 disables the check).
    pub max_refinement_size: usize,

    /// Upper bound on CEGAR refinement rounds.
    pub max_refinements: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            traversal: TraversalOrder::default(),
            target_policy: TargetPolicy::default(),
            transfer_time_limit: None,
            path_time_budget: None,
            path_budget_reset_after: 64,
            itp_ordering: ItpOrdering::default(),
            well_scoped_interpolants: false,
            verify_interpolants: false,
            use_useful_blocks: false,
            reuse_interpolation_environment: false,
            itp_time_limit: None,
            max_refinement_size: 0,
            max_refinements: 64,
        }
    }
}
