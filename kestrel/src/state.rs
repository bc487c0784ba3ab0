//! Miscellaneous solver state.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kestrel_formula::Lit;

use crate::stats::Stats;

/// Satisfiability state.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SatState {
    Unknown,
    Sat,
    Unsat,
}

impl Default for SatState {
    fn default() -> SatState {
        SatState::Unknown
    }
}

/// Miscellaneous solver state.
///
/// Anything larger or any larger group of related state variables should be
/// moved into a separate part of [`Context`](crate::context::Context).
pub struct SolverState {
    pub sat_state: SatState,
    /// Whether the solver is currently probing.
    ///
    /// Suppresses phase saving and selects the probing propagation mode.
    pub probing: bool,
    /// Set by another thread to stop the search at the next pass boundary.
    pub terminate: Arc<AtomicBool>,
    /// The formula was proven unsatisfiable at the root level.
    ///
    /// Sticky: every pass short-circuits once this is set.
    pub inconsistent: bool,
    /// Hyper binary resolvents created inside the propagator, waiting to be
    /// traced to the proof by the probing driver.
    pub pending_hyper: Vec<[Lit; 2]>,
    pub stats: Stats,
}

impl Default for SolverState {
    fn default() -> SolverState {
        SolverState {
            sat_state: SatState::Unknown,
            probing: false,
            terminate: Arc::new(AtomicBool::new(false)),
            inconsistent: false,
            pending_hyper: vec![],
            stats: Stats::default(),
        }
    }
}

impl SolverState {
    /// Whether an external termination request is pending.
    pub fn terminated(&self) -> bool {
        self.terminate.load(Ordering::Relaxed)
    }
}
