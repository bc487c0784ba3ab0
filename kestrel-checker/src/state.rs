//! Checker state.
use kestrel_formula::Lit;

/// Global checker state.
#[derive(Default)]
pub struct CheckerState {
    /// Current step number, used in error messages.
    pub step: u64,
    /// Whether unsatisfiability was proven.
    pub unsat: bool,
    /// Whether an end of proof step was checked.
    pub ended: bool,
    /// Literals of the last added irredundant clause.
    ///
    /// Sorted and free of duplicates. Used to justify `Simplified` deletions.
    pub previous_irred_clause: Option<Vec<Lit>>,
}
