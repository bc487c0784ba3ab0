//! Saved, target and best phases.
//!
//! Each variable remembers the polarity it was last assigned (`saved`), the
//! polarity it had in the largest trail seen during the current rephase cycle
//! (`target`) and in the largest trail seen overall (`best`). Decisions reuse
//! the saved phase; rephasing overwrites it from one of the other sources.
use kestrel_formula::{Lit, Var};

/// Phase bytes of a single variable.
#[derive(Copy, Clone)]
pub struct VarPhases {
    pub saved: i8,
    pub target: i8,
    pub best: i8,
}

impl Default for VarPhases {
    fn default() -> VarPhases {
        VarPhases {
            saved: -1,
            target: 0,
            best: 0,
        }
    }
}

/// Saved, target and best phases.
#[derive(Default)]
pub struct Phases {
    phases: Vec<VarPhases>,
    /// Trail size high-water mark of the current rephase cycle.
    pub target_assigned: usize,
    /// Trail size high-water mark of the whole search.
    pub best_assigned: usize,
}

impl Phases {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.phases.resize(count, VarPhases::default());
    }

    pub fn get(&self, var: Var) -> &VarPhases {
        &self.phases[var.index()]
    }

    pub fn get_mut(&mut self, var: Var) -> &mut VarPhases {
        &mut self.phases[var.index()]
    }

    /// Record the polarity of an assigned literal.
    pub fn save(&mut self, lit: Lit) {
        self.phases[lit.index()].saved = if lit.is_positive() { 1 } else { -1 };
    }

    /// The decision literal for a variable following the saved phase.
    pub fn decision_lit(&self, var: Var) -> Lit {
        var.lit(self.phases[var.index()].saved >= 0)
    }

    /// Overwrite every saved phase using the given function.
    pub fn overwrite_saved(&mut self, mut new_phase: impl FnMut(Var, &VarPhases) -> i8) {
        for (index, phases) in self.phases.iter_mut().enumerate() {
            let phase = new_phase(Var::from_index(index), phases);
            if phase != 0 {
                phases.saved = phase;
            }
        }
    }
}
