//! Per-variable bookkeeping flags.
use kestrel_formula::Var;

/// Status and inprocessing candidate flags of a variable.
#[derive(Copy, Clone)]
pub struct VarFlags {
    /// The variable takes part in the search.
    pub active: bool,
    /// The variable was removed by bounded variable elimination or autarky
    /// detection. Its value is reconstructed through the extension stack.
    pub eliminated: bool,
    /// The variable is assigned at the root level.
    pub fixed: bool,
    /// Candidate for forward subsumption.
    pub subsume: bool,
    /// Candidate for bounded variable elimination.
    pub eliminate: bool,
    /// Candidate for failed literal probing.
    pub probe: bool,
    /// Candidate for transitive reduction.
    pub transitive: bool,
}

impl Default for VarFlags {
    fn default() -> VarFlags {
        VarFlags {
            active: true,
            eliminated: false,
            fixed: false,
            subsume: true,
            eliminate: true,
            probe: true,
            transitive: true,
        }
    }
}

/// Per-variable bookkeeping flags.
#[derive(Default)]
pub struct Variables {
    flags: Vec<VarFlags>,
}

impl Variables {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.flags.resize(count, VarFlags::default());
    }

    pub fn var_count(&self) -> usize {
        self.flags.len()
    }

    pub fn flags(&self, var: Var) -> &VarFlags {
        &self.flags[var.index()]
    }

    pub fn flags_mut(&mut self, var: Var) -> &mut VarFlags {
        &mut self.flags[var.index()]
    }

    /// Take the variable out of the search permanently.
    pub fn mark_eliminated(&mut self, var: Var) {
        let flags = &mut self.flags[var.index()];
        debug_assert!(flags.active);
        flags.active = false;
        flags.eliminated = true;
    }

    /// The variable got a permanent root level assignment.
    pub fn mark_fixed(&mut self, var: Var) {
        let flags = &mut self.flags[var.index()];
        flags.active = false;
        flags.fixed = true;
    }

    /// Number of variables still taking part in the search.
    pub fn active_count(&self) -> usize {
        self.flags.iter().filter(|flags| flags.active).count()
    }

    /// Schedule all active variables for a pass again.
    pub fn reschedule_all(&mut self, mut mark: impl FnMut(&mut VarFlags)) {
        for flags in self.flags.iter_mut() {
            if flags.active {
                mark(flags);
            }
        }
    }
}
