//! Temporary data.
use kestrel_formula::Lit;

/// Temporary data used by various parts of the solver.
///
/// Make sure to check any documented invariants when using this. Also make
/// sure to check all existing users when adding invariants.
#[derive(Default)]
pub struct TmpData {
    pub lits: Vec<Lit>,
    pub lits_2: Vec<Lit>,
    /// A boolean for each literal.
    ///
    /// Reset to all-false, keep size.
    pub lit_flags: Vec<bool>,
    /// A boolean for each decision level.
    ///
    /// Reset to all-false, keep size.
    pub level_flags: Vec<bool>,
}

impl TmpData {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.lit_flags.resize(count * 2, false);
        // One level per variable plus the root level.
        self.level_flags.resize(count + 1, false);
    }
}
