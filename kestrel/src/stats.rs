//! Counters reported as solver progress.

/// Statistics of the current solve run.
#[derive(Default)]
pub struct Stats {
    pub conflicts: u64,
    pub decisions: u64,
    pub propagations: u64,
    /// Approximated cache line reads of the propagators.
    pub ticks: u64,
    pub probe_ticks: u64,
    pub restarts: u64,
    pub reused_trails: u64,
    pub mode_switches: u64,
    pub rephased: u64,
    pub reductions: u64,
    pub collections: u64,
    pub learned: u64,
    pub learned_units: u64,
    pub learned_binary: u64,
    pub minimized_lits: u64,
    pub strengthened_conflicts: u64,
    pub promoted: u64,
    pub eliminated_vars: u64,
    pub eliminate_rounds: u64,
    pub gates_extracted: u64,
    pub definitions_extracted: u64,
    pub resolvents_added: u64,
    pub subsumed: u64,
    pub strengthened: u64,
    pub vivified: u64,
    pub vivify_subsumed: u64,
    pub probed_lits: u64,
    pub failed_lits: u64,
    pub hyper_binaries: u64,
    pub transitive_reduced: u64,
    pub ternary_resolvents: u64,
    pub autarky_vars: u64,
    pub walk_rounds: u64,
    pub walk_flips: u64,
    pub units_flushed: u64,
}
