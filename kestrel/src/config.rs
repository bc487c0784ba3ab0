//! Solver configuration.
use anyhow::{anyhow, Error};

/// Configurable parameters used during solving.
///
/// All options have an integer-valued external surface (see
/// [`SolverConfig::set_option`]); fractional parameters are expressed in
/// percent or per mille.
pub struct SolverConfig {
    /// Enable chronological backtracking.
    pub chrono: bool,
    /// Maximum number of levels a non-chronological backjump may skip.
    pub chrono_levels: usize,
    /// Multiplicative decay for the VSIDS decision heuristic, in percent.
    pub decay: u32,
    /// Restart margin for EMA based focused restarts, in percent.
    pub restart_margin: u32,
    /// Minimal number of conflicts between focused restarts.
    pub restart_interval: u64,
    /// Scaling factor for reluctant doubling based stable restarts.
    pub stable_restart_scale: u64,
    /// Number of conflicts of the first focused mode interval.
    pub mode_interval: u64,
    /// Base number of conflicts between clause database reductions.
    pub reduce_interval: u64,
    /// Fraction of reducible clauses deleted per reduction, in percent.
    pub reduce_fraction: u32,
    /// Glue limit below which learned clauses are kept forever.
    pub tier1: usize,
    /// Glue limit below which learned clauses survive two reductions.
    pub tier2: usize,
    /// Recursion depth bound for learned clause minimization.
    pub minimize_depth: usize,
    /// Base number of conflicts between rephasing.
    pub rephase_interval: u64,
    /// Enable failed literal probing and hyper binary resolution.
    pub probe: bool,
    /// Base number of conflicts between probing rounds.
    pub probe_interval: u64,
    /// Propagation tick budget per probing round.
    pub probe_effort: u64,
    /// Enable transitive reduction of the binary implication graph.
    pub transitive: bool,
    /// Enable clause vivification.
    pub vivify: bool,
    /// Propagation tick budget per vivification round.
    pub vivify_effort: u64,
    /// Enable ternary hyper resolution.
    pub ternary: bool,
    /// Maximum number of resolvents added per ternary resolution round.
    pub ternary_limit: usize,
    /// Enable bounded variable elimination.
    pub eliminate: bool,
    /// Base number of conflicts between elimination rounds.
    pub eliminate_interval: u64,
    /// Occurrence limit for elimination candidates.
    pub eliminate_occ_limit: usize,
    /// Clause size limit for elimination candidates.
    pub eliminate_clause_limit: usize,
    /// Bound on additional clauses allowed per elimination, doubled each
    /// completed round.
    pub eliminate_bound: usize,
    /// Enable gate extraction for elimination.
    pub gates: bool,
    /// Clause count limit for XOR gate extraction.
    pub xor_clause_limit: usize,
    /// Enable definition extraction with the embedded eyas solver.
    pub definitions: bool,
    /// Propagation budget for a single definition extraction.
    pub definition_effort: u64,
    /// Enable forward subsumption.
    pub subsume: bool,
    /// Occurrence limit for subsumption candidates.
    pub subsume_occ_limit: usize,
    /// Clause size limit for subsumption candidates.
    pub subsume_clause_limit: usize,
    /// Enable autarky detection.
    pub autarky: bool,
    /// Enable local search based phase seeding.
    pub walk: bool,
    /// Flip budget per local search round.
    pub walk_effort: u64,
    /// Incremental mode: suppress weakening-to-unit rewrites.
    pub incremental: bool,
    /// Stop after this many conflicts (negative for no limit).
    pub conflict_limit: i64,
    /// Stop after this many decisions (negative for no limit).
    pub decision_limit: i64,
    /// Initial random seed.
    pub seed: u64,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            chrono: true,
            chrono_levels: 100,
            decay: 95,
            restart_margin: 10,
            restart_interval: 1,
            stable_restart_scale: 1024,
            mode_interval: 1000,
            reduce_interval: 300,
            reduce_fraction: 75,
            tier1: 2,
            tier2: 6,
            minimize_depth: 1000,
            rephase_interval: 1000,
            probe: true,
            probe_interval: 100,
            probe_effort: 100_000,
            transitive: true,
            vivify: true,
            vivify_effort: 100_000,
            ternary: true,
            ternary_limit: 1000,
            eliminate: true,
            eliminate_interval: 500,
            eliminate_occ_limit: 1000,
            eliminate_clause_limit: 100,
            eliminate_bound: 16,
            gates: true,
            xor_clause_limit: 5,
            definitions: true,
            definition_effort: 10_000,
            subsume: true,
            subsume_occ_limit: 1000,
            subsume_clause_limit: 100,
            autarky: true,
            walk: true,
            walk_effort: 100_000,
            incremental: false,
            conflict_limit: -1,
            decision_limit: -1,
            seed: 0,
        }
    }
}

macro_rules! config_options {
    ( $( $name:ident : $kind:tt => $help:expr ; )* ) => {
        impl SolverConfig {
            /// Set an integer valued option by name.
            pub fn set_option(&mut self, name: &str, value: i64) -> Result<(), Error> {
                $(
                    if name == stringify!($name) {
                        return config_options!(@set self, $name, $kind, value, name);
                    }
                )*
                Err(anyhow!("unknown option '{}'", name))
            }

            /// One line of help text per option.
            pub fn help() -> String {
                let mut out = String::new();
                $(
                    out.push_str(&format!(
                        "{:<24} {}\n",
                        stringify!($name),
                        $help,
                    ));
                )*
                out
            }
        }
    };
    (@set $self:ident, $name:ident, bool, $value:ident, $str_name:ident) => {{
        if $value != 0 && $value != 1 {
            return Err(anyhow!("option '{}' expects 0 or 1", $str_name));
        }
        $self.$name = $value != 0;
        Ok(())
    }};
    (@set $self:ident, $name:ident, u32, $value:ident, $str_name:ident) => {{
        if $value < 0 || $value > u32::max_value() as i64 {
            return Err(anyhow!("option '{}' out of range", $str_name));
        }
        $self.$name = $value as u32;
        Ok(())
    }};
    (@set $self:ident, $name:ident, u64, $value:ident, $str_name:ident) => {{
        if $value < 0 {
            return Err(anyhow!("option '{}' out of range", $str_name));
        }
        $self.$name = $value as u64;
        Ok(())
    }};
    (@set $self:ident, $name:ident, usize, $value:ident, $str_name:ident) => {{
        if $value < 0 {
            return Err(anyhow!("option '{}' out of range", $str_name));
        }
        $self.$name = $value as usize;
        Ok(())
    }};
    (@set $self:ident, $name:ident, i64, $value:ident, $str_name:ident) => {{
        $self.$name = $value;
        Ok(())
    }};
}

config_options! {
    chrono: bool => "enable chronological backtracking (0 or 1)";
    chrono_levels: usize => "backjump length that switches to chronological backtracking";
    decay: u32 => "VSIDS decay in percent (1..=99)";
    restart_margin: u32 => "focused restart margin in percent";
    restart_interval: u64 => "minimal conflicts between focused restarts";
    stable_restart_scale: u64 => "reluctant doubling scale for stable restarts";
    mode_interval: u64 => "conflicts of the first focused mode interval";
    reduce_interval: u64 => "base conflicts between reductions";
    reduce_fraction: u32 => "percent of reducible clauses deleted per reduction";
    tier1: usize => "glue limit for permanent clauses";
    tier2: usize => "glue limit for protected clauses";
    minimize_depth: usize => "recursion depth bound for minimization";
    rephase_interval: u64 => "base conflicts between rephasing";
    probe: bool => "enable failed literal probing (0 or 1)";
    probe_interval: u64 => "base conflicts between probing rounds";
    probe_effort: u64 => "tick budget per probing round";
    transitive: bool => "enable transitive reduction (0 or 1)";
    vivify: bool => "enable vivification (0 or 1)";
    vivify_effort: u64 => "tick budget per vivification round";
    ternary: bool => "enable ternary resolution (0 or 1)";
    ternary_limit: usize => "resolvents added per ternary round";
    eliminate: bool => "enable bounded variable elimination (0 or 1)";
    eliminate_interval: u64 => "base conflicts between elimination rounds";
    eliminate_occ_limit: usize => "occurrence limit for elimination";
    eliminate_clause_limit: usize => "clause size limit for elimination";
    eliminate_bound: usize => "initial bound on additional clauses";
    gates: bool => "enable gate extraction (0 or 1)";
    xor_clause_limit: usize => "clause count limit for XOR extraction";
    definitions: bool => "enable definition extraction (0 or 1)";
    definition_effort: u64 => "propagation budget per definition extraction";
    subsume: bool => "enable forward subsumption (0 or 1)";
    subsume_occ_limit: usize => "occurrence limit for subsumption";
    subsume_clause_limit: usize => "clause size limit for subsumption";
    autarky: bool => "enable autarky detection (0 or 1)";
    walk: bool => "enable local search phase seeding (0 or 1)";
    walk_effort: u64 => "flip budget per local search round";
    incremental: bool => "suppress weakening-to-unit rewrites (0 or 1)";
    conflict_limit: i64 => "conflict limit, negative for none";
    decision_limit: i64 => "decision limit, negative for none";
    seed: u64 => "initial random seed";
}

impl SolverConfig {
    /// The VSIDS decay factor as a float, clamped to a sane range.
    pub fn decay_factor(&self) -> f64 {
        self.decay.max(7).min(99) as f64 / 100.0
    }

    /// The focused restart margin as a factor.
    pub fn restart_margin_factor(&self) -> f64 {
        1.0 + self.restart_margin as f64 / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_options() {
        let mut config = SolverConfig::default();

        config.set_option("decay", 80).unwrap();
        assert_eq!(config.decay, 80);

        config.set_option("walk", 0).unwrap();
        assert!(!config.walk);

        assert!(config.set_option("walk", 2).is_err());
        assert!(config.set_option("no_such_option", 1).is_err());
        assert!(config.set_option("probe_effort", -3).is_err());

        config.set_option("conflict_limit", -1).unwrap();
        assert_eq!(config.conflict_limit, -1);
    }

    #[test]
    fn help_mentions_options() {
        let help = SolverConfig::help();
        assert!(help.contains("decay"));
        assert!(help.contains("eliminate"));
    }
}
