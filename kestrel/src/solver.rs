//! Boolean satisfiability solver.
use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use partial_ref::{IntoPartialRefMut, PartialRef};

use anyhow::Error;
use log::info;

use kestrel_dimacs::{DimacsParser, Strictness};
use kestrel_formula::{CnfFormula, Lit};
use kestrel_internal_proof::ProofStep;

use crate::context::{ensure_var_count, parts::*, Context};
use crate::load::load_clause;
use crate::model::extract_model;
use crate::proof::ProofFormat;
use crate::schedule::schedule_step;
use crate::state::SatState;
use crate::stats::Stats;

/// A boolean satisfiability solver.
#[derive(Default)]
pub struct Solver<'a> {
    ctx: Box<Context<'a>>,
    last_model: Option<Vec<Lit>>,
}

impl<'a> Solver<'a> {
    /// Create a new solver.
    pub fn new() -> Solver<'a> {
        Solver::default()
    }

    /// Set an integer valued option by name.
    ///
    /// See [`SolverConfig::help`](crate::config::SolverConfig::help) for the
    /// available options.
    pub fn set_option(&mut self, name: &str, value: i64) -> Result<(), Error> {
        self.ctx.solver_config.set_option(name, value)?;
        let decay = self.ctx.solver_config.decay_factor();
        self.ctx.vsids.set_decay(decay);
        Ok(())
    }

    /// Add a clause to the solver.
    pub fn add_clause(&mut self, clause: &[Lit]) {
        self.last_model = None;
        let mut ctx = self.ctx.into_partial_ref_mut();
        let var_count = clause
            .iter()
            .map(|lit| lit.index() + 1)
            .max()
            .unwrap_or(0);
        ensure_var_count(ctx.borrow(), var_count);
        load_clause(ctx.borrow(), clause);
    }

    /// Add a formula to the solver.
    pub fn add_formula(&mut self, formula: &CnfFormula) {
        self.last_model = None;
        let mut ctx = self.ctx.into_partial_ref_mut();
        ensure_var_count(ctx.borrow(), formula.var_count());
        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }
    }

    /// Reads and adds a formula in DIMACS CNF format.
    ///
    /// Using this avoids creating a temporary [`CnfFormula`].
    pub fn add_dimacs_cnf(&mut self, input: impl io::Read) -> Result<(), Error> {
        self.add_dimacs_cnf_with_strictness(input, Strictness::Normal)
    }

    /// Reads and adds a DIMACS CNF formula with the given strictness.
    pub fn add_dimacs_cnf_with_strictness(
        &mut self,
        input: impl io::Read,
        strictness: Strictness,
    ) -> Result<(), Error> {
        let parser = DimacsParser::parse_incremental(input, strictness, |parser| {
            self.add_formula(&parser.take_formula());
            Ok(())
        })?;

        info!(
            "parsed formula with {} variables and {} clauses",
            parser.var_count(),
            parser.clause_count()
        );

        Ok(())
    }

    /// Check the satisfiability of the current formula.
    ///
    /// Returns `None` when a limit was hit or the search was terminated.
    pub fn solve(&mut self) -> Option<bool> {
        self.last_model = None;

        let mut ctx = self.ctx.into_partial_ref_mut();

        while schedule_step(ctx.borrow()) {}

        match ctx.part(SolverStateP).sat_state {
            SatState::Unknown => None,
            SatState::Sat => {
                let model = extract_model(ctx.borrow());
                if let Some(checker) = ctx.part_mut(ProofP).checker_mut() {
                    if let Err(err) = checker.check_model(&model) {
                        panic!("proof checking failed: {}", err);
                    }
                }
                self.last_model = Some(model);
                Some(true)
            }
            SatState::Unsat => {
                ctx.part_mut(ProofP).add_step(&ProofStep::End);
                Some(false)
            }
        }
    }

    /// Set of literals that satisfy the formula.
    pub fn model(&self) -> Option<Vec<Lit>> {
        self.last_model.clone()
    }

    /// The value assigned to a literal by the current model.
    pub fn value(&self, lit: Lit) -> Option<bool> {
        self.last_model.as_ref().map(|model| {
            model
                .iter()
                .any(|&model_lit| model_lit == lit)
        })
    }

    /// A flag that asynchronously terminates the search when set.
    pub fn terminator(&self) -> Arc<AtomicBool> {
        self.ctx.solver_state.terminate.clone()
    }

    /// Write a proof of unsatisfiability to the given target.
    ///
    /// Has to be called before adding clauses.
    pub fn write_proof(&mut self, target: impl io::Write + 'a, format: ProofFormat) {
        self.ctx.proof.write_proof(target, format);
    }

    /// Stop writing the proof and flush it.
    pub fn close_proof(&mut self) {
        self.ctx.proof.close_proof();
    }

    /// Check all proof steps on the fly with the embedded checker.
    ///
    /// Has to be called before adding clauses.
    pub fn enable_self_checking(&mut self) {
        self.ctx.proof.begin_checking();
    }

    /// Counters of the current solve run.
    pub fn stats(&self) -> &Stats {
        &self.ctx.solver_state.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use kestrel_dimacs::write_dimacs;

    use kestrel_formula::test::{pigeon_hole, sat_formula, sgen_unsat_formula};
    use kestrel_formula::{cnf_formula, lits};

    #[test]
    fn empty_formula_is_sat() {
        let mut solver = Solver::new();
        assert_eq!(solver.solve(), Some(true));
        assert_eq!(solver.model(), Some(vec![]));
    }

    #[test]
    fn unit_conflict_is_unsat() {
        let mut solver = Solver::new();
        solver.add_formula(&cnf_formula![
            1;
            -1;
        ]);
        assert_eq!(solver.solve(), Some(false));
    }

    #[test]
    fn small_sat_formula() {
        let mut solver = Solver::new();
        let formula = cnf_formula![
            1, 2;
            2, 3;
            -1, -3;
        ];
        solver.add_formula(&formula);

        assert_eq!(solver.solve(), Some(true));

        let model = solver.model().unwrap();
        for clause in formula.iter() {
            assert!(clause.iter().any(|lit| model.contains(lit)));
        }
    }

    #[test]
    fn bcp_derives_units() {
        let mut solver = Solver::new();
        solver.add_formula(&cnf_formula![
            1, 2;
            -1, 2;
        ]);
        assert_eq!(solver.solve(), Some(true));
        assert_eq!(solver.value(lits![2][0]), Some(true));

        solver.add_formula(&cnf_formula![
            1, -2;
            -1, -2;
        ]);
        assert_eq!(solver.solve(), Some(false));
    }

    #[test]
    fn conflict_limit_reached() {
        let mut solver = Solver::new();
        solver.set_option("conflict_limit", 0).unwrap();

        // Needs at least one conflict to solve.
        let formula = cnf_formula![
            1, 2;
            1, -2;
            -1, 2;
            -1, -2;
        ];
        solver.add_formula(&formula);

        assert_eq!(solver.solve(), None);

        solver.set_option("conflict_limit", -1).unwrap();
        assert_eq!(solver.solve(), Some(false));
    }

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), Some(false));
        }

        #[test]
        fn sgen_unsat_checked(formula in sgen_unsat_formula(1..5usize)) {
            let mut solver = Solver::new();
            solver.enable_self_checking();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), Some(false));
        }

        #[test]
        fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), Some(true));

            let model = solver.model().unwrap();

            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|lit| model.contains(lit)));
            }
        }

        #[test]
        fn sat_checked(formula in sat_formula(4..16usize, 10..80usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = Solver::new();
            solver.enable_self_checking();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), Some(true));

            let model = solver.model().unwrap();

            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|lit| model.contains(lit)));
            }
        }

        #[test]
        fn pigeons_dont_fit(formula in pigeon_hole(2..5usize, 1..3usize)) {
            let mut solver = Solver::new();

            solver.add_formula(&formula);

            prop_assert_eq!(solver.solve(), Some(false));
        }

        #[test]
        fn sat_via_dimacs(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = Solver::new();

            let mut dimacs = vec![];

            write_dimacs(&mut dimacs, &formula).unwrap();

            solver.add_dimacs_cnf(&mut &dimacs[..]).unwrap();

            prop_assert_eq!(solver.solve(), Some(true));

            let model = solver.model().unwrap();

            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|lit| model.contains(lit)));
            }
        }

        #[test]
        fn sgen_unsat_incremental_clauses(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = Solver::new();

            let mut last_state = Some(true);

            for clause in formula.iter() {
                solver.add_clause(clause);

                let state = solver.solve();
                if state != last_state {
                    prop_assert_eq!(state, Some(false));
                    prop_assert_eq!(last_state, Some(true));
                    last_state = state;
                }
            }

            prop_assert_eq!(last_state, Some(false));
        }
    }
}
