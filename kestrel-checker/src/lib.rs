//! Proof checker for proofs generated by the Kestrel SAT solver.
//!
//! The checker maintains its own copy of the formula with an independent
//! propagation engine. Input clauses are imported unchecked; every derived
//! clause must pass a reverse unit propagation (RUP) check against the
//! checker's current formula before it is admitted. This makes the checker a
//! ground truth for the solver's clause database mutations.

mod clauses;
mod context;
mod propagate;
mod sorted_lits;
mod state;
mod tmp;

use partial_ref::{partial, IntoPartialRefMut, PartialRef};

use kestrel_formula::Lit;
use kestrel_internal_proof::{DeleteClauseProof, ProofStep};

use crate::clauses::{delete_clause, propagate_permanent, store_clause, DeleteOutcome};
use crate::context::{parts::*, Context};
use crate::propagate::check_rup;
use crate::sorted_lits::{copy_canonical, is_subset};

/// Possible errors while checking proof steps.
#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    #[error("step {}: Proof checking failed: {}", step, msg)]
    CheckFailed { step: u64, msg: String },
}

impl CheckerError {
    fn check_failed(step: u64, msg: String) -> CheckerError {
        CheckerError::CheckFailed { step, msg }
    }
}

/// A checker for unsatisfiability proofs.
#[derive(Default)]
pub struct Checker {
    ctx: Box<Context>,
}

impl Checker {
    /// Create a new checker.
    pub fn new() -> Checker {
        Checker::default()
    }

    /// Add a clause of the input formula.
    ///
    /// Input clauses are trusted and not checked for redundancy.
    pub fn add_clause(&mut self, clause: &[Lit]) -> Result<(), CheckerError> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(CheckerStateP).step += 1;

        let mut tmp = std::mem::take(&mut ctx.part_mut(TmpDataP).tmp);
        let tautology = copy_canonical(&mut tmp, clause);

        if !tautology {
            store_clause(ctx.borrow(), &tmp, false);
            propagate_permanent(ctx.borrow());
        }

        ctx.part_mut(TmpDataP).tmp = tmp;
        Ok(())
    }

    /// Check a single proof step.
    pub fn check_step(&mut self, step: &ProofStep) -> Result<(), CheckerError> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(CheckerStateP).step += 1;

        let step_count = ctx.part(CheckerStateP).step;
        if step_count % 100_000 == 0 {
            log::info!("checking step {}k", step_count / 1000);
        }

        match step {
            ProofStep::AtClause { redundant, clause } => {
                check_at_clause_step(ctx.borrow(), *redundant, clause)
            }
            ProofStep::UnitClauses(units) => {
                for &unit in units.iter() {
                    check_at_clause_step(ctx.borrow(), false, &[unit])?;
                }
                Ok(())
            }
            ProofStep::DeleteClause { clause, proof } => {
                check_delete_clause_step(ctx.borrow(), clause, *proof)
            }
            ProofStep::End => {
                ctx.part_mut(CheckerStateP).ended = true;
                Ok(())
            }
        }
    }

    /// Check that a model satisfies the current formula.
    pub fn check_model(&mut self, model: &[Lit]) -> Result<(), CheckerError> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let step = ctx.part(CheckerStateP).step;

        let mut assigned = vec![];
        for &lit in model.iter() {
            if assigned.contains(&!lit) {
                return Err(CheckerError::check_failed(
                    step,
                    format!("model contains conflicting assignment {:?}", lit),
                ));
            }
            assigned.push(lit);
        }

        let clauses = ctx.part(ClausesP);
        for idx in clauses.live_clauses() {
            let lits = clauses.lits(idx);
            if !lits.iter().any(|lit| assigned.contains(lit)) {
                return Err(CheckerError::check_failed(
                    step,
                    format!("model does not satisfy clause {:?}", lits),
                ));
            }
        }

        Ok(())
    }

    /// Whether unsatisfiability was proven.
    pub fn unsat(&self) -> bool {
        self.ctx.checker_state.unsat
    }
}

/// Check and admit a derived clause.
fn check_at_clause_step(
    mut ctx: partial!(
        Context,
        mut CheckerStateP,
        mut ClausesP,
        mut PropagatorP,
        mut TmpDataP,
    ),
    redundant: bool,
    clause: &[Lit],
) -> Result<(), CheckerError> {
    if ctx.part(CheckerStateP).unsat {
        return Ok(());
    }

    let mut tmp = std::mem::take(&mut ctx.part_mut(TmpDataP).tmp);

    if copy_canonical(&mut tmp, clause) {
        ctx.part_mut(TmpDataP).tmp = tmp;
        let step = ctx.part(CheckerStateP).step;
        return Err(CheckerError::check_failed(
            step,
            format!("derived clause {:?} is a tautology", clause),
        ));
    }

    if !check_rup(ctx.borrow(), &tmp) {
        let step = ctx.part(CheckerStateP).step;
        let msg = format!("RUP check failed for {:?}", tmp);
        ctx.part_mut(TmpDataP).tmp = tmp;
        return Err(CheckerError::check_failed(step, msg));
    }

    store_clause(ctx.borrow(), &tmp, redundant);
    propagate_permanent(ctx.borrow());

    if !redundant {
        ctx.part_mut(CheckerStateP).previous_irred_clause = Some(tmp.clone());
    }

    ctx.part_mut(TmpDataP).tmp = tmp;
    Ok(())
}

/// Check and perform a clause deletion.
fn check_delete_clause_step(
    mut ctx: partial!(
        Context,
        mut CheckerStateP,
        mut ClausesP,
        mut PropagatorP,
        mut TmpDataP,
    ),
    clause: &[Lit],
    proof: DeleteClauseProof,
) -> Result<(), CheckerError> {
    if ctx.part(CheckerStateP).unsat {
        return Ok(());
    }

    let mut tmp = std::mem::take(&mut ctx.part_mut(TmpDataP).tmp);
    let tautology = copy_canonical(&mut tmp, clause);
    let step = ctx.part(CheckerStateP).step;

    let redundant = proof == DeleteClauseProof::Redundant;

    match proof {
        DeleteClauseProof::Redundant => (),
        // Weakened clauses carry a reconstruction witness on the solver's
        // extension stack; removing them only weakens the formula, which is
        // always sound for unsatisfiability proofs.
        DeleteClauseProof::Weakened => (),
        DeleteClauseProof::Satisfied => {
            if !tautology
                && !tmp
                    .iter()
                    .any(|&lit| ctx.part(PropagatorP).is_true(lit))
            {
                let msg = format!("deleted clause {:?} is not satisfied", clause);
                ctx.part_mut(TmpDataP).tmp = tmp;
                return Err(CheckerError::check_failed(step, msg));
            }
        }
        DeleteClauseProof::Simplified => {
            let subsumed = match &ctx.part(CheckerStateP).previous_irred_clause {
                Some(previous) => is_subset(&previous[..], &tmp, true),
                None => false,
            };
            if !subsumed {
                let msg = format!(
                    "deleted clause {:?} is not subsumed by the previous clause",
                    clause
                );
                ctx.part_mut(TmpDataP).tmp = tmp;
                return Err(CheckerError::check_failed(step, msg));
            }
        }
    }

    ctx.part_mut(CheckerStateP).previous_irred_clause = None;

    if tautology {
        ctx.part_mut(TmpDataP).tmp = tmp;
        return Ok(());
    }

    let result = delete_clause(ctx.borrow(), &tmp, redundant);

    ctx.part_mut(TmpDataP).tmp = tmp;

    match result {
        DeleteOutcome::Removed | DeleteOutcome::Unchanged | DeleteOutcome::Ignored => Ok(()),
        DeleteOutcome::NotFound => Err(CheckerError::check_failed(
            step,
            format!("delete of unknown clause {:?}", clause),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kestrel_formula::{cnf_formula, lits, CnfFormula};
    use kestrel_internal_proof::DeleteClauseProof;

    fn add_formula(checker: &mut Checker, formula: &CnfFormula) {
        for clause in formula.iter() {
            checker.add_clause(clause).unwrap();
        }
    }

    #[test]
    fn units_and_conflict() {
        let mut checker = Checker::new();

        add_formula(
            &mut checker,
            &cnf_formula![
                1;
                -1, 2;
                -2, -1;
            ],
        );

        assert!(checker.unsat());
    }

    #[test]
    fn accepts_rup_clauses() {
        let mut checker = Checker::new();

        add_formula(
            &mut checker,
            &cnf_formula![
                1, 2, 3;
                1, 2, -3;
                1, -2, 3;
            ],
        );

        checker
            .check_step(&ProofStep::AtClause {
                redundant: true,
                clause: &lits![1, 2],
            })
            .unwrap();

        checker
            .check_step(&ProofStep::AtClause {
                redundant: true,
                clause: &lits![1, 3],
            })
            .unwrap();

        assert!(!checker.unsat());
    }

    #[test]
    fn rejects_unjustified_clauses() {
        let mut checker = Checker::new();

        add_formula(
            &mut checker,
            &cnf_formula![
                1, 2, 3;
                -1, 2, 3;
            ],
        );

        let result = checker.check_step(&ProofStep::AtClause {
            redundant: true,
            clause: &lits![2],
        });

        assert!(result.is_err());
    }

    #[test]
    fn derives_empty_clause() {
        let mut checker = Checker::new();

        add_formula(
            &mut checker,
            &cnf_formula![
                1, 2;
                1, -2;
                -1, 2;
                -1, -2;
            ],
        );

        checker
            .check_step(&ProofStep::AtClause {
                redundant: true,
                clause: &lits![1],
            })
            .unwrap();

        checker
            .check_step(&ProofStep::AtClause {
                redundant: false,
                clause: &[],
            })
            .unwrap();

        assert!(checker.unsat());
    }

    #[test]
    fn deletions_are_tracked() {
        let mut checker = Checker::new();

        add_formula(
            &mut checker,
            &cnf_formula![
                1, 2, 3;
                1, 2, -3;
            ],
        );

        checker
            .check_step(&ProofStep::AtClause {
                redundant: false,
                clause: &lits![1, 2],
            })
            .unwrap();

        checker
            .check_step(&ProofStep::DeleteClause {
                clause: &lits![1, 2, 3],
                proof: DeleteClauseProof::Simplified,
            })
            .unwrap();

        let result = checker.check_step(&ProofStep::DeleteClause {
            clause: &lits![1, 2, 3],
            proof: DeleteClauseProof::Redundant,
        });

        assert!(result.is_err());
    }

    #[test]
    fn model_checking() {
        let mut checker = Checker::new();

        add_formula(
            &mut checker,
            &cnf_formula![
                1, 2;
                -1, 3;
            ],
        );

        checker.check_model(&lits![1, -2, 3]).unwrap();
        assert!(checker.check_model(&lits![-1, -2, 3]).is_err());
        assert!(checker.check_model(&lits![1, -1, 3]).is_err());
    }
}
