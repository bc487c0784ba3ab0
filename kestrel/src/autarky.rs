//! Autarky detection.
//!
//! An autarky is a partial assignment that satisfies every clause it
//! touches. Variables of an autarky can be removed from the formula: the
//! touched clauses move to the extension stack, where the autarky assignment
//! reconstructs their satisfaction in any model of the rest.
//!
//! The candidate starts as the saved phases of all unassigned variables.
//! Any touched but unsatisfied clause removes its candidate variables, until
//! a fixed point is reached.
use partial_ref::{partial, PartialRef};

use kestrel_formula::{Lit, Var};
use kestrel_internal_proof::{DeleteClauseProof, ProofStep};

use crate::clause::{db, ClauseRef};
use crate::context::{parts::*, Context};
use crate::prop::watch::WatchEntry;

/// Detect and eliminate one autarky.
///
/// Requires sparse mode and a flushed root level. Returns true when any
/// variable was eliminated.
pub fn autarky<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ExtenderP,
        mut PhasesP,
        mut ProofP<'a>,
        mut SolverStateP,
        mut VariablesP,
        mut WatchlistsP,
        TrailP,
    ),
) -> bool {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);
    debug_assert!(!ctx.part(WatchlistsP).dense());

    let var_count = ctx.part(AssignmentP).var_count();

    // The conjectured autarky: one phase byte per variable, zero when the
    // variable is not (or no longer) part of it.
    let mut candidate: Vec<i8> = (0..var_count)
        .map(|index| {
            let var = Var::from_index(index);
            if ctx.part(VariablesP).flags(var).active
                && !ctx.part(AssignmentP).var_is_assigned(var)
            {
                let saved = ctx.part(PhasesP).get(var).saved;
                if saved == 0 {
                    -1
                } else {
                    saved
                }
            } else {
                0
            }
        })
        .collect();

    if candidate.iter().all(|&phase| phase == 0) {
        return false;
    }

    let lit_value = |candidate: &[i8], lit: Lit| -> i8 {
        let phase = candidate[lit.index()];
        if lit.is_positive() {
            phase
        } else {
            -phase
        }
    };

    let binaries = collect_binaries(ctx.borrow());

    loop {
        let mut changed = false;

        for &([lit_a, lit_b], redundant) in binaries.iter() {
            if redundant {
                continue;
            }
            drop_unsatisfied(&mut candidate, &[lit_a, lit_b], lit_value, &mut changed);
        }

        let crefs: Vec<ClauseRef> = ctx.part(ClauseDbP).clauses.clone();
        for cref in crefs {
            let header = ctx.part(ClauseAllocP).header(cref);
            if header.garbage() || header.redundant() {
                continue;
            }
            let lits: Vec<Lit> = ctx.part(ClauseAllocP).lits(cref).to_vec();
            drop_unsatisfied(&mut candidate, &lits, lit_value, &mut changed);
        }

        if !changed {
            break;
        }
    }

    if candidate.iter().all(|&phase| phase == 0) {
        return false;
    }

    // Remove all touched clauses, recording reconstruction witnesses.
    let binaries = collect_binaries(ctx.borrow());
    for ([lit_a, lit_b], redundant) in binaries {
        if candidate[lit_a.index()] == 0 && candidate[lit_b.index()] == 0 {
            continue;
        }
        let lits = [lit_a, lit_b];
        if redundant {
            ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
                clause: &lits,
                proof: DeleteClauseProof::Redundant,
            });
        } else {
            let witness = if lit_value(&candidate, lit_a) > 0 {
                lit_a
            } else {
                debug_assert!(lit_value(&candidate, lit_b) > 0);
                lit_b
            };
            ctx.part_mut(ExtenderP).push_weakened(witness, &lits);
            ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
                clause: &lits,
                proof: DeleteClauseProof::Weakened,
            });
        }
        ctx.part_mut(WatchlistsP).remove_binary_clause(lits);
    }

    let crefs: Vec<ClauseRef> = ctx.part(ClauseDbP).clauses.clone();
    for cref in crefs {
        let header = ctx.part(ClauseAllocP).header(cref);
        if header.garbage() {
            continue;
        }
        let redundant = header.redundant();
        let lits: Vec<Lit> = ctx.part(ClauseAllocP).lits(cref).to_vec();
        let touched = lits.iter().any(|&lit| candidate[lit.index()] != 0);
        if !touched {
            continue;
        }

        if redundant {
            ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
                clause: &lits,
                proof: DeleteClauseProof::Redundant,
            });
            db::delete_watched_clause(ctx.borrow(), cref);
            continue;
        }

        let witness = lits
            .iter()
            .cloned()
            .find(|&lit| lit_value(&candidate, lit) > 0)
            .expect("autarky fixed point left unsatisfied touched clause");
        ctx.part_mut(ExtenderP).push_weakened(witness, &lits);
        ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
            clause: &lits,
            proof: DeleteClauseProof::Weakened,
        });
        db::delete_watched_clause(ctx.borrow(), cref);
    }

    let mut eliminated = 0;
    for index in 0..var_count {
        if candidate[index] != 0 {
            let var = Var::from_index(index);
            ctx.part_mut(VariablesP).mark_eliminated(var);
            // The autarky polarity becomes the default for reconstruction.
            ctx.part_mut(PhasesP).get_mut(var).saved = candidate[index];
            eliminated += 1;
        }
    }

    ctx.part_mut(SolverStateP).stats.autarky_vars += eliminated;

    eliminated > 0
}

/// Drop all candidate variables of a clause that is touched but not
/// satisfied by the candidate assignment.
fn drop_unsatisfied(
    candidate: &mut [i8],
    lits: &[Lit],
    lit_value: impl Fn(&[i8], Lit) -> i8,
    changed: &mut bool,
) {
    let touched = lits.iter().any(|&lit| candidate[lit.index()] != 0);
    if !touched {
        return;
    }
    let satisfied = lits.iter().any(|&lit| lit_value(candidate, lit) > 0);
    if satisfied {
        return;
    }
    for &lit in lits {
        if candidate[lit.index()] != 0 {
            candidate[lit.index()] = 0;
            *changed = true;
        }
    }
}

/// Snapshot all binary clauses with their redundancy.
fn collect_binaries(
    mut ctx: partial!(Context, AssignmentP, WatchlistsP),
) -> Vec<([Lit; 2], bool)> {
    let mut binaries = vec![];
    let var_count = ctx.part(AssignmentP).var_count();
    for code in 0..var_count * 2 {
        let lit = Lit::from_code(code);
        for entry in ctx.part(WatchlistsP).entries(lit) {
            if let WatchEntry::Binary {
                other, redundant, ..
            } = entry
            {
                if lit.code() < other.code() {
                    binaries.push(([lit, other], redundant));
                }
            }
        }
    }
    binaries
}
