//! Simplification using root level assignments.
use partial_ref::{partial, PartialRef};

use kestrel_formula::Lit;
use kestrel_internal_proof::{DeleteClauseProof, ProofStep};

use crate::clause::{db, ClauseRef};
use crate::context::{parts::*, Context};
use crate::prop::watch;

/// Turn the reasons of all root level assignments into units and flush them
/// from the trail.
///
/// Returns true when new units were flushed since the last call.
pub fn prove_units<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ImplGraphP,
        mut ProofP<'a>,
        mut SolverStateP,
        mut TrailP,
    ),
) -> bool {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    if ctx.part(TrailP).trail().is_empty() {
        return false;
    }

    let (impl_graph, mut ctx) = ctx.split_part_mut(ImplGraphP);
    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    let mut units = vec![];

    for &lit in trail.trail() {
        if !impl_graph.reason(lit.var()).is_unit_or_decision() {
            units.push(lit);
        }
        impl_graph.update_removed_unit(lit.var());
    }

    ctx.part_mut(SolverStateP).stats.units_flushed += trail.trail().len() as u64;
    trail.clear();

    if !units.is_empty() {
        ctx.part_mut(ProofP)
            .add_step(&ProofStep::UnitClauses(&units));
    }

    true
}

/// Remove satisfied clauses and false literals.
///
/// Requires a fully propagated root level trail.
pub fn simplify<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ProofP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut WatchlistsP,
        AssignmentP,
    ),
) {
    simplify_binary(ctx.borrow());

    let crefs: Vec<ClauseRef> = ctx.part(ClauseDbP).clauses.clone();

    let mut new_lits = std::mem::take(&mut ctx.part_mut(TmpDataP).lits);

    for cref in crefs {
        if ctx.part(ClauseAllocP).header(cref).garbage() {
            continue;
        }

        let redundant = ctx.part(ClauseAllocP).header(cref).redundant();

        let mut satisfied = false;
        new_lits.clear();
        for &lit in ctx.part(ClauseAllocP).lits(cref) {
            match ctx.part(AssignmentP).value(lit) {
                value if value > 0 => {
                    satisfied = true;
                    break;
                }
                value if value < 0 => (),
                _ => new_lits.push(lit),
            }
        }

        if satisfied {
            let lits: Vec<Lit> = ctx.part(ClauseAllocP).lits(cref).to_vec();
            ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
                clause: &lits,
                proof: DeleteClauseProof::Satisfied,
            });
            db::delete_watched_clause(ctx.borrow(), cref);
            continue;
        }

        let old_len = ctx.part(ClauseAllocP).header(cref).len();
        if new_lits.len() == old_len {
            continue;
        }

        // Cannot have empty or unit clauses after full propagation. An empty
        // clause would have been a conflict and a unit clause would have
        // propagated, satisfying the clause.
        debug_assert!(new_lits.len() >= 2);

        {
            let old_lits: Vec<Lit> = ctx.part(ClauseAllocP).lits(cref).to_vec();
            ctx.part_mut(ProofP).add_step(&ProofStep::AtClause {
                redundant,
                clause: &new_lits,
            });
            ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
                clause: &old_lits,
                proof: if redundant {
                    DeleteClauseProof::Redundant
                } else {
                    DeleteClauseProof::Simplified
                },
            });
        }

        if new_lits.len() == 2 {
            db::delete_watched_clause(ctx.borrow(), cref);
            ctx.part_mut(WatchlistsP)
                .watch_binary_clause([new_lits[0], new_lits[1]], redundant, false);
        } else {
            // The watched literals are unassigned and order is preserved, so
            // they stay in the watched positions.
            let lits = ctx.part_mut(ClauseAllocP).clause_mut(cref).lits_mut();
            debug_assert_eq!(lits[0], new_lits[0]);
            debug_assert_eq!(lits[1], new_lits[1]);
            lits[..new_lits.len()].copy_from_slice(&new_lits);
            ctx.part_mut(ClauseAllocP)
                .shrink_clause(cref, new_lits.len());
            ctx.part_mut(ClauseDbP).garbage_size += old_len - new_lits.len();
        }
    }

    ctx.part_mut(TmpDataP).lits = new_lits;
}

/// Remove binary clauses satisfied at the root level.
fn simplify_binary<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ProofP<'a>,
        mut SolverStateP,
        mut WatchlistsP,
        AssignmentP,
    ),
) {
    let var_count = ctx.part(AssignmentP).var_count();

    let mut satisfied = vec![];

    for code in 0..var_count * 2 {
        let lit = Lit::from_code(code);
        for entry in ctx.part(WatchlistsP).entries(lit) {
            if let watch::WatchEntry::Binary { other, .. } = entry {
                if lit.code() > other.code() {
                    continue;
                }
                debug_assert!(
                    !ctx.part(AssignmentP).lit_is_false(lit)
                        || ctx.part(AssignmentP).lit_is_true(other)
                );
                if ctx.part(AssignmentP).lit_is_true(lit)
                    || ctx.part(AssignmentP).lit_is_true(other)
                {
                    satisfied.push([lit, other]);
                }
            }
        }
    }

    for lits in satisfied {
        ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
            clause: &lits,
            proof: DeleteClauseProof::Satisfied,
        });
        ctx.part_mut(WatchlistsP).remove_binary_clause(lits);
    }
}
