//! Clause vivification.
//!
//! A candidate clause is checked by assuming the negations of its literals
//! one at a time and propagating, with the candidate itself excluded from
//! propagation. Three outcomes shrink the clause: a literal becomes true
//! (the assumed prefix plus that literal subsumes the clause), a literal
//! becomes false (it can be dropped), or propagation conflicts (the assumed
//! prefix alone is a clause).
use partial_ref::{partial, PartialRef};

use kestrel_formula::Lit;
use kestrel_internal_proof::{DeleteClauseProof, ProofStep};

use crate::clause::{db, ClauseHeader, ClauseRef};
use crate::context::{parts::*, Context};
use crate::prop::{backtrack, enqueue_assignment, propagate_probing, Reason};
use crate::state::SatState;

/// Vivify scheduled clauses within the tick budget.
///
/// Requires probing mode at a flushed root level.
pub fn vivify<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut PhasesP,
        mut ProofP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VmtfP,
        mut VsidsP,
        mut WatchlistsP,
        ScheduleP,
        SolverConfigP,
    ),
) -> bool {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);
    debug_assert!(ctx.part(SolverStateP).probing);

    let budget = ctx.part(SolverStateP).stats.probe_ticks
        + ctx.part(SolverConfigP).vivify_effort;

    // Redundant clauses first, tighter glues first; irredundant clauses are
    // vivified with the remaining budget.
    let mut candidates: Vec<(bool, usize, usize, ClauseRef)> = vec![];
    for &cref in ctx.part(ClauseDbP).clauses.iter() {
        let header = ctx.part(ClauseAllocP).header(cref);
        if header.garbage() || header.hyper() {
            continue;
        }
        candidates.push((!header.redundant(), header.glue(), header.len(), cref));
    }
    candidates.sort_unstable();

    let mut progress = false;

    for (_, _, _, cref) in candidates {
        if ctx.part(SolverStateP).terminated()
            || ctx.part(SolverStateP).stats.probe_ticks > budget
            || ctx.part(SolverStateP).inconsistent
        {
            break;
        }
        if ctx.part(ClauseAllocP).header(cref).garbage() {
            continue;
        }
        progress |= vivify_clause(ctx.borrow(), cref);
    }

    progress
}

/// Try to shrink one clause by assumption propagation.
fn vivify_clause<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut PhasesP,
        mut ProofP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VmtfP,
        mut VsidsP,
        mut WatchlistsP,
        ScheduleP,
    ),
    cref: ClauseRef,
) -> bool {
    let mut sorted: Vec<Lit> = ctx.part(ClauseAllocP).lits(cref).to_vec();
    let original_len = sorted.len();

    // Literals with many occurrences first: they are most likely to trigger
    // propagations that shortcut the rest of the clause.
    {
        let watchlists = ctx.part(WatchlistsP);
        sorted.sort_unstable_by_key(|&lit| usize::max_value() - watchlists.words(lit).len());
    }

    let mut kept: Vec<Lit> = vec![];
    let mut shrunk = None;
    let mut removed_any = false;

    for &lit in sorted.iter() {
        let value = ctx.part(AssignmentP).value(lit);
        if value > 0 {
            kept.push(lit);
            if kept.len() < original_len {
                shrunk = Some(kept.clone());
            }
            break;
        }
        if value < 0 {
            removed_any = true;
            continue;
        }

        kept.push(lit);
        ctx.part_mut(TrailP).new_decision_level(!lit);
        enqueue_assignment(ctx.borrow(), !lit, Reason::Decision);

        if propagate_probing(ctx.borrow(), false, Some(cref)).is_err() {
            if kept.len() < original_len {
                shrunk = Some(kept.clone());
            }
            break;
        }
    }

    backtrack(ctx.borrow(), 0);

    if shrunk.is_none() && removed_any && kept.len() < original_len {
        shrunk = Some(kept);
    }

    let new_lits = match shrunk {
        Some(new_lits) => new_lits,
        None => return false,
    };

    debug_assert!(!new_lits.is_empty());

    let redundant = ctx.part(ClauseAllocP).header(cref).redundant();
    let glue = ctx.part(ClauseAllocP).header(cref).glue();

    ctx.part_mut(SolverStateP).stats.vivified += 1;

    ctx.part_mut(ProofP).add_step(&ProofStep::AtClause {
        redundant,
        clause: &new_lits,
    });

    let old_lits: Vec<Lit> = ctx.part(ClauseAllocP).lits(cref).to_vec();
    ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
        clause: &old_lits,
        proof: if redundant {
            DeleteClauseProof::Redundant
        } else {
            DeleteClauseProof::Simplified
        },
    });
    db::delete_watched_clause(ctx.borrow(), cref);

    install_clause(ctx.borrow(), &new_lits, redundant, glue);

    true
}

/// Install a derived clause in sparse mode, dispatching on its shape under
/// the root assignment.
pub fn install_clause<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut PhasesP,
        mut ProofP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut WatchlistsP,
    ),
    lits: &[Lit],
    redundant: bool,
    glue: usize,
) {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let mut sorted: Vec<Lit> = lits.to_vec();

    // Move two non-false literals to the watched positions.
    let mut filled = 0;
    for pos in 0..sorted.len() {
        if !ctx.part(AssignmentP).lit_is_false(sorted[pos]) {
            sorted.swap(filled, pos);
            filled += 1;
            if filled == 2 {
                break;
            }
        }
    }

    if sorted.is_empty() || filled == 0 {
        ctx.part_mut(SolverStateP).inconsistent = true;
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
        ctx.part_mut(ProofP).add_step(&ProofStep::AtClause {
            redundant: false,
            clause: &[],
        });
        return;
    }

    if filled == 1 {
        // Effectively a unit under the root assignment.
        let unit = sorted[0];
        if ctx.part(AssignmentP).lit_is_unk(unit) {
            enqueue_assignment(ctx.borrow(), unit, Reason::Unit);
        }
        return;
    }

    match sorted.len() {
        2 => {
            ctx.part_mut(WatchlistsP)
                .watch_binary_clause([sorted[0], sorted[1]], redundant, false);
        }
        _ => {
            let mut header = ClauseHeader::new();
            header.set_redundant(redundant);
            header.set_glue(glue);
            header.set_subsume(true);
            db::add_watched_clause(ctx.borrow(), header, &sorted);
        }
    }
}
