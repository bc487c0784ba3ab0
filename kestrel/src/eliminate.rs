//! Bounded variable elimination with gate extraction.
//!
//! Candidates are processed by ascending pair product score. A candidate is
//! eliminated when all its non-tautological resolvents fit into the budget
//! of original clauses plus a slowly growing allowance. A detected gate
//! restricts resolution to pairs of one defining and one environment
//! clause. The eliminated clauses move to the extension stack so a witness
//! can be reconstructed.
use partial_ref::{partial, PartialRef};

use kestrel_formula::{Lit, Var};
use kestrel_internal_proof::{DeleteClauseProof, ProofStep};

use crate::autarky::autarky;
use crate::clause::{db, gc, ClauseHeader, ClauseRef};
use crate::context::{parts::*, Context};
use crate::gates::extract_gate;
use crate::prop::watch::WatchEntry;
use crate::prop::{enqueue_assignment, Reason};
use crate::subsume::{backward_subsume, forward_subsume};

/// One occurrence of the candidate variable.
#[derive(Copy, Clone)]
enum Occurrence {
    Binary(Lit),
    Long(ClauseRef),
}

/// Run the elimination window: forward subsumption, bounded variable
/// elimination and autarky detection.
///
/// Requires a fully propagated and flushed root level. Returns true when
/// the clause database changed.
pub fn eliminate<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeP,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ExtenderP,
        mut ImplGraphP,
        mut PhasesP,
        mut ProofP<'a>,
        mut ScheduleP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VmtfP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) -> bool {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);
    debug_assert!(ctx.part(TrailP).fully_propagated());

    ctx.part_mut(SolverStateP).stats.eliminate_rounds += 1;

    // Each round reconsiders all active variables; the growing resolvent
    // allowance lets later rounds succeed where earlier ones gave up.
    ctx.part_mut(VariablesP)
        .reschedule_all(|flags| flags.eliminate = true);

    db::connect_all_occurrences(ctx.borrow());

    let mut progress = false;

    if ctx.part(SolverConfigP).subsume {
        progress |= forward_subsume(ctx.borrow());
    }

    // Schedule candidates by the pair product score.
    let occ_limit = ctx.part(SolverConfigP).eliminate_occ_limit;
    let var_count = ctx.part(AssignmentP).var_count();

    let mut candidates: Vec<(usize, Var)> = vec![];
    for index in 0..var_count {
        let var = Var::from_index(index);
        let flags = ctx.part(VariablesP).flags(var);
        if !flags.active || !flags.eliminate {
            continue;
        }
        if ctx.part(AssignmentP).var_is_assigned(var) {
            continue;
        }
        let pos = ctx.part(WatchlistsP).occurrence_count(var.positive());
        let neg = ctx.part(WatchlistsP).occurrence_count(var.negative());
        if pos > occ_limit || neg > occ_limit {
            continue;
        }
        candidates.push((pos * neg + pos + neg, var));
    }
    candidates.sort_unstable();

    let mut completed = true;

    for (_, var) in candidates {
        if ctx.part(SolverStateP).terminated() {
            completed = false;
            break;
        }
        if ctx.part(SolverStateP).inconsistent {
            completed = false;
            break;
        }
        if ctx.part(AssignmentP).var_is_assigned(var) {
            continue;
        }
        ctx.part_mut(VariablesP).flags_mut(var).eliminate = false;
        if try_eliminate(ctx.borrow(), var) {
            ctx.part_mut(SolverStateP).stats.eliminated_vars += 1;
            progress = true;
        }
    }

    db::rewatch_all(ctx.borrow());

    if ctx.part(SolverConfigP).autarky && !ctx.part(SolverStateP).inconsistent {
        progress |= autarky(ctx.borrow());
    }

    if completed {
        // A completed sweep relaxes the resolvent budget for the next one.
        let bound = ctx.part(SolverConfigP).eliminate_bound;
        let additional = &mut ctx.part_mut(ScheduleP).eliminate_additional;
        *additional = std::cmp::min(std::cmp::max(1, *additional * 2), bound);
    }

    gc::collect_garbage(ctx.borrow());

    progress
}

/// Try to eliminate a single variable.
fn try_eliminate<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ExtenderP,
        mut ImplGraphP,
        mut PhasesP,
        mut ProofP<'a>,
        mut ScheduleP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    var: Var,
) -> bool {
    let pivot = var.positive();

    let clause_limit = ctx.part(SolverConfigP).eliminate_clause_limit;

    let (pos_occs, pos_lits) = match gather_occurrences(ctx.borrow(), pivot, clause_limit) {
        Some(gathered) => gathered,
        None => return false,
    };
    let (neg_occs, neg_lits) = match gather_occurrences(ctx.borrow(), !pivot, clause_limit) {
        Some(gathered) => gathered,
        None => return false,
    };

    let gate = if ctx.part(SolverConfigP).gates {
        let config = ctx.part(SolverConfigP);
        extract_gate(
            pivot,
            &pos_lits,
            &neg_lits,
            config.xor_clause_limit,
            config.definitions,
            config.definition_effort,
        )
    } else {
        None
    };

    if gate.is_some() {
        ctx.part_mut(SolverStateP).stats.gates_extracted += 1;
    }

    // Generate and bound the resolvents.
    let budget = pos_lits.len() + neg_lits.len() + ctx.part(ScheduleP).eliminate_additional;

    let mut resolvents: Vec<Vec<Lit>> = vec![];

    for (i, pos_clause) in pos_lits.iter().enumerate() {
        for (j, neg_clause) in neg_lits.iter().enumerate() {
            if let Some(gate) = &gate {
                if gate.pos_gate[i] == gate.neg_gate[j] {
                    continue;
                }
            }

            let resolvent = match resolve(pos_clause, neg_clause, pivot) {
                Some(resolvent) => resolvent,
                None => continue,
            };

            if resolvent.len() > clause_limit {
                return false;
            }

            if ctx.part(SolverConfigP).incremental && resolvent.len() == 1 {
                return false;
            }

            resolvents.push(resolvent);

            if resolvents.len() > budget {
                return false;
            }
        }
    }

    // Commit: add the resolvents, then weaken all clauses of the variable.
    for resolvent in resolvents.iter() {
        ctx.part_mut(ProofP).add_step(&ProofStep::AtClause {
            redundant: false,
            clause: resolvent,
        });
        ctx.part_mut(SolverStateP).stats.resolvents_added += 1;

        match resolvent.len() {
            1 => {
                if ctx.part(AssignmentP).lit_is_unk(resolvent[0]) {
                    enqueue_assignment(ctx.borrow(), resolvent[0], Reason::Unit);
                }
            }
            2 => {
                ctx.part_mut(WatchlistsP)
                    .watch_binary_clause([resolvent[0], resolvent[1]], false, false);
            }
            _ => {
                let mut header = ClauseHeader::new();
                header.set_subsume(true);
                let cref = db::add_clause(ctx.borrow(), header, resolvent);
                for &lit in resolvent.iter() {
                    ctx.part_mut(WatchlistsP).connect_occurrence(lit, cref);
                }
            }
        }

        if ctx.part(SolverConfigP).subsume && resolvent.len() >= 2 {
            backward_subsume(ctx.borrow(), resolvent);
        }
    }

    for (occurrence, lits) in pos_occs.iter().zip(pos_lits.iter()) {
        weaken_occurrence(ctx.borrow(), pivot, *occurrence, lits);
    }
    for (occurrence, lits) in neg_occs.iter().zip(neg_lits.iter()) {
        weaken_occurrence(ctx.borrow(), !pivot, *occurrence, lits);
    }

    remove_remaining_occurrences(ctx.borrow(), pivot);
    remove_remaining_occurrences(ctx.borrow(), !pivot);

    ctx.part_mut(VariablesP).mark_eliminated(var);

    true
}

/// Gather the irredundant, unsatisfied occurrences of a literal.
///
/// Returns `None` when a clause exceeds the configured size limit. The
/// literal lists are sorted for the gate matching.
fn gather_occurrences(
    mut ctx: partial!(Context, AssignmentP, ClauseAllocP, WatchlistsP),
    lit: Lit,
    clause_limit: usize,
) -> Option<(Vec<Occurrence>, Vec<Vec<Lit>>)> {
    let mut occurrences = vec![];
    let mut lit_lists = vec![];

    let entries: Vec<WatchEntry> = ctx.part(WatchlistsP).entries(lit).collect();
    for entry in entries {
        match entry {
            WatchEntry::Binary {
                other, redundant, ..
            } => {
                if redundant {
                    continue;
                }
                if ctx.part(AssignmentP).lit_is_true(other) {
                    continue;
                }
                let mut lits = vec![lit, other];
                lits.sort_unstable();
                occurrences.push(Occurrence::Binary(other));
                lit_lists.push(lits);
            }
            WatchEntry::Large { cref, .. } => {
                let header = ctx.part(ClauseAllocP).header(cref);
                if header.garbage() || header.redundant() {
                    continue;
                }
                if header.len() > clause_limit {
                    return None;
                }
                let clause_lits = ctx.part(ClauseAllocP).lits(cref);
                if clause_lits
                    .iter()
                    .any(|&other| ctx.part(AssignmentP).lit_is_true(other))
                {
                    continue;
                }
                let mut lits = clause_lits.to_vec();
                lits.sort_unstable();
                occurrences.push(Occurrence::Long(cref));
                lit_lists.push(lits);
            }
        }
    }

    Some((occurrences, lit_lists))
}

/// Resolve two clauses on the pivot.
///
/// Returns `None` for tautological resolvents.
fn resolve(pos_clause: &[Lit], neg_clause: &[Lit], pivot: Lit) -> Option<Vec<Lit>> {
    let mut resolvent: Vec<Lit> = vec![];

    for &lit in pos_clause.iter().chain(neg_clause.iter()) {
        if lit == pivot || lit == !pivot {
            continue;
        }
        if resolvent.contains(&!lit) {
            return None;
        }
        if !resolvent.contains(&lit) {
            resolvent.push(lit);
        }
    }

    resolvent.sort_unstable();
    Some(resolvent)
}

/// Move one occurrence of the eliminated variable to the extension stack.
fn weaken_occurrence<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ExtenderP,
        mut ProofP<'a>,
        mut WatchlistsP,
    ),
    witness: Lit,
    occurrence: Occurrence,
    lits: &[Lit],
) {
    match occurrence {
        Occurrence::Binary(other) => {
            ctx.part_mut(ExtenderP).push_weakened(witness, lits);
            ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
                clause: lits,
                proof: DeleteClauseProof::Weakened,
            });
            ctx.part_mut(WatchlistsP)
                .remove_binary_clause([witness, other]);
        }
        Occurrence::Long(cref) => {
            if ctx.part(ClauseAllocP).header(cref).garbage() {
                return;
            }
            ctx.part_mut(ExtenderP).push_weakened(witness, lits);
            ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
                clause: lits,
                proof: DeleteClauseProof::Weakened,
            });
            db::disconnect_occurrences(ctx.borrow(), cref);
            db::delete_clause(ctx.borrow(), cref);
        }
    }
}

/// Remove the redundant and satisfied clauses still containing the pivot.
fn remove_remaining_occurrences<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ProofP<'a>,
        mut WatchlistsP,
    ),
    lit: Lit,
) {
    let entries: Vec<WatchEntry> = ctx.part(WatchlistsP).entries(lit).collect();

    for entry in entries {
        match entry {
            WatchEntry::Binary { other, .. } => {
                let satisfied = ctx.part(AssignmentP).lit_is_true(lit)
                    || ctx.part(AssignmentP).lit_is_true(other);
                let lits = [lit, other];
                ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
                    clause: &lits,
                    proof: if satisfied {
                        DeleteClauseProof::Satisfied
                    } else {
                        DeleteClauseProof::Redundant
                    },
                });
                ctx.part_mut(WatchlistsP).remove_binary_clause(lits);
            }
            WatchEntry::Large { cref, .. } => {
                if ctx.part(ClauseAllocP).header(cref).garbage() {
                    continue;
                }
                let satisfied = {
                    let assignment = ctx.part(AssignmentP);
                    ctx.part(ClauseAllocP)
                        .lits(cref)
                        .iter()
                        .any(|&other| assignment.lit_is_true(other))
                };
                let redundant = ctx.part(ClauseAllocP).header(cref).redundant();
                let lits: Vec<Lit> = ctx.part(ClauseAllocP).lits(cref).to_vec();
                ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
                    clause: &lits,
                    proof: if satisfied {
                        DeleteClauseProof::Satisfied
                    } else {
                        debug_assert!(redundant);
                        DeleteClauseProof::Redundant
                    },
                });
                db::disconnect_occurrences(ctx.borrow(), cref);
                db::delete_clause(ctx.borrow(), cref);
            }
        }
    }
}
