//! Ternary hyper resolution.
//!
//! Pairs of ternary clauses sharing a pivot variable are resolved. Binary
//! and ternary resolvents that are not already present are added as
//! redundant clauses tagged `hyper`, so the next reductions drop them again
//! unless they prove useful. A binary resolvent that subsumes both
//! antecedents replaces them.
use partial_ref::{partial, PartialRef};

use kestrel_formula::{Lit, Var};
use kestrel_internal_proof::{DeleteClauseProof, ProofStep};

use crate::clause::{db, ClauseHeader, ClauseRef};
use crate::context::{parts::*, Context};
use crate::prop::watch::WatchEntry;

/// Resolve ternary clause pairs, bounded by the configured resolvent limit.
pub fn ternary<'a>(
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
        SolverConfigP,
    ),
) -> bool {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let limit = ctx.part(SolverConfigP).ternary_limit;

    // Occurrence lists of ternary clauses only, indexed by literal code.
    let lit_count = ctx.part(AssignmentP).var_count() * 2;
    let mut occurrences: Vec<Vec<ClauseRef>> = vec![vec![]; lit_count];

    for &cref in ctx.part(ClauseDbP).clauses.iter() {
        let header = ctx.part(ClauseAllocP).header(cref);
        if header.garbage() || header.len() != 3 {
            continue;
        }
        // Clauses touched by units found earlier in this probing round are
        // left to the next simplification.
        if ctx
            .part(ClauseAllocP)
            .lits(cref)
            .iter()
            .any(|&lit| !ctx.part(AssignmentP).lit_is_unk(lit))
        {
            continue;
        }
        for &lit in ctx.part(ClauseAllocP).lits(cref) {
            occurrences[lit.code()].push(cref);
        }
    }

    let mut added = 0;
    let mut progress = false;

    'vars: for index in 0..lit_count / 2 {
        let var = Var::from_index(index);
        if !ctx.part(VariablesP).flags(var).active {
            continue;
        }
        if ctx.part(SolverStateP).terminated() {
            break;
        }

        let pos = var.positive();
        let neg = var.negative();

        for i in 0..occurrences[pos.code()].len() {
            for j in 0..occurrences[neg.code()].len() {
                if added >= limit {
                    break 'vars;
                }

                let c_ref = occurrences[pos.code()][i];
                let d_ref = occurrences[neg.code()][j];
                if ctx.part(ClauseAllocP).header(c_ref).garbage()
                    || ctx.part(ClauseAllocP).header(d_ref).garbage()
                {
                    continue;
                }

                let resolvent = {
                    let alloc = ctx.part(ClauseAllocP);
                    resolve_ternary(alloc.lits(c_ref), alloc.lits(d_ref), pos)
                };

                let mut resolvent = match resolvent {
                    Some(resolvent) => resolvent,
                    None => continue,
                };
                resolvent.sort_unstable();

                if resolvent.len() > 3 {
                    continue;
                }

                if resolvent_present(ctx.borrow(), &resolvent, &occurrences) {
                    continue;
                }

                ctx.part_mut(SolverStateP).stats.ternary_resolvents += 1;
                added += 1;
                progress = true;

                ctx.part_mut(ProofP).add_step(&ProofStep::AtClause {
                    redundant: true,
                    clause: &resolvent,
                });

                if resolvent.len() == 2 {
                    ctx.part_mut(WatchlistsP).watch_binary_clause(
                        [resolvent[0], resolvent[1]],
                        true,
                        true,
                    );

                    // A binary resolvent of matching antecedents subsumes
                    // both of them.
                    let subsumes = |lits: &[Lit]| {
                        resolvent.iter().all(|lit| lits.contains(lit))
                    };
                    let c_subsumed = subsumes(ctx.part(ClauseAllocP).lits(c_ref));
                    let d_subsumed = subsumes(ctx.part(ClauseAllocP).lits(d_ref));
                    for (subsumed, cref) in [(c_subsumed, c_ref), (d_subsumed, d_ref)].iter() {
                        if *subsumed {
                            let lits: Vec<Lit> =
                                ctx.part(ClauseAllocP).lits(*cref).to_vec();
                            let redundant =
                                ctx.part(ClauseAllocP).header(*cref).redundant();
                            ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
                                clause: &lits,
                                proof: if redundant {
                                    DeleteClauseProof::Redundant
                                } else {
                                    DeleteClauseProof::Weakened
                                },
                            });
                            db::delete_watched_clause(ctx.borrow(), *cref);
                        }
                    }
                } else {
                    let mut header = ClauseHeader::new();
                    header.set_redundant(true);
                    header.set_hyper(true);
                    header.set_glue(2);
                    header.set_used(1);
                    let new_ref = db::add_watched_clause(ctx.borrow(), header, &resolvent);
                    for &lit in resolvent.iter() {
                        occurrences[lit.code()].push(new_ref);
                    }
                }
            }
        }
    }

    progress
}

/// Resolve two ternary clauses on the given pivot.
///
/// Returns `None` for tautological resolvents.
fn resolve_ternary(c_lits: &[Lit], d_lits: &[Lit], pivot: Lit) -> Option<Vec<Lit>> {
    let mut resolvent: Vec<Lit> = vec![];

    for &lit in c_lits.iter().chain(d_lits.iter()) {
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

    Some(resolvent)
}

/// Whether the resolvent is already present as a binary or ternary clause.
fn resolvent_present(
    mut ctx: partial!(Context, ClauseAllocP, WatchlistsP),
    resolvent: &[Lit],
    occurrences: &[Vec<ClauseRef>],
) -> bool {
    if resolvent.len() == 2 {
        return ctx
            .part(WatchlistsP)
            .entries(resolvent[0])
            .any(|entry| match entry {
                WatchEntry::Binary { other, .. } => other == resolvent[1],
                _ => false,
            });
    }

    for &cref in occurrences[resolvent[0].code()].iter() {
        let header = ctx.part(ClauseAllocP).header(cref);
        if header.garbage() {
            continue;
        }
        let mut lits: Vec<Lit> = ctx.part(ClauseAllocP).lits(cref).to_vec();
        lits.sort_unstable();
        if lits == resolvent {
            return true;
        }
    }

    false
}
