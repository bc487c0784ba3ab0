//! Forward and backward subsumption.
//!
//! Both directions run in dense mode, where the watchlists hold all literal
//! occurrences. Forward subsumption asks whether a candidate clause is
//! subsumed (or can be strengthened) by some other stored clause; backward
//! subsumption removes stored clauses subsumed by a freshly added resolvent.
//!
//! The subset tests mark the literals of one clause and check the other
//! clause literal by literal against the marks. A literal whose negation is
//! marked makes the checked clause a self-subsuming resolution partner: the
//! negated literal can be removed.
use partial_ref::{partial, PartialRef};

use kestrel_formula::Lit;
use kestrel_internal_proof::{DeleteClauseProof, ProofStep};

use crate::clause::{db, ClauseRef};
use crate::context::{parts::*, Context};
use crate::prop::watch::WatchEntry;
use crate::prop::Reason;

/// Result of checking one potential subsuming clause.
enum SubsumeCheck {
    Neither,
    Subsumed,
    /// The checked clause can strengthen the candidate by removing this
    /// literal.
    Strengthen(Lit),
}

/// Forward subsumption over all scheduled candidates.
///
/// Requires dense mode and a fully propagated root level. Returns true when
/// any clause was subsumed or strengthened.
pub fn forward_subsume<'a>(
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
    debug_assert!(ctx.part(WatchlistsP).dense());

    let clause_limit = ctx.part(SolverConfigP).subsume_clause_limit;

    let mut candidates: Vec<(usize, ClauseRef)> = vec![];
    for &cref in ctx.part(ClauseDbP).clauses.iter() {
        let header = ctx.part(ClauseAllocP).header(cref);
        if header.garbage() || !header.subsume() {
            continue;
        }
        if header.len() <= clause_limit {
            candidates.push((header.len(), cref));
        }
    }

    // Smaller clauses first: they can only be subsumed by yet smaller ones,
    // which have been checked before.
    candidates.sort_unstable();

    let mut progress = false;

    for (_, cref) in candidates {
        if ctx.part(SolverStateP).terminated() {
            break;
        }
        if ctx.part(ClauseAllocP).header(cref).garbage() {
            continue;
        }
        ctx.part_mut(ClauseAllocP)
            .header_mut(cref)
            .set_subsume(false);
        progress |= try_forward_subsume(ctx.borrow(), cref);
    }

    progress
}

/// Check one candidate against the occurrences of its rarest literal.
fn try_forward_subsume<'a>(
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
    cref: ClauseRef,
) -> bool {
    let occ_limit = ctx.part(SolverConfigP).subsume_occ_limit;

    let (min_lit, candidate_len) = {
        let lits = ctx.part(ClauseAllocP).lits(cref);
        let mut min_lit = lits[0];
        let mut min_count = usize::max_value();
        for &lit in lits {
            let count = ctx.part(WatchlistsP).occurrence_count(lit);
            if count < min_count {
                min_count = count;
                min_lit = lit;
            }
        }
        if min_count > occ_limit {
            return false;
        }
        (min_lit, lits.len())
    };

    mark_lits(ctx.borrow(), cref, true);

    let mut result = SubsumeCheck::Neither;

    let entries: Vec<WatchEntry> = ctx.part(WatchlistsP).entries(min_lit).collect();
    for entry in entries {
        let check = match entry {
            WatchEntry::Binary { other, .. } => check_binary(ctx.borrow(), min_lit, other),
            WatchEntry::Large { cref: other, .. } => {
                if other == cref {
                    continue;
                }
                let header = ctx.part(ClauseAllocP).header(other);
                if header.garbage() || header.len() > candidate_len {
                    continue;
                }
                check_long(ctx.borrow(), other)
            }
        };
        match check {
            SubsumeCheck::Neither => continue,
            _ => {
                result = check;
                break;
            }
        }
    }

    mark_lits(ctx.borrow(), cref, false);

    match result {
        SubsumeCheck::Neither => false,
        SubsumeCheck::Subsumed => {
            ctx.part_mut(SolverStateP).stats.subsumed += 1;
            let lits: Vec<Lit> = ctx.part(ClauseAllocP).lits(cref).to_vec();
            let redundant = ctx.part(ClauseAllocP).header(cref).redundant();
            ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
                clause: &lits,
                proof: if redundant {
                    DeleteClauseProof::Redundant
                } else {
                    DeleteClauseProof::Weakened
                },
            });
            db::disconnect_occurrences(ctx.borrow(), cref);
            db::delete_clause(ctx.borrow(), cref);
            true
        }
        SubsumeCheck::Strengthen(remove) => {
            ctx.part_mut(SolverStateP).stats.strengthened += 1;
            strengthen_dense_clause(ctx.borrow(), cref, remove);
            true
        }
    }
}

/// Check a binary clause against the current marks.
fn check_binary(
    mut ctx: partial!(Context, TmpDataP),
    lit: Lit,
    other: Lit,
) -> SubsumeCheck {
    let flags = &ctx.part(TmpDataP).lit_flags;
    debug_assert!(flags[lit.code()]);
    if flags[other.code()] {
        SubsumeCheck::Subsumed
    } else if flags[(!other).code()] {
        SubsumeCheck::Strengthen(!other)
    } else {
        SubsumeCheck::Neither
    }
}

/// Check a long clause against the current marks.
fn check_long(
    mut ctx: partial!(Context, ClauseAllocP, TmpDataP),
    cref: ClauseRef,
) -> SubsumeCheck {
    let flags = &ctx.part(TmpDataP).lit_flags;
    let mut strengthen = None;

    for &lit in ctx.part(ClauseAllocP).lits(cref) {
        if flags[lit.code()] {
            continue;
        }
        if flags[(!lit).code()] && strengthen.is_none() {
            strengthen = Some(!lit);
            continue;
        }
        return SubsumeCheck::Neither;
    }

    match strengthen {
        None => SubsumeCheck::Subsumed,
        Some(lit) => SubsumeCheck::Strengthen(lit),
    }
}

/// Mark or unmark the literals of a clause.
fn mark_lits(
    mut ctx: partial!(Context, mut TmpDataP, ClauseAllocP),
    cref: ClauseRef,
    value: bool,
) {
    let (tmp, ctx) = ctx.split_part_mut(TmpDataP);
    for &lit in ctx.part(ClauseAllocP).lits(cref) {
        tmp.lit_flags[lit.code()] = value;
    }
}

/// Remove one literal from a clause in dense mode.
///
/// Handles the shrink to binary and unit cases, tracing all changes.
pub fn strengthen_dense_clause<'a>(
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
    cref: ClauseRef,
    remove: Lit,
) {
    debug_assert!(ctx.part(WatchlistsP).dense());

    let old_lits: Vec<Lit> = ctx.part(ClauseAllocP).lits(cref).to_vec();
    let new_lits: Vec<Lit> = old_lits
        .iter()
        .cloned()
        .filter(|&lit| lit != remove)
        .collect();
    debug_assert_eq!(new_lits.len() + 1, old_lits.len());

    let redundant = ctx.part(ClauseAllocP).header(cref).redundant();

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

    if new_lits.len() == 2 {
        db::disconnect_occurrences(ctx.borrow(), cref);
        db::delete_clause(ctx.borrow(), cref);
        ctx.part_mut(WatchlistsP)
            .watch_binary_clause([new_lits[0], new_lits[1]], redundant, false);
    } else {
        ctx.part_mut(WatchlistsP)
            .disconnect_occurrence(remove, cref);
        let old_len = old_lits.len();
        {
            let lits = ctx.part_mut(ClauseAllocP).clause_mut(cref).lits_mut();
            let pos = lits.iter().position(|&lit| lit == remove).unwrap();
            let last = lits.len() - 1;
            lits.swap(pos, last);
        }
        ctx.part_mut(ClauseAllocP)
            .shrink_clause(cref, old_len - 1);
        ctx.part_mut(ClauseDbP).garbage_size += 1;
        // The shortened clause is a new subsumption candidate.
        ctx.part_mut(ClauseAllocP).header_mut(cref).set_subsume(true);
    }
}

/// Remove stored clauses subsumed by a freshly added clause.
///
/// Used right after variable elimination adds a resolvent. Only full
/// subsumption is performed here; self-subsuming strengthening is left to
/// the next forward pass, following the source behavior.
pub fn backward_subsume<'a>(
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
    lits: &[Lit],
) -> bool {
    debug_assert!(ctx.part(WatchlistsP).dense());

    let occ_limit = ctx.part(SolverConfigP).subsume_occ_limit;

    let mut min_lit = lits[0];
    let mut min_count = usize::max_value();
    for &lit in lits {
        let count = ctx.part(WatchlistsP).occurrence_count(lit);
        if count < min_count {
            min_count = count;
            min_lit = lit;
        }
    }
    if min_count > occ_limit {
        return false;
    }

    {
        let tmp = ctx.part_mut(TmpDataP);
        for &lit in lits {
            tmp.lit_flags[lit.code()] = true;
        }
    }

    let mut subsumed: Vec<ClauseRef> = vec![];

    let entries: Vec<WatchEntry> = ctx.part(WatchlistsP).entries(min_lit).collect();
    for entry in entries {
        if let WatchEntry::Large { cref, .. } = entry {
            let header = ctx.part(ClauseAllocP).header(cref);
            if header.garbage() || header.len() <= lits.len() {
                continue;
            }
            let flags = &ctx.part(TmpDataP).lit_flags;
            let mut contained = 0;
            for &lit in ctx.part(ClauseAllocP).lits(cref) {
                if flags[lit.code()] {
                    contained += 1;
                }
            }
            if contained == lits.len() {
                subsumed.push(cref);
            }
        }
    }

    {
        let tmp = ctx.part_mut(TmpDataP);
        for &lit in lits {
            tmp.lit_flags[lit.code()] = false;
        }
    }

    let progress = !subsumed.is_empty();

    for cref in subsumed {
        ctx.part_mut(SolverStateP).stats.subsumed += 1;
        let clause_lits: Vec<Lit> = ctx.part(ClauseAllocP).lits(cref).to_vec();
        let redundant = ctx.part(ClauseAllocP).header(cref).redundant();
        ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
            clause: &clause_lits,
            proof: if redundant {
                DeleteClauseProof::Redundant
            } else {
                DeleteClauseProof::Weakened
            },
        });
        db::disconnect_occurrences(ctx.borrow(), cref);
        db::delete_clause(ctx.borrow(), cref);
    }

    progress
}
