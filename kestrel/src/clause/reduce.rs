//! Clause database reduction.
use partial_ref::{partial, PartialRef};

use kestrel_formula::Lit;
use kestrel_internal_proof::{DeleteClauseProof, ProofStep};

use crate::context::{parts::*, Context};
use crate::prop::Reason;

use super::db::delete_watched_clause;
use super::gc::collect_garbage;
use super::ClauseRef;

/// Delete the least useful reducible clauses.
///
/// Only redundant clauses that are neither kept by their tier nor used since
/// the last reduction are candidates. The candidates are ranked by glue and
/// size; the worst fraction is deleted. Hyper ternary resolvents that were
/// not used since the last reduction are deleted unconditionally.
pub fn reduce<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ProofP<'a>,
        mut SolverStateP,
        mut WatchlistsP,
        SolverConfigP,
        TrailP,
    ),
) {
    ctx.part_mut(SolverStateP).stats.reductions += 1;

    protect_reasons(ctx.borrow(), true);

    let mut candidates: Vec<(usize, usize, ClauseRef)> = vec![];
    let mut hyper_garbage: Vec<ClauseRef> = vec![];

    {
        let mut inner: partial!(Context<'a>, mut ClauseAllocP, mut ClauseDbP) = ctx.borrow();
        let (db, mut inner) = inner.split_part_mut(ClauseDbP);
        let alloc = inner.part_mut(ClauseAllocP);

        for &cref in db.clauses.iter() {
            let header = alloc.header_mut(cref);
            if header.garbage() || !header.redundant() || header.reason() {
                continue;
            }
            if header.hyper() {
                // Hyper ternary resolvents only stay while they are used.
                if header.used() == 0 {
                    hyper_garbage.push(cref);
                } else {
                    header.set_used(header.used() - 1);
                }
                continue;
            }
            if header.keep() {
                continue;
            }
            if header.used() > 0 {
                header.set_used(header.used() - 1);
                continue;
            }
            candidates.push((header.glue(), header.len(), cref));
        }
    }

    for cref in hyper_garbage {
        delete_traced(ctx.borrow(), cref);
    }

    candidates.sort_unstable();

    let fraction = ctx.part(SolverConfigP).reduce_fraction as usize;
    let target = candidates.len() * fraction / 100;
    let start = candidates.len() - target;

    for &(_, _, cref) in &candidates[start..] {
        delete_traced(ctx.borrow(), cref);
    }

    protect_reasons(ctx.borrow(), false);

    collect_garbage(ctx.borrow());
}

/// Delete a watched redundant clause and trace the deletion.
fn delete_traced<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ProofP<'a>,
        mut WatchlistsP,
    ),
    cref: ClauseRef,
) {
    let lits: Vec<Lit> = ctx.part(ClauseAllocP).lits(cref).to_vec();
    ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
        clause: &lits,
        proof: DeleteClauseProof::Redundant,
    });
    delete_watched_clause(ctx.borrow(), cref);
}

/// Set or clear the reason flag of all currently asserting clauses.
///
/// Clauses that are the reason of an assignment must survive the reduction.
fn protect_reasons(
    mut ctx: partial!(Context, mut ClauseAllocP, ImplGraphP, TrailP),
    protect: bool,
) {
    let (trail, mut ctx) = ctx.split_part(TrailP);
    let (alloc, ctx) = ctx.split_part_mut(ClauseAllocP);
    let impl_graph = ctx.part(ImplGraphP);

    for &lit in trail.trail().iter() {
        if let &Reason::Long(cref) = impl_graph.reason(lit.var()) {
            alloc.header_mut(cref).set_reason(protect);
        }
    }
}
