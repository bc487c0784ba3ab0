//! Garbage collection of long clauses.
use partial_ref::{partial, PartialRef};

use crate::context::{parts::*, Context};
use crate::prop::Reason;

use super::db::rewatch_all;
use super::ClauseAlloc;

/// Perform a garbage collection of long clauses if necessary.
pub fn collect_garbage(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut SolverStateP,
        mut WatchlistsP,
        TrailP,
    ),
) {
    let alloc = ctx.part(ClauseAllocP);
    let db = ctx.part(ClauseDbP);

    // Collecting when a fixed fraction of the allocation is garbage amortizes
    // collection costs.
    if db.garbage_size * 2 > alloc.buffer_size() {
        collect_garbage_now(ctx.borrow());
    }
}

/// Unconditionally perform a garbage collection of long clauses.
///
/// All live clauses are copied to a fresh allocator. Reasons stored in the
/// implication graph are rewritten using a mark in the clause headers, the
/// watchlists are rebuilt from scratch.
pub fn collect_garbage_now(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut SolverStateP,
        mut WatchlistsP,
        TrailP,
    ),
) {
    debug_assert!(!ctx.part(WatchlistsP).dense());

    ctx.part_mut(SolverStateP).stats.collections += 1;

    mark_asserting_clauses(ctx.borrow());

    {
        let mut inner: partial!(Context, mut ClauseAllocP, mut ClauseDbP, mut ImplGraphP) =
            ctx.borrow();
        let (db, mut inner) = inner.split_part_mut(ClauseDbP);
        let (impl_graph, mut inner) = inner.split_part_mut(ImplGraphP);
        let alloc = inner.part_mut(ClauseAllocP);

        assert!(
            db.garbage_size <= alloc.buffer_size(),
            "Inconsistent garbage tracking in ClauseDb"
        );
        let current_size = alloc.buffer_size() - db.garbage_size;

        // Allocating just the current size would lead to an immediate growing
        // when new clauses are learned, overallocating here avoids that.
        let mut new_alloc = ClauseAlloc::with_capacity(current_size * 2);

        let mut new_clauses = vec![];

        db.clauses.retain(|&cref| {
            let clause = alloc.clause(cref);
            let mut header = *clause.header();
            if header.garbage() {
                false
            } else {
                let clause_is_asserting = header.reason();
                header.set_reason(false);

                let new_cref = new_alloc.add_clause(header, clause.lits());

                new_clauses.push(new_cref);

                if clause_is_asserting {
                    let asserted_lit = clause.lits()[0];

                    debug_assert_eq!(
                        impl_graph.reason(asserted_lit.var()),
                        &Reason::Long(cref)
                    );
                    impl_graph.update_reason(asserted_lit.var(), Reason::Long(new_cref));
                }
                true
            }
        });

        *inner.part_mut(ClauseAllocP) = new_alloc;
        db.clauses = new_clauses;
        db.garbage_size = 0;
    }

    rewatch_all(ctx.borrow());
}

/// Mark asserting clauses to track them through the collection.
fn mark_asserting_clauses(
    mut ctx: partial!(Context, mut ClauseAllocP, ImplGraphP, TrailP),
) {
    let (trail, mut ctx) = ctx.split_part(TrailP);
    let (alloc, ctx) = ctx.split_part_mut(ClauseAllocP);
    let impl_graph = ctx.part(ImplGraphP);

    for &lit in trail.trail().iter() {
        if let &Reason::Long(cref) = impl_graph.reason(lit.var()) {
            alloc.header_mut(cref).set_reason(true);
        }
    }
}
