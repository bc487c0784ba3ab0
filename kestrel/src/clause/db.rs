//! Database for long clauses.
use partial_ref::{partial, PartialRef};

use kestrel_formula::Lit;

use crate::context::{parts::*, Context};

use super::{header::HEADER_LEN, ClauseHeader, ClauseRef};

/// Database for long clauses.
///
/// The arena only ever grows, so the database keeps the list of all allocated
/// clauses. Deleted clauses stay in the list with their `garbage` header bit
/// set until the next collection.
#[derive(Default)]
pub struct ClauseDb {
    /// May contain garbage clauses.
    pub clauses: Vec<ClauseRef>,
    /// Number of live irredundant long clauses.
    pub irredundant: usize,
    /// Number of live redundant long clauses.
    pub redundant: usize,
    /// Size of deleted but not collected clauses.
    pub garbage_size: usize,
}

/// Add a long clause to the database.
///
/// The clause is not watched yet.
pub fn add_clause(
    mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP),
    header: ClauseHeader,
    lits: &[Lit],
) -> ClauseRef {
    let redundant = header.redundant();

    let cref = ctx.part_mut(ClauseAllocP).add_clause(header, lits);

    let db = ctx.part_mut(ClauseDbP);

    db.clauses.push(cref);
    if redundant {
        db.redundant += 1;
    } else {
        db.irredundant += 1;
    }

    cref
}

/// Add a long clause to the database and watch its first two literals.
pub fn add_watched_clause(
    mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP, mut WatchlistsP),
    header: ClauseHeader,
    lits: &[Lit],
) -> ClauseRef {
    let cref = add_clause(ctx.borrow(), header, lits);
    ctx.part_mut(WatchlistsP)
        .watch_clause(cref, [lits[0], lits[1]]);
    cref
}

/// Delete a long clause from the database.
///
/// This only marks the clause as garbage. The watches, if any, have to be
/// removed by the caller, as are the proof and checker notifications.
pub fn delete_clause(
    mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP),
    cref: ClauseRef,
) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let db = ctx.part_mut(ClauseDbP);

    let header = alloc.header_mut(cref);

    debug_assert!(!header.garbage(), "delete_clause for already deleted clause");

    header.set_garbage(true);

    if header.redundant() {
        db.redundant -= 1;
    } else {
        db.irredundant -= 1;
    }

    db.garbage_size += header.len() + HEADER_LEN;
}

/// Delete a long clause that is currently watched in sparse mode.
pub fn delete_watched_clause(
    mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP, mut WatchlistsP),
    cref: ClauseRef,
) {
    debug_assert!(!ctx.part(WatchlistsP).dense());
    let (lit_0, lit_1) = {
        let lits = ctx.part(ClauseAllocP).clause(cref).lits();
        (lits[0], lits[1])
    };
    let watchlists = ctx.part_mut(WatchlistsP);
    watchlists.unwatch_large(lit_0, cref);
    watchlists.unwatch_large(lit_1, cref);

    delete_clause(ctx.borrow(), cref)
}

/// Change a clause's tier after its glue improved.
///
/// Clauses with a glue within the tier1 limit are kept forever, clauses
/// within the tier2 limit survive the next two reductions.
pub fn promote_clause(
    mut ctx: partial!(Context, mut ClauseAllocP, mut SolverStateP, SolverConfigP),
    cref: ClauseRef,
    glue: usize,
) {
    let (config, mut ctx) = ctx.split_part(SolverConfigP);
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let header = alloc.header_mut(cref);

    debug_assert!(header.redundant());

    if glue >= header.glue() {
        return;
    }

    header.set_glue(glue);

    if glue <= config.tier1 {
        if !header.keep() {
            header.set_keep(true);
            ctx.part_mut(SolverStateP).stats.promoted += 1;
        }
    } else if glue <= config.tier2 && header.used() < 2 {
        header.set_used(2);
        ctx.part_mut(SolverStateP).stats.promoted += 1;
    }
}

/// Mark a clause as used to protect it from the next reduction.
pub fn mark_clause_used(
    mut ctx: partial!(Context, mut ClauseAllocP),
    cref: ClauseRef,
) {
    let header = ctx.part_mut(ClauseAllocP).header_mut(cref);
    let used = header.used();
    if used < super::header::MAX_USED {
        header.set_used(used + 1);
    }
}

/// Assess a newly learned clause and generate its header.
pub fn assess_learned_clause(
    mut ctx: partial!(Context, SolverConfigP),
    glue: usize,
) -> ClauseHeader {
    let config = ctx.part(SolverConfigP);

    let mut header = ClauseHeader::new();
    header.set_redundant(true);
    header.set_glue(glue);
    header.set_subsume(true);

    if glue <= config.tier1 {
        header.set_keep(true);
        header.set_used(1);
    } else if glue <= config.tier2 {
        header.set_used(2);
    } else {
        header.set_used(1);
    }

    header
}

/// Rebuild all large watches from the clause database.
///
/// Used when leaving dense mode and after garbage collection. Binary watches
/// are preserved, all large watch entries are dropped and recreated from the
/// first two literals of each live clause.
pub fn rewatch_all(
    mut ctx: partial!(Context, mut WatchlistsP, ClauseAllocP, ClauseDbP),
) {
    let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
    let (alloc, ctx) = ctx.split_part(ClauseAllocP);

    watchlists.retain_binary();
    watchlists.set_dense(false);

    for &cref in ctx.part(ClauseDbP).clauses.iter() {
        let clause = alloc.clause(cref);
        if clause.header().garbage() {
            continue;
        }
        let lits = clause.lits();
        watchlists.watch_clause(cref, [lits[0], lits[1]]);
    }
}

/// Connect every literal occurrence of all live clauses.
///
/// This is the dense mode used by the inprocessing passes. Binary watches are
/// preserved and double as binary occurrences.
pub fn connect_all_occurrences(
    mut ctx: partial!(Context, mut WatchlistsP, ClauseAllocP, ClauseDbP),
) {
    let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
    let (alloc, ctx) = ctx.split_part(ClauseAllocP);

    watchlists.retain_binary();
    watchlists.set_dense(true);

    for &cref in ctx.part(ClauseDbP).clauses.iter() {
        let clause = alloc.clause(cref);
        if clause.header().garbage() {
            continue;
        }
        for &lit in clause.lits() {
            watchlists.connect_occurrence(lit, cref);
        }
    }
}

/// Remove a clause from the occurrence lists of all its literals.
pub fn disconnect_occurrences(
    mut ctx: partial!(Context, mut WatchlistsP, ClauseAllocP),
    cref: ClauseRef,
) {
    debug_assert!(ctx.part(WatchlistsP).dense());
    let (alloc, mut ctx) = ctx.split_part(ClauseAllocP);
    let watchlists = ctx.part_mut(WatchlistsP);
    for &lit in alloc.clause(cref).lits() {
        watchlists.disconnect_occurrence(lit, cref);
    }
}
