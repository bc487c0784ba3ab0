//! Propagation of enqueued assignments.
//!
//! Three flavors share one per-literal routine: the search propagator, the
//! probing propagator (which can be told to ignore one clause, so a
//! vivification candidate cannot propagate through itself) and the hyper
//! propagator used while probing, which derives hyper binary resolvents on
//! the fly.
//!
//! For a long clause the `searched` header position records how far past the
//! watched literals earlier propagations have scanned for a replacement
//! watch. The scan resumes there and wraps around, so repeatedly touched
//! clauses do not rescan their known-false prefix.
use partial_ref::{partial, PartialRef};

use kestrel_formula::Lit;

use crate::clause::ClauseRef;
use crate::context::{parts::*, Context};

use super::assignment::enqueue_assignment;
use super::graph::{Conflict, Reason};
use super::watch;

/// Propagate all enqueued assignments of the search.
///
/// On conflict returns the clause propagating the conflicting assignment.
pub fn propagate(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut PhasesP,
        mut SolverStateP,
        mut TrailP,
        mut VariablesP,
        mut WatchlistsP,
    ),
) -> Result<(), Conflict> {
    while let Some(lit) = ctx.part_mut(TrailP).pop_queue() {
        ctx.part_mut(SolverStateP).stats.propagations += 1;
        propagate_literal(ctx.borrow(), lit, false, None)?;
    }
    Ok(())
}

/// Propagate all enqueued assignments while probing.
///
/// `ignore` suppresses propagations through one clause. With `hyper` enabled,
/// a long clause that becomes propagating is replaced on the fly by a hyper
/// binary resolvent whenever all its false literals have a common dominator
/// in the binary implication graph. The new binaries are queued in the solver
/// state; the caller is responsible for tracing them.
pub fn propagate_probing(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut PhasesP,
        mut SolverStateP,
        mut TrailP,
        mut VariablesP,
        mut WatchlistsP,
    ),
    hyper: bool,
    ignore: Option<ClauseRef>,
) -> Result<(), Conflict> {
    debug_assert!(ctx.part(SolverStateP).probing);
    while let Some(lit) = ctx.part_mut(TrailP).pop_queue() {
        ctx.part_mut(SolverStateP).stats.propagations += 1;
        propagate_literal(ctx.borrow(), lit, hyper, ignore)?;
    }
    Ok(())
}

/// Process the watchlist of a single falsified literal.
fn propagate_literal(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut PhasesP,
        mut SolverStateP,
        mut TrailP,
        mut VariablesP,
        mut WatchlistsP,
    ),
    lit: Lit,
    hyper: bool,
    ignore: Option<ClauseRef>,
) -> Result<(), Conflict> {
    let not_lit = !lit;

    let (watchlists, mut ctx) = ctx.split_part_mut(WatchlistsP);
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);

    let mut words = watchlists.take_words(not_lit);

    let mut read = 0;
    let mut write = 0;
    let mut result = Ok(());

    'entries: while read < words.len() {
        let word = words[read];

        if watch::is_binary_word(word) {
            let other = watch::binary_word_other(word);
            words[write] = word;
            write += 1;
            read += 1;

            let value = ctx.part(AssignmentP).value(other);
            if value < 0 {
                result = Err(Conflict::Binary([not_lit, other]));
                break 'entries;
            } else if value == 0 {
                enqueue_assignment(ctx.borrow(), other, Reason::Binary([not_lit]));
            }
            continue;
        }

        let blocking = watch::blocking_word_lit(word);
        let cref = ClauseRef::from_offset(words[read + 1]);

        // If the blocking literal (which is part of the watched clause) is
        // already true, the watched clause is satisfied and we don't even
        // have to look at it.
        if ctx.part(AssignmentP).lit_is_true(blocking) {
            words[write] = word;
            words[write + 1] = words[read + 1];
            write += 2;
            read += 2;
            continue;
        }

        if Some(cref) == ignore {
            words[write] = word;
            words[write + 1] = words[read + 1];
            write += 2;
            read += 2;
            continue;
        }

        {
            let state = ctx.part_mut(SolverStateP);
            if state.probing {
                state.stats.probe_ticks += 1;
            } else {
                state.stats.ticks += 1;
            }
        }

        if alloc.header(cref).garbage() {
            read += 2;
            continue;
        }

        let len = alloc.header(cref).len();
        let searched = alloc.header(cref).searched();

        let first;
        let mut replacement = None;

        {
            let lits = alloc.clause_mut(cref).lits_mut();
            if lits[0] == not_lit {
                lits.swap(0, 1);
            }
            first = lits[0];

            if first != blocking && ctx.part(AssignmentP).lit_is_true(first) {
                // Keep the watch with the satisfied literal as new blocking
                // literal.
                words[write] = watch::blocking_word(first);
                words[write + 1] = words[read + 1];
                write += 2;
                read += 2;
                continue;
            }

            for pos in (searched..len).chain(2..searched) {
                let candidate = lits[pos];
                if ctx.part(AssignmentP).value(candidate) >= 0 {
                    lits[pos] = not_lit;
                    lits[1] = candidate;
                    replacement = Some((pos, candidate));
                    break;
                }
            }
        }

        if let Some((pos, candidate)) = replacement {
            alloc.header_mut(cref).set_searched(pos);
            watchlists.add_large_watch(candidate, first, cref);
            read += 2;
            continue;
        }

        // We didn't find a non-false unwatched literal, so either we're
        // propagating or we have a conflict.
        words[write] = watch::blocking_word(first);
        words[write + 1] = words[read + 1];
        write += 2;
        read += 2;

        if ctx.part(AssignmentP).lit_is_false(first) {
            result = Err(Conflict::Long(cref));
            break 'entries;
        }

        let mut reason = Reason::Long(cref);

        if hyper {
            if let Some(dominator) = find_dominator(ctx.borrow(), alloc.clause(cref).lits()) {
                let not_dom = !dominator;
                watchlists.watch_binary_clause([first, not_dom], true, true);
                ctx.part_mut(SolverStateP)
                    .pending_hyper
                    .push([first, not_dom]);
                ctx.part_mut(SolverStateP).stats.hyper_binaries += 1;
                reason = Reason::Binary([not_dom]);
            }
        }

        enqueue_assignment(ctx.borrow(), first, reason);
    }

    // Move any unprocessed entries when a conflict aborted the scan.
    while read < words.len() {
        words[write] = words[read];
        write += 1;
        read += 1;
    }
    words.truncate(write);
    watchlists.put_words(not_lit, words);

    result
}

/// Find the unique dominator of the false literals of a propagating clause.
///
/// All false literals have to be implied through binary clauses for a
/// dominator to exist. The walk follows the binary reasons upwards, always
/// advancing the assignment deeper in the trail, until all chains meet.
fn find_dominator(
    ctx: partial!(Context, ImplGraphP),
    lits: &[Lit],
) -> Option<Lit> {
    let graph = ctx.part(ImplGraphP);

    let mut dominator: Option<Lit> = None;

    for &lit in &lits[1..] {
        if graph.level(lit.var()) == 0 {
            continue;
        }
        let assigned = !lit;
        dominator = Some(match dominator {
            None => assigned,
            Some(current) => pairwise_dominator(graph, current, assigned)?,
        });
    }

    dominator
}

/// Meet two assignments in the binary implication graph.
fn pairwise_dominator(
    graph: &crate::prop::ImplGraph,
    mut a: Lit,
    mut b: Lit,
) -> Option<Lit> {
    loop {
        if a == b {
            return Some(a);
        }
        if graph.depth(a.var()) < graph.depth(b.var()) {
            std::mem::swap(&mut a, &mut b);
        }
        match graph.reason(a.var()) {
            Reason::Binary([other]) => a = !*other,
            _ => return None,
        }
    }
}
