//! Transitive reduction of the binary implication graph.
//!
//! A binary clause `(a b)` encodes the implications `¬a → b` and `¬b → a`.
//! When `b` is already reachable from `¬a` through other binary clauses, the
//! clause is redundant and can be removed. The reachability check assumes
//! `¬a` and propagates through binary clauses only, ignoring the direct
//! edge. A conflict during that propagation means `¬a` fails, recovering `a`
//! as a unit.
//!
//! A literal cursor wraps around the literal range so successive rounds
//! spread their budget over different parts of the graph.
use partial_ref::{partial, PartialRef};

use kestrel_formula::Lit;
use kestrel_internal_proof::{DeleteClauseProof, ProofStep};

use crate::context::{parts::*, Context};
use crate::prop::watch::WatchEntry;
use crate::prop::{backtrack, enqueue_assignment, propagate_probing, Reason};
use crate::state::SatState;

/// Remove transitive binary clauses, budgeted by probe ticks.
pub fn transitive_reduce<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
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

    let budget = ctx.part(SolverStateP).stats.probe_ticks
        + ctx.part(SolverConfigP).probe_effort / 4;

    let lit_count = ctx.part(AssignmentP).var_count() * 2;
    if lit_count == 0 {
        return false;
    }

    let mut progress = false;

    for _ in 0..lit_count {
        if ctx.part(SolverStateP).terminated()
            || ctx.part(SolverStateP).stats.probe_ticks > budget
            || ctx.part(SolverStateP).inconsistent
        {
            break;
        }

        let src = {
            let cursor = &mut ctx.part_mut(ScheduleP).transitive_cursor;
            if *cursor >= lit_count {
                *cursor = 0;
            }
            let src = Lit::from_code(*cursor);
            *cursor += 1;
            src
        };

        {
            let flags = ctx.part(VariablesP).flags(src.var());
            if !flags.active || !flags.transitive {
                continue;
            }
        }
        if !ctx.part(AssignmentP).lit_is_unk(src) {
            continue;
        }
        if src.is_negative() {
            // The negative literal is the second polarity of the variable,
            // so the variable is done until it is rescheduled.
            ctx.part_mut(VariablesP).flags_mut(src.var()).transitive = false;
        }

        // Snapshot the binary successors; removals mutate the lists.
        let successors: Vec<(Lit, bool)> = ctx
            .part(WatchlistsP)
            .entries(src)
            .filter_map(|entry| match entry {
                WatchEntry::Binary {
                    other, redundant, ..
                } if src.code() < other.code() => Some((other, redundant)),
                _ => None,
            })
            .collect();

        for (dst, redundant) in successors {
            if ctx.part(SolverStateP).stats.probe_ticks > budget {
                break;
            }
            if !ctx.part(AssignmentP).lit_is_unk(src) {
                break;
            }
            if !ctx.part(AssignmentP).lit_is_unk(dst) {
                continue;
            }

            match probe_edge(ctx.borrow(), src, dst) {
                EdgeResult::Kept => (),
                EdgeResult::Transitive => {
                    ctx.part_mut(SolverStateP).stats.transitive_reduced += 1;
                    progress = true;
                    ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
                        clause: &[src, dst],
                        proof: if redundant {
                            DeleteClauseProof::Redundant
                        } else {
                            DeleteClauseProof::Weakened
                        },
                    });
                    ctx.part_mut(WatchlistsP).remove_binary_clause([src, dst]);
                }
                EdgeResult::Failed => {
                    progress = true;
                    ctx.part_mut(SolverStateP).stats.failed_lits += 1;
                    ctx.part_mut(ProofP).add_step(&ProofStep::AtClause {
                        redundant: false,
                        clause: &[src],
                    });
                    enqueue_assignment(ctx.borrow(), src, Reason::Unit);
                    if propagate_probing(ctx.borrow(), false, None).is_err() {
                        ctx.part_mut(SolverStateP).inconsistent = true;
                        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
                        ctx.part_mut(ProofP).add_step(&ProofStep::AtClause {
                            redundant: false,
                            clause: &[],
                        });
                    }
                    break;
                }
            }
        }
    }

    progress
}

enum EdgeResult {
    Kept,
    Transitive,
    Failed,
}

/// Assume the negation of `src` and propagate binary clauses only, skipping
/// the direct edge to `dst`.
fn probe_edge(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut PhasesP,
        mut ScheduleP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VariablesP,
        mut VmtfP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    src: Lit,
    dst: Lit,
) -> EdgeResult {
    let not_src = !src;

    ctx.part_mut(TrailP).new_decision_level(not_src);
    enqueue_assignment(ctx.borrow(), not_src, Reason::Decision);

    let mut result = EdgeResult::Kept;

    'propagate: while let Some(lit) = ctx.part_mut(TrailP).pop_queue() {
        ctx.part_mut(SolverStateP).stats.probe_ticks += 1;

        let entries: Vec<Lit> = ctx
            .part(WatchlistsP)
            .entries(!lit)
            .filter_map(|entry| match entry {
                WatchEntry::Binary { other, .. } => Some(other),
                _ => None,
            })
            .collect();

        for implied in entries {
            if lit == not_src && implied == dst {
                // Skip the direct edge under test.
                continue;
            }
            if ctx.part(AssignmentP).lit_is_true(implied) {
                continue;
            }
            if ctx.part(AssignmentP).lit_is_false(implied) {
                result = EdgeResult::Failed;
                break 'propagate;
            }
            enqueue_assignment(ctx.borrow(), implied, Reason::Binary([!lit]));
            if implied == dst {
                result = EdgeResult::Transitive;
                break 'propagate;
            }
        }
    }

    backtrack(ctx.borrow(), 0);

    result
}
