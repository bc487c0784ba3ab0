//! Failed literal probing.
//!
//! Probing assumes a literal at decision level 1 and propagates it with the
//! hyper propagator. A conflict means the probe failed: its negation is a
//! unit. The hyper propagator additionally replaces long propagations by
//! hyper binary resolvents, densifying the binary implication graph as a
//! side effect.
use partial_ref::{partial, PartialRef};

use kestrel_formula::Lit;
use kestrel_internal_proof::ProofStep;

use crate::context::{parts::*, Context};
use crate::prop::{backtrack, enqueue_assignment, propagate_probing, Reason};
use crate::state::SatState;
use crate::ternary::ternary;
use crate::transitive::transitive_reduce;
use crate::vivify::vivify;

/// Run all probing based passes.
///
/// Requires a fully propagated and flushed root level. Returns true when any
/// pass made progress.
pub fn probing_pass<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AnalyzeP,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
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

    ctx.part_mut(SolverStateP).probing = true;

    // Each round considers all active variables again; the schedule's
    // geometric delays control how often rounds happen.
    ctx.part_mut(VariablesP).reschedule_all(|flags| {
        flags.probe = true;
        flags.transitive = true;
    });

    let mut progress = false;

    if ctx.part(SolverConfigP).transitive && !ctx.part(SolverStateP).inconsistent {
        progress |= transitive_reduce(ctx.borrow());
    }

    if !ctx.part(SolverStateP).inconsistent {
        progress |= failed_literals(ctx.borrow());
    }

    if ctx.part(SolverConfigP).vivify && !ctx.part(SolverStateP).inconsistent {
        progress |= vivify(ctx.borrow());
    }

    if ctx.part(SolverConfigP).ternary && !ctx.part(SolverStateP).inconsistent {
        progress |= ternary(ctx.borrow());
    }

    ctx.part_mut(SolverStateP).probing = false;

    progress
}

/// Trace the hyper binary resolvents queued by the propagator.
pub fn flush_pending_hyper<'a>(
    mut ctx: partial!(Context<'a>, mut ProofP<'a>, mut SolverStateP),
) {
    let pending = std::mem::take(&mut ctx.part_mut(SolverStateP).pending_hyper);
    for lits in pending.iter() {
        ctx.part_mut(ProofP).add_step(&ProofStep::AtClause {
            redundant: true,
            clause: lits,
        });
    }
    let mut pending = pending;
    pending.clear();
    ctx.part_mut(SolverStateP).pending_hyper = pending;
}

/// Probe scheduled literals for failures.
fn failed_literals<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
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
    let budget = ctx.part(SolverStateP).stats.probe_ticks + ctx.part(SolverConfigP).probe_effort;

    let var_count = ctx.part(AssignmentP).var_count();

    let mut progress = false;

    'probes: for index in 0..var_count {
        let var = kestrel_formula::Var::from_index(index);
        {
            let flags = ctx.part(VariablesP).flags(var);
            if !flags.active || !flags.probe {
                continue;
            }
        }
        if ctx.part(SolverStateP).terminated()
            || ctx.part(SolverStateP).stats.probe_ticks > budget
        {
            break;
        }
        ctx.part_mut(VariablesP).flags_mut(var).probe = false;

        for &probe in &[var.positive(), var.negative()] {
            if !ctx.part(AssignmentP).lit_is_unk(probe) {
                continue;
            }
            // Only literals with binary occurrences can fail through the
            // binary implication graph.
            if !has_binary_occurrence(ctx.borrow(), !probe) {
                continue;
            }

            ctx.part_mut(SolverStateP).stats.probed_lits += 1;

            ctx.part_mut(TrailP).new_decision_level(probe);
            enqueue_assignment(ctx.borrow(), probe, Reason::Decision);

            let result = propagate_probing(ctx.borrow(), true, None);
            flush_pending_hyper(ctx.borrow());

            match result {
                Ok(()) => {
                    backtrack(ctx.borrow(), 0);
                }
                Err(_conflict) => {
                    backtrack(ctx.borrow(), 0);

                    ctx.part_mut(SolverStateP).stats.failed_lits += 1;
                    progress = true;

                    let unit = !probe;
                    ctx.part_mut(ProofP).add_step(&ProofStep::AtClause {
                        redundant: false,
                        clause: &[unit],
                    });
                    enqueue_assignment(ctx.borrow(), unit, Reason::Unit);

                    let result = propagate_probing(ctx.borrow(), false, None);
                    flush_pending_hyper(ctx.borrow());
                    if result.is_err() {
                        ctx.part_mut(SolverStateP).inconsistent = true;
                        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
                        ctx.part_mut(ProofP).add_step(&ProofStep::AtClause {
                            redundant: false,
                            clause: &[],
                        });
                        break 'probes;
                    }
                    continue 'probes;
                }
            }
        }
    }

    progress
}

/// Whether a literal occurs in any binary clause.
fn has_binary_occurrence(
    mut ctx: partial!(Context, WatchlistsP),
    lit: Lit,
) -> bool {
    ctx.part(WatchlistsP)
        .entries(lit)
        .any(|entry| matches!(entry, crate::prop::watch::WatchEntry::Binary { .. }))
}
