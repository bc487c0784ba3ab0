//! Scheduling of search and inprocessing steps.
//!
//! Each iteration of the search either propagates, analyzes a conflict,
//! detects a satisfying assignment or runs the passes that became due:
//! reduce, mode switch, restart, rephase, eliminate, probe, then a decision.
use log::info;

use partial_ref::{partial, PartialRef};

use rand::{Rng, SeedableRng};

use crate::analyze::conflict_step;
use crate::averages::Averages;
use crate::clause::reduce::reduce;
use crate::context::{parts::*, Context};
use crate::decision::make_decision;
use crate::eliminate::eliminate;
use crate::probe::probing_pass;
use crate::prop::{backtrack, propagate};
use crate::simplify::{prove_units, simplify};
use crate::state::SatState;
use crate::walk::walk;

mod luby;

use luby::LubySequence;

/// Back off failed passes by at most this binary shift.
const MAX_DELAY: u32 = 10;

/// The two alternating search modes.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SearchMode {
    /// Aggressive EMA driven restarts with the move-to-front queue.
    Focused,
    /// Reluctant doubling restarts with the VSIDS heap.
    Stable,
}

impl Default for SearchMode {
    fn default() -> SearchMode {
        SearchMode::Focused
    }
}

/// Conflict thresholds at which the next pass of each kind runs.
#[derive(Default)]
pub struct Limits {
    pub restart: u64,
    pub reduce: u64,
    pub rephase: u64,
    pub mode: u64,
    pub probe: u64,
    pub eliminate: u64,
}

/// Geometric back off of the expensive passes.
#[derive(Default)]
pub struct Delays {
    pub probe: u32,
    pub eliminate: u32,
}

/// The rephase sources cycled through by [`rephase`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum RephaseKind {
    Best,
    Inverted,
    Original,
    Target,
    Random,
    Walk,
}

const REPHASE_CYCLE: [RephaseKind; 6] = [
    RephaseKind::Best,
    RephaseKind::Inverted,
    RephaseKind::Walk,
    RephaseKind::Best,
    RephaseKind::Original,
    RephaseKind::Random,
];

/// Scheduling state of search and inprocessing steps.
pub struct Schedule {
    pub mode: SearchMode,
    pub averages: Averages,
    pub limits: Limits,
    pub delays: Delays,
    luby: LubySequence,
    pub reductions: u64,
    pub mode_switches: u64,
    pub rephase_count: u64,
    /// Additional clauses allowed per elimination, doubled each completed
    /// round.
    pub eliminate_additional: usize,
    /// Literal cursor of transitive reduction, wrapping modulo the literal
    /// count.
    pub transitive_cursor: usize,
    pub rng: rand::rngs::SmallRng,
    initialized: bool,
}

impl Default for Schedule {
    fn default() -> Schedule {
        Schedule {
            mode: SearchMode::default(),
            averages: Averages::default(),
            limits: Limits::default(),
            delays: Delays::default(),
            luby: LubySequence::default(),
            reductions: 0,
            mode_switches: 0,
            rephase_count: 0,
            eliminate_additional: 0,
            transitive_cursor: 0,
            rng: rand::rngs::SmallRng::seed_from_u64(0),
            initialized: false,
        }
    }
}

/// Perform one step of the schedule.
///
/// Returns false when the search finished or was interrupted.
pub fn schedule_step<'a>(
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
    if ctx.part(SolverStateP).inconsistent {
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
    }

    if ctx.part(SolverStateP).sat_state != SatState::Unknown {
        return false;
    }

    if ctx.part(SolverStateP).terminated() {
        return false;
    }

    {
        let config = ctx.part(SolverConfigP);
        let stats = &ctx.part(SolverStateP).stats;
        if config.conflict_limit >= 0 && stats.conflicts >= config.conflict_limit as u64 {
            return false;
        }
        if config.decision_limit >= 0 && stats.decisions >= config.decision_limit as u64 {
            return false;
        }
    }

    if !ctx.part(ScheduleP).initialized {
        init_limits(ctx.borrow());
    }

    if let Err(conflict) = propagate(ctx.borrow()) {
        conflict_step(ctx.borrow(), conflict);

        let conflicts = ctx.part(SolverStateP).stats.conflicts;
        if conflicts % 5000 == 0 {
            progress_report(ctx.borrow());
        }

        return true;
    }

    if ctx.part(TrailP).current_level() == 0 && prove_units(ctx.borrow()) {
        simplify(ctx.borrow());
        if ctx.part(SolverStateP).inconsistent {
            return true;
        }
    }

    let conflicts = ctx.part(SolverStateP).stats.conflicts;

    if conflicts >= ctx.part(ScheduleP).limits.reduce {
        reduce(ctx.borrow());
        let interval = ctx.part(SolverConfigP).reduce_interval;
        let schedule = ctx.part_mut(ScheduleP);
        schedule.reductions += 1;
        schedule.limits.reduce =
            conflicts + (interval as f64 * ((schedule.reductions + 1) as f64).sqrt()) as u64;
    }

    if conflicts >= ctx.part(ScheduleP).limits.mode {
        switch_mode(ctx.borrow());
    }

    if should_restart(ctx.borrow()) {
        restart(ctx.borrow());
    }

    if conflicts >= ctx.part(ScheduleP).limits.rephase {
        rephase(ctx.borrow());
    }

    if ctx.part(SolverConfigP).eliminate && conflicts >= ctx.part(ScheduleP).limits.eliminate {
        backtrack(ctx.borrow(), 0);
        if prove_units(ctx.borrow()) {
            simplify(ctx.borrow());
        }
        let progress = !ctx.part(SolverStateP).inconsistent && eliminate(ctx.borrow());
        let delays = &mut ctx.part_mut(ScheduleP).delays;
        delays.eliminate = if progress {
            0
        } else {
            std::cmp::min(delays.eliminate + 1, MAX_DELAY)
        };
        let shift = ctx.part(ScheduleP).delays.eliminate;
        let interval = ctx.part(SolverConfigP).eliminate_interval;
        ctx.part_mut(ScheduleP).limits.eliminate = conflicts + (interval << shift);
        if ctx.part(SolverStateP).inconsistent {
            return true;
        }
    }

    if ctx.part(SolverConfigP).probe && conflicts >= ctx.part(ScheduleP).limits.probe {
        backtrack(ctx.borrow(), 0);
        if prove_units(ctx.borrow()) {
            simplify(ctx.borrow());
        }
        let progress = !ctx.part(SolverStateP).inconsistent && probing_pass(ctx.borrow());
        let delays = &mut ctx.part_mut(ScheduleP).delays;
        delays.probe = if progress {
            0
        } else {
            std::cmp::min(delays.probe + 1, MAX_DELAY)
        };
        let shift = ctx.part(ScheduleP).delays.probe;
        let interval = ctx.part(SolverConfigP).probe_interval;
        ctx.part_mut(ScheduleP).limits.probe = conflicts + (interval << shift);
        if ctx.part(SolverStateP).inconsistent {
            return true;
        }
    }

    if !ctx.part(TrailP).fully_propagated() {
        // A pass produced new assignments, propagate them first.
        return true;
    }

    if !make_decision(ctx.borrow()) {
        ctx.part_mut(SolverStateP).sat_state = SatState::Sat;
        return false;
    }

    true
}

/// Set the initial pass thresholds.
fn init_limits(mut ctx: partial!(Context, mut ScheduleP, SolverConfigP)) {
    let (config, mut ctx) = ctx.split_part(SolverConfigP);
    let schedule = ctx.part_mut(ScheduleP);

    schedule.limits.restart = config.restart_interval;
    schedule.limits.reduce = config.reduce_interval;
    schedule.limits.rephase = config.rephase_interval;
    schedule.limits.mode = config.mode_interval;
    schedule.limits.probe = config.probe_interval;
    schedule.limits.eliminate = config.eliminate_interval;
    schedule.eliminate_additional = 0;
    schedule.rng = rand::rngs::SmallRng::seed_from_u64(config.seed);
    schedule.initialized = true;
}

/// Log a one line progress report.
fn progress_report(
    mut ctx: partial!(
        Context,
        ClauseDbP,
        ScheduleP,
        SolverStateP,
        TrailP,
        VariablesP,
        WatchlistsP,
    ),
) {
    let stats = &ctx.part(SolverStateP).stats;
    let db = ctx.part(ClauseDbP);
    let watchlists = ctx.part(WatchlistsP);
    info!(
        "confl: {}k rest: {} vars: {} bin: {} irred: {} red: {} glue: {:.1}",
        stats.conflicts / 1000,
        stats.restarts,
        ctx.part(VariablesP).active_count(),
        watchlists.irredundant_binary + watchlists.redundant_binary,
        db.irredundant,
        db.redundant,
        ctx.part(ScheduleP).averages.slow_glue.get(),
    );
}

/// Whether a restart is due.
fn should_restart(
    mut ctx: partial!(Context, ScheduleP, SolverConfigP, SolverStateP, TrailP),
) -> bool {
    if ctx.part(TrailP).current_level() == 0 {
        return false;
    }

    let schedule = ctx.part(ScheduleP);
    let conflicts = ctx.part(SolverStateP).stats.conflicts;

    if conflicts < schedule.limits.restart {
        return false;
    }

    match schedule.mode {
        SearchMode::Stable => true,
        SearchMode::Focused => {
            let margin = ctx.part(SolverConfigP).restart_margin_factor();
            schedule.averages.fast_glue.get() > margin * schedule.averages.slow_glue.get()
        }
    }
}

/// Restart, keeping the trail prefix whose decisions outrank the next
/// decision candidate.
fn restart(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut PhasesP,
        mut ScheduleP,
        mut SolverStateP,
        mut TrailP,
        mut VmtfP,
        mut VsidsP,
        SolverConfigP,
    ),
) {
    let keep_levels = reuse_trail(ctx.borrow());

    backtrack(ctx.borrow(), keep_levels);

    let stats = &mut ctx.part_mut(SolverStateP).stats;
    stats.restarts += 1;
    if keep_levels > 0 {
        stats.reused_trails += 1;
    }
    let conflicts = stats.conflicts;

    let next = match ctx.part(ScheduleP).mode {
        SearchMode::Focused => conflicts + ctx.part(SolverConfigP).restart_interval,
        SearchMode::Stable => {
            let scale = ctx.part(SolverConfigP).stable_restart_scale;
            conflicts + scale * ctx.part_mut(ScheduleP).luby.advance()
        }
    };
    ctx.part_mut(ScheduleP).limits.restart = next;
}

/// Number of decision levels whose decisions outrank the next decision
/// candidate.
///
/// Those levels would be recreated identically right after the restart, so
/// they are kept.
fn reuse_trail(
    mut ctx: partial!(Context, ScheduleP, TrailP, VmtfP, VsidsP),
) -> usize {
    let trail = ctx.part(TrailP);

    let mut keep = 0;

    match ctx.part(ScheduleP).mode {
        SearchMode::Focused => {
            let limit = ctx.part(VmtfP).search_stamp();
            for level in 1..=trail.current_level() {
                let decision = trail.frame(level).decision.var();
                if ctx.part(VmtfP).stamp(decision) > limit {
                    keep = level;
                } else {
                    break;
                }
            }
        }
        SearchMode::Stable => {
            let limit = match ctx.part(VsidsP).peek() {
                Some(var) => ctx.part(VsidsP).activity(var),
                None => return trail.current_level(),
            };
            for level in 1..=trail.current_level() {
                let decision = trail.frame(level).decision.var();
                if ctx.part(VsidsP).activity(decision) > limit {
                    keep = level;
                } else {
                    break;
                }
            }
        }
    }

    keep
}

/// Alternate between the focused and stable search modes.
fn switch_mode(
    mut ctx: partial!(Context, mut ScheduleP, mut SolverStateP, SolverConfigP),
) {
    let config = ctx.part(SolverConfigP);
    let seed = config.seed;
    let mode_interval = config.mode_interval;
    let stable_scale = config.stable_restart_scale;
    let restart_interval = config.restart_interval;

    ctx.part_mut(SolverStateP).stats.mode_switches += 1;
    let conflicts = ctx.part(SolverStateP).stats.conflicts;

    let schedule = ctx.part_mut(ScheduleP);

    schedule.mode = match schedule.mode {
        SearchMode::Focused => SearchMode::Stable,
        SearchMode::Stable => SearchMode::Focused,
    };
    schedule.mode_switches += 1;
    schedule.averages.reinit();
    schedule.rng = rand::rngs::SmallRng::seed_from_u64(seed ^ schedule.mode_switches);

    schedule.limits.mode = conflicts + mode_interval * (schedule.mode_switches + 1);
    schedule.limits.restart = match schedule.mode {
        SearchMode::Stable => conflicts + stable_scale * schedule.luby.advance(),
        SearchMode::Focused => conflicts + restart_interval,
    };
}

/// Overwrite the saved phases from one of the rephase sources.
fn rephase<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut PhasesP,
        mut ScheduleP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VmtfP,
        mut VsidsP,
        mut WatchlistsP,
        mut ClauseAllocP,
        mut ClauseDbP,
        SolverConfigP,
        VariablesP,
    ),
) {
    backtrack(ctx.borrow(), 0);

    let walk_enabled = ctx.part(SolverConfigP).walk;

    let kind = {
        let schedule = ctx.part_mut(ScheduleP);
        let mut kind = REPHASE_CYCLE[(schedule.rephase_count % 6) as usize];
        schedule.rephase_count += 1;
        if kind == RephaseKind::Walk && !walk_enabled {
            kind = RephaseKind::Best;
        }
        kind
    };

    match kind {
        RephaseKind::Walk => walk(ctx.borrow()),
        RephaseKind::Best => ctx
            .part_mut(PhasesP)
            .overwrite_saved(|_, phases| phases.best),
        RephaseKind::Target => ctx
            .part_mut(PhasesP)
            .overwrite_saved(|_, phases| phases.target),
        RephaseKind::Inverted => ctx
            .part_mut(PhasesP)
            .overwrite_saved(|_, phases| -phases.saved),
        RephaseKind::Original => ctx.part_mut(PhasesP).overwrite_saved(|_, _| -1),
        RephaseKind::Random => {
            let mut inner: partial!(Context<'a>, mut PhasesP, mut ScheduleP) = ctx.borrow();
            let (schedule, mut inner) = inner.split_part_mut(ScheduleP);
            let rng = &mut schedule.rng;
            inner
                .part_mut(PhasesP)
                .overwrite_saved(|_, _| if rng.gen::<bool>() { 1 } else { -1 })
        }
    }

    // A new rephase cycle tracks its own trail high-water mark.
    ctx.part_mut(PhasesP).target_assigned = 0;

    let next = {
        let count = ctx.part(ScheduleP).rephase_count;
        let interval = ctx.part(SolverConfigP).rephase_interval;
        ctx.part(SolverStateP).stats.conflicts + interval * (count + 1)
    };
    ctx.part_mut(ScheduleP).limits.rephase = next;
    ctx.part_mut(SolverStateP).stats.rephased += 1;
}
