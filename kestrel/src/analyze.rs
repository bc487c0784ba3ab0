//! Conflict analysis, clause learning and backtracking.
use partial_ref::{partial, split_borrow, PartialRef};

use vec_mut_scan::VecMutScan;

use kestrel_formula::{Lit, Var};
use kestrel_internal_proof::{DeleteClauseProof, ProofStep};

use crate::clause::{db, ClauseRef};
use crate::context::{parts::*, Context};
use crate::glue::compute_glue;
use crate::prop::{backtrack, enqueue_assignment, Conflict, Reason};
use crate::schedule::SearchMode;
use crate::state::SatState;

/// Temporaries for conflict analysis
#[derive(Default)]
pub struct Analyze {
    /// This is the learned clause after analysis finishes.
    clause: Vec<Lit>,
    /// Number of literals in the current clause at the current level.
    current_level_count: usize,
    /// Variables in the current clause.
    var_flags: Vec<bool>,
    /// Entries to clean in `var_flags`.
    to_clean: Vec<Var>,
    /// Long clauses involved in the conflict.
    involved: Vec<ClauseRef>,
    /// Variables to bump after analysis.
    bump: Vec<Var>,
    /// Stack for recursive minimization.
    stack: Vec<Lit>,
}

impl Analyze {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.var_flags.resize(count, false);
    }
}

/// Handle a conflict: learn a new clause and backtrack.
pub fn conflict_step<'a>(
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
    conflict: Conflict,
) {
    ctx.part_mut(SolverStateP).stats.conflicts += 1;

    // Find the highest decision level of the conflict and whether only a
    // single literal was falsified there.
    let (conflict_level, forced) = {
        split_borrow!(lit_ctx = &(ClauseAllocP) ctx);
        let graph = ctx.part(ImplGraphP);

        let mut conflict_level = 0;
        let mut forced = None;
        for &lit in conflict.lits(&lit_ctx) {
            let level = graph.level(lit.var());
            if level > conflict_level {
                conflict_level = level;
                forced = Some(lit);
            } else if level == conflict_level {
                forced = None;
            }
        }
        (conflict_level, forced)
    };

    if conflict_level == 0 {
        // Conflict without decisions, the formula is unsatisfiable.
        ctx.part_mut(SolverStateP).inconsistent = true;
        ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
        ctx.part_mut(ProofP).add_step(&ProofStep::AtClause {
            redundant: false,
            clause: &[],
        });
        return;
    }

    if let Some(forced) = forced {
        // The conflict is a "driver": all but one of its literals are
        // falsified below the conflict level, so after backtracking one level
        // the clause itself propagates the remaining literal.
        backtrack(ctx.borrow(), conflict_level - 1);

        let reason = match conflict {
            Conflict::Binary(lits) => {
                let other = if lits[0] == forced { lits[1] } else { lits[0] };
                Reason::Binary([other])
            }
            Conflict::Long(cref) => {
                // Move the forced literal into the first watched position,
                // rewatching when it was not watched before.
                let (pos, old_watch, new_second) = {
                    let lits = ctx.part_mut(ClauseAllocP).clause_mut(cref).lits_mut();
                    let pos = lits.iter().position(|&lit| lit == forced).unwrap();
                    let old_watch = lits[0];
                    lits.swap(0, pos);
                    (pos, old_watch, lits[1])
                };
                if pos >= 2 {
                    ctx.part_mut(WatchlistsP).unwatch_large(old_watch, cref);
                    ctx.part_mut(WatchlistsP)
                        .add_large_watch(forced, new_second, cref);
                    ctx.part_mut(ClauseAllocP).header_mut(cref).set_searched(2);
                }
                db::mark_clause_used(ctx.borrow(), cref);
                Reason::Long(cref)
            }
        };

        enqueue_assignment(ctx.borrow(), forced, reason);
        return;
    }

    // Chronological backtracking: resolve the conflict at its own level.
    if conflict_level < ctx.part(TrailP).current_level() {
        backtrack(ctx.borrow(), conflict_level);
    }

    let trail_size = ctx.part(TrailP).trail().len();

    let strengthen = deduce_first_uip(ctx.borrow(), conflict);

    // Mark the involved long clauses used and promote improved glues before
    // backtracking invalidates the levels.
    let involved = std::mem::take(&mut ctx.part_mut(AnalyzeP).involved);
    let mut lits_buf = std::mem::take(&mut ctx.part_mut(TmpDataP).lits);
    for &cref in involved.iter() {
        db::mark_clause_used(ctx.borrow(), cref);
        if ctx.part(ClauseAllocP).header(cref).redundant() {
            lits_buf.clear();
            lits_buf.extend_from_slice(ctx.part(ClauseAllocP).lits(cref));
            let glue = compute_glue(ctx.borrow(), &lits_buf);
            db::promote_clause(ctx.borrow(), cref, glue);
        }
    }
    ctx.part_mut(TmpDataP).lits = lits_buf;
    ctx.part_mut(AnalyzeP).involved = involved;

    minimize_clause(ctx.borrow());

    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeP);

    for var in analyze.to_clean.drain(..) {
        analyze.var_flags[var.index()] = false;
    }

    // We find the highest level literal besides the asserted literal and move
    // it into position 1. This is important to ensure the watchlist
    // constraints are not violated on backtracking.
    let mut jump_level = 0;

    if analyze.clause.len() > 1 {
        let (prefix, rest) = analyze.clause.split_at_mut(2);
        let lit_1 = &mut prefix[1];
        jump_level = ctx.part(ImplGraphP).level(lit_1.var());
        for lit in rest.iter_mut() {
            let lit_level = ctx.part(ImplGraphP).level(lit.var());
            if lit_level > jump_level {
                jump_level = lit_level;
                std::mem::swap(lit_1, lit);
            }
        }
    }

    let glue = compute_glue(ctx.borrow(), &analyze.clause).saturating_sub(1);

    ctx.part_mut(ScheduleP)
        .averages
        .update(glue, conflict_level, trail_size);

    bump_variables(ctx.borrow(), &mut analyze.bump);

    // Prefer chronological backtracking over long backjumps.
    let config = ctx.part(SolverConfigP);
    let current_level = ctx.part(TrailP).current_level();
    let backtrack_level = if config.chrono
        && analyze.clause.len() > 1
        && jump_level + config.chrono_levels < current_level
    {
        current_level - 1
    } else {
        jump_level
    };

    backtrack(ctx.borrow(), backtrack_level);

    ctx.part_mut(ProofP).add_step(&ProofStep::AtClause {
        redundant: analyze.clause.len() > 2,
        clause: &analyze.clause,
    });

    ctx.part_mut(SolverStateP).stats.learned += 1;

    let reason = match analyze.clause.len() {
        0 => unreachable!("empty learned clause with nonzero conflict level"),
        1 => {
            ctx.part_mut(SolverStateP).stats.learned_units += 1;
            backtrack(ctx.borrow(), 0);
            Reason::Unit
        }
        2 => {
            ctx.part_mut(SolverStateP).stats.learned_binary += 1;
            ctx.part_mut(WatchlistsP).watch_binary_clause(
                [analyze.clause[0], analyze.clause[1]],
                true,
                false,
            );
            Reason::Binary([analyze.clause[1]])
        }
        _ => {
            let header = db::assess_learned_clause(ctx.borrow(), glue);
            let cref = db::add_watched_clause(ctx.borrow(), header, &analyze.clause);
            Reason::Long(cref)
        }
    };

    enqueue_assignment(ctx.borrow(), analyze.clause[0], reason);

    if let Some((cref, pivot)) = strengthen {
        strengthen_conflict_clause(ctx.borrow(), cref, pivot);
    }
}

/// Resolve the conflict backwards along the trail until only a single
/// literal of the conflict level remains.
///
/// Returns an on-the-fly strengthening candidate when the very first
/// resolution already shrinks the conflicting clause.
fn deduce_first_uip(
    mut ctx: partial!(Context, mut AnalyzeP, ClauseAllocP, ImplGraphP, TrailP),
    conflict: Conflict,
) -> Option<(ClauseRef, Lit)> {
    {
        let analyze = ctx.part_mut(AnalyzeP);
        analyze.clause.clear();
        analyze.involved.clear();
        analyze.bump.clear();
        analyze.current_level_count = 0;
    }

    split_borrow!(lit_ctx = &(ClauseAllocP) ctx);

    // We start with all the literals of the conflicting clause.
    for &lit in conflict.lits(&lit_ctx) {
        add_literal(ctx.borrow(), lit);
    }

    let conflict_len = conflict.lits(&lit_ctx).len();

    if let Conflict::Long(cref) = conflict {
        ctx.part_mut(AnalyzeP).involved.push(cref);
    }

    let mut strengthen = None;
    let mut first_resolution = true;

    // To get rid of all but one literal of the current level, we resolve the
    // clause with the reason for those literals. The correct order for this
    // is reverse chronological.
    split_borrow!(ctx_trail = &(TrailP) ctx);

    for &lit in ctx_trail.part(TrailP).trail().iter().rev() {
        let analyze = ctx.part_mut(AnalyzeP);
        let lit_present = &mut analyze.var_flags[lit.index()];
        // Is the lit present in the current clause?
        if !*lit_present {
            continue;
        }
        *lit_present = false;
        analyze.current_level_count -= 1;
        if analyze.current_level_count == 0 {
            // lit is the last literal of the current level present in the
            // current clause, therefore the resulting clause will assert !lit
            // so we put it in position 0.
            analyze.clause.push(!lit);
            let end = analyze.clause.len() - 1;
            analyze.clause.swap(0, end);

            break;
        }

        // We removed the literal and now add its reason.
        let reason = *ctx.part(ImplGraphP).reason(lit.var());

        let size_before = {
            let analyze = ctx.part(AnalyzeP);
            analyze.clause.len() + analyze.current_level_count
        };

        for &reason_lit in reason.lits(&lit_ctx).iter() {
            add_literal(ctx.borrow(), reason_lit);
        }

        if first_resolution {
            first_resolution = false;
            let size_after = {
                let analyze = ctx.part(AnalyzeP);
                analyze.clause.len() + analyze.current_level_count
            };
            // The first resolution removed the pivot without adding new
            // literals: the resolvent subsumes the conflicting clause, which
            // can be strengthened by dropping the pivot.
            if size_after == size_before {
                if let Conflict::Long(cref) = conflict {
                    if conflict_len > 2 {
                        strengthen = Some((cref, !lit));
                    }
                }
            }
        }

        if let Reason::Long(cref) = reason {
            ctx.part_mut(AnalyzeP).involved.push(cref);
        }
    }

    strengthen
}

/// Add a literal to the current clause.
fn add_literal(
    mut ctx: partial!(Context, mut AnalyzeP, ImplGraphP, TrailP),
    lit: Lit,
) {
    let (analyze, ctx) = ctx.split_part_mut(AnalyzeP);
    let lit_level = ctx.part(ImplGraphP).level(lit.var());
    // No need to add literals that are set by unit clauses or already present
    if lit_level > 0 && !analyze.var_flags[lit.index()] {
        analyze.var_flags[lit.index()] = true;
        analyze.bump.push(lit.var());
        if lit_level == ctx.part(TrailP).current_level() {
            analyze.current_level_count += 1;
        } else {
            analyze.clause.push(lit);
            analyze.to_clean.push(lit.var());
        }
    }
}

/// Bump all variables involved in the conflict.
///
/// In stable mode the VSIDS activities are bumped and decayed. In focused
/// mode the variables move to the front of the queue, ordered by their
/// previous stamps so that recently active variables end up closest to the
/// front.
fn bump_variables(
    mut ctx: partial!(
        Context,
        mut VmtfP,
        mut VsidsP,
        ScheduleP,
        SolverConfigP,
        VariablesP,
    ),
    bump: &mut Vec<Var>,
) {
    if ctx.part(ScheduleP).mode == SearchMode::Stable {
        let vsids = ctx.part_mut(VsidsP);
        for &var in bump.iter() {
            vsids.bump(var);
        }
        vsids.decay();
    } else {
        let (vmtf, _ctx) = ctx.split_part_mut(VmtfP);
        bump.sort_unstable_by_key(|&var| vmtf.stamp(var));
        for &var in bump.iter() {
            vmtf.bump(var);
        }
    }
    bump.clear();
}

/// A Bloom filter of levels.
#[derive(Default)]
struct LevelAbstraction {
    bits: u64,
}

impl LevelAbstraction {
    /// Add a level to the Bloom filter.
    pub fn add(&mut self, level: usize) {
        self.bits |= 1 << (level % 64)
    }

    /// Test whether a level could be in the Bloom filter.
    pub fn test(&self, level: usize) -> bool {
        self.bits & (1 << (level % 64)) != 0
    }
}

/// Performs recursive clause minimization.
///
/// **Note:** Requires Analyze's var_flags to be set for exactly the
/// variables of the unminimized clause. This also sets some more var_flags,
/// but lists them in to_clean.
///
/// This routine tries to remove some redundant literals of the learned
/// clause. The idea is to detect literals of the learned clause that are
/// already implied by other literals of the clause.
///
/// This is done by performing a DFS in the implication graph (following
/// edges in reverse) for each literal (apart from the asserting one). The
/// search doesn't expand literals already known to be implied by literals of
/// the clause. When a decision literal that is not in the clause is found,
/// it means that the literal is not redundant.
///
/// There are two optimizations used here: The first one is to stop the
/// search as soon as a literal of a decision level not present in the clause
/// is found. If the DFS would be continued it would at some point reach the
/// decision of that level. That decision belongs to a level not in the
/// clause and thus itself can't be in the clause. Checking whether the
/// decision level is among the clause's decision levels is done
/// approximately using a Bloom filter.
///
/// The other optimization is to avoid duplicating work during the DFS
/// searches. When one literal is found to be redundant that means the whole
/// search stayed within the implied literals. We remember this and will not
/// expand any of these literals for the following DFS searches.
///
/// The search aborts when the configured expansion bound is exceeded, so
/// degenerate implication graphs cannot blow up analysis time.
fn minimize_clause(
    mut ctx: partial!(
        Context,
        mut AnalyzeP,
        mut SolverStateP,
        ClauseAllocP,
        ImplGraphP,
        SolverConfigP,
    ),
) {
    let minimize_depth = ctx.part(SolverConfigP).minimize_depth;
    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeP);
    split_borrow!(lit_ctx = &(ClauseAllocP) ctx);
    let impl_graph = ctx.part(ImplGraphP);

    let mut involved_levels = LevelAbstraction::default();

    for &lit in analyze.clause.iter() {
        involved_levels.add(impl_graph.level(lit.var()));
    }

    let mut removed = 0u64;

    let mut scan = VecMutScan::new(&mut analyze.clause);

    // we always keep the first literal
    scan.next();

    'next_lit: while let Some(lit) = scan.next() {
        if impl_graph.reason(lit.var()).is_unit_or_decision() {
            continue;
        }

        // Start the DFS
        analyze.stack.clear();
        analyze.stack.push(!*lit);

        // Used to remember which var_flags are set during this DFS
        let top = analyze.to_clean.len();

        let mut expanded = 0;

        while let Some(lit) = analyze.stack.pop() {
            let reason = impl_graph.reason(lit.var());
            let lits = reason.lits(&lit_ctx);

            expanded += 1;

            for &reason_lit in lits {
                let reason_level = impl_graph.level(reason_lit.var());

                if !analyze.var_flags[reason_lit.index()] && reason_level > 0 {
                    // We haven't established reason_lit to be redundant,
                    // haven't visited it yet and it's not implied by unit
                    // clauses.

                    if impl_graph.reason(reason_lit.var()).is_unit_or_decision()
                        || !involved_levels.test(reason_level)
                        || expanded > minimize_depth
                    {
                        // reason_lit is a decision not in the clause or in a
                        // decision level known not to be in the clause.
                        // Abort the search.

                        // Reset the var_flags set during _this_ DFS.
                        for lit in analyze.to_clean.drain(top..) {
                            analyze.var_flags[lit.index()] = false;
                        }
                        continue 'next_lit;
                    } else {
                        analyze.var_flags[reason_lit.index()] = true;
                        analyze.to_clean.push(reason_lit.var());
                        analyze.stack.push(!reason_lit);
                    }
                }
            }
        }

        lit.remove();
        removed += 1;
    }

    drop(scan);

    ctx.part_mut(SolverStateP).stats.minimized_lits += removed;
}

/// Replace a conflicting clause that was subsumed by its first resolvent.
///
/// The strengthened clause drops the pivot literal. It is skipped when the
/// remaining literals do not contain two non-false ones, as the replacement
/// could otherwise miss a pending propagation.
fn strengthen_conflict_clause<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ProofP<'a>,
        mut SolverStateP,
        mut TmpDataP,
        mut WatchlistsP,
    ),
    cref: ClauseRef,
    pivot: Lit,
) {
    let mut lits = std::mem::take(&mut ctx.part_mut(TmpDataP).lits);
    lits.clear();
    lits.extend(
        ctx.part(ClauseAllocP)
            .lits(cref)
            .iter()
            .cloned()
            .filter(|&lit| lit != pivot),
    );

    let non_false = lits
        .iter()
        .filter(|&&lit| !ctx.part(AssignmentP).lit_is_false(lit))
        .count();

    if non_false < 2 {
        ctx.part_mut(TmpDataP).lits = lits;
        return;
    }

    // Move two non-false literals into the watched positions.
    let mut filled = 0;
    for pos in 0..lits.len() {
        if !ctx.part(AssignmentP).lit_is_false(lits[pos]) {
            lits.swap(filled, pos);
            filled += 1;
            if filled == 2 {
                break;
            }
        }
    }

    let redundant = ctx.part(ClauseAllocP).header(cref).redundant();

    ctx.part_mut(ProofP).add_step(&ProofStep::AtClause {
        redundant,
        clause: &lits,
    });

    if lits.len() == 2 {
        ctx.part_mut(WatchlistsP)
            .watch_binary_clause([lits[0], lits[1]], redundant, false);
    } else {
        let mut header = crate::clause::ClauseHeader::new();
        header.set_redundant(redundant);
        let glue = ctx.part(ClauseAllocP).header(cref).glue();
        header.set_glue(glue);
        header.set_keep(ctx.part(ClauseAllocP).header(cref).keep());
        header.set_used(ctx.part(ClauseAllocP).header(cref).used());
        db::add_watched_clause(ctx.borrow(), header, &lits);
    }

    let old_lits: Vec<Lit> = ctx.part(ClauseAllocP).lits(cref).to_vec();
    ctx.part_mut(ProofP).add_step(&ProofStep::DeleteClause {
        clause: &old_lits,
        proof: if redundant {
            DeleteClauseProof::Redundant
        } else {
            DeleteClauseProof::Simplified
        },
    });
    db::delete_watched_clause(ctx.borrow(), cref);

    ctx.part_mut(SolverStateP).stats.strengthened_conflicts += 1;

    ctx.part_mut(TmpDataP).lits = lits;
}
