//! Partial assignment, trail and backtracking.
use partial_ref::{partial, PartialRef};

use kestrel_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::decision::make_available;
use crate::schedule::SearchMode;

use super::Reason;

/// Current partial assignment.
///
/// The truth value is kept per literal, so the hot propagation loop can look
/// up a literal's value without computing its polarity: `1` means true, `-1`
/// false and `0` unassigned. Assigning a literal writes both its own entry
/// and the entry of its negation.
#[derive(Default)]
pub struct Assignment {
    values: Vec<i8>,
}

impl Assignment {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.values.resize(count * 2, 0);
    }

    pub fn var_count(&self) -> usize {
        self.values.len() / 2
    }

    /// Truth value of a literal.
    #[inline]
    pub fn value(&self, lit: Lit) -> i8 {
        self.values[lit.code()]
    }

    #[inline]
    pub fn lit_is_true(&self, lit: Lit) -> bool {
        self.values[lit.code()] > 0
    }

    #[inline]
    pub fn lit_is_false(&self, lit: Lit) -> bool {
        self.values[lit.code()] < 0
    }

    #[inline]
    pub fn lit_is_unk(&self, lit: Lit) -> bool {
        self.values[lit.code()] == 0
    }

    /// Whether the variable of a literal is assigned.
    #[inline]
    pub fn var_is_assigned(&self, var: Var) -> bool {
        self.values[var.positive().code()] != 0
    }

    /// The polarity a variable is currently assigned, as a phase byte.
    #[inline]
    pub fn var_polarity(&self, var: Var) -> i8 {
        self.values[var.positive().code()]
    }

    #[inline]
    pub fn assign_lit(&mut self, lit: Lit) {
        debug_assert!(self.lit_is_unk(lit));
        self.values[lit.code()] = 1;
        self.values[(!lit).code()] = -1;
    }

    #[inline]
    pub fn unassign_lit(&mut self, lit: Lit) {
        self.values[lit.code()] = 0;
        self.values[(!lit).code()] = 0;
    }
}

/// A decision level of the trail.
#[derive(Copy, Clone)]
pub struct Frame {
    /// The decision literal that opened the level.
    pub decision: Lit,
    /// Length of the trail when the level was opened.
    pub trail_index: usize,
}

/// Decision and propagation history.
#[derive(Default)]
pub struct Trail {
    /// Stack of all propagated and all enqueued assignments
    trail: Vec<Lit>,
    /// Next assignment in trail to propagate
    propagated: usize,
    /// One frame per decision level, the root level has none.
    frames: Vec<Frame>,
}

impl Trail {
    /// Return the next assigned literal to propagate and remove it from the
    /// queue.
    pub fn pop_queue(&mut self) -> Option<Lit> {
        let head = self.trail.get(self.propagated).cloned();
        if head.is_some() {
            self.propagated += 1;
        }
        head
    }

    /// Re-enqueue all assigned literals.
    pub fn reset_queue(&mut self) {
        self.propagated = 0;
    }

    /// Assigned literals in assignment order.
    pub fn trail(&self) -> &[Lit] {
        &self.trail
    }

    pub fn push_lit(&mut self, lit: Lit) {
        self.trail.push(lit);
    }

    /// Clear the trail.
    ///
    /// This simply removes all entries without performing any backtracking.
    /// Can only be called with no active decisions.
    pub fn clear(&mut self) {
        debug_assert!(self.frames.is_empty());
        self.trail.clear();
        self.propagated = 0;
    }

    /// Start a new decision level.
    ///
    /// Does not enqueue the decision itself.
    pub fn new_decision_level(&mut self, decision: Lit) {
        self.frames.push(Frame {
            decision,
            trail_index: self.trail.len(),
        });
    }

    /// Current decision level.
    pub fn current_level(&self) -> usize {
        self.frames.len()
    }

    /// The frame that opened the given level.
    ///
    /// The level must be at least 1.
    pub fn frame(&self, level: usize) -> &Frame {
        &self.frames[level - 1]
    }

    /// Whether all assignments are processed.
    pub fn fully_propagated(&self) -> bool {
        self.propagated == self.trail.len()
    }
}

/// Enqueues the assignment of true to a literal.
///
/// This updates the assignment and trail, but does not perform any
/// propagation. The literal has to be unassigned when calling this.
pub fn enqueue_assignment(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut PhasesP,
        mut TrailP,
        mut VariablesP,
        SolverStateP,
    ),
    lit: Lit,
    reason: Reason,
) {
    let assignment = ctx.part_mut(AssignmentP);
    debug_assert!(assignment.lit_is_unk(lit));

    assignment.assign_lit(lit);

    if !ctx.part(SolverStateP).probing {
        ctx.part_mut(PhasesP).save(lit);
    }

    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    let level = trail.current_level();

    if level == 0 {
        ctx.part_mut(VariablesP).mark_fixed(lit.var());
    }

    trail.trail.push(lit);

    let node = &mut ctx.part_mut(ImplGraphP).nodes[lit.index()];
    node.reason = if level == 0 { Reason::Unit } else { reason };
    node.level = level as u32;
    node.depth = (trail.trail.len() - 1) as u32;
}

/// Undo all assignments in decision levels deeper than the given level.
pub fn backtrack(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut PhasesP,
        mut TrailP,
        mut VmtfP,
        mut VsidsP,
        ScheduleP,
        SolverStateP,
    ),
    level: usize,
) {
    if level == ctx.part(TrailP).current_level() {
        return;
    }
    debug_assert!(level < ctx.part(TrailP).current_level());

    update_target_and_best(ctx.borrow());

    let (assignment, mut ctx) = ctx.split_part_mut(AssignmentP);
    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    let new_trail_len = trail.frames[level].trail_index;

    trail.frames.truncate(level);

    let trail_end = &trail.trail[new_trail_len..];
    for &lit in trail_end {
        make_available(ctx.borrow(), lit.var());
        assignment.unassign_lit(lit);
    }
    trail.trail.truncate(new_trail_len);
    if trail.propagated > new_trail_len {
        trail.propagated = new_trail_len;
    }
}

/// Snapshot the current assignment into the target and best phases when it
/// is a new high-water mark.
///
/// Only trails without pending conflict information qualify, which is the
/// case whenever backtracking is initiated. The target mark is reset by each
/// rephase cycle, the best mark only grows.
fn update_target_and_best(
    mut ctx: partial!(
        Context,
        mut PhasesP,
        AssignmentP,
        ScheduleP,
        SolverStateP,
        TrailP
    ),
) {
    if ctx.part(SolverStateP).probing {
        return;
    }
    if ctx.part(ScheduleP).mode != SearchMode::Stable {
        return;
    }

    let assigned = ctx.part(TrailP).trail().len();
    let (phases, ctx) = ctx.split_part_mut(PhasesP);

    if assigned > phases.target_assigned {
        phases.target_assigned = assigned;
        for &lit in ctx.part(TrailP).trail() {
            phases.get_mut(lit.var()).target = if lit.is_positive() { 1 } else { -1 };
        }
    }

    if assigned > phases.best_assigned {
        phases.best_assigned = assigned;
        for &lit in ctx.part(TrailP).trail() {
            phases.get_mut(lit.var()).best = if lit.is_positive() { 1 } else { -1 };
        }
    }
}

/// Undo all decisions.
pub fn restart(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut PhasesP,
        mut TrailP,
        mut VmtfP,
        mut VsidsP,
        ScheduleP,
        SolverStateP,
    ),
) {
    backtrack(ctx.borrow(), 0);
}
