//! Decision heuristics.
//!
//! Stable mode branches on the variable with the highest VSIDS activity,
//! focused mode on the most recently bumped variable of the move-to-front
//! queue. Both share the saved phase when picking the polarity.
use partial_ref::{partial, PartialRef};

use kestrel_formula::Var;

use crate::context::{parts::*, Context};
use crate::prop::{enqueue_assignment, Reason};
use crate::schedule::SearchMode;

pub mod vmtf;
pub mod vsids;

/// Return an unassigned variable to the branching heuristics.
pub fn make_available(mut ctx: partial!(Context, mut VmtfP, mut VsidsP), var: Var) {
    ctx.part_mut(VsidsP).make_available(var);
    ctx.part_mut(VmtfP).unassigned(var);
}

/// Make a decision and enqueue it.
///
/// Returns `false` if no decision was made because all active variables are
/// assigned, which means the formula is satisfied.
pub fn make_decision(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut PhasesP,
        mut SolverStateP,
        mut TrailP,
        mut VariablesP,
        mut VmtfP,
        mut VsidsP,
        ScheduleP,
    ),
) -> bool {
    let decision_var = match next_decision_var(ctx.borrow()) {
        Some(var) => var,
        None => return false,
    };

    let decision = ctx.part(PhasesP).decision_lit(decision_var);

    ctx.part_mut(TrailP).new_decision_level(decision);
    ctx.part_mut(SolverStateP).stats.decisions += 1;

    enqueue_assignment(ctx.borrow(), decision, Reason::Decision);

    true
}

/// Pick the next decision variable using the active heuristic.
fn next_decision_var(
    mut ctx: partial!(
        Context,
        mut VmtfP,
        mut VsidsP,
        AssignmentP,
        ScheduleP,
        VariablesP,
    ),
) -> Option<Var> {
    let (variables, mut ctx) = ctx.split_part(VariablesP);
    let (assignment, mut ctx) = ctx.split_part(AssignmentP);

    if ctx.part(ScheduleP).mode == SearchMode::Stable {
        let vsids = ctx.part_mut(VsidsP);
        while let Some(var) = vsids.next() {
            if !assignment.var_is_assigned(var) && variables.flags(var).active {
                return Some(var);
            }
        }
        None
    } else {
        ctx.part_mut(VmtfP).next_unassigned(assignment, variables)
    }
}
