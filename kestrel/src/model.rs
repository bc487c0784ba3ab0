//! Extracting a full model from a satisfying search state.
use partial_ref::{partial, PartialRef};

use kestrel_formula::{Lit, Var};

use crate::context::{parts::*, Context};

/// Compute a total assignment over all variables.
///
/// Assigned variables keep their search value. Eliminated and never-assigned
/// variables start from their saved phase and are corrected by replaying the
/// extension stack, which reconstructs satisfying values for all weakened
/// clauses.
pub fn extract_model(
    mut ctx: partial!(Context, AssignmentP, ExtenderP, PhasesP),
) -> Vec<Lit> {
    let assignment = ctx.part(AssignmentP);
    let var_count = assignment.var_count();

    let mut values: Vec<i8> = (0..var_count)
        .map(|index| {
            let var = Var::from_index(index);
            match assignment.var_polarity(var) {
                0 => {
                    let saved = ctx.part(PhasesP).get(var).saved;
                    if saved == 0 {
                        -1
                    } else {
                        saved
                    }
                }
                polarity => polarity,
            }
        })
        .collect();

    ctx.part(ExtenderP).extend_assignment(&mut values);

    values
        .iter()
        .enumerate()
        .map(|(index, &polarity)| Var::from_index(index).lit(polarity > 0))
        .collect()
}
