//! Local search over the irredundant clauses.
//!
//! A WalkSAT style search starts from the saved phases and flips variables
//! from randomly picked unsatisfied clauses. The flip candidate is chosen
//! with probability proportional to `2^-break`, where the break value counts
//! the clauses that would become unsatisfied. The best assignment seen is
//! saved into the phases, seeding the next rephase with something that
//! satisfies more clauses than the current phases do.
use partial_ref::{partial, PartialRef};

use rand::Rng;

use kestrel_formula::{Lit, Var};

use crate::context::{parts::*, Context};
use crate::prop::watch::WatchEntry;

/// Weights `2^-break` as fixed point numbers, saturated at 30 break values.
const BREAK_WEIGHTS: usize = 30;

/// One clause of the local search instance.
struct WalkClause {
    start: u32,
    len: u32,
    satisfied: u32,
}

/// Run one round of local search and seed the phases from the result.
pub fn walk<'a>(
    mut ctx: partial!(
        Context<'a>,
        mut AssignmentP,
        mut PhasesP,
        mut ScheduleP,
        mut SolverStateP,
        mut TmpDataP,
        ClauseAllocP,
        ClauseDbP,
        SolverConfigP,
        TrailP,
        VariablesP,
        WatchlistsP,
    ),
) {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let var_count = ctx.part(AssignmentP).var_count();
    if var_count == 0 {
        return;
    }

    ctx.part_mut(SolverStateP).stats.walk_rounds += 1;

    // Collect the irredundant clauses not satisfied at the root.
    let mut lit_buffer: Vec<Lit> = vec![];
    let mut clauses: Vec<WalkClause> = vec![];

    for code in 0..var_count * 2 {
        let lit = Lit::from_code(code);
        for entry in ctx.part(WatchlistsP).entries(lit) {
            if let WatchEntry::Binary {
                other, redundant, ..
            } = entry
            {
                if !redundant && lit.code() < other.code() {
                    let start = lit_buffer.len() as u32;
                    lit_buffer.push(lit);
                    lit_buffer.push(other);
                    clauses.push(WalkClause {
                        start,
                        len: 2,
                        satisfied: 0,
                    });
                }
            }
        }
    }

    for &cref in ctx.part(ClauseDbP).clauses.iter() {
        let header = ctx.part(ClauseAllocP).header(cref);
        if header.garbage() || header.redundant() {
            continue;
        }
        let start = lit_buffer.len() as u32;
        lit_buffer.extend_from_slice(ctx.part(ClauseAllocP).lits(cref));
        clauses.push(WalkClause {
            start,
            len: ctx.part(ClauseAllocP).header(cref).len() as u32,
            satisfied: 0,
        });
    }

    if clauses.is_empty() {
        return;
    }

    // Occurrence lists by literal code.
    let mut occurrences: Vec<Vec<u32>> = vec![vec![]; var_count * 2];
    for (index, clause) in clauses.iter().enumerate() {
        for &lit in &lit_buffer[clause.start as usize..(clause.start + clause.len) as usize] {
            occurrences[lit.code()].push(index as u32);
        }
    }

    // Starting assignment: root values where fixed, saved phases elsewhere.
    let mut values: Vec<i8> = (0..var_count)
        .map(|index| {
            let var = Var::from_index(index);
            match ctx.part(AssignmentP).var_polarity(var) {
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

    let lit_true = |values: &[i8], lit: Lit| -> bool {
        values[lit.index()] == if lit.is_positive() { 1 } else { -1 }
    };

    let mut unsat: Vec<u32> = vec![];
    let mut unsat_position: Vec<Option<u32>> = vec![None; clauses.len()];

    for (index, clause) in clauses.iter_mut().enumerate() {
        let lits = &lit_buffer[clause.start as usize..(clause.start + clause.len) as usize];
        clause.satisfied = lits.iter().filter(|&&lit| lit_true(&values, lit)).count() as u32;
        if clause.satisfied == 0 {
            unsat_position[index] = Some(unsat.len() as u32);
            unsat.push(index as u32);
        }
    }

    let weights: Vec<u64> = (0..=BREAK_WEIGHTS)
        .map(|breaks| 1u64 << (BREAK_WEIGHTS - breaks))
        .collect();

    let mut best_unsat = unsat.len();
    let mut best_values = values.clone();

    let flip_limit = ctx.part(SolverConfigP).walk_effort;
    let mut flips = 0u64;

    while !unsat.is_empty() && flips < flip_limit {
        if flips % 1024 == 0 && ctx.part(SolverStateP).terminated() {
            break;
        }
        flips += 1;

        let pick = {
            let rng = &mut ctx.part_mut(ScheduleP).rng;
            rng.gen_range(0, unsat.len())
        };
        let clause_index = unsat[pick] as usize;
        let clause = &clauses[clause_index];
        let lits: Vec<Lit> =
            lit_buffer[clause.start as usize..(clause.start + clause.len) as usize].to_vec();

        // Compute break counts and the corresponding weights.
        let mut flip_weights: Vec<(Lit, u64)> = vec![];
        for &lit in lits.iter() {
            let var = lit.var();
            if ctx.part(AssignmentP).var_is_assigned(var)
                || !ctx.part(VariablesP).flags(var).active
            {
                continue;
            }
            let mut breaks = 0;
            for &other_index in occurrences[(!lit).code()].iter() {
                if clauses[other_index as usize].satisfied == 1 {
                    breaks += 1;
                    if breaks >= BREAK_WEIGHTS {
                        break;
                    }
                }
            }
            flip_weights.push((lit, weights[breaks]));
        }

        if flip_weights.is_empty() {
            break;
        }

        let total: u64 = flip_weights.iter().map(|&(_, weight)| weight).sum();
        let mut pick = {
            let rng = &mut ctx.part_mut(ScheduleP).rng;
            rng.gen_range(0, total)
        };
        let mut flip_lit = flip_weights[0].0;
        for &(lit, weight) in flip_weights.iter() {
            if pick < weight {
                flip_lit = lit;
                break;
            }
            pick -= weight;
        }

        // Flip: flip_lit becomes true, its negation false.
        values[flip_lit.index()] = if flip_lit.is_positive() { 1 } else { -1 };

        for &other_index in occurrences[flip_lit.code()].iter() {
            let clause = &mut clauses[other_index as usize];
            clause.satisfied += 1;
            if clause.satisfied == 1 {
                if let Some(pos) = unsat_position[other_index as usize].take() {
                    let last = unsat.len() - 1;
                    unsat.swap(pos as usize, last);
                    let moved = unsat[pos as usize];
                    unsat_position[moved as usize] = Some(pos);
                    unsat.pop();
                }
            }
        }
        for &other_index in occurrences[(!flip_lit).code()].iter() {
            let clause = &mut clauses[other_index as usize];
            debug_assert!(clause.satisfied > 0);
            clause.satisfied -= 1;
            if clause.satisfied == 0 {
                unsat_position[other_index as usize] = Some(unsat.len() as u32);
                unsat.push(other_index);
            }
        }

        if unsat.len() < best_unsat {
            best_unsat = unsat.len();
            best_values.copy_from_slice(&values);
        }
    }

    ctx.part_mut(SolverStateP).stats.walk_flips += flips;

    // Seed the phases with the best assignment found.
    let (phases, ctx_rest) = ctx.split_part_mut(PhasesP);
    for index in 0..var_count {
        let var = Var::from_index(index);
        if ctx_rest.part(AssignmentP).var_is_assigned(var) {
            continue;
        }
        let phases = phases.get_mut(var);
        phases.saved = best_values[index];
        phases.target = best_values[index];
    }
}
