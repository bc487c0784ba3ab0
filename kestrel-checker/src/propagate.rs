//! The checker's own watched-literal propagation engine.
//!
//! This is deliberately independent of the solver's propagator. It maintains
//! per-literal truth values, a trail and two watched literals per stored
//! clause. The watched literals are always the first two literals of the
//! stored clause, so clause deletion knows where to find its watches.
//!
//! Temporary assignments made during a RUP check are undone by rolling the
//! trail back to a mark. Watches do not have to be restored on rollback, as
//! unassigning literals cannot invalidate the watch invariant.
use partial_ref::{partial, PartialRef};

use kestrel_formula::Lit;

use crate::context::{parts::*, Context};

/// Assignment state and watchlists of the checker.
#[derive(Default)]
pub struct Propagator {
    /// Truth value per literal code: `1` true, `-1` false, `0` unassigned.
    values: Vec<i8>,
    /// Assigned literals in assignment order.
    trail: Vec<Lit>,
    /// Next trail position to propagate.
    propagated: usize,
    /// Clause indices watching each literal.
    watches: Vec<Vec<u32>>,
    /// Clause that caused the most recent conflict.
    pub conflict: Option<u32>,
}

impl Propagator {
    /// Update structures for a new variable count.
    pub fn ensure_var_count(&mut self, count: usize) {
        if self.values.len() < count * 2 {
            self.values.resize(count * 2, 0);
            self.watches.resize(count * 2, vec![]);
        }
    }

    /// Truth value of a literal.
    pub fn value(&self, lit: Lit) -> i8 {
        self.values[lit.code()]
    }

    pub fn is_true(&self, lit: Lit) -> bool {
        self.value(lit) > 0
    }

    pub fn is_false(&self, lit: Lit) -> bool {
        self.value(lit) < 0
    }

    /// Assign a literal the value true and enqueue it for propagation.
    pub fn assign(&mut self, lit: Lit) {
        debug_assert_eq!(self.value(lit), 0);
        self.values[lit.code()] = 1;
        self.values[(!lit).code()] = -1;
        self.trail.push(lit);
    }

    /// Make a clause watch a literal.
    pub fn add_watch(&mut self, lit: Lit, clause: u32) {
        self.watches[lit.code()].push(clause);
    }

    /// Stop watching a literal.
    ///
    /// The clause has to be present in the literal's watchlist.
    pub fn remove_watch(&mut self, lit: Lit, clause: u32) {
        let list = &mut self.watches[lit.code()];
        let pos = list
            .iter()
            .position(|&idx| idx == clause)
            .expect("missing watch");
        list.swap_remove(pos);
    }

    /// Current trail length, used to undo temporary assignments.
    pub fn mark(&self) -> usize {
        self.trail.len()
    }

    /// Undo all assignments made since the given mark.
    pub fn rollback(&mut self, mark: usize) {
        for &lit in &self.trail[mark..] {
            self.values[lit.code()] = 0;
            self.values[(!lit).code()] = 0;
        }
        self.trail.truncate(mark);
        if self.propagated > mark {
            self.propagated = mark;
        }
        self.conflict = None;
    }
}

/// Propagate all enqueued assignments.
///
/// Returns `true` if a conflict was found.
pub fn propagate(mut ctx: partial!(Context, mut ClausesP, mut PropagatorP)) -> bool {
    let (prop, mut ctx) = ctx.split_part_mut(PropagatorP);
    let clauses = ctx.part_mut(ClausesP);

    while prop.propagated < prop.trail.len() {
        let lit = prop.trail[prop.propagated];
        prop.propagated += 1;

        let watch_lit = !lit;
        // The list is detached while we scan it, as finding a replacement
        // watch pushes onto other literals' lists.
        let mut list = std::mem::take(&mut prop.watches[watch_lit.code()]);

        let mut keep = 0;
        let mut read = 0;
        let mut conflict = false;

        'watches: while read < list.len() {
            let idx = list[read];
            read += 1;

            let lits = clauses.lits_mut(idx);
            if lits[0] == watch_lit {
                lits.swap(0, 1);
            }
            let first = lits[0];

            if prop.values[first.code()] > 0 {
                list[keep] = idx;
                keep += 1;
                continue;
            }

            for pos in 2..lits.len() {
                let candidate = lits[pos];
                if prop.values[candidate.code()] >= 0 {
                    lits[pos] = watch_lit;
                    lits[1] = candidate;
                    prop.watches[candidate.code()].push(idx);
                    continue 'watches;
                }
            }

            list[keep] = idx;
            keep += 1;

            if prop.values[first.code()] < 0 {
                prop.conflict = Some(idx);
                while read < list.len() {
                    list[keep] = list[read];
                    keep += 1;
                    read += 1;
                }
                conflict = true;
            } else {
                prop.values[first.code()] = 1;
                prop.values[(!first).code()] = -1;
                prop.trail.push(first);
            }
        }

        list.truncate(keep);
        prop.watches[watch_lit.code()] = list;

        if conflict {
            return true;
        }
    }

    false
}

/// Check whether a clause is implied by the current formula via reverse unit
/// propagation.
///
/// `lits` must be sorted and free of duplicates. The assignment state is
/// unchanged on return.
pub fn check_rup(mut ctx: partial!(Context, mut ClausesP, mut PropagatorP), lits: &[Lit]) -> bool {
    for &lit in lits.iter() {
        ctx.part_mut(PropagatorP)
            .ensure_var_count(lit.index() + 1);
    }

    // A clause containing a root-satisfied literal is trivially implied.
    if lits.iter().any(|&lit| ctx.part(PropagatorP).is_true(lit)) {
        return true;
    }

    let mark = ctx.part(PropagatorP).mark();

    for &lit in lits.iter() {
        let prop = ctx.part_mut(PropagatorP);
        if prop.value(lit) == 0 {
            prop.assign(!lit);
        }
    }

    let conflict = propagate(ctx.borrow());

    ctx.part_mut(PropagatorP).rollback(mark);

    conflict
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_and_rollback() {
        let mut prop = Propagator::default();
        prop.ensure_var_count(4);

        let a = Lit::from_dimacs(1);
        let b = Lit::from_dimacs(-2);

        prop.assign(a);
        let mark = prop.mark();
        prop.assign(b);

        assert!(prop.is_true(a));
        assert!(prop.is_true(b));
        assert!(prop.is_false(!b));

        prop.rollback(mark);

        assert!(prop.is_true(a));
        assert_eq!(prop.value(b), 0);
        assert_eq!(prop.value(!b), 0);
    }
}
