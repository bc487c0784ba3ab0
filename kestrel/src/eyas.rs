//! The embedded mini solver used for definition extraction.
//!
//! Variable elimination asks whether the environment clauses of a candidate
//! variable, with the candidate removed, are unsatisfiable. If they are, the
//! candidate has a structural definition and the unsatisfiable core names
//! the defining clauses. The instances are tiny, so this solver is a plain
//! DPLL with unit propagation and reason tracking for core extraction.
use kestrel_formula::Lit;

/// A miniature DPLL solver with clausal core extraction.
pub struct Eyas {
    clauses: Vec<Vec<Lit>>,
    /// Truth value per literal code.
    values: Vec<i8>,
    trail: Vec<Lit>,
    /// Propagating clause per variable index.
    reasons: Vec<Option<u32>>,
    /// Clauses marked as part of the unsatisfiable core.
    marked: Vec<bool>,
    ticks: u64,
    limit: u64,
}

impl Eyas {
    /// Create a solver with the given propagation budget.
    pub fn new(limit: u64) -> Eyas {
        Eyas {
            clauses: vec![],
            values: vec![],
            trail: vec![],
            reasons: vec![],
            marked: vec![],
            ticks: 0,
            limit,
        }
    }

    /// Add a clause, growing the variable range as needed.
    pub fn add_clause(&mut self, lits: &[Lit]) -> u32 {
        for &lit in lits {
            let needed = (lit.index() + 1) * 2;
            if self.values.len() < needed {
                self.values.resize(needed, 0);
                self.reasons.resize(needed / 2, None);
            }
        }
        let id = self.clauses.len() as u32;
        self.clauses.push(lits.to_vec());
        self.marked.push(false);
        id
    }

    /// Decide satisfiability.
    ///
    /// Returns `None` when the propagation budget ran out. On `Some(false)`
    /// the core is available through [`core`](Eyas::core).
    pub fn solve(&mut self) -> Option<bool> {
        self.search()
    }

    /// The clause ids marked as unsatisfiable core.
    pub fn core(&self) -> Vec<u32> {
        self.marked
            .iter()
            .enumerate()
            .filter(|(_, &marked)| marked)
            .map(|(id, _)| id as u32)
            .collect()
    }

    fn value(&self, lit: Lit) -> i8 {
        self.values[lit.code()]
    }

    fn assign(&mut self, lit: Lit, reason: Option<u32>) {
        debug_assert_eq!(self.value(lit), 0);
        self.values[lit.code()] = 1;
        self.values[(!lit).code()] = -1;
        self.reasons[lit.index()] = reason;
        self.trail.push(lit);
    }

    fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            let lit = self.trail.pop().unwrap();
            self.values[lit.code()] = 0;
            self.values[(!lit).code()] = 0;
            self.reasons[lit.index()] = None;
        }
    }

    /// Naive unit propagation to a fixed point.
    ///
    /// Returns the conflicting clause if any.
    fn propagate(&mut self) -> Result<(), u32> {
        loop {
            let mut changed = false;

            for id in 0..self.clauses.len() {
                self.ticks += 1;

                let mut unassigned = None;
                let mut unassigned_count = 0;
                let mut satisfied = false;

                for &lit in self.clauses[id].iter() {
                    match self.value(lit) {
                        value if value > 0 => {
                            satisfied = true;
                            break;
                        }
                        value if value < 0 => (),
                        _ => {
                            unassigned_count += 1;
                            unassigned = Some(lit);
                        }
                    }
                }

                if satisfied {
                    continue;
                }

                match (unassigned_count, unassigned) {
                    (0, _) => return Err(id as u32),
                    (1, Some(lit)) => {
                        self.assign(lit, Some(id as u32));
                        changed = true;
                    }
                    _ => (),
                }
            }

            if !changed {
                return Ok(());
            }
        }
    }

    /// Mark the conflict clause and, transitively, the reasons of its false
    /// literals.
    fn mark_core(&mut self, conflict: u32) {
        let mut stack = vec![conflict];
        while let Some(id) = stack.pop() {
            if self.marked[id as usize] {
                continue;
            }
            self.marked[id as usize] = true;
            for index in 0..self.clauses[id as usize].len() {
                let lit = self.clauses[id as usize][index];
                if self.value(lit) < 0 {
                    if let Some(reason) = self.reasons[lit.index()] {
                        stack.push(reason);
                    }
                }
            }
        }
    }

    fn search(&mut self) -> Option<bool> {
        if self.ticks > self.limit {
            return None;
        }

        let mark = self.trail.len();

        match self.propagate() {
            Err(conflict) => {
                self.mark_core(conflict);
                self.undo_to(mark);
                return Some(false);
            }
            Ok(()) => (),
        }

        let decision = (0..self.values.len() / 2)
            .map(|index| Lit::from_index(index, true))
            .find(|&lit| self.value(lit) == 0);

        let decision = match decision {
            Some(decision) => decision,
            None => {
                self.undo_to(mark);
                return Some(true);
            }
        };

        for &polarity in &[decision, !decision] {
            let decision_mark = self.trail.len();
            self.assign(polarity, None);
            match self.search() {
                Some(true) => {
                    self.undo_to(mark);
                    return Some(true);
                }
                Some(false) => {
                    self.undo_to(decision_mark);
                }
                None => {
                    self.undo_to(mark);
                    return None;
                }
            }
        }

        self.undo_to(mark);
        Some(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kestrel_formula::lits;

    #[test]
    fn sat_instance() {
        let mut eyas = Eyas::new(10_000);
        eyas.add_clause(&lits![1, 2]);
        eyas.add_clause(&lits![-1, 2]);
        assert_eq!(eyas.solve(), Some(true));
    }

    #[test]
    fn unsat_core() {
        let mut eyas = Eyas::new(10_000);
        let a = eyas.add_clause(&lits![1, 2]);
        let b = eyas.add_clause(&lits![1, -2]);
        let c = eyas.add_clause(&lits![-1, 2]);
        let d = eyas.add_clause(&lits![-1, -2]);
        eyas.add_clause(&lits![3, 4]);

        assert_eq!(eyas.solve(), Some(false));

        let core = eyas.core();
        for id in [a, b, c, d].iter() {
            assert!(core.contains(id));
        }
        assert!(!core.contains(&4));
    }

    #[test]
    fn budget_exhaustion() {
        let mut eyas = Eyas::new(1);
        eyas.add_clause(&lits![1, 2]);
        eyas.add_clause(&lits![-1, -2]);
        assert_eq!(eyas.solve(), None);
    }
}
