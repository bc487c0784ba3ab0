//! The extension stack for witness reconstruction.
//!
//! Clauses removed by variable elimination or autarky detection are not
//! logically redundant: a model of the remaining formula need not satisfy
//! them. Each such clause is "weakened" onto this stack together with a
//! witness literal. Processing the stack in reverse order and flipping the
//! witness of every unsatisfied clause turns a model of the remaining
//! formula into a model of the original formula.
use kestrel_formula::Lit;

/// A weakened clause with its witness literal.
struct Entry {
    witness: Lit,
    start: u32,
    len: u32,
}

/// The extension stack.
#[derive(Default)]
pub struct Extender {
    lits: Vec<Lit>,
    entries: Vec<Entry>,
}

impl Extender {
    /// Record a weakened clause.
    ///
    /// The witness has to be a literal of the clause. Setting it true must
    /// not falsify any clause weakened earlier for the same witness variable.
    pub fn push_weakened(&mut self, witness: Lit, clause: &[Lit]) {
        debug_assert!(clause.contains(&witness));
        let start = self.lits.len() as u32;
        self.lits.extend_from_slice(clause);
        self.entries.push(Entry {
            witness,
            start,
            len: clause.len() as u32,
        });
    }

    /// Extend a model of the remaining formula to the eliminated variables.
    ///
    /// `values` holds one phase byte per variable.
    pub fn extend_assignment(&self, values: &mut [i8]) {
        for entry in self.entries.iter().rev() {
            let clause =
                &self.lits[entry.start as usize..(entry.start + entry.len) as usize];
            let satisfied = clause.iter().any(|&lit| {
                let polarity = if lit.is_positive() { 1 } else { -1 };
                values[lit.index()] == polarity
            });
            if !satisfied {
                let witness = entry.witness;
                values[witness.index()] = if witness.is_positive() { 1 } else { -1 };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kestrel_formula::lits;

    #[test]
    fn reconstructs_eliminated_variable() {
        let mut extender = Extender::default();

        // Eliminating x3 from (1 3) and (-3 2): the resolvent is (1 2).
        extender.push_weakened(lits![3][0], &lits![1, 3]);
        extender.push_weakened(lits![-3][0], &lits![-3, 2]);

        // Model with 1 true, 2 false and x3 defaulted true: (-3 2) is
        // falsified, so the witness flips x3 to false.
        let mut values = vec![1, -1, 1];
        extender.extend_assignment(&mut values);
        assert_eq!(values[2], -1);
        assert_eq!(values[0], 1);

        // Model with 2 true: both clauses end up satisfied without flipping.
        let mut values = vec![-1, 1, 1];
        extender.extend_assignment(&mut values);
        assert_eq!(values[2], 1);
    }
}
