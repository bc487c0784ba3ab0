//! Internal proof step model for the Kestrel SAT solver.
use kestrel_formula::Lit;

pub mod drat;

/// Integer type used to store a hash of a clause.
pub type ClauseHash = u64;

/// Hash a single literal.
///
/// Multiple literals can be combined with xor, as done in [`clause_hash`].
pub fn lit_hash(lit: Lit) -> ClauseHash {
    lit_code_hash(lit.code())
}

/// Hash a single literal from a code.
///
/// This doesn't require the code to correspond to a valid literal.
pub fn lit_code_hash(lit_code: usize) -> ClauseHash {
    // Constant based on the golden ratio provides good mixing for the resulting upper bits
    (!(lit_code as u64)).wrapping_mul(0x61c8_8646_80b5_83ebu64)
}

/// A fast hash function for clauses (or other *sets* of literals).
///
/// This hash function interprets the given slice as a set and will not change
/// when the input is permuted. It does not handle duplicated items.
pub fn clause_hash(lits: &[Lit]) -> ClauseHash {
    let mut hash = 0;
    for &lit in lits {
        hash ^= lit_hash(lit);
    }
    hash
}

/// Justifications for a simple clause deletion.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum DeleteClauseProof {
    /// The clause is known to be redundant.
    Redundant,
    /// The clause is irredundant and subsumed by the clause added in the
    /// previous step.
    Simplified,
    /// The clause contains a true literal.
    ///
    /// Also used to justify deletion of tautological clauses.
    Satisfied,
    /// The clause was weakened onto the extension stack.
    ///
    /// A witness literal recorded by the solver reconstructs a satisfying
    /// assignment for it, so it may be removed without a redundancy proof.
    Weakened,
}

/// A single proof step.
///
/// Represents a mutation of the current formula and a justification for the
/// mutation's validity.
#[derive(Copy, Clone, Debug)]
pub enum ProofStep<'a> {
    /// Add a clause that is an asymmetric tautology (AT).
    ///
    /// Assuming the negation of the clause's literals leads to a unit
    /// propagation conflict. All clauses derived by the solver are of this
    /// kind.
    AtClause { redundant: bool, clause: &'a [Lit] },
    /// Unit clauses found by top-level unit propagation.
    ///
    /// This is equivalent to multiple unit `AtClause` steps.
    UnitClauses(&'a [Lit]),
    /// Delete a clause consisting of the given literals.
    DeleteClause {
        clause: &'a [Lit],
        proof: DeleteClauseProof,
    },
    /// Signals the end of a proof.
    End,
}
