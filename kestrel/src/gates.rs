//! Gate extraction for bounded variable elimination.
//!
//! When the environment of a candidate variable encodes a gate definition
//! (equivalence, AND, XOR, if-then-else, or any definition found by the
//! embedded eyas solver), resolution can be restricted to pairs of one gate
//! and one non-gate clause: all other resolvents are implied by them.
use kestrel_formula::Lit;

use crate::eyas::Eyas;

/// Clause masks marking the defining clauses of both occurrence sides.
pub struct Gate {
    pub pos_gate: Vec<bool>,
    pub neg_gate: Vec<bool>,
}

/// Try to find a gate definition for the pivot.
///
/// `pos` and `neg` hold the irredundant clauses containing the pivot and its
/// negation. Each clause's literals must be sorted.
pub fn extract_gate(
    pivot: Lit,
    pos: &[Vec<Lit>],
    neg: &[Vec<Lit>],
    xor_clause_limit: usize,
    definitions: bool,
    definition_effort: u64,
) -> Option<Gate> {
    if let Some(gate) = and_gate(pivot, pos, neg) {
        return Some(gate);
    }
    if let Some(gate) = and_gate(!pivot, neg, pos) {
        return Some(flip(gate));
    }
    if let Some(gate) = xor_gate(pivot, pos, neg, xor_clause_limit) {
        return Some(gate);
    }
    if let Some(gate) = ite_gate(pivot, pos, neg) {
        return Some(gate);
    }
    if definitions {
        if let Some(gate) = definition_gate(pivot, pos, neg, definition_effort) {
            return Some(gate);
        }
    }
    None
}

fn flip(gate: Gate) -> Gate {
    Gate {
        pos_gate: gate.neg_gate,
        neg_gate: gate.pos_gate,
    }
}

/// Find a clause with exactly the given sorted literals.
fn find_clause(clauses: &[Vec<Lit>], sorted: &[Lit]) -> Option<usize> {
    clauses.iter().position(|clause| clause[..] == sorted[..])
}

/// Detect `pivot = AND(...)`, which includes equivalences as the unary case.
///
/// The defining clauses are the long clause `(pivot ¬a1 .. ¬ak)` and the
/// binary clauses `(¬pivot ai)`.
fn and_gate(pivot: Lit, pos: &[Vec<Lit>], neg: &[Vec<Lit>]) -> Option<Gate> {
    for (index, clause) in pos.iter().enumerate() {
        let mut binaries = vec![];
        let mut is_gate = true;

        for &lit in clause.iter() {
            if lit == pivot {
                continue;
            }
            let mut binary = vec![!pivot, !lit];
            binary.sort_unstable();
            match find_clause(neg, &binary) {
                Some(binary_index) => binaries.push(binary_index),
                None => {
                    is_gate = false;
                    break;
                }
            }
        }

        if is_gate {
            let mut gate = Gate {
                pos_gate: vec![false; pos.len()],
                neg_gate: vec![false; neg.len()],
            };
            gate.pos_gate[index] = true;
            for binary_index in binaries {
                gate.neg_gate[binary_index] = true;
            }
            return Some(gate);
        }
    }
    None
}

/// Detect a parity definition of the pivot.
///
/// All `2^k` polarity combinations of the candidate clause must be present,
/// split between the two sides according to the parity of flipped literals.
fn xor_gate(
    pivot: Lit,
    pos: &[Vec<Lit>],
    neg: &[Vec<Lit>],
    clause_limit: usize,
) -> Option<Gate> {
    for (index, clause) in pos.iter().enumerate() {
        if clause.len() < 3 || clause.len() > clause_limit {
            continue;
        }

        let others: Vec<Lit> = clause.iter().cloned().filter(|&lit| lit != pivot).collect();
        let combos = 1usize << others.len();

        let mut pos_found = vec![false; pos.len()];
        let mut neg_found = vec![false; neg.len()];
        let mut is_gate = true;

        for mask in 0..combos {
            let parity_odd = (mask as u32).count_ones() % 2 == 1;
            let side_pivot = pivot ^ parity_odd;
            let mut candidate: Vec<Lit> = others
                .iter()
                .enumerate()
                .map(|(bit, &lit)| lit ^ (mask >> bit & 1 == 1))
                .collect();
            candidate.push(side_pivot);
            candidate.sort_unstable();

            let found = if parity_odd {
                find_clause(neg, &candidate).map(|found| neg_found[found] = true)
            } else {
                find_clause(pos, &candidate).map(|found| pos_found[found] = true)
            };

            if found.is_none() {
                is_gate = false;
                break;
            }
        }

        if is_gate {
            debug_assert!(pos_found[index]);
            return Some(Gate {
                pos_gate: pos_found,
                neg_gate: neg_found,
            });
        }
    }
    None
}

/// Detect `pivot = (c ? t : e)`.
///
/// The four defining clauses are `(¬p ¬c t)`, `(¬p c e)`, `(p ¬c ¬t)` and
/// `(p c ¬e)`.
fn ite_gate(pivot: Lit, pos: &[Vec<Lit>], neg: &[Vec<Lit>]) -> Option<Gate> {
    // Scan pairs of ternary clauses containing the negated pivot whose other
    // literals contain complementary condition candidates.
    for (first, clause_a) in neg.iter().enumerate() {
        if clause_a.len() != 3 {
            continue;
        }
        for (second, clause_b) in neg.iter().enumerate().skip(first + 1) {
            if clause_b.len() != 3 {
                continue;
            }

            let a_lits: Vec<Lit> = clause_a
                .iter()
                .cloned()
                .filter(|&lit| lit != !pivot)
                .collect();
            let b_lits: Vec<Lit> = clause_b
                .iter()
                .cloned()
                .filter(|&lit| lit != !pivot)
                .collect();

            for &not_cond in a_lits.iter() {
                if !b_lits.contains(&!not_cond) {
                    continue;
                }
                let then_lit = a_lits.iter().cloned().find(|&lit| lit != not_cond);
                let else_lit = b_lits.iter().cloned().find(|&lit| lit != !not_cond);
                let (then_lit, else_lit) = match (then_lit, else_lit) {
                    (Some(then_lit), Some(else_lit)) => (then_lit, else_lit),
                    _ => continue,
                };

                let mut mirror_a = vec![pivot, not_cond, !then_lit];
                mirror_a.sort_unstable();
                let mut mirror_b = vec![pivot, !not_cond, !else_lit];
                mirror_b.sort_unstable();

                if let (Some(third), Some(fourth)) =
                    (find_clause(pos, &mirror_a), find_clause(pos, &mirror_b))
                {
                    let mut gate = Gate {
                        pos_gate: vec![false; pos.len()],
                        neg_gate: vec![false; neg.len()],
                    };
                    gate.neg_gate[first] = true;
                    gate.neg_gate[second] = true;
                    gate.pos_gate[third] = true;
                    gate.pos_gate[fourth] = true;
                    return Some(gate);
                }
            }
        }
    }
    None
}

/// Ask the embedded eyas solver for a general definition.
///
/// The environment clauses with the pivot removed are unsatisfiable exactly
/// when the pivot is defined by its environment; the unsatisfiable core
/// names the defining clauses.
fn definition_gate(
    pivot: Lit,
    pos: &[Vec<Lit>],
    neg: &[Vec<Lit>],
    effort: u64,
) -> Option<Gate> {
    let mut eyas = Eyas::new(effort);
    let mut env = vec![];

    for clause in pos.iter() {
        let reduced: Vec<Lit> = clause.iter().cloned().filter(|&lit| lit != pivot).collect();
        if reduced.is_empty() {
            return None;
        }
        env.push(reduced);
    }
    let pos_count = env.len();
    for clause in neg.iter() {
        let reduced: Vec<Lit> = clause
            .iter()
            .cloned()
            .filter(|&lit| lit != !pivot)
            .collect();
        if reduced.is_empty() {
            return None;
        }
        env.push(reduced);
    }

    for clause in env.iter() {
        eyas.add_clause(clause);
    }

    if eyas.solve() != Some(false) {
        return None;
    }

    let mut gate = Gate {
        pos_gate: vec![false; pos.len()],
        neg_gate: vec![false; neg.len()],
    };
    for id in eyas.core() {
        let id = id as usize;
        if id < pos_count {
            gate.pos_gate[id] = true;
        } else {
            gate.neg_gate[id - pos_count] = true;
        }
    }

    Some(gate)
}

#[cfg(test)]
mod tests {
    use super::*;

    use kestrel_formula::lits;

    fn sorted(clauses: &[&[Lit]]) -> Vec<Vec<Lit>> {
        clauses
            .iter()
            .map(|clause| {
                let mut clause = clause.to_vec();
                clause.sort_unstable();
                clause
            })
            .collect()
    }

    #[test]
    fn finds_and_gate() {
        let pivot = lits![1][0];
        // 1 = AND(2, 3)
        let pos = sorted(&[&lits![1, -2, -3], &lits![1, 4, 5]]);
        let neg = sorted(&[&lits![-1, 2], &lits![-1, 3], &lits![-1, 6, 7]]);

        let gate = extract_gate(pivot, &pos, &neg, 5, false, 0).unwrap();
        assert_eq!(gate.pos_gate, vec![true, false]);
        assert_eq!(gate.neg_gate, vec![true, true, false]);
    }

    #[test]
    fn finds_equivalence() {
        let pivot = lits![1][0];
        // 1 = 2
        let pos = sorted(&[&lits![1, -2]]);
        let neg = sorted(&[&lits![-1, 2]]);

        let gate = extract_gate(pivot, &pos, &neg, 5, false, 0).unwrap();
        assert_eq!(gate.pos_gate, vec![true]);
        assert_eq!(gate.neg_gate, vec![true]);
    }

    #[test]
    fn finds_xor_gate() {
        let pivot = lits![1][0];
        // 1 = 2 xor 3
        let pos = sorted(&[&lits![1, -2, 3], &lits![1, 2, -3]]);
        let neg = sorted(&[&lits![-1, 2, 3], &lits![-1, -2, -3]]);

        let gate = extract_gate(pivot, &pos, &neg, 5, false, 0).unwrap();
        assert!(gate.pos_gate.iter().all(|&in_gate| in_gate));
        assert!(gate.neg_gate.iter().all(|&in_gate| in_gate));
    }

    #[test]
    fn finds_ite_gate() {
        let pivot = lits![1][0];
        // 1 = 2 ? 3 : 4
        let pos = sorted(&[&lits![1, -2, -3], &lits![1, 2, -4]]);
        let neg = sorted(&[&lits![-1, -2, 3], &lits![-1, 2, 4]]);

        let gate = extract_gate(pivot, &pos, &neg, 5, false, 0).unwrap();
        assert!(gate.pos_gate.iter().all(|&in_gate| in_gate));
        assert!(gate.neg_gate.iter().all(|&in_gate| in_gate));
    }

    #[test]
    fn finds_definition() {
        let pivot = lits![1][0];
        // 1 = AND(2, 3) but written with a twist that defeats the syntactic
        // patterns: the long clause is split over an extra literal.
        let pos = sorted(&[&lits![1, -2, -3]]);
        let neg = sorted(&[&lits![-1, 2], &lits![-1, 3]]);

        // Without the AND pattern (pretend by disabling nothing) this is
        // still found syntactically, so check the eyas path directly.
        let gate = definition_gate(pivot, &pos, &neg, 10_000).unwrap();
        assert_eq!(gate.pos_gate, vec![true]);
        assert_eq!(gate.neg_gate, vec![true, true]);
    }

    #[test]
    fn rejects_non_gate() {
        let pivot = lits![1][0];
        let pos = sorted(&[&lits![1, 2, 3]]);
        let neg = sorted(&[&lits![-1, 4, 5]]);

        assert!(extract_gate(pivot, &pos, &neg, 5, true, 10_000).is_none());
    }
}
