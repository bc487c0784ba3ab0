//! Utilities for working with sorted slices of literals.
use kestrel_formula::Lit;

/// Sort literals, remove duplicates and check for tautologic clauses.
///
/// Returns true if the clause is a tautology.
pub fn copy_canonical(target: &mut Vec<Lit>, src: &[Lit]) -> bool {
    target.clear();
    target.extend_from_slice(src);
    target.sort_unstable();
    target.dedup();

    let mut last = None;

    target.iter().any(|&lit| {
        let tautology = last == Some(!lit);
        last = Some(lit);
        tautology
    })
}

/// Test whether a set of literals is a (strict) subset of another set of
/// literals.
///
/// Both slices must be sorted and free of duplicates.
pub fn is_subset(subset: &[Lit], superset: &[Lit], strict: bool) -> bool {
    // We set strict to false if we already know that the sets are not equal.
    let strict = strict && subset.len() == superset.len();
    let mut superset_iter = superset.iter();

    for &sub_lit in subset.iter() {
        loop {
            match superset_iter.next() {
                None => return false,
                Some(&super_lit) => {
                    if super_lit == sub_lit {
                        break;
                    } else if super_lit > sub_lit {
                        return false;
                    }
                }
            }
        }
    }

    !strict
}

#[cfg(test)]
mod tests {
    use super::*;

    use kestrel_formula::lits;

    #[test]
    fn canonical() {
        let mut buf = vec![];

        assert!(!copy_canonical(&mut buf, &lits![3, 1, 3, -2]));
        assert_eq!(&buf[..], &lits![1, -2, 3]);

        assert!(copy_canonical(&mut buf, &lits![3, 1, -3, -2]));
    }

    #[test]
    fn subsets() {
        assert!(is_subset(&lits![1, -2], &lits![1, -2, 3], true));
        assert!(is_subset(&lits![1, -2], &lits![1, -2], false));
        assert!(!is_subset(&lits![1, -2], &lits![1, -2], true));
        assert!(!is_subset(&lits![1, 2], &lits![1, -2, 3], true));
    }
}
