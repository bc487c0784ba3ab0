//! DRAT proof emission.
//!
//! The ASCII format writes one clause per line, `d ` prefixed for deletions.
//! The binary format tags steps with an `a` or `d` byte and encodes each
//! literal as `2 * |l| + (l < 0)` in 7-bit little-endian groups with MSB
//! continuation, terminated by a zero byte.
use std::io::{self, Write};

use kestrel_formula::Lit;

use crate::ProofStep;

/// Prepares a proof step for DRAT writing
fn drat_step(
    step: &ProofStep,
    mut emit_drat_step: impl FnMut(bool, &[Lit]) -> io::Result<()>,
) -> io::Result<()> {
    match step {
        ProofStep::AtClause { clause, .. } => {
            emit_drat_step(true, clause)?;
        }
        ProofStep::UnitClauses(units) => {
            for &unit in units.iter() {
                emit_drat_step(true, &[unit])?;
            }
        }
        ProofStep::DeleteClause { clause, .. } => {
            emit_drat_step(false, clause)?;
        }
        ProofStep::End => (),
    }

    Ok(())
}

/// Writes a proof step in DRAT format
pub fn write_step<'s>(target: &mut impl Write, step: &'s ProofStep<'s>) -> io::Result<()> {
    drat_step(step, |add, clause| {
        if !add {
            target.write_all(b"d ")?;
        }
        write_literals(target, clause)?;
        Ok(())
    })
}

/// Writes a proof step in binary DRAT format
pub fn write_binary_step<'s>(target: &mut impl Write, step: &'s ProofStep<'s>) -> io::Result<()> {
    drat_step(step, |add, clause| {
        if add {
            target.write_all(b"a")?;
        } else {
            target.write_all(b"d")?;
        }
        write_binary_literals(target, clause)?;
        Ok(())
    })
}

/// Writes the literals of a clause for a step in a DRAT proof.
fn write_literals(target: &mut impl Write, literals: &[Lit]) -> io::Result<()> {
    for &lit in literals {
        itoa::write(&mut *target, lit.to_dimacs())?;
        target.write_all(b" ")?;
    }
    target.write_all(b"0\n")?;
    Ok(())
}

/// Writes the literals of a clause for a step in a binary DRAT proof.
fn write_binary_literals(target: &mut impl Write, literals: &[Lit]) -> io::Result<()> {
    for &lit in literals {
        let drat_code = lit.code() as u64 + 2;
        leb128::write::unsigned(target, drat_code)?;
    }
    target.write_all(&[0])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use kestrel_formula::lits;

    use crate::DeleteClauseProof;

    #[test]
    fn ascii_steps() {
        let mut buf = vec![];

        write_step(
            &mut buf,
            &ProofStep::AtClause {
                redundant: true,
                clause: &lits![1, -2, 3],
            },
        )
        .unwrap();
        write_step(
            &mut buf,
            &ProofStep::DeleteClause {
                clause: &lits![-4, 5],
                proof: DeleteClauseProof::Redundant,
            },
        )
        .unwrap();
        write_step(&mut buf, &ProofStep::AtClause {
            redundant: false,
            clause: &[],
        })
        .unwrap();

        assert_eq!(&buf[..], b"1 -2 3 0\nd -4 5 0\n0\n" as &[u8]);
    }

    #[test]
    fn binary_steps() {
        let mut buf = vec![];

        write_binary_step(
            &mut buf,
            &ProofStep::AtClause {
                redundant: true,
                clause: &lits![1, -2],
            },
        )
        .unwrap();
        write_binary_step(
            &mut buf,
            &ProofStep::DeleteClause {
                clause: &lits![63, -64],
                proof: DeleteClauseProof::Redundant,
            },
        )
        .unwrap();

        // 1 -> 2, -2 -> 5; 63 -> 126, -64 -> 129 = 0x81 0x01 in vbyte groups
        assert_eq!(
            &buf[..],
            &[b'a', 2, 5, 0, b'd', 126, 0x81, 0x01, 0][..]
        );
    }

    #[test]
    fn unit_steps() {
        let mut buf = vec![];

        write_step(&mut buf, &ProofStep::UnitClauses(&lits![2, -3])).unwrap();

        assert_eq!(&buf[..], b"2 0\n-3 0\n" as &[u8]);
    }
}
