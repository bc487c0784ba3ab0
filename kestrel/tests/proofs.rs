//! Tests of the emitted DRAT proofs.
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use kestrel::{ProofFormat, Solver};

/// A writer handing out shared access to its buffer.
#[derive(Clone, Default)]
struct SharedBuffer {
    buffer: Rc<RefCell<Vec<u8>>>,
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buffer.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn drat_proof_ends_with_empty_clause() {
    let buffer = SharedBuffer::default();

    let mut solver = Solver::new();
    solver.write_proof(buffer.clone(), ProofFormat::Drat);

    solver
        .add_dimacs_cnf(b"p cnf 1 2\n1 0\n-1 0\n" as &[u8])
        .unwrap();
    assert_eq!(solver.solve(), Some(false));

    solver.close_proof();

    let proof = buffer.buffer.borrow();
    let proof = std::str::from_utf8(&proof).unwrap();

    assert!(proof.ends_with("0\n"));

    // The last added clause must be the empty clause.
    let last_addition = proof
        .lines()
        .rev()
        .find(|line| !line.starts_with("d "))
        .unwrap();
    assert_eq!(last_addition, "0");
}

#[test]
fn drat_proof_for_pigeon_hole() {
    let buffer = SharedBuffer::default();

    let mut solver = Solver::new();
    solver.write_proof(buffer.clone(), ProofFormat::Drat);
    solver.enable_self_checking();

    let mut input = String::from("p cnf 12 22\n");
    for pigeon in 0..4 {
        for hole in 0..3 {
            input.push_str(&format!("{} ", pigeon * 3 + hole + 1));
        }
        input.push_str("0\n");
    }
    for hole in 0..3 {
        for pigeon_a in 0..4 {
            for pigeon_b in 0..pigeon_a {
                input.push_str(&format!(
                    "-{} -{} 0\n",
                    pigeon_a * 3 + hole + 1,
                    pigeon_b * 3 + hole + 1
                ));
            }
        }
    }

    solver.add_dimacs_cnf(input.as_bytes()).unwrap();
    assert_eq!(solver.solve(), Some(false));

    solver.close_proof();

    let proof = buffer.buffer.borrow();
    let proof = std::str::from_utf8(&proof).unwrap();

    assert!(!proof.is_empty());
    assert!(proof.lines().all(|line| line.ends_with(" 0") || line == "0"));
    assert_eq!(
        proof
            .lines()
            .rev()
            .find(|line| !line.starts_with("d "))
            .unwrap(),
        "0"
    );
}

#[test]
fn binary_drat_proof_is_parseable() {
    let buffer = SharedBuffer::default();

    let mut solver = Solver::new();
    solver.write_proof(buffer.clone(), ProofFormat::BinaryDrat);

    solver
        .add_dimacs_cnf(b"p cnf 2 4\n1 2 0\n1 -2 0\n-1 2 0\n-1 -2 0\n" as &[u8])
        .unwrap();
    assert_eq!(solver.solve(), Some(false));

    solver.close_proof();

    let proof = buffer.buffer.borrow();

    // Every step starts with 'a' or 'd' and is terminated by a zero byte,
    // with all literal bytes nonzero.
    let mut rest = &proof[..];
    let mut steps = 0;
    let mut saw_empty_addition = false;
    while !rest.is_empty() {
        assert!(rest[0] == b'a' || rest[0] == b'd');
        let end = rest
            .iter()
            .position(|&byte| byte == 0)
            .expect("unterminated binary step");
        if rest[0] == b'a' && end == 1 {
            saw_empty_addition = true;
        }
        rest = &rest[end + 1..];
        steps += 1;
    }

    assert!(steps > 0);
    assert!(saw_empty_addition);
}
