//! Proof generation.
use std::io::{sink, BufWriter, Write};

use kestrel_formula::Lit;
use kestrel_internal_proof::{drat, ProofStep};

use kestrel_checker::Checker;

/// Proof formats that can be generated during solving.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ProofFormat {
    Drat,
    BinaryDrat,
}

/// Proof generation.
///
/// Every mutation of the clause database is traced here. The steps are
/// written to the proof file (when one is set) and replayed by the embedded
/// checker (when self checking is enabled). A failing check or a failing
/// write aborts the process: both mean the solver derived something it
/// cannot justify, and continuing would produce an unusable result.
pub struct Proof<'a> {
    format: Option<ProofFormat>,
    target: BufWriter<Box<dyn Write + 'a>>,
    checker: Option<Checker>,
}

impl<'a> Default for Proof<'a> {
    fn default() -> Proof<'a> {
        Proof {
            format: None,
            target: BufWriter::new(Box::new(sink())),
            checker: None,
        }
    }
}

impl<'a> Proof<'a> {
    /// Start writing proof steps to the given target with the given format.
    pub fn write_proof(&mut self, target: impl Write + 'a, format: ProofFormat) {
        self.format = Some(format);
        self.target = BufWriter::new(Box::new(target))
    }

    /// Stop writing proof steps.
    pub fn close_proof(&mut self) {
        // We need to explicitly flush to handle IO errors.
        let result = self.target.flush();
        self.handle_io_errors(result);
        self.format = None;
        self.target = BufWriter::new(Box::new(sink()));
    }

    /// Begin checking proof steps with the embedded checker.
    pub fn begin_checking(&mut self) {
        if self.checker.is_none() {
            self.checker = Some(Checker::new())
        }
    }

    /// Whether clause database mutations need to be traced.
    pub fn is_active(&self) -> bool {
        self.checker.is_some() || self.format.is_some()
    }

    /// The embedded checker, when self checking is enabled.
    pub fn checker_mut(&mut self) -> Option<&mut Checker> {
        self.checker.as_mut()
    }

    /// Call when adding an original clause.
    ///
    /// This is ignored for proof files but required for on-the-fly checking.
    pub fn add_original_clause(&mut self, clause: &[Lit]) {
        if let Some(checker) = &mut self.checker {
            if let Err(err) = checker.add_clause(clause) {
                panic!("proof checking failed: {}", err);
            }
        }
    }

    /// Add a step to the proof.
    ///
    /// Ignored when proof generation is disabled.
    pub fn add_step(&mut self, step: &ProofStep) {
        match self.format {
            None => (),
            Some(ProofFormat::Drat) => {
                let result = drat::write_step(&mut self.target, step);
                self.handle_io_errors(result);
            }
            Some(ProofFormat::BinaryDrat) => {
                let result = drat::write_binary_step(&mut self.target, step);
                self.handle_io_errors(result);
            }
        }
        if let Some(checker) = &mut self.checker {
            if let Err(err) = checker.check_step(step) {
                panic!("proof checking failed: {}", err);
            }
        }
    }

    /// Handles IO errors.
    ///
    /// An unwritable proof is as fatal as a failed check, so this aborts.
    fn handle_io_errors<V, E: std::fmt::Debug>(&self, result: Result<V, E>) -> Option<V> {
        Some(result.expect("unable to write to proof file"))
    }
}
