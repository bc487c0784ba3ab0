//! Temporary data.
use kestrel_formula::Lit;

/// Temporary buffers used while checking single steps.
///
/// Kept in the context to avoid repeated allocations.
#[derive(Default)]
pub struct TmpData {
    pub tmp: Vec<Lit>,
}
