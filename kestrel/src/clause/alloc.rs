//! Clause allocator.
use std::mem::transmute;
use std::slice;

use kestrel_formula::lit::LitIdx;
use kestrel_formula::Lit;

use super::{Clause, ClauseHeader, HEADER_LEN};

/// Integer type used to store offsets into [`ClauseAlloc`]'s memory.
type ClauseOffset = u32;

/// Bump allocator for clause storage.
///
/// Clauses are allocated from a single continuous buffer. Clauses cannot be
/// freed individually. To reclaim space from deleted clauses, a new
/// `ClauseAlloc` is created and the remaining clauses are copied over.
///
/// When the `ClauseAlloc`'s buffer is full, it is reallocated using the
/// growing strategy of [`Vec`]. External references ([`ClauseRef`]) store an
/// offset into the `ClauseAlloc`'s memory and remain valid when the buffer is
/// grown.
///
/// Offsets are kept below 2^31 so that a reference together with a tag bit
/// fits into a single watchlist word.
///
/// **Safety**: Using the safe methods is always memory safe, even if
/// invariants of the clause storage are violated. Some places in this
/// codebase use the unsafe methods and expect users of the safe methods to
/// not violate these invariants. It is important that this does not leak
/// through the public API, i.e. crate external code using safe methods must
/// be unable to violate invariants expected for internal unsafe code.
#[derive(Default)]
pub struct ClauseAlloc {
    buffer: Vec<LitIdx>,
}

/// Largest supported buffer size in multiples of [`LitIdx`].
const MAX_BUFFER_SIZE: usize = 1 << 31;

impl ClauseAlloc {
    /// Create an empty clause allocator.
    pub fn new() -> ClauseAlloc {
        ClauseAlloc::default()
    }

    /// Create a clause allocator with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> ClauseAlloc {
        ClauseAlloc {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Allocate space for and add a new clause.
    ///
    /// Clauses have a minimal size of 3, as binary clauses live in the
    /// watchlists and unit clauses on the trail. This is enforced on the
    /// ClauseAlloc level to safely avoid extra bound checks when accessing
    /// the initial literals of a clause.
    ///
    /// The size of the header will be set to the size of the given slice. The
    /// returned [`ClauseRef`] can be used to access the new clause.
    pub fn add_clause(&mut self, mut header: ClauseHeader, lits: &[Lit]) -> ClauseRef {
        let offset = self.buffer.len();

        assert!(
            lits.len() >= 3,
            "ClauseAlloc can only store ternary and larger clauses"
        );

        assert!(
            offset + HEADER_LEN + lits.len() <= MAX_BUFFER_SIZE,
            "Exceeded ClauseAlloc's maximal buffer size"
        );

        header.set_len(lits.len());
        header.set_searched(2);

        self.buffer.extend_from_slice(&header.data);

        let lit_idx_slice = unsafe {
            // This is safe as Lit and LitIdx have the same representation
            slice::from_raw_parts(lits.as_ptr() as *const LitIdx, lits.len())
        };

        self.buffer.extend_from_slice(lit_idx_slice);

        ClauseRef {
            offset: offset as ClauseOffset,
        }
    }

    /// Access the header of a clause.
    pub fn header(&self, cref: ClauseRef) -> &ClauseHeader {
        let offset = cref.offset as usize;
        assert!(
            offset + HEADER_LEN <= self.buffer.len(),
            "ClauseRef out of bounds"
        );
        unsafe { self.header_unchecked(cref) }
    }

    /// Mutate the header of a clause.
    pub fn header_mut(&mut self, cref: ClauseRef) -> &mut ClauseHeader {
        let offset = cref.offset as usize;
        assert!(
            offset + HEADER_LEN <= self.buffer.len(),
            "ClauseRef out of bounds"
        );
        unsafe { self.header_unchecked_mut(cref) }
    }

    unsafe fn header_unchecked(&self, cref: ClauseRef) -> &ClauseHeader {
        let offset = cref.offset as usize;
        let header_pointer = self.buffer.as_ptr().add(offset) as *const ClauseHeader;
        &*header_pointer
    }

    unsafe fn header_unchecked_mut(&mut self, cref: ClauseRef) -> &mut ClauseHeader {
        let offset = cref.offset as usize;
        let header_pointer = self.buffer.as_mut_ptr().add(offset) as *mut ClauseHeader;
        &mut *header_pointer
    }

    /// Access a clause.
    pub fn clause(&self, cref: ClauseRef) -> &Clause {
        let header = self.header(cref);
        let len = header.len();

        let lit_offset = cref.offset as usize + HEADER_LEN;
        let lit_end = lit_offset + len;
        assert!(lit_end <= self.buffer.len(), "ClauseRef out of bounds");
        unsafe { self.clause_with_len_unchecked(cref, len) }
    }

    /// Mutate a clause.
    pub fn clause_mut(&mut self, cref: ClauseRef) -> &mut Clause {
        let header = self.header(cref);
        let len = header.len();

        let lit_offset = cref.offset as usize + HEADER_LEN;
        let lit_end = lit_offset + len;
        assert!(lit_end <= self.buffer.len(), "ClauseRef out of bounds");
        unsafe { self.clause_with_len_unchecked_mut(cref, len) }
    }

    /// The literals of a clause.
    pub fn lits(&self, cref: ClauseRef) -> &[Lit] {
        self.clause(cref).lits()
    }

    unsafe fn clause_with_len_unchecked(&self, cref: ClauseRef, len: usize) -> &Clause {
        let offset = cref.offset as usize;
        transmute::<&[LitIdx], &Clause>(slice::from_raw_parts(
            self.buffer.as_ptr().add(offset),
            len + HEADER_LEN,
        ))
    }

    unsafe fn clause_with_len_unchecked_mut(&mut self, cref: ClauseRef, len: usize) -> &mut Clause {
        let offset = cref.offset as usize;
        transmute::<&mut [LitIdx], &mut Clause>(slice::from_raw_parts_mut(
            self.buffer.as_mut_ptr().add(offset),
            len + HEADER_LEN,
        ))
    }

    /// Shrink a clause in place.
    ///
    /// The literals past the new length are abandoned in the buffer until the
    /// next garbage collection. Resets the searched position.
    pub fn shrink_clause(&mut self, cref: ClauseRef, new_len: usize) {
        let header = self.header_mut(cref);
        debug_assert!(new_len >= 3 && new_len <= header.len());
        header.set_len(new_len);
        header.set_searched(2);
    }

    /// Current buffer size in multiples of [`LitIdx`].
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }
}

/// Compact reference to a clause.
///
/// Used with [`ClauseAlloc`] to access the clause.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct ClauseRef {
    offset: ClauseOffset,
}

impl ClauseRef {
    /// The raw buffer offset, used to pack references into watchlist words.
    pub(crate) fn offset(self) -> u32 {
        self.offset
    }

    /// Recreate a reference from a raw buffer offset.
    pub(crate) fn from_offset(offset: u32) -> ClauseRef {
        ClauseRef { offset }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kestrel_formula::cnf::strategy::*;

    use proptest::*;

    proptest! {
        #[test]
        fn roundtrip_from_cnf_formula(input in cnf_formula(1..100usize, 0..1000, 3..30)) {

            let mut clause_alloc = ClauseAlloc::new();
            let mut clause_refs = vec![];

            for clause_lits in input.iter() {
                let header = ClauseHeader::new();
                clause_refs.push(clause_alloc.add_clause(header, clause_lits));
            }

            let mut recovered = kestrel_formula::CnfFormula::new();

            for cref in clause_refs {
                let clause = clause_alloc.clause(cref);
                prop_assert_eq!(clause.header().len(), clause.lits().len());
                prop_assert_eq!(clause.header().searched(), 2);
                recovered.add_clause(clause.lits());
            }

            // Ignore difference caused by unused vars
            recovered.set_var_count(input.var_count());

            prop_assert_eq!(input, recovered);
        }

        #[test]
        fn clause_shrinking(input in cnf_formula(1..100usize, 0..500, 4..30)) {

            let mut clause_alloc = ClauseAlloc::new();
            let mut clause_refs = vec![];

            for clause_lits in input.iter() {
                let header = ClauseHeader::new();
                clause_refs.push(clause_alloc.add_clause(header, clause_lits));
            }

            for &cref in clause_refs.iter() {
                let len = clause_alloc.header(cref).len();
                clause_alloc.header_mut(cref).set_searched(3);
                clause_alloc.shrink_clause(cref, len - 1);
            }

            for (&cref, lits) in clause_refs.iter().zip(input.iter()) {
                prop_assert_eq!(clause_alloc.clause(cref).lits(), &lits[..lits.len() - 1]);
                prop_assert_eq!(clause_alloc.header(cref).searched(), 2);
            }
        }
    }
}
