//! Clause storage of the checker.
use partial_ref::{partial, PartialRef};
use rustc_hash::FxHashMap as HashMap;
use smallvec::SmallVec;

use kestrel_formula::Lit;
use kestrel_internal_proof::{clause_hash, ClauseHash};

use crate::context::{parts::*, Context};
use crate::propagate::propagate;

/// Metadata and literal range of a stored clause.
pub struct StoredClause {
    hash: ClauseHash,
    offset: u32,
    len: u32,
    /// How often the clause is present as irredundant resp. redundant clause.
    ///
    /// The checked formula is a multiset of clauses, as the generating solver
    /// might not detect duplicated clauses.
    ref_count: [u32; 2],
    garbage: bool,
}

impl StoredClause {
    fn range(&self) -> std::ops::Range<usize> {
        self.offset as usize..(self.offset + self.len) as usize
    }
}

/// Clause storage of the checker.
///
/// All non-tautological clauses of the current formula are stored in a single
/// literal buffer, indexed by a hash table over their sorted literals. Unit
/// clauses additionally become permanent assignments of the propagation
/// engine; unit deletions are ignored (matching common DRAT checking
/// practice), so the permanent trail only ever grows.
#[derive(Default)]
pub struct Clauses {
    literal_buffer: Vec<Lit>,
    garbage_size: usize,
    clauses: Vec<StoredClause>,
    by_hash: HashMap<ClauseHash, SmallVec<[u32; 2]>>,
}

/// Outcome of storing a clause.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum StoreOutcome {
    /// The clause was added and both watches are in place.
    New,
    /// The clause was already present, a reference count was incremented.
    Duplicate,
    /// The clause is falsified by the permanent assignment.
    Conflict,
}

impl Clauses {
    /// The literals of a stored clause.
    pub fn lits(&self, idx: u32) -> &[Lit] {
        &self.literal_buffer[self.clauses[idx as usize].range()]
    }

    /// Mutable access to the literals of a stored clause.
    ///
    /// The propagation engine uses this to keep the watched literals in the
    /// first two positions.
    pub fn lits_mut(&mut self, idx: u32) -> &mut [Lit] {
        let range = self.clauses[idx as usize].range();
        &mut self.literal_buffer[range]
    }

    /// Find a stored live clause with exactly the given literals.
    ///
    /// `lits` must be sorted and free of duplicates; stored clauses are
    /// compared as sets.
    pub fn find(&self, lits: &[Lit]) -> Option<u32> {
        let hash = clause_hash(lits);
        let bucket = self.by_hash.get(&hash)?;
        for &idx in bucket.iter() {
            let clause = &self.clauses[idx as usize];
            if clause.garbage {
                continue;
            }
            let mut stored: SmallVec<[Lit; 8]> =
                self.literal_buffer[clause.range()].iter().cloned().collect();
            stored.sort_unstable();
            if &stored[..] == lits {
                return Some(idx);
            }
        }
        None
    }

    /// Iterate over the indices of all live clauses.
    pub fn live_clauses(&self) -> impl Iterator<Item = u32> + '_ {
        self.clauses
            .iter()
            .enumerate()
            .filter(|(_, clause)| !clause.garbage)
            .map(|(idx, _)| idx as u32)
    }

    fn collect_garbage(&mut self) {
        if self.garbage_size * 2 <= self.literal_buffer.len() {
            return;
        }

        let mut new_buffer = Vec::with_capacity(self.literal_buffer.len() - self.garbage_size);

        for clause in self.clauses.iter_mut() {
            if clause.garbage {
                continue;
            }
            let offset = new_buffer.len() as u32;
            new_buffer.extend_from_slice(&self.literal_buffer[clause.range()]);
            clause.offset = offset;
        }

        self.literal_buffer = new_buffer;
        self.garbage_size = 0;
    }
}

/// Store a clause and set up its watches and permanent assignments.
///
/// `lits` must be sorted and free of duplicates. The caller is responsible
/// for having established redundancy (RUP) of the clause beforehand.
pub fn store_clause(
    mut ctx: partial!(Context, mut CheckerStateP, mut ClausesP, mut PropagatorP),
    lits: &[Lit],
    redundant: bool,
) -> StoreOutcome {
    if lits.is_empty() {
        ctx.part_mut(CheckerStateP).unsat = true;
        return StoreOutcome::New;
    }

    for &lit in lits.iter() {
        ctx.part_mut(PropagatorP).ensure_var_count(lit.index() + 1);
    }

    if let Some(idx) = ctx.part(ClausesP).find(lits) {
        let clauses = ctx.part_mut(ClausesP);
        let ref_count = &mut clauses.clauses[idx as usize].ref_count[redundant as usize];
        *ref_count = ref_count.checked_add(1).expect("ref_count overflow");
        return StoreOutcome::Duplicate;
    }

    let (clauses, mut ctx) = ctx.split_part_mut(ClausesP);
    let (prop, mut ctx) = ctx.split_part_mut(PropagatorP);

    let idx = clauses.clauses.len() as u32;
    let offset = clauses.literal_buffer.len() as u32;
    clauses.literal_buffer.extend_from_slice(lits);

    let mut ref_count = [0, 0];
    ref_count[redundant as usize] += 1;

    clauses.clauses.push(StoredClause {
        hash: clause_hash(lits),
        offset,
        len: lits.len() as u32,
        ref_count,
        garbage: false,
    });

    clauses
        .by_hash
        .entry(clause_hash(lits))
        .or_default()
        .push(idx);

    if lits.len() == 1 {
        match prop.value(lits[0]) {
            0 => prop.assign(lits[0]),
            v if v < 0 => {
                ctx.part_mut(CheckerStateP).unsat = true;
                return StoreOutcome::Conflict;
            }
            _ => (),
        }
        return StoreOutcome::New;
    }

    // Move two non-false literals into the watched positions if possible.
    let stored = clauses.lits_mut(idx);
    let mut filled = 0;
    for pos in 0..stored.len() {
        if prop.value(stored[pos]) >= 0 {
            stored.swap(filled, pos);
            filled += 1;
            if filled == 2 {
                break;
            }
        }
    }

    let watch_0 = stored[0];
    let watch_1 = stored[1];
    prop.add_watch(watch_0, idx);
    prop.add_watch(watch_1, idx);

    match filled {
        0 => {
            ctx.part_mut(CheckerStateP).unsat = true;
            StoreOutcome::Conflict
        }
        1 => {
            if prop.value(watch_0) == 0 {
                prop.assign(watch_0);
            }
            StoreOutcome::New
        }
        _ => StoreOutcome::New,
    }
}

/// Propagate the permanent assignment to a fixed point.
///
/// Called after storing clauses that assigned new permanent units. On
/// conflict the checker state becomes unsat.
pub fn propagate_permanent(
    mut ctx: partial!(Context, mut CheckerStateP, mut ClausesP, mut PropagatorP),
) {
    if propagate(ctx.borrow()) {
        ctx.part_mut(CheckerStateP).unsat = true;
    }
}

/// Outcome of deleting a clause.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum DeleteOutcome {
    /// The last copy was removed and its watches cleaned up.
    Removed,
    /// Another copy remains, only a reference count was decremented.
    Unchanged,
    /// The clause was not found or the requested copy is not present.
    NotFound,
    /// Unit and empty clause deletions are ignored.
    Ignored,
}

/// Delete one stored copy of a clause.
///
/// `lits` must be sorted and free of duplicates.
pub fn delete_clause(
    mut ctx: partial!(Context, mut ClausesP, mut PropagatorP),
    lits: &[Lit],
    redundant: bool,
) -> DeleteOutcome {
    if lits.len() < 2 {
        return DeleteOutcome::Ignored;
    }

    let idx = match ctx.part(ClausesP).find(lits) {
        Some(idx) => idx,
        None => return DeleteOutcome::NotFound,
    };

    let (clauses, mut ctx) = ctx.split_part_mut(ClausesP);
    let clause = &mut clauses.clauses[idx as usize];

    if clause.ref_count[redundant as usize] == 0 {
        return DeleteOutcome::NotFound;
    }
    clause.ref_count[redundant as usize] -= 1;

    if clause.ref_count != [0, 0] {
        return DeleteOutcome::Unchanged;
    }

    clause.garbage = true;
    let hash = clause.hash;
    let len = clause.len as usize;
    let range = clause.range();

    let prop = ctx.part_mut(PropagatorP);
    prop.remove_watch(clauses.literal_buffer[range.start], idx);
    prop.remove_watch(clauses.literal_buffer[range.start + 1], idx);

    let bucket = clauses.by_hash.get_mut(&hash).expect("missing hash bucket");
    let pos = bucket
        .iter()
        .position(|&entry| entry == idx)
        .expect("missing hash entry");
    bucket.swap_remove(pos);
    if bucket.is_empty() {
        clauses.by_hash.remove(&hash);
    }

    clauses.garbage_size += len;
    clauses.collect_garbage();

    DeleteOutcome::Removed
}
