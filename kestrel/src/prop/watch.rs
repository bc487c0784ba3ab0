//! Watchlists for binary and long clauses.
//!
//! Each list is a flat buffer of tagged 32-bit words. A binary clause is
//! stored as a single word in the lists of both its literals, carrying the
//! other literal and two flag bits. A long clause in sparse mode occupies two
//! consecutive words: a blocking literal followed by the raw clause
//! reference. The low bit of the first word distinguishes the two shapes, so
//! iteration steps by one word for binary entries and two words for long
//! entries.
//!
//! In sparse mode each long clause is watched by exactly two of its literals
//! and the watched literals are kept in positions 0 and 1 of the clause.
//! When a clause is not unit under the current assignment, the watched
//! literals point at two non-false literals. There is no need to update
//! watchlists on backtracking, as unassigning literals cannot invalidate
//! that invariant.
//!
//! The blocking literal is some other literal of the clause. When it is
//! already true the clause is satisfied and the propagator does not need to
//! touch the clause memory at all.
//!
//! In dense mode the lists instead hold *every* literal occurrence of every
//! live clause: binary words stay unchanged and long clauses contribute one
//! single tagged reference word per literal. The inprocessing passes use
//! dense mode as occurrence lists and the propagation invariants are
//! suspended until [`rewatch_all`](crate::clause::db::rewatch_all) restores
//! sparse mode.
use kestrel_formula::Lit;

use crate::clause::ClauseRef;

const BINARY_TAG: u32 = 1;
const BINARY_REDUNDANT: u32 = 2;
const BINARY_HYPER: u32 = 4;
const BINARY_LIT_SHIFT: u32 = 3;
const LARGE_LIT_SHIFT: u32 = 1;

/// Pack a binary clause entry.
pub fn binary_word(other: Lit, redundant: bool, hyper: bool) -> u32 {
    ((other.code() as u32) << BINARY_LIT_SHIFT)
        | ((hyper as u32) * BINARY_HYPER)
        | ((redundant as u32) * BINARY_REDUNDANT)
        | BINARY_TAG
}

/// Whether a watchlist word is a binary entry.
pub fn is_binary_word(word: u32) -> bool {
    word & BINARY_TAG != 0
}

/// The other literal of a binary entry.
pub fn binary_word_other(word: u32) -> Lit {
    Lit::from_code((word >> BINARY_LIT_SHIFT) as usize)
}

/// Whether the binary clause of an entry is redundant.
pub fn binary_word_redundant(word: u32) -> bool {
    word & BINARY_REDUNDANT != 0
}

/// Whether the binary clause of an entry is a hyper binary resolvent.
pub fn binary_word_hyper(word: u32) -> bool {
    word & BINARY_HYPER != 0
}

/// Pack the blocking literal word of a sparse long entry.
pub fn blocking_word(blocking: Lit) -> u32 {
    (blocking.code() as u32) << LARGE_LIT_SHIFT
}

/// The blocking literal of a sparse long entry.
pub fn blocking_word_lit(word: u32) -> Lit {
    Lit::from_code((word >> LARGE_LIT_SHIFT) as usize)
}

/// Pack the single word of a dense long occurrence.
pub fn dense_word(cref: ClauseRef) -> u32 {
    debug_assert!(cref.offset() < (1 << 31));
    cref.offset() << 1
}

/// The clause of a dense long occurrence.
pub fn dense_word_cref(word: u32) -> ClauseRef {
    ClauseRef::from_offset(word >> 1)
}

/// A decoded watchlist entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WatchEntry {
    Binary {
        other: Lit,
        redundant: bool,
        hyper: bool,
    },
    Large {
        /// The blocking literal in sparse mode, the watched literal itself in
        /// dense mode.
        blocking: Lit,
        cref: ClauseRef,
    },
}

/// Watchlists for binary and long clauses.
#[derive(Default)]
pub struct Watchlists {
    lists: Vec<Vec<u32>>,
    dense: bool,
    /// Number of live irredundant binary clauses.
    pub irredundant_binary: usize,
    /// Number of live redundant binary clauses.
    pub redundant_binary: usize,
}

impl Watchlists {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.lists.resize(count * 2, vec![]);
    }

    /// Whether the lists currently hold full occurrences.
    pub fn dense(&self) -> bool {
        self.dense
    }

    pub fn set_dense(&mut self, dense: bool) {
        self.dense = dense;
    }

    /// Raw words watched by a literal.
    pub fn words(&self, lit: Lit) -> &[u32] {
        &self.lists[lit.code()]
    }

    /// Detach the raw words of a literal for in-place compaction.
    pub fn take_words(&mut self, lit: Lit) -> Vec<u32> {
        std::mem::take(&mut self.lists[lit.code()])
    }

    /// Reattach the raw words of a literal.
    ///
    /// Entries pushed while the list was detached (a hyper binary resolvent
    /// can involve the propagated literal itself) are kept.
    pub fn put_words(&mut self, lit: Lit, mut words: Vec<u32>) {
        let list = &mut self.lists[lit.code()];
        if !list.is_empty() {
            words.extend_from_slice(list);
        }
        *list = words;
    }

    /// Push a raw word onto a literal's list.
    pub fn push_word(&mut self, lit: Lit, word: u32) {
        self.lists[lit.code()].push(word);
    }

    /// Add a new binary clause to the lists of both its literals.
    pub fn watch_binary_clause(&mut self, lits: [Lit; 2], redundant: bool, hyper: bool) {
        for i in 0..2 {
            self.lists[lits[i].code()].push(binary_word(lits[i ^ 1], redundant, hyper));
        }
        if redundant {
            self.redundant_binary += 1;
        } else {
            self.irredundant_binary += 1;
        }
    }

    /// Start watching a long clause.
    ///
    /// `lits` have to be the first two literals of the given clause.
    pub fn watch_clause(&mut self, cref: ClauseRef, lits: [Lit; 2]) {
        debug_assert!(!self.dense);
        for i in 0..2 {
            self.add_large_watch(lits[i], lits[i ^ 1], cref);
        }
    }

    /// Make a literal watch a long clause.
    pub fn add_large_watch(&mut self, lit: Lit, blocking: Lit, cref: ClauseRef) {
        let list = &mut self.lists[lit.code()];
        list.push(blocking_word(blocking));
        list.push(cref.offset());
    }

    /// Stop watching a long clause with the given literal.
    pub fn unwatch_large(&mut self, lit: Lit, cref: ClauseRef) {
        let list = &mut self.lists[lit.code()];
        let mut read = 0;
        let mut write = 0;
        let mut found = false;
        while read < list.len() {
            let word = list[read];
            if is_binary_word(word) {
                list[write] = word;
                read += 1;
                write += 1;
            } else {
                if !found && list[read + 1] == cref.offset() {
                    found = true;
                    read += 2;
                } else {
                    list[write] = word;
                    list[write + 1] = list[read + 1];
                    read += 2;
                    write += 2;
                }
            }
        }
        debug_assert!(found, "unwatch_large for clause that is not watched");
        list.truncate(write);
    }

    /// Remove one binary entry from a literal's list.
    ///
    /// Returns whether the removed clause was redundant.
    pub fn unwatch_binary(&mut self, lit: Lit, other: Lit) -> bool {
        let list = &mut self.lists[lit.code()];
        let mut pos = 0;
        while pos < list.len() {
            let word = list[pos];
            if is_binary_word(word) {
                if binary_word_other(word) == other {
                    let redundant = binary_word_redundant(word);
                    list.remove(pos);
                    return redundant;
                }
                pos += 1;
            } else {
                pos += 2;
            }
        }
        panic!("unwatch_binary for clause that is not watched");
    }

    /// Remove a binary clause from both lists and update the counts.
    pub fn remove_binary_clause(&mut self, lits: [Lit; 2]) -> bool {
        let redundant = self.unwatch_binary(lits[0], lits[1]);
        self.unwatch_binary(lits[1], lits[0]);
        if redundant {
            self.redundant_binary -= 1;
        } else {
            self.irredundant_binary -= 1;
        }
        redundant
    }

    /// Record a long clause occurrence in dense mode.
    pub fn connect_occurrence(&mut self, lit: Lit, cref: ClauseRef) {
        debug_assert!(self.dense);
        self.lists[lit.code()].push(dense_word(cref));
    }

    /// Remove a long clause occurrence in dense mode.
    pub fn disconnect_occurrence(&mut self, lit: Lit, cref: ClauseRef) {
        debug_assert!(self.dense);
        let list = &mut self.lists[lit.code()];
        let word = dense_word(cref);
        if let Some(pos) = list.iter().position(|&entry| entry == word) {
            list.swap_remove(pos);
        }
    }

    /// Number of entries in a literal's list.
    ///
    /// In dense mode this is the number of occurrences of the literal.
    pub fn occurrence_count(&self, lit: Lit) -> usize {
        let words = &self.lists[lit.code()];
        let mut count = 0;
        let mut pos = 0;
        while pos < words.len() {
            count += 1;
            pos += self.entry_width(words[pos]);
        }
        count
    }

    fn entry_width(&self, word: u32) -> usize {
        if is_binary_word(word) || self.dense {
            1
        } else {
            2
        }
    }

    /// Iterate over the decoded entries of a literal's list.
    pub fn entries<'a>(&'a self, lit: Lit) -> WatchIter<'a> {
        WatchIter {
            words: &self.lists[lit.code()],
            pos: 0,
            dense: self.dense,
            lit,
        }
    }

    /// Drop all large entries, keeping binary clauses.
    pub fn retain_binary(&mut self) {
        let dense = self.dense;
        for list in self.lists.iter_mut() {
            let mut read = 0;
            let mut write = 0;
            while read < list.len() {
                let word = list[read];
                if is_binary_word(word) {
                    list[write] = word;
                    write += 1;
                    read += 1;
                } else {
                    read += if dense { 1 } else { 2 };
                }
            }
            list.truncate(write);
        }
    }

}

/// Iterator over the decoded entries of one watchlist.
pub struct WatchIter<'a> {
    words: &'a [u32],
    pos: usize,
    dense: bool,
    lit: Lit,
}

impl<'a> Iterator for WatchIter<'a> {
    type Item = WatchEntry;

    fn next(&mut self) -> Option<WatchEntry> {
        if self.pos >= self.words.len() {
            return None;
        }
        let word = self.words[self.pos];
        if is_binary_word(word) {
            self.pos += 1;
            Some(WatchEntry::Binary {
                other: binary_word_other(word),
                redundant: binary_word_redundant(word),
                hyper: binary_word_hyper(word),
            })
        } else if self.dense {
            self.pos += 1;
            Some(WatchEntry::Large {
                blocking: self.lit,
                cref: dense_word_cref(word),
            })
        } else {
            let cref = ClauseRef::from_offset(self.words[self.pos + 1]);
            self.pos += 2;
            Some(WatchEntry::Large {
                blocking: blocking_word_lit(word),
                cref,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kestrel_formula::lits;

    #[test]
    fn word_packing() {
        let other = Lit::from_dimacs(-17);
        for &redundant in &[false, true] {
            for &hyper in &[false, true] {
                let word = binary_word(other, redundant, hyper);
                assert!(is_binary_word(word));
                assert_eq!(binary_word_other(word), other);
                assert_eq!(binary_word_redundant(word), redundant);
                assert_eq!(binary_word_hyper(word), hyper);
            }
        }

        let blocking = Lit::from_dimacs(5);
        let word = blocking_word(blocking);
        assert!(!is_binary_word(word));
        assert_eq!(blocking_word_lit(word), blocking);

        let cref = ClauseRef::from_offset(12345);
        let word = dense_word(cref);
        assert!(!is_binary_word(word));
        assert_eq!(dense_word_cref(word), cref);
    }

    #[test]
    fn mixed_lists() {
        let mut watchlists = Watchlists::default();
        watchlists.set_var_count(10);

        let lits = lits![1, 2];
        let cref_a = ClauseRef::from_offset(100);
        let cref_b = ClauseRef::from_offset(200);

        watchlists.watch_binary_clause(lits, false, false);
        watchlists.watch_clause(cref_a, lits);
        watchlists.watch_clause(cref_b, [lits[1], lits[0]]);

        let entries: Vec<_> = watchlists.entries(lits[0]).collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0],
            WatchEntry::Binary {
                other: lits[1],
                redundant: false,
                hyper: false
            }
        );
        assert_eq!(
            entries[1],
            WatchEntry::Large {
                blocking: lits[1],
                cref: cref_a
            }
        );

        watchlists.unwatch_large(lits[0], cref_a);
        let entries: Vec<_> = watchlists.entries(lits[0]).collect();
        assert_eq!(entries.len(), 2);

        assert_eq!(watchlists.irredundant_binary, 1);
        watchlists.remove_binary_clause(lits);
        assert_eq!(watchlists.irredundant_binary, 0);
        let entries: Vec<_> = watchlists.entries(lits[0]).collect();
        assert_eq!(entries.len(), 1);
    }
}
