//! The move-to-front branching queue used in focused mode.
//!
//! Variables live in a doubly-linked list ordered by the time they were last
//! bumped. Each node carries a monotonically increasing stamp of its last
//! enqueue. Decisions pick the unassigned variable with the largest stamp. A
//! cached search cursor avoids rescanning the front of the queue: it always
//! points at a position whose stamp is at least as large as every unassigned
//! variable's stamp, and is refreshed when variables are returned to the
//! queue during backtracking.
use kestrel_formula::Var;

use crate::prop::Assignment;
use crate::variables::Variables;

const INVALID: u32 = u32::max_value();

/// A node of the queue.
#[derive(Copy, Clone)]
struct Link {
    prev: u32,
    next: u32,
    stamp: u64,
}

/// The move-to-front branching queue.
pub struct Vmtf {
    links: Vec<Link>,
    /// Least recently bumped variable.
    first: u32,
    /// Most recently bumped variable.
    last: u32,
    /// Cached search position.
    search: u32,
    /// Stamp of the next enqueue.
    stamp: u64,
}

impl Default for Vmtf {
    fn default() -> Vmtf {
        Vmtf {
            links: vec![],
            first: INVALID,
            last: INVALID,
            search: INVALID,
            stamp: 0,
        }
    }
}

impl Vmtf {
    /// Update structures for a new variable count.
    ///
    /// New variables are enqueued at the back, so they are branched on first.
    pub fn set_var_count(&mut self, count: usize) {
        let old_count = self.links.len();
        self.links.resize(
            count,
            Link {
                prev: INVALID,
                next: INVALID,
                stamp: 0,
            },
        );
        for index in old_count..count {
            self.enqueue(index as u32);
        }
    }

    /// The stamp of a variable's last bump.
    pub fn stamp(&self, var: Var) -> u64 {
        self.links[var.index()].stamp
    }

    /// The stamp of the cached search position.
    ///
    /// No unassigned variable has a larger stamp, so this bounds the stamp
    /// of the next decision.
    pub fn search_stamp(&self) -> u64 {
        if self.search == INVALID {
            0
        } else {
            self.links[self.search as usize].stamp
        }
    }

    /// Move a variable to the back of the queue, making it the next
    /// candidate.
    pub fn bump(&mut self, var: Var) {
        let index = var.index() as u32;
        self.dequeue(index);
        self.enqueue(index);
    }

    /// Tell the queue that a variable became unassigned.
    pub fn unassigned(&mut self, var: Var) {
        let index = var.index() as u32;
        if self.search == INVALID || self.links[index as usize].stamp > self.links[self.search as usize].stamp
        {
            self.search = index;
        }
    }

    /// Find the unassigned active variable with the largest stamp.
    pub fn next_unassigned(
        &mut self,
        assignment: &Assignment,
        variables: &Variables,
    ) -> Option<Var> {
        let mut index = self.search;
        if index == INVALID {
            index = self.last;
        }
        while index != INVALID {
            let var = Var::from_index(index as usize);
            if !assignment.var_is_assigned(var) && variables.flags(var).active {
                self.search = index;
                return Some(var);
            }
            index = self.links[index as usize].prev;
        }
        None
    }

    fn enqueue(&mut self, index: u32) {
        self.stamp += 1;
        let link = &mut self.links[index as usize];
        link.stamp = self.stamp;
        link.next = INVALID;
        link.prev = self.last;
        if self.last != INVALID {
            self.links[self.last as usize].next = index;
        } else {
            self.first = index;
        }
        self.last = index;
        // The fresh stamp is the largest, so the cursor has to move here to
        // keep its invariant.
        self.search = index;
    }

    fn dequeue(&mut self, index: u32) {
        let link = self.links[index as usize];
        if link.prev != INVALID {
            self.links[link.prev as usize].next = link.next;
        } else {
            self.first = link.next;
        }
        if link.next != INVALID {
            self.links[link.next as usize].prev = link.prev;
        } else {
            self.last = link.prev;
        }
        if self.search == index {
            self.search = if link.next != INVALID {
                link.next
            } else {
                link.prev
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_order() {
        let mut vmtf = Vmtf::default();
        vmtf.set_var_count(4);

        let assignment = {
            let mut assignment = Assignment::default();
            assignment.set_var_count(4);
            assignment
        };
        let variables = {
            let mut variables = Variables::default();
            variables.set_var_count(4);
            variables
        };

        // Last enqueued variable is branched on first.
        assert_eq!(
            vmtf.next_unassigned(&assignment, &variables),
            Some(Var::from_index(3))
        );

        vmtf.bump(Var::from_index(1));
        assert_eq!(
            vmtf.next_unassigned(&assignment, &variables),
            Some(Var::from_index(1))
        );

        vmtf.bump(Var::from_index(0));
        vmtf.bump(Var::from_index(2));
        assert_eq!(
            vmtf.next_unassigned(&assignment, &variables),
            Some(Var::from_index(2))
        );
    }

    #[test]
    fn skips_assigned() {
        let mut vmtf = Vmtf::default();
        vmtf.set_var_count(3);

        let mut assignment = Assignment::default();
        assignment.set_var_count(3);
        let mut variables = Variables::default();
        variables.set_var_count(3);

        assignment.assign_lit(Var::from_index(2).positive());
        assert_eq!(
            vmtf.next_unassigned(&assignment, &variables),
            Some(Var::from_index(1))
        );

        variables.flags_mut(Var::from_index(1)).active = false;
        // The cursor moved to 1, reset it by unassigning 2.
        assignment.unassign_lit(Var::from_index(2).positive());
        vmtf.unassigned(Var::from_index(2));
        assert_eq!(
            vmtf.next_unassigned(&assignment, &variables),
            Some(Var::from_index(2))
        );
    }
}
