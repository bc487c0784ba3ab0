//! Unit propagation.
pub mod assignment;
pub mod graph;
pub mod propagate;
pub mod watch;

pub use assignment::{backtrack, enqueue_assignment, Assignment, Frame, Trail};
pub use graph::{Conflict, ImplGraph, ImplNode, Reason};
pub use propagate::{propagate, propagate_probing};
pub use watch::Watchlists;
