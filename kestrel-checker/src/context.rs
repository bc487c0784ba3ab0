//! Central checker data structure.
use partial_ref::{part, PartialRefTarget};

use crate::clauses::Clauses;
use crate::propagate::Propagator;
use crate::state::CheckerState;
use crate::tmp::TmpData;

/// Part declarations for the [`Context`] struct.
pub mod parts {
    use super::*;

    part!(pub CheckerStateP: CheckerState);
    part!(pub ClausesP: Clauses);
    part!(pub PropagatorP: Propagator);
    part!(pub TmpDataP: TmpData);
}

use parts::*;

/// Central checker data structure.
///
/// This struct contains all data kept by the checker. Functions operating on
/// multiple fields of the context use partial references provided by the
/// `partial_ref` crate. This documents the data dependencies and makes the
/// borrow checker happy without the overhead of passing individual references.
#[derive(PartialRefTarget, Default)]
pub struct Context {
    #[part(CheckerStateP)]
    pub checker_state: CheckerState,
    #[part(ClausesP)]
    pub clauses: Clauses,
    #[part(PropagatorP)]
    pub propagator: Propagator,
    #[part(TmpDataP)]
    pub tmp_data: TmpData,
}
