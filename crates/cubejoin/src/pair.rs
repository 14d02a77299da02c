use std::fmt;

use cubejoin_types::{Cube, JoinSide, Lsn, PageNumber, TupleId};
use serde::{Deserialize, Serialize};

/// One side of a pending pair: a page still to be descended into.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSide {
    pub page: PageNumber,
    /// LSN of the page the downlink to `page` was read from.
    pub parent_lsn: Lsn,
    /// Already known bound of the page's entries, reused instead of
    /// recomputing the union at the next level.
    pub bound: Option<Cube>,
}

impl PendingSide {
    /// A root page: no parent, no known bound.
    #[must_use]
    pub fn root(page: PageNumber) -> Self {
        Self {
            page,
            parent_lsn: Lsn::INVALID,
            bound: None,
        }
    }
}

/// A page of each tree whose entries may overlap.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPair {
    pub first: PendingSide,
    pub second: PendingSide,
}

impl PendingPair {
    #[must_use]
    pub fn new(first: PendingSide, second: PendingSide) -> Self {
        Self { first, second }
    }

    /// Build a pair from sides given in either order.
    #[must_use]
    pub fn with_side(side: JoinSide, this: PendingSide, other: PendingSide) -> Self {
        match side {
            JoinSide::First => Self::new(this, other),
            JoinSide::Second => Self::new(other, this),
        }
    }
}

/// Two rows, one per tree, whose cubes overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResultPair {
    pub first: TupleId,
    pub second: TupleId,
}

impl ResultPair {
    #[must_use]
    pub const fn new(first: TupleId, second: TupleId) -> Self {
        Self { first, second }
    }
}

impl fmt::Display for ResultPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {}", self.first, self.second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pn(n: u32) -> PageNumber {
        PageNumber::new(n).unwrap()
    }

    #[test]
    fn test_with_side_orders_sides() {
        let a = PendingSide::root(pn(1));
        let b = PendingSide::root(pn(2));
        let pair = PendingPair::with_side(JoinSide::Second, a.clone(), b.clone());
        assert_eq!(pair.first, b);
        assert_eq!(pair.second, a);
        let pair = PendingPair::with_side(JoinSide::First, a.clone(), b);
        assert_eq!(pair.first, a);
    }

    #[test]
    fn test_root_side_never_continues() {
        let side = PendingSide::root(pn(1));
        assert!(!side.parent_lsn.is_valid());
        assert!(side.bound.is_none());
    }

    #[test]
    fn test_result_pair_display() {
        let pair = ResultPair::new(TupleId::new(1, 2), TupleId::new(3, 4));
        assert_eq!(pair.to_string(), "(1,2) x (3,4)");
    }
}
