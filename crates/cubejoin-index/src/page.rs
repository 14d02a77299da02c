//! Index pages as seen by readers.
//!
//! An [`IndexPage`] is either a leaf, whose tuples point at rows, or an
//! internal page, whose tuples are downlinks to child pages. Besides its
//! tuples a page carries the bookkeeping readers need to survive concurrent
//! splits:
//!
//! - `lsn`: sequence number of the last modification.
//! - `nsn`: sequence number at which the last split of this page became
//!   visible in its parent.
//! - `right_link`: the sibling that received the right half of a split.
//! - `follow_right`: set while a split has not been linked into the parent.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use cubejoin_types::{Cube, Lsn, PageNumber, TupleId};
use parking_lot::{ArcRwLockReadGuard, RawRwLock, RwLock};

/// Whether a page holds rows or downlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Leaf,
    Internal,
}

/// What an index tuple points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TupleTarget {
    /// A row; only valid on leaf pages.
    Row(TupleId),
    /// A child page; only valid on internal pages.
    Child(PageNumber),
}

/// One entry of an index page.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexTuple {
    /// The indexed cube, or the union of the child's keys. `None` is a null
    /// key.
    pub key: Option<Cube>,
    pub target: TupleTarget,
}

impl IndexTuple {
    #[must_use]
    pub fn row(key: Option<Cube>, tid: TupleId) -> Self {
        Self {
            key,
            target: TupleTarget::Row(tid),
        }
    }

    #[must_use]
    pub fn child(key: Option<Cube>, page: PageNumber) -> Self {
        Self {
            key,
            target: TupleTarget::Child(page),
        }
    }
}

/// A page of a spatial index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPage {
    pub(crate) kind: PageKind,
    pub(crate) lsn: Lsn,
    pub(crate) nsn: Lsn,
    pub(crate) right_link: Option<PageNumber>,
    pub(crate) follow_right: bool,
    pub(crate) tuples: Vec<IndexTuple>,
}

impl IndexPage {
    /// A leaf page with the given tuples and no history.
    #[must_use]
    pub fn leaf(tuples: Vec<IndexTuple>) -> Self {
        Self::with_kind(PageKind::Leaf, tuples)
    }

    /// An internal page with the given downlinks and no history.
    #[must_use]
    pub fn internal(tuples: Vec<IndexTuple>) -> Self {
        Self::with_kind(PageKind::Internal, tuples)
    }

    fn with_kind(kind: PageKind, tuples: Vec<IndexTuple>) -> Self {
        Self {
            kind,
            lsn: Lsn::INVALID,
            nsn: Lsn::INVALID,
            right_link: None,
            follow_right: false,
            tuples,
        }
    }

    #[must_use]
    pub fn with_lsn(mut self, lsn: Lsn) -> Self {
        self.lsn = lsn;
        self
    }

    #[must_use]
    pub fn with_nsn(mut self, nsn: Lsn) -> Self {
        self.nsn = nsn;
        self
    }

    #[must_use]
    pub fn with_right_link(mut self, right: PageNumber) -> Self {
        self.right_link = Some(right);
        self
    }

    #[must_use]
    pub fn with_follow_right(mut self) -> Self {
        self.follow_right = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> PageKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.kind == PageKind::Leaf
    }

    #[inline]
    #[must_use]
    pub fn lsn(&self) -> Lsn {
        self.lsn
    }

    #[inline]
    #[must_use]
    pub fn nsn(&self) -> Lsn {
        self.nsn
    }

    #[inline]
    #[must_use]
    pub fn right_link(&self) -> Option<PageNumber> {
        self.right_link
    }

    #[inline]
    #[must_use]
    pub fn follow_right(&self) -> bool {
        self.follow_right
    }

    #[inline]
    #[must_use]
    pub fn tuples(&self) -> &[IndexTuple] {
        &self.tuples
    }

    /// Whether a reader that reached this page through a parent stamped
    /// `parent_lsn` must also visit the right sibling.
    ///
    /// That is the case when the page was split after the parent was read
    /// (`parent_lsn < nsn`) or when a split is still waiting for its
    /// downlink. Readers carrying [`Lsn::INVALID`] never continue.
    #[must_use]
    pub fn needs_right_continuation(&self, parent_lsn: Lsn) -> bool {
        parent_lsn.is_valid()
            && (self.follow_right || parent_lsn < self.nsn)
            && self.right_link.is_some()
    }

    /// Union of all non-null keys on the page.
    #[must_use]
    pub fn union_key(&self) -> Option<Cube> {
        Cube::union_all(self.tuples.iter().filter_map(|t| t.key.as_ref()))
    }

    /// Position of the downlink to `child`, if this page has one.
    #[must_use]
    pub fn downlink_position(&self, child: PageNumber) -> Option<usize> {
        self.tuples
            .iter()
            .position(|t| t.target == TupleTarget::Child(child))
    }
}

// ---------------------------------------------------------------------------
// PageGuard
// ---------------------------------------------------------------------------

/// A page held under a shared read lock.
///
/// The lock is released when the guard is dropped, so every exit path of
/// the code holding it (including `?`) releases the page.
pub struct PageGuard {
    page_no: PageNumber,
    inner: ArcRwLockReadGuard<RawRwLock, IndexPage>,
}

impl PageGuard {
    /// Wrap an already acquired read lock.
    #[must_use]
    pub fn new(page_no: PageNumber, inner: ArcRwLockReadGuard<RawRwLock, IndexPage>) -> Self {
        Self { page_no, inner }
    }

    /// Lock `page` for reading.
    #[must_use]
    pub fn lock(page_no: PageNumber, page: &Arc<RwLock<IndexPage>>) -> Self {
        Self::new(page_no, page.read_arc())
    }

    #[inline]
    #[must_use]
    pub fn page_no(&self) -> PageNumber {
        self.page_no
    }
}

impl Deref for PageGuard {
    type Target = IndexPage;

    fn deref(&self) -> &IndexPage {
        &self.inner
    }
}

impl fmt::Debug for PageGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageGuard")
            .field("page_no", &self.page_no)
            .field("kind", &self.inner.kind)
            .field("lsn", &self.inner.lsn)
            .field("tuples", &self.inner.tuples.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pn(n: u32) -> PageNumber {
        PageNumber::new(n).unwrap()
    }

    #[test]
    fn test_continuation_requires_valid_parent_lsn() {
        let page = IndexPage::leaf(Vec::new())
            .with_nsn(Lsn::new(10))
            .with_follow_right()
            .with_right_link(pn(3));
        assert!(!page.needs_right_continuation(Lsn::INVALID));
        assert!(page.needs_right_continuation(Lsn::new(20)));
    }

    #[test]
    fn test_continuation_compares_nsn() {
        let page = IndexPage::leaf(Vec::new())
            .with_nsn(Lsn::new(10))
            .with_right_link(pn(3));
        assert!(page.needs_right_continuation(Lsn::new(9)));
        assert!(!page.needs_right_continuation(Lsn::new(10)));
        assert!(!page.needs_right_continuation(Lsn::new(11)));
    }

    #[test]
    fn test_continuation_needs_a_sibling() {
        let page = IndexPage::leaf(Vec::new())
            .with_nsn(Lsn::new(10))
            .with_follow_right();
        assert!(!page.needs_right_continuation(Lsn::new(1)));
    }

    #[test]
    fn test_union_key_skips_null_keys() {
        let a = Cube::new(&[0.0, 0.0], &[1.0, 1.0]).unwrap();
        let b = Cube::new(&[4.0, 4.0], &[5.0, 5.0]).unwrap();
        let page = IndexPage::leaf(vec![
            IndexTuple::row(Some(a), TupleId::new(1, 1)),
            IndexTuple::row(None, TupleId::new(1, 2)),
            IndexTuple::row(Some(b), TupleId::new(1, 3)),
        ]);
        let key = page.union_key().unwrap();
        assert_eq!(key.lower(), &[0.0, 0.0]);
        assert_eq!(key.upper(), &[5.0, 5.0]);
        assert!(IndexPage::leaf(vec![IndexTuple::row(None, TupleId::new(1, 1))])
            .union_key()
            .is_none());
    }

    #[test]
    fn test_downlink_position() {
        let page = IndexPage::internal(vec![
            IndexTuple::child(None, pn(4)),
            IndexTuple::child(None, pn(9)),
        ]);
        assert_eq!(page.downlink_position(pn(9)), Some(1));
        assert_eq!(page.downlink_position(pn(5)), None);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let shared = Arc::new(RwLock::new(IndexPage::leaf(Vec::new())));
        {
            let guard = PageGuard::lock(pn(1), &shared);
            assert!(guard.is_leaf());
            assert!(shared.try_write().is_none());
        }
        assert!(shared.try_write().is_some());
    }
}
