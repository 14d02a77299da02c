//! In-memory GiST-style R-tree.
//!
//! Pages live in a directory of individually locked buffers so readers can
//! walk the tree while a writer splits pages underneath them. Writers are
//! serialized by a single mutex; readers never touch it.
//!
//! # Split protocol
//!
//! ```text
//!   before:   parent ──► P ──right──► R
//!
//!   step 1:   P keeps the left half, new page N takes the right half.
//!             P.right = N, N.right = R, N.nsn = P.nsn (old),
//!             P.follow_right = true
//!
//!   step 2:   (P still write-locked) parent gains a downlink to N and is
//!             stamped with a new LSN L; P.nsn = L, P.follow_right = false
//! ```
//!
//! A reader that took its downlink to P before step 2 carries a parent LSN
//! below `P.nsn` (or sees `follow_right`) and continues to N through the
//! right link. A reader that read the parent after step 2 reaches N through
//! its own downlink and stops at P. Root splits move the root's contents
//! into two fresh pages instead, so the root page number never changes.

use std::sync::Arc;

use cubejoin_error::{JoinError, Result};
use cubejoin_types::{Cube, IndexId, Lsn, PageNumber, TupleId};
use parking_lot::{ArcRwLockWriteGuard, Mutex, RawRwLock, RwLock};
use tracing::{debug, trace};

use crate::SpatialIndex;
use crate::config::RTreeConfig;
use crate::page::{IndexPage, IndexTuple, PageGuard, PageKind, TupleTarget};

type SharedPage = Arc<RwLock<IndexPage>>;
type PageWriteGuard = ArcRwLockWriteGuard<RawRwLock, IndexPage>;

const ROOT: PageNumber = PageNumber::ONE;

/// An in-memory R-tree over cubes with GiST concurrency semantics.
pub struct MemRTree {
    id: IndexId,
    name: String,
    config: RTreeConfig,
    /// Page `n` is stored at index `n - 1`.
    pages: RwLock<Vec<SharedPage>>,
    writer: Mutex<WriterState>,
}

#[derive(Debug, Default)]
struct WriterState {
    last_lsn: Lsn,
    rows: usize,
    incomplete: Option<IncompleteSplit>,
}

impl WriterState {
    fn advance(&mut self) -> Lsn {
        self.last_lsn = self.last_lsn.next();
        self.last_lsn
    }
}

/// A leaf split whose downlink has not been inserted into the parent.
#[derive(Debug)]
struct IncompleteSplit {
    /// Pages from the root down to the split (left) page.
    path: Vec<PageNumber>,
    right: PageNumber,
}

/// Work a child hands to its parent after an insertion.
enum Carry {
    /// Grow the child's downlink key to cover this cube.
    Enlarge(Cube),
    /// The child split. Its left half stays write-locked until the parent
    /// holds the downlink to `right`.
    Split {
        left: PageWriteGuard,
        right: PageNumber,
        right_key: Option<Cube>,
    },
}

impl MemRTree {
    /// An empty tree: a single empty leaf root.
    pub fn new(name: impl Into<String>, config: RTreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            id: IndexId::fresh(),
            name: name.into(),
            config,
            pages: RwLock::new(vec![Arc::new(RwLock::new(IndexPage::leaf(Vec::new())))]),
            writer: Mutex::new(WriterState::default()),
        })
    }

    /// A tree made of hand-built pages; `pages[0]` becomes the root.
    pub fn from_pages(
        name: impl Into<String>,
        config: RTreeConfig,
        pages: Vec<IndexPage>,
    ) -> Result<Self> {
        let name = name.into();
        config.validate()?;
        if pages.is_empty() {
            return Err(JoinError::corrupt(name, "an index needs at least a root page"));
        }
        let last_lsn = pages
            .iter()
            .map(|p| p.lsn.max(p.nsn))
            .max()
            .unwrap_or(Lsn::INVALID);
        let rows = pages
            .iter()
            .filter(|p| p.is_leaf())
            .map(|p| p.tuples.len())
            .sum();
        Ok(Self {
            id: IndexId::fresh(),
            name,
            config,
            pages: RwLock::new(
                pages
                    .into_iter()
                    .map(|p| Arc::new(RwLock::new(p)))
                    .collect(),
            ),
            writer: Mutex::new(WriterState {
                last_lsn,
                rows,
                incomplete: None,
            }),
        })
    }

    /// A tree holding `rows`, inserted in order.
    pub fn build(
        name: impl Into<String>,
        config: RTreeConfig,
        rows: impl IntoIterator<Item = (Option<Cube>, TupleId)>,
    ) -> Result<Self> {
        let tree = Self::new(name, config)?;
        for (key, tid) in rows {
            tree.insert(key, tid)?;
        }
        Ok(tree)
    }

    #[must_use]
    pub fn config(&self) -> RTreeConfig {
        self.config
    }

    /// Number of rows inserted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writer.lock().rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.read().len()
    }

    /// LSN of the most recent modification.
    #[must_use]
    pub fn last_lsn(&self) -> Lsn {
        self.writer.lock().last_lsn
    }

    #[must_use]
    pub fn has_incomplete_split(&self) -> bool {
        self.writer.lock().incomplete.is_some()
    }

    /// Number of levels, counting the root and the leaves.
    pub fn depth(&self) -> Result<usize> {
        let mut depth = 1;
        let mut page = self.read_page(ROOT)?;
        while !page.is_leaf() {
            let child = page
                .tuples()
                .iter()
                .find_map(|t| match t.target {
                    TupleTarget::Child(c) => Some(c),
                    TupleTarget::Row(_) => None,
                })
                .ok_or_else(|| {
                    JoinError::corrupt(&self.name, format!("page {} has no downlinks", page.page_no()))
                })?;
            drop(page);
            page = self.read_page(child)?;
            depth += 1;
        }
        Ok(depth)
    }

    /// Every row in the tree, found by a full scan that follows right links
    /// the way any concurrent reader must.
    pub fn scan_rows(&self) -> Result<Vec<(Option<Cube>, TupleId)>> {
        let mut rows = Vec::new();
        let mut stack = vec![(ROOT, Lsn::INVALID)];
        while let Some((page_no, parent_lsn)) = stack.pop() {
            let page = self.read_page(page_no)?;
            for tuple in page.tuples() {
                match tuple.target {
                    TupleTarget::Row(tid) => rows.push((tuple.key.clone(), tid)),
                    TupleTarget::Child(child) => stack.push((child, page.lsn())),
                }
            }
            if page.needs_right_continuation(parent_lsn) {
                if let Some(right) = page.right_link() {
                    stack.push((right, parent_lsn));
                }
            }
        }
        Ok(rows)
    }

    // --- Writes ---

    /// Insert one row. A `None` key is stored but never matches anything.
    pub fn insert(&self, key: Option<Cube>, tid: TupleId) -> Result<()> {
        let mut state = self.writer.lock();
        self.finish_incomplete_locked(&mut state)?;
        self.insert_locked(&mut state, key, tid, false).map(|_| ())
    }

    /// Insert one row, but if the leaf splits leave the split unlinked from
    /// its parent, as a writer interrupted between the two split steps
    /// would. Returns whether such a split was left behind.
    pub fn insert_deferring_downlink(&self, key: Option<Cube>, tid: TupleId) -> Result<bool> {
        let mut state = self.writer.lock();
        self.finish_incomplete_locked(&mut state)?;
        self.insert_locked(&mut state, key, tid, true)
    }

    /// Link a split left behind by [`insert_deferring_downlink`]
    /// (Self::insert_deferring_downlink). Returns whether there was one.
    pub fn finish_incomplete_splits(&self) -> Result<bool> {
        let mut state = self.writer.lock();
        self.finish_incomplete_locked(&mut state)
    }

    fn insert_locked(
        &self,
        state: &mut WriterState,
        key: Option<Cube>,
        tid: TupleId,
        defer_downlink: bool,
    ) -> Result<bool> {
        let path = self.choose_leaf_path(key.as_ref())?;
        let leaf_level = path.len() - 1;
        let leaf_no = path[leaf_level];

        let mut leaf = self.lock_page_mut(leaf_no)?;
        leaf.tuples.push(IndexTuple::row(key.clone(), tid));
        leaf.lsn = state.advance();
        state.rows += 1;
        trace!(index = %self.name, page = %leaf_no, %tid, "inserted row");

        let carry = if leaf.tuples.len() > self.config.max_fanout {
            self.split_page(state, leaf_no, leaf)?
        } else {
            drop(leaf);
            key.clone().map(Carry::Enlarge)
        };

        match carry {
            Some(Carry::Split { left, right, .. }) if defer_downlink => {
                drop(left);
                debug!(index = %self.name, left = %leaf_no, %right, "left leaf split unlinked");
                state.incomplete = Some(IncompleteSplit {
                    path: path.clone(),
                    right,
                });
                // The left page's downlink must still cover everything that
                // was on it, including the new row now on the right page.
                let enlarge = key.map(Carry::Enlarge);
                self.propagate(state, &path, leaf_level, enlarge, None)?;
                Ok(true)
            }
            carry => {
                self.propagate(state, &path, leaf_level, carry, key.as_ref())?;
                Ok(false)
            }
        }
    }

    fn finish_incomplete_locked(&self, state: &mut WriterState) -> Result<bool> {
        let Some(split) = state.incomplete.take() else {
            return Ok(false);
        };
        let level = split.path.len() - 1;
        let left_no = split.path[level];
        let left = self.lock_page_mut(left_no)?;
        if !left.follow_right {
            return Ok(false);
        }
        let right_key = self.read_page(split.right)?.union_key();
        debug!(index = %self.name, left = %left_no, right = %split.right, "completing split");
        let carry = Carry::Split {
            left,
            right: split.right,
            right_key,
        };
        self.propagate(state, &split.path, level, Some(carry), None)?;
        Ok(true)
    }

    /// Walk from `path[level]` towards the root applying `carry` to each
    /// parent. `key` is the inserted key that ancestors must keep covering
    /// after a split has been absorbed.
    fn propagate(
        &self,
        state: &mut WriterState,
        path: &[PageNumber],
        mut level: usize,
        mut carry: Option<Carry>,
        key: Option<&Cube>,
    ) -> Result<()> {
        while let Some(current) = carry.take() {
            if level == 0 {
                break;
            }
            let child_no = path[level];
            let parent_no = path[level - 1];
            let mut parent = self.lock_page_mut(parent_no)?;
            let pos = parent.downlink_position(child_no).ok_or_else(|| {
                JoinError::corrupt(
                    &self.name,
                    format!("page {parent_no} has no downlink to page {child_no}"),
                )
            })?;

            match current {
                Carry::Enlarge(k) => {
                    let grown = match &parent.tuples[pos].key {
                        Some(old) => old.union(&k),
                        None => k.clone(),
                    };
                    if parent.tuples[pos].key.as_ref() == Some(&grown) {
                        break;
                    }
                    parent.tuples[pos].key = Some(grown);
                    parent.lsn = state.advance();
                    carry = Some(Carry::Enlarge(k));
                }
                Carry::Split {
                    mut left,
                    right,
                    right_key,
                } => {
                    parent.tuples[pos].key = left.union_key();
                    parent
                        .tuples
                        .insert(pos + 1, IndexTuple::child(right_key, right));
                    let lsn = state.advance();
                    parent.lsn = lsn;
                    left.lsn = lsn;
                    left.nsn = lsn;
                    left.follow_right = false;
                    drop(left);
                    debug!(
                        index = %self.name,
                        parent = %parent_no,
                        left = %child_no,
                        %right,
                        %lsn,
                        "linked split into parent"
                    );

                    carry = if parent.tuples.len() > self.config.max_fanout {
                        self.split_page(state, parent_no, parent)?
                    } else {
                        drop(parent);
                        key.cloned().map(Carry::Enlarge)
                    };
                }
            }
            level -= 1;
        }
        Ok(())
    }

    /// Split an overflowing page. Returns the split for the parent to link,
    /// or `None` for the root, which is split in place.
    fn split_page(
        &self,
        state: &mut WriterState,
        page_no: PageNumber,
        mut page: PageWriteGuard,
    ) -> Result<Option<Carry>> {
        let (left_tuples, right_tuples) = split_tuples(std::mem::take(&mut page.tuples));
        let lsn = state.advance();

        let fresh = |tuples| IndexPage {
            kind: page.kind,
            lsn,
            nsn: page.nsn,
            right_link: None,
            follow_right: false,
            tuples,
        };

        if page_no == ROOT {
            let left_page = fresh(left_tuples);
            let right_page = fresh(right_tuples);
            let left_key = left_page.union_key();
            let right_key = right_page.union_key();
            let left_no = self.allocate(left_page)?;
            let right_no = self.allocate(right_page)?;
            page.kind = PageKind::Internal;
            page.tuples = vec![
                IndexTuple::child(left_key, left_no),
                IndexTuple::child(right_key, right_no),
            ];
            page.lsn = lsn;
            debug!(index = %self.name, left = %left_no, right = %right_no, %lsn, "split root");
            return Ok(None);
        }

        let mut right_page = fresh(right_tuples);
        right_page.right_link = page.right_link;
        let right_key = right_page.union_key();
        let right = self.allocate(right_page)?;

        page.tuples = left_tuples;
        page.right_link = Some(right);
        page.follow_right = true;
        page.lsn = lsn;
        debug!(index = %self.name, left = %page_no, %right, %lsn, "split page");
        Ok(Some(Carry::Split {
            left: page,
            right,
            right_key,
        }))
    }

    fn choose_leaf_path(&self, key: Option<&Cube>) -> Result<Vec<PageNumber>> {
        let mut path = vec![ROOT];
        loop {
            let page_no = path[path.len() - 1];
            let page = self.read_page(page_no)?;
            if page.is_leaf() {
                return Ok(path);
            }
            let chosen = choose_subtree(page.tuples(), key);
            match page.tuples().get(chosen).map(|t| t.target) {
                Some(TupleTarget::Child(child)) => path.push(child),
                _ => {
                    return Err(JoinError::corrupt(
                        &self.name,
                        format!("internal page {page_no} has no usable downlink"),
                    ));
                }
            }
        }
    }

    // --- Page directory ---

    fn page_arc(&self, page_no: PageNumber) -> Result<SharedPage> {
        let pages = self.pages.read();
        pages
            .get(page_no.get() as usize - 1)
            .cloned()
            .ok_or_else(|| JoinError::PageNotFound {
                index: self.name.clone(),
                page: page_no.get(),
            })
    }

    fn lock_page_mut(&self, page_no: PageNumber) -> Result<PageWriteGuard> {
        Ok(self.page_arc(page_no)?.write_arc())
    }

    fn allocate(&self, page: IndexPage) -> Result<PageNumber> {
        let mut pages = self.pages.write();
        let page_no = u32::try_from(pages.len() + 1)
            .ok()
            .and_then(PageNumber::new)
            .ok_or(JoinError::OutOfMemory)?;
        pages.push(Arc::new(RwLock::new(page)));
        Ok(page_no)
    }
}

impl SpatialIndex for MemRTree {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> IndexId {
        self.id
    }

    fn root(&self) -> PageNumber {
        ROOT
    }

    fn read_page(&self, page_no: PageNumber) -> Result<PageGuard> {
        let page = self.page_arc(page_no)?;
        Ok(PageGuard::lock(page_no, &page))
    }
}

impl std::fmt::Debug for MemRTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemRTree")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("config", &self.config)
            .field("pages", &self.page_count())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Placement heuristics
// ---------------------------------------------------------------------------

/// Index of the downlink whose key grows least when `key` is added; ties go
/// to the smaller key. Null keys go to the first downlink.
fn choose_subtree(tuples: &[IndexTuple], key: Option<&Cube>) -> usize {
    let Some(key) = key else {
        return 0;
    };
    tuples
        .iter()
        .enumerate()
        .map(|(i, t)| match &t.key {
            Some(k) => (i, penalty(k, key), k.volume()),
            None => (i, f64::INFINITY, f64::INFINITY),
        })
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.2.total_cmp(&b.2)))
        .map_or(0, |(i, _, _)| i)
}

fn penalty(existing: &Cube, added: &Cube) -> f64 {
    let before = existing.volume();
    let after = existing.union(added).volume();
    if after.is_infinite() && before.is_infinite() {
        0.0
    } else {
        after - before
    }
}

/// Halve `tuples` at the median center along the axis where centers are
/// spread widest.
fn split_tuples(mut tuples: Vec<IndexTuple>) -> (Vec<IndexTuple>, Vec<IndexTuple>) {
    let dim = tuples
        .iter()
        .filter_map(|t| t.key.as_ref())
        .map(Cube::dim)
        .max()
        .unwrap_or(0);
    let axis = (0..dim)
        .max_by(|&a, &b| spread(&tuples, a).total_cmp(&spread(&tuples, b)))
        .unwrap_or(0);
    tuples.sort_by(|a, b| center(a, axis).total_cmp(&center(b, axis)));
    let right = tuples.split_off(tuples.len() / 2);
    (tuples, right)
}

fn center(tuple: &IndexTuple, axis: usize) -> f64 {
    tuple
        .key
        .as_ref()
        .filter(|k| axis < k.dim())
        .map(|k| (k.lower()[axis] + k.upper()[axis]) / 2.0)
        .filter(|c| c.is_finite())
        .unwrap_or(0.0)
}

fn spread(tuples: &[IndexTuple], axis: usize) -> f64 {
    let (lo, hi) = tuples
        .iter()
        .map(|t| center(t, axis))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
            (lo.min(c), hi.max(c))
        });
    hi - lo
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use proptest::prelude::*;

    fn pn(n: u32) -> PageNumber {
        PageNumber::new(n).unwrap()
    }

    fn tid(n: u32) -> TupleId {
        TupleId::new(n, 1)
    }

    fn x(v: f64) -> Option<Cube> {
        Some(Cube::point(&[v]).unwrap())
    }

    fn covers(outer: &Cube, inner: &Cube) -> bool {
        (0..outer.dim()).all(|axis| {
            axis >= inner.dim()
                || (outer.lower()[axis] <= inner.lower()[axis]
                    && outer.upper()[axis] >= inner.upper()[axis])
        })
    }

    /// Every downlink key covers every key stored below it.
    fn assert_keys_cover(tree: &MemRTree, page_no: PageNumber, bound: Option<&Cube>) {
        let page = tree.read_page(page_no).unwrap();
        for tuple in page.tuples() {
            if let (Some(bound), Some(key)) = (bound, tuple.key.as_ref()) {
                assert!(covers(bound, key), "{bound} does not cover {key}");
            }
            if let TupleTarget::Child(child) = tuple.target {
                let key = tuple.key.clone();
                assert_keys_cover(tree, child, key.as_ref());
            }
        }
    }

    fn row_ids(tree: &MemRTree) -> BTreeSet<TupleId> {
        tree.scan_rows().unwrap().into_iter().map(|(_, t)| t).collect()
    }

    #[test]
    fn test_empty_tree() {
        let tree = MemRTree::new("empty", RTreeConfig::default()).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.depth().unwrap(), 1);
        assert!(tree.read_page(tree.root()).unwrap().is_leaf());
        assert!(tree.scan_rows().unwrap().is_empty());
    }

    #[test]
    fn test_each_tree_has_its_own_id() {
        let a = MemRTree::new("t", RTreeConfig::default()).unwrap();
        let b = MemRTree::new("t", RTreeConfig::default()).unwrap();
        assert_ne!(a.id(), b.id());
        let shared = Arc::new(b);
        assert_eq!(Arc::clone(&shared).id(), shared.id());
    }

    #[test]
    fn test_root_split_keeps_root_in_place() {
        let tree = MemRTree::new("t", RTreeConfig::with_max_fanout(3)).unwrap();
        for i in 0..4 {
            tree.insert(x(f64::from(i)), tid(i)).unwrap();
        }
        assert_eq!(tree.root(), PageNumber::ONE);
        assert_eq!(tree.depth().unwrap(), 2);
        let root = tree.read_page(tree.root()).unwrap();
        assert!(!root.is_leaf());
        assert_eq!(root.tuples().len(), 2);
        for tuple in root.tuples() {
            let TupleTarget::Child(child) = tuple.target else {
                panic!("root must hold downlinks");
            };
            let page = tree.read_page(child).unwrap();
            assert!(!page.follow_right());
            assert_eq!(page.right_link(), None);
        }
    }

    #[test]
    fn test_split_links_siblings_and_stamps_nsn() {
        let tree = MemRTree::new("t", RTreeConfig::with_max_fanout(3)).unwrap();
        // Root split: page 2 = {0, 1}, page 3 = {2, 3}.
        for (i, v) in [0.0, 1.0, 2.0, 3.0].into_iter().enumerate() {
            tree.insert(x(v), tid(i as u32)).unwrap();
        }
        // Page 3 overflows and splits: page 3 = {2, 2.2}, page 4 = {2.5, 3}.
        tree.insert(x(2.5), tid(10)).unwrap();
        tree.insert(x(2.2), tid(11)).unwrap();
        let nsn_after_first_split = {
            let p3 = tree.read_page(pn(3)).unwrap();
            assert_eq!(p3.right_link(), Some(pn(4)));
            assert!(!p3.follow_right());
            assert!(p3.nsn().is_valid());
            p3.nsn()
        };

        // Page 3 splits again: page 3 = {2, 2.1}, page 5 = {2.15, 2.2}.
        tree.insert(x(2.1), tid(12)).unwrap();
        tree.insert(x(2.15), tid(13)).unwrap();

        let p3 = tree.read_page(pn(3)).unwrap();
        let p5 = tree.read_page(pn(5)).unwrap();
        assert_eq!(p3.right_link(), Some(pn(5)));
        assert_eq!(p5.right_link(), Some(pn(4)));
        assert_eq!(p5.nsn(), nsn_after_first_split);
        assert!(p3.nsn() > p5.lsn());
        assert!(!p3.follow_right());

        let before_link = Lsn::new(p3.nsn().get() - 1);
        assert!(p3.needs_right_continuation(before_link));
        assert!(!p3.needs_right_continuation(p3.nsn()));
        drop((p3, p5));

        assert_eq!(tree.len(), 8);
        assert_eq!(row_ids(&tree).len(), 8);
        assert_keys_cover(&tree, tree.root(), None);
    }

    #[test]
    fn test_deferred_split_is_reachable_and_completes() {
        let tree = MemRTree::new("t", RTreeConfig::with_max_fanout(3)).unwrap();
        for (i, v) in [0.0, 1.0, 2.0, 3.0].into_iter().enumerate() {
            tree.insert(x(v), tid(i as u32)).unwrap();
        }
        assert!(!tree.insert_deferring_downlink(x(2.5), tid(10)).unwrap());
        assert!(tree.insert_deferring_downlink(x(2.2), tid(11)).unwrap());
        assert!(tree.has_incomplete_split());

        {
            let root = tree.read_page(tree.root()).unwrap();
            assert_eq!(root.tuples().len(), 2, "downlink must not be linked yet");
            let p3 = tree.read_page(pn(3)).unwrap();
            assert!(p3.follow_right());
            assert_eq!(p3.right_link(), Some(pn(4)));
            // The parent key of the split page still covers the moved rows.
            let key = root.tuples()[1].key.clone().unwrap();
            assert!(covers(&key, &Cube::point(&[3.0]).unwrap()));
            assert!(covers(&key, &Cube::point(&[2.2]).unwrap()));
        }
        assert_eq!(row_ids(&tree).len(), 6);

        assert!(tree.finish_incomplete_splits().unwrap());
        assert!(!tree.has_incomplete_split());
        assert!(!tree.finish_incomplete_splits().unwrap());

        let root = tree.read_page(tree.root()).unwrap();
        assert_eq!(root.tuples().len(), 3);
        let p3 = tree.read_page(pn(3)).unwrap();
        assert!(!p3.follow_right());
        assert_eq!(p3.nsn(), root.lsn());
        drop((root, p3));
        assert_keys_cover(&tree, tree.root(), None);
    }

    #[test]
    fn test_regular_insert_finishes_pending_split() {
        let tree = MemRTree::new("t", RTreeConfig::with_max_fanout(3)).unwrap();
        for (i, v) in [0.0, 1.0, 2.0, 3.0].into_iter().enumerate() {
            tree.insert(x(v), tid(i as u32)).unwrap();
        }
        tree.insert_deferring_downlink(x(2.5), tid(10)).unwrap();
        assert!(tree.insert_deferring_downlink(x(2.2), tid(11)).unwrap());
        tree.insert(x(0.5), tid(12)).unwrap();
        assert!(!tree.has_incomplete_split());
        assert_eq!(row_ids(&tree).len(), 7);
    }

    #[test]
    fn test_null_keys_are_stored() {
        let tree = MemRTree::new("t", RTreeConfig::with_max_fanout(2)).unwrap();
        tree.insert(None, tid(1)).unwrap();
        tree.insert(x(1.0), tid(2)).unwrap();
        tree.insert(None, tid(3)).unwrap();
        tree.insert(x(5.0), tid(4)).unwrap();
        let rows = tree.scan_rows().unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows.iter().filter(|(k, _)| k.is_none()).count(), 2);
    }

    #[test]
    fn test_from_pages_and_missing_page() {
        let tree = MemRTree::from_pages(
            "hand",
            RTreeConfig::default(),
            vec![
                IndexPage::internal(vec![IndexTuple::child(x(1.0), pn(2))]).with_lsn(Lsn::new(4)),
                IndexPage::leaf(vec![IndexTuple::row(x(1.0), tid(1))]).with_lsn(Lsn::new(3)),
            ],
        )
        .unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.last_lsn(), Lsn::new(4));
        assert_eq!(tree.depth().unwrap(), 2);
        let err = tree.read_page(pn(9)).unwrap_err();
        assert!(matches!(err, JoinError::PageNotFound { page: 9, .. }));

        assert!(MemRTree::from_pages("none", RTreeConfig::default(), Vec::new()).is_err());
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(MemRTree::new("t", RTreeConfig::with_max_fanout(0)).is_err());
    }

    fn arb_row() -> impl Strategy<Value = Option<Cube>> {
        prop_oneof![
            1 => Just(None),
            8 => (1_usize..=3).prop_flat_map(|dim| {
                (
                    prop::collection::vec(0.0_f64..100.0, dim),
                    prop::collection::vec(0.0_f64..5.0, dim),
                )
                    .prop_map(|(lo, ext)| {
                        let hi: Vec<f64> = lo.iter().zip(&ext).map(|(l, e)| l + e).collect();
                        Some(Cube::new(&lo, &hi).unwrap())
                    })
            }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(40))]

        #[test]
        fn inserts_are_all_reachable_and_covered(
            keys in prop::collection::vec(arb_row(), 0..150),
            fanout in 2_usize..7,
        ) {
            let tree = MemRTree::new("prop", RTreeConfig::with_max_fanout(fanout)).unwrap();
            for (i, key) in keys.iter().enumerate() {
                tree.insert(key.clone(), tid(i as u32)).unwrap();
            }
            let expected: BTreeSet<TupleId> = (0..keys.len()).map(|i| tid(i as u32)).collect();
            prop_assert_eq!(row_ids(&tree), expected);
            prop_assert_eq!(tree.scan_rows().unwrap().len(), keys.len());
            assert_keys_cover(&tree, tree.root(), None);
        }
    }
}
