//! Entry extraction from a page and its right-link chain.
//!
//! A page reached through a downlink taken before the page split holds only
//! the left half of its former entries; the rest moved to right siblings.
//! [`read_chain`] keeps walking right while
//! [`IndexPage::needs_right_continuation`] says so, collecting entries from
//! every page of the chain. The decision is made under the same lock the
//! entries are read under, so a split that happens after a page has been
//! read cannot make the walk see an entry twice.

use cubejoin_error::{JoinError, Result};
use cubejoin_index::{IndexPage, PageGuard, PageKind, SpatialIndex, TupleTarget};
use cubejoin_types::{Cube, Lsn, PageNumber, TupleId};
use tracing::trace;

use crate::metrics::JoinMetrics;

/// Shape of the entries extracted from one kind of page.
pub(crate) trait PageEntry: Sized {
    const KIND: PageKind;

    /// Build an entry from a non-null key. `None` when the tuple target
    /// does not belong on a page of [`Self::KIND`].
    fn from_tuple(key: Cube, target: TupleTarget, page: &IndexPage) -> Option<Self>;

    fn key(&self) -> &Cube;
}

/// A row found on a leaf page.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LeafEntry {
    pub key: Cube,
    pub tid: TupleId,
}

impl PageEntry for LeafEntry {
    const KIND: PageKind = PageKind::Leaf;

    fn from_tuple(key: Cube, target: TupleTarget, _page: &IndexPage) -> Option<Self> {
        match target {
            TupleTarget::Row(tid) => Some(Self { key, tid }),
            TupleTarget::Child(_) => None,
        }
    }

    fn key(&self) -> &Cube {
        &self.key
    }
}

/// A downlink found on an internal page.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ChildEntry {
    pub key: Cube,
    pub page: PageNumber,
    /// LSN of the page the downlink was read from.
    pub parent_lsn: Lsn,
}

impl PageEntry for ChildEntry {
    const KIND: PageKind = PageKind::Internal;

    fn from_tuple(key: Cube, target: TupleTarget, page: &IndexPage) -> Option<Self> {
        match target {
            TupleTarget::Child(child) => Some(Self {
                key,
                page: child,
                parent_lsn: page.lsn(),
            }),
            TupleTarget::Row(_) => None,
        }
    }

    fn key(&self) -> &Cube {
        &self.key
    }
}

/// Collect the entries of `first` and of every right sibling a reader that
/// came through a parent stamped `parent_lsn` has to visit.
///
/// Consumes the guard; each page is released before its sibling is locked.
pub(crate) fn read_chain<E, I>(
    index: &I,
    first: PageGuard,
    parent_lsn: Lsn,
    max_chain: usize,
    metrics: &mut JoinMetrics,
) -> Result<Vec<E>>
where
    E: PageEntry,
    I: SpatialIndex + ?Sized,
{
    let start = first.page_no();
    let mut entries = Vec::new();
    let mut page = first;
    let mut hops = 0_usize;

    loop {
        if page.kind() != E::KIND {
            return Err(JoinError::corrupt(
                index.name(),
                format!(
                    "page {} is {:?} but its chain from page {start} is {:?}",
                    page.page_no(),
                    page.kind(),
                    E::KIND
                ),
            ));
        }

        entries.reserve(page.tuples().len());
        for tuple in page.tuples() {
            let Some(key) = tuple.key.clone() else {
                metrics.null_keys_skipped += 1;
                continue;
            };
            let entry = E::from_tuple(key, tuple.target, &page).ok_or_else(|| {
                JoinError::corrupt(
                    index.name(),
                    format!(
                        "{:?} page {} holds tuple target {:?}",
                        E::KIND,
                        page.page_no(),
                        tuple.target
                    ),
                )
            })?;
            entries.push(entry);
        }

        let right = match page.right_link() {
            Some(right) if page.needs_right_continuation(parent_lsn) => right,
            _ => break,
        };
        hops += 1;
        if hops > max_chain {
            return Err(JoinError::RightLinkChainTooLong {
                index: index.name().to_owned(),
                start: start.get(),
                max: max_chain,
            });
        }
        trace!(
            index = index.name(),
            from = %page.page_no(),
            to = %right,
            %parent_lsn,
            "following right link"
        );
        drop(page);
        page = index.read_page(right)?;
        metrics.pages_read += 1;
        metrics.right_links_followed += 1;
    }

    Ok(entries)
}
