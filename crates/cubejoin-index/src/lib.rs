//! The spatial index collaborator consumed by the join.
//!
//! The join only needs a narrow, read-only view of a tree: its root, and
//! shared-locked access to one page at a time. [`SpatialIndex`] is that
//! view; [`IndexCatalog`] resolves names to open indexes. [`MemRTree`] is an
//! in-memory GiST-style R-tree implementing both the reader interface and
//! a concurrent writer, used to drive the join in tests and benchmarks.

pub mod catalog;
pub mod config;
pub mod page;
pub mod rtree;

use std::sync::Arc;

use cubejoin_error::Result;
use cubejoin_types::{IndexId, PageNumber};

pub use catalog::MemCatalog;
pub use config::RTreeConfig;
pub use page::{IndexPage, IndexTuple, PageGuard, PageKind, TupleTarget};
pub use rtree::MemRTree;

/// Read access to a paged spatial index.
///
/// Implementations must allow pages to be read while other threads modify
/// the tree; each returned [`PageGuard`] pins one page under a shared lock
/// until it is dropped.
///
/// [`PageGuard`] is a concrete type wrapping an owned `parking_lot` read
/// guard, so a backend must keep each page in an `Arc<RwLock<IndexPage>>`
/// and hand it out through [`PageGuard::lock`]. A backend with its own
/// buffer format has to decode the page into such a cell on every read.
pub trait SpatialIndex: Send + Sync {
    /// Name used in diagnostics. Not required to be unique.
    fn name(&self) -> &str;

    /// Identity of the underlying tree. Handles to the same tree report the
    /// same id.
    fn id(&self) -> IndexId;

    /// Locator of the root page. The root never moves.
    fn root(&self) -> PageNumber;

    /// Read and share-lock one page.
    fn read_page(&self, page_no: PageNumber) -> Result<PageGuard>;
}

impl<T: SpatialIndex + ?Sized> SpatialIndex for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn id(&self) -> IndexId {
        (**self).id()
    }

    fn root(&self) -> PageNumber {
        (**self).root()
    }

    fn read_page(&self, page_no: PageNumber) -> Result<PageGuard> {
        (**self).read_page(page_no)
    }
}

impl<T: SpatialIndex + ?Sized> SpatialIndex for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn id(&self) -> IndexId {
        (**self).id()
    }

    fn root(&self) -> PageNumber {
        (**self).root()
    }

    fn read_page(&self, page_no: PageNumber) -> Result<PageGuard> {
        (**self).read_page(page_no)
    }
}

/// Resolves index names to handles opened for reading.
///
/// Closing an index is dropping its handle.
pub trait IndexCatalog {
    type Index: SpatialIndex;

    fn open_for_read(&self, name: &str) -> Result<Self::Index>;
}
