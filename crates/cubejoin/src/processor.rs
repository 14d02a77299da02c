//! Processing of one pending pair.
//!
//! ```text
//!   first \ second |  leaf                    |  internal
//!   ---------------+--------------------------+---------------------------
//!   leaf           |  sweep rows -> results   |  expand second's children
//!   internal       |  expand first's children |  sweep downlinks -> pending
//! ```
//!
//! Both pages stay share-locked while the pair is processed and are
//! released before the next pair is popped.

use cubejoin_error::Result;
use cubejoin_index::{PageGuard, SpatialIndex};
use cubejoin_types::JoinSide;
use tracing::trace;

use crate::metrics::JoinMetrics;
use crate::pair::{PendingPair, PendingSide, ResultPair};
use crate::reader::{ChildEntry, LeafEntry, read_chain};
use crate::segment::{SegmentedQueue, SegmentedStack};
use crate::sweep::overlap_sweep;

/// Mutable view of a join's work lists for the duration of one pair.
pub(crate) struct PairProcessor<'a, I> {
    pub indexes: &'a [I; 2],
    pub pending: &'a mut SegmentedStack<PendingPair>,
    pub results: &'a mut SegmentedQueue<ResultPair>,
    pub metrics: &'a mut JoinMetrics,
    pub max_chain: usize,
}

impl<'a, I: SpatialIndex> PairProcessor<'a, I> {
    fn index(&self, side: JoinSide) -> &'a I {
        &self.indexes[side.index()]
    }

    pub(crate) fn process(&mut self, pair: PendingPair) -> Result<()> {
        let page1 = self.index(JoinSide::First).read_page(pair.first.page)?;
        let page2 = self.index(JoinSide::Second).read_page(pair.second.page)?;
        self.metrics.pages_read += 2;

        match (page1.is_leaf(), page2.is_leaf()) {
            (true, false) => {
                self.metrics.mixed_pairs += 1;
                trace!(first = %pair.first.page, second = %pair.second.page, "leaf x internal");
                self.expand(JoinSide::Second, page2, pair.second, pair.first)?;
                drop(page1);
            }
            (false, true) => {
                self.metrics.mixed_pairs += 1;
                trace!(first = %pair.first.page, second = %pair.second.page, "internal x leaf");
                self.expand(JoinSide::First, page1, pair.first, pair.second)?;
                drop(page2);
            }
            (true, true) => {
                self.metrics.leaf_leaf_pairs += 1;
                trace!(first = %pair.first.page, second = %pair.second.page, "leaf x leaf");
                self.join_leaves(page1, page2, pair)?;
            }
            (false, false) => {
                self.metrics.internal_internal_pairs += 1;
                trace!(first = %pair.first.page, second = %pair.second.page, "internal x internal");
                self.join_internals(page1, page2, pair)?;
            }
        }
        Ok(())
    }

    /// Pair every child of the internal page with the fixed leaf page.
    ///
    /// The leaf side keeps its parent LSN and bound. The internal side's
    /// bound described the expanded page, not its children, and is dropped.
    fn expand(
        &mut self,
        internal_side: JoinSide,
        internal_page: PageGuard,
        internal: PendingSide,
        leaf: PendingSide,
    ) -> Result<()> {
        let children: Vec<ChildEntry> = read_chain(
            self.index(internal_side),
            internal_page,
            internal.parent_lsn,
            self.max_chain,
            self.metrics,
        )?;
        for child in children {
            let child_side = PendingSide {
                page: child.page,
                parent_lsn: child.parent_lsn,
                bound: None,
            };
            let leaf_side = PendingSide {
                page: leaf.page,
                parent_lsn: leaf.parent_lsn,
                bound: leaf.bound.clone(),
            };
            self.pending
                .push(PendingPair::with_side(internal_side, child_side, leaf_side))?;
            self.metrics.pending_pushed += 1;
        }
        Ok(())
    }

    fn join_leaves(&mut self, page1: PageGuard, page2: PageGuard, pair: PendingPair) -> Result<()> {
        let first: Vec<LeafEntry> = read_chain(
            self.index(JoinSide::First),
            page1,
            pair.first.parent_lsn,
            self.max_chain,
            self.metrics,
        )?;
        let mut second: Vec<LeafEntry> = read_chain(
            self.index(JoinSide::Second),
            page2,
            pair.second.parent_lsn,
            self.max_chain,
            self.metrics,
        )?;

        let results = &mut *self.results;
        let metrics = &mut *self.metrics;
        let stats = overlap_sweep(
            &first,
            &mut second,
            pair.first.bound,
            pair.second.bound,
            |a, b| {
                results.enqueue(ResultPair::new(a.tid, b.tid))?;
                metrics.results_enqueued += 1;
                Ok(())
            },
        )?;
        self.metrics.add_pruned(JoinSide::First, stats.pruned_first);
        self.metrics.add_pruned(JoinSide::Second, stats.pruned_second);
        Ok(())
    }

    fn join_internals(
        &mut self,
        page1: PageGuard,
        page2: PageGuard,
        pair: PendingPair,
    ) -> Result<()> {
        let first: Vec<ChildEntry> = read_chain(
            self.index(JoinSide::First),
            page1,
            pair.first.parent_lsn,
            self.max_chain,
            self.metrics,
        )?;
        let mut second: Vec<ChildEntry> = read_chain(
            self.index(JoinSide::Second),
            page2,
            pair.second.parent_lsn,
            self.max_chain,
            self.metrics,
        )?;

        let pending = &mut *self.pending;
        let metrics = &mut *self.metrics;
        let stats = overlap_sweep(
            &first,
            &mut second,
            pair.first.bound,
            pair.second.bound,
            |a, b| {
                pending.push(PendingPair::new(
                    PendingSide {
                        page: a.page,
                        parent_lsn: a.parent_lsn,
                        bound: Some(a.key.clone()),
                    },
                    PendingSide {
                        page: b.page,
                        parent_lsn: b.parent_lsn,
                        bound: Some(b.key.clone()),
                    },
                ))?;
                metrics.pending_pushed += 1;
                Ok(())
            },
        )?;
        self.metrics.add_pruned(JoinSide::First, stats.pruned_first);
        self.metrics.add_pruned(JoinSide::Second, stats.pruned_second);
        Ok(())
    }
}
