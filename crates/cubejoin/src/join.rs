//! The resumable join driver.

use cubejoin_error::{JoinError, Result};
use cubejoin_index::{IndexCatalog, SpatialIndex};
use tracing::{debug, warn};

use crate::config::JoinConfig;
use crate::metrics::JoinMetrics;
use crate::pair::{PendingPair, PendingSide, ResultPair};
use crate::processor::PairProcessor;
use crate::segment::{SegmentedQueue, SegmentedStack};

/// Lifecycle of a [`CubeJoin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    /// More pairs may follow.
    Running,
    /// Every pair has been returned; further calls return `None` without
    /// touching the trees.
    Exhausted,
    /// A call failed; the join refuses further work and must be torn down.
    Poisoned,
}

/// A spatial join between two indexes, producing one overlapping row pair
/// per call.
///
/// All suspension state lives in this value: the pending stack of page
/// pairs still to descend into, and the queue of result pairs already
/// found but not yet returned. No page lock is held between calls, so the
/// indexes may be modified by other threads while the join is suspended
/// (or even while a call is running); entries moved by concurrent page
/// splits are found through right links.
///
/// ```
/// use cubejoin::{CubeJoin, JoinConfig};
/// use cubejoin_index::{MemRTree, RTreeConfig};
/// use cubejoin_types::{Cube, TupleId};
///
/// let cube = |lo: [f64; 2], hi: [f64; 2]| Some(Cube::new(&lo, &hi).unwrap());
/// let stars = MemRTree::build("stars", RTreeConfig::default(), [
///     (cube([0.0, 0.0], [1.0, 1.0]), TupleId::new(1, 1)),
/// ])?;
/// let galaxies = MemRTree::build("galaxies", RTreeConfig::default(), [
///     (cube([0.5, 0.5], [2.0, 2.0]), TupleId::new(7, 3)),
/// ])?;
///
/// let mut join = CubeJoin::setup(&stars, &galaxies, JoinConfig::default())?;
/// let pair = join.next_pair()?.unwrap();
/// assert_eq!((pair.first, pair.second), (TupleId::new(1, 1), TupleId::new(7, 3)));
/// assert!(join.next_pair()?.is_none());
/// # Ok::<(), cubejoin_error::JoinError>(())
/// ```
#[derive(Debug)]
pub struct CubeJoin<I> {
    indexes: [I; 2],
    config: JoinConfig,
    pending: SegmentedStack<PendingPair>,
    results: SegmentedQueue<ResultPair>,
    state: JoinState,
    metrics: JoinMetrics,
}

impl<I: SpatialIndex> CubeJoin<I> {
    /// Start a join of `first` against `second` at their root pages.
    ///
    /// Fails with [`JoinError::SelfJoin`] when both handles read the same
    /// tree.
    pub fn setup(first: I, second: I, config: JoinConfig) -> Result<Self> {
        config.validate()?;
        if first.id() == second.id() {
            return Err(JoinError::SelfJoin {
                name: first.name().to_owned(),
            });
        }

        let mut pending = SegmentedStack::new(config.segment_capacity);
        pending.push(PendingPair::new(
            PendingSide::root(first.root()),
            PendingSide::root(second.root()),
        ))?;
        debug!(
            first = first.name(),
            second = second.name(),
            segment_capacity = config.segment_capacity,
            "join set up"
        );

        Ok(Self {
            indexes: [first, second],
            config,
            pending,
            results: SegmentedQueue::new(config.segment_capacity),
            state: JoinState::Running,
            metrics: JoinMetrics {
                pending_pushed: 1,
                ..JoinMetrics::default()
            },
        })
    }

    /// Open two indexes by name and start a join between them.
    ///
    /// Catalog names are unique, so equal names are rejected before either
    /// index is opened.
    pub fn open<C>(catalog: &C, first: &str, second: &str, config: JoinConfig) -> Result<Self>
    where
        C: IndexCatalog<Index = I>,
    {
        if first == second {
            return Err(JoinError::SelfJoin {
                name: first.to_owned(),
            });
        }
        let first = catalog.open_for_read(first)?;
        let second = catalog.open_for_read(second)?;
        Self::setup(first, second, config)
    }

    /// Return the next overlapping pair, or `None` once the join is
    /// exhausted.
    ///
    /// Pending pairs are processed only until at least one result is
    /// available. After an error the join is [`JoinState::Poisoned`] and
    /// every later call fails with [`JoinError::Poisoned`].
    pub fn next_pair(&mut self) -> Result<Option<ResultPair>> {
        match self.state {
            JoinState::Running => {}
            JoinState::Exhausted => return Ok(None),
            JoinState::Poisoned => return Err(JoinError::Poisoned),
        }

        match self.advance() {
            Ok(Some(pair)) => {
                self.metrics.results_returned += 1;
                Ok(Some(pair))
            }
            Ok(None) => {
                self.state = JoinState::Exhausted;
                debug!(
                    results = self.metrics.results_returned,
                    pairs_processed = self.metrics.pairs_processed(),
                    pages_read = self.metrics.pages_read,
                    "join exhausted"
                );
                Ok(None)
            }
            Err(err) => {
                self.state = JoinState::Poisoned;
                warn!(error = %err, "join aborted");
                Err(err)
            }
        }
    }

    fn advance(&mut self) -> Result<Option<ResultPair>> {
        while self.results.is_empty() {
            let Some(pair) = self.pending.pop() else {
                break;
            };
            PairProcessor {
                indexes: &self.indexes,
                pending: &mut self.pending,
                results: &mut self.results,
                metrics: &mut self.metrics,
                max_chain: self.config.max_right_link_chain,
            }
            .process(pair)?;
        }
        Ok(self.results.dequeue())
    }

    #[must_use]
    pub fn state(&self) -> JoinState {
        self.state
    }

    #[must_use]
    pub fn config(&self) -> JoinConfig {
        self.config
    }

    /// Page pairs still waiting to be processed.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Results found but not yet returned.
    #[must_use]
    pub fn queued_results(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn metrics(&self) -> JoinMetrics {
        JoinMetrics {
            segments: self.pending.stats().merged(self.results.stats()),
            ..self.metrics
        }
    }

    /// End the join, releasing both indexes and all queued work.
    pub fn teardown(self) -> JoinMetrics {
        let metrics = self.metrics();
        debug!(
            state = ?self.state,
            results = metrics.results_returned,
            abandoned_pending = self.pending.len(),
            abandoned_results = self.results.len(),
            "join torn down"
        );
        metrics
    }
}

/// Yields `Err` once if a call fails, then stops.
impl<I: SpatialIndex> Iterator for CubeJoin<I> {
    type Item = Result<ResultPair>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == JoinState::Poisoned {
            return None;
        }
        self.next_pair().transpose()
    }
}

impl<I: SpatialIndex> std::iter::FusedIterator for CubeJoin<I> {}
