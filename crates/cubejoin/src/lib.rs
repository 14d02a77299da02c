//! Dual-tree spatial join over two GiST-style cube indexes.
//!
//! [`CubeJoin`] walks both trees in lockstep: it keeps a stack of page
//! pairs whose bounds overlap and descends into them, pruning each page's
//! entries against the other page's bound, until leaf pages yield pairs of
//! overlapping rows. The walk is resumable: each [`CubeJoin::next_pair`]
//! call does just enough work to return one pair, and all state between
//! calls lives in the join value.
//!
//! The trees are consumed through [`cubejoin_index::SpatialIndex`] and may
//! be modified concurrently; the join never holds a page lock across calls.

pub mod config;
pub mod join;
pub mod metrics;
pub mod pair;
pub mod segment;

mod processor;
mod reader;
mod sweep;

pub use config::JoinConfig;
pub use join::{CubeJoin, JoinState};
pub use metrics::JoinMetrics;
pub use pair::{PendingPair, PendingSide, ResultPair};
pub use segment::{SegmentStats, SegmentedQueue, SegmentedStack};
