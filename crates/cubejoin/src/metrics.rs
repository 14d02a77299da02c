//! Counters describing the work one join has done.

use cubejoin_types::JoinSide;
use serde::Serialize;

use crate::segment::SegmentStats;

/// Snapshot of a join's counters.
///
/// Collected inline by the join (there is no global registry); read it
/// with [`CubeJoin::metrics`](crate::CubeJoin::metrics) or take the final
/// value from [`CubeJoin::teardown`](crate::CubeJoin::teardown).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JoinMetrics {
    /// Pending pairs whose pages were both leaves.
    pub leaf_leaf_pairs: u64,
    /// Pending pairs with one leaf and one internal page.
    pub mixed_pairs: u64,
    /// Pending pairs whose pages were both internal.
    pub internal_internal_pairs: u64,
    /// Pages read, including right siblings.
    pub pages_read: u64,
    pub right_links_followed: u64,
    pub pending_pushed: u64,
    pub results_enqueued: u64,
    pub results_returned: u64,
    /// Entries of the first tree dropped by bound pruning.
    pub pruned_first: u64,
    /// Entries of the second tree dropped by bound pruning.
    pub pruned_second: u64,
    /// Tuples skipped because their key is null.
    pub null_keys_skipped: u64,
    pub segments: SegmentStats,
}

impl JoinMetrics {
    /// Total pending pairs processed.
    #[must_use]
    pub fn pairs_processed(&self) -> u64 {
        self.leaf_leaf_pairs + self.mixed_pairs + self.internal_internal_pairs
    }

    pub(crate) fn add_pruned(&mut self, side: JoinSide, count: usize) {
        let count = count as u64;
        match side {
            JoinSide::First => self.pruned_first += count,
            JoinSide::Second => self.pruned_second += count,
        }
    }

    /// Serialize the snapshot as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
