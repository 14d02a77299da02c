//! Bound-pruned pairwise overlap test between the entries of two pages.

use cubejoin_error::Result;
use cubejoin_types::Cube;

use crate::reader::PageEntry;

/// How many entries of each side the bounds pruned away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SweepStats {
    pub pruned_first: usize,
    pub pruned_second: usize,
}

/// Call `emit` for every pair of overlapping entries.
///
/// `first_bound` / `second_bound` are bounds already known for each side;
/// a missing bound is computed as the union of that side's keys. Entries of
/// `second` that miss the first side's bound are removed from `second` (the
/// survivors keep their order). Entries of `first` that miss the second
/// side's bound are skipped. Each remaining first entry is then tested
/// against every surviving second entry, in order.
pub(crate) fn overlap_sweep<A, B, F>(
    first: &[A],
    second: &mut Vec<B>,
    first_bound: Option<Cube>,
    second_bound: Option<Cube>,
    mut emit: F,
) -> Result<SweepStats>
where
    A: PageEntry,
    B: PageEntry,
    F: FnMut(&A, &B) -> Result<()>,
{
    let mut stats = SweepStats::default();
    if first.is_empty() || second.is_empty() {
        return Ok(stats);
    }
    let Some(x1) = first_bound.or_else(|| Cube::union_all(first.iter().map(|a| a.key())))
    else {
        return Ok(stats);
    };
    let Some(x2) = second_bound.or_else(|| Cube::union_all(second.iter().map(|b| b.key())))
    else {
        return Ok(stats);
    };

    let before = second.len();
    second.retain(|b| x1.overlaps(b.key()));
    stats.pruned_second = before - second.len();

    for a in first {
        if !a.key().overlaps(&x2) {
            stats.pruned_first += 1;
            continue;
        }
        for b in second.iter() {
            if a.key().overlaps(b.key()) {
                emit(a, b)?;
            }
        }
    }
    Ok(stats)
}
